//! Raised-edge (margini rialzati) analysis.

use acs_core::stats;
use tracing::debug;

use super::features::RaisedEdgeFeatures;
use super::{column, MorphometricExtractor};

impl MorphometricExtractor {
    /// Compare the mean elevation of each lateral margin of the central
    /// region against the regional median elevation.
    pub fn analyze_raised_edges(&self) -> RaisedEdgeFeatures {
        let t = &self.thresholds;
        let span = self.length_extent();
        let start = self.blade_end + t.edge_margin_fraction * span;
        let end = self.butt_end - t.edge_margin_fraction * span;
        let region = self.select(|v| v[0] >= start && v[0] <= end);

        if region.len() < t.min_edge_vertices {
            return RaisedEdgeFeatures::default();
        }

        let ys = column(&region, 1);
        let (Some(left_cut), Some(right_cut), Some(median_z)) = (
            stats::percentile(&ys, t.edge_margin_percentile),
            stats::percentile(&ys, 100.0 - t.edge_margin_percentile),
            stats::median(&column(&region, 2)),
        ) else {
            return RaisedEdgeFeatures::default();
        };

        let left: Vec<[f64; 3]> = region.iter().copied().filter(|v| v[1] <= left_cut).collect();
        let right: Vec<[f64; 3]> = region.iter().copied().filter(|v| v[1] >= right_cut).collect();

        let raise = |margin: &[[f64; 3]]| stats::mean(&column(margin, 2)).unwrap_or(0.0) - median_z;
        let left_raise = raise(&left);
        let right_raise = raise(&right);
        let left_raised = left_raise > t.edge_raise_threshold_mm;
        let right_raised = right_raise > t.edge_raise_threshold_mm;

        debug!(
            artifact_id = %self.artifact_id,
            left_raise,
            right_raise,
            "margin elevation over regional median"
        );

        if !(left_raised || right_raised) {
            return RaisedEdgeFeatures::default();
        }

        let margin_xs: Vec<f64> = left.iter().chain(&right).map(|v| v[0]).collect();
        let peak = [
            if left_raised { left_raise } else { 0.0 },
            if right_raised { right_raise } else { 0.0 },
        ]
        .into_iter()
        .fold(0.0, f64::max);

        RaisedEdgeFeatures {
            present: true,
            length: stats::range(&margin_xs),
            max_thickness: peak,
        }
    }
}
