//! Blade (tagliente) analysis.

use acs_core::stats;
use tracing::debug;

use super::features::{BladeFeatures, BladeShape};
use super::{column, MorphometricExtractor};

impl MorphometricExtractor {
    /// Measure the blade region at -x, test for expansion against the
    /// adjacent body band, and bin the cutting-edge profile by arc/chord.
    pub fn analyze_blade(&self) -> BladeFeatures {
        let t = &self.thresholds;
        let span = self.length_extent();
        let threshold = self.blade_end + t.blade_region_fraction * span;
        let region = self.select(|v| v[0] <= threshold);

        debug!(
            artifact_id = %self.artifact_id,
            vertices = region.len(),
            x_threshold = threshold,
            "blade region"
        );

        if region.len() < t.min_blade_vertices {
            return BladeFeatures::default();
        }

        let width = stats::range(&column(&region, 1));

        let adjacent_end = threshold + t.blade_adjacent_fraction * span;
        let adjacent = self.select(|v| v[0] > threshold && v[0] < adjacent_end);
        let expanded = adjacent.len() > t.min_adjacent_vertices
            && width > stats::range(&column(&adjacent, 1)) * t.blade_expansion_ratio;

        // Cutting edge: the outermost slice of the blade region.
        let xs = column(&region, 0);
        let x_min = stats::min(&xs).unwrap_or(self.blade_end);
        let edge_cut = x_min + t.blade_edge_fraction * stats::range(&xs);
        let mut edge: Vec<[f64; 3]> = region.iter().copied().filter(|v| v[0] <= edge_cut).collect();

        if edge.len() < t.min_edge_profile_vertices {
            return BladeFeatures::default();
        }

        edge.sort_by(|a, b| a[1].total_cmp(&b[1]));
        let planar = |a: &[f64; 3], b: &[f64; 3]| ((a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();

        let chord = match (edge.first(), edge.last()) {
            (Some(a), Some(b)) => planar(a, b),
            _ => 0.0,
        };
        let arc: f64 = edge.windows(2).map(|w| planar(&w[0], &w[1])).sum();
        let ratio = arc / (chord + stats::EPSILON);

        let shape = if ratio < t.arc_ratio_flattened {
            BladeShape::FlattenedArc
        } else if ratio < t.arc_ratio_semicircular {
            BladeShape::Semicircular
        } else {
            BladeShape::Lunate
        };

        debug!(
            artifact_id = %self.artifact_id,
            width,
            arc,
            chord,
            ratio,
            expanded,
            "blade measurements"
        );

        BladeFeatures {
            width,
            shape,
            arc_length: arc,
            chord_length: chord,
            expanded,
        }
    }
}

#[cfg(test)]
mod tests {
    use acs_core::config::ExtractionThresholds;
    use acs_core::types::Mesh;

    use super::super::test_support::{axe_cloud, AxeSpec};
    use super::*;
    use crate::scale::UnitScale;

    fn blade_of(mesh: &Mesh) -> BladeFeatures {
        MorphometricExtractor::new(mesh, "AX-T", UnitScale::Factor(1.0), &ExtractionThresholds::default())
            .unwrap()
            .analyze_blade()
    }

    /// Two-face slab, half-width 20 mm, flaring to `blade_half_width` over
    /// the last 14 mm at -x.
    fn flared(blade_half_width: f64) -> Mesh {
        let mut vertices = Vec::new();
        for i in 0..81 {
            let x = -80.0 + i as f64 * 2.0;
            let hw = if x < -65.0 { blade_half_width } else { 20.0 };
            for j in 0..15 {
                let y = -hw + 2.0 * hw * j as f64 / 14.0;
                vertices.push([x, y, -7.0]);
                vertices.push([x, y, 7.0]);
            }
        }
        Mesh::new(vertices, vec![]).unwrap()
    }

    #[test]
    fn test_flared_blade_is_expanded() {
        let blade = blade_of(&flared(30.0));
        assert!((blade.width - 60.0).abs() < 1e-6, "width {}", blade.width);
        assert!(blade.expanded, "60 mm blade vs 40 mm adjacent band");
        assert_ne!(blade.shape, BladeShape::Undetermined);
        println!("[PASS] test_flared_blade_is_expanded - {:?}", blade.shape);
    }

    #[test]
    fn test_tapered_blade_within_ratio_not_expanded() {
        // linear taper: the adjacent band is never 10% narrower
        let blade = blade_of(&axe_cloud(&AxeSpec::default(), |_, _| 0.0));
        assert!((blade.width - 56.0).abs() < 1e-6);
        assert!(!blade.expanded);
    }

    #[test]
    fn test_parallel_sided_blade_not_expanded() {
        let spec = AxeSpec {
            butt_half_width: 20.0,
            blade_half_width: 20.0,
            ..AxeSpec::default()
        };
        let blade = blade_of(&axe_cloud(&spec, |_, _| 0.0));
        assert!(!blade.expanded);
    }

    #[test]
    fn test_zigzag_edge_is_lunate() {
        // Edge profile alternating between the two faces: arc >> chord.
        let mut vertices = Vec::new();
        for i in 0..60 {
            let x = -80.0 + i as f64 * (160.0 / 59.0);
            for j in 0..21 {
                let y = -25.0 + j as f64 * 2.5;
                let z = if j % 2 == 0 { 6.0 } else { -6.0 };
                vertices.push([x, y, z]);
            }
        }
        let blade = blade_of(&Mesh::new(vertices, vec![]).unwrap());
        assert_eq!(blade.shape, BladeShape::Lunate, "arc {} chord {}", blade.arc_length, blade.chord_length);
    }

    #[test]
    fn test_straight_edge_is_flattened_arc() {
        // Single-layer edge: every edge vertex lies on one straight line.
        let mut vertices = Vec::new();
        for i in 0..60 {
            let x = -80.0 + i as f64 * (160.0 / 59.0);
            for j in 0..21 {
                let y = -25.0 + j as f64 * 2.5;
                let z = if i % 2 == 0 { 0.5 } else { -0.5 };
                vertices.push([x, y, z]);
            }
        }
        let blade = blade_of(&Mesh::new(vertices, vec![]).unwrap());
        assert_eq!(blade.shape, BladeShape::FlattenedArc);
        assert!((blade.chord_length - 50.0).abs() < 1e-6);
    }
}
