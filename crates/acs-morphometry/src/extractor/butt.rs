//! Butt (tallone) and socket (incavo) analysis.

use acs_core::stats;
use tracing::{debug, warn};

use super::{column, MorphometricExtractor};
use super::features::{ButtFeatures, SocketFeatures, SocketProfile};
use crate::neighbors::RadiusIndex;

impl MorphometricExtractor {
    /// Measure the butt region (the last `butt_region_fraction` of the
    /// length at +x) and look for a socket on its top surface.
    pub fn analyze_butt(&self) -> ButtFeatures {
        let t = &self.thresholds;
        let threshold = self.butt_end - t.butt_region_fraction * self.length_extent();
        let region = self.select(|v| v[0] >= threshold);

        debug!(
            artifact_id = %self.artifact_id,
            vertices = region.len(),
            x_threshold = threshold,
            "butt region"
        );

        if region.len() < t.min_butt_vertices {
            warn!(artifact_id = %self.artifact_id, "butt region too small");
            return ButtFeatures::default();
        }

        let width = stats::range(&column(&region, 1));
        let thickness = stats::range(&column(&region, 2));
        let socket = self.detect_socket(&region);

        ButtFeatures {
            width,
            thickness,
            socket,
        }
    }

    /// Socket detection on the top-facing subset of the butt region.
    ///
    /// Declared present when the mean local curvature reaches
    /// `curvature_threshold` OR the top-surface depth range reaches
    /// `socket_depth_threshold_mm`.
    fn detect_socket(&self, region: &[[f64; 3]]) -> SocketFeatures {
        let t = &self.thresholds;

        let zs = column(region, 2);
        let Some(z_top) = stats::percentile(&zs, t.socket_top_percentile) else {
            return SocketFeatures::absent();
        };
        let top: Vec<[f64; 3]> = region.iter().copied().filter(|v| v[2] >= z_top).collect();
        debug!(artifact_id = %self.artifact_id, top_vertices = top.len(), "socket top surface");

        if top.len() < t.min_socket_vertices {
            return SocketFeatures::absent();
        }

        // Local curvature: spread of neighbour elevations around their centroid.
        let index = RadiusIndex::new(&top, t.curvature_radius_mm);
        let curvatures: Vec<f64> = (0..top.len())
            .filter_map(|i| {
                let neighbors = index.neighbors_of(i);
                if neighbors.len() < t.curvature_min_neighbors {
                    return None;
                }
                let elevations: Vec<f64> = neighbors.iter().map(|&j| top[j][2]).collect();
                stats::population_std(&elevations)
            })
            .collect();

        let Some(mean_curvature) = stats::mean(&curvatures) else {
            return SocketFeatures::absent();
        };

        let top_z = column(&top, 2);
        let depth_range = stats::range(&top_z);
        debug!(
            artifact_id = %self.artifact_id,
            mean_curvature,
            depth_range,
            "socket indicators"
        );

        let present =
            mean_curvature >= t.curvature_threshold || depth_range >= t.socket_depth_threshold_mm;
        if !present {
            return SocketFeatures::absent();
        }

        let (width, profile) = self.socket_width(&top, &top_z);
        debug!(artifact_id = %self.artifact_id, width, depth = depth_range, ?profile, "socket detected");

        SocketFeatures {
            present: true,
            width,
            depth: depth_range,
            profile,
        }
    }

    /// Isolate the deepest vertices, keep the dense core around their median
    /// centre, and take the geometric mean of its planar extents.
    fn socket_width(&self, top: &[[f64; 3]], top_z: &[f64]) -> (f64, SocketProfile) {
        let t = &self.thresholds;
        let Some(z_deep) = stats::percentile(top_z, t.socket_deep_percentile) else {
            return (0.0, SocketProfile::Undetermined);
        };
        let concave: Vec<[f64; 3]> = top.iter().copied().filter(|v| v[2] < z_deep).collect();
        if concave.is_empty() {
            return (0.0, SocketProfile::Undetermined);
        }

        let cx = stats::median(&column(&concave, 0)).unwrap_or(0.0);
        let cy = stats::median(&column(&concave, 1)).unwrap_or(0.0);
        let distances: Vec<f64> = concave
            .iter()
            .map(|v| ((v[0] - cx).powi(2) + (v[1] - cy).powi(2)).sqrt())
            .collect();
        let cutoff = stats::percentile(&distances, t.socket_cluster_percentile).unwrap_or(0.0);
        let cluster: Vec<[f64; 3]> = concave
            .iter()
            .zip(&distances)
            .filter(|(_, &d)| d <= cutoff)
            .map(|(v, _)| *v)
            .collect();

        let (x_range, y_range, width) = if cluster.len() > t.socket_min_cluster_points {
            let xr = stats::range(&column(&cluster, 0));
            let yr = stats::range(&column(&cluster, 1));
            (xr, yr, (xr * yr).sqrt())
        } else {
            let xr = stats::range(&column(&concave, 0));
            let yr = stats::range(&column(&concave, 1));
            (xr, yr, xr.max(yr))
        };

        let aspect = x_range / (y_range + stats::EPSILON);
        let profile = if (t.circular_aspect_min..=t.circular_aspect_max).contains(&aspect) {
            SocketProfile::Circular
        } else {
            SocketProfile::Rectangular
        };
        (width, profile)
    }
}
