//! Savignano morphometric feature extraction.
//!
//! [`MorphometricExtractor`] scales a mesh to millimetres, orients it, and
//! runs four independent regional analyses. Each analysis selects vertices
//! by thresholds along the length axis `x` and falls back to a documented
//! default when its region is too sparse. Extraction of a structurally
//! valid mesh never fails.
//!
//! All tuning values come from [`ExtractionThresholds`].

mod blade;
mod body;
mod butt;
mod edges;
mod features;

use acs_core::config::ExtractionThresholds;
use acs_core::stats;
use acs_core::types::{FeatureDictionary, Mesh};
use tracing::{debug, info};

use crate::error::MorphometryResult;
use crate::orientation::{OrientationNormalizer, OrientedFrame};
use crate::scale::UnitScale;

pub use features::{
    ArtifactMetadata, BladeFeatures, BladeShape, BodyFeatures, ButtFeatures, GeneralDimensions,
    MeshGeometry, RaisedEdgeFeatures, SavignanoFeatures, SocketFeatures, SocketProfile,
};

/// Oriented, millimetre-scaled view of one artifact mesh.
#[derive(Debug, Clone)]
pub struct MorphometricExtractor {
    artifact_id: String,
    thresholds: ExtractionThresholds,
    scale_factor: f64,
    /// Mesh in millimetres, source orientation
    scaled: Mesh,
    /// Vertices in the canonical frame, butt at +x after polarity resolution
    vertices: Vec<[f64; 3]>,
    frame: OrientedFrame,
    polarity_flipped: bool,
    /// Blade end (minimum x)
    blade_end: f64,
    /// Butt end (maximum x)
    butt_end: f64,
}

impl MorphometricExtractor {
    /// Prepare `mesh` for extraction.
    ///
    /// # Errors
    ///
    /// Only when `scale` resolves to a non-positive or non-finite factor.
    pub fn new(
        mesh: &Mesh,
        artifact_id: impl Into<String>,
        scale: UnitScale,
        thresholds: &ExtractionThresholds,
    ) -> MorphometryResult<Self> {
        let artifact_id = artifact_id.into();
        let scale_factor = scale.resolve(mesh)?;
        let scaled = if scale_factor == 1.0 {
            mesh.clone()
        } else {
            info!(artifact_id = %artifact_id, scale_factor, "applied scale factor (mesh units -> mm)");
            mesh.map_vertices(|[x, y, z]| [x * scale_factor, y * scale_factor, z * scale_factor])
        };

        let oriented = OrientationNormalizer::new().normalize(&scaled);
        let mut vertices = oriented.mesh.vertices().to_vec();
        let mut frame = oriented.frame;

        let polarity_flipped =
            thresholds.resolve_polarity && blade_at_positive_end(&vertices, thresholds);
        if polarity_flipped {
            // 180 degree turn about the thickness axis keeps the frame right-handed
            for v in &mut vertices {
                v[0] = -v[0];
                v[1] = -v[1];
            }
            for axis in &mut frame.axes[..2] {
                axis.iter_mut().for_each(|c| *c = -*c);
            }
        }

        let xs = column(&vertices, 0);
        let blade_end = stats::min(&xs).unwrap_or(0.0);
        let butt_end = stats::max(&xs).unwrap_or(0.0);

        info!(
            artifact_id = %artifact_id,
            butt_end,
            blade_end,
            polarity_flipped,
            "orientation identified"
        );

        Ok(Self {
            artifact_id,
            thresholds: thresholds.clone(),
            scale_factor,
            scaled,
            vertices,
            frame,
            polarity_flipped,
            blade_end,
            butt_end,
        })
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Frame the oriented vertices are expressed in, polarity included.
    pub fn frame(&self) -> &OrientedFrame {
        &self.frame
    }

    pub fn polarity_flipped(&self) -> bool {
        self.polarity_flipped
    }

    /// Oriented vertices in millimetres.
    pub fn oriented_vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Run every regional analysis.
    pub fn extract_all_features(&self) -> SavignanoFeatures {
        info!(artifact_id = %self.artifact_id, "starting morphometric extraction");

        let features = SavignanoFeatures {
            artifact_id: self.artifact_id.clone(),
            butt: self.analyze_butt(),
            raised_edges: self.analyze_raised_edges(),
            body: self.analyze_body(),
            blade: self.analyze_blade(),
            dimensions: self.general_dimensions(),
        };

        info!(
            artifact_id = %self.artifact_id,
            socket = features.butt.socket.present,
            raised_edges = features.raised_edges.present,
            blade_shape = features.blade.shape.as_str(),
            "extraction completed"
        );
        features
    }

    /// Extract and assemble the persisted artifact record.
    pub fn extract_record(&self, metadata: &ArtifactMetadata) -> FeatureDictionary {
        self.extract_all_features()
            .artifact_record(&self.mesh_geometry(), metadata)
    }

    /// Overall extents along the oriented axes, sorted descending.
    pub fn general_dimensions(&self) -> GeneralDimensions {
        let mut extents = [0, 1, 2].map(|axis| stats::range(&column(&self.vertices, axis)));
        extents.sort_by(|a, b| b.total_cmp(a));
        GeneralDimensions {
            length: extents[0],
            width: extents[1],
            thickness: extents[2],
        }
    }

    pub fn mesh_geometry(&self) -> MeshGeometry {
        let dims = self.general_dimensions();
        let ratio = |a: f64, b: f64| if b > 0.0 { a / b } else { 0.0 };
        MeshGeometry {
            volume: self.scaled.volume(),
            surface_area: self.scaled.surface_area(),
            length_width_ratio: ratio(dims.length, dims.width),
            length_thickness_ratio: ratio(dims.length, dims.thickness),
            width_thickness_ratio: ratio(dims.width, dims.thickness),
            n_vertices: self.scaled.vertex_count(),
            n_faces: self.scaled.face_count(),
        }
    }

    /// Length-axis extent `L`.
    fn length_extent(&self) -> f64 {
        self.butt_end - self.blade_end
    }

    fn select(&self, keep: impl Fn(&[f64; 3]) -> bool) -> Vec<[f64; 3]> {
        self.vertices.iter().copied().filter(|v| keep(v)).collect()
    }
}

/// Values of one coordinate across `points`.
pub(crate) fn column(points: &[[f64; 3]], axis: usize) -> Vec<f64> {
    points.iter().map(|p| p[axis]).collect()
}

/// True when the +x end region is wider than the -x end region, i.e. the
/// blade sits at +x and the butt convention needs flipping.
fn blade_at_positive_end(vertices: &[[f64; 3]], thresholds: &ExtractionThresholds) -> bool {
    let xs = column(vertices, 0);
    let (Some(lo), Some(hi)) = (stats::min(&xs), stats::max(&xs)) else {
        return false;
    };
    let span = hi - lo;
    let width_where = |keep: &dyn Fn(f64) -> bool| {
        let ys: Vec<f64> = vertices.iter().filter(|v| keep(v[0])).map(|v| v[1]).collect();
        stats::range(&ys)
    };

    let positive_width = width_where(&|x| x >= hi - thresholds.butt_region_fraction * span);
    let negative_width = width_where(&|x| x <= lo + thresholds.blade_region_fraction * span);
    debug!(positive_width, negative_width, "end widths for polarity");
    positive_width > negative_width
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic axe-like point clouds.

    use acs_core::types::Mesh;

    /// Parameters of a synthetic axe: a slab whose half-width tapers
    /// linearly from `butt_half_width` at +x to `blade_half_width` at -x.
    pub struct AxeSpec {
        pub length: f64,
        pub butt_half_width: f64,
        pub blade_half_width: f64,
        pub thickness: f64,
        pub nx: usize,
        pub ny: usize,
        pub nz: usize,
    }

    impl Default for AxeSpec {
        fn default() -> Self {
            Self {
                length: 160.0,
                butt_half_width: 12.0,
                blade_half_width: 28.0,
                thickness: 14.0,
                nx: 80,
                ny: 15,
                nz: 2,
            }
        }
    }

    /// Grid of vertices on `nz` layers through the tapered slab (2 = top and
    /// bottom surface only). `top` displaces the upper layer as a function
    /// of (x, y) to sculpt sockets and flanges.
    pub fn axe_cloud(spec: &AxeSpec, top: impl Fn(f64, f64) -> f64) -> Mesh {
        let mut vertices = Vec::new();
        let half_len = spec.length / 2.0;
        for i in 0..spec.nx {
            let t = i as f64 / (spec.nx - 1) as f64;
            let x = -half_len + t * spec.length;
            let half_w = spec.blade_half_width + t * (spec.butt_half_width - spec.blade_half_width);
            for j in 0..spec.ny {
                let y = -half_w + 2.0 * half_w * j as f64 / (spec.ny - 1) as f64;
                for k in 0..spec.nz {
                    let s = k as f64 / (spec.nz - 1) as f64;
                    let mut z = -spec.thickness / 2.0 + s * spec.thickness;
                    if k == spec.nz - 1 {
                        z += top(x, y);
                    }
                    vertices.push([x, y, z]);
                }
            }
        }
        Mesh::new(vertices, vec![]).expect("synthetic axe is valid")
    }
}
