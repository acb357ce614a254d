//! Principal-axis orientation of artifact meshes.
//!
//! The normalizer moves the vertex centroid to the origin and re-expresses
//! every vertex in the eigenbasis of the vertex covariance, ordered by
//! descending variance: x = length, y = width, z = thickness.
//!
//! Eigenvector signs are arbitrary, so they are canonicalized: the
//! largest-magnitude component of the length and width axes is made
//! positive, and the thickness axis is their cross product (right-handed).
//! For an already-oriented mesh the covariance is diagonal, the canonical
//! eigenbasis is the identity, and normalizing again changes nothing.

use acs_core::types::Mesh;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Largest variance below which the decomposition is treated as degenerate.
const DEGENERATE_VARIANCE: f64 = 1e-12;

/// Canonical coordinate frame of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedFrame {
    /// Vertex centroid in source coordinates
    pub center: [f64; 3],
    /// Length, width and thickness axes in source coordinates (unit vectors)
    pub axes: [[f64; 3]; 3],
    /// Vertex variance along each axis, descending
    pub variances: [f64; 3],
}

impl OrientedFrame {
    /// Frame that leaves coordinates untouched.
    pub fn identity() -> Self {
        Self {
            center: [0.0; 3],
            axes: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            variances: [0.0; 3],
        }
    }

    /// Express a source-space point in this frame.
    pub fn project(&self, p: [f64; 3]) -> [f64; 3] {
        let d = [
            p[0] - self.center[0],
            p[1] - self.center[1],
            p[2] - self.center[2],
        ];
        let dot = |a: &[f64; 3]| a[0] * d[0] + a[1] * d[1] + a[2] * d[2];
        [dot(&self.axes[0]), dot(&self.axes[1]), dot(&self.axes[2])]
    }
}

/// Result of [`OrientationNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedMesh {
    /// Mesh in canonical coordinates (or the input, if degenerate)
    pub mesh: Mesh,
    pub frame: OrientedFrame,
    /// Decomposition failed and the input was returned unchanged
    pub degenerate: bool,
}

/// Computes canonical frames via principal-axis decomposition.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationNormalizer;

impl OrientationNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Orient `mesh` along its principal axes.
    ///
    /// Never fails: a degenerate decomposition (coincident points, non-finite
    /// eigen-system) logs a warning and returns the input unchanged with an
    /// identity frame.
    pub fn normalize(&self, mesh: &Mesh) -> OrientedMesh {
        match principal_frame(mesh) {
            Some(frame) => {
                debug!(
                    variances = ?frame.variances,
                    "principal axes computed"
                );
                let oriented = mesh.map_vertices(|v| frame.project(v));
                OrientedMesh {
                    mesh: oriented,
                    frame,
                    degenerate: false,
                }
            }
            None => {
                warn!(
                    vertices = mesh.vertex_count(),
                    "degenerate principal-axis decomposition, mesh left unchanged"
                );
                OrientedMesh {
                    mesh: mesh.clone(),
                    frame: OrientedFrame::identity(),
                    degenerate: true,
                }
            }
        }
    }
}

fn principal_frame(mesh: &Mesh) -> Option<OrientedFrame> {
    let center = mesh.centroid();
    let c = Vector3::new(center[0], center[1], center[2]);
    let n = mesh.vertex_count() as f64;

    let mut cov = Matrix3::<f64>::zeros();
    for v in mesh.vertices() {
        let d = Vector3::new(v[0], v[1], v[2]) - c;
        cov += d * d.transpose();
    }
    cov /= n;

    let eigen = SymmetricEigen::new(cov);
    if eigen.eigenvalues.iter().any(|v| !v.is_finite())
        || eigen.eigenvectors.iter().any(|v| !v.is_finite())
    {
        return None;
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let largest = eigen.eigenvalues[order[0]];
    if largest <= DEGENERATE_VARIANCE {
        return None;
    }

    let axis = |i: usize| canonical_sign(eigen.eigenvectors.column(order[i]).into_owned());
    let length = axis(0);
    let width = axis(1);
    let thickness = length.cross(&width).normalize();

    let to_array = |v: &Vector3<f64>| [v.x, v.y, v.z];
    Some(OrientedFrame {
        center,
        axes: [to_array(&length), to_array(&width), to_array(&thickness)],
        variances: [
            eigen.eigenvalues[order[0]].max(0.0),
            eigen.eigenvalues[order[1]].max(0.0),
            eigen.eigenvalues[order[2]].max(0.0),
        ],
    })
}

/// Flip `v` so its largest-magnitude component is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    let v = v.normalize();
    let dominant = v.iter().copied().fold(0.0_f64, |acc, x| {
        if x.abs() > acc.abs() {
            x
        } else {
            acc
        }
    });
    if dominant < 0.0 {
        -v
    } else {
        v
    }
}
