//! Orthogonal Procrustes superimposition.
//!
//! Both configurations are centred and scaled to unit Frobenius norm; the
//! second is then rotated (and uniformly scaled) onto the first. The
//! disparity is the residual sum of squares, in `[0, 1]`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcrustesFit {
    /// Standardized reference configuration (row-major)
    pub reference: Vec<Vec<f64>>,
    /// Second configuration after alignment (row-major)
    pub aligned: Vec<Vec<f64>>,
    pub disparity: f64,
}

/// Reshape a flat vector into `len / dims` landmarks of `dims` coordinates.
pub fn landmarks(vector: &[f64], dims: usize) -> ClusterResult<DMatrix<f64>> {
    if dims == 0 || vector.len() % dims != 0 {
        return Err(ClusterError::invalid_parameter(format!(
            "vector of length {} cannot be split into landmarks of {dims} coordinates",
            vector.len()
        )));
    }
    Ok(DMatrix::from_row_slice(vector.len() / dims, dims, vector))
}

pub fn procrustes(a: &DMatrix<f64>, b: &DMatrix<f64>) -> ClusterResult<ProcrustesFit> {
    if a.shape() != b.shape() {
        return Err(ClusterError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.nrows() < 2 {
        return Err(ClusterError::degenerate("need at least 2 landmarks"));
    }

    let a = standardize(a)?;
    let b = standardize(b)?;

    // Rotation maximising tr(A^T B R): R = V U^T for A^T B = U S V^T.
    let svd = (a.transpose() * &b).svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(ClusterError::degenerate("SVD did not converge")),
    };
    let scale: f64 = svd.singular_values.sum();
    let rotation = v_t.transpose() * u.transpose();
    let aligned = &b * rotation * scale;

    let disparity = (&a - &aligned).norm_squared();

    Ok(ProcrustesFit {
        reference: rows(&a),
        aligned: rows(&aligned),
        disparity,
    })
}

fn standardize(m: &DMatrix<f64>) -> ClusterResult<DMatrix<f64>> {
    let mut centred = m.clone();
    for mut col in centred.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    let norm = centred.norm();
    if norm <= 0.0 {
        return Err(ClusterError::degenerate(
            "configuration has no spread after centring",
        ));
    }
    Ok(centred / norm)
}

fn rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> DMatrix<f64> {
        DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
    }

    #[test]
    fn test_rotated_scaled_copy_has_zero_disparity() {
        let a = square();
        let (s, c) = (0.6_f64, 0.8_f64);
        let rot = DMatrix::from_row_slice(2, 2, &[c, -s, s, c]);
        let b = (&a * rot) * 3.0 + DMatrix::from_element(4, 2, 7.0);
        let fit = procrustes(&a, &b).unwrap();
        assert!(fit.disparity < 1e-12, "disparity {}", fit.disparity);
        println!("[PASS] test_rotated_scaled_copy_has_zero_disparity");
    }

    #[test]
    fn test_disparity_in_unit_range() {
        let a = square();
        let b = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 2.0, 0.1, 0.3, 0.2, 0.1, 1.5]);
        let fit = procrustes(&a, &b).unwrap();
        assert!(fit.disparity > 0.0 && fit.disparity <= 1.0);
    }

    #[test]
    fn test_shape_and_degeneracy_checks() {
        let a = square();
        assert!(matches!(
            procrustes(&a, &DMatrix::zeros(3, 2)),
            Err(ClusterError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            procrustes(&a, &DMatrix::from_element(4, 2, 1.0)),
            Err(ClusterError::DegenerateInput(_))
        ));
        assert!(landmarks(&[1.0, 2.0, 3.0], 2).is_err());
        assert_eq!(landmarks(&[1.0, 2.0, 3.0, 4.0], 2).unwrap().nrows(), 2);
    }
}
