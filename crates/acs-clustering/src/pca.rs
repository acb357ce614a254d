//! Principal component analysis on z-scored feature rows.
//!
//! The fitted standardizer is kept with the result so new artifacts can be
//! projected into the same space.
//!
//! The full decomposition is computed first so every component's variance
//! share is reported; only the retained components carry loadings and
//! scores. Signs are canonical: the largest-|loading| entry of each
//! component is positive.

use acs_core::stats::Standardizer;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};

pub const TOP_FEATURES_PER_COMPONENT: usize = 5;

const SHAPE_KEYWORDS: [&str; 9] = [
    "ratio", "forma", "profilo", "shape", "arco", "corda", "aspect", "espanso", "present",
];
const SIZE_KEYWORDS: [&str; 12] = [
    "length", "width", "thickness", "volume", "area", "larghezza", "spessore", "lunghezza",
    "profondita", "peso", "weight", "depth",
];

/// Heuristic reading of a component from its top feature names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentInterpretation {
    Size,
    Shape,
    Mixed,
}

impl ComponentInterpretation {
    /// Shape keywords win over size keywords within one name, so
    /// `length_width_ratio` reads as shape.
    pub fn from_feature_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let (mut size, mut shape) = (0usize, 0usize);
        for name in names {
            let lower = name.to_lowercase();
            if SHAPE_KEYWORDS.iter().any(|k| lower.contains(k)) {
                shape += 1;
            } else if SIZE_KEYWORDS.iter().any(|k| lower.contains(k)) {
                size += 1;
            }
        }
        match size.cmp(&shape) {
            std::cmp::Ordering::Greater => Self::Size,
            std::cmp::Ordering::Less => Self::Shape,
            std::cmp::Ordering::Equal => Self::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLoading {
    pub name: String,
    pub loading: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalComponent {
    /// 1-based component number
    pub pc: usize,
    pub variance_explained: f64,
    pub loadings: Vec<f64>,
    pub top_features: Vec<FeatureLoading>,
    pub interpretation: ComponentInterpretation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    pub n_components: usize,
    /// Variance share of every component of the full decomposition
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    pub components: Vec<PrincipalComponent>,
    pub artifact_ids: Vec<String>,
    pub feature_names: Vec<String>,
    /// Per-artifact coordinates on the retained components, in `artifact_ids` order
    pub scores: Vec<Vec<f64>>,
    /// Column means and scales of the training rows
    pub standardizer: Standardizer,
}

impl PcaResult {
    /// Coordinates of a raw row (in `feature_names` order) on the retained
    /// components.
    pub fn project_row(&self, row: &[f64]) -> ClusterResult<Vec<f64>> {
        if row.len() != self.feature_names.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        let z = self.standardizer.transform_row(row);
        Ok(self
            .components
            .iter()
            .map(|c| z.iter().zip(&c.loadings).map(|(x, l)| x * l).sum())
            .collect())
    }
}

/// Fit PCA on raw `rows`, z-scoring each column first.
///
/// Retains `n_components` when given, otherwise the smallest count whose
/// cumulative variance share reaches `explained_variance`.
pub fn fit_pca(
    rows: &[Vec<f64>],
    artifact_ids: &[String],
    feature_names: &[String],
    n_components: Option<usize>,
    explained_variance: f64,
) -> ClusterResult<PcaResult> {
    let n = rows.len();
    let d = feature_names.len();
    if n < 2 {
        return Err(ClusterError::insufficient_samples(2, n));
    }
    if d == 0 {
        return Err(ClusterError::degenerate("no features to decompose"));
    }
    if !(explained_variance > 0.0 && explained_variance <= 1.0) {
        return Err(ClusterError::invalid_parameter(format!(
            "explained_variance must be in (0, 1], got {explained_variance}"
        )));
    }
    if let Some(bad) = rows.iter().find(|r| r.len() != d) {
        return Err(ClusterError::DimensionMismatch {
            expected: d,
            actual: bad.len(),
        });
    }

    let standardizer =
        Standardizer::fit(rows).ok_or_else(|| ClusterError::insufficient_samples(2, 0))?;
    let rows = standardizer.transform(rows);
    let x = DMatrix::from_fn(n, d, |i, j| rows[i][j]);
    let svd = x.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| ClusterError::degenerate("SVD did not produce right singular vectors"))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let variances: Vec<f64> = order.iter().map(|&i| svd.singular_values[i].powi(2)).collect();
    let total: f64 = variances.iter().sum();
    if total <= 0.0 {
        return Err(ClusterError::degenerate("all artifacts have identical features"));
    }
    let ratios: Vec<f64> = variances.iter().map(|v| v / total).collect();
    let cumulative: Vec<f64> = ratios
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(*acc)
        })
        .collect();

    let retained = match n_components {
        Some(k) if k == 0 || k > ratios.len() => {
            return Err(ClusterError::invalid_parameter(format!(
                "n_components must be in 1..={}, got {k}",
                ratios.len()
            )))
        }
        Some(k) => k,
        // Rounding can leave the last cumulative share a hair under 1.0.
        None => cumulative
            .iter()
            .position(|c| *c >= explained_variance - 1e-12)
            .map_or(ratios.len(), |p| p + 1),
    };

    let mut components = Vec::with_capacity(retained);
    for (rank, &src) in order.iter().take(retained).enumerate() {
        let mut loadings: Vec<f64> = v_t.row(src).iter().copied().collect();
        let pivot = loadings
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            loadings.iter_mut().for_each(|v| *v = -*v);
        }

        let mut by_importance: Vec<usize> = (0..d).collect();
        by_importance.sort_by(|&a, &b| loadings[b].abs().total_cmp(&loadings[a].abs()));
        let top_features: Vec<FeatureLoading> = by_importance
            .iter()
            .take(TOP_FEATURES_PER_COMPONENT)
            .map(|&j| FeatureLoading {
                name: feature_names[j].clone(),
                loading: loadings[j],
                importance: loadings[j].abs(),
            })
            .collect();
        let interpretation =
            ComponentInterpretation::from_feature_names(top_features.iter().map(|f| f.name.as_str()));

        components.push(PrincipalComponent {
            pc: rank + 1,
            variance_explained: ratios[rank],
            loadings,
            top_features,
            interpretation,
        });
    }

    let scores: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| {
            components
                .iter()
                .map(|c| r.iter().zip(&c.loadings).map(|(x, l)| x * l).sum())
                .collect()
        })
        .collect();

    debug!(n_samples = n, n_features = d, retained, "PCA fitted");

    Ok(PcaResult {
        n_components: retained,
        explained_variance_ratio: ratios,
        cumulative_variance: cumulative,
        components,
        artifact_ids: artifact_ids.to_vec(),
        feature_names: feature_names.to_vec(),
        scores,
        standardizer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Points along the (1, 1) diagonal with a small orthogonal wobble.
    fn diagonal() -> (Vec<Vec<f64>>, Vec<String>, Vec<String>) {
        let rows = vec![
            vec![-2.0, -2.1],
            vec![-1.0, -0.9],
            vec![0.0, 0.1],
            vec![1.0, 0.9],
            vec![2.0, 2.0],
        ];
        let ids = names(&["A", "B", "C", "D", "E"]);
        (rows, ids, names(&["length", "width"]))
    }

    #[test]
    fn test_first_component_dominates() {
        let (rows, ids, features) = diagonal();
        let result = fit_pca(&rows, &ids, &features, None, 0.95).unwrap();
        assert_eq!(result.n_components, 1);
        assert_eq!(result.explained_variance_ratio.len(), 2);
        assert!(result.explained_variance_ratio[0] > 0.95);
        assert!((result.cumulative_variance[1] - 1.0).abs() < 1e-12);

        let pc1 = &result.components[0];
        assert!(pc1.loadings.iter().all(|l| *l > 0.0), "canonical sign");
        assert!((pc1.loadings[0] - pc1.loadings[1]).abs() < 0.1);
        assert_eq!(pc1.interpretation, ComponentInterpretation::Size);
        assert!(result.scores[0][0] < 0.0 && result.scores[4][0] > 0.0);
        println!("[PASS] test_first_component_dominates - {:.4}", result.explained_variance_ratio[0]);
    }

    #[test]
    fn test_fixed_component_count() {
        let (rows, ids, features) = diagonal();
        let result = fit_pca(&rows, &ids, &features, Some(2), 0.95).unwrap();
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.scores[0].len(), 2);
        assert!(fit_pca(&rows, &ids, &features, Some(3), 0.95).is_err());
    }

    #[test]
    fn test_projection_reproduces_training_scores() {
        let (rows, ids, features) = diagonal();
        let result = fit_pca(&rows, &ids, &features, Some(2), 0.95).unwrap();
        for (row, fitted) in rows.iter().zip(&result.scores) {
            let projected = result.project_row(row).unwrap();
            for (p, f) in projected.iter().zip(fitted) {
                assert!((p - f).abs() < 1e-9, "{p} vs {f}");
            }
        }
        assert!(matches!(
            result.project_row(&[1.0]),
            Err(ClusterError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        println!("[PASS] test_projection_reproduces_training_scores");
    }

    #[test]
    fn test_preconditions() {
        let features = names(&["a"]);
        assert_eq!(
            fit_pca(&[vec![1.0]], &names(&["A"]), &features, None, 0.95),
            Err(ClusterError::insufficient_samples(2, 1))
        );
        let flat = vec![vec![0.0], vec![0.0]];
        assert!(matches!(
            fit_pca(&flat, &names(&["A", "B"]), &features, None, 0.95),
            Err(ClusterError::DegenerateInput(_))
        ));
        let (rows, ids, features) = diagonal();
        assert!(fit_pca(&rows, &ids, &features, None, 1.5).is_err());
    }

    #[test]
    fn test_interpretation_keywords() {
        use ComponentInterpretation::*;
        assert_eq!(ComponentInterpretation::from_feature_names(["length", "sav_peso"]), Size);
        assert_eq!(
            ComponentInterpretation::from_feature_names(["length_width_ratio", "sav_tagliente_forma"]),
            Shape
        );
        assert_eq!(ComponentInterpretation::from_feature_names(["volume", "sav_incavo_presente"]), Mixed);
    }
}
