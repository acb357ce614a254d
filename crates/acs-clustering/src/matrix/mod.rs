//! Casting-matrix identification.
//!
//! Axes cast in the same mold share dimensions, socket and blade
//! morphology far more tightly than axes of the same type cast in
//! different molds. [`MatrixAnalyzer`] clusters a corpus over a fixed set
//! of standardized columns, names each group `MAT_A`, `MAT_B`, ... and
//! characterizes it.
//!
//! # Architecture
//!
//! ```text
//! Unclustered ──identify_matrices──> Clustering ──> Characterizing ──> Ready
//!      ^                                  │                │
//!      └──────────────── error ───────────┴────────────────┘
//! ```
//!
//! Cluster count selection:
//! - 1 artifact: one matrix (`SingleSample`)
//! - 2 artifacts: same matrix iff their distance is below twice the
//!   standard deviation of all standardized entries (`TwoSampleHeuristic`)
//! - 3+: caller-fixed count, distance threshold (hierarchical only), or
//!   the silhouette-maximising count in `[2, min(max_clusters, n - 1)]`

mod characterize;
mod fusion;

pub use characterize::{infer_mold_type, MatrixCharacteristics, MoldType};
pub use fusion::{
    estimate_fusions, FusionConfidence, FusionEstimate, FusionReport, FUSION_ASSUMPTION,
};

use std::collections::BTreeMap;

use acs_core::config::{MatrixConfig, MatrixMethod};
use acs_core::stats::{self, Standardizer};
use acs_core::types::{FeatureDictionary, FeatureValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::hierarchical::{label_count, relabel, Dendrogram, Linkage};
use crate::kmeans::KMeans;
use crate::metrics::{davies_bouldin_score, metrics_defined, silhouette_score};

// ============================================================================
// Columns
// ============================================================================

pub const MATRIX_NUMERIC_COLUMNS: [&str; 11] = [
    "length",
    "width",
    "thickness",
    "tallone_larghezza",
    "tallone_spessore",
    "incavo_larghezza",
    "incavo_profondita",
    "tagliente_larghezza",
    "peso",
    "margini_rialzati_lunghezza",
    "larghezza_minima",
];

/// Encoded as 0/1 after the numeric columns.
pub const MATRIX_FLAG_COLUMNS: [&str; 3] = [
    "incavo_presente",
    "margini_rialzati_presenti",
    "tagliente_espanso",
];

fn matrix_columns() -> impl Iterator<Item = &'static str> {
    MATRIX_NUMERIC_COLUMNS
        .into_iter()
        .chain(MATRIX_FLAG_COLUMNS)
}

/// `MAT_A` .. `MAT_Z`, then `MAT_AA`, `MAT_AB`, ...
pub fn matrix_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    let suffix: String = letters.into_iter().rev().collect();
    format!("MAT_{suffix}")
}

// ============================================================================
// Options and results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerState {
    Unclustered,
    Clustering,
    Characterizing,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringMethod {
    SingleSample,
    TwoSampleHeuristic,
    Hierarchical,
    Kmeans,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixOptions {
    pub method: MatrixMethod,
    /// Fixed cluster count; `None` selects by silhouette
    pub n_clusters: Option<usize>,
    pub max_clusters: usize,
    /// Dendrogram cut height; overrides `n_clusters` for hierarchical runs
    pub distance_threshold: Option<f64>,
    pub bivalve_cv_threshold: f64,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self::from(&MatrixConfig::default())
    }
}

impl From<&MatrixConfig> for MatrixOptions {
    fn from(config: &MatrixConfig) -> Self {
        Self {
            method: config.method,
            n_clusters: None,
            max_clusters: config.max_clusters,
            distance_threshold: None,
            bivalve_cv_threshold: config.bivalve_cv_threshold,
        }
    }
}

impl MatrixOptions {
    #[must_use]
    pub fn with_method(mut self, method: MatrixMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = Some(n_clusters);
        self
    }

    #[must_use]
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = Some(threshold);
        self
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.n_clusters == Some(0) {
            return Err(ClusterError::invalid_parameter("n_clusters must be >= 1"));
        }
        if let Some(t) = self.distance_threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(ClusterError::invalid_parameter(format!(
                    "distance_threshold must be finite and >= 0, got {t}"
                )));
            }
        }
        if !self.bivalve_cv_threshold.is_finite() || self.bivalve_cv_threshold <= 0.0 {
            return Err(ClusterError::invalid_parameter(
                "bivalve_cv_threshold must be > 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixIdentification {
    pub n_matrices: usize,
    pub method_used: ClusteringMethod,
    pub silhouette_score: Option<f64>,
    pub davies_bouldin_score: Option<f64>,
    pub matrices: Vec<MatrixCharacteristics>,
    /// Artifact ID -> matrix ID
    pub labels: BTreeMap<String, String>,
}

impl MatrixIdentification {
    pub fn matrix(&self, matrix_id: &str) -> Option<&MatrixCharacteristics> {
        self.matrices.iter().find(|m| m.matrix_id == matrix_id)
    }

    pub fn matrix_of(&self, artifact_id: &str) -> Option<&str> {
        self.labels.get(artifact_id).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixAssignment {
    pub artifact_id: String,
    pub inventory_number: String,
    pub matrix_id: String,
    /// Euclidean distance to the matrix centroid in standardized space
    pub distance_from_center: f64,
    /// `1 / (1 + d / Σσ)`; `None` when every column is constant
    pub assignment_confidence: Option<f64>,
}

// ============================================================================
// Analyzer
// ============================================================================

#[derive(Debug)]
pub struct MatrixAnalyzer {
    /// Sorted by artifact ID
    records: Vec<(String, FeatureDictionary)>,
    state: AnalyzerState,
    standardized: Vec<Vec<f64>>,
    labels: Vec<usize>,
    identification: Option<MatrixIdentification>,
}

impl MatrixAnalyzer {
    /// Records without an `id`/`artifact_id` label are named `artifact_<i>`
    /// after their input position.
    pub fn new(records: impl IntoIterator<Item = FeatureDictionary>) -> Self {
        let mut records: Vec<(String, FeatureDictionary)> = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let id = r
                    .artifact_id()
                    .map_or_else(|| format!("artifact_{i}"), str::to_string);
                (id, r)
            })
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        info!(artifacts = records.len(), "matrix analyzer initialized");

        Self {
            records,
            state: AnalyzerState::Unclustered,
            standardized: Vec::new(),
            labels: Vec::new(),
            identification: None,
        }
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identification(&self) -> Option<&MatrixIdentification> {
        self.identification.as_ref()
    }

    /// Standardized rows over [`MATRIX_NUMERIC_COLUMNS`] then
    /// [`MATRIX_FLAG_COLUMNS`], in artifact-ID order.
    pub fn prepare_matrix(&self) -> ClusterResult<Vec<Vec<f64>>> {
        if self.records.is_empty() {
            return Err(ClusterError::insufficient_samples(1, 0));
        }

        let missing: Vec<String> = matrix_columns()
            .filter(|col| self.records.iter().all(|(_, r)| r.lookup(col).is_none()))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "required matrix columns absent from every record");
            return Err(ClusterError::MissingFeatures { missing });
        }

        let raw: Vec<Vec<f64>> = self
            .records
            .iter()
            .map(|(_, r)| {
                matrix_columns()
                    .map(|col| r.lookup(col).and_then(FeatureValue::as_numeric).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        let scaler = Standardizer::fit(&raw)
            .ok_or_else(|| ClusterError::degenerate("feature matrix could not be standardized"))?;
        debug!(rows = raw.len(), cols = raw[0].len(), "matrix feature table prepared");
        Ok(scaler.transform(&raw))
    }

    /// Cluster, characterize and score the corpus. Any failure returns the
    /// analyzer to [`AnalyzerState::Unclustered`].
    pub fn identify_matrices(&mut self, options: &MatrixOptions) -> ClusterResult<MatrixIdentification> {
        self.state = AnalyzerState::Clustering;
        self.identification = None;

        match self.run(options) {
            Ok(identification) => {
                self.state = AnalyzerState::Ready;
                self.identification = Some(identification.clone());
                Ok(identification)
            }
            Err(e) => {
                warn!(error = %e, "matrix identification failed");
                self.state = AnalyzerState::Unclustered;
                self.standardized.clear();
                self.labels.clear();
                Err(e)
            }
        }
    }

    fn run(&mut self, options: &MatrixOptions) -> ClusterResult<MatrixIdentification> {
        options.validate()?;
        let x = self.prepare_matrix()?;
        let n = x.len();

        let (raw_labels, method_used) = match n {
            1 => {
                warn!("single artifact, assigned to one matrix without clustering");
                (vec![0], ClusteringMethod::SingleSample)
            }
            2 => (two_sample_labels(&x), ClusteringMethod::TwoSampleHeuristic),
            _ => cluster(&x, options)?,
        };
        let labels = relabel(&raw_labels);
        let n_matrices = label_count(&labels);

        self.state = AnalyzerState::Characterizing;
        let matrices: Vec<MatrixCharacteristics> = (0..n_matrices)
            .map(|label| {
                let members: Vec<(&str, &FeatureDictionary)> = self
                    .records
                    .iter()
                    .zip(&labels)
                    .filter(|(_, l)| **l == label)
                    .map(|((id, r), _)| (id.as_str(), r))
                    .collect();
                characterize::characterize(matrix_label(label), &members, options.bivalve_cv_threshold)
            })
            .collect();

        let (silhouette, davies_bouldin) = if metrics_defined(&labels) {
            (silhouette_score(&x, &labels), davies_bouldin_score(&x, &labels))
        } else {
            (None, None)
        };
        info!(
            n_matrices,
            method = ?method_used,
            silhouette = ?silhouette,
            davies_bouldin = ?davies_bouldin,
            "matrices identified"
        );

        let assignment: BTreeMap<String, String> = self
            .records
            .iter()
            .zip(&labels)
            .map(|((id, _), l)| (id.clone(), matrix_label(*l)))
            .collect();

        self.standardized = x;
        self.labels = labels;

        Ok(MatrixIdentification {
            n_matrices,
            method_used,
            silhouette_score: silhouette,
            davies_bouldin_score: davies_bouldin,
            matrices,
            labels: assignment,
        })
    }

    /// Per-artifact matrix, distance to the matrix centroid and confidence.
    pub fn matrix_assignments(&self) -> ClusterResult<Vec<MatrixAssignment>> {
        if self.state != AnalyzerState::Ready {
            return Err(ClusterError::invalid_state(
                "identify_matrices must complete before assignments are available",
            ));
        }

        let n_cols = self.standardized.first().map_or(0, Vec::len);
        let centroids: Vec<Vec<f64>> = (0..label_count(&self.labels))
            .map(|label| {
                let members: Vec<&Vec<f64>> = self
                    .standardized
                    .iter()
                    .zip(&self.labels)
                    .filter(|(_, l)| **l == label)
                    .map(|(row, _)| row)
                    .collect();
                (0..n_cols)
                    .map(|j| {
                        let col: Vec<f64> = members.iter().map(|row| row[j]).collect();
                        stats::mean(&col).unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect();

        let sigma_sum: f64 = (0..n_cols)
            .map(|j| {
                let col: Vec<f64> = self.standardized.iter().map(|row| row[j]).collect();
                stats::population_std(&col).unwrap_or(0.0)
            })
            .sum();

        Ok(self
            .records
            .iter()
            .zip(&self.standardized)
            .zip(&self.labels)
            .map(|(((id, record), row), label)| {
                let distance = stats::euclidean(row, &centroids[*label]);
                MatrixAssignment {
                    artifact_id: id.clone(),
                    inventory_number: record
                        .lookup("inventory_number")
                        .and_then(FeatureValue::as_label)
                        .unwrap_or(id)
                        .to_string(),
                    matrix_id: matrix_label(*label),
                    distance_from_center: distance,
                    assignment_confidence: (sigma_sum > 0.0)
                        .then(|| 1.0 / (1.0 + distance / sigma_sum)),
                }
            })
            .collect())
    }

    /// [`estimate_fusions`] over the current identification.
    pub fn estimate_fusions(&self, variance_threshold: f64) -> ClusterResult<FusionReport> {
        self.identification
            .as_ref()
            .map(|identification| estimate_fusions(identification, variance_threshold))
            .ok_or_else(|| {
                ClusterError::invalid_state("identify_matrices must complete before fusion estimates")
            })
    }
}

// ============================================================================
// Clustering strategies
// ============================================================================

fn two_sample_labels(x: &[Vec<f64>]) -> Vec<usize> {
    let distance = stats::euclidean(&x[0], &x[1]);
    let entries: Vec<f64> = x.iter().flatten().copied().collect();
    let threshold = 2.0 * stats::population_std(&entries).unwrap_or(0.0);
    if distance < threshold {
        info!(distance, threshold, "two artifacts assigned to the same matrix");
        vec![0, 0]
    } else {
        info!(distance, threshold, "two artifacts assigned to separate matrices");
        vec![0, 1]
    }
}

fn cluster(x: &[Vec<f64>], options: &MatrixOptions) -> ClusterResult<(Vec<usize>, ClusteringMethod)> {
    match options.method {
        MatrixMethod::Hierarchical => {
            let dendrogram = Dendrogram::build(x, Linkage::Ward)?;
            let labels = if let Some(threshold) = options.distance_threshold {
                dendrogram.cut_distance(threshold)?
            } else {
                let k = match options.n_clusters {
                    Some(k) => k,
                    None => optimal_k(x, options.max_clusters, |k| dendrogram.cut_k(k))?,
                };
                dendrogram.cut_k(k)?
            };
            Ok((labels, ClusteringMethod::Hierarchical))
        }
        MatrixMethod::Kmeans => {
            if options.distance_threshold.is_some() {
                warn!("distance_threshold ignored by k-means");
            }
            let k = match options.n_clusters {
                Some(k) => k,
                None => optimal_k(x, options.max_clusters, |k| {
                    KMeans::new(k).fit(x).map(|fit| fit.labels)
                })?,
            };
            let fit = KMeans::new(k).fit(x)?;
            Ok((fit.labels, ClusteringMethod::Kmeans))
        }
    }
}

/// Silhouette-maximising cluster count; the first maximum wins and an
/// undefined score never does.
fn optimal_k<F>(x: &[Vec<f64>], max_clusters: usize, mut labels_for: F) -> ClusterResult<usize>
where
    F: FnMut(usize) -> ClusterResult<Vec<usize>>,
{
    let upper = max_clusters.min(x.len().saturating_sub(1));
    if upper < 2 {
        warn!(samples = x.len(), max_clusters, "too few samples for a silhouette sweep, using 1 cluster");
        return Ok(1);
    }

    let mut best_k = 2;
    let mut best_score = f64::NEG_INFINITY;
    for k in 2..=upper {
        let labels = labels_for(k)?;
        let score = silhouette_score(x, &labels);
        debug!(k, ?score, "silhouette sweep");
        let score = score.unwrap_or(f64::NEG_INFINITY);
        if score > best_score {
            best_k = k;
            best_score = score;
        }
    }
    info!(k = best_k, silhouette = best_score, "optimal cluster count selected");
    Ok(best_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use acs_core::types::SAVIGNANO_GROUP;

    fn axe(id: &str, length: f64, socket: bool) -> FeatureDictionary {
        let scale = length / 100.0;
        let sav: BTreeMap<String, FeatureValue> = [
            ("tallone_larghezza", FeatureValue::Number(20.0 * scale)),
            ("tallone_spessore", FeatureValue::Number(8.0 * scale)),
            ("incavo_presente", FeatureValue::Flag(socket)),
            ("incavo_larghezza", FeatureValue::Number(if socket { 10.0 } else { 0.0 })),
            ("incavo_profondita", FeatureValue::Number(if socket { 3.0 } else { 0.0 })),
            ("incavo_profilo", FeatureValue::from(if socket { "circolare" } else { "assente" })),
            ("margini_rialzati_presenti", FeatureValue::Flag(true)),
            ("margini_rialzati_lunghezza", FeatureValue::Number(60.0 * scale)),
            ("larghezza_minima", FeatureValue::Number(18.0 * scale)),
            ("tagliente_larghezza", FeatureValue::Number(45.0 * scale)),
            ("tagliente_espanso", FeatureValue::Flag(!socket)),
            ("peso", FeatureValue::Number(3.0 * length)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        FeatureDictionary::new()
            .with("id", id)
            .with("length", length)
            .with("width", 0.4 * length)
            .with("thickness", 0.1 * length)
            .with(SAVIGNANO_GROUP, FeatureValue::Group(sav))
    }

    fn two_molds() -> Vec<FeatureDictionary> {
        vec![
            axe("A1", 100.0, true),
            axe("B1", 150.0, false),
            axe("A2", 101.0, true),
            axe("B2", 151.5, false),
            axe("A3", 99.5, true),
            axe("B3", 149.0, false),
        ]
    }

    #[test]
    fn test_matrix_labels() {
        assert_eq!(matrix_label(0), "MAT_A");
        assert_eq!(matrix_label(25), "MAT_Z");
        assert_eq!(matrix_label(26), "MAT_AA");
        assert_eq!(matrix_label(27), "MAT_AB");
        assert_eq!(matrix_label(26 + 26 * 26), "MAT_AAA");
        println!("[PASS] test_matrix_labels");
    }

    #[test]
    fn test_silhouette_selects_two_molds() {
        let mut analyzer = MatrixAnalyzer::new(two_molds());
        let result = analyzer.identify_matrices(&MatrixOptions::default()).unwrap();

        assert_eq!(result.n_matrices, 2);
        assert_eq!(result.method_used, ClusteringMethod::Hierarchical);
        assert_eq!(analyzer.state(), AnalyzerState::Ready);
        // A1 sorts first, so its group is MAT_A.
        for id in ["A1", "A2", "A3"] {
            assert_eq!(result.matrix_of(id), Some("MAT_A"));
        }
        for id in ["B1", "B2", "B3"] {
            assert_eq!(result.matrix_of(id), Some("MAT_B"));
        }
        assert!(result.silhouette_score.unwrap() > 0.8);
        assert!(result.davies_bouldin_score.unwrap() < 0.2);

        let mat_a = result.matrix("MAT_A").unwrap();
        assert!(mat_a.has_socket);
        assert_eq!(mat_a.mold_type, MoldType::Bivalve);
        let mat_b = result.matrix("MAT_B").unwrap();
        assert!(!mat_b.has_socket);
        assert_eq!(mat_b.avg_socket_width, 0.0);
        println!("[PASS] test_silhouette_selects_two_molds");
    }

    #[test]
    fn test_kmeans_agrees_with_hierarchical() {
        let mut analyzer = MatrixAnalyzer::new(two_molds());
        let options = MatrixOptions::default().with_method(MatrixMethod::Kmeans);
        let result = analyzer.identify_matrices(&options).unwrap();
        assert_eq!(result.method_used, ClusteringMethod::Kmeans);
        assert_eq!(result.n_matrices, 2);
        assert_eq!(result.matrix_of("A2"), result.matrix_of("A3"));
        assert_ne!(result.matrix_of("A1"), result.matrix_of("B1"));
    }

    #[test]
    fn test_fixed_count_and_threshold() {
        let mut analyzer = MatrixAnalyzer::new(two_molds());
        let three = analyzer
            .identify_matrices(&MatrixOptions::default().with_n_clusters(3))
            .unwrap();
        assert_eq!(three.n_matrices, 3);

        let one = analyzer
            .identify_matrices(&MatrixOptions::default().with_distance_threshold(1e6))
            .unwrap();
        assert_eq!(one.n_matrices, 1);
        assert_eq!(one.silhouette_score, None);
    }

    #[test]
    fn test_two_samples_use_distance_heuristic() {
        let mut analyzer = MatrixAnalyzer::new(vec![axe("A", 100.0, true), axe("B", 150.0, false)]);
        let result = analyzer.identify_matrices(&MatrixOptions::default()).unwrap();
        assert_eq!(result.method_used, ClusteringMethod::TwoSampleHeuristic);
        assert_eq!(result.n_matrices, 2);
        assert_eq!(result.silhouette_score, None);
        assert_eq!(result.davies_bouldin_score, None);
    }

    #[test]
    fn test_missing_columns_reported_in_order() {
        let record = FeatureDictionary::new().with("id", "X").with("length", 100.0);
        let mut analyzer = MatrixAnalyzer::new(vec![record]);
        let err = analyzer.identify_matrices(&MatrixOptions::default()).unwrap_err();
        match err {
            ClusterError::MissingFeatures { missing } => {
                assert_eq!(missing.len(), 13);
                assert_eq!(missing[0], "width");
                assert_eq!(missing[12], "tagliente_espanso");
            }
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
        assert_eq!(analyzer.state(), AnalyzerState::Unclustered);
        assert!(analyzer.identification().is_none());
    }

    #[test]
    fn test_empty_corpus() {
        let mut analyzer = MatrixAnalyzer::new(Vec::new());
        assert!(matches!(
            analyzer.identify_matrices(&MatrixOptions::default()),
            Err(ClusterError::InsufficientSamples { required: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_assignments_require_identification() {
        let mut analyzer = MatrixAnalyzer::new(two_molds());
        assert!(matches!(
            analyzer.matrix_assignments(),
            Err(ClusterError::InvalidState(_))
        ));
        assert!(analyzer.estimate_fusions(0.02).is_err());

        analyzer.identify_matrices(&MatrixOptions::default()).unwrap();
        let assignments = analyzer.matrix_assignments().unwrap();
        assert_eq!(assignments.len(), 6);
        for a in &assignments {
            let confidence = a.assignment_confidence.unwrap();
            assert!(confidence > 0.0 && confidence <= 1.0);
            assert_eq!(a.inventory_number, a.artifact_id);
        }
        println!("[PASS] test_assignments_require_identification");
    }

    #[test]
    fn test_invalid_options() {
        let mut analyzer = MatrixAnalyzer::new(two_molds());
        assert!(analyzer
            .identify_matrices(&MatrixOptions::default().with_n_clusters(0))
            .is_err());
        assert!(analyzer
            .identify_matrices(&MatrixOptions::default().with_distance_threshold(-1.0))
            .is_err());
        assert!(analyzer
            .identify_matrices(&MatrixOptions::default().with_n_clusters(7))
            .is_err());
        assert_eq!(analyzer.state(), AnalyzerState::Unclustered);
    }
}
