//! Corpus-level morphometric analysis.
//!
//! [`MorphometricAnalyzer`] collects flattened feature dictionaries and
//! exposes PCA (with projection of new artifacts), hierarchical and density clustering, similarity search,
//! Procrustes alignment and per-feature statistics over them, plus
//! elliptic Fourier descriptors of single outlines. Every
//! operation works on the same [`FeatureMatrix`], built lazily and cached
//! until the corpus changes.
//!
//! # Example
//!
//! ```
//! use acs_clustering::{Linkage, MorphometricAnalyzer};
//! use acs_core::types::FeatureDictionary;
//!
//! let mut analyzer = MorphometricAnalyzer::new();
//! for (id, length) in [("A", 100.0), ("B", 102.0), ("C", 150.0), ("D", 151.0)] {
//!     analyzer.add_features(id, &FeatureDictionary::new().with("length", length));
//! }
//! let clusters = analyzer.hierarchical_clustering(Some(2), None, Linkage::Ward).unwrap();
//! assert_eq!(clusters.n_clusters, 2);
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use acs_core::stats::{self, Standardizer};
use acs_core::types::FeatureDictionary;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dbscan::{dbscan, DbscanParams};
use crate::efa::{elliptic_fourier_descriptors, EllipticHarmonic};
use crate::error::{ClusterError, ClusterResult};
use crate::feature_matrix::FeatureMatrix;
use crate::hierarchical::{label_count, Dendrogram, Linkage};
use crate::pca::{fit_pca, PcaResult};
use crate::procrustes::{landmarks, procrustes};
use crate::similarity::{similarity_from_distance, DistanceMetric, SimilarityMatrix};

pub const DISTINGUISHING_FEATURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviation {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinguishingFeature {
    pub name: String,
    pub cluster_mean: f64,
    pub overall_mean: f64,
    pub z_score: f64,
    pub direction: Deviation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub label: usize,
    pub members: Vec<String>,
    pub size: usize,
    pub distinguishing_features: Vec<DistinguishingFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalResult {
    pub n_clusters: usize,
    pub linkage: Linkage,
    pub clusters: Vec<ClusterSummary>,
    pub labels: BTreeMap<String, usize>,
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanResult {
    pub n_clusters: usize,
    pub clusters: Vec<Vec<String>>,
    pub noise: Vec<String>,
    /// `None` marks noise
    pub labels: BTreeMap<String, Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcrustesResult {
    pub artifact_ids: Vec<String>,
    /// Reference first, then each aligned configuration
    pub aligned: Vec<Vec<Vec<f64>>>,
    /// Disparity of each non-reference artifact against the reference
    pub disparities: Vec<f64>,
    pub mean_disparity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub n_artifacts: usize,
    pub n_features: usize,
    pub features: BTreeMap<String, FeatureSummary>,
}

#[derive(Debug, Default)]
pub struct MorphometricAnalyzer {
    corpus: BTreeMap<String, BTreeMap<String, f64>>,
    matrix: OnceLock<FeatureMatrix>,
    pca: Option<PcaResult>,
}

impl MorphometricAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an artifact. Only numeric (and flag) values are kept;
    /// the `savignano` group is flattened under a `sav_` prefix.
    pub fn add_features(&mut self, artifact_id: impl Into<String>, features: &FeatureDictionary) {
        let artifact_id = artifact_id.into();
        let flat = features.flatten_numeric();
        debug!(artifact_id = %artifact_id, n_features = flat.len(), "artifact added to corpus");
        self.corpus.insert(artifact_id, flat);
        self.matrix = OnceLock::new();
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn feature_matrix(&self) -> &FeatureMatrix {
        self.matrix
            .get_or_init(|| FeatureMatrix::from_corpus(&self.corpus))
    }

    fn require(&self, required: usize) -> ClusterResult<&FeatureMatrix> {
        if self.corpus.len() < required {
            return Err(ClusterError::insufficient_samples(required, self.corpus.len()));
        }
        Ok(self.feature_matrix())
    }

    /// Standardized rows of the current matrix.
    fn standardized(&self, matrix: &FeatureMatrix) -> ClusterResult<Vec<Vec<f64>>> {
        Standardizer::fit(matrix.rows())
            .map(|s| s.transform(matrix.rows()))
            .ok_or_else(|| ClusterError::insufficient_samples(1, 0))
    }

    /// Fit PCA over the current corpus and keep the model for
    /// [`transform_pca`](Self::transform_pca). Adding artifacts later does
    /// not refit it.
    pub fn fit_pca(
        &mut self,
        n_components: Option<usize>,
        explained_variance: f64,
    ) -> ClusterResult<PcaResult> {
        let matrix = self.require(2)?;
        let result = fit_pca(
            matrix.rows(),
            matrix.ids(),
            matrix.feature_names(),
            n_components,
            explained_variance,
        )?;
        info!(
            n_artifacts = matrix.n_samples(),
            n_components = result.n_components,
            "PCA completed"
        );
        self.pca = Some(result.clone());
        Ok(result)
    }

    /// Project artifacts into the fitted PCA space, one score row per
    /// object. Every feature the model was fitted on must be present.
    pub fn transform_pca(&self, objects: &[FeatureDictionary]) -> ClusterResult<Vec<Vec<f64>>> {
        let model = self
            .pca
            .as_ref()
            .ok_or_else(|| ClusterError::invalid_state("PCA model not fitted; call fit_pca first"))?;

        objects
            .iter()
            .map(|features| {
                let flat = features.flatten_numeric();
                let mut row = Vec::with_capacity(model.feature_names.len());
                let mut missing = Vec::new();
                for name in &model.feature_names {
                    match flat.get(name) {
                        Some(v) => row.push(*v),
                        None => missing.push(name.clone()),
                    }
                }
                if !missing.is_empty() {
                    return Err(ClusterError::MissingFeatures { missing });
                }
                model.project_row(&row)
            })
            .collect()
    }

    /// Hierarchical clustering cut either at `n_clusters` or at
    /// `distance_threshold` (exactly one must be given).
    pub fn hierarchical_clustering(
        &self,
        n_clusters: Option<usize>,
        distance_threshold: Option<f64>,
        linkage: Linkage,
    ) -> ClusterResult<HierarchicalResult> {
        let matrix = self.require(2)?;
        let rows = self.standardized(matrix)?;
        let dendrogram = Dendrogram::build(&rows, linkage)?;
        let labels = match (n_clusters, distance_threshold) {
            (Some(k), None) => dendrogram.cut_k(k)?,
            (None, Some(t)) => dendrogram.cut_distance(t)?,
            _ => {
                return Err(ClusterError::invalid_parameter(
                    "give exactly one of n_clusters or distance_threshold",
                ))
            }
        };

        let k = label_count(&labels);
        let clusters = (0..k)
            .map(|label| self.summarize_cluster(matrix, &labels, label))
            .collect();

        info!(n_clusters = k, ?linkage, "hierarchical clustering completed");
        Ok(HierarchicalResult {
            n_clusters: k,
            linkage,
            clusters,
            labels: matrix.ids().iter().cloned().zip(labels).collect(),
            feature_names: matrix.feature_names().to_vec(),
        })
    }

    /// Members plus the features whose cluster mean deviates most from the
    /// corpus mean, in corpus standard deviations.
    fn summarize_cluster(&self, matrix: &FeatureMatrix, labels: &[usize], label: usize) -> ClusterSummary {
        let member_rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
        let members: Vec<String> = member_rows.iter().map(|&i| matrix.ids()[i].clone()).collect();

        let mut features: Vec<DistinguishingFeature> = (0..matrix.n_features())
            .map(|j| {
                let column = matrix.column(j);
                let overall_mean = stats::mean(&column).unwrap_or(0.0);
                let overall_std = stats::population_std(&column).unwrap_or(0.0) + stats::EPSILON;
                let cluster_values: Vec<f64> = member_rows.iter().map(|&i| column[i]).collect();
                let cluster_mean = stats::mean(&cluster_values).unwrap_or(0.0);
                let z_score = (cluster_mean - overall_mean) / overall_std;
                DistinguishingFeature {
                    name: matrix.feature_names()[j].clone(),
                    cluster_mean,
                    overall_mean,
                    z_score,
                    direction: if z_score > 0.0 { Deviation::High } else { Deviation::Low },
                }
            })
            .collect();
        features.sort_by(|a, b| b.z_score.abs().total_cmp(&a.z_score.abs()));
        features.truncate(DISTINGUISHING_FEATURES);

        ClusterSummary {
            label,
            size: members.len(),
            members,
            distinguishing_features: features,
        }
    }

    pub fn dbscan_clustering(&self, params: &DbscanParams) -> ClusterResult<DbscanResult> {
        params.validate()?;
        let matrix = self.require(params.min_samples.max(2))?;
        let rows = self.standardized(matrix)?;
        let labels = dbscan(&rows, params)?;

        let n_clusters = labels.iter().flatten().max().map_or(0, |m| m + 1);
        let mut clusters = vec![Vec::new(); n_clusters];
        let mut noise = Vec::new();
        for (id, label) in matrix.ids().iter().zip(&labels) {
            match label {
                Some(c) => clusters[*c].push(id.clone()),
                None => noise.push(id.clone()),
            }
        }

        info!(n_clusters, noise = noise.len(), "DBSCAN completed");
        Ok(DbscanResult {
            n_clusters,
            clusters,
            noise,
            labels: matrix.ids().iter().cloned().zip(labels).collect(),
        })
    }

    pub fn compute_similarity_matrix(&self, metric: DistanceMetric) -> ClusterResult<SimilarityMatrix> {
        let matrix = self.require(2)?;
        let rows = self.standardized(matrix)?;
        Ok(SimilarityMatrix::compute(matrix.ids(), &rows, metric))
    }

    /// Top `k` artifacts by similarity to `query_id`, excluding itself.
    /// Artifacts with an undefined distance are left out.
    pub fn find_most_similar(
        &self,
        query_id: &str,
        k: usize,
        metric: DistanceMetric,
    ) -> ClusterResult<Vec<(String, f64)>> {
        let matrix = self.require(2)?;
        let rows = self.standardized(matrix)?;
        let q = matrix.index_of(query_id)?;

        let mut ranked: Vec<(String, f64)> = matrix
            .ids()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != q)
            .filter_map(|(i, id)| {
                metric
                    .distance(&rows[q], &rows[i])
                    .map(|d| (id.clone(), similarity_from_distance(d)))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Normalized elliptic Fourier descriptors of a closed 2D outline.
    pub fn elliptic_fourier_analysis(
        &self,
        contour: &[[f64; 2]],
        n_harmonics: usize,
    ) -> ClusterResult<Vec<EllipticHarmonic>> {
        elliptic_fourier_descriptors(contour, n_harmonics, true)
    }

    /// Align each artifact's feature vector, read as landmarks of
    /// `landmark_dims` coordinates, onto the first artifact's.
    pub fn procrustes_alignment(
        &self,
        artifact_ids: &[String],
        landmark_dims: usize,
    ) -> ClusterResult<ProcrustesResult> {
        if artifact_ids.len() < 2 {
            return Err(ClusterError::insufficient_samples(2, artifact_ids.len()));
        }
        let matrix = self.feature_matrix();
        let reference = landmarks(matrix.row(&artifact_ids[0])?, landmark_dims)?;

        let mut aligned = Vec::with_capacity(artifact_ids.len());
        let mut disparities = Vec::with_capacity(artifact_ids.len() - 1);
        for id in &artifact_ids[1..] {
            let fit = procrustes(&reference, &landmarks(matrix.row(id)?, landmark_dims)?)?;
            if aligned.is_empty() {
                aligned.push(fit.reference.clone());
            }
            aligned.push(fit.aligned);
            disparities.push(fit.disparity);
        }

        let mean_disparity = stats::mean(&disparities).unwrap_or(0.0);
        info!(n = artifact_ids.len(), mean_disparity, "Procrustes alignment completed");
        Ok(ProcrustesResult {
            artifact_ids: artifact_ids.to_vec(),
            aligned,
            disparities,
            mean_disparity,
        })
    }

    /// Per-feature summary over the raw (unstandardized) matrix.
    pub fn feature_statistics(&self) -> FeatureStatistics {
        let matrix = self.feature_matrix();
        let features = matrix
            .feature_names()
            .iter()
            .enumerate()
            .filter_map(|(j, name)| {
                let column = matrix.column(j);
                Some((
                    name.clone(),
                    FeatureSummary {
                        mean: stats::mean(&column)?,
                        std: stats::population_std(&column)?,
                        min: stats::min(&column)?,
                        max: stats::max(&column)?,
                        median: stats::median(&column)?,
                    },
                ))
            })
            .collect();
        FeatureStatistics {
            n_artifacts: matrix.n_samples(),
            n_features: matrix.n_features(),
            features,
        }
    }
}
