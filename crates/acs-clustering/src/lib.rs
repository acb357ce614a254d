//! Corpus analysis for archaeological feature records.
//!
//! Builds a [`FeatureMatrix`] from many artifacts' feature dictionaries
//! and runs the statistical machinery on top of it: PCA, agglomerative,
//! density and k-means clustering, similarity search, Procrustes
//! alignment, elliptic Fourier outline descriptors, and casting-matrix
//! identification.
//!
//! # Architecture
//!
//! - **feature_matrix**: sorted columns, ID-ordered rows, schema hash
//! - **hierarchical** / **dbscan** / **kmeans**: clustering substrates
//! - **metrics**: silhouette and Davies–Bouldin validity scores
//! - **pca** / **similarity** / **procrustes** / **efa**: shape-space tools
//! - **analyzer**: [`MorphometricAnalyzer`], the general corpus front-end
//! - **matrix**: [`MatrixAnalyzer`], casting-mold grouping and fusion estimates
//!
//! # Example
//!
//! ```
//! use acs_clustering::{dbscan, DbscanParams};
//!
//! let points = vec![vec![0.0], vec![0.1], vec![0.2], vec![5.0]];
//! let labels = dbscan(&points, &DbscanParams { eps: 0.5, min_samples: 2 }).unwrap();
//! assert_eq!(labels, vec![Some(0), Some(0), Some(0), None]);
//! ```

pub mod analyzer;
pub mod dbscan;
pub mod efa;
pub mod error;
pub mod feature_matrix;
pub mod hierarchical;
pub mod kmeans;
pub mod matrix;
pub mod metrics;
pub mod pca;
pub mod procrustes;
pub mod similarity;

pub use analyzer::{
    ClusterSummary, DbscanResult, Deviation, DistinguishingFeature, FeatureStatistics,
    FeatureSummary, HierarchicalResult, MorphometricAnalyzer, ProcrustesResult,
};
pub use dbscan::{dbscan, DbscanParams};
pub use efa::{elliptic_fourier_descriptors, EllipticHarmonic};
pub use error::{ClusterError, ClusterResult};
pub use feature_matrix::FeatureMatrix;
pub use hierarchical::{Dendrogram, Linkage};
pub use kmeans::{KMeans, KMeansFit};
pub use matrix::{
    estimate_fusions, matrix_label, AnalyzerState, ClusteringMethod, FusionConfidence,
    FusionEstimate, FusionReport, MatrixAnalyzer, MatrixAssignment, MatrixCharacteristics,
    MatrixIdentification, MatrixOptions, MoldType,
};
pub use metrics::{davies_bouldin_score, silhouette_score};
pub use pca::{ComponentInterpretation, PcaResult, PrincipalComponent};
pub use similarity::{DistanceMetric, SimilarityMatrix};
