//! Error types for corpus-level analysis.
//!
//! Every variant is an expected, recoverable condition. Callers are meant
//! to match on them and fall back (skip clustering, report an absent
//! metric) rather than abort a pipeline.

use thiserror::Error;

/// Errors from feature-matrix construction, clustering and alignment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// Not enough artifacts for the requested operation.
    ///
    /// # When This Occurs
    ///
    /// - PCA, similarity or hierarchical clustering on fewer than 2 artifacts
    /// - DBSCAN on fewer artifacts than `min_samples`
    /// - Matrix identification on an empty corpus
    #[error("Insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples {
        /// Minimum artifact count for the operation
        required: usize,
        /// Artifact count provided
        actual: usize,
    },

    /// Required columns are absent from every artifact in the corpus.
    ///
    /// # When This Occurs
    ///
    /// - Matrix identification on dictionaries from a failed extraction
    #[error("Missing required features: {}", missing.join(", "))]
    MissingFeatures {
        /// Names of the absent columns, in column order
        missing: Vec<String>,
    },

    /// Vectors or matrices do not share a shape.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A caller-supplied parameter is out of range.
    ///
    /// # When This Occurs
    ///
    /// - `n_clusters` of 0 or greater than the artifact count
    /// - Non-positive `eps`, or `min_samples` of 0
    /// - Explained-variance target outside (0, 1]
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An artifact ID is not in the corpus.
    #[error("Unknown artifact: {0}")]
    UnknownArtifact(String),

    /// Input has no spread to analyse (e.g. all vectors identical).
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Operation called in the wrong analyzer state.
    ///
    /// # When This Occurs
    ///
    /// - Requesting matrix assignments before `identify_matrices`
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ClusterError {
    pub fn insufficient_samples(required: usize, actual: usize) -> Self {
        Self::InsufficientSamples { required, actual }
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_lists_columns() {
        let err = ClusterError::MissingFeatures {
            missing: vec!["peso".into(), "length".into()],
        };
        assert_eq!(err.to_string(), "Missing required features: peso, length");
    }

    #[test]
    fn test_constructors() {
        assert_eq!(
            ClusterError::insufficient_samples(2, 1),
            ClusterError::InsufficientSamples {
                required: 2,
                actual: 1
            }
        );
        assert!(ClusterError::invalid_parameter("eps must be > 0")
            .to_string()
            .contains("eps"));
        println!("[PASS] test_constructors");
    }
}
