//! Error types for taxonomy operations.
//!
//! Per-class classification outcomes (missing parameter, hard-gate
//! failure) are not errors: they come back as a
//! [`ClassificationFailure`](crate::class::ClassificationFailure) inside the
//! result. The variants here cover precondition violations on registry
//! mutation and corrupt or unreadable exports.

use std::path::PathBuf;

use acs_clustering::ClusterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// A class needs at least two reference objects.
    #[error("Need at least {required} reference objects, got {actual}")]
    InsufficientReferences { required: usize, actual: usize },

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Modification rejected because no justification was given.
    ///
    /// # When This Occurs
    ///
    /// - Empty or whitespace-only justification text
    #[error("A non-empty justification is required to modify a class")]
    InvalidJustification,

    /// Modification rejected because no operator was identified.
    ///
    /// # When This Occurs
    ///
    /// - Empty or whitespace-only operator name
    #[error("A non-empty operator identity is required to modify a class")]
    InvalidRole,

    /// A modification would leave every parameter as it is.
    ///
    /// # When This Occurs
    ///
    /// - Empty change set, or patches that only restate current values
    #[error("Modification of {0} changes no parameter")]
    NoEffectiveChange(String),

    /// A change names a parameter the class does not define.
    #[error("Class {class_id} has no parameter '{parameter}'")]
    UnknownParameter { class_id: String, parameter: String },

    /// A parameter or class field violates its invariant.
    ///
    /// # When This Occurs
    ///
    /// - `min_threshold <= value <= max_threshold` does not hold
    /// - Negative or non-finite weight or tolerance
    /// - Confidence threshold outside `[0, 1]`
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An imported class's stored hash disagrees with its parameters.
    #[error("Parameter hash mismatch for {class_id}: stored {stored}, computed {computed}")]
    HashMismatch {
        class_id: String,
        stored: String,
        computed: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Class discovery could not cluster the input.
    #[error(transparent)]
    Clustering(#[from] ClusterError),
}

impl TaxonomyError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

impl From<serde_json::Error> for TaxonomyError {
    fn from(err: serde_json::Error) -> Self {
        TaxonomyError::Serialization(err.to_string())
    }
}

pub type TaxonomyResult<T> = Result<T, TaxonomyError>;
