//! Error types for mesh loading and extraction.

use std::path::PathBuf;

use acs_core::CoreError;
use thiserror::Error;

/// Errors raised before extraction starts.
///
/// Extraction itself never fails on a structurally valid mesh: sparse
/// regions produce documented defaults instead.
#[derive(Debug, Error)]
pub enum MorphometryError {
    /// Structural validation failed (too few vertices, bad indices, NaN).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed mesh file content.
    #[error("Parse error in {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// Scale factor is zero, negative or not finite.
    #[error("Invalid scale factor: {0}")]
    InvalidScale(f64),

    #[error("Unknown mesh units '{0}' (expected mm, cm, m or in)")]
    UnknownUnits(String),

    /// Every mesh in a batch failed.
    #[error("Feature extraction failed for all {attempted} meshes")]
    BatchFailed { attempted: usize },
}

pub type MorphometryResult<T> = Result<T, MorphometryError>;
