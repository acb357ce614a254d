//! Error types for acs-core.
//!
//! This module defines the central error type [`CoreError`] used throughout
//! the acs-core crate, along with the [`CoreResult<T>`] type alias.
//!
//! # Examples
//!
//! ```rust
//! use acs_core::CoreError;
//!
//! fn require_vertices(count: usize) -> Result<(), CoreError> {
//!     if count < 4 {
//!         return Err(CoreError::InvalidMesh(format!("{count} vertices")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_vertices(3).is_err());
//! ```

use thiserror::Error;

/// Top-level error type for acs-core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A mesh failed structural validation.
    ///
    /// # When This Occurs
    ///
    /// - Fewer than 4 vertices
    /// - NaN or Infinity in a vertex coordinate
    /// - A face index pointing past the vertex buffer
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// A feature record violated the ingestion schema.
    ///
    /// # When This Occurs
    ///
    /// - A `null` or array value in a persisted feature record
    /// - A non-finite number
    /// - A record whose root is not a JSON object
    #[error("Schema violation at '{key}': {message}")]
    SchemaViolation {
        /// Dotted path of the offending key
        key: String,
        /// Description of the violation
        message: String,
    },

    /// Configuration is invalid or missing.
    ///
    /// # When This Occurs
    ///
    /// - Unreadable or malformed configuration file
    /// - Threshold outside its allowed range
    /// - Environment variable parsing failure
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CoreError {
    /// Create a schema violation for `key`.
    pub fn schema(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_display() {
        let err = CoreError::schema("savignano.peso", "null is not a feature value");
        let msg = err.to_string();
        assert!(msg.contains("savignano.peso"));
        assert!(msg.contains("null"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: CoreError = parse.unwrap_err().into();
        assert!(matches!(err, CoreError::SerializationError(_)));
    }
}
