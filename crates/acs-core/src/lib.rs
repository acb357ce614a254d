//! Archaeological Classifier Core Library
//!
//! Shared domain types for the axe classification engine: the immutable
//! [`Mesh`](types::Mesh), the typed [`FeatureDictionary`](types::FeatureDictionary)
//! persisted for every artifact, the layered [`Config`], and the small set
//! of descriptive statistics every analysis stage relies on.
//!
//! # Architecture
//!
//! ```text
//! acs-core ──┬──> acs-morphometry (mesh -> features)
//!            ├──> acs-clustering  (features -> matrices, PCA, similarity)
//!            └──> acs-taxonomy    (features -> classes)
//! ```
//!
//! # Example
//!
//! ```
//! use acs_core::types::{FeatureDictionary, FeatureValue};
//!
//! let mut features = FeatureDictionary::new();
//! features.insert("length", FeatureValue::Number(142.5));
//! features.insert("incavo_presente", FeatureValue::Flag(true));
//! assert_eq!(features.number("length"), Some(142.5));
//! ```

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::Config;
pub use error::{CoreError, CoreResult};
