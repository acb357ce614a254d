//! Formal, versioned taxonomy of archaeological types.
//!
//! Classes are defined from reference groups (or discovered by density
//! clustering), scored against feature dictionaries through hard gates and
//! soft distances, revised only through justified, audited modifications,
//! and round-tripped through a hash-verified JSON export.
//!
//! # Architecture
//!
//! - **parameter**: [`ClassificationParameter`] and [`ParameterPatch`]
//! - **class**: immutable [`TaxonomicClass`], parameter hash, classification
//! - **history**: `CREATE_CLASS` / `MODIFY_CLASS` records and the classification log
//! - **system**: [`TaxonomySystem`], the single-writer registry
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use acs_core::types::FeatureDictionary;
//! use acs_taxonomy::TaxonomySystem;
//!
//! let system = TaxonomySystem::default();
//! let refs: Vec<FeatureDictionary> = [148.0, 150.0, 152.0]
//!     .iter()
//!     .map(|l| FeatureDictionary::new().with("length", *l).with("width", 50.0))
//!     .collect();
//! let class = system
//!     .define_class_from_reference_group("Flanged", &refs, &BTreeMap::new(), 0.15)
//!     .unwrap();
//!
//! let query = FeatureDictionary::new().with("length", 150.0).with("width", 50.0);
//! let best = &system.classify_object(&query)[0];
//! assert_eq!(best.class_id, class.class_id());
//! assert!(best.is_member);
//! ```

pub mod class;
pub mod error;
pub mod history;
pub mod parameter;
pub mod system;

pub use class::{
    parameter_hash, ClassDefinition, ClassificationFailure, ClassificationResult, Diagnostic,
    TaxonomicClass,
};
pub use error::{TaxonomyError, TaxonomyResult};
pub use history::{ClassificationLogEntry, HistoryRecord, ParameterChanges};
pub use parameter::{ClassificationParameter, ParameterPatch};
pub use system::{
    ClassStatus, ClassSummary, TaxonomyExport, TaxonomyStatistics, TaxonomyStore, TaxonomySystem,
};
