//! Mesh orientation and Savignano morphometric feature extraction.
//!
//! Turns a raw scan mesh into the flat, semantically named feature
//! dictionary consumed by the clustering and taxonomy crates.
//!
//! # Architecture
//!
//! ```text
//! Mesh ──> UnitScale (mesh units -> mm)
//!      ──> OrientationNormalizer (centroid origin, principal axes)
//!      ──> MorphometricExtractor
//!            ├── butt   (tallone + incavo)
//!            ├── edges  (margini rialzati)
//!            ├── body   (larghezza minima, spessore)
//!            └── blade  (tagliente)
//!      ──> SavignanoFeatures ──> FeatureDictionary
//! ```
//!
//! Axis convention after orientation: x = length (butt at +x, blade at -x),
//! y = width, z = thickness.
//!
//! # Example
//!
//! ```
//! use acs_core::config::ExtractionThresholds;
//! use acs_core::types::Mesh;
//! use acs_morphometry::{MorphometricExtractor, UnitScale};
//!
//! let mesh = Mesh::new(
//!     vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 40.0, 0.0], [0.0, 0.0, 10.0]],
//!     vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
//! )
//! .unwrap();
//! let thresholds = ExtractionThresholds::default();
//! let extractor =
//!     MorphometricExtractor::new(&mesh, "AX-1", UnitScale::Factor(1.0), &thresholds).unwrap();
//! let features = extractor.extract_all_features();
//! assert!(features.dimensions.length > features.dimensions.width);
//! ```

pub mod error;
pub mod extractor;
pub mod io;
pub mod orientation;
pub mod scale;

mod neighbors;

pub use error::{MorphometryError, MorphometryResult};
pub use extractor::{
    ArtifactMetadata, BladeFeatures, BladeShape, BodyFeatures, ButtFeatures, GeneralDimensions,
    MeshGeometry, MorphometricExtractor, RaisedEdgeFeatures, SavignanoFeatures, SocketFeatures,
    SocketProfile,
};
pub use io::{extract_directory, load_mesh, BatchFailure, BatchOutcome};
pub use orientation::{OrientationNormalizer, OrientedFrame, OrientedMesh};
pub use scale::{MeshUnits, UnitScale};
