//! Domain types shared across the workspace.

mod features;
mod mesh;

pub use features::{FeatureDictionary, FeatureValue, ID_KEY, SAVIGNANO_GROUP};
pub use mesh::{Mesh, RawMesh, MIN_MESH_VERTICES};
