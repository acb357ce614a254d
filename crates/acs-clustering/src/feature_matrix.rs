//! Fixed-column numeric matrix over a corpus of flattened feature maps.
//!
//! Columns are the sorted union of every artifact's feature names; rows
//! are ordered by artifact ID. A feature an artifact lacks is 0.0. The
//! `schema_hash` identifies the column set so stored vectors can be
//! versioned with their column semantics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    ids: Vec<String>,
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
    schema_hash: String,
}

impl FeatureMatrix {
    /// Build from `id -> (feature -> value)`.
    pub fn from_corpus(corpus: &BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        let names: BTreeSet<&String> = corpus.values().flat_map(|f| f.keys()).collect();
        let feature_names: Vec<String> = names.into_iter().cloned().collect();
        let rows = corpus
            .values()
            .map(|f| {
                feature_names
                    .iter()
                    .map(|name| f.get(name).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Self {
            ids: corpus.keys().cloned().collect(),
            schema_hash: schema_hash(&feature_names),
            feature_names,
            rows,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Row index of `id`.
    pub fn index_of(&self, id: &str) -> ClusterResult<usize> {
        self.ids
            .binary_search_by(|probe| probe.as_str().cmp(id))
            .map_err(|_| ClusterError::UnknownArtifact(id.to_string()))
    }

    pub fn row(&self, id: &str) -> ClusterResult<&[f64]> {
        Ok(&self.rows[self.index_of(id)?])
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }
}

/// First 16 hex chars of SHA-256 over the newline-joined column names.
pub fn schema_hash(feature_names: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in feature_names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}
