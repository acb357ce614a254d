//! Pairwise distances and `1 / (1 + d)` similarity.

use std::fmt;
use std::str::FromStr;

use acs_core::stats;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Cosine,
    Manhattan,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    ///
    /// Cosine distance is undefined when either vector is all zeros.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Option<f64> {
        if a.len() != b.len() {
            return None;
        }
        match self {
            Self::Euclidean => Some(stats::euclidean(a, b)),
            Self::Manhattan => Some(a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                (na > 0.0 && nb > 0.0).then(|| 1.0 - dot / (na * nb))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
            Self::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            "manhattan" | "cityblock" => Ok(Self::Manhattan),
            other => Err(ClusterError::invalid_parameter(format!(
                "unknown distance metric '{other}'"
            ))),
        }
    }
}

pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Square distance and similarity matrices over a corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    pub artifact_ids: Vec<String>,
    pub metric: DistanceMetric,
    /// `None` where the distance is undefined
    pub distances: Vec<Vec<Option<f64>>>,
    pub similarities: Vec<Vec<Option<f64>>>,
}

impl SimilarityMatrix {
    pub fn compute(artifact_ids: &[String], rows: &[Vec<f64>], metric: DistanceMetric) -> Self {
        let distances: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|a| rows.iter().map(|b| metric.distance(a, b)).collect())
            .collect();
        let similarities = distances
            .iter()
            .map(|row| row.iter().map(|d| d.map(similarity_from_distance)).collect())
            .collect();
        Self {
            artifact_ids: artifact_ids.to_vec(),
            metric,
            distances,
            similarities,
        }
    }

    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.artifact_ids.iter().position(|id| id == a)?;
        let j = self.artifact_ids.iter().position(|id| id == b)?;
        self.similarities[i][j]
    }
}
