//! Casting-event (fusion) estimates over a completed identification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::MatrixIdentification;

/// Assumption under which every fusion count is produced.
pub const FUSION_ASSUMPTION: &str = "each artifact is treated as one distinct casting event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FusionConfidence {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionEstimate {
    pub matrix_id: String,
    pub estimated_fusions: usize,
    pub artifacts: Vec<String>,
    pub inventory_numbers: Vec<String>,
    pub confidence: FusionConfidence,
    pub weight_cv: Option<f64>,
    pub length_cv: Option<f64>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    pub per_matrix: BTreeMap<String, FusionEstimate>,
    pub total_fusions: usize,
    pub assumption: String,
}

/// Fusion count per matrix equals its member count. Confidence is `High`
/// when the weight CV is below `variance_threshold`, otherwise (or when
/// the CV is undefined) `Medium`.
pub fn estimate_fusions(identification: &MatrixIdentification, variance_threshold: f64) -> FusionReport {
    let per_matrix: BTreeMap<String, FusionEstimate> = identification
        .matrices
        .iter()
        .map(|m| {
            let confidence = match m.weight_cv {
                Some(cv) if cv < variance_threshold => FusionConfidence::High,
                _ => FusionConfidence::Medium,
            };
            let low_variability = matches!(m.weight_cv, Some(w) if w < variance_threshold)
                && matches!(m.length_cv, Some(l) if l < variance_threshold);
            if low_variability {
                info!(matrix_id = %m.matrix_id, "low variability, members may share a casting");
            }

            let fmt_cv = |cv: Option<f64>| cv.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
            let estimate = FusionEstimate {
                matrix_id: m.matrix_id.clone(),
                estimated_fusions: m.artifacts_count,
                artifacts: m.artifact_ids.clone(),
                inventory_numbers: m.inventory_numbers.clone(),
                confidence,
                weight_cv: m.weight_cv,
                length_cv: m.length_cv,
                notes: format!(
                    "weight CV={}, length CV={}; {FUSION_ASSUMPTION}",
                    fmt_cv(m.weight_cv),
                    fmt_cv(m.length_cv)
                ),
            };
            (m.matrix_id.clone(), estimate)
        })
        .collect();

    let total_fusions = per_matrix.values().map(|e| e.estimated_fusions).sum();
    info!(total_fusions, matrices = per_matrix.len(), "fusion estimates computed");

    FusionReport {
        per_matrix,
        total_fusions,
        assumption: FUSION_ASSUMPTION.to_string(),
    }
}
