//! Per-matrix statistics, modal features and mold-type inference.

use std::collections::BTreeMap;

use acs_core::stats;
use acs_core::types::{FeatureDictionary, FeatureValue, ID_KEY, SAVIGNANO_GROUP};
use serde::{Deserialize, Serialize};

/// Keys that identify a record rather than describe it.
const RECORD_KEYS: [&str; 3] = [ID_KEY, "artifact_id", "inventory_number"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoldType {
    Bivalve,
    MonovalveOrImpreciseBivalve,
}

impl MoldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bivalve => "bivalve",
            Self::MonovalveOrImpreciseBivalve => "monovalve_or_imprecise_bivalve",
        }
    }
}

/// Characterization of one casting matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCharacteristics {
    /// `MAT_A`, `MAT_B`, ...
    pub matrix_id: String,
    pub artifacts_count: usize,
    pub artifact_ids: Vec<String>,
    pub inventory_numbers: Vec<String>,
    /// Mean of every numeric dimension observed in at least one member
    pub means: BTreeMap<String, f64>,
    /// Sample std / (mean + 1e-6); `None` with fewer than 2 observations
    pub coefficients_of_variation: BTreeMap<String, Option<f64>>,
    /// Majority value of each flag; ties resolve to `false`
    pub modal_flags: BTreeMap<String, bool>,
    /// Most frequent value of each label; ties resolve to the smallest
    pub modal_labels: BTreeMap<String, String>,
    pub has_socket: bool,
    pub has_raised_edges: bool,
    /// Member mean, or 0 when no member has a socket
    pub avg_socket_width: f64,
    pub avg_socket_depth: f64,
    pub length_cv: Option<f64>,
    pub width_cv: Option<f64>,
    pub weight_cv: Option<f64>,
    pub mold_type: MoldType,
    pub description: String,
}

impl MatrixCharacteristics {
    pub fn mean(&self, key: &str) -> Option<f64> {
        self.means.get(key).copied()
    }
}

/// Top-level entries merged over the `savignano` group; top level wins.
fn merged(record: &FeatureDictionary) -> BTreeMap<&str, &FeatureValue> {
    let mut out: BTreeMap<&str, &FeatureValue> = BTreeMap::new();
    if let Some(group) = record.group(SAVIGNANO_GROUP) {
        out.extend(group.iter().map(|(k, v)| (k.as_str(), v)));
    }
    out.extend(
        record
            .iter()
            .filter(|(k, _)| k.as_str() != SAVIGNANO_GROUP)
            .map(|(k, v)| (k.as_str(), v)),
    );
    out.retain(|k, _| !RECORD_KEYS.contains(k));
    out
}

pub(crate) fn characterize(
    matrix_id: String,
    members: &[(&str, &FeatureDictionary)],
    bivalve_cv_threshold: f64,
) -> MatrixCharacteristics {
    let mut numbers: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut flags: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut labels: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for (_, record) in members {
        for (key, value) in merged(record) {
            match value {
                FeatureValue::Number(n) => numbers.entry(key.to_string()).or_default().push(*n),
                FeatureValue::Flag(b) => {
                    let entry = flags.entry(key.to_string()).or_default();
                    if *b {
                        entry.0 += 1;
                    } else {
                        entry.1 += 1;
                    }
                }
                FeatureValue::Label(s) => {
                    *labels
                        .entry(key.to_string())
                        .or_default()
                        .entry(s.clone())
                        .or_default() += 1;
                }
                FeatureValue::Group(_) => {}
            }
        }
    }

    let means: BTreeMap<String, f64> = numbers
        .iter()
        .filter_map(|(k, v)| stats::mean(v).map(|m| (k.clone(), m)))
        .collect();
    let coefficients_of_variation: BTreeMap<String, Option<f64>> = numbers
        .iter()
        .map(|(k, v)| (k.clone(), stats::coefficient_of_variation(v)))
        .collect();
    let modal_flags: BTreeMap<String, bool> = flags
        .into_iter()
        .map(|(k, (trues, falses))| (k, trues > falses))
        .collect();
    // Ascending iteration plus a strict `>` keeps the smallest label on ties.
    let modal_labels: BTreeMap<String, String> = labels
        .into_iter()
        .filter_map(|(k, counts)| {
            let mut best: Option<(&String, usize)> = None;
            for (label, count) in &counts {
                if best.map_or(true, |(_, c)| *count > c) {
                    best = Some((label, *count));
                }
            }
            best.map(|(label, _)| (k, label.clone()))
        })
        .collect();

    let has_socket = modal_flags.get("incavo_presente").copied().unwrap_or(false);
    let has_raised_edges = modal_flags
        .get("margini_rialzati_presenti")
        .copied()
        .unwrap_or(false);

    let any_socket = members
        .iter()
        .any(|(_, r)| r.lookup("incavo_presente").and_then(FeatureValue::as_flag) == Some(true));
    let member_mean = |key: &str| {
        if any_socket {
            means.get(key).copied().unwrap_or(0.0)
        } else {
            0.0
        }
    };
    let avg_socket_width = member_mean("incavo_larghezza");
    let avg_socket_depth = member_mean("incavo_profondita");

    let cv = |key: &str| coefficients_of_variation.get(key).copied().flatten();
    let length_cv = cv("length");
    let width_cv = cv("width");
    let weight_cv = cv("peso");

    let mold_type = infer_mold_type(
        [length_cv, width_cv, weight_cv],
        has_socket,
        bivalve_cv_threshold,
    );

    let mut c = MatrixCharacteristics {
        matrix_id,
        artifacts_count: members.len(),
        artifact_ids: members.iter().map(|(id, _)| id.to_string()).collect(),
        inventory_numbers: members
            .iter()
            .map(|(id, r)| {
                r.lookup("inventory_number")
                    .and_then(FeatureValue::as_label)
                    .unwrap_or(*id)
                    .to_string()
            })
            .collect(),
        means,
        coefficients_of_variation,
        modal_flags,
        modal_labels,
        has_socket,
        has_raised_edges,
        avg_socket_width,
        avg_socket_depth,
        length_cv,
        width_cv,
        weight_cv,
        mold_type,
        description: String::new(),
    };
    c.description = describe(&c);
    c
}

/// Bivalve when the mean of the length, width and weight CVs is below
/// `threshold` and the socket is consistently present. A missing weight CV
/// counts as 0 so unweighed corpora are judged on dimensions alone; an
/// undefined length or width CV leaves the mold type uncertain.
pub fn infer_mold_type(cvs: [Option<f64>; 3], has_socket: bool, threshold: f64) -> MoldType {
    let [length_cv, width_cv, weight_cv] = cvs;
    let defined = length_cv.zip(width_cv).map(|(l, w)| [l, w, weight_cv.unwrap_or(0.0)]);
    match defined.and_then(|v| stats::mean(&v)) {
        Some(avg) if avg < threshold && has_socket => MoldType::Bivalve,
        _ => MoldType::MonovalveOrImpreciseBivalve,
    }
}

fn describe(c: &MatrixCharacteristics) -> String {
    let mut parts = vec![
        format!("Matrix {}", c.matrix_id),
        format!("type {}", c.mold_type.as_str()),
    ];

    if c.has_socket {
        let profile = c
            .modal_labels
            .get("incavo_profilo")
            .map_or("indeterminato", String::as_str);
        parts.push(format!(
            "with {profile} socket (W={:.1}mm, D={:.1}mm)",
            c.avg_socket_width, c.avg_socket_depth
        ));
    } else {
        parts.push("without socket".to_string());
    }
    if c.has_raised_edges {
        parts.push("with raised edges".to_string());
    }

    let dim = |key: &str| c.mean(key).map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
    parts.push(format!(
        "mean dimensions L={}mm, W={}mm, weight={}g",
        dim("length"),
        dim("width"),
        dim("peso")
    ));
    parts.join(", ")
}
