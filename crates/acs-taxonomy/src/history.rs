//! Append-only audit records: class version history and classification log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parameter::ParameterPatch;

/// Parameter edits grouped by parameter kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterChanges {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub morphometric: BTreeMap<String, ParameterPatch>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub technological: BTreeMap<String, ParameterPatch>,
}

impl ParameterChanges {
    pub fn is_empty(&self) -> bool {
        self.morphometric.values().all(ParameterPatch::is_empty)
            && self.technological.values().all(ParameterPatch::is_empty)
    }

    #[must_use]
    pub fn morphometric(mut self, name: impl Into<String>, patch: ParameterPatch) -> Self {
        self.morphometric.insert(name.into(), patch);
        self
    }

    #[must_use]
    pub fn technological(mut self, name: impl Into<String>, patch: ParameterPatch) -> Self {
        self.technological.insert(name.into(), patch);
        self
    }
}

/// One entry of the class version history, tagged by `"action"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryRecord {
    CreateClass {
        timestamp: DateTime<Utc>,
        class_id: String,
        parameter_hash: String,
        reference_count: usize,
    },
    ModifyClass {
        timestamp: DateTime<Utc>,
        old_class_id: String,
        new_class_id: String,
        old_hash: String,
        new_hash: String,
        changes: ParameterChanges,
        justification: String,
        operator: String,
    },
}

impl HistoryRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::CreateClass { timestamp, .. } | Self::ModifyClass { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_modification(&self) -> bool {
        matches!(self, Self::ModifyClass { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationLogEntry {
    pub timestamp: DateTime<Utc>,
    /// `"unknown"` when the object carries no identifier
    pub object_id: String,
    pub best_match: Option<String>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_tagged_by_action() {
        let record = HistoryRecord::CreateClass {
            timestamp: Utc::now(),
            class_id: "TYPE_A".into(),
            parameter_hash: "0123456789abcdef".into(),
            reference_count: 3,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "CREATE_CLASS");
        assert!(!record.is_modification());

        let changes = ParameterChanges::default().morphometric(
            "length",
            ParameterPatch {
                max_threshold: Some(180.0),
                ..Default::default()
            },
        );
        let record = HistoryRecord::ModifyClass {
            timestamp: Utc::now(),
            old_class_id: "TYPE_A".into(),
            new_class_id: "TYPE_A_v2".into(),
            old_hash: "a".into(),
            new_hash: "b".into(),
            changes,
            justification: "new finds".into(),
            operator: "curator".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "MODIFY_CLASS");
        assert_eq!(json["changes"]["morphometric"]["length"]["max_threshold"], 180.0);
        assert!(json["changes"].get("technological").is_none());

        let back: HistoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        println!("[PASS] test_records_are_tagged_by_action");
    }

    #[test]
    fn test_empty_changes() {
        assert!(ParameterChanges::default().is_empty());
        assert!(ParameterChanges::default()
            .morphometric("length", ParameterPatch::default())
            .is_empty());
    }
}
