//! Typed feature dictionaries.
//!
//! A [`FeatureDictionary`] is what the extractor emits and what external
//! stores persist verbatim. Values are a closed union ([`FeatureValue`]) so
//! consumers never have to guess at types; the JSON form is untagged and
//! matches the persisted record shape:
//!
//! ```json
//! { "id": "AX-12", "volume": 41250.0, "savignano": { "incavo_presente": true } }
//! ```
//!
//! # Ingestion
//!
//! [`FeatureDictionary::from_json_value`] validates a record before it enters
//! the engine: `null`, arrays and non-finite numbers are rejected with
//! [`CoreError::SchemaViolation`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Group holding Savignano measurements inside a persisted artifact record.
pub const SAVIGNANO_GROUP: &str = "savignano";

/// Key carrying the artifact identifier in persisted records.
pub const ID_KEY: &str = "id";

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Number(f64),
    /// Categorical outcome or record metadata
    Label(String),
    /// Nested feature group
    Group(BTreeMap<String, FeatureValue>),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FeatureValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            FeatureValue::Label(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: numbers as-is, flags as 0.0/1.0.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truthiness view: flags as-is, numbers as `!= 0`.
    pub fn as_truthy(&self) -> Option<bool> {
        match self {
            FeatureValue::Flag(b) => Some(*b),
            FeatureValue::Number(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    fn from_json(path: &str, value: &Value) -> CoreResult<Self> {
        match value {
            Value::Bool(b) => Ok(FeatureValue::Flag(*b)),
            Value::Number(n) => {
                let v = n
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| CoreError::schema(path, "number is not a finite f64"))?;
                Ok(FeatureValue::Number(v))
            }
            Value::String(s) => Ok(FeatureValue::Label(s.clone())),
            Value::Object(map) => {
                let mut group = BTreeMap::new();
                for (k, v) in map {
                    let child = format!("{path}.{k}");
                    group.insert(k.clone(), FeatureValue::from_json(&child, v)?);
                }
                Ok(FeatureValue::Group(group))
            }
            Value::Null => Err(CoreError::schema(path, "null is not a feature value")),
            Value::Array(_) => Err(CoreError::schema(path, "arrays are not feature values")),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(b: bool) -> Self {
        FeatureValue::Flag(b)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Label(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        FeatureValue::Label(s)
    }
}

// ============================================================================
// FeatureDictionary
// ============================================================================

/// Artifact-scoped mapping from feature name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureDictionary(BTreeMap<String, FeatureValue>);

impl FeatureDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and ingest a JSON object.
    ///
    /// # Errors
    ///
    /// [`CoreError::SchemaViolation`] if the root is not an object or any
    /// value (at any depth) is `null`, an array or a non-finite number.
    pub fn from_json_value(value: &Value) -> CoreResult<Self> {
        let Value::Object(map) = value else {
            return Err(CoreError::schema("$", "feature record must be a JSON object"));
        };
        let mut out = BTreeMap::new();
        for (k, v) in map {
            out.insert(k.clone(), FeatureValue::from_json(k, v)?);
        }
        Ok(Self(out))
    }

    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(&value)
    }

    pub fn to_json_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FeatureValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FeatureValue::as_number)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FeatureValue::as_flag)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FeatureValue::as_label)
    }

    pub fn group(&self, name: &str) -> Option<&BTreeMap<String, FeatureValue>> {
        match self.get(name) {
            Some(FeatureValue::Group(g)) => Some(g),
            _ => None,
        }
    }

    /// Look up `key` at the top level, falling back to the `savignano` group.
    pub fn lookup(&self, key: &str) -> Option<&FeatureValue> {
        self.get(key)
            .or_else(|| self.group(SAVIGNANO_GROUP).and_then(|g| g.get(key)))
    }

    /// Artifact identifier from the `id` or `artifact_id` label.
    pub fn artifact_id(&self) -> Option<&str> {
        self.label(ID_KEY).or_else(|| self.label("artifact_id"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten into named numeric columns for corpus analysis.
    ///
    /// - `id` and labels are skipped
    /// - flags become 0.0/1.0
    /// - members of the `savignano` group are prefixed `sav_`, members of any
    ///   other group `<group>_`
    pub fn flatten_numeric(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            if key == ID_KEY {
                continue;
            }
            flatten_into(&mut out, String::new(), key, value);
        }
        out
    }
}

fn group_prefix(name: &str) -> String {
    if name == SAVIGNANO_GROUP {
        "sav_".to_string()
    } else {
        format!("{name}_")
    }
}

fn flatten_into(out: &mut BTreeMap<String, f64>, prefix: String, key: &str, value: &FeatureValue) {
    match value {
        FeatureValue::Group(group) => {
            let nested = format!("{prefix}{}", group_prefix(key));
            for (k, v) in group {
                flatten_into(out, nested.clone(), k, v);
            }
        }
        FeatureValue::Label(_) => {}
        other => {
            if let Some(v) = other.as_numeric() {
                out.insert(format!("{prefix}{key}"), v);
            }
        }
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureDictionary {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, FeatureValue>> for FeatureDictionary {
    fn from(map: BTreeMap<String, FeatureValue>) -> Self {
        Self(map)
    }
}
