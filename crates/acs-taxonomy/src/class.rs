//! Taxonomic classes and single-class classification.
//!
//! A [`TaxonomicClass`] is immutable once built. Its parameter hash is a
//! pure function of the morphometric and technological parameters, the
//! optional features and the confidence threshold, so two classes with the
//! same parameters always hash alike and any threshold edit changes the
//! hash.

use std::collections::BTreeMap;

use acs_core::types::{FeatureDictionary, FeatureValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{TaxonomyError, TaxonomyResult};
use crate::parameter::ClassificationParameter;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;
/// Score credited per matching optional feature.
pub const DEFAULT_OPTIONAL_BONUS: f64 = 0.2;

/// Hex characters kept from the SHA-256 digest.
const HASH_LEN: usize = 16;

// ============================================================================
// Class
// ============================================================================

/// Fields needed to build a [`TaxonomicClass`]; the hash is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    pub class_id: String,
    pub name: String,
    pub description: String,
    pub morphometric_params: BTreeMap<String, ClassificationParameter>,
    pub technological_params: BTreeMap<String, ClassificationParameter>,
    pub optional_features: BTreeMap<String, bool>,
    pub confidence_threshold: f64,
    pub created_date: DateTime<Utc>,
    pub created_by: String,
    pub validated_samples: Vec<String>,
}

impl ClassDefinition {
    pub fn new(class_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            name: name.into(),
            description: String::new(),
            morphometric_params: BTreeMap::new(),
            technological_params: BTreeMap::new(),
            optional_features: BTreeMap::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            created_date: Utc::now(),
            created_by: String::new(),
            validated_samples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomicClass {
    class_id: String,
    name: String,
    description: String,
    parameter_hash: String,
    morphometric_params: BTreeMap<String, ClassificationParameter>,
    technological_params: BTreeMap<String, ClassificationParameter>,
    optional_features: BTreeMap<String, bool>,
    confidence_threshold: f64,
    created_date: DateTime<Utc>,
    created_by: String,
    validated_samples: Vec<String>,
}

#[derive(Serialize)]
struct HashInput<'a> {
    morphometric: &'a BTreeMap<String, ClassificationParameter>,
    technological: &'a BTreeMap<String, ClassificationParameter>,
    optional: &'a BTreeMap<String, bool>,
    threshold: f64,
}

/// First 16 hex chars of SHA-256 over the canonical (key-sorted) JSON of
/// the parameter set.
pub fn parameter_hash(
    morphometric: &BTreeMap<String, ClassificationParameter>,
    technological: &BTreeMap<String, ClassificationParameter>,
    optional: &BTreeMap<String, bool>,
    threshold: f64,
) -> TaxonomyResult<String> {
    // Value maps are key-sorted, which makes struct fields canonical too.
    let value = serde_json::to_value(HashInput {
        morphometric,
        technological,
        optional,
        threshold,
    })?;
    let canonical = serde_json::to_string(&value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(HASH_LEN);
    Ok(hex)
}

fn check_params(kind: &str, params: &BTreeMap<String, ClassificationParameter>) -> TaxonomyResult<()> {
    for (key, param) in params {
        if key != &param.name {
            return Err(TaxonomyError::invalid_parameter(format!(
                "{kind} parameter keyed '{key}' is named '{}'",
                param.name
            )));
        }
        param.check()?;
    }
    Ok(())
}

impl TaxonomicClass {
    pub fn new(def: ClassDefinition) -> TaxonomyResult<Self> {
        if def.class_id.trim().is_empty() {
            return Err(TaxonomyError::invalid_parameter("class_id must not be empty"));
        }
        if !(0.0..=1.0).contains(&def.confidence_threshold) {
            return Err(TaxonomyError::invalid_parameter(format!(
                "confidence_threshold must be in [0, 1], got {}",
                def.confidence_threshold
            )));
        }
        check_params("morphometric", &def.morphometric_params)?;
        check_params("technological", &def.technological_params)?;

        let parameter_hash = parameter_hash(
            &def.morphometric_params,
            &def.technological_params,
            &def.optional_features,
            def.confidence_threshold,
        )?;

        Ok(Self {
            class_id: def.class_id,
            name: def.name,
            description: def.description,
            parameter_hash,
            morphometric_params: def.morphometric_params,
            technological_params: def.technological_params,
            optional_features: def.optional_features,
            confidence_threshold: def.confidence_threshold,
            created_date: def.created_date,
            created_by: def.created_by,
            validated_samples: def.validated_samples,
        })
    }

    /// Editable copy of this class's fields.
    pub fn to_definition(&self) -> ClassDefinition {
        ClassDefinition {
            class_id: self.class_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            morphometric_params: self.morphometric_params.clone(),
            technological_params: self.technological_params.clone(),
            optional_features: self.optional_features.clone(),
            confidence_threshold: self.confidence_threshold,
            created_date: self.created_date,
            created_by: self.created_by.clone(),
            validated_samples: self.validated_samples.clone(),
        }
    }

    /// Recompute the hash and compare with the stored one.
    pub fn verify_hash(&self) -> TaxonomyResult<()> {
        check_params("morphometric", &self.morphometric_params)?;
        check_params("technological", &self.technological_params)?;
        let computed = parameter_hash(
            &self.morphometric_params,
            &self.technological_params,
            &self.optional_features,
            self.confidence_threshold,
        )?;
        if computed != self.parameter_hash {
            return Err(TaxonomyError::HashMismatch {
                class_id: self.class_id.clone(),
                stored: self.parameter_hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameter_hash(&self) -> &str {
        &self.parameter_hash
    }

    pub fn morphometric_params(&self) -> &BTreeMap<String, ClassificationParameter> {
        &self.morphometric_params
    }

    pub fn technological_params(&self) -> &BTreeMap<String, ClassificationParameter> {
        &self.technological_params
    }

    pub fn optional_features(&self) -> &BTreeMap<String, bool> {
        &self.optional_features
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn validated_samples(&self) -> &[String] {
        &self.validated_samples
    }

    pub fn parameter_count(&self) -> usize {
        self.morphometric_params.len() + self.technological_params.len()
    }

    /// Morphometric then technological parameters.
    pub fn parameters(&self) -> impl Iterator<Item = &ClassificationParameter> {
        self.morphometric_params
            .values()
            .chain(self.technological_params.values())
    }

    pub fn classify(&self, features: &FeatureDictionary) -> ClassificationResult {
        self.classify_with_bonus(features, DEFAULT_OPTIONAL_BONUS)
    }

    /// Score `features` against this class.
    ///
    /// Every parameter must be present and numeric, and inside its hard
    /// gate; the first violation fails the class closed with confidence 0.
    /// Otherwise confidence is
    /// `(Σ max(0, 1 - distance)·weight + bonus·matches) / (Σ weight + bonus·n_optional)`.
    pub fn classify_with_bonus(&self, features: &FeatureDictionary, optional_bonus: f64) -> ClassificationResult {
        let mut diagnostics = BTreeMap::new();
        let mut score_sum = 0.0;

        for param in self.parameters() {
            let measured = match features.lookup(&param.name) {
                None => {
                    return self.rejected(
                        BTreeMap::new(),
                        ClassificationFailure::MissingParameter {
                            parameter: param.name.clone(),
                        },
                    )
                }
                Some(value) => match value.as_numeric() {
                    Some(v) => v,
                    None => {
                        return self.rejected(
                            BTreeMap::new(),
                            ClassificationFailure::NonNumericParameter {
                                parameter: param.name.clone(),
                            },
                        )
                    }
                },
            };

            let expected_range = (param.min_threshold, param.max_threshold);
            if !param.validate(measured) {
                diagnostics.insert(
                    param.name.clone(),
                    Diagnostic::Fail {
                        measured,
                        expected_range,
                    },
                );
                return self.rejected(
                    diagnostics,
                    ClassificationFailure::ValidationRangeExceeded {
                        parameter: param.name.clone(),
                        measured,
                        min_threshold: param.min_threshold,
                        max_threshold: param.max_threshold,
                    },
                );
            }

            let distance = param.distance_from_ideal(measured);
            let score = (1.0 - distance).max(0.0) * param.weight;
            score_sum += score;
            diagnostics.insert(
                param.name.clone(),
                Diagnostic::Pass {
                    measured,
                    ideal: param.value,
                    expected_range,
                    distance,
                    score,
                },
            );
        }

        let mut optional_score = 0.0;
        for (feature, expected) in &self.optional_features {
            let Some(present) = features.lookup(feature).and_then(FeatureValue::as_truthy) else {
                continue;
            };
            if present == *expected {
                optional_score += optional_bonus;
                diagnostics.insert(feature.clone(), Diagnostic::Match { present });
            } else {
                diagnostics.insert(
                    feature.clone(),
                    Diagnostic::Mismatch {
                        present,
                        expected: *expected,
                    },
                );
            }
        }

        let total_weight: f64 = self.parameters().map(|p| p.weight).sum();
        let confidence = if total_weight == 0.0 {
            0.0
        } else {
            (score_sum + optional_score)
                / (total_weight + optional_bonus * self.optional_features.len() as f64)
        };

        ClassificationResult {
            class_id: self.class_id.clone(),
            class_name: self.name.clone(),
            is_member: confidence >= self.confidence_threshold,
            confidence,
            diagnostics,
            failure: None,
        }
    }

    fn rejected(
        &self,
        diagnostics: BTreeMap<String, Diagnostic>,
        failure: ClassificationFailure,
    ) -> ClassificationResult {
        ClassificationResult {
            class_id: self.class_id.clone(),
            class_name: self.name.clone(),
            is_member: false,
            confidence: 0.0,
            diagnostics,
            failure: Some(failure),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnostic {
    Pass {
        measured: f64,
        ideal: f64,
        expected_range: (f64, f64),
        distance: f64,
        score: f64,
    },
    Fail {
        measured: f64,
        expected_range: (f64, f64),
    },
    Match {
        present: bool,
    },
    Mismatch {
        present: bool,
        expected: bool,
    },
}

/// Why a class rejected an object outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationFailure {
    MissingParameter {
        parameter: String,
    },
    NonNumericParameter {
        parameter: String,
    },
    ValidationRangeExceeded {
        parameter: String,
        measured: f64,
        min_threshold: f64,
        max_threshold: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub class_id: String,
    pub class_name: String,
    pub is_member: bool,
    pub confidence: f64,
    pub diagnostics: BTreeMap<String, Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ClassificationFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, value: f64, tol: f64) -> ClassificationParameter {
        ClassificationParameter::new(name, value, value - 10.0, value + 10.0)
            .unwrap()
            .with_tolerance(tol)
            .unwrap()
    }

    fn palstave() -> TaxonomicClass {
        let mut def = ClassDefinition::new("TYPE_PALSTAVE", "Palstave");
        def.morphometric_params
            .insert("length".into(), param("length", 150.0, 4.0));
        def.morphometric_params
            .insert("width".into(), param("width", 50.0, 2.0));
        def.technological_params
            .insert("socket_depth".into(), param("socket_depth", 12.0, 1.0));
        def.optional_features.insert("has_socket".into(), true);
        TaxonomicClass::new(def).unwrap()
    }

    fn object(length: f64, socket: bool) -> FeatureDictionary {
        FeatureDictionary::new()
            .with("id", "OBJ")
            .with("length", length)
            .with("width", 50.0)
            .with("socket_depth", 12.0)
            .with("has_socket", socket)
    }

    #[test]
    fn test_hash_is_pure_and_threshold_sensitive() {
        let a = palstave();
        let b = palstave();
        assert_eq!(a.parameter_hash(), b.parameter_hash());
        assert_eq!(a.parameter_hash().len(), 16);

        let mut def = a.to_definition();
        def.morphometric_params.get_mut("length").unwrap().max_threshold = 161.0;
        let c = TaxonomicClass::new(def).unwrap();
        assert_ne!(a.parameter_hash(), c.parameter_hash());

        // Identity fields do not feed the hash.
        let mut def = a.to_definition();
        def.class_id = "OTHER".into();
        def.name = "Other".into();
        assert_eq!(TaxonomicClass::new(def).unwrap().parameter_hash(), a.parameter_hash());
        println!("[PASS] test_hash_is_pure_and_threshold_sensitive");
    }

    #[test]
    fn test_perfect_match_confidence() {
        let result = palstave().classify(&object(150.0, true));
        assert!(result.is_member);
        // (3 + 0.2) / (3 + 0.2)
        assert!((result.confidence - 1.0).abs() < 1e-12);
        assert_eq!(result.diagnostics["has_socket"], Diagnostic::Match { present: true });
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_soft_score_and_optional_mismatch() {
        let result = palstave().classify(&object(152.0, false));
        // length distance 0.5 -> score 0.5; no bonus
        let expected = (0.5 + 1.0 + 1.0) / (3.0 + 0.2);
        assert!((result.confidence - expected).abs() < 1e-12);
        assert!(result.is_member, "{} >= 0.75", result.confidence);
        assert_eq!(
            result.diagnostics["has_socket"],
            Diagnostic::Mismatch { present: false, expected: true }
        );
    }

    #[test]
    fn test_missing_parameter_fails_closed() {
        let features = FeatureDictionary::new().with("length", 150.0).with("width", 50.0);
        let result = palstave().classify(&features);
        assert!(!result.is_member);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(
            result.failure,
            Some(ClassificationFailure::MissingParameter {
                parameter: "socket_depth".into()
            })
        );
    }

    #[test]
    fn test_hard_gate_vetoes() {
        let result = palstave().classify(&object(170.5, true));
        assert!(!result.is_member);
        assert_eq!(result.confidence, 0.0);
        assert!(matches!(
            result.diagnostics["length"],
            Diagnostic::Fail { measured, .. } if measured == 170.5
        ));
        assert!(matches!(
            result.failure,
            Some(ClassificationFailure::ValidationRangeExceeded { ref parameter, .. }) if parameter == "length"
        ));
        println!("[PASS] test_hard_gate_vetoes");
    }

    #[test]
    fn test_non_numeric_parameter() {
        let features = object(150.0, true).with("width", "wide");
        let result = palstave().classify(&features);
        assert_eq!(
            result.failure,
            Some(ClassificationFailure::NonNumericParameter { parameter: "width".into() })
        );
    }

    #[test]
    fn test_zero_weight_gives_zero_confidence() {
        let mut def = ClassDefinition::new("TYPE_Z", "Zero");
        def.morphometric_params.insert(
            "length".into(),
            param("length", 150.0, 4.0).with_weight(0.0).unwrap(),
        );
        let class = TaxonomicClass::new(def).unwrap();
        let result = class.classify(&object(150.0, true));
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_member);
    }

    #[test]
    fn test_verify_hash_detects_tampering() {
        let class = palstave();
        class.verify_hash().unwrap();

        let mut json = serde_json::to_value(&class).unwrap();
        json["confidence_threshold"] = serde_json::json!(0.5);
        let tampered: TaxonomicClass = serde_json::from_value(json).unwrap();
        assert!(matches!(
            tampered.verify_hash(),
            Err(TaxonomyError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_definition_checks() {
        let mut def = ClassDefinition::new("TYPE_X", "X");
        def.confidence_threshold = 1.5;
        assert!(TaxonomicClass::new(def).is_err());

        let mut def = ClassDefinition::new("TYPE_X", "X");
        def.morphometric_params.insert("width".into(), param("length", 1.0, 1.0));
        assert!(TaxonomicClass::new(def).is_err());
    }
}
