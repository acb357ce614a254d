//! Quantitative classification parameters.

use serde::{Deserialize, Serialize};

use crate::error::{TaxonomyError, TaxonomyResult};

pub const DEFAULT_UNIT: &str = "mm";
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// One measured dimension of a class: an ideal value, an inclusive hard
/// gate `[min_threshold, max_threshold]`, and a soft-scoring tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationParameter {
    pub name: String,
    pub value: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub weight: f64,
    pub measurement_unit: String,
    pub tolerance: f64,
}

impl ClassificationParameter {
    /// Weight 1.0, tolerance 0.1, unit mm.
    pub fn new(
        name: impl Into<String>,
        value: f64,
        min_threshold: f64,
        max_threshold: f64,
    ) -> TaxonomyResult<Self> {
        let param = Self {
            name: name.into(),
            value,
            min_threshold,
            max_threshold,
            weight: 1.0,
            measurement_unit: DEFAULT_UNIT.to_string(),
            tolerance: DEFAULT_TOLERANCE,
        };
        param.check()?;
        Ok(param)
    }

    pub fn with_weight(mut self, weight: f64) -> TaxonomyResult<Self> {
        self.weight = weight;
        self.check()?;
        Ok(self)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> TaxonomyResult<Self> {
        self.tolerance = tolerance;
        self.check()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.measurement_unit = unit.into();
        self
    }

    /// Enforce `min_threshold <= value <= max_threshold` and finite,
    /// non-negative weight and tolerance.
    pub fn check(&self) -> TaxonomyResult<()> {
        let fields = [
            ("value", self.value),
            ("min_threshold", self.min_threshold),
            ("max_threshold", self.max_threshold),
            ("weight", self.weight),
            ("tolerance", self.tolerance),
        ];
        if let Some((field, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TaxonomyError::invalid_parameter(format!(
                "{}: {field} must be finite, got {v}",
                self.name
            )));
        }
        if !(self.min_threshold <= self.value && self.value <= self.max_threshold) {
            return Err(TaxonomyError::invalid_parameter(format!(
                "{}: expected {} <= {} <= {}",
                self.name, self.min_threshold, self.value, self.max_threshold
            )));
        }
        if self.weight < 0.0 || self.tolerance < 0.0 {
            return Err(TaxonomyError::invalid_parameter(format!(
                "{}: weight and tolerance must be >= 0",
                self.name
            )));
        }
        Ok(())
    }

    /// Hard gate, inclusive at both ends.
    pub fn validate(&self, measured: f64) -> bool {
        self.min_threshold <= measured && measured <= self.max_threshold
    }

    /// `|measured - value| / tolerance`; with zero tolerance, 0 on an exact
    /// match and 1 otherwise.
    pub fn distance_from_ideal(&self, measured: f64) -> f64 {
        if self.tolerance == 0.0 {
            return if measured == self.value { 0.0 } else { 1.0 };
        }
        (measured - self.value).abs() / self.tolerance
    }
}

/// Partial update of a parameter; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_unit: Option<String>,
}

impl ParameterPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Patched copy of `param`, re-checked against its invariants.
    pub fn apply(&self, param: &ClassificationParameter) -> TaxonomyResult<ClassificationParameter> {
        let mut out = param.clone();
        if let Some(v) = self.value {
            out.value = v;
        }
        if let Some(v) = self.min_threshold {
            out.min_threshold = v;
        }
        if let Some(v) = self.max_threshold {
            out.max_threshold = v;
        }
        if let Some(v) = self.weight {
            out.weight = v;
        }
        if let Some(v) = self.tolerance {
            out.tolerance = v;
        }
        if let Some(unit) = &self.measurement_unit {
            out.measurement_unit = unit.clone();
        }
        out.check()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length() -> ClassificationParameter {
        ClassificationParameter::new("length", 150.0, 140.0, 160.0)
            .unwrap()
            .with_tolerance(5.0)
            .unwrap()
    }

    #[test]
    fn test_validate_is_inclusive() {
        let p = length();
        assert!(p.validate(140.0));
        assert!(p.validate(160.0));
        assert!(!p.validate(139.999));
        assert!(!p.validate(160.001));
        println!("[PASS] test_validate_is_inclusive");
    }

    #[test]
    fn test_distance_from_ideal() {
        let p = length();
        assert_eq!(p.distance_from_ideal(150.0), 0.0);
        assert!((p.distance_from_ideal(155.0) - 1.0).abs() < 1e-12);
        assert!((p.distance_from_ideal(147.5) - 0.5).abs() < 1e-12);

        let exact = ClassificationParameter::new("n", 3.0, 3.0, 3.0)
            .unwrap()
            .with_tolerance(0.0)
            .unwrap();
        assert_eq!(exact.distance_from_ideal(3.0), 0.0);
        assert_eq!(exact.distance_from_ideal(3.5), 1.0);
    }

    #[test]
    fn test_constructor_rejects_broken_invariant() {
        assert!(ClassificationParameter::new("length", 170.0, 140.0, 160.0).is_err());
        assert!(ClassificationParameter::new("length", f64::NAN, 140.0, 160.0).is_err());
        assert!(length().with_weight(-1.0).is_err());
    }

    #[test]
    fn test_patch_rechecks() {
        let p = length();
        let widened = ParameterPatch {
            max_threshold: Some(175.0),
            ..Default::default()
        }
        .apply(&p)
        .unwrap();
        assert_eq!(widened.max_threshold, 175.0);
        assert_eq!(p.max_threshold, 160.0);

        let broken = ParameterPatch {
            value: Some(200.0),
            ..Default::default()
        };
        assert!(matches!(broken.apply(&p), Err(TaxonomyError::InvalidParameter(_))));
        assert!(ParameterPatch::default().is_empty());
        println!("[PASS] test_patch_rechecks");
    }
}
