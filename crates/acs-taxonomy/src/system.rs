//! The formal taxonomy registry.
//!
//! [`TaxonomySystem`] owns one [`TaxonomyStore`] behind a
//! `parking_lot::RwLock`. Every mutation (define, modify, import, and the
//! classification log append) takes the write guard, so at most one
//! registry change is in flight per instance. Classes are immutable
//! `Arc`s: readers clone the handles they need and release the lock.
//!
//! # Lifecycle
//!
//! ```text
//! define ──> Active ──modify──> Superseded { by: <id>_v2 }
//!                                 (still resolvable, hash unchanged)
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use acs_clustering::{dbscan, DbscanParams};
use acs_core::config::TaxonomyConfig;
use acs_core::stats::{self, Standardizer};
use acs_core::types::{FeatureDictionary, FeatureValue};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::class::{ClassDefinition, ClassificationResult, TaxonomicClass};
use crate::error::{TaxonomyError, TaxonomyResult};
use crate::history::{ClassificationLogEntry, HistoryRecord, ParameterChanges};
use crate::parameter::{ClassificationParameter, DEFAULT_UNIT};

pub const EXPORT_FORMAT_VERSION: u32 = 1;
pub const MIN_REFERENCE_OBJECTS: usize = 2;
const UNKNOWN_OBJECT: &str = "unknown";
const SYSTEM_CREATOR: &str = "system";

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassStatus {
    Active,
    /// Replaced by a newer version; kept for audit and re-classification.
    Superseded { by: String },
}

#[derive(Debug, Default)]
pub struct TaxonomyStore {
    classes: BTreeMap<String, Arc<TaxonomicClass>>,
    lifecycle: BTreeMap<String, ClassStatus>,
    version_history: Vec<HistoryRecord>,
    classification_log: Vec<ClassificationLogEntry>,
}

impl TaxonomyStore {
    fn register(&mut self, class: TaxonomicClass) -> Arc<TaxonomicClass> {
        let class = Arc::new(class);
        self.lifecycle
            .insert(class.class_id().to_string(), ClassStatus::Active);
        self.classes
            .insert(class.class_id().to_string(), Arc::clone(&class));
        class
    }

    fn active(&self) -> impl Iterator<Item = &Arc<TaxonomicClass>> {
        self.classes
            .values()
            .filter(|c| self.lifecycle.get(c.class_id()) == Some(&ClassStatus::Active))
    }

    /// `TYPE_<NAME>_<stamp>`, suffixed `_2`, `_3`, ... on collision.
    fn allocate_id(&self, name: &str, now: DateTime<Utc>) -> String {
        let upper: String = name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_uppercase() })
            .collect();
        let base = format!("TYPE_{upper}_{}", now.format("%Y%m%d_%H%M%S"));
        if !self.classes.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.classes.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// `<base>_v<N>` with N one past the highest version of `base` on record.
    fn next_version_id(&self, class_id: &str) -> String {
        let base = version_base(class_id);
        let highest = self
            .classes
            .keys()
            .filter_map(|id| {
                if id == base {
                    Some(1)
                } else {
                    id.strip_prefix(base)
                        .and_then(|rest| rest.strip_prefix("_v"))
                        .and_then(|n| n.parse::<u32>().ok())
                }
            })
            .max()
            .unwrap_or(1);
        format!("{base}_v{}", highest + 1)
    }

    fn rebuild_lifecycle(&mut self) {
        self.lifecycle = self
            .classes
            .keys()
            .map(|id| (id.clone(), ClassStatus::Active))
            .collect();
        for record in &self.version_history {
            if let HistoryRecord::ModifyClass {
                old_class_id,
                new_class_id,
                ..
            } = record
            {
                if self.classes.contains_key(old_class_id) {
                    self.lifecycle.insert(
                        old_class_id.clone(),
                        ClassStatus::Superseded {
                            by: new_class_id.clone(),
                        },
                    );
                }
            }
        }
    }
}

/// Strip a trailing `_v<digits>` version suffix.
fn version_base(class_id: &str) -> &str {
    match class_id.rsplit_once("_v") {
        Some((base, n)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => base,
        _ => class_id,
    }
}

// ============================================================================
// Export document
// ============================================================================

fn default_format_version() -> u32 {
    EXPORT_FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyExport {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub classes: BTreeMap<String, TaxonomicClass>,
    #[serde(default)]
    pub version_history: Vec<HistoryRecord>,
    #[serde(default)]
    pub classification_log: Vec<ClassificationLogEntry>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub name: String,
    pub status: ClassStatus,
    pub parameter_hash: String,
    pub n_validated_samples: usize,
    pub n_parameters: usize,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyStatistics {
    pub n_classes: usize,
    pub n_active_classes: usize,
    pub total_classifications: usize,
    pub total_modifications: usize,
    pub classes: BTreeMap<String, ClassSummary>,
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Default)]
pub struct TaxonomySystem {
    config: TaxonomyConfig,
    store: RwLock<TaxonomyStore>,
}

impl TaxonomySystem {
    pub fn new(config: TaxonomyConfig) -> Self {
        Self {
            config,
            store: RwLock::new(TaxonomyStore::default()),
        }
    }

    pub fn config(&self) -> &TaxonomyConfig {
        &self.config
    }

    pub fn get_class(&self, class_id: &str) -> Option<Arc<TaxonomicClass>> {
        self.store.read().classes.get(class_id).cloned()
    }

    pub fn class_status(&self, class_id: &str) -> Option<ClassStatus> {
        self.store.read().lifecycle.get(class_id).cloned()
    }

    /// Every registered class, superseded versions included.
    pub fn classes(&self) -> Vec<Arc<TaxonomicClass>> {
        self.store.read().classes.values().cloned().collect()
    }

    pub fn active_classes(&self) -> Vec<Arc<TaxonomicClass>> {
        self.store.read().active().cloned().collect()
    }

    pub fn version_history(&self) -> Vec<HistoryRecord> {
        self.store.read().version_history.clone()
    }

    pub fn classification_log(&self) -> Vec<ClassificationLogEntry> {
        self.store.read().classification_log.clone()
    }

    // ------------------------------------------------------------------------
    // Definition
    // ------------------------------------------------------------------------

    /// Build a class from a validated reference group.
    ///
    /// For each configured morphometric and technological key with at
    /// least one numeric reference value: ideal = mean, gate = mean ± 2σ
    /// (population σ), tolerance = σ · `tolerance_factor`, weight from
    /// `weights` (default 1.0). Optional boolean features present in every
    /// reference are expected true at a presence rate ≥ 80 % and false at
    /// ≤ 20 %.
    pub fn define_class_from_reference_group(
        &self,
        class_name: &str,
        references: &[FeatureDictionary],
        weights: &BTreeMap<String, f64>,
        tolerance_factor: f64,
    ) -> TaxonomyResult<Arc<TaxonomicClass>> {
        if references.len() < MIN_REFERENCE_OBJECTS {
            return Err(TaxonomyError::InsufficientReferences {
                required: MIN_REFERENCE_OBJECTS,
                actual: references.len(),
            });
        }
        if !tolerance_factor.is_finite() || tolerance_factor < 0.0 {
            return Err(TaxonomyError::invalid_parameter(format!(
                "tolerance_factor must be >= 0, got {tolerance_factor}"
            )));
        }

        let morphometric_params =
            self.reference_parameters(&self.config.morphometric_keys, references, weights, tolerance_factor)?;
        let technological_params =
            self.reference_parameters(&self.config.technological_keys, references, weights, tolerance_factor)?;
        let optional_features = self.reference_optional_features(references);

        let validated_samples: Vec<String> = references
            .iter()
            .enumerate()
            .map(|(i, r)| {
                r.artifact_id()
                    .map_or_else(|| format!("ref_{i}"), str::to_string)
            })
            .collect();

        let now = Utc::now();
        let mut store = self.store.write();
        let class_id = store.allocate_id(class_name, now);

        let class = TaxonomicClass::new(ClassDefinition {
            class_id: class_id.clone(),
            name: class_name.to_string(),
            description: format!("Class defined from {} reference objects", references.len()),
            morphometric_params,
            technological_params,
            optional_features,
            confidence_threshold: self.config.confidence_threshold,
            created_date: now,
            created_by: SYSTEM_CREATOR.to_string(),
            validated_samples,
        })?;

        store.version_history.push(HistoryRecord::CreateClass {
            timestamp: now,
            class_id: class_id.clone(),
            parameter_hash: class.parameter_hash().to_string(),
            reference_count: references.len(),
        });
        let class = store.register(class);

        info!(
            class_id = %class_id,
            hash = %class.parameter_hash(),
            parameters = class.parameter_count(),
            references = references.len(),
            "class defined from reference group"
        );
        Ok(class)
    }

    fn reference_parameters(
        &self,
        keys: &[String],
        references: &[FeatureDictionary],
        weights: &BTreeMap<String, f64>,
        tolerance_factor: f64,
    ) -> TaxonomyResult<BTreeMap<String, ClassificationParameter>> {
        let mut params = BTreeMap::new();
        for key in keys {
            let values: Vec<f64> = references
                .iter()
                .filter_map(|r| r.lookup(key).and_then(FeatureValue::as_number))
                .collect();
            let (Some(mean), Some(std)) = (stats::mean(&values), stats::population_std(&values)) else {
                debug!(key = %key, "no reference values, parameter skipped");
                continue;
            };

            let param = ClassificationParameter::new(key.clone(), mean, mean - 2.0 * std, mean + 2.0 * std)?
                .with_weight(weights.get(key).copied().unwrap_or(1.0))?
                .with_tolerance(std * tolerance_factor)?
                .with_unit(DEFAULT_UNIT);
            params.insert(key.clone(), param);
        }
        Ok(params)
    }

    fn reference_optional_features(&self, references: &[FeatureDictionary]) -> BTreeMap<String, bool> {
        let mut optional = BTreeMap::new();
        for key in &self.config.optional_keys {
            let flags: Option<Vec<bool>> = references
                .iter()
                .map(|r| r.lookup(key).and_then(FeatureValue::as_truthy))
                .collect();
            let Some(flags) = flags else {
                continue;
            };
            let rate = flags.iter().filter(|b| **b).count() as f64 / flags.len() as f64;
            if rate >= self.config.presence_true_rate {
                optional.insert(key.clone(), true);
            } else if rate <= self.config.presence_false_rate {
                optional.insert(key.clone(), false);
            }
        }
        optional
    }

    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    /// Score `features` against every active class, best first, and log
    /// the outcome.
    pub fn classify_object(&self, features: &FeatureDictionary) -> Vec<ClassificationResult> {
        let classes = self.active_classes();
        let bonus = self.config.optional_feature_bonus;

        let mut results: Vec<ClassificationResult> = classes
            .iter()
            .map(|c| c.classify_with_bonus(features, bonus))
            .collect();
        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let best = results.first();
        self.log_classification(
            features,
            best.map(|r| r.class_id.clone()),
            best.map_or(0.0, |r| r.confidence),
        );
        results
    }

    /// Score `features` against one class (active or superseded) and log it.
    pub fn classify_against(
        &self,
        class_id: &str,
        features: &FeatureDictionary,
    ) -> TaxonomyResult<ClassificationResult> {
        let class = self
            .get_class(class_id)
            .ok_or_else(|| TaxonomyError::ClassNotFound(class_id.to_string()))?;
        let result = class.classify_with_bonus(features, self.config.optional_feature_bonus);
        self.log_classification(features, Some(result.class_id.clone()), result.confidence);
        Ok(result)
    }

    fn log_classification(&self, features: &FeatureDictionary, best_match: Option<String>, confidence: f64) {
        let object_id = features.artifact_id().unwrap_or(UNKNOWN_OBJECT).to_string();
        debug!(object_id = %object_id, best_match = ?best_match, confidence, "classification logged");
        self.store
            .write()
            .classification_log
            .push(ClassificationLogEntry {
                timestamp: Utc::now(),
                object_id,
                best_match,
                confidence,
            });
    }

    // ------------------------------------------------------------------------
    // Modification
    // ------------------------------------------------------------------------

    /// Register a revised copy of `class_id` as `<base>_v<N>`.
    ///
    /// The original keeps its ID and hash and is marked superseded.
    pub fn modify_class_parameters(
        &self,
        class_id: &str,
        changes: &ParameterChanges,
        justification: &str,
        operator: &str,
    ) -> TaxonomyResult<Arc<TaxonomicClass>> {
        if justification.trim().is_empty() {
            return Err(TaxonomyError::InvalidJustification);
        }
        if operator.trim().is_empty() {
            return Err(TaxonomyError::InvalidRole);
        }

        let mut store = self.store.write();
        let old = store
            .classes
            .get(class_id)
            .cloned()
            .ok_or_else(|| TaxonomyError::ClassNotFound(class_id.to_string()))?;
        if changes.is_empty() {
            return Err(TaxonomyError::NoEffectiveChange(class_id.to_string()));
        }

        let mut def = old.to_definition();
        for (kind, patches, params) in [
            ("morphometric", &changes.morphometric, &mut def.morphometric_params),
            ("technological", &changes.technological, &mut def.technological_params),
        ] {
            for (name, patch) in patches {
                let current = params.get(name).ok_or_else(|| TaxonomyError::UnknownParameter {
                    class_id: class_id.to_string(),
                    parameter: format!("{kind}.{name}"),
                })?;
                let patched = patch.apply(current)?;
                params.insert(name.clone(), patched);
            }
        }

        let now = Utc::now();
        let new_id = store.next_version_id(class_id);
        def.class_id = new_id.clone();
        def.created_date = now;
        def.created_by = operator.to_string();
        let new_class = TaxonomicClass::new(def)?;
        if new_class.parameter_hash() == old.parameter_hash() {
            return Err(TaxonomyError::NoEffectiveChange(class_id.to_string()));
        }

        store.version_history.push(HistoryRecord::ModifyClass {
            timestamp: now,
            old_class_id: class_id.to_string(),
            new_class_id: new_id.clone(),
            old_hash: old.parameter_hash().to_string(),
            new_hash: new_class.parameter_hash().to_string(),
            changes: changes.clone(),
            justification: justification.to_string(),
            operator: operator.to_string(),
        });
        let new_class = store.register(new_class);
        store.lifecycle.insert(
            class_id.to_string(),
            ClassStatus::Superseded { by: new_id.clone() },
        );

        info!(
            old_class_id = %class_id,
            new_class_id = %new_id,
            old_hash = %old.parameter_hash(),
            new_hash = %new_class.parameter_hash(),
            operator = %operator,
            "class parameters modified"
        );
        Ok(new_class)
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Density-cluster unlabeled objects over the configured discovery
    /// keys (standardized, absent keys as 0) and define
    /// `DiscoveredType_<k>` for every cluster of at least
    /// `min_cluster_size` members. Noise is left unclassified.
    pub fn discover_new_classes(
        &self,
        objects: &[FeatureDictionary],
        min_cluster_size: usize,
        eps: f64,
    ) -> TaxonomyResult<Vec<Arc<TaxonomicClass>>> {
        if objects.len() < min_cluster_size.max(1) {
            info!(objects = objects.len(), min_cluster_size, "too few objects for class discovery");
            return Ok(Vec::new());
        }

        let keys = &self.config.discovery_keys;
        let rows: Vec<Vec<f64>> = objects
            .iter()
            .map(|o| {
                keys.iter()
                    .map(|k| o.lookup(k).and_then(FeatureValue::as_numeric).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let scaled = Standardizer::fit(&rows)
            .map(|s| s.transform(&rows))
            .ok_or_else(|| TaxonomyError::invalid_parameter("discovery rows could not be standardized"))?;

        let labels = dbscan(
            &scaled,
            &DbscanParams {
                eps,
                min_samples: min_cluster_size,
            },
        )?;

        let mut clusters: BTreeMap<usize, Vec<FeatureDictionary>> = BTreeMap::new();
        for (object, label) in objects.iter().zip(&labels) {
            if let Some(label) = label {
                clusters.entry(*label).or_default().push(object.clone());
            }
        }
        let noise = labels.iter().filter(|l| l.is_none()).count();
        if noise > 0 {
            warn!(noise, "objects left unclassified as noise");
        }

        let weights: BTreeMap<String, f64> = keys.iter().map(|k| (k.clone(), 1.0)).collect();
        let mut discovered = Vec::new();
        for (label, members) in clusters {
            if members.len() < min_cluster_size {
                continue;
            }
            let class = self.define_class_from_reference_group(
                &format!("DiscoveredType_{label}"),
                &members,
                &weights,
                self.config.tolerance_factor,
            )?;
            discovered.push(class);
        }

        info!(classes = discovered.len(), objects = objects.len(), "class discovery finished");
        Ok(discovered)
    }

    // ------------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------------

    pub fn export(&self) -> TaxonomyExport {
        let store = self.store.read();
        TaxonomyExport {
            format_version: EXPORT_FORMAT_VERSION,
            classes: store
                .classes
                .iter()
                .map(|(id, c)| (id.clone(), TaxonomicClass::clone(c)))
                .collect(),
            version_history: store.version_history.clone(),
            classification_log: store.classification_log.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn export_json(&self) -> TaxonomyResult<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    pub fn export_to_path(&self, path: impl AsRef<Path>) -> TaxonomyResult<()> {
        let path = path.as_ref();
        let json = self.export_json()?;
        std::fs::write(path, json).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "taxonomy exported");
        Ok(())
    }

    /// Merge the document's classes and replace history and log.
    ///
    /// Every class hash is re-verified first; a single mismatch rejects the
    /// whole document and leaves the store untouched.
    pub fn import(&self, doc: TaxonomyExport) -> TaxonomyResult<usize> {
        if doc.format_version != EXPORT_FORMAT_VERSION {
            return Err(TaxonomyError::Serialization(format!(
                "unsupported format_version {} (expected {EXPORT_FORMAT_VERSION})",
                doc.format_version
            )));
        }
        for (key, class) in &doc.classes {
            if key != class.class_id() {
                return Err(TaxonomyError::invalid_parameter(format!(
                    "class keyed '{key}' has class_id '{}'",
                    class.class_id()
                )));
            }
            class.verify_hash()?;
        }

        let imported = doc.classes.len();
        let mut store = self.store.write();
        for (id, class) in doc.classes {
            store.classes.insert(id, Arc::new(class));
        }
        store.version_history = doc.version_history;
        store.classification_log = doc.classification_log;
        store.rebuild_lifecycle();

        info!(
            classes = imported,
            history = store.version_history.len(),
            log = store.classification_log.len(),
            "taxonomy imported"
        );
        Ok(imported)
    }

    pub fn import_json(&self, json: &str) -> TaxonomyResult<usize> {
        let doc: TaxonomyExport = serde_json::from_str(json)?;
        self.import(doc)
    }

    pub fn import_from_path(&self, path: impl AsRef<Path>) -> TaxonomyResult<usize> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_json(&json)
    }

    pub fn statistics(&self) -> TaxonomyStatistics {
        let store = self.store.read();
        let classes: BTreeMap<String, ClassSummary> = store
            .classes
            .iter()
            .map(|(id, c)| {
                let status = store
                    .lifecycle
                    .get(id)
                    .cloned()
                    .unwrap_or(ClassStatus::Active);
                (
                    id.clone(),
                    ClassSummary {
                        name: c.name().to_string(),
                        status,
                        parameter_hash: c.parameter_hash().to_string(),
                        n_validated_samples: c.validated_samples().len(),
                        n_parameters: c.parameter_count(),
                        confidence_threshold: c.confidence_threshold(),
                    },
                )
            })
            .collect();

        TaxonomyStatistics {
            n_classes: classes.len(),
            n_active_classes: store.active().count(),
            total_classifications: store.classification_log.len(),
            total_modifications: store
                .version_history
                .iter()
                .filter(|r| r.is_modification())
                .count(),
            classes,
        }
    }
}
