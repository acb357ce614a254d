//! Registry scenarios: define, classify, revise, export/import, discover.

use std::collections::{BTreeMap, BTreeSet};

use acs_core::types::FeatureDictionary;
use acs_taxonomy::{
    ClassStatus, ClassificationFailure, HistoryRecord, ParameterChanges, ParameterPatch,
    TaxonomyError, TaxonomySystem,
};

fn axe(id: &str, volume: f64, length: f64, width: f64, thickness: f64) -> FeatureDictionary {
    FeatureDictionary::new()
        .with("id", id)
        .with("volume", volume)
        .with("length", length)
        .with("width", width)
        .with("thickness", thickness)
}

// =============================================================================
// Scenario 1: hard-gate rejection
// =============================================================================

#[test]
fn fsv_outlier_rejected_by_hard_gate() {
    println!("\n=== FSV: hard gate ===");
    let system = TaxonomySystem::default();
    let refs = [
        axe("REF_1", 52_000.0, 150.0, 50.0, 12.0),
        axe("REF_2", 52_000.0, 150.0, 50.0, 12.0),
    ];
    let class = system
        .define_class_from_reference_group("Twin", &refs, &BTreeMap::new(), 0.15)
        .unwrap();
    println!(
        "[BEFORE] class={} length range={:?}",
        class.class_id(),
        (
            class.morphometric_params()["length"].min_threshold,
            class.morphometric_params()["length"].max_threshold
        )
    );

    let outlier = axe("OUTLIER", 52_000.0, 158.0, 50.0, 12.0);
    let result = system
        .classify_against(class.class_id(), &outlier)
        .unwrap();
    println!("[AFTER] member={} failure={:?}", result.is_member, result.failure);

    assert!(!result.is_member);
    assert_eq!(result.confidence, 0.0);
    match result.failure {
        Some(ClassificationFailure::ValidationRangeExceeded { parameter, measured, .. }) => {
            assert_eq!(parameter, "length");
            assert_eq!(measured, 158.0);
        }
        other => panic!("expected a hard-gate failure, got {other:?}"),
    }

    // The references themselves still match perfectly.
    let own = system.classify_against(class.class_id(), &refs[0]).unwrap();
    assert!(own.is_member);
    assert!((own.confidence - 1.0).abs() < 1e-12);
    println!("[PASS] outlier vetoed on length\n");
}

// =============================================================================
// Scenario 2: export / import round trip
// =============================================================================

#[test]
fn fsv_export_import_preserves_hashes_and_audit_log() {
    println!("\n=== FSV: export / import ===");
    let system = TaxonomySystem::default();
    for (name, base) in [("Alpha", 100.0), ("Beta", 140.0), ("Gamma", 180.0)] {
        let refs: Vec<FeatureDictionary> = (0..3)
            .map(|i| {
                let l = base + i as f64;
                axe(&format!("{name}_{i}"), l * 300.0, l, l * 0.35, l * 0.08)
            })
            .collect();
        system
            .define_class_from_reference_group(name, &refs, &BTreeMap::new(), 0.15)
            .unwrap();
    }
    system.classify_object(&axe("Q1", 30_300.0, 101.0, 35.35, 8.08));
    system.classify_object(&axe("Q2", 54_000.0, 180.0, 63.0, 14.4));

    let history = system.version_history();
    let log = system.classification_log();
    assert_eq!(history.len() + log.len(), 5);
    println!("[BEFORE] classes={} history={} log={}", system.classes().len(), history.len(), log.len());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taxonomy.json");
    system.export_to_path(&path).unwrap();

    let restored = TaxonomySystem::default();
    let imported = restored.import_from_path(&path).unwrap();
    println!("[AFTER] imported={imported}");

    assert_eq!(imported, 3);
    for original in system.classes() {
        let copy = restored.get_class(original.class_id()).unwrap();
        assert_eq!(copy.parameter_hash(), original.parameter_hash());
        assert_eq!(*copy, *original);
    }
    assert_eq!(restored.version_history(), history);
    assert_eq!(restored.classification_log(), log);

    // Behaviour survives the round trip too.
    let query = axe("Q3", 42_300.0, 141.0, 49.35, 11.28);
    let before = system.classify_object(&query);
    let after = restored.classify_object(&query);
    assert_eq!(before, after);
    println!("[PASS] 3 classes and 5 audit records reproduced\n");
}

#[test]
fn fsv_import_rebuilds_superseded_lifecycle() {
    let system = TaxonomySystem::default();
    let refs = [
        axe("A", 30_000.0, 100.0, 35.0, 8.0),
        axe("B", 30_600.0, 102.0, 35.7, 8.2),
    ];
    let v1 = system
        .define_class_from_reference_group("Lineage", &refs, &BTreeMap::new(), 0.15)
        .unwrap();
    let changes = ParameterChanges::default().morphometric(
        "width",
        ParameterPatch {
            weight: Some(2.0),
            ..Default::default()
        },
    );
    let v2 = system
        .modify_class_parameters(v1.class_id(), &changes, "width is diagnostic", "curator")
        .unwrap();

    let restored = TaxonomySystem::default();
    restored.import_json(&system.export_json().unwrap()).unwrap();
    assert_eq!(
        restored.class_status(v1.class_id()),
        Some(ClassStatus::Superseded {
            by: v2.class_id().to_string()
        })
    );
    assert_eq!(restored.class_status(v2.class_id()), Some(ClassStatus::Active));
    assert!(matches!(
        restored.version_history().last(),
        Some(HistoryRecord::ModifyClass { justification, .. }) if justification == "width is diagnostic"
    ));
}

#[test]
fn fsv_modification_without_effect_is_rejected() {
    println!("\n=== FSV: no-op modification ===");
    let system = TaxonomySystem::default();
    let refs = [
        axe("A", 30_000.0, 100.0, 35.0, 8.0),
        axe("B", 30_600.0, 102.0, 35.7, 8.2),
    ];
    let v1 = system
        .define_class_from_reference_group("Steady", &refs, &BTreeMap::new(), 0.15)
        .unwrap();
    let history_before = system.version_history().len();
    println!("[BEFORE] class={} history={history_before}", v1.class_id());

    let empty = system.modify_class_parameters(
        v1.class_id(),
        &ParameterChanges::default(),
        "no reason",
        "curator",
    );
    assert!(matches!(empty, Err(TaxonomyError::NoEffectiveChange(ref id)) if id == v1.class_id()));

    // A patch that restates the current values leaves the hash unchanged.
    let current = v1.morphometric_params()["width"].clone();
    let restated = ParameterChanges::default().morphometric(
        "width",
        ParameterPatch {
            value: Some(current.value),
            weight: Some(current.weight),
            ..Default::default()
        },
    );
    let same = system.modify_class_parameters(v1.class_id(), &restated, "restated", "curator");
    assert!(matches!(same, Err(TaxonomyError::NoEffectiveChange(_))));

    println!(
        "[AFTER] status={:?} history={}",
        system.class_status(v1.class_id()),
        system.version_history().len()
    );
    assert_eq!(system.class_status(v1.class_id()), Some(ClassStatus::Active));
    assert_eq!(system.version_history().len(), history_before);
    assert_eq!(system.classes().len(), 1);
    println!("[PASS] no-op revisions leave the registry untouched\n");
}

// =============================================================================
// Scenario 3: discovery
// =============================================================================

#[test]
fn fsv_discovery_partitions_two_separated_groups() {
    println!("\n=== FSV: class discovery ===");
    let system = TaxonomySystem::default();
    let mut objects = Vec::new();
    for (prefix, base) in [("S", 100.0), ("L", 200.0)] {
        for i in 0..10 {
            let l = base + i as f64 * 0.1;
            objects.push(axe(&format!("{prefix}{i:02}"), l * 300.0, l, l * 0.35, l * 0.08));
        }
    }
    println!("[BEFORE] objects={}", objects.len());

    let discovered = system.discover_new_classes(&objects, 5, 0.3).unwrap();
    println!(
        "[AFTER] discovered={:?}",
        discovered.iter().map(|c| c.class_id().to_string()).collect::<Vec<_>>()
    );

    assert_eq!(discovered.len(), 2);
    assert_eq!(discovered[0].name(), "DiscoveredType_0");
    assert_eq!(discovered[1].name(), "DiscoveredType_1");

    let mut seen = BTreeSet::new();
    for class in &discovered {
        assert_eq!(class.validated_samples().len(), 10);
        let prefix = &class.validated_samples()[0][..1];
        for id in class.validated_samples() {
            assert!(id.starts_with(prefix), "{id} mixed into {}", class.class_id());
            assert!(seen.insert(id.clone()), "{id} assigned twice");
        }
        assert_eq!(class.morphometric_params().len(), 4);
    }
    assert_eq!(seen.len(), 20);
    assert_eq!(system.statistics().n_classes, 2);
    println!("[PASS] two classes partition the 20 inputs\n");
}
