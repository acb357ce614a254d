//! Corpus scenarios: persisted feature records -> matrices, fusions, PCA.

use acs_clustering::{
    estimate_fusions, AnalyzerState, ClusteringMethod, DistanceMetric, FusionConfidence,
    MatrixAnalyzer, MatrixOptions, MorphometricAnalyzer,
};
use acs_core::types::FeatureDictionary;

/// Persisted record shape: basic geometry at the top level, Savignano
/// measurements in the nested group.
fn record(id: &str, length: f64, weight: f64, socket: bool) -> FeatureDictionary {
    let json = format!(
        r#"{{
            "id": "{id}",
            "length": {length},
            "width": {width},
            "thickness": {thickness},
            "volume": {volume},
            "savignano": {{
                "artifact_id": "{id}",
                "inventory_number": "INV-{id}",
                "peso": {weight},
                "tallone_larghezza": {butt},
                "tallone_spessore": 9.0,
                "incavo_presente": {socket},
                "incavo_larghezza": {socket_w},
                "incavo_profondita": {socket_d},
                "incavo_profilo": "{profile}",
                "margini_rialzati_presenti": true,
                "margini_rialzati_lunghezza": {edges},
                "larghezza_minima": {min_w},
                "tagliente_larghezza": {blade},
                "tagliente_espanso": {expanded},
                "tagliente_forma": "arco_ribassato"
            }}
        }}"#,
        width = length * 0.35,
        thickness = length * 0.08,
        volume = length * length * 2.0,
        butt = length * 0.12,
        socket_w = if socket { 11.0 } else { 0.0 },
        socket_d = if socket { 3.5 } else { 0.0 },
        profile = if socket { "circolare" } else { "assente" },
        edges = length * 0.5,
        min_w = length * 0.15,
        blade = length * 0.3,
        expanded = !socket,
    );
    FeatureDictionary::from_json_str(&json).unwrap()
}

fn corpus() -> Vec<FeatureDictionary> {
    vec![
        record("SAV_01", 140.0, 380.0, true),
        record("SAV_02", 141.0, 383.0, true),
        record("SAV_03", 139.5, 379.0, true),
        record("SAV_04", 139.8, 381.0, true),
        record("SAV_05", 182.0, 500.0, false),
        record("SAV_06", 180.5, 540.0, false),
        record("SAV_07", 183.0, 511.0, false),
    ]
}

// =============================================================================
// Scenario 1: a single artifact
// =============================================================================

#[test]
fn fsv_single_artifact_is_one_matrix_without_metrics() {
    println!("\n=== FSV: n = 1 ===");
    let mut analyzer = MatrixAnalyzer::new(vec![record("SAV_01", 140.0, 380.0, true)]);
    println!("[BEFORE] state={:?}", analyzer.state());

    let result = analyzer.identify_matrices(&MatrixOptions::default()).unwrap();
    println!(
        "[AFTER] n_matrices={} method={:?} silhouette={:?}",
        result.n_matrices, result.method_used, result.silhouette_score
    );

    assert_eq!(result.n_matrices, 1);
    assert_eq!(result.method_used, ClusteringMethod::SingleSample);
    assert_eq!(result.silhouette_score, None);
    assert_eq!(result.davies_bouldin_score, None);
    assert_eq!(result.matrices[0].length_cv, None);
    assert_eq!(result.matrices[0].inventory_numbers, vec!["INV-SAV_01"]);
    assert_eq!(analyzer.state(), AnalyzerState::Ready);
    println!("[PASS] one artifact, one matrix, no validity metrics\n");
}

// =============================================================================
// Scenario 2: insertion order does not matter
// =============================================================================

#[test]
fn fsv_matrices_independent_of_insertion_order() {
    println!("\n=== FSV: insertion order ===");
    let forward = corpus();
    let mut reversed = corpus();
    reversed.reverse();

    let mut a = MatrixAnalyzer::new(forward);
    let mut b = MatrixAnalyzer::new(reversed);
    assert_eq!(a.prepare_matrix().unwrap(), b.prepare_matrix().unwrap());

    let ra = a.identify_matrices(&MatrixOptions::default()).unwrap();
    let rb = b.identify_matrices(&MatrixOptions::default()).unwrap();
    println!("[AFTER] labels={:?}", ra.labels);

    assert_eq!(ra, rb);
    assert_eq!(ra.n_matrices, 2);
    assert_eq!(ra.matrix_of("SAV_04"), Some("MAT_A"));
    assert_eq!(ra.matrix_of("SAV_06"), Some("MAT_B"));
    println!("[PASS] identical identification for permuted input\n");
}

// =============================================================================
// Scenario 3: fusion estimates
// =============================================================================

#[test]
fn fsv_fusion_estimates_follow_weight_spread() {
    println!("\n=== FSV: fusion estimates ===");
    let mut analyzer = MatrixAnalyzer::new(corpus());
    let identification = analyzer.identify_matrices(&MatrixOptions::default()).unwrap();
    let report = estimate_fusions(&identification, 0.02);

    for (id, est) in &report.per_matrix {
        println!(
            "[AFTER] {id}: fusions={} weight_cv={:?} confidence={:?}",
            est.estimated_fusions, est.weight_cv, est.confidence
        );
    }

    assert_eq!(report.total_fusions, 7);
    assert_eq!(report.per_matrix["MAT_A"].estimated_fusions, 4);
    // 379..383 g is tight, 500..540 g is not
    assert_eq!(report.per_matrix["MAT_A"].confidence, FusionConfidence::High);
    assert_eq!(report.per_matrix["MAT_B"].confidence, FusionConfidence::Medium);
    assert!(report.assumption.contains("one distinct casting event"));
    assert_eq!(analyzer.estimate_fusions(0.02).unwrap(), report);

    let assignments = analyzer.matrix_assignments().unwrap();
    assert_eq!(assignments[0].artifact_id, "SAV_01");
    assert_eq!(assignments[0].inventory_number, "INV-SAV_01");
    println!("[PASS] fusion confidence tracks weight variability\n");
}

// =============================================================================
// Scenario 4: general analyzer over the same records
// =============================================================================

#[test]
fn fsv_general_analyzer_pca_and_similarity() {
    println!("\n=== FSV: general analyzer ===");
    let mut analyzer = MorphometricAnalyzer::new();
    for r in corpus() {
        let id = r.artifact_id().unwrap().to_string();
        analyzer.add_features(&id, &r);
    }
    println!("[BEFORE] artifacts={}", analyzer.len());

    let pca = analyzer.fit_pca(None, 0.95).unwrap();
    println!(
        "[AFTER] components={} variance={:?}",
        pca.n_components, pca.explained_variance_ratio
    );
    assert!(pca.n_components >= 1);
    assert!(pca.cumulative_variance[pca.n_components - 1] >= 0.95);

    let nearest = analyzer
        .find_most_similar("SAV_01", 3, DistanceMetric::Euclidean)
        .unwrap();
    for (id, _) in &nearest {
        assert!(["SAV_02", "SAV_03", "SAV_04"].contains(&id.as_str()), "{id}");
    }
    println!("[PASS] nearest neighbours stay inside the mold group\n");
}
