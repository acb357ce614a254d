//! Tests for configuration validation.

use crate::config::Config;

#[test]
fn test_validation_fails_unknown_log_level() {
    let mut config = Config::default_config();
    config.logging.level = "verbose".into();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("logging.level"), "got: {err}");
}

#[test]
fn test_validation_fails_zero_region_fraction() {
    let mut config = Config::default_config();
    config.extraction.butt_region_fraction = 0.0;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("butt_region_fraction"), "got: {err}");
}

#[test]
fn test_validation_fails_inverted_aspect_window() {
    let mut config = Config::default_config();
    config.extraction.circular_aspect_min = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_fails_inverted_arc_breakpoints() {
    let mut config = Config::default_config();
    config.extraction.arc_ratio_flattened = 2.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_fails_single_cluster_sweep() {
    let mut config = Config::default_config();
    config.matrix.max_clusters = 1;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("max_clusters"), "got: {err}");
}

#[test]
fn test_validation_fails_confidence_out_of_range() {
    let mut config = Config::default_config();
    config.taxonomy.confidence_threshold = 1.2;
    assert!(config.validate().is_err());

    config.taxonomy.confidence_threshold = 1.0;
    assert!(config.validate().is_ok(), "1.0 is a valid boundary");
}

#[test]
fn test_validation_fails_overlapping_presence_rates() {
    let mut config = Config::default_config();
    config.taxonomy.presence_false_rate = 0.9;
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_fails_empty_discovery_keys() {
    let mut config = Config::default_config();
    config.taxonomy.discovery_keys.clear();
    assert!(config.validate().is_err());
}
