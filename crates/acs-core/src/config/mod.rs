//! Configuration management for the archaeological classifier.

mod sub_configs;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

pub use sub_configs::{
    ExtractionThresholds, LoggingConfig, MatrixConfig, MatrixMethod, TaxonomyConfig,
};

/// Environment variable selecting the environment-specific config file.
pub const ENV_SELECTOR: &str = "ACS_ENV";

/// Prefix for environment overrides, e.g. `ACS__MATRIX__MAX_CLUSTERS=6`.
pub const ENV_PREFIX: &str = "ACS";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub extraction: ExtractionThresholds,
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. config/default.toml (base settings)
    /// 2. config/{ACS_ENV}.toml (environment-specific)
    /// 3. Environment variables with ACS__ prefix
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var(ENV_SELECTOR).unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(env = %env, level = %config.logging.level, "configuration loaded");
        Ok(config)
    }

    /// Configuration with built-in defaults for testing/development.
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> CoreResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CoreError::ConfigError(format!(
                "logging.level must be one of {:?}, got '{}'",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }
        self.validate_extraction()?;
        self.validate_matrix()?;
        self.validate_taxonomy()?;
        Ok(())
    }

    fn validate_extraction(&self) -> CoreResult<()> {
        let e = &self.extraction;

        for (name, value) in [
            ("butt_region_fraction", e.butt_region_fraction),
            ("blade_region_fraction", e.blade_region_fraction),
            ("blade_adjacent_fraction", e.blade_adjacent_fraction),
            ("blade_edge_fraction", e.blade_edge_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(CoreError::ConfigError(format!(
                    "extraction.{name} must be in (0.0, 1.0], got {value}"
                )));
            }
        }

        for (name, value) in [
            ("edge_margin_fraction", e.edge_margin_fraction),
            ("body_margin_fraction", e.body_margin_fraction),
        ] {
            if !(0.0..0.5).contains(&value) {
                return Err(CoreError::ConfigError(format!(
                    "extraction.{name} must be in [0.0, 0.5), got {value}"
                )));
            }
        }

        for (name, value) in [
            ("socket_top_percentile", e.socket_top_percentile),
            ("socket_deep_percentile", e.socket_deep_percentile),
            ("socket_cluster_percentile", e.socket_cluster_percentile),
            ("edge_margin_percentile", e.edge_margin_percentile),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CoreError::ConfigError(format!(
                    "extraction.{name} must be in [0, 100], got {value}"
                )));
            }
        }

        if !(0.0..50.0).contains(&e.core_width_percentile) {
            return Err(CoreError::ConfigError(format!(
                "extraction.core_width_percentile must be in [0, 50), got {}",
                e.core_width_percentile
            )));
        }

        if e.curvature_radius_mm <= 0.0 {
            return Err(CoreError::ConfigError(
                "extraction.curvature_radius_mm must be greater than 0".into(),
            ));
        }

        if e.circular_aspect_min > e.circular_aspect_max {
            return Err(CoreError::ConfigError(format!(
                "extraction.circular_aspect_min ({}) exceeds circular_aspect_max ({})",
                e.circular_aspect_min, e.circular_aspect_max
            )));
        }

        if e.arc_ratio_flattened > e.arc_ratio_semicircular {
            return Err(CoreError::ConfigError(format!(
                "extraction.arc_ratio_flattened ({}) exceeds arc_ratio_semicircular ({})",
                e.arc_ratio_flattened, e.arc_ratio_semicircular
            )));
        }

        if e.body_band_edges < 2 {
            return Err(CoreError::ConfigError(
                "extraction.body_band_edges must be at least 2".into(),
            ));
        }

        Ok(())
    }

    fn validate_matrix(&self) -> CoreResult<()> {
        if self.matrix.max_clusters < 2 {
            return Err(CoreError::ConfigError(
                "matrix.max_clusters must be at least 2".into(),
            ));
        }
        if self.matrix.fusion_variance_threshold < 0.0 || self.matrix.bivalve_cv_threshold < 0.0 {
            return Err(CoreError::ConfigError(
                "matrix variability thresholds must be non-negative".into(),
            ));
        }
        Ok(())
    }

    fn validate_taxonomy(&self) -> CoreResult<()> {
        let t = &self.taxonomy;

        if !(0.0..=1.0).contains(&t.confidence_threshold) {
            return Err(CoreError::ConfigError(format!(
                "taxonomy.confidence_threshold must be in [0.0, 1.0], got {}",
                t.confidence_threshold
            )));
        }
        if t.tolerance_factor < 0.0 {
            return Err(CoreError::ConfigError(
                "taxonomy.tolerance_factor must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&t.presence_false_rate)
            || !(0.0..=1.0).contains(&t.presence_true_rate)
            || t.presence_false_rate >= t.presence_true_rate
        {
            return Err(CoreError::ConfigError(format!(
                "taxonomy presence rates must satisfy 0 <= false ({}) < true ({}) <= 1",
                t.presence_false_rate, t.presence_true_rate
            )));
        }
        if t.discovery_min_cluster_size < 2 {
            return Err(CoreError::ConfigError(
                "taxonomy.discovery_min_cluster_size must be at least 2".into(),
            ));
        }
        if t.discovery_eps <= 0.0 {
            return Err(CoreError::ConfigError(
                "taxonomy.discovery_eps must be greater than 0".into(),
            ));
        }
        if t.discovery_keys.is_empty() {
            return Err(CoreError::ConfigError(
                "taxonomy.discovery_keys must not be empty".into(),
            ));
        }
        Ok(())
    }
}
