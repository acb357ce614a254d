//! Sub-configuration structures for the classifier components.
//!
//! This module contains all the individual configuration structs
//! that make up the main `Config` structure.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            include_location: false,
        }
    }
}

// ============================================================================
// Extraction Thresholds
// ============================================================================

/// Heuristic thresholds used by the Savignano feature extractor.
///
/// All region fractions are relative to the length-axis extent `L` of the
/// oriented mesh. Percentiles are on the 0-100 scale with linear
/// interpolation. Distances are in millimetres after unit scaling.
///
/// The defaults reproduce the tuned values of the reference tool; the socket
/// OR-gate (`curvature_threshold` OR `socket_depth_threshold_mm`) and the
/// geometric-mean width estimator depend on them exactly.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExtractionThresholds {
    /// Share of `L` taken as the butt region (default: 0.10)
    pub butt_region_fraction: f64,
    /// Share of `L` taken as the blade region (default: 0.10)
    pub blade_region_fraction: f64,
    /// Minimum vertices in the butt region (default: 10)
    pub min_butt_vertices: usize,
    /// Minimum top-surface vertices for socket analysis (default: 20)
    pub min_socket_vertices: usize,
    /// Thickness percentile selecting the top surface (default: 75)
    pub socket_top_percentile: f64,
    /// Neighbourhood radius for local curvature, mm (default: 3.0)
    pub curvature_radius_mm: f64,
    /// Neighbours required before a curvature sample counts (default: 5)
    pub curvature_min_neighbors: usize,
    /// Mean curvature that declares a socket (default: 0.2)
    pub curvature_threshold: f64,
    /// Depth range that declares a socket, mm (default: 1.0)
    pub socket_depth_threshold_mm: f64,
    /// Thickness percentile selecting the deepest socket vertices (default: 0.5)
    pub socket_deep_percentile: f64,
    /// Planar-distance percentile kept around the socket centre (default: 60)
    pub socket_cluster_percentile: f64,
    /// Clustered points required for the geometric-mean width (default: 5)
    pub socket_min_cluster_points: usize,
    /// Lower bound of the circular aspect-ratio window (default: 0.7)
    pub circular_aspect_min: f64,
    /// Upper bound of the circular aspect-ratio window (default: 1.3)
    pub circular_aspect_max: f64,
    /// Share of `L` trimmed from each end for raised-edge analysis (default: 0.20)
    pub edge_margin_fraction: f64,
    /// Minimum vertices in the raised-edge region (default: 50)
    pub min_edge_vertices: usize,
    /// Width percentile defining each lateral margin (default: 5)
    pub edge_margin_percentile: f64,
    /// Margin raise over the regional median that flags a flange, mm (default: 0.5)
    pub edge_raise_threshold_mm: f64,
    /// Share of `L` trimmed from each end for body analysis (default: 0.15)
    pub body_margin_fraction: f64,
    /// Minimum vertices in the body region (default: 20)
    pub min_body_vertices: usize,
    /// Number of band edges along the body; bands = edges - 1 (default: 20)
    pub body_band_edges: usize,
    /// A band counts when it holds more than this many vertices (default: 5)
    pub min_band_vertices: usize,
    /// Width percentile bounding the core (flange-free) strip (default: 25)
    pub core_width_percentile: f64,
    /// Core vertices required, otherwise the with-margins value is reused (default: 10)
    pub min_core_vertices: usize,
    /// Minimum vertices in the blade region (default: 20)
    pub min_blade_vertices: usize,
    /// Share of `L` forming the body band adjacent to the blade (default: 0.30)
    pub blade_adjacent_fraction: f64,
    /// Adjacent-band vertices required for the expansion test (default: 10)
    pub min_adjacent_vertices: usize,
    /// Blade/adjacent width ratio above which the blade is expanded (default: 1.1)
    pub blade_expansion_ratio: f64,
    /// Share of the blade extent forming the cutting-edge profile (default: 0.05)
    pub blade_edge_fraction: f64,
    /// Minimum cutting-edge vertices (default: 10)
    pub min_edge_profile_vertices: usize,
    /// Arc/chord ratio below which the edge is a flattened arc (default: 1.15)
    pub arc_ratio_flattened: f64,
    /// Arc/chord ratio below which the edge is semicircular (default: 1.4)
    pub arc_ratio_semicircular: f64,
    /// Flip the oriented mesh so the narrower end is the butt (default: true)
    pub resolve_polarity: bool,
}

impl Default for ExtractionThresholds {
    fn default() -> Self {
        Self {
            butt_region_fraction: 0.10,
            blade_region_fraction: 0.10,
            min_butt_vertices: 10,
            min_socket_vertices: 20,
            socket_top_percentile: 75.0,
            curvature_radius_mm: 3.0,
            curvature_min_neighbors: 5,
            curvature_threshold: 0.2,
            socket_depth_threshold_mm: 1.0,
            socket_deep_percentile: 0.5,
            socket_cluster_percentile: 60.0,
            socket_min_cluster_points: 5,
            circular_aspect_min: 0.7,
            circular_aspect_max: 1.3,
            edge_margin_fraction: 0.20,
            min_edge_vertices: 50,
            edge_margin_percentile: 5.0,
            edge_raise_threshold_mm: 0.5,
            body_margin_fraction: 0.15,
            min_body_vertices: 20,
            body_band_edges: 20,
            min_band_vertices: 5,
            core_width_percentile: 25.0,
            min_core_vertices: 10,
            min_blade_vertices: 20,
            blade_adjacent_fraction: 0.30,
            min_adjacent_vertices: 10,
            blade_expansion_ratio: 1.1,
            blade_edge_fraction: 0.05,
            min_edge_profile_vertices: 10,
            arc_ratio_flattened: 1.15,
            arc_ratio_semicircular: 1.4,
            resolve_polarity: true,
        }
    }
}

// ============================================================================
// Matrix Analysis
// ============================================================================

/// Clustering algorithm used to group artifacts into casting matrices.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatrixMethod {
    /// Agglomerative clustering with Ward linkage
    #[default]
    Hierarchical,
    /// K-Means with k-means++ seeding
    Kmeans,
}

/// Matrix analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MatrixConfig {
    /// Upper bound of the silhouette sweep (default: 10)
    pub max_clusters: usize,
    /// Clustering method (default: hierarchical)
    pub method: MatrixMethod,
    /// Weight CV below which a fusion estimate is high-confidence (default: 0.02)
    pub fusion_variance_threshold: f64,
    /// Mean dimensional CV below which a matrix reads as bivalve (default: 0.05)
    pub bivalve_cv_threshold: f64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            max_clusters: 10,
            method: MatrixMethod::Hierarchical,
            fusion_variance_threshold: 0.02,
            bivalve_cv_threshold: 0.05,
        }
    }
}

// ============================================================================
// Taxonomy
// ============================================================================

/// Formal taxonomy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Tolerance = std * factor when defining a class (default: 0.15)
    pub tolerance_factor: f64,
    /// Membership threshold for new classes (default: 0.75)
    pub confidence_threshold: f64,
    /// Score added per matching optional feature (default: 0.2)
    pub optional_feature_bonus: f64,
    /// Presence rate at or above which a feature is expected true (default: 0.8)
    pub presence_true_rate: f64,
    /// Presence rate at or below which a feature is expected false (default: 0.2)
    pub presence_false_rate: f64,
    /// DBSCAN min cluster size for class discovery (default: 5)
    pub discovery_min_cluster_size: usize,
    /// DBSCAN radius in standardized units for class discovery (default: 0.3)
    pub discovery_eps: f64,
    /// Numeric keys turned into morphometric parameters
    pub morphometric_keys: Vec<String>,
    /// Numeric keys turned into technological parameters
    pub technological_keys: Vec<String>,
    /// Boolean keys inferred as optional features
    pub optional_keys: Vec<String>,
    /// Core dimensions clustered during discovery
    pub discovery_keys: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            tolerance_factor: 0.15,
            confidence_threshold: 0.75,
            optional_feature_bonus: 0.2,
            presence_true_rate: 0.8,
            presence_false_rate: 0.2,
            discovery_min_cluster_size: 5,
            discovery_eps: 0.3,
            morphometric_keys: keys(&["volume", "length", "width", "thickness", "surface_area"]),
            technological_keys: keys(&[
                "socket_depth",
                "socket_diameter",
                "edge_angle",
                "hammering_index",
            ]),
            optional_keys: keys(&["has_socket", "has_midrib", "hammered"]),
            discovery_keys: keys(&["volume", "length", "width", "thickness"]),
        }
    }
}
