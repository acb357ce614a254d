//! Typed extraction results and their dictionary form.

use std::collections::BTreeMap;

use acs_core::types::{FeatureDictionary, FeatureValue, ID_KEY, SAVIGNANO_GROUP};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Socket cross-section classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketProfile {
    #[serde(rename = "rettangolare")]
    Rectangular,
    #[serde(rename = "circolare")]
    Circular,
    #[serde(rename = "assente")]
    Absent,
    /// Socket detected but no concave vertices survived isolation
    #[serde(rename = "indeterminato")]
    Undetermined,
}

impl SocketProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketProfile::Rectangular => "rettangolare",
            SocketProfile::Circular => "circolare",
            SocketProfile::Absent => "assente",
            SocketProfile::Undetermined => "indeterminato",
        }
    }
}

/// Cutting-edge shape, binned by arc/chord ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BladeShape {
    #[serde(rename = "arco_ribassato")]
    FlattenedArc,
    #[serde(rename = "semicircolare")]
    Semicircular,
    #[serde(rename = "lunato")]
    Lunate,
    #[serde(rename = "indeterminato")]
    Undetermined,
}

impl BladeShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            BladeShape::FlattenedArc => "arco_ribassato",
            BladeShape::Semicircular => "semicircolare",
            BladeShape::Lunate => "lunato",
            BladeShape::Undetermined => "indeterminato",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketFeatures {
    pub present: bool,
    pub width: f64,
    pub depth: f64,
    pub profile: SocketProfile,
}

impl SocketFeatures {
    pub fn absent() -> Self {
        Self {
            present: false,
            width: 0.0,
            depth: 0.0,
            profile: SocketProfile::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtFeatures {
    pub width: f64,
    pub thickness: f64,
    pub socket: SocketFeatures,
}

impl Default for ButtFeatures {
    fn default() -> Self {
        Self {
            width: 0.0,
            thickness: 0.0,
            socket: SocketFeatures::absent(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaisedEdgeFeatures {
    pub present: bool,
    /// Longitudinal extent of the qualifying margins
    pub length: f64,
    /// Peak raise over the regional median
    pub max_thickness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyFeatures {
    pub min_width: f64,
    pub max_thickness_with_margins: f64,
    pub max_thickness_without_margins: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BladeFeatures {
    pub width: f64,
    pub shape: BladeShape,
    pub arc_length: f64,
    pub chord_length: f64,
    pub expanded: bool,
}

impl Default for BladeFeatures {
    fn default() -> Self {
        Self {
            width: 0.0,
            shape: BladeShape::Undetermined,
            arc_length: 0.0,
            chord_length: 0.0,
            expanded: false,
        }
    }
}

/// Oriented extents sorted descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralDimensions {
    pub length: f64,
    pub width: f64,
    pub thickness: f64,
}

/// Whole-mesh geometry reported alongside the Savignano measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshGeometry {
    pub volume: f64,
    pub surface_area: f64,
    pub length_width_ratio: f64,
    pub length_thickness_ratio: f64,
    pub width_thickness_ratio: f64,
    pub n_vertices: usize,
    pub n_faces: usize,
}

/// Record metadata supplied by the caller, not measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Weight in grams
    pub weight_g: Option<f64>,
    pub inventory_number: Option<String>,
}

/// Full Savignano measurement set for one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavignanoFeatures {
    pub artifact_id: String,
    pub butt: ButtFeatures,
    pub raised_edges: RaisedEdgeFeatures,
    pub body: BodyFeatures,
    pub blade: BladeFeatures,
    pub dimensions: GeneralDimensions,
}

impl SavignanoFeatures {
    /// Flat dictionary with the persisted Savignano key names plus record
    /// metadata (`artifact_id`, `peso`, `inventory_number`).
    ///
    /// A missing weight is stored as `peso = 0.0` and logged.
    pub fn to_dictionary(&self, metadata: &ArtifactMetadata) -> FeatureDictionary {
        let mut d = self.measurements();

        let peso = metadata.weight_g.unwrap_or_else(|| {
            warn!(artifact_id = %self.artifact_id, "no weight provided, setting peso=0");
            0.0
        });
        d.insert("artifact_id".into(), FeatureValue::from(self.artifact_id.as_str()));
        d.insert("peso".into(), FeatureValue::Number(peso));
        d.insert(
            "inventory_number".into(),
            FeatureValue::Label(
                metadata
                    .inventory_number
                    .clone()
                    .unwrap_or_else(|| self.artifact_id.clone()),
            ),
        );

        FeatureDictionary::from(d)
    }

    fn measurements(&self) -> BTreeMap<String, FeatureValue> {
        let b = &self.butt;
        let e = &self.raised_edges;
        let body = &self.body;
        let bl = &self.blade;
        let dims = &self.dimensions;

        let entries: [(&str, FeatureValue); 20] = [
            ("tallone_larghezza", b.width.into()),
            ("tallone_spessore", b.thickness.into()),
            ("incavo_presente", b.socket.present.into()),
            ("incavo_larghezza", b.socket.width.into()),
            ("incavo_profondita", b.socket.depth.into()),
            ("incavo_profilo", b.socket.profile.as_str().into()),
            ("margini_rialzati_presenti", e.present.into()),
            ("margini_rialzati_lunghezza", e.length.into()),
            ("margini_rialzati_spessore_max", e.max_thickness.into()),
            ("larghezza_minima", body.min_width.into()),
            ("spessore_massimo_con_margini", body.max_thickness_with_margins.into()),
            ("spessore_massimo_senza_margini", body.max_thickness_without_margins.into()),
            ("tagliente_larghezza", bl.width.into()),
            ("tagliente_forma", bl.shape.as_str().into()),
            ("tagliente_arco_misura", bl.arc_length.into()),
            ("tagliente_corda_misura", bl.chord_length.into()),
            ("tagliente_espanso", bl.expanded.into()),
            ("length", dims.length.into()),
            ("width", dims.width.into()),
            ("thickness", dims.thickness.into()),
        ];

        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Persisted artifact record: basic geometry at the top level and the
    /// Savignano dictionary nested under `savignano`.
    pub fn artifact_record(
        &self,
        geometry: &MeshGeometry,
        metadata: &ArtifactMetadata,
    ) -> FeatureDictionary {
        let dims = &self.dimensions;
        let savignano: BTreeMap<String, FeatureValue> = self
            .to_dictionary(metadata)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        FeatureDictionary::new()
            .with(ID_KEY, self.artifact_id.as_str())
            .with("volume", geometry.volume)
            .with("surface_area", geometry.surface_area)
            .with("length", dims.length)
            .with("width", dims.width)
            .with("thickness", dims.thickness)
            .with("length_width_ratio", geometry.length_width_ratio)
            .with("length_thickness_ratio", geometry.length_thickness_ratio)
            .with("width_thickness_ratio", geometry.width_thickness_ratio)
            .with("n_vertices", geometry.n_vertices as f64)
            .with("n_faces", geometry.n_faces as f64)
            .with(SAVIGNANO_GROUP, FeatureValue::Group(savignano))
    }
}
