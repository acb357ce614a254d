//! Mesh unit resolution (mesh units -> millimetres).

use std::fmt;
use std::str::FromStr;

use acs_core::types::Mesh;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MorphometryError, MorphometryResult};

/// Length unit a scan was exported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshUnits {
    Mm,
    Cm,
    M,
    In,
}

impl MeshUnits {
    /// Multiplier converting this unit to millimetres.
    pub fn to_mm(self) -> f64 {
        match self {
            MeshUnits::Mm => 1.0,
            MeshUnits::Cm => 10.0,
            MeshUnits::M => 1000.0,
            MeshUnits::In => 25.4,
        }
    }
}

impl FromStr for MeshUnits {
    type Err = MorphometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" => Ok(MeshUnits::Mm),
            "cm" => Ok(MeshUnits::Cm),
            "m" => Ok(MeshUnits::M),
            "in" | "inch" => Ok(MeshUnits::In),
            other => Err(MorphometryError::UnknownUnits(other.to_string())),
        }
    }
}

impl fmt::Display for MeshUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeshUnits::Mm => "mm",
            MeshUnits::Cm => "cm",
            MeshUnits::M => "m",
            MeshUnits::In => "in",
        };
        f.write_str(s)
    }
}

/// How to turn mesh coordinates into millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitScale {
    /// Explicit multiplier
    Factor(f64),
    /// Known export unit
    Units(MeshUnits),
    /// Guess from the largest bounding-box extent: < 1 reads as metres,
    /// < 10 as centimetres, anything else as millimetres
    Auto,
}

impl Default for UnitScale {
    fn default() -> Self {
        UnitScale::Factor(1.0)
    }
}

impl UnitScale {
    /// Resolve to a multiplier for `mesh`.
    pub fn resolve(&self, mesh: &Mesh) -> MorphometryResult<f64> {
        let factor = match self {
            UnitScale::Factor(f) => *f,
            UnitScale::Units(units) => units.to_mm(),
            UnitScale::Auto => {
                let max_extent = mesh.extents().into_iter().fold(0.0, f64::max);
                let factor = if max_extent < 1.0 {
                    1000.0
                } else if max_extent < 10.0 {
                    10.0
                } else {
                    1.0
                };
                info!(max_extent, factor, "auto-detected mesh scale");
                factor
            }
        };

        if !factor.is_finite() || factor <= 0.0 {
            return Err(MorphometryError::InvalidScale(factor));
        }
        Ok(factor)
    }
}
