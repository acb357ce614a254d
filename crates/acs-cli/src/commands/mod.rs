//! CLI command handlers
//!
//! # Modules
//!
//! - `process`: extract one mesh into an artifact record
//! - `batch`: extract every mesh in a directory
//! - `matrices`: casting-matrix identification over stored records
//! - `taxonomy`: define, revise, discover, list and classify against classes
//!
//! Handlers return a process exit code; see [`crate::error::CliExitCode`].

pub mod batch;
pub mod matrices;
pub mod process;
pub mod taxonomy;

use std::fs;
use std::path::Path;

use acs_core::config::Config;
use acs_core::types::FeatureDictionary;
use acs_morphometry::{MeshUnits, UnitScale};
use anyhow::{bail, Context};
use serde::Serialize;
use tracing::error;

use crate::error::{exit_code_for_error, CliExitCode};

/// Resolve configuration: an explicit file wins over the layered defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::from_file(p).with_context(|| format!("loading config {}", p.display())),
        None => Config::load().context("loading layered configuration"),
    }
}

/// Turn `--units` / `--scale` into a [`UnitScale`].
pub fn unit_scale(units: Option<&str>, scale: Option<f64>) -> anyhow::Result<UnitScale> {
    match (units, scale) {
        (Some(_), Some(_)) => bail!("--units and --scale are mutually exclusive"),
        (None, Some(f)) => Ok(UnitScale::Factor(f)),
        (Some(u), None) if u.eq_ignore_ascii_case("auto") => Ok(UnitScale::Auto),
        (Some(u), None) => Ok(UnitScale::Units(u.parse::<MeshUnits>()?)),
        (None, None) => Ok(UnitScale::default()),
    }
}

/// Read artifact records from a JSON file holding one object or an array.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<FeatureDictionary>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        single @ serde_json::Value::Object(_) => vec![single],
        _ => bail!("{} must contain a JSON object or array of objects", path.display()),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            FeatureDictionary::from_json_value(item)
                .with_context(|| format!("record {i} in {}", path.display()))
        })
        .collect()
}

/// Pretty-print `value` to `output`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

/// Log a handler failure and convert it to an exit code.
pub(crate) fn finish(command: &str, result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => CliExitCode::Success.into(),
        Err(e) => {
            error!(command, error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            exit_code_for_error(&e).into()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic scan files.

    use std::fs;
    use std::path::Path;

    /// Write a JSON mesh: a two-layer grid through a slab tapering from
    /// `length * 0.08` half-width at the butt to `length * 0.17` at the blade.
    pub fn write_slab_mesh(path: &Path, length: f64) {
        let (nx, ny) = (60, 12);
        let thickness = length * 0.09;
        let mut vertices = Vec::new();
        for i in 0..nx {
            let t = i as f64 / (nx - 1) as f64;
            let x = -length / 2.0 + t * length;
            let half_w = length * (0.17 + t * (0.08 - 0.17));
            for j in 0..ny {
                let y = -half_w + 2.0 * half_w * j as f64 / (ny - 1) as f64;
                for z in [-thickness / 2.0, thickness / 2.0] {
                    vertices.push([x, y, z]);
                }
            }
        }
        let doc = serde_json::json!({ "vertices": vertices, "faces": [] });
        fs::write(path, doc.to_string()).unwrap();
    }
}
