//! Mesh loading and batch extraction over a directory.
//!
//! Supported inputs:
//!
//! - `.json`: `{ "vertices": [[x, y, z], ...], "faces": [[i, j, k], ...] }`
//! - `.obj`: Wavefront `v` and `f` records; polygons are fan-triangulated,
//!   `v/vt/vn` and negative (relative) indices are accepted.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use acs_core::config::ExtractionThresholds;
use acs_core::types::{FeatureDictionary, Mesh, RawMesh};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{MorphometryError, MorphometryResult};
use crate::extractor::{ArtifactMetadata, MorphometricExtractor};
use crate::scale::UnitScale;

const MESH_EXTENSIONS: [&str; 2] = ["obj", "json"];

/// Load a mesh, choosing the parser by file extension.
pub fn load_mesh(path: &Path) -> MorphometryResult<Mesh> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let text = fs::read_to_string(path).map_err(|source| MorphometryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match ext.as_str() {
        "obj" => parse_obj(&text, path),
        "json" => {
            let raw: RawMesh =
                serde_json::from_str(&text).map_err(|e| MorphometryError::Parse {
                    path: path.to_path_buf(),
                    line: e.line(),
                    message: e.to_string(),
                })?;
            Ok(Mesh::new(raw.vertices, raw.faces)?)
        }
        other => Err(MorphometryError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse Wavefront OBJ text.
pub fn parse_obj(text: &str, path: &Path) -> MorphometryResult<Mesh> {
    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[usize; 3]> = Vec::new();

    let parse_err = |line: usize, message: String| MorphometryError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    for (n, raw_line) in text.lines().enumerate() {
        let line_no = n + 1;
        let mut parts = raw_line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords: Vec<f64> = parts
                    .take(3)
                    .map(|p| p.parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| parse_err(line_no, format!("bad vertex coordinate: {e}")))?;
                if coords.len() != 3 {
                    return Err(parse_err(line_no, "vertex needs 3 coordinates".into()));
                }
                vertices.push([coords[0], coords[1], coords[2]]);
            }
            Some("f") => {
                let indices: Vec<usize> = parts
                    .map(|p| resolve_obj_index(p, vertices.len()))
                    .collect::<Option<_>>()
                    .ok_or_else(|| parse_err(line_no, format!("bad face record '{raw_line}'")))?;
                if indices.len() < 3 {
                    return Err(parse_err(line_no, "face needs at least 3 vertices".into()));
                }
                for k in 1..indices.len() - 1 {
                    faces.push([indices[0], indices[k], indices[k + 1]]);
                }
            }
            _ => {}
        }
    }

    Ok(Mesh::new(vertices, faces)?)
}

/// 1-based (or negative, relative) OBJ index to 0-based.
fn resolve_obj_index(token: &str, vertex_count: usize) -> Option<usize> {
    let head = token.split('/').next()?;
    let idx: i64 = head.parse().ok()?;
    if idx > 0 {
        Some(idx as usize - 1)
    } else if idx < 0 {
        vertex_count.checked_sub(idx.unsigned_abs() as usize)
    } else {
        None
    }
}

// ============================================================================
// Batch extraction
// ============================================================================

/// A mesh that could not be processed in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub artifact_id: String,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Artifact records in file-name order
    pub records: Vec<FeatureDictionary>,
    pub failures: Vec<BatchFailure>,
}

/// Extract artifact records for every mesh file in `dir`.
///
/// The artifact ID is the file stem; `metadata` supplies weight and
/// inventory number per ID. Individual failures are collected and logged;
/// the call only fails when the directory is unreadable or every mesh failed.
pub fn extract_directory(
    dir: &Path,
    scale: UnitScale,
    thresholds: &ExtractionThresholds,
    metadata: &BTreeMap<String, ArtifactMetadata>,
) -> MorphometryResult<BatchOutcome> {
    let entries = fs::read_dir(dir).map_err(|source| MorphometryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| MESH_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    files.sort();

    info!(count = files.len(), dir = %dir.display(), "mesh files found");
    if files.is_empty() {
        warn!(dir = %dir.display(), "no .obj or .json meshes found");
    }

    let mut outcome = BatchOutcome::default();
    for path in &files {
        let artifact_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = metadata.get(&artifact_id).cloned().unwrap_or_default();

        let result = load_mesh(path).and_then(|mesh| {
            MorphometricExtractor::new(&mesh, artifact_id.clone(), scale, thresholds)
        });
        match result {
            Ok(extractor) => outcome.records.push(extractor.extract_record(&meta)),
            Err(e) => {
                error!(artifact_id = %artifact_id, error = %e, "extraction failed");
                outcome.failures.push(BatchFailure {
                    artifact_id,
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        succeeded = outcome.records.len(),
        failed = outcome.failures.len(),
        "batch completed"
    );

    if outcome.records.is_empty() && !files.is_empty() {
        return Err(MorphometryError::BatchFailed {
            attempted: files.len(),
        });
    }
    Ok(outcome)
}
