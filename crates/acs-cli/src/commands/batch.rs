//! `acs batch`: extract every mesh in a directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use acs_core::config::ExtractionThresholds;
use acs_morphometry::{extract_directory, ArtifactMetadata, BatchOutcome};
use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use super::{finish, unit_scale, write_json};

/// Arguments for `acs batch`.
///
/// # Example
///
/// ```bash
/// acs batch scans/ --metadata weights.json -o records.json
/// ```
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory of .obj / .json meshes; the file stem is the artifact ID
    pub dir: PathBuf,

    /// JSON object mapping artifact ID to {"weight_g", "inventory_number"}
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Mesh units: mm, cm, m, in or auto
    #[arg(long)]
    pub units: Option<String>,

    /// Explicit multiplier to millimetres
    #[arg(long)]
    pub scale: Option<f64>,

    /// Write the record array here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the per-file failure list to this path
    #[arg(long)]
    pub failures: Option<PathBuf>,
}

/// Handle `acs batch`.
pub fn handle_batch(args: BatchArgs, thresholds: &ExtractionThresholds) -> i32 {
    finish("batch", run(&args, thresholds).map(|_| ()))
}

pub(crate) fn run(args: &BatchArgs, thresholds: &ExtractionThresholds) -> anyhow::Result<BatchOutcome> {
    let scale = unit_scale(args.units.as_deref(), args.scale)?;
    let metadata = match &args.metadata {
        Some(path) => read_metadata(path)?,
        None => BTreeMap::new(),
    };

    let outcome = extract_directory(&args.dir, scale, thresholds, &metadata)
        .with_context(|| format!("batch extraction over {}", args.dir.display()))?;

    info!(
        extracted = outcome.records.len(),
        failed = outcome.failures.len(),
        "batch completed"
    );
    for failure in &outcome.failures {
        warn!(artifact_id = %failure.artifact_id, error = %failure.error, "skipped mesh");
    }

    write_json(&outcome.records, args.output.as_deref())?;
    if let Some(path) = &args.failures {
        write_json(&outcome.failures, Some(path))?;
    }
    Ok(outcome)
}

fn read_metadata(path: &Path) -> anyhow::Result<BTreeMap<String, ArtifactMetadata>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing metadata {}", path.display()))
}
