//! Formal taxonomy commands.
//!
//! Every command loads the registry from `--taxonomy` (an export document;
//! a missing file starts an empty registry), runs, and writes the registry
//! back when it changed. Classification appends to the audit log, so it
//! saves too.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use acs_core::config::TaxonomyConfig;
use acs_taxonomy::{ClassificationResult, ParameterChanges, TaxonomySystem};
use anyhow::{anyhow, Context};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use super::{finish, read_records, write_json};

const DEFAULT_TAXONOMY_PATH: &str = "taxonomy.json";

/// Registry location shared by every taxonomy command.
#[derive(Args, Debug, Clone)]
pub struct TaxonomyFile {
    /// Taxonomy export document (created when absent)
    #[arg(long, default_value = DEFAULT_TAXONOMY_PATH)]
    pub taxonomy: PathBuf,
}

impl TaxonomyFile {
    fn open(&self, config: &TaxonomyConfig) -> anyhow::Result<TaxonomySystem> {
        let system = TaxonomySystem::new(config.clone());
        if self.taxonomy.exists() {
            let n = system
                .import_from_path(&self.taxonomy)
                .with_context(|| format!("loading taxonomy {}", self.taxonomy.display()))?;
            info!(classes = n, path = %self.taxonomy.display(), "taxonomy loaded");
        } else {
            warn!(path = %self.taxonomy.display(), "no taxonomy file yet, starting empty");
        }
        Ok(system)
    }

    fn save(&self, system: &TaxonomySystem) -> anyhow::Result<()> {
        if let Some(parent) = self.taxonomy.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        system
            .export_to_path(&self.taxonomy)
            .with_context(|| format!("saving taxonomy {}", self.taxonomy.display()))
    }
}

// ============================================================================
// define-class
// ============================================================================

/// Arguments for `acs define-class`.
///
/// # Example
///
/// ```bash
/// acs define-class --name "Flanged axe" --references refs.json --weight length=2.0
/// ```
#[derive(Args, Debug)]
pub struct DefineClassArgs {
    #[command(flatten)]
    pub file: TaxonomyFile,

    /// Human-readable class name
    #[arg(long)]
    pub name: String,

    /// Reference records (at least two)
    #[arg(long)]
    pub references: PathBuf,

    /// Parameter weight as KEY=VALUE (repeatable; default 1.0)
    #[arg(long = "weight", value_parser = parse_weight)]
    pub weights: Vec<(String, f64)>,

    /// Tolerance = std * factor (defaults to the configured factor)
    #[arg(long)]
    pub tolerance_factor: Option<f64>,
}

fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight for '{key}': {e}"))?;
    Ok((key.trim().to_string(), value))
}

/// Handle `acs define-class`.
pub fn handle_define_class(args: DefineClassArgs, config: &TaxonomyConfig) -> i32 {
    finish("define-class", define_class(&args, config))
}

fn define_class(args: &DefineClassArgs, config: &TaxonomyConfig) -> anyhow::Result<()> {
    let system = args.file.open(config)?;
    let references = read_records(&args.references)?;
    let weights: BTreeMap<String, f64> = args.weights.iter().cloned().collect();

    let class = system.define_class_from_reference_group(
        &args.name,
        &references,
        &weights,
        args.tolerance_factor.unwrap_or(config.tolerance_factor),
    )?;
    args.file.save(&system)?;

    info!(
        class_id = class.class_id(),
        parameters = class.parameter_count(),
        hash = class.parameter_hash(),
        "class defined"
    );
    write_json(&*class, None)
}

// ============================================================================
// modify-class
// ============================================================================

/// Arguments for `acs modify-class`.
#[derive(Args, Debug)]
pub struct ModifyClassArgs {
    #[command(flatten)]
    pub file: TaxonomyFile,

    /// Class to revise
    #[arg(long = "class")]
    pub class_id: String,

    /// JSON file: {"morphometric": {NAME: patch}, "technological": {NAME: patch}}
    #[arg(long)]
    pub changes: PathBuf,

    #[arg(long)]
    pub justification: String,

    /// Who authorised the change
    #[arg(long)]
    pub operator: String,
}

/// Handle `acs modify-class`.
pub fn handle_modify_class(args: ModifyClassArgs, config: &TaxonomyConfig) -> i32 {
    finish("modify-class", modify_class(&args, config))
}

fn modify_class(args: &ModifyClassArgs, config: &TaxonomyConfig) -> anyhow::Result<()> {
    let system = args.file.open(config)?;
    let text = fs::read_to_string(&args.changes)
        .with_context(|| format!("reading {}", args.changes.display()))?;
    let changes: ParameterChanges = serde_json::from_str(&text)
        .with_context(|| format!("parsing changes {}", args.changes.display()))?;

    let revised =
        system.modify_class_parameters(&args.class_id, &changes, &args.justification, &args.operator)?;
    args.file.save(&system)?;

    info!(old = %args.class_id, new = revised.class_id(), "class revised");
    write_json(&*revised, None)
}

// ============================================================================
// discover-classes
// ============================================================================

/// Arguments for `acs discover-classes`.
#[derive(Args, Debug)]
pub struct DiscoverClassesArgs {
    #[command(flatten)]
    pub file: TaxonomyFile,

    /// Unlabeled records
    pub records: PathBuf,

    /// Smallest cluster that becomes a class (defaults to the configured size)
    #[arg(long)]
    pub min_cluster_size: Option<usize>,

    /// DBSCAN neighbourhood radius in standardized units
    #[arg(long)]
    pub eps: Option<f64>,
}

/// Handle `acs discover-classes`.
pub fn handle_discover_classes(args: DiscoverClassesArgs, config: &TaxonomyConfig) -> i32 {
    finish("discover-classes", discover_classes(&args, config))
}

fn discover_classes(args: &DiscoverClassesArgs, config: &TaxonomyConfig) -> anyhow::Result<()> {
    let system = args.file.open(config)?;
    let objects = read_records(&args.records)?;

    let discovered = system.discover_new_classes(
        &objects,
        args.min_cluster_size.unwrap_or(config.discovery_min_cluster_size),
        args.eps.unwrap_or(config.discovery_eps),
    )?;
    if !discovered.is_empty() {
        args.file.save(&system)?;
    }

    info!(discovered = discovered.len(), objects = objects.len(), "discovery finished");
    let ids: Vec<&str> = discovered.iter().map(|c| c.class_id()).collect();
    write_json(&ids, None)
}

// ============================================================================
// classify
// ============================================================================

/// Arguments for `acs classify`.
///
/// # Examples
///
/// ```bash
/// # Score against every active class
/// acs classify records.json
///
/// # One specific class, superseded versions included
/// acs classify records.json --class TYPE_FLANGED_AXE_20260101_120000
/// ```
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub file: TaxonomyFile,

    /// Records to classify
    pub records: PathBuf,

    /// Score against this class only
    #[arg(long = "class")]
    pub class_id: Option<String>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ObjectClassification {
    pub object_id: String,
    /// Best first
    pub results: Vec<ClassificationResult>,
}

/// Handle `acs classify`.
pub fn handle_classify(args: ClassifyArgs, config: &TaxonomyConfig) -> i32 {
    finish("classify", classify(&args, config).map(|_| ()))
}

fn classify(args: &ClassifyArgs, config: &TaxonomyConfig) -> anyhow::Result<Vec<ObjectClassification>> {
    let system = args.file.open(config)?;
    let objects = read_records(&args.records)?;

    let mut out = Vec::with_capacity(objects.len());
    for (i, features) in objects.iter().enumerate() {
        let results = match &args.class_id {
            Some(id) => vec![system.classify_against(id, features)?],
            None => system.classify_object(features),
        };
        let object_id = features
            .artifact_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("object_{i}"));
        match results.first().filter(|r| r.is_member) {
            Some(best) => info!(object_id = %object_id, class_id = %best.class_id, confidence = best.confidence, "classified"),
            None => info!(object_id = %object_id, "no matching class"),
        }
        out.push(ObjectClassification { object_id, results });
    }
    args.file.save(&system)?;

    write_json(&out, args.output.as_deref())?;
    Ok(out)
}

// ============================================================================
// list-classes
// ============================================================================

/// Arguments for `acs list-classes`.
#[derive(Args, Debug)]
pub struct ListClassesArgs {
    #[command(flatten)]
    pub file: TaxonomyFile,

    /// Print full class definitions instead of the summary statistics
    #[arg(long)]
    pub full: bool,
}

/// Handle `acs list-classes`.
pub fn handle_list_classes(args: ListClassesArgs, config: &TaxonomyConfig) -> i32 {
    finish("list-classes", list_classes(&args, config))
}

fn list_classes(args: &ListClassesArgs, config: &TaxonomyConfig) -> anyhow::Result<()> {
    if !args.file.taxonomy.exists() {
        return Err(anyhow!("taxonomy file {} does not exist", args.file.taxonomy.display()));
    }
    let system = args.file.open(config)?;
    if args.full {
        let classes: Vec<_> = system.classes().iter().map(|c| (**c).clone()).collect();
        write_json(&classes, None)
    } else {
        write_json(&system.statistics(), None)
    }
}
