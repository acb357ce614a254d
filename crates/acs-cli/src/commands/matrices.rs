//! `acs matrices`: group stored artifact records into casting matrices.

use std::path::PathBuf;

use acs_clustering::{FusionReport, MatrixAnalyzer, MatrixAssignment, MatrixIdentification, MatrixOptions};
use acs_core::config::{MatrixConfig, MatrixMethod};
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::info;

use super::{finish, read_records, write_json};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Hierarchical,
    Kmeans,
}

impl From<MethodArg> for MatrixMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Hierarchical => MatrixMethod::Hierarchical,
            MethodArg::Kmeans => MatrixMethod::Kmeans,
        }
    }
}

/// Arguments for `acs matrices`.
///
/// # Examples
///
/// ```bash
/// # Silhouette-selected matrix count
/// acs matrices records.json
///
/// # Fixed dendrogram cut, results split into files
/// acs matrices records.json --distance-threshold 4.0 --output-dir out/
/// ```
#[derive(Args, Debug)]
pub struct MatricesArgs {
    /// JSON file with one artifact record or an array of them
    pub records: PathBuf,

    /// Clustering method (defaults to the configured one)
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Fixed number of matrices; silhouette selection when omitted
    #[arg(long)]
    pub n_clusters: Option<usize>,

    /// Dendrogram cut height (hierarchical only)
    #[arg(long)]
    pub distance_threshold: Option<f64>,

    /// Upper bound of the silhouette sweep
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Weight CV below which a fusion estimate is high-confidence
    #[arg(long)]
    pub fusion_threshold: Option<f64>,

    /// Write identification.json, assignments.json and fusions.json here
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Everything `acs matrices` reports for one corpus.
#[derive(Debug, Serialize)]
pub struct MatrixReport {
    pub identification: MatrixIdentification,
    pub assignments: Vec<MatrixAssignment>,
    pub fusions: FusionReport,
}

/// Handle `acs matrices`.
pub fn handle_matrices(args: MatricesArgs, config: &MatrixConfig) -> i32 {
    finish("matrices", run(&args, config).map(|_| ()))
}

pub(crate) fn run(args: &MatricesArgs, config: &MatrixConfig) -> anyhow::Result<MatrixReport> {
    let records = read_records(&args.records)?;
    info!(records = records.len(), path = %args.records.display(), "records loaded");

    let mut options = MatrixOptions::from(config);
    if let Some(method) = args.method {
        options = options.with_method(method.into());
    }
    if let Some(k) = args.n_clusters {
        options = options.with_n_clusters(k);
    }
    if let Some(t) = args.distance_threshold {
        options = options.with_distance_threshold(t);
    }
    if let Some(max) = args.max_clusters {
        options.max_clusters = max;
    }

    let mut analyzer = MatrixAnalyzer::new(records);
    let identification = analyzer.identify_matrices(&options)?;
    let assignments = analyzer.matrix_assignments()?;
    let fusions =
        analyzer.estimate_fusions(args.fusion_threshold.unwrap_or(config.fusion_variance_threshold))?;

    info!(
        matrices = identification.n_matrices,
        method = ?identification.method_used,
        silhouette = ?identification.silhouette_score,
        total_fusions = fusions.total_fusions,
        "matrix analysis completed"
    );

    let report = MatrixReport {
        identification,
        assignments,
        fusions,
    };
    match &args.output_dir {
        Some(dir) => {
            write_json(&report.identification, Some(&dir.join("identification.json")))?;
            write_json(&report.assignments, Some(&dir.join("assignments.json")))?;
            write_json(&report.fusions, Some(&dir.join("fusions.json")))?;
        }
        None => write_json(&report, None)?,
    }
    Ok(report)
}
