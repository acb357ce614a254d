//! Archaeological Classifier CLI
//!
//! Drives mesh extraction, casting-matrix analysis and the formal taxonomy
//! from local files.
//!
//! # Commands
//!
//! - `process`: extract one mesh into an artifact record
//! - `batch`: extract every mesh in a directory
//! - `matrices`: identify casting matrices and estimate fusions
//! - `define-class`: define a taxonomic class from reference records
//! - `modify-class`: register a justified revision of a class
//! - `discover-classes`: density-cluster unlabeled records into new classes
//! - `classify`: score records against the registry
//! - `list-classes`: registry statistics or full definitions
//!
//! Exit codes: 0 on success, 1 on error, 2 when a taxonomy file fails hash
//! verification.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

use error::CliExitCode;

/// Archaeological Classifier - morphometry, casting matrices and taxonomy
#[derive(Parser)]
#[command(name = "acs")]
#[command(version)]
#[command(about = "Morphometric extraction, casting-matrix clustering and formal taxonomy for Bronze Age axes")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: config/default.toml + ACS_ENV + ACS__ variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the artifact record of one mesh
    Process(commands::process::ProcessArgs),
    /// Extract artifact records for every mesh in a directory
    Batch(commands::batch::BatchArgs),
    /// Identify casting matrices over stored artifact records
    ///
    /// Selects the matrix count by silhouette unless --n-clusters or
    /// --distance-threshold is given, then reports per-matrix
    /// characteristics, per-artifact assignments and fusion estimates.
    Matrices(commands::matrices::MatricesArgs),
    /// Define a class from a reference group
    DefineClass(commands::taxonomy::DefineClassArgs),
    /// Revise a class; the original is kept and marked superseded
    ModifyClass(commands::taxonomy::ModifyClassArgs),
    /// Discover new classes in unlabeled records
    DiscoverClasses(commands::taxonomy::DiscoverClassesArgs),
    /// Classify records against the taxonomy
    Classify(commands::taxonomy::ClassifyArgs),
    /// List taxonomy classes
    ListClasses(commands::taxonomy::ListClassesArgs),
}

fn main() {
    let cli = Cli::parse();

    // Configuration first: the default log level comes from it
    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(CliExitCode::Error.into());
        }
    };

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase())),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let location = config.logging.include_location;
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_file(location)
        .with_line_number(location)
        .with_writer(std::io::stderr);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        subscriber.compact().init();
    } else {
        subscriber.init();
    }

    // Dispatch to command handlers
    let exit_code = match cli.command {
        Commands::Process(args) => commands::process::handle_process(args, &config.extraction),
        Commands::Batch(args) => commands::batch::handle_batch(args, &config.extraction),
        Commands::Matrices(args) => commands::matrices::handle_matrices(args, &config.matrix),
        Commands::DefineClass(args) => {
            commands::taxonomy::handle_define_class(args, &config.taxonomy)
        }
        Commands::ModifyClass(args) => {
            commands::taxonomy::handle_modify_class(args, &config.taxonomy)
        }
        Commands::DiscoverClasses(args) => {
            commands::taxonomy::handle_discover_classes(args, &config.taxonomy)
        }
        Commands::Classify(args) => commands::taxonomy::handle_classify(args, &config.taxonomy),
        Commands::ListClasses(args) => {
            commands::taxonomy::handle_list_classes(args, &config.taxonomy)
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
        println!("[PASS] test_cli_definition_is_consistent");
    }

    #[test]
    fn test_parse_matrices_with_global_flags() {
        let cli = Cli::try_parse_from([
            "acs",
            "matrices",
            "records.json",
            "--method",
            "kmeans",
            "--n-clusters",
            "3",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Matrices(args) => {
                assert_eq!(args.method, Some(commands::matrices::MethodArg::Kmeans));
                assert_eq!(args.n_clusters, Some(3));
            }
            _ => panic!("expected matrices"),
        }
    }

    #[test]
    fn test_parse_define_class_weights() {
        let cli = Cli::try_parse_from([
            "acs",
            "define-class",
            "--name",
            "Flanged",
            "--references",
            "refs.json",
            "--weight",
            "length=2",
            "--weight",
            "width=0.5",
            "--taxonomy",
            "reg.json",
        ])
        .unwrap();
        match cli.command {
            Commands::DefineClass(args) => {
                assert_eq!(args.weights.len(), 2);
                assert_eq!(args.file.taxonomy, PathBuf::from("reg.json"));
            }
            _ => panic!("expected define-class"),
        }
    }
}
