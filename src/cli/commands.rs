//! CLI command definitions for cldf-regress.
//!
//! This module provides the command-line interface for running the
//! regression suite and inspecting the dataset registry.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use crate::build::{BuildConfig, DEFAULT_ARTIFACT, DEFAULT_BUILD_COMMAND};
use crate::harness::config::{default_data_root, DATA_ROOT_ENV};
use crate::harness::{Harness, HarnessConfig};
use crate::registry::DatasetRegistry;
use crate::report::{compare, HarnessReport, Reporter};
use crate::runner::config::{DEFAULT_FORCE_FLAG, DEFAULT_SUBCOMMAND};
use crate::runner::{PatternCheck, RunnerConfig, Verifier, DEFAULT_MARKER};
use crate::workspace::WorkspaceConfig;

/// Exit code when at least one dataset failed.
const EXIT_DATASET_FAILURE: u8 = 1;
/// Exit code for fatal errors (build, workspace, bad arguments).
const EXIT_FATAL: u8 = 2;
/// Exit code when every dataset ran but the report could not be produced.
const EXIT_REPORT: u8 = 3;
/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Regression and performance harness for CLDF dataset loaders.
#[derive(Parser)]
#[command(name = "cldf-regress")]
#[command(about = "Build a CLDF loader, load reference datasets, verify and time each load")]
#[command(version)]
#[command(
    long_about = "cldf-regress rebuilds a CLDF-to-SQLite loader from source, runs it against a registry of reference datasets inside a throwaway workspace, and reports per-dataset time and database size.\n\nExample usage:\n  cldf-regress run --source-dir ~/src/gocldf --data-root ~/projects --output report.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Build the loader and run every registered dataset through it.
    Run(RunArgs),

    /// List registered datasets and whether their metadata resolves.
    #[command(alias = "ls")]
    List(ListArgs),
}

/// Registry selection shared by `run` and `list`.
#[derive(clap::Args, Debug)]
pub struct RegistryArgs {
    /// Reference-data root (defaults to $HOME/projects).
    #[arg(short = 'd', long, env = DATA_ROOT_ENV)]
    pub data_root: Option<PathBuf>,

    /// YAML file with a `datasets:` list replacing the built-in registry.
    #[arg(short = 'r', long)]
    pub registry: Option<PathBuf>,
}

impl RegistryArgs {
    fn data_root(&self) -> PathBuf {
        self.data_root.clone().unwrap_or_else(default_data_root)
    }

    fn load_registry(&self) -> anyhow::Result<DatasetRegistry> {
        match &self.registry {
            Some(path) => Ok(DatasetRegistry::from_yaml_file(path)?),
            None => Ok(DatasetRegistry::default()),
        }
    }
}

/// Arguments for `cldf-regress run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Loader source tree to build.
    #[arg(short = 's', long, default_value = ".")]
    pub source_dir: PathBuf,

    /// Build command, run inside the source tree.
    #[arg(long, default_value = DEFAULT_BUILD_COMMAND)]
    pub build_cmd: String,

    /// Built executable, relative to the source tree.
    #[arg(long, default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Build timeout in seconds (no limit by default).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub build_timeout: Option<u64>,

    /// Loader subcommand that imports a dataset.
    #[arg(long, default_value = DEFAULT_SUBCOMMAND)]
    pub subcommand: String,

    /// Flag telling the loader to overwrite an existing database.
    #[arg(long, default_value = DEFAULT_FORCE_FLAG, allow_hyphen_values = true)]
    pub force_flag: String,

    /// Token that must appear in the loader output.
    #[arg(long, default_value = DEFAULT_MARKER, conflicts_with = "marker_regex")]
    pub marker: String,

    /// Regular expression the loader output must match, instead of --marker.
    #[arg(long)]
    pub marker_regex: Option<String>,

    /// Per-dataset timeout in seconds.
    #[arg(
        short = 't',
        long,
        default_value = "3600",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Stop at the first failed dataset.
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep the workspace directory after the run.
    #[arg(long)]
    pub keep_workspace: bool,

    /// Print the full report as JSON instead of progress lines.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Write the JSON report to this file.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Earlier JSON report to compare timings and sizes against.
    #[arg(short = 'b', long)]
    pub baseline: Option<PathBuf>,
}

/// Arguments for `cldf-regress list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<ExitCode> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the cldf-regress CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => run_regression_command(args).await,
        Commands::List(args) => run_list_command(args),
    }
}

// ============================================================================
// Command Implementation
// ============================================================================

fn harness_config(args: &RunArgs) -> anyhow::Result<HarnessConfig> {
    let mut build = BuildConfig::new(&args.source_dir)
        .with_command(args.build_cmd.clone())
        .with_artifact(args.artifact.clone());
    if let Some(secs) = args.build_timeout {
        build = build.with_timeout(Duration::from_secs(secs));
    }

    let runner = RunnerConfig::new()
        .with_subcommand(args.subcommand.clone())
        .with_force_flag(args.force_flag.clone())
        .with_timeout(Duration::from_secs(args.timeout));

    Ok(HarnessConfig::new(args.registry.data_root(), &args.source_dir)
        .with_registry(args.registry.load_registry()?)
        .with_build(build)
        .with_runner(runner)
        .with_workspace(WorkspaceConfig::default().with_keep(args.keep_workspace))
        .with_fail_fast(args.fail_fast))
}

fn verifier(args: &RunArgs) -> anyhow::Result<Verifier> {
    match &args.marker_regex {
        Some(pattern) => Ok(Verifier::new(Box::new(PatternCheck::new(pattern)?))),
        None => Ok(Verifier::with_marker(args.marker.clone())),
    }
}

async fn run_regression_command(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = match harness_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };
    let verifier = match verifier(&args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: invalid --marker-regex: {}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };
    let baseline = match &args.baseline {
        Some(path) => match HarnessReport::load(path) {
            Ok(report) => Some(report),
            Err(e) => {
                eprintln!("Error: invalid --baseline: {}", e);
                return Ok(ExitCode::from(EXIT_FATAL));
            }
        },
        None => None,
    };

    let reporter = if args.json {
        Reporter::quiet()
    } else {
        Reporter::new()
    };
    let harness = Harness::new(config).with_verifier(verifier).with_reporter(reporter);

    info!(
        source_dir = %args.source_dir.display(),
        "Running regression suite"
    );
    let outcome = tokio::select! {
        outcome = harness.run() => outcome,
        _ = interrupted(tokio::signal::ctrl_c()) => {
            warn!("Interrupted, workspace removed");
            eprintln!("Interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            error!("Regression run aborted: {}", e);
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };

    if args.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                eprintln!("Error: cannot serialize report: {}", e);
                return Ok(ExitCode::from(EXIT_REPORT));
            }
        }
    }
    if let Some(path) = &args.output {
        if let Err(e) = report.write_json(path) {
            error!("Failed to write report: {}", e);
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(EXIT_REPORT));
        }
        if !args.json {
            println!("\nReport saved to: {}", path.display());
        }
    }
    if let Some(baseline) = &baseline {
        print_comparison(baseline, &report, args.json);
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DATASET_FAILURE))
    }
}

/// Resolves when `signal` reports an interrupt. If the handler could not be
/// installed the run continues uninterruptible.
async fn interrupted<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Cannot listen for Ctrl-C, continuing without it: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_comparison(baseline: &HarnessReport, report: &HarnessReport, to_stderr: bool) {
    let mut lines = vec![format!("\n=== Compared to {} ===", baseline.run_id)];
    lines.extend(compare(baseline, report).iter().map(|d| d.line()));
    for line in lines {
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

fn run_list_command(args: ListArgs) -> anyhow::Result<ExitCode> {
    let registry = match args.registry.load_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };
    let root = args.registry.data_root();
    println!("Data root: {}", root.display());

    let mut missing = 0usize;
    for (dataset, resolution) in registry.resolve(&root) {
        match resolution {
            Ok(path) => println!("  [ok]      {}  ({})", dataset, path.display()),
            Err(e) => {
                missing += 1;
                println!("  [missing] {}  ({})", dataset, e);
            }
        }
    }

    if missing > 0 {
        println!("\n{} of {} datasets unavailable", missing, registry.len());
        Ok(ExitCode::from(EXIT_DATASET_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = Cli::try_parse_from(["cldf-regress", "run"]).expect("should parse");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.source_dir, PathBuf::from("."));
                assert_eq!(args.build_cmd, "go build .");
                assert_eq!(args.artifact, PathBuf::from("gocldf"));
                assert_eq!(args.subcommand, "load");
                assert_eq!(args.force_flag, "-f");
                assert_eq!(args.marker, "Loaded");
                assert_eq!(args.timeout, 3600);
                assert!(!args.fail_fast);
                assert!(!args.json);
                assert!(args.baseline.is_none());
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_command_with_options() {
        let cli = Cli::try_parse_from([
            "cldf-regress",
            "run",
            "-s",
            "/src/loader",
            "-d",
            "/data",
            "--subcommand",
            "createdb",
            "--force-flag",
            "--overwrite",
            "-t",
            "60",
            "--fail-fast",
            "-j",
            "-o",
            "report.json",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.registry.data_root, Some(PathBuf::from("/data")));
                assert_eq!(args.subcommand, "createdb");
                assert_eq!(args.force_flag, "--overwrite");
                assert_eq!(args.timeout, 60);
                assert!(args.fail_fast);
                assert!(args.json);
                assert_eq!(args.output, Some(PathBuf::from("report.json")));

                let config = harness_config(&args).unwrap();
                assert_eq!(config.runner.timeout, Duration::from_secs(60));
                assert_eq!(config.data_root, PathBuf::from("/data"));
                assert!(config.fail_fast);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        for args in [
            ["cldf-regress", "run", "--timeout", "0"],
            ["cldf-regress", "run", "--build-timeout", "0"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{:?} should be rejected", args);
        }

        let cli = Cli::try_parse_from(["cldf-regress", "run", "--timeout", "1", "--build-timeout", "1"])
            .expect("one second is allowed");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.timeout, 1);
                assert_eq!(args.build_timeout, Some(1));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[tokio::test]
    async fn test_interrupt_listener_failure_keeps_running() {
        let broken = std::future::ready(Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no signal driver",
        )));
        let waited = tokio::time::timeout(Duration::from_millis(100), interrupted(broken)).await;
        assert!(waited.is_err(), "a failed listener must not report an interrupt");

        let waited =
            tokio::time::timeout(Duration::from_millis(100), interrupted(std::future::ready(Ok(()))))
                .await;
        assert!(waited.is_ok());
    }

    #[test]
    fn test_marker_and_regex_conflict() {
        let result = Cli::try_parse_from([
            "cldf-regress",
            "run",
            "--marker",
            "Done",
            "--marker-regex",
            "Loaded \\d+",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_alias() {
        let cli = Cli::try_parse_from(["cldf-regress", "ls", "-d", "/data"]).expect("alias");
        assert!(matches!(cli.command, Commands::List(_)));
    }
}
