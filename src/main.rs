// ast-dump: batch C parser writing JSON declaration artifacts

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ast_dump::batch::{self, BatchSummary};
use ast_dump::config::{PreprocessedMode, RunConfig};
use ast_dump::snapshot::DuplicateFunctionPolicy;

/// Parse every input of a captured build and dump its declarations as JSON
#[derive(Parser, Debug)]
#[command(name = "ast-dump", version)]
struct Cli {
    /// Invocation document (JSON array of compiler invocations)
    invocations: Option<PathBuf>,

    /// Run configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base directory for relative inputs and include paths
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Directory receiving the artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Artifact file extension
    #[arg(long)]
    extension: Option<String>,

    /// Move this input into its own invocation before running (repeatable)
    #[arg(long = "split", value_name = "INPUT")]
    split: Vec<String>,

    /// Inputs are preprocessed `.ipp` files; artifacts go to `<output_dir>_i`
    #[arg(long)]
    preprocessed: bool,

    /// Worker threads
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Per-file parse timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print warnings as well as errors
    #[arg(long)]
    warnings: bool,

    /// List every top-level declaration of each file
    #[arg(long)]
    info: bool,

    /// Pretty-print artifacts
    #[arg(long)]
    pretty: bool,

    /// Concatenate bodies of same-named functions instead of keeping the last
    #[arg(long)]
    merge_duplicates: bool,

    /// Skip function bodies
    #[arg(long)]
    no_bodies: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(path) = &self.invocations {
            config.invocations = path.clone();
        }
        if let Some(dir) = &self.source_dir {
            config.source_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ext) = &self.extension {
            config.artifact_extension = ext.clone();
        }
        config.split.extend(self.split.iter().cloned());
        if self.preprocessed && config.preprocessed.is_none() {
            config.preprocessed = Some(PreprocessedMode::default());
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        config.print_warnings |= self.warnings;
        config.print_info |= self.info;
        config.pretty |= self.pretty;
        if self.merge_duplicates {
            config.duplicate_functions = DuplicateFunctionPolicy::Merge;
        }
        if self.no_bodies {
            config.adapter.function_bodies = false;
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stdout)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<BatchSummary> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    cli.apply(&mut config);

    let summary = batch::run_batch(&config).context("batch aborted")?;
    for report in summary.reports.iter().filter(|r| r.outcome.is_failure()) {
        println!("FAILED {}: {} [{}]", report.input.display(), report.outcome, report.trace);
    }
    println!("{}", summary);
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(&cli) {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
