//! Batch driver
//!
//! Turns the invocation document into one job per input file and runs every
//! job through parse → snapshot → serialize on a worker pool. Jobs share
//! nothing but the output directory:
//!
//! - a file whose artifact already exists is skipped without parsing
//! - artifacts are created exclusively, so two workers racing for the same
//!   path cannot clobber each other
//! - a file with parse errors gets its diagnostics printed and no artifact
//!
//! Failures are scoped to the file; only configuration errors abort a run.

pub mod artifact;
pub mod state;

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::compilation::Compilation;
use crate::config::invocation::{self, Invocation};
use crate::config::options::ParserOptions;
use crate::config::RunConfig;
use crate::error::{ConfigError, Error, FrontendError};
use crate::parser::{CFrontend, CancelToken, Frontend, PARSE_STACK_SIZE};
use crate::serializer::Serializer;
use crate::snapshot::{self, DuplicateFunctionPolicy, Snapshot};
use artifact::ArtifactWrite;
use state::{FileState, StateTrace};

/// How long a timed-out parse gets to notice its cancellation before the
/// worker moves on without it
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// One input file and everything needed to process it
#[derive(Debug, Clone)]
pub struct Job {
    /// Position in the run; reports come back in this order
    pub index: usize,
    pub input: PathBuf,
    pub artifact: PathBuf,
    pub options: ParserOptions,
}

/// Expand invocations into jobs.
///
/// Inputs named in `config.split` are first pulled out into their own
/// invocations, then every invocation is rebased on `config.source_dir`.
pub fn plan_jobs(invocations: Vec<Invocation>, config: &RunConfig) -> Vec<Job> {
    let output_dir = config.effective_output_dir();
    let mut jobs = Vec::new();

    for invocation in invocation::split(invocations, &config.split) {
        let normalized = invocation.normalize(&config.source_dir);
        let options = ParserOptions::from_invocation(&normalized, &config.adapter);

        for input in &normalized.input {
            let input = match &config.preprocessed {
                Some(mode) => format!("{}{}", input, mode.input_suffix),
                None => input.clone(),
            };
            jobs.push(Job {
                index: jobs.len(),
                artifact: artifact::artifact_path(&output_dir, &input, &config.artifact_extension),
                input: PathBuf::from(input),
                options: options.clone(),
            });
        }
    }

    jobs
}

/// How a file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Dumped { bytes: u64 },
    Skipped,
    ParseFailed { errors: usize },
    TimedOut,
    IoFailed { message: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::ParseFailed { .. } | Outcome::TimedOut | Outcome::IoFailed { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Dumped { bytes } => write!(f, "dumped ({} bytes)", bytes),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::ParseFailed { errors } => write!(f, "parse failed ({} errors)", errors),
            Outcome::TimedOut => write!(f, "timed out"),
            Outcome::IoFailed { message } => write!(f, "i/o failure: {}", message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub artifact: PathBuf,
    pub trace: StateTrace,
    pub outcome: Outcome,
    pub parse_time: Option<Duration>,
    pub dump_time: Option<Duration>,
    /// Diagnostics and declaration listing produced for this file
    pub messages: String,
}

/// Totals over one run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
    pub dumped: usize,
    pub skipped: usize,
    pub parse_failed: usize,
    pub timed_out: usize,
    pub io_failed: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: Vec<FileReport>) -> Self {
        let mut summary = BatchSummary::default();
        for report in &reports {
            match report.outcome {
                Outcome::Dumped { .. } => summary.dumped += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::ParseFailed { .. } => summary.parse_failed += 1,
                Outcome::TimedOut => summary.timed_out += 1,
                Outcome::IoFailed { .. } => summary.io_failed += 1,
            }
        }
        summary.reports = reports;
        summary
    }

    pub fn failures(&self) -> usize {
        self.parse_failed + self.timed_out + self.io_failed
    }

    /// `0` when every file was dumped or skipped, `2` otherwise
    pub fn exit_code(&self) -> u8 {
        if self.failures() == 0 {
            0
        } else {
            2
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} dumped, {} skipped, {} parse failed, {} timed out, {} i/o failed",
            self.reports.len(),
            self.dumped,
            self.skipped,
            self.parse_failed,
            self.timed_out,
            self.io_failed
        )
    }
}

enum ParseFailure {
    TimedOut,
    Crashed,
    Frontend(FrontendError),
}

/// Runs jobs against one frontend and one rule set
pub struct BatchDriver {
    frontend: Arc<dyn Frontend>,
    serializer: Serializer,
    workers: Option<usize>,
    timeout: Option<Duration>,
    print_warnings: bool,
    print_info: bool,
    duplicate_functions: DuplicateFunctionPolicy,
    echo: bool,
}

impl BatchDriver {
    /// Validates `config`; a bad configuration never starts a run
    pub fn new(frontend: Arc<dyn Frontend>, config: &RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(BatchDriver {
            frontend,
            serializer: Serializer::new(&config.rules)?.pretty(config.pretty),
            workers: config.workers,
            timeout: config.timeout(),
            print_warnings: config.print_warnings,
            print_info: config.print_info,
            duplicate_functions: config.duplicate_functions,
            echo: true,
        })
    }

    /// Print per-file diagnostics to stdout as files finish
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn run(&self, jobs: &[Job]) -> Result<BatchSummary, ConfigError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("ast-dump-{}", i))
            .stack_size(PARSE_STACK_SIZE);
        if let Some(workers) = self.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build().map_err(|e| ConfigError::InvalidSetting {
            name: "workers",
            reason: e.to_string(),
        })?;

        info!(
            files = jobs.len(),
            threads = pool.current_num_threads(),
            frontend = self.frontend.name(),
            "batch start"
        );
        let reports: Vec<FileReport> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let report = self.process(job);
                    if self.echo && !report.messages.is_empty() {
                        let mut stdout = io::stdout().lock();
                        let _ = stdout.write_all(report.messages.as_bytes());
                    }
                    report
                })
                .collect()
        });

        let summary = BatchSummary::from_reports(reports);
        info!(%summary, "batch end");
        Ok(summary)
    }

    /// Run one file through the pipeline
    pub fn process(&self, job: &Job) -> FileReport {
        let file = job.input.display().to_string();
        let mut report = FileReport {
            input: job.input.clone(),
            artifact: job.artifact.clone(),
            trace: StateTrace::new(),
            outcome: Outcome::Skipped,
            parse_time: None,
            dump_time: None,
            messages: String::new(),
        };

        if job.artifact.exists() {
            advance(&mut report.trace, FileState::Skipped);
            info!(%file, artifact = %job.artifact.display(), "artifact exists, skipping");
            return report;
        }

        advance(&mut report.trace, FileState::Parsing);
        info!(%file, "parse start");
        let start = Instant::now();
        let parsed = self.parse(job);
        let elapsed = start.elapsed();
        report.parse_time = Some(elapsed);
        info!(%file, elapsed_ms = elapsed.as_millis() as u64, "parse end");

        let compilation = match parsed {
            Ok(compilation) => compilation,
            Err(failure) => {
                report.outcome = match failure {
                    ParseFailure::TimedOut => {
                        warn!(%file, limit_secs = self.timeout.map(|t| t.as_secs()), "parse timed out");
                        Outcome::TimedOut
                    }
                    ParseFailure::Crashed => {
                        error!(%file, "parser thread panicked");
                        Outcome::ParseFailed { errors: 0 }
                    }
                    ParseFailure::Frontend(e) => {
                        error!(%file, error = %e, "cannot parse");
                        Outcome::IoFailed { message: e.to_string() }
                    }
                };
                advance(&mut report.trace, FileState::ParseFailed);
                advance(&mut report.trace, FileState::Done);
                return report;
            }
        };

        let mut messages = Vec::new();
        let _ = snapshot::write_diagnostics(&mut messages, &compilation, self.print_warnings);
        if self.print_info {
            let _ = snapshot::write_declarations(&mut messages, &compilation);
        }
        report.messages = String::from_utf8_lossy(&messages).into_owned();

        if compilation.has_errors() {
            let errors = compilation.diagnostics.error_count();
            warn!(%file, errors, "parse reported errors, not dumping");
            report.outcome = Outcome::ParseFailed { errors };
            advance(&mut report.trace, FileState::ParseFailed);
            advance(&mut report.trace, FileState::Done);
            return report;
        }

        advance(&mut report.trace, FileState::Parsed);
        advance(&mut report.trace, FileState::Dumping);
        info!(%file, "dump start");
        let start = Instant::now();
        let snapshot = Snapshot::with_policy(&compilation, self.duplicate_functions);
        let written = artifact::write_artifact(&job.artifact, |w| self.serializer.write(&snapshot, w));
        let elapsed = start.elapsed();
        report.dump_time = Some(elapsed);
        info!(%file, elapsed_ms = elapsed.as_millis() as u64, "dump end");

        match written {
            Ok(ArtifactWrite::Written { bytes }) => {
                report.outcome = Outcome::Dumped { bytes };
                advance(&mut report.trace, FileState::Done);
            }
            Ok(ArtifactWrite::AlreadyExists) => {
                info!(%file, "artifact created concurrently, skipping");
                report.outcome = Outcome::Skipped;
                advance(&mut report.trace, FileState::Skipped);
            }
            Err(e) => {
                error!(%file, error = %e, "cannot write artifact");
                report.outcome = Outcome::IoFailed { message: e.to_string() };
                advance(&mut report.trace, FileState::Done);
            }
        }
        report
    }

    fn parse(&self, job: &Job) -> Result<Compilation, ParseFailure> {
        let cancel = CancelToken::new();
        let Some(limit) = self.timeout else {
            return self
                .frontend
                .parse_file(&job.input, &job.options, &cancel)
                .map_err(ParseFailure::Frontend);
        };

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let frontend = Arc::clone(&self.frontend);
        let input = job.input.clone();
        let options = job.options.clone();
        let token = cancel.clone();
        thread::Builder::new()
            .name(format!("parse-{}", job.index))
            .stack_size(PARSE_STACK_SIZE)
            .spawn(move || {
                let _ = sender.send(frontend.parse_file(&input, &options, &token));
            })
            .map_err(|source| {
                ParseFailure::Frontend(FrontendError::Io {
                    path: job.input.clone(),
                    source,
                })
            })?;

        match receiver.recv_timeout(limit) {
            Ok(result) => result.map_err(ParseFailure::Frontend),
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                // the thread is left detached if the frontend ignores the token
                if let Err(RecvTimeoutError::Timeout) = receiver.recv_timeout(CANCEL_GRACE) {
                    warn!(
                        file = %job.input.display(),
                        frontend = self.frontend.name(),
                        "parse thread still running after cancellation"
                    );
                }
                Err(ParseFailure::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => Err(ParseFailure::Crashed),
        }
    }
}

fn advance(trace: &mut StateTrace, next: FileState) {
    if let Err(e) = trace.advance(next) {
        warn!(error = %e, "rejected state transition");
    }
}

/// Load the invocation document named by `config` and run the whole batch
/// with the built-in C frontend
pub fn run_batch(config: &RunConfig) -> Result<BatchSummary, Error> {
    let invocations = invocation::load_invocations(&config.invocations)?;
    let jobs = plan_jobs(invocations, config);
    let driver = BatchDriver::new(Arc::new(CFrontend), config)?;
    Ok(driver.run(&jobs)?)
}
