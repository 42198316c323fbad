//! Error types shared across the pipeline
//!
//! Errors are split by blast radius:
//! - [`ConfigError`] aborts the whole run (bad invocation document, bad rules).
//! - [`FrontendError`] and [`DumpError`] are scoped to a single input file;
//!   the batch driver records them and moves on.
//!
//! Syntax problems in C sources are *not* errors at this level. The frontend
//! reports them as diagnostics on the [`crate::compilation::Compilation`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::serializer::NodeKind;

/// Misconfiguration of the run. Always fatal for the batch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("whitelist for `{kind}` names unknown field `{field}`")]
    UnknownField { kind: NodeKind, field: String },

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Failure of the frontend to produce a compilation at all.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse of {} was cancelled", path.display())]
    Cancelled { path: PathBuf },
}

/// Failure while writing one artifact.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for library callers that drive the whole pipeline.
///
/// Per-file failures end up in the batch report instead, so only run-level
/// problems surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
