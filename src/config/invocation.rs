//! Captured compiler invocations
//!
//! One [`Invocation`] is one compiler command recorded from a build: its
//! include directories, input files, flags and macro definitions. A batch
//! document is a JSON array of them:
//!
//! ```json
//! [{
//!   "cmd": "cl.exe",
//!   "include": ["main", "Zend"],
//!   "input": ["main/main.c", "main/php_ini.c"],
//!   "flag": ["nologo", "W3"],
//!   "zc": ["inline"],
//!   "define": { "NDEBUG": null, "ZEND_DEBUG": "0" },
//!   "file": { "o": "x64/Release/" },
//!   "warn": { "4996": "d" }
//! }]
//! ```
//!
//! All transforms are pure: they take `&self` (or an owned list) and return
//! new values, so one loaded document can be shared between workers.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// One compiler-command record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Invocation {
    /// Compiler executable; bookkeeping only
    pub cmd: String,
    pub include: Vec<String>,
    pub input: Vec<String>,
    pub flag: Vec<String>,
    /// Conformance switches (`/Zc:...`)
    pub zc: Vec<String>,
    /// Macro name to optional value (`-DNAME` vs `-DNAME=VALUE`), in
    /// command-line order
    pub define: IndexMap<String, Option<String>>,
    /// Single-letter output options (`/Fo`, `/Fd`, ...) to paths
    pub file: BTreeMap<String, String>,
    /// Warning code to suppression flag
    pub warn: BTreeMap<String, String>,
}

impl Invocation {
    /// Rebase every `input` and `include` entry on `base_dir`.
    ///
    /// Entries are joined with [`Path::join`], so an entry that is already
    /// absolute stays as it is.
    pub fn normalize(&self, base_dir: &Path) -> Invocation {
        let rebase = |entries: &[String]| -> Vec<String> {
            entries
                .iter()
                .map(|e| base_dir.join(e).to_string_lossy().into_owned())
                .collect()
        };
        Invocation {
            input: rebase(&self.input),
            include: rebase(&self.include),
            ..self.clone()
        }
    }

    /// Copy of this invocation restricted to a single input file
    pub fn with_single_input(&self, input: &str) -> Invocation {
        Invocation {
            input: vec![input.to_string()],
            ..self.clone()
        }
    }

    /// `-D` style tokens: `NAME` or `NAME=VALUE`
    pub fn define_tokens(&self) -> Vec<String> {
        self.define
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{}={}", name, v),
                None => name.clone(),
            })
            .collect()
    }
}

/// Pull the named inputs out into their own single-file invocations.
///
/// Walks `invocations` in order and, for each, `targets` in order. Every
/// target found in an invocation's `input` list is removed from it and
/// appended to the result as a new single-input invocation. The result is
/// the shrunk originals followed by all extracted invocations. Targets that
/// no invocation lists are ignored.
pub fn split<S: AsRef<str>>(invocations: Vec<Invocation>, targets: &[S]) -> Vec<Invocation> {
    let mut originals = invocations;
    let mut extracted = Vec::new();

    for invocation in originals.iter_mut() {
        for target in targets {
            let target = target.as_ref();
            if invocation.input.iter().any(|i| i == target) {
                extracted.push(invocation.with_single_input(target));
                invocation.input.retain(|i| i != target);
                debug!(input = target, "split input into its own invocation");
            }
        }
    }

    originals.extend(extracted);
    originals
}

/// Parse a batch document from a JSON string
pub fn parse_invocations(source: &str, origin: &Path) -> Result<Vec<Invocation>, ConfigError> {
    serde_json::from_str(source).map_err(|source| ConfigError::Malformed {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load a batch document from disk
pub fn load_invocations(path: &Path) -> Result<Vec<Invocation>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_invocations(&text, path)
}
