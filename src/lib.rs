//! # Introduction
//!
//! ast-dump batch-parses a C source tree, driven by captured compiler
//! invocations, and writes one JSON artifact per translation unit with a
//! filtered, reference-preserving projection of its declarations.
//!
//! ## Pipeline
//!
//! ```text
//! Invocations → ParserOptions → Frontend → Compilation → Snapshot → Serializer → artifact
//! ```
//!
//! 1. [`config`]: the invocation document, its pure transforms
//!    (`normalize`, `split`) and the adapter to [`config::options::ParserOptions`].
//! 2. [`parser`]: the [`parser::Frontend`] seam and the built-in C frontend:
//!    lexer, preprocessor and recursive-descent parser.
//! 3. [`compilation`]: the declaration graph: arenas of declarations and
//!    interned types with parent back-references, sizes and diagnostics.
//! 4. [`snapshot`]: the flat per-kind lists plus the function body index.
//! 5. [`serializer`]: projection rules and the two-pass `$id`/`$ref` encoder.
//! 6. [`batch`]: per-file state machine, worker pool, timeouts and
//!    exclusive artifact creation.

pub mod batch;
pub mod compilation;
pub mod config;
pub mod error;
pub mod parser;
pub mod serializer;
pub mod snapshot;

pub use error::{Error, Result};
