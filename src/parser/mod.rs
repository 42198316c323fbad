//! C frontend
//!
//! This module transforms C source files into a [`Compilation`]:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`preprocessor`]: Directives and macro expansion (tokens → tokens)
//! - [`parse`]: Parsing (tokens → declarations, types and function bodies)
//! - [`ast`]: Statement and expression trees kept for function bodies
//!
//! # Supported C
//!
//! C99 with the common GNU and MSVC extensions: `__attribute__`,
//! `__declspec`, `__int8`..`__int64`, calling conventions, designated
//! initializers and case ranges. Identifiers that name no known type but sit
//! in type position become unexposed types, so a file with a missing header
//! still produces most of its declarations.
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary
//! operators. No external parser generator dependencies.

pub mod ast;
mod declarations;
pub(crate) mod eval;
mod expressions;
pub mod lexer;
pub mod parse;
pub mod preprocessor;
mod statements;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compilation::Compilation;
use crate::config::options::ParserOptions;
use crate::error::FrontendError;
use lexer::Token;
use parse::Parser;
use preprocessor::Preprocessor;

pub use parse::MAX_NESTING;

/// Stack size for threads that parse. Enough for input nested up to
/// [`MAX_NESTING`] levels in an unoptimized build.
pub const PARSE_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Shared flag asking a running parse to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Something that turns a source file into a declaration graph.
///
/// `Err` is reserved for files that cannot be read at all and for parses
/// stopped through the [`CancelToken`]; syntax and semantic problems are
/// diagnostics inside the returned [`Compilation`].
pub trait Frontend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn parse_file(
        &self,
        path: &Path,
        options: &ParserOptions,
        cancel: &CancelToken,
    ) -> Result<Compilation, FrontendError>;
}

/// The built-in C frontend
#[derive(Debug, Default, Clone, Copy)]
pub struct CFrontend;

impl Frontend for CFrontend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn parse_file(
        &self,
        path: &Path,
        options: &ParserOptions,
        cancel: &CancelToken,
    ) -> Result<Compilation, FrontendError> {
        let mut compilation = Compilation::new(options.target_info());
        let tokens = Preprocessor::new(&mut compilation, options)
            .with_cancel(cancel.clone())
            .run(path)?;
        let compilation = finish(compilation, tokens, options, cancel);
        if cancel.is_cancelled() {
            return Err(FrontendError::Cancelled {
                path: path.to_path_buf(),
            });
        }
        Ok(compilation)
    }
}

/// Parse in-memory source as if it were a file named `input.c`
pub fn parse_source(source: &str, options: &ParserOptions) -> Compilation {
    let mut compilation = Compilation::new(options.target_info());
    let tokens = Preprocessor::new(&mut compilation, options).run_source(Path::new("input.c"), source);
    finish(compilation, tokens, options, &CancelToken::default())
}

fn finish(
    mut compilation: Compilation,
    tokens: Vec<Token>,
    options: &ParserOptions,
    cancel: &CancelToken,
) -> Compilation {
    if options.parse_as_cpp {
        warn!("C++ parsing is not supported, parsing as C");
    }

    let ms_extensions = options.ms_extensions();
    let tokens: Vec<Token> = tokens.into_iter().map(|t| t.classify(ms_extensions)).collect();
    debug!(tokens = tokens.len(), "parsing translation unit");

    Parser::new(tokens, &mut compilation)
        .with_function_bodies(options.function_bodies)
        .with_cancel(cancel.clone())
        .parse_translation_unit();

    if !options.parse_system_includes {
        compilation.drop_system_declarations();
    }
    compilation
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_frontend_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.c");
        fs::write(&path, "typedef int T;\nT value;\n").unwrap();

        assert_eq!(CFrontend.name(), "c");
        let c = CFrontend.parse_file(&path, &ParserOptions::default(), &CancelToken::new()).unwrap();
        assert!(!c.has_errors());
        assert_eq!(c.typedefs.len(), 1);
        assert_eq!(c.fields.len(), 1);
    }

    #[test]
    fn test_frontend_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = CFrontend
            .parse_file(&dir.path().join("missing.c"), &ParserOptions::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FrontendError::Io { .. }));
    }

    #[test]
    fn test_cancelled_parse_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.c");
        fs::write(&path, "int a;\nint b;\n").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = CFrontend.parse_file(&path, &ParserOptions::default(), &cancel);
        assert!(matches!(result, Err(FrontendError::Cancelled { .. })));
    }

    /// Runs `parse` on a thread with the stack the batch workers get
    fn on_parse_stack<T: Send + 'static>(parse: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(PARSE_STACK_SIZE)
            .spawn(parse)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_deep_parentheses_are_an_error() {
        let c = on_parse_stack(|| {
            let depth = 10_000;
            let source = format!("int x = {}1{};\nint y;", "(".repeat(depth), ")".repeat(depth));
            parse_source(&source, &ParserOptions::default())
        });
        assert!(c.has_errors());
        assert!(c.diagnostics.messages()[0].message.contains("Nesting exceeds"));
        // parsing resumes after the broken declaration
        assert_eq!(c.fields.len(), 1);
    }

    #[test]
    fn test_deep_blocks_and_unary_chains_are_errors() {
        let (blocks, unary, casts) = on_parse_stack(|| {
            let depth = 10_000;
            let options = ParserOptions::default();
            let blocks = format!("void f(void) {{ {} }}", "{".repeat(depth) + &"}".repeat(depth));
            let unary = format!("int g(int a) {{ return {}a; }}", "-".repeat(depth));
            let casts = format!("long v = {}0;", "(long)".repeat(depth));
            (
                parse_source(&blocks, &options).has_errors(),
                parse_source(&unary, &options).has_errors(),
                parse_source(&casts, &options).has_errors(),
            )
        });
        assert!(blocks);
        assert!(unary);
        assert!(casts);
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let c = on_parse_stack(|| {
            let source = format!("int x = {}1{};", "(".repeat(100), ")".repeat(100));
            parse_source(&source, &ParserOptions::default())
        });
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
    }

    #[test]
    fn test_skipped_bodies() {
        let options = ParserOptions {
            function_bodies: false,
            ..ParserOptions::default()
        };
        let c = parse_source("int f(int a) { if (a) { return 1; } return 0; }", &options);
        assert!(!c.has_errors());
        let f = c.decl(c.functions[0]).as_function().unwrap();
        assert!(f.body.is_empty());
        assert!(f.flags.has_body);
    }
}
