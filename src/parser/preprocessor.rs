//! C preprocessor
//!
//! Runs over the lexer's token stream line by line and produces the token
//! stream the parser sees. Supported directives:
//!
//! - `#define` / `#undef` (object-like and function-like, `#`, `##`,
//!   `__VA_ARGS__` and GNU named variadics)
//! - `#include "..."` / `#include <...>` and `#include_next`
//! - `#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`
//! - `#pragma once`; other pragmas are recorded as file-scope attributes
//! - `#error` and `#warning` as diagnostics; `#line`, `#ident` are ignored
//!
//! Every macro definition, command-line ones included, is also recorded in
//! the [`Compilation`] as a Macro declaration.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::compilation::{
    Attribute, AttributeKind, Compilation, Decl, DeclKind, Macro, Span, BUILTIN_FILE,
};
use crate::config::options::ParserOptions;
use crate::error::FrontendError;
use crate::parser::ast::SourceLocation;
use crate::parser::lexer::{adjacent, decode_string_literal, join_spelling, Lexer, Punct, Token};
use crate::parser::parse::Parser;
use crate::parser::CancelToken;

const MAX_INCLUDE_DEPTH: usize = 200;
/// Macro invocations nested inside arguments or bodies
const MAX_EXPANSION_DEPTH: usize = 256;

#[derive(Debug, Clone)]
struct MacroDef {
    /// `None` for object-like macros
    params: Option<Vec<String>>,
    /// The last parameter collects the extra arguments
    variadic: bool,
    body: Vec<Token>,
}

/// State of one `#if` group
#[derive(Debug)]
struct Conditional {
    parent_active: bool,
    /// Lines are currently being kept
    taking: bool,
    /// Some branch of the group was already taken
    taken: bool,
    seen_else: bool,
    location: SourceLocation,
}

pub struct Preprocessor<'a> {
    compilation: &'a mut Compilation,
    options: &'a ParserOptions,
    macros: FxHashMap<String, MacroDef>,
    once: FxHashSet<PathBuf>,
    include_depth: usize,
    expansion_depth: usize,
    output: Vec<Token>,
    cancel: CancelToken,
}

impl<'a> Preprocessor<'a> {
    pub fn new(compilation: &'a mut Compilation, options: &'a ParserOptions) -> Self {
        Preprocessor {
            compilation,
            options,
            macros: FxHashMap::default(),
            once: FxHashSet::default(),
            include_depth: 0,
            expansion_depth: 0,
            output: Vec::new(),
            cancel: CancelToken::default(),
        }
    }

    /// Stop reading lines once `cancel` is set
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Preprocess the file at `path`
    pub fn run(self, path: &Path) -> Result<Vec<Token>, FrontendError> {
        let text = fs::read_to_string(path).map_err(|source| FrontendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.run_source(path, &text))
    }

    /// Preprocess `text` as if it were the contents of `path`
    pub fn run_source(mut self, path: &Path, text: &str) -> Vec<Token> {
        self.predefine();
        self.process_file(path, text, false);

        let end = self
            .output
            .last()
            .map(|t| t.location())
            .unwrap_or_default();
        self.output.push(Token::Eof(end));
        self.output
    }

    fn predefine(&mut self) {
        for (line, (name, value)) in builtin_defines(self.options).into_iter().enumerate() {
            let loc = SourceLocation::new(BUILTIN_FILE, line + 1, 1);
            let body = lex_fragment(&value, loc);
            self.macros.insert(
                name,
                MacroDef {
                    params: None,
                    variadic: false,
                    body,
                },
            );
        }

        let defines = self.options.defines.clone();
        for (line, define) in defines.iter().enumerate() {
            let loc = SourceLocation::new(BUILTIN_FILE, line + 1, 1);
            let (name, value) = match define.split_once('=') {
                Some((name, value)) => (name.trim(), value.to_string()),
                None => (define.trim(), "1".to_string()),
            };
            if name.is_empty() {
                continue;
            }
            let body = lex_fragment(&value, loc);
            self.macros.insert(
                name.to_string(),
                MacroDef {
                    params: None,
                    variadic: false,
                    body,
                },
            );
            self.record_macro(name, None, value, loc);
        }
    }

    fn record_macro(&mut self, name: &str, parameters: Option<Vec<String>>, value: String, location: SourceLocation) {
        let decl = Decl::new(
            DeclKind::Macro(Macro {
                name: name.to_string(),
                parameters,
                value,
            }),
            Span::point(location),
        );
        let id = self.compilation.add_decl(decl);
        self.compilation.macros.push(id);
    }

    fn process_file(&mut self, path: &Path, text: &str, is_system: bool) {
        let file = self.compilation.add_file(path, is_system);
        debug!(path = %path.display(), is_system, "preprocessing file");

        let tokens = match Lexer::new(text, file).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                self.compilation.diagnostics.error(e.message, e.location);
                return;
            }
        };

        let mut conditions: Vec<Conditional> = Vec::new();
        let mut pending: Vec<Token> = Vec::new();

        for line in split_lines(tokens) {
            if self.cancel.is_cancelled() {
                return;
            }
            let active = conditions.last().map_or(true, |c| c.taking);
            if line.first().is_some_and(|t| t.is_punct(Punct::Hash)) {
                if active {
                    self.flush(&mut pending);
                }
                self.directive(&line, path, is_system, &mut conditions, active);
            } else if active {
                pending.extend(line);
            }
        }
        self.flush(&mut pending);

        for open in conditions {
            self.compilation
                .diagnostics
                .error("unterminated conditional directive", open.location);
        }
    }

    fn flush(&mut self, pending: &mut Vec<Token>) {
        if pending.is_empty() {
            return;
        }
        let expanded = self.expand(std::mem::take(pending), &mut Vec::new());
        self.output.extend(expanded);
    }

    fn directive(
        &mut self,
        line: &[Token],
        path: &Path,
        is_system: bool,
        conditions: &mut Vec<Conditional>,
        active: bool,
    ) {
        let hash_loc = line[0].location();
        let Some(name_token) = line.get(1) else {
            // null directive
            return;
        };
        let name = name_token.spelling();
        let rest = &line[2.min(line.len())..];

        match name.as_str() {
            "if" | "ifdef" | "ifndef" => {
                let taking = active
                    && match name.as_str() {
                        "if" => self.evaluate_condition(rest, hash_loc),
                        "ifdef" => self.is_defined(rest),
                        _ => !self.is_defined(rest),
                    };
                conditions.push(Conditional {
                    parent_active: active,
                    taking,
                    taken: taking || !active,
                    seen_else: false,
                    location: hash_loc,
                });
            }
            "elif" => {
                let Some(top) = conditions.last() else {
                    self.compilation.diagnostics.error("#elif without #if", hash_loc);
                    return;
                };
                if top.seen_else {
                    self.compilation.diagnostics.error("#elif after #else", hash_loc);
                }
                let taking = top.parent_active && !top.taken && self.evaluate_condition(rest, hash_loc);
                if let Some(top) = conditions.last_mut() {
                    top.taking = taking;
                    top.taken |= taking;
                }
            }
            "else" => match conditions.last_mut() {
                Some(top) => {
                    if top.seen_else {
                        self.compilation.diagnostics.error("#else after #else", hash_loc);
                    }
                    top.taking = top.parent_active && !top.taken;
                    top.taken = true;
                    top.seen_else = true;
                }
                None => self.compilation.diagnostics.error("#else without #if", hash_loc),
            },
            "endif" => {
                if conditions.pop().is_none() {
                    self.compilation.diagnostics.error("#endif without #if", hash_loc);
                }
            }
            _ if !active => {}
            "define" => self.define(rest, hash_loc),
            "undef" => {
                if let Some(name) = rest.first().and_then(|t| t.ident()) {
                    self.macros.remove(name);
                }
            }
            "include" | "include_next" | "import" => self.include(rest, path, is_system, hash_loc),
            "pragma" => self.pragma(rest, path, hash_loc),
            "error" => {
                let message = format!("#error {}", join_spelling(rest));
                self.compilation.diagnostics.error(message, hash_loc);
            }
            "warning" => {
                let message = format!("#warning {}", join_spelling(rest));
                self.compilation.diagnostics.warning(message, hash_loc);
            }
            "line" | "ident" | "sccs" | "assert" | "unassert" => {}
            other => {
                if matches!(name_token, Token::Number(..)) {
                    // `# 12 "file.c"` line marker
                    return;
                }
                self.compilation
                    .diagnostics
                    .warning(format!("unknown preprocessing directive #{}", other), hash_loc);
            }
        }
    }

    fn is_defined(&self, rest: &[Token]) -> bool {
        rest.first()
            .and_then(|t| t.ident())
            .is_some_and(|name| self.macros.contains_key(name))
    }

    fn define(&mut self, rest: &[Token], hash_loc: SourceLocation) {
        let Some(Token::Ident(name, name_loc)) = rest.first() else {
            self.compilation
                .diagnostics
                .error("macro name missing in #define", hash_loc);
            return;
        };

        let mut index = 1;
        let mut params = None;
        let mut variadic = false;

        // function-like only when `(` directly follows the name
        if let Some(open) = rest.get(1) {
            let open_loc = open.location();
            if open.is_punct(Punct::LParen)
                && open_loc.line == name_loc.line
                && open_loc.column == name_loc.column + name.chars().count()
            {
                let mut names = Vec::new();
                index = 2;
                loop {
                    match rest.get(index) {
                        Some(Token::Ident(param, _)) => {
                            names.push(param.clone());
                            index += 1;
                            if rest.get(index).is_some_and(|t| t.is_punct(Punct::Ellipsis)) {
                                variadic = true;
                                index += 1;
                            }
                        }
                        Some(t) if t.is_punct(Punct::Ellipsis) => {
                            names.push("__VA_ARGS__".to_string());
                            variadic = true;
                            index += 1;
                        }
                        _ => {}
                    }
                    match rest.get(index) {
                        Some(t) if t.is_punct(Punct::Comma) => index += 1,
                        Some(t) if t.is_punct(Punct::RParen) => {
                            index += 1;
                            break;
                        }
                        _ => {
                            self.compilation
                                .diagnostics
                                .error(format!("invalid parameter list for macro '{}'", name), *name_loc);
                            return;
                        }
                    }
                }
                params = Some(names);
            }
        }

        let body: Vec<Token> = rest[index.min(rest.len())..].to_vec();
        let value = join_spelling(&body);
        trace!(name = %name, value = %value, "define");

        self.macros.insert(
            name.clone(),
            MacroDef {
                params: params.clone(),
                variadic,
                body,
            },
        );
        self.record_macro(name, params, value, *name_loc);
    }

    fn include(&mut self, rest: &[Token], current: &Path, parent_system: bool, hash_loc: SourceLocation) {
        let target = match header_name(rest) {
            Some(target) => Some(target),
            None => {
                // computed include: expand and try again
                let expanded = self.expand(rest.to_vec(), &mut Vec::new());
                header_name(&expanded)
            }
        };
        let Some((name, quoted)) = target else {
            self.compilation
                .diagnostics
                .error("expected \"FILENAME\" or <FILENAME> after #include", hash_loc);
            return;
        };

        let mut candidates = Vec::new();
        if quoted {
            if let Some(dir) = current.parent() {
                candidates.push(dir.join(&name));
            }
        }
        candidates.extend(self.options.include_folders.iter().map(|dir| dir.join(&name)));

        let Some(found) = candidates.into_iter().find(|p| p.is_file()) else {
            self.compilation
                .diagnostics
                .warning(format!("cannot open include file '{}'", name), hash_loc);
            return;
        };

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            self.compilation
                .diagnostics
                .error("#include nested too deeply", hash_loc);
            return;
        }

        let canonical = fs::canonicalize(&found).unwrap_or_else(|_| found.clone());
        if self.once.contains(&canonical) {
            return;
        }

        let text = match fs::read_to_string(&found) {
            Ok(text) => text,
            Err(e) => {
                self.compilation
                    .diagnostics
                    .error(format!("cannot read include file '{}': {}", found.display(), e), hash_loc);
                return;
            }
        };

        self.include_depth += 1;
        self.process_file(&found, &text, parent_system || !quoted);
        self.include_depth -= 1;
    }

    fn pragma(&mut self, rest: &[Token], current: &Path, hash_loc: SourceLocation) {
        let Some(first) = rest.first() else {
            return;
        };
        let name = first.spelling();
        if name == "once" {
            let canonical = fs::canonicalize(current).unwrap_or_else(|_| current.to_path_buf());
            self.once.insert(canonical);
            return;
        }

        let arguments = join_spelling(&rest[1..]);
        let attribute = Decl::new(
            DeclKind::Attribute(Attribute {
                name,
                kind: AttributeKind::Pragma,
                arguments: (!arguments.is_empty()).then_some(arguments),
            }),
            Span::point(hash_loc),
        );
        let id = self.compilation.add_decl(attribute);
        self.compilation.attributes.push(id);
    }

    /// Evaluate the controlling expression of `#if` / `#elif`
    fn evaluate_condition(&mut self, rest: &[Token], hash_loc: SourceLocation) -> bool {
        let mut replaced = Vec::with_capacity(rest.len());
        let mut i = 0;
        while i < rest.len() {
            let token = &rest[i];
            if token.ident() == Some("defined") {
                let loc = token.location();
                let (name, consumed) = match rest.get(i + 1) {
                    Some(t) if t.is_punct(Punct::LParen) => {
                        let closed = rest.get(i + 3).is_some_and(|t| t.is_punct(Punct::RParen));
                        (rest.get(i + 2).and_then(|t| t.ident()), if closed { 4 } else { 3 })
                    }
                    Some(t) => (t.ident(), 2),
                    None => (None, 1),
                };
                let value = name.is_some_and(|n| self.macros.contains_key(n));
                replaced.push(Token::Number(if value { "1" } else { "0" }.to_string(), loc));
                i += consumed;
                continue;
            }
            replaced.push(token.clone());
            i += 1;
        }

        let mut tokens: Vec<Token> = self
            .expand(replaced, &mut Vec::new())
            .into_iter()
            .map(|t| match t {
                Token::Ident(_, loc) => Token::Number("0".to_string(), loc),
                other => other,
            })
            .collect();

        if tokens.is_empty() {
            self.compilation
                .diagnostics
                .error("#if with no expression", hash_loc);
            return false;
        }
        tokens.push(Token::Eof(hash_loc));

        let mut parser = Parser::new(tokens, &mut *self.compilation);
        match parser.parse_directive_condition() {
            Ok(value) => value != 0,
            Err(e) => {
                self.compilation.diagnostics.error(e.message, e.location);
                false
            }
        }
    }

    /// Expand macros in `tokens`. `disabled` holds the macros whose
    /// expansion is in progress; they are not expanded again.
    fn expand(&mut self, tokens: Vec<Token>, disabled: &mut Vec<String>) -> Vec<Token> {
        if self.expansion_depth >= MAX_EXPANSION_DEPTH {
            let location = tokens.first().map(|t| t.location()).unwrap_or_default();
            self.compilation.diagnostics.error(
                format!("macro expansion nested deeper than {} levels", MAX_EXPANSION_DEPTH),
                location,
            );
            return Vec::new();
        }
        self.expansion_depth += 1;
        let out = self.expand_tokens(tokens, disabled);
        self.expansion_depth -= 1;
        out
    }

    fn expand_tokens(&mut self, tokens: Vec<Token>, disabled: &mut Vec<String>) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            let Token::Ident(name, loc) = token else {
                out.push(token.clone());
                i += 1;
                continue;
            };
            let loc = *loc;

            match name.as_str() {
                "__FILE__" => {
                    let file = self.compilation.file_name(loc.file).replace('\\', "\\\\");
                    out.push(Token::StringLiteral(format!("\"{}\"", file), loc));
                    i += 1;
                    continue;
                }
                "__LINE__" => {
                    out.push(Token::Number(loc.line.to_string(), loc));
                    i += 1;
                    continue;
                }
                "_Pragma" | "__pragma" if tokens.get(i + 1).is_some_and(|t| t.is_punct(Punct::LParen)) => {
                    i = skip_balanced(&tokens, i + 1);
                    continue;
                }
                _ => {}
            }

            if disabled.iter().any(|d| d == name) {
                out.push(token.clone());
                i += 1;
                continue;
            }
            let Some(def) = self.macros.get(name).cloned() else {
                out.push(token.clone());
                i += 1;
                continue;
            };
            let name = name.clone();

            match &def.params {
                None => {
                    let body = paste(substitute(&def, &[], &[]), loc);
                    disabled.push(name);
                    let expanded = self.expand(body, disabled);
                    disabled.pop();
                    out.extend(expanded.into_iter().map(|t| t.relocated(loc)));
                    i += 1;
                }
                Some(params) => {
                    if !tokens.get(i + 1).is_some_and(|t| t.is_punct(Punct::LParen)) {
                        // a function-like macro name without arguments is left alone
                        out.push(tokens[i].clone());
                        i += 1;
                        continue;
                    }
                    let Some((args, next)) = collect_arguments(&tokens, i + 1, params.len(), def.variadic) else {
                        self.compilation.diagnostics.error(
                            format!("unterminated argument list invoking macro '{}'", name),
                            loc,
                        );
                        i = tokens.len();
                        continue;
                    };
                    let arity_ok = args.len() == params.len()
                        || (def.variadic && args.len() + 1 == params.len())
                        || (params.is_empty() && args.len() == 1 && args[0].is_empty());
                    if !arity_ok {
                        self.compilation.diagnostics.error(
                            format!(
                                "macro '{}' expects {} arguments, {} given",
                                name,
                                params.len(),
                                args.len()
                            ),
                            loc,
                        );
                    }

                    let expanded_args: Vec<Vec<Token>> = args
                        .iter()
                        .map(|arg| self.expand(arg.clone(), disabled))
                        .collect();
                    let body = paste(substitute(&def, &args, &expanded_args), loc);

                    disabled.push(name);
                    let expanded = self.expand(body, disabled);
                    disabled.pop();
                    out.extend(expanded.into_iter().map(|t| t.relocated(loc)));
                    i = next;
                }
            }
        }

        out
    }
}

/// One piece of a macro body after parameter substitution. `None` is a
/// placemarker left by an empty argument next to `##`.
enum Piece {
    Token(Option<Token>),
    Paste,
}

/// Replace parameters in the macro body. `raw` arguments are used next to
/// `#` and `##`, `expanded` ones everywhere else.
fn substitute(def: &MacroDef, raw: &[Vec<Token>], expanded: &[Vec<Token>]) -> Vec<Piece> {
    let params = def.params.as_deref().unwrap_or(&[]);
    let param_index = |t: &Token| t.ident().and_then(|name| params.iter().position(|p| p == name));
    let body = &def.body;
    let mut pieces = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let token = &body[i];

        if token.is_punct(Punct::Hash) && def.params.is_some() {
            if let Some(index) = body.get(i + 1).and_then(param_index) {
                let arg = raw.get(index).map(Vec::as_slice).unwrap_or(&[]);
                pieces.push(Piece::Token(Some(stringify(arg, token.location()))));
                i += 2;
                continue;
            }
        }

        if token.is_punct(Punct::HashHash) {
            // GNU `, ## __VA_ARGS__` drops the comma when there are no extra arguments
            let next_is_empty_va = body
                .get(i + 1)
                .and_then(param_index)
                .is_some_and(|index| def.variadic && index + 1 == params.len() && raw.get(index).map_or(true, Vec::is_empty));
            let prev_is_comma = matches!(pieces.last(), Some(Piece::Token(Some(t))) if t.is_punct(Punct::Comma));
            if next_is_empty_va && prev_is_comma {
                pieces.pop();
                i += 2;
                continue;
            }
            pieces.push(Piece::Paste);
            i += 1;
            continue;
        }

        if let Some(index) = param_index(token) {
            let next_is_paste = body.get(i + 1).is_some_and(|t| t.is_punct(Punct::HashHash));
            let prev_is_paste = matches!(pieces.last(), Some(Piece::Paste));
            let arg = if next_is_paste || prev_is_paste {
                raw.get(index)
            } else {
                expanded.get(index)
            };
            let arg = arg.map(Vec::as_slice).unwrap_or(&[]);
            if arg.is_empty() && (next_is_paste || prev_is_paste) {
                pieces.push(Piece::Token(None));
            }
            pieces.extend(arg.iter().cloned().map(|t| Piece::Token(Some(t))));
            i += 1;
            continue;
        }

        pieces.push(Piece::Token(Some(token.clone())));
        i += 1;
    }

    pieces
}

/// Apply `##` operators and drop placemarkers
fn paste(pieces: Vec<Piece>, loc: SourceLocation) -> Vec<Token> {
    let mut out: Vec<Option<Token>> = Vec::with_capacity(pieces.len());
    let mut pasting = false;

    for piece in pieces {
        match piece {
            Piece::Paste => pasting = true,
            Piece::Token(token) => {
                if pasting {
                    pasting = false;
                    match (out.pop().flatten(), token) {
                        (Some(left), Some(right)) => {
                            let spelling = format!("{}{}", left.spelling(), right.spelling());
                            let joined = lex_fragment(&spelling, loc);
                            if joined.is_empty() {
                                out.push(Some(left));
                                out.push(Some(right));
                            } else {
                                out.extend(joined.into_iter().map(Some));
                            }
                        }
                        (Some(only), None) | (None, Some(only)) => out.push(Some(only)),
                        (None, None) => out.push(None),
                    }
                } else {
                    out.push(token);
                }
            }
        }
    }

    out.into_iter().flatten().collect()
}

/// `#arg`: spell the argument as a string literal
fn stringify(arg: &[Token], loc: SourceLocation) -> Token {
    let mut text = String::new();
    for (index, token) in arg.iter().enumerate() {
        if index > 0 && !adjacent(&arg[index - 1], token) {
            text.push(' ');
        }
        let spelling = token.spelling();
        if matches!(token, Token::StringLiteral(..) | Token::CharLiteral(..)) {
            text.push_str(&spelling.replace('\\', "\\\\").replace('"', "\\\""));
        } else {
            text.push_str(&spelling);
        }
    }
    Token::StringLiteral(format!("\"{}\"", text), loc)
}

/// Arguments of a function-like macro invocation starting at the `(` at
/// `open`. Returns the arguments and the index after the closing `)`.
fn collect_arguments(
    tokens: &[Token],
    open: usize,
    param_count: usize,
    variadic: bool,
) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 0usize;
    let mut i = open + 1;

    while i < tokens.len() {
        let token = &tokens[i];
        match token {
            Token::Punct(Punct::LParen, _) => depth += 1,
            Token::Punct(Punct::RParen, _) if depth == 0 => return Some((args, i + 1)),
            Token::Punct(Punct::RParen, _) => depth -= 1,
            Token::Punct(Punct::Comma, _) if depth == 0 => {
                // extra arguments of a variadic macro stay in the last one
                if !(variadic && args.len() >= param_count) {
                    args.push(Vec::new());
                    i += 1;
                    continue;
                }
            }
            Token::Eof(_) => return None,
            _ => {}
        }
        if let Some(last) = args.last_mut() {
            last.push(token.clone());
        }
        i += 1;
    }

    None
}

/// Index after the parenthesised group starting at `open`
fn skip_balanced(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Punct(Punct::LParen, _) => depth += 1,
            Token::Punct(Punct::RParen, _) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    tokens.len()
}

/// `"name"` or `<name>` at the start of an include line
fn header_name(tokens: &[Token]) -> Option<(String, bool)> {
    match tokens.first()? {
        Token::StringLiteral(raw, _) => Some((decode_string_literal(raw), true)),
        Token::Punct(Punct::Lt, _) => {
            let close = tokens.iter().position(|t| t.is_punct(Punct::Gt))?;
            let name: String = tokens[1..close].iter().map(|t| t.spelling()).collect();
            Some((name, false))
        }
        _ => None,
    }
}

fn split_lines(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token {
            Token::Newline(_) | Token::Eof(_) => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lex a macro value or pasted spelling; location of every token is `loc`
fn lex_fragment(text: &str, loc: SourceLocation) -> Vec<Token> {
    Lexer::new(text, loc.file)
        .tokenize()
        .map(|tokens| {
            tokens
                .into_iter()
                .filter(|t| !matches!(t, Token::Newline(_) | Token::Eof(_)))
                .map(|t| t.relocated(loc))
                .collect()
        })
        .unwrap_or_default()
}

/// Macros every translation unit starts with
fn builtin_defines(options: &ParserOptions) -> Vec<(String, String)> {
    use crate::compilation::TargetCpu;

    let mut defines: Vec<(&str, String)> = vec![("__STDC__", "1".into()), ("__STDC_HOSTED__", "1".into())];
    if let Some(version) = options.dialect.stdc_version() {
        defines.push(("__STDC_VERSION__", version.into()));
    }

    if options.msvc {
        defines.push(("_WIN32", "1".into()));
        defines.push(("_MSC_VER", "1900".into()));
        defines.push(("_INTEGRAL_MAX_BITS", "64".into()));
        if options.ms_extensions() {
            defines.push(("_MSC_EXTENSIONS", "1".into()));
        }
        match options.target_cpu {
            TargetCpu::X86_64 => {
                defines.push(("_WIN64", "1".into()));
                defines.push(("_M_X64", "100".into()));
                defines.push(("_M_AMD64", "100".into()));
            }
            TargetCpu::X86 => defines.push(("_M_IX86", "600".into())),
            TargetCpu::Arm64 => {
                defines.push(("_WIN64", "1".into()));
                defines.push(("_M_ARM64", "1".into()));
            }
            TargetCpu::Arm => defines.push(("_M_ARM", "7".into())),
        }
    } else {
        defines.push(("__CHAR_BIT__", "8".into()));
        match options.target_cpu {
            TargetCpu::X86_64 => defines.push(("__x86_64__", "1".into())),
            TargetCpu::X86 => defines.push(("__i386__", "1".into())),
            TargetCpu::Arm64 => defines.push(("__aarch64__", "1".into())),
            TargetCpu::Arm => defines.push(("__arm__", "1".into())),
        }
        if options.target_cpu.is_64_bit() {
            defines.push(("__LP64__", "1".into()));
        }
    }

    defines
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::Severity;
    use pretty_assertions::assert_eq;

    fn preprocess(source: &str) -> (Vec<String>, Compilation) {
        preprocess_with(source, &ParserOptions::default())
    }

    fn preprocess_with(source: &str, options: &ParserOptions) -> (Vec<String>, Compilation) {
        let mut compilation = Compilation::new(options.target_info());
        let tokens = Preprocessor::new(&mut compilation, options).run_source(Path::new("test.c"), source);
        let spellings = tokens
            .iter()
            .filter(|t| !matches!(t, Token::Eof(_)))
            .map(|t| t.spelling())
            .collect();
        (spellings, compilation)
    }

    #[test]
    fn test_object_like_macro() {
        let (tokens, c) = preprocess("#define N 10\nint a[N];");
        assert_eq!(tokens, vec!["int", "a", "[", "10", "]", ";"]);
        assert_eq!(c.macros.len(), 1);
        assert_eq!(c.display_decl(c.macros[0]).to_string(), "#define N 10");
    }

    #[test]
    fn test_function_like_macro() {
        let (tokens, _) = preprocess("#define MAX(a, b) ((a) > (b) ? (a) : (b))\nx = MAX(1, y);");
        assert_eq!(
            tokens.join(" "),
            "x = ( ( 1 ) > ( y ) ? ( 1 ) : ( y ) ) ;"
        );
    }

    #[test]
    fn test_stringify_and_paste() {
        let (tokens, _) = preprocess("#define STR(x) #x\n#define CAT(a, b) a##b\nSTR(hello world) CAT(foo, _bar)");
        assert_eq!(tokens, vec!["\"hello world\"", "foo_bar"]);
    }

    #[test]
    fn test_variadic_macro() {
        let (tokens, _) = preprocess("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\nLOG(\"%d %d\", 1, 2);");
        assert_eq!(tokens.join(" "), "printf ( \"%d %d\" , 1 , 2 ) ;");

        let (tokens, _) = preprocess("#define LOG(fmt, ...) printf(fmt, ## __VA_ARGS__)\nLOG(\"x\");");
        assert_eq!(tokens.join(" "), "printf ( \"x\" ) ;");
    }

    #[test]
    fn test_self_reference_does_not_loop() {
        let (tokens, _) = preprocess("#define foo foo + 1\nfoo");
        assert_eq!(tokens, vec!["foo", "+", "1"]);
    }

    #[test]
    fn test_conditionals() {
        let source = "#define A 2\n#if A > 1 && defined(A)\nyes\n#elif 1\nno1\n#else\nno2\n#endif\n#ifdef B\nno3\n#endif\n#ifndef B\nyes2\n#endif";
        let (tokens, c) = preprocess(source);
        assert_eq!(tokens, vec!["yes", "yes2"]);
        assert!(!c.has_errors());
    }

    #[test]
    fn test_nested_inactive_groups() {
        let source = "#if 0\n#if 1\nno\n#else\nno\n#endif\n#elif 1\nyes\n#endif";
        let (tokens, _) = preprocess(source);
        assert_eq!(tokens, vec!["yes"]);
    }

    #[test]
    fn test_command_line_defines() {
        let options = ParserOptions {
            defines: vec!["NDEBUG".to_string(), "LEVEL=3".to_string()],
            ..ParserOptions::default()
        };
        let (tokens, c) = preprocess_with("#if LEVEL == 3 && NDEBUG\nok\n#endif", &options);
        assert_eq!(tokens, vec!["ok"]);
        let names: Vec<String> = c.macros.iter().map(|m| c.decl(*m).name().to_string()).collect();
        assert_eq!(names, vec!["NDEBUG", "LEVEL"]);
    }

    #[test]
    fn test_msvc_predefines() {
        let options = ParserOptions {
            msvc: true,
            ..ParserOptions::default()
        };
        let (tokens, _) = preprocess_with("#if defined(_WIN64) && _MSC_VER >= 1900\nwin\n#endif", &options);
        assert_eq!(tokens, vec!["win"]);
    }

    #[test]
    fn test_error_directive_and_missing_include() {
        let (_, c) = preprocess("#include \"missing.h\"\n#error stop here");
        let messages = c.diagnostics.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].severity, Severity::Warning);
        assert_eq!(messages[1].severity, Severity::Error);
        assert_eq!(messages[1].message, "#error stop here");
    }

    #[test]
    fn test_pragma_becomes_attribute() {
        let (_, c) = preprocess("#pragma once\n#pragma warning(disable: 4996)");
        assert_eq!(c.attributes.len(), 1);
        assert_eq!(c.display_decl(c.attributes[0]).to_string(), "#pragma warning (disable: 4996)");
    }

    #[test]
    fn test_unterminated_if() {
        let (_, c) = preprocess("#if 1\nint x;");
        assert!(c.has_errors());
    }

    #[test]
    fn test_include_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("defs.h"), "#pragma once\n#define SIZE 4\ntypedef int word;\n").unwrap();
        let main = dir.path().join("main.c");
        std::fs::write(&main, "#include \"defs.h\"\n#include \"defs.h\"\nword w[SIZE];\n").unwrap();

        let options = ParserOptions::default();
        let mut compilation = Compilation::new(options.target_info());
        let tokens = Preprocessor::new(&mut compilation, &options).run(&main).unwrap();
        let spelled: Vec<String> = tokens.iter().map(|t| t.spelling()).filter(|s| !s.is_empty()).collect();
        assert_eq!(
            spelled,
            vec!["typedef", "int", "word", ";", "word", "w", "[", "4", "]", ";"]
        );
    }
}
