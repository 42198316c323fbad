//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error types, helper methods, scopes, and the main parse entry
//! point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, scopes and coordination
//! - `declarations`: specifiers, declarators, records, enums, functions
//! - `statements`: parsing statements (if, while, for, etc.)
//! - `expressions`: parsing expressions with precedence climbing
//! - `eval`: integer constant evaluation (enum values, array sizes, `#if`)
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state. Declarations are written
//! straight into the [`Compilation`] arena; syntax errors become diagnostics
//! and parsing resumes at the next `;` or `}`.

use crate::compilation::{Compilation, DeclId, TypeId};
use crate::parser::ast::*;
use crate::parser::eval;
use crate::parser::lexer::{Keyword, LexError, Punct, Token};
use crate::parser::CancelToken;
use rustc_hash::FxHashMap;
use std::fmt;

/// Deepest nesting of expressions, statements, declarators, initializers
/// and record bodies the parser descends into
pub const MAX_NESTING: usize = 256;

/// Parser error type
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// What an ordinary identifier denotes in a scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Ordinary {
    /// A typedef name; the type is the `Declared` type of the typedef
    Typedef(TypeId),
    EnumConstant(i64),
    /// Variables, functions and parameters
    Object,
}

#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub(crate) ordinary: FxHashMap<String, Ordinary>,
    /// struct, union and enum tags
    pub(crate) tags: FxHashMap<String, DeclId>,
}

/// Recursive descent parser for C
pub struct Parser<'c> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    pub(crate) compilation: &'c mut Compilation,
    pub(crate) scopes: Vec<Scope>,
    /// Records whose member list is being parsed, innermost last
    pub(crate) record_stack: Vec<DeclId>,
    pub(crate) function_bodies: bool,
    /// Current recursion depth, bounded by [`MAX_NESTING`]
    pub(crate) depth: usize,
    pub(crate) cancel: CancelToken,
}

impl<'c> Parser<'c> {
    /// Create a parser over preprocessed, keyword-classified tokens
    pub fn new(mut tokens: Vec<Token>, compilation: &'c mut Compilation) -> Self {
        if !matches!(tokens.last(), Some(Token::Eof(_))) {
            let end = tokens.last().map(|t| t.location()).unwrap_or_default();
            tokens.push(Token::Eof(end));
        }
        Self {
            tokens,
            position: 0,
            compilation,
            scopes: vec![Scope::default()],
            record_stack: Vec::new(),
            function_bodies: true,
            depth: 0,
            cancel: CancelToken::default(),
        }
    }

    /// Skip function bodies by brace matching instead of parsing them
    pub fn with_function_bodies(mut self, enabled: bool) -> Self {
        self.function_bodies = enabled;
        self
    }

    /// Stop early once `cancel` is set
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Parse all external declarations into the compilation
    pub fn parse_translation_unit(&mut self) {
        while !self.is_at_end() {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(e) = self.parse_external_declaration() {
                self.report(e);
                self.recover();
            }
        }
    }

    /// Controlling expression of `#if`; identifiers were already replaced
    pub(crate) fn parse_directive_condition(&mut self) -> Result<i64, ParseError> {
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(ParseError {
                message: format!("Unexpected {} in preprocessor expression", self.peek()),
                location: self.current_location(),
            });
        }
        self.constant_value(&expr).ok_or_else(|| ParseError {
            message: "Preprocessor expression is not an integer constant".to_string(),
            location: *expr.location(),
        })
    }

    /// Run `parse` one nesting level deeper, failing once the input nests
    /// past [`MAX_NESTING`]
    pub(crate) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError {
                message: format!("Nesting exceeds {} levels", MAX_NESTING),
                location: self.current_location(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    pub(crate) fn report(&mut self, error: ParseError) {
        self.compilation.diagnostics.error(error.message, error.location);
    }

    /// Skip to the end of the broken declaration: past the next `;` at
    /// brace depth 0, or past the `}` closing a block opened on the way.
    pub(crate) fn recover(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            let token = self.advance().clone();
            match token {
                Token::Punct(Punct::Semicolon, _) if depth == 0 => return,
                Token::Punct(Punct::LBrace, _) => depth += 1,
                Token::Punct(Punct::RBrace, _) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    // ===== Scopes =====

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub(crate) fn at_file_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub(crate) fn lookup_ordinary(&self, name: &str) -> Option<Ordinary> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.ordinary.get(name).copied())
    }

    pub(crate) fn lookup_typedef(&self, name: &str) -> Option<TypeId> {
        match self.lookup_ordinary(name) {
            Some(Ordinary::Typedef(ty)) => Some(ty),
            _ => None,
        }
    }

    pub(crate) fn declare_ordinary(&mut self, name: &str, meaning: Ordinary) {
        if name.is_empty() {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.ordinary.insert(name.to_string(), meaning);
        }
    }

    pub(crate) fn lookup_tag(&self, name: &str) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.tags.get(name).copied())
    }

    pub(crate) fn lookup_tag_in_current_scope(&self, name: &str) -> Option<DeclId> {
        self.scopes.last().and_then(|scope| scope.tags.get(name).copied())
    }

    pub(crate) fn declare_tag(&mut self, name: &str, id: DeclId) {
        if name.is_empty() {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.tags.insert(name.to_string(), id);
        }
    }

    /// Integer value of a constant expression, using the enum constants in scope
    pub(crate) fn constant_value(&self, expr: &Expr) -> Option<i64> {
        let scopes = &self.scopes;
        let lookup = |name: &str| {
            scopes
                .iter()
                .rev()
                .find_map(|scope| scope.ordinary.get(name))
                .and_then(|meaning| match meaning {
                    Ordinary::EnumConstant(value) => Some(*value),
                    _ => None,
                })
        };
        eval::evaluate(expr, &*self.compilation, &lookup)
    }

    // ===== Helper methods =====

    pub(crate) fn check_punct(&self, punct: Punct) -> bool {
        self.peek().is_punct(punct)
    }

    pub(crate) fn match_punct(&mut self, punct: Punct) -> bool {
        if self.check_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k, _) if *k == keyword)
    }

    pub(crate) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof(_))
    }

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location()
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location()
    }

    pub(crate) fn expect_punct(&mut self, punct: Punct, message: &str) -> Result<(), ParseError> {
        if self.match_punct(punct) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("{}, found {}", message, self.peek()),
                location: self.current_location(),
            })
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_punct(Punct::LParen, &format!("Expected '(' {ctx}"))
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_punct(Punct::RParen, &format!("Expected ')' {ctx}"))
    }

    pub(crate) fn expect_lbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_punct(Punct::LBrace, &format!("Expected '{{' {ctx}"))
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_punct(Punct::RBrace, &format!("Expected '}}' {ctx}"))
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_punct(Punct::Semicolon, &format!("Expected ';' {ctx}"))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let Token::Ident(name, _) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(ParseError {
                message: format!("Expected identifier, found {}", self.peek()),
                location: self.current_location(),
            })
        }
    }

    /// Skip a parenthesised group starting at the current `(`
    pub(crate) fn skip_parenthesized(&mut self) -> Result<Vec<Token>, ParseError> {
        self.skip_balanced(Punct::LParen, Punct::RParen)
    }

    /// Skip a balanced `open ... close` group, returning the inner tokens
    pub(crate) fn skip_balanced(&mut self, open: Punct, close: Punct) -> Result<Vec<Token>, ParseError> {
        let start = self.current_location();
        if !self.match_punct(open) {
            return Err(ParseError {
                message: format!("Expected '{}', found {}", open.as_str(), self.peek()),
                location: start,
            });
        }
        let mut depth = 1usize;
        let mut inner = Vec::new();
        while !self.is_at_end() {
            let token = self.advance().clone();
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(inner);
                }
            }
            inner.push(token);
        }
        Err(ParseError {
            message: format!("Unbalanced '{}'", open.as_str()),
            location: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::{CType, Compilation, DeclKind, PrimitiveKind};
    use crate::config::options::ParserOptions;
    use crate::parser::parse_source;

    fn parse(source: &str) -> Compilation {
        parse_source(source, &ParserOptions::default())
    }

    #[test]
    fn test_parse_simple_function() {
        let c = parse("int main() { return 0; }");

        assert!(!c.has_errors());
        assert_eq!(c.functions.len(), 1);
        let main = c.decl(c.functions[0]).as_function().unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(main.parameters.len(), 0);
        assert_eq!(c.ty(main.return_type), &CType::Primitive(PrimitiveKind::Int));
        assert_eq!(main.body.len(), 1);
        assert!(main.flags.has_body);
    }

    #[test]
    fn test_parse_struct() {
        let c = parse("struct Point { int x; int y; };");

        assert_eq!(c.classes.len(), 1);
        let point = c.decl(c.classes[0]).as_class().unwrap();
        assert_eq!(point.name, "Point");
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.size_of, 8);
        for field in &point.fields {
            assert_eq!(c.decl(*field).parent, Some(c.classes[0]));
        }
    }

    #[test]
    fn test_error_recovery_keeps_later_declarations() {
        let c = parse("int broken( ;\nint ok(void);\nstruct S { int a; };");

        assert!(c.has_errors());
        let names: Vec<&str> = c.functions.iter().map(|f| c.decl(*f).name()).collect();
        assert!(names.contains(&"ok"));
        assert_eq!(c.classes.len(), 1);
    }

    #[test]
    fn test_typedef_scoping() {
        let c = parse("typedef int word;\nword w;\nvoid f(void) { int word = 1; word = 2; }");

        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        assert_eq!(c.typedefs.len(), 1);
        assert_eq!(c.fields.len(), 1);
        let DeclKind::Field(w) = &c.decl(c.fields[0]).kind else {
            panic!("Expected field");
        };
        assert!(matches!(c.ty(w.ty), CType::Declared(_)));
    }
}
