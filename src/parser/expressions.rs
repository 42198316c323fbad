//! Expression parsing implementation
//!
//! This module handles parsing of C expressions using precedence climbing
//! for binary operators and recursive descent for other expression forms.
//!
//! # Supported Expressions
//!
//! - Literals: integers (any radix and suffix), floats, characters, strings
//! - Identifiers and variables
//! - Binary operators: arithmetic, comparison, logical, bitwise
//! - Unary operators: `-`, `+`, `!`, `~`, `&`, `*`, `++`, `--`
//! - Postfix: `[]`, `.`, `->`, `()`, `++`, `--`
//! - Ternary `? :`, assignment and comma
//! - Type casts `(type)expr` and compound literals `(type){...}`
//! - `sizeof` on types and expressions
//! - Initializer lists with designators
//!
//! # Precedence
//!
//! Binary operators follow C precedence rules; each level binds tighter
//! than the one above it:
//!
//! ```text
//! 1  ||          6  == !=
//! 2  &&          7  < <= > >=
//! 3  |           8  << >>
//! 4  ^           9  + -
//! 5  &           10 * / %
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::compilation::CType;
use crate::parser::ast::*;
use crate::parser::lexer::{decode_char_literal, decode_string_literal, join_spelling, Keyword, Punct, Token};
use crate::parser::parse::{ParseError, Parser};

fn binary_operator(token: &Token) -> Option<(BinOp, u8)> {
    let Token::Punct(punct, _) = token else {
        return None;
    };
    let entry = match punct {
        Punct::OrOr => (BinOp::Or, 1),
        Punct::AndAnd => (BinOp::And, 2),
        Punct::Pipe => (BinOp::BitOr, 3),
        Punct::Caret => (BinOp::BitXor, 4),
        Punct::Amp => (BinOp::BitAnd, 5),
        Punct::EqEq => (BinOp::Eq, 6),
        Punct::NotEq => (BinOp::Ne, 6),
        Punct::Lt => (BinOp::Lt, 7),
        Punct::Le => (BinOp::Le, 7),
        Punct::Gt => (BinOp::Gt, 7),
        Punct::Ge => (BinOp::Ge, 7),
        Punct::LtLt => (BinOp::Shl, 8),
        Punct::GtGt => (BinOp::Shr, 8),
        Punct::Plus => (BinOp::Add, 9),
        Punct::Minus => (BinOp::Sub, 9),
        Punct::Star => (BinOp::Mul, 10),
        Punct::Slash => (BinOp::Div, 10),
        Punct::Percent => (BinOp::Mod, 10),
        _ => return None,
    };
    Some(entry)
}

fn assignment_operator(token: &Token) -> Option<AssignOp> {
    let Token::Punct(punct, _) = token else {
        return None;
    };
    let op = match punct {
        Punct::Eq => AssignOp::Assign,
        Punct::PlusEq => AssignOp::Compound(BinOp::Add),
        Punct::MinusEq => AssignOp::Compound(BinOp::Sub),
        Punct::StarEq => AssignOp::Compound(BinOp::Mul),
        Punct::SlashEq => AssignOp::Compound(BinOp::Div),
        Punct::PercentEq => AssignOp::Compound(BinOp::Mod),
        Punct::AmpEq => AssignOp::Compound(BinOp::BitAnd),
        Punct::PipeEq => AssignOp::Compound(BinOp::BitOr),
        Punct::CaretEq => AssignOp::Compound(BinOp::BitXor),
        Punct::LtLtEq => AssignOp::Compound(BinOp::Shl),
        Punct::GtGtEq => AssignOp::Compound(BinOp::Shr),
        _ => return None,
    };
    Some(op)
}

/// Drop `u`, `l`, `ll` and MSVC `i64`-style suffixes
fn strip_integer_suffix(spelling: &str) -> &str {
    let trimmed = ["i64", "i32", "i16", "i8"]
        .iter()
        .find_map(|suffix| spelling.strip_suffix(suffix))
        .unwrap_or(spelling);
    trimmed.trim_end_matches(['u', 'l'])
}

/// Hexadecimal float such as `0x1.8p3`; input is lowercase without `0x`
fn parse_hex_float(body: &str) -> Option<f64> {
    let (mantissa, exponent) = body.split_once('p')?;
    let exponent: i32 = exponent.trim_end_matches(['f', 'l']).parse().ok()?;
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut value = 0f64;
    for digit in int_part.chars() {
        value = value * 16.0 + f64::from(digit.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for digit in frac_part.chars() {
        value += f64::from(digit.to_digit(16)?) * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exponent))
}

impl Parser<'_> {
    /// Parse expression (top-level entry point), including the comma operator
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_assignment_expression()?;
        while self.check_punct(Punct::Comma) {
            let location = self.current_location();
            self.advance();
            let right = self.parse_assignment_expression()?;
            expr = Expr::Comma {
                left: Box::new(expr),
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    /// Parse assignment or ternary (right-associative)
    pub(crate) fn parse_assignment_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::assignment_expression)
    }

    fn assignment_expression(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_conditional_expression()?;

        let location = self.current_location();
        if let Some(op) = assignment_operator(self.peek()) {
            self.advance();
            let value = self.parse_assignment_expression()?;
            return Ok(Expr::Assign {
                op,
                target: Box::new(expr),
                value: Box::new(value),
                location,
            });
        }

        Ok(expr)
    }

    /// Parse ternary: condition ? true_expr : false_expr
    pub(crate) fn parse_conditional_expression(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_binary(1)?;

        let location = self.current_location();
        if !self.match_punct(Punct::Question) {
            return Ok(condition);
        }
        // GNU `a ?: b`
        let then_expr = if self.check_punct(Punct::Colon) {
            condition.clone()
        } else {
            self.parse_expression()?
        };
        self.expect_punct(Punct::Colon, "Expected ':' in conditional expression")?;
        let else_expr = self.nested(Self::parse_conditional_expression)?;

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            location,
        })
    }

    /// Precedence climbing over the binary operator table
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_cast_expression()?;

        while let Some((op, precedence)) = binary_operator(self.peek()) {
            if precedence < min_precedence {
                break;
            }
            let location = self.current_location();
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }

        Ok(left)
    }

    /// Parse a cast `(type) expr`, a compound literal, or a unary expression
    fn parse_cast_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::cast_expression)
    }

    fn cast_expression(&mut self) -> Result<Expr, ParseError> {
        if !self.check_punct(Punct::LParen) {
            return self.parse_unary();
        }
        let location = self.current_location();

        let ty = if self.peek_ahead(1).is_some_and(|t| self.is_type_start(t)) {
            self.advance();
            self.parse_type_name()?
        } else if let Some((name, pointers)) = self.unexposed_cast() {
            self.advance();
            self.advance();
            let mut ty = self.compilation.types_mut().intern(CType::Unexposed(name));
            for _ in 0..pointers {
                self.advance();
                ty = self.compilation.types_mut().pointer_to(ty);
            }
            ty
        } else {
            return self.parse_unary();
        };
        self.expect_rparen("after type name")?;

        if self.check_punct(Punct::LBrace) {
            let init = self.parse_initializer()?;
            let literal = Expr::CompoundLiteral {
                ty,
                init: Box::new(init),
                location,
            };
            return self.parse_postfix(literal);
        }

        let expr = self.parse_cast_expression()?;
        Ok(Expr::Cast {
            ty,
            expr: Box::new(expr),
            location,
        })
    }

    /// At `(`: an undeclared identifier, optionally followed by `*`s, used
    /// as a cast, e.g. `(HANDLE)value` when the header defining it is missing
    fn unexposed_cast(&self) -> Option<(String, usize)> {
        let Some(Token::Ident(name, _)) = self.peek_ahead(1) else {
            return None;
        };
        if self.lookup_ordinary(name).is_some() {
            return None;
        }
        let mut offset = 2;
        let mut pointers = 0;
        while self.peek_ahead(offset).is_some_and(|t| t.is_punct(Punct::Star)) {
            pointers += 1;
            offset += 1;
        }
        if !self.peek_ahead(offset).is_some_and(|t| t.is_punct(Punct::RParen)) {
            return None;
        }
        let operand = match self.peek_ahead(offset + 1) {
            Some(Token::Ident(..) | Token::Number(..) | Token::CharLiteral(..) | Token::StringLiteral(..)) => true,
            Some(Token::Keyword(Keyword::Sizeof, _)) => true,
            // `(a*)` is never an expression, so any operand start will do
            Some(Token::Punct(
                Punct::LParen | Punct::Amp | Punct::Star | Punct::Minus | Punct::Tilde | Punct::Bang,
                _,
            )) => pointers > 0,
            _ => false,
        };
        operand.then(|| (name.clone(), pointers))
    }

    /// Parse unary operators
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let location = self.current_location();

        let op = match self.peek() {
            Token::Punct(Punct::PlusPlus, _) => Some(UnOp::PreInc),
            Token::Punct(Punct::MinusMinus, _) => Some(UnOp::PreDec),
            Token::Punct(Punct::Minus, _) => Some(UnOp::Neg),
            Token::Punct(Punct::Plus, _) => Some(UnOp::Plus),
            Token::Punct(Punct::Bang, _) => Some(UnOp::Not),
            Token::Punct(Punct::Tilde, _) => Some(UnOp::BitNot),
            Token::Punct(Punct::Star, _) => Some(UnOp::Deref),
            Token::Punct(Punct::Amp, _) => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = match op {
                UnOp::PreInc | UnOp::PreDec => self.nested(Self::parse_unary)?,
                _ => self.parse_cast_expression()?,
            };
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                location,
            });
        }

        if self.match_keyword(Keyword::Sizeof) {
            return self.parse_sizeof(location);
        }
        if self.match_keyword(Keyword::Extension) {
            return self.parse_cast_expression();
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_sizeof(&mut self, location: SourceLocation) -> Result<Expr, ParseError> {
        if self.check_punct(Punct::LParen) && self.peek_ahead(1).is_some_and(|t| self.is_type_start(t)) {
            self.advance();
            let ty = self.parse_type_name()?;
            self.expect_rparen("after type in sizeof")?;
            if self.check_punct(Punct::LBrace) {
                let init = self.parse_initializer()?;
                let literal = Expr::CompoundLiteral {
                    ty,
                    init: Box::new(init),
                    location,
                };
                let expr = self.parse_postfix(literal)?;
                return Ok(Expr::SizeofExpr {
                    expr: Box::new(expr),
                    location,
                });
            }
            return Ok(Expr::SizeofType { ty, location });
        }

        let expr = self.nested(Self::parse_unary)?;
        Ok(Expr::SizeofExpr {
            expr: Box::new(expr),
            location,
        })
    }

    /// Parse postfix operators applied to `expr`
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            let location = *expr.location();
            if self.match_punct(Punct::LBracket) {
                let index = self.parse_expression()?;
                self.expect_punct(Punct::RBracket, "Expected ']' after index")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    location,
                };
            } else if self.match_punct(Punct::LParen) {
                let args = self.parse_argument_list()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    location,
                };
            } else if self.check_punct(Punct::Dot) || self.check_punct(Punct::Arrow) {
                let is_arrow = self.check_punct(Punct::Arrow);
                self.advance();
                let member = self.expect_identifier()?;
                expr = Expr::Member {
                    base: Box::new(expr),
                    member,
                    is_arrow,
                    location,
                };
            } else if self.match_punct(Punct::PlusPlus) {
                expr = Expr::Unary {
                    op: UnOp::PostInc,
                    operand: Box::new(expr),
                    location,
                };
            } else if self.match_punct(Punct::MinusMinus) {
                expr = Expr::Unary {
                    op: UnOp::PostDec,
                    operand: Box::new(expr),
                    location,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Call arguments; the opening `(` is already consumed. A type name is
    /// accepted in argument position for builtins like `__builtin_va_arg`.
    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.match_punct(Punct::RParen) {
            return Ok(args);
        }

        loop {
            if self.starts_type_name() {
                let location = self.current_location();
                let ty = self.parse_type_name()?;
                args.push(Expr::TypeArg { ty, location });
            } else {
                args.push(self.parse_assignment_expression()?);
            }
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }

        self.expect_rparen("after arguments")?;
        Ok(args)
    }

    /// Parse primary expressions
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(spelling, location) => {
                self.advance();
                self.parse_number(&spelling, location)
            }
            Token::CharLiteral(raw, location) => {
                self.advance();
                Ok(Expr::CharLiteral(decode_char_literal(&raw), location))
            }
            Token::StringLiteral(_, location) => {
                // adjacent literals are concatenated
                let mut value = String::new();
                while let Token::StringLiteral(raw, _) = self.peek() {
                    let part = decode_string_literal(raw);
                    value.push_str(&part);
                    self.advance();
                }
                Ok(Expr::StringLiteral(value, location))
            }
            Token::Ident(name, location) => {
                self.advance();
                Ok(Expr::Ident(name, location))
            }
            Token::Punct(Punct::LParen, location) => {
                self.advance();
                if self.check_punct(Punct::LBrace) {
                    return Err(ParseError {
                        message: "Statement expressions are not supported".to_string(),
                        location,
                    });
                }
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            other => Err(ParseError {
                message: format!("Expected expression, found {}", other),
                location: other.location(),
            }),
        }
    }

    fn parse_number(&self, spelling: &str, location: SourceLocation) -> Result<Expr, ParseError> {
        let lower = spelling.to_ascii_lowercase();
        let invalid = || ParseError {
            message: format!("Invalid numeric literal '{}'", spelling),
            location,
        };

        if let Some(hex) = lower.strip_prefix("0x") {
            if hex.contains('p') {
                return parse_hex_float(hex)
                    .map(|v| Expr::FloatLiteral(v, location))
                    .ok_or_else(invalid);
            }
            let digits = strip_integer_suffix(hex);
            return u64::from_str_radix(digits, 16)
                .map(|v| Expr::IntLiteral(v, location))
                .map_err(|_| invalid());
        }

        if lower.contains('.') || lower.contains('e') {
            return lower
                .trim_end_matches(['f', 'l'])
                .parse::<f64>()
                .map(|v| Expr::FloatLiteral(v, location))
                .map_err(|_| invalid());
        }

        let digits = strip_integer_suffix(&lower);
        let (radix, body) = if let Some(binary) = digits.strip_prefix("0b") {
            (2, binary)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (8, &digits[1..])
        } else {
            (10, digits)
        };
        u64::from_str_radix(body, radix)
            .map(|v| Expr::IntLiteral(v, location))
            .map_err(|_| invalid())
    }

    /// Parse an initializer: an assignment expression or a braced list
    pub(crate) fn parse_initializer(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::initializer)
    }

    fn initializer(&mut self) -> Result<Expr, ParseError> {
        if !self.check_punct(Punct::LBrace) {
            return self.parse_assignment_expression();
        }
        let location = self.current_location();
        self.advance();

        let mut items = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            let item_location = self.current_location();
            let designator = self.parse_designator()?;
            let value = self.parse_initializer()?;
            items.push(match designator {
                Some(designator) => Expr::Designated {
                    designator,
                    value: Box::new(value),
                    location: item_location,
                },
                None => value,
            });
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }

        self.expect_rbrace("after initializer list")?;
        Ok(Expr::InitList { items, location })
    }

    /// `.a.b[2] =` spelled as written, or GNU `name:`
    fn parse_designator(&mut self) -> Result<Option<String>, ParseError> {
        if let Token::Ident(name, _) = self.peek() {
            if self.peek_ahead(1).is_some_and(|t| t.is_punct(Punct::Colon)) {
                let designator = format!(".{}", name);
                self.advance();
                self.advance();
                return Ok(Some(designator));
            }
        }

        let start = self.position;
        loop {
            if self.match_punct(Punct::Dot) {
                self.expect_identifier()?;
            } else if self.match_punct(Punct::LBracket) {
                self.parse_conditional_expression()?;
                if self.match_punct(Punct::Ellipsis) {
                    self.parse_conditional_expression()?;
                }
                self.expect_punct(Punct::RBracket, "Expected ']' after designator")?;
            } else {
                break;
            }
        }
        if self.position == start {
            return Ok(None);
        }
        let designator = join_spelling(&self.tokens[start..self.position]);
        self.expect_punct(Punct::Eq, "Expected '=' after designator")?;
        Ok(Some(designator))
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::{Compilation, DeclKind};
    use crate::config::options::ParserOptions;
    use crate::parser::ast::*;
    use crate::parser::parse_source;

    /// Initializer of the file-scope variable `x`
    fn init_of(source: &str) -> (Compilation, Expr) {
        let c = parse_source(source, &ParserOptions::default());
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let id = c
            .fields
            .iter()
            .copied()
            .find(|id| c.decl(*id).name() == "x")
            .expect("no variable x");
        let DeclKind::Field(field) = &c.decl(id).kind else {
            panic!("Expected field");
        };
        let init = field.init_value.clone().expect("x has no initializer");
        (c, init)
    }

    #[test]
    fn test_precedence() {
        let (_, init) = init_of("int x = 1 + 2 * 3 << 1;");
        let Expr::Binary { op: BinOp::Shl, left, .. } = init else {
            panic!("Expected shift at the root");
        };
        let Expr::Binary { op: BinOp::Add, right, .. } = *left else {
            panic!("Expected addition");
        };
        assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_number_literals() {
        let cases = [
            ("0x1F", 31u64),
            ("017", 15),
            ("0b101", 5),
            ("42ull", 42),
            ("100i64", 100),
            ("0", 0),
        ];
        for (spelling, expected) in cases {
            let (_, init) = init_of(&format!("long long x = {};", spelling));
            assert_eq!(init, Expr::IntLiteral(expected, *init.location()), "{}", spelling);
        }

        let (_, init) = init_of("double x = 0x1.8p1;");
        assert!(matches!(init, Expr::FloatLiteral(v, _) if v == 3.0));
        let (_, init) = init_of("float x = 2.5f;");
        assert!(matches!(init, Expr::FloatLiteral(v, _) if v == 2.5));
    }

    #[test]
    fn test_string_concatenation_and_chars() {
        let (_, init) = init_of("const char *x = \"ab\" \"c\\n\";");
        assert!(matches!(init, Expr::StringLiteral(ref s, _) if s == "abc\n"));
        let (_, init) = init_of("int x = 'A';");
        assert!(matches!(init, Expr::CharLiteral(65, _)));
    }

    #[test]
    fn test_designated_initializer() {
        let (_, init) = init_of(
            "struct P { int a; int b[4]; };\nstruct P x = { .a = 1, .b[2] = 3, { 4 } };",
        );
        let Expr::InitList { items, .. } = init else {
            panic!("Expected init list");
        };
        let designators: Vec<Option<&str>> = items
            .iter()
            .map(|item| match item {
                Expr::Designated { designator, .. } => Some(designator.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(designators, vec![Some(".a"), Some(".b[2]"), None]);
    }

    #[test]
    fn test_casts_and_sizeof() {
        let (c, init) = init_of("typedef unsigned char byte;\nint x = (int)(byte)300 + sizeof(byte) + sizeof x;");
        let kinds: Vec<&str> = {
            let Expr::Binary { left, right, .. } = &init else {
                panic!("Expected binary");
            };
            let Expr::Binary { left: cast, right: sizeof_type, .. } = left.as_ref() else {
                panic!("Expected binary");
            };
            vec![cast.kind_name(), sizeof_type.kind_name(), right.kind_name()]
        };
        assert_eq!(kinds, vec!["cast", "sizeof_type", "sizeof_expr"]);
        assert_eq!(c.typedefs.len(), 1);
    }

    #[test]
    fn test_unexposed_cast() {
        let (c, init) = init_of("void *x = (LPVOID)0;");
        let Expr::Cast { ty, .. } = init else {
            panic!("Expected cast");
        };
        assert_eq!(c.type_name(ty), "LPVOID");
    }

    #[test]
    fn test_postfix_chain() {
        let c = parse_source(
            "struct S { int v[2]; struct S *next; };\nint f(struct S *s) { return s->next->v[1]++ + g(s, 1); }",
            &ParserOptions::default(),
        );
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let f = c.decl(c.functions[0]).as_function().unwrap();
        let Stmt::Return { expr: Some(Expr::Binary { left, right, .. }), .. } = &f.body[0] else {
            panic!("Expected return of a sum");
        };
        assert!(matches!(left.as_ref(), Expr::Unary { op: UnOp::PostInc, .. }));
        let Expr::Call { args, .. } = right.as_ref() else {
            panic!("Expected call");
        };
        assert_eq!(args.len(), 2);
    }
}
