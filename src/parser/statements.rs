//! Statement parsing implementation
//!
//! This module handles parsing of all C statement types:
//!
//! - Block scope declarations: `int x = 42, *p;`
//! - Control flow: `if`, `while`, `for`, `do-while`, `switch`
//! - Jump statements: `return`, `break`, `continue`, `goto`
//! - Compound statements and labels
//! - Expression statements: function calls, assignments
//!
//! # Grammar
//!
//! ```text
//! block_item ::= declaration | statement
//! statement  ::= if_stmt | while_stmt | for_stmt | do_while_stmt
//!              | switch_stmt | return_stmt | break_stmt | continue_stmt
//!              | goto_stmt | label ":" | block | expr_stmt | ";"
//! ```
//!
//! A syntax error inside a block is reported and the parser resumes at the
//! next statement, so one bad line does not lose the rest of the function.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{Keyword, Punct, Token};
use crate::parser::parse::{ParseError, Parser};

impl Parser<'_> {
    /// Parse block items up to (not including) the closing `}`
    pub(crate) fn parse_block_statements(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.parse_block_item() {
                Ok(items) => statements.extend(items),
                Err(e) => {
                    self.report(e);
                    self.recover_statement();
                }
            }
        }

        statements
    }

    /// Skip to the end of a broken statement without consuming the `}`
    /// that closes the enclosing block
    fn recover_statement(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek() {
                Token::Punct(Punct::RBrace, _) if depth == 0 => return,
                Token::Punct(Punct::Semicolon, _) if depth == 0 => {
                    self.advance();
                    return;
                }
                Token::Punct(Punct::LBrace, _) => depth += 1,
                Token::Punct(Punct::RBrace, _) => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// A declaration (zero or more variables) or a single statement
    pub(crate) fn parse_block_item(&mut self) -> Result<Vec<Stmt>, ParseError> {
        while self.match_keyword(Keyword::Extension) {}
        if self.is_static_assert() {
            self.skip_static_assert()?;
            return Ok(Vec::new());
        }
        if self.starts_declaration() {
            return self.parse_local_declaration();
        }
        Ok(vec![self.parse_statement()?])
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();

        if let Token::Keyword(keyword, _) = self.peek() {
            let keyword = *keyword;
            match keyword {
                Keyword::Return => {
                    self.advance();
                    return self.parse_return_statement();
                }
                Keyword::If => {
                    self.advance();
                    return self.parse_if_statement();
                }
                Keyword::While => {
                    self.advance();
                    return self.parse_while_statement();
                }
                Keyword::Do => {
                    self.advance();
                    return self.parse_do_while_statement();
                }
                Keyword::For => {
                    self.advance();
                    return self.parse_for_statement();
                }
                Keyword::Switch => {
                    self.advance();
                    return self.parse_switch_statement();
                }
                Keyword::Case | Keyword::Default => {
                    // a label outside the switch's own block, e.g. inside a nested block
                    let (value, location) = self.parse_case_label()?;
                    let statement = self.parse_statement()?;
                    return Ok(Stmt::Case {
                        value,
                        statements: vec![statement],
                        location,
                    });
                }
                Keyword::Break => {
                    self.advance();
                    self.expect_semicolon("after 'break'")?;
                    return Ok(Stmt::Break { location: loc });
                }
                Keyword::Continue => {
                    self.advance();
                    self.expect_semicolon("after 'continue'")?;
                    return Ok(Stmt::Continue { location: loc });
                }
                Keyword::Goto => {
                    self.advance();
                    let label = self.expect_identifier()?;
                    self.expect_semicolon("after 'goto'")?;
                    return Ok(Stmt::Goto {
                        label,
                        location: loc,
                    });
                }
                Keyword::Asm => {
                    self.advance();
                    return self.skip_asm_statement(loc);
                }
                _ => {}
            }
        }

        if self.match_punct(Punct::Semicolon) {
            return Ok(Stmt::Empty { location: loc });
        }

        if self.match_punct(Punct::LBrace) {
            self.push_scope();
            let statements = self.parse_block_statements();
            self.pop_scope();
            self.expect_rbrace("after block")?;
            return Ok(Stmt::Block {
                statements,
                location: loc,
            });
        }

        // Check for label: identifier followed by colon
        if let Token::Ident(_, _) = self.peek() {
            if self.peek_ahead(1).is_some_and(|t| t.is_punct(Punct::Colon)) {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon, "Expected ':' after label")?;
                return Ok(Stmt::Label {
                    name,
                    location: loc,
                });
            }
        }

        // Otherwise, it's an expression statement
        let expr = self.parse_expression()?;
        self.expect_semicolon("after expression")?;
        Ok(Stmt::Expr {
            expr,
            location: loc,
        })
    }

    /// `asm volatile ("..." : ...);` and MSVC `__asm { ... }` are skipped
    fn skip_asm_statement(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        if self.check_punct(Punct::LBrace) {
            self.skip_balanced(Punct::LBrace, Punct::RBrace)?;
            self.match_punct(Punct::Semicolon);
            return Ok(Stmt::Empty { location });
        }
        while self.match_keyword(Keyword::Volatile)
            || self.match_keyword(Keyword::Inline)
            || self.match_keyword(Keyword::Goto)
        {}
        self.skip_parenthesized()?;
        self.expect_semicolon("after asm statement")?;
        Ok(Stmt::Empty { location })
    }

    /// Parse return statement
    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        let expr = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect_semicolon("after return")?;

        Ok(Stmt::Return {
            expr,
            location: loc,
        })
    }

    /// Parse if statement
    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    /// Parse while statement
    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after while condition")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            condition,
            body,
            location: loc,
        })
    }

    /// Parse do-while statement
    fn parse_do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        let body = Box::new(self.parse_statement()?);

        if !self.match_keyword(Keyword::While) {
            return Err(ParseError {
                message: format!("Expected 'while' after do body, found {}", self.peek()),
                location: self.current_location(),
            });
        }
        self.expect_lparen("after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_rparen("after do-while condition")?;
        self.expect_semicolon("after do-while")?;

        Ok(Stmt::DoWhile {
            body,
            condition,
            location: loc,
        })
    }

    /// Parse for statement; a declaration in the init clause is scoped to the loop
    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.push_scope();
        let result = self.parse_for_clauses();
        self.pop_scope();
        result
    }

    fn parse_for_clauses(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'for'")?;

        // Init (optional)
        let init = if self.match_punct(Punct::Semicolon) {
            None
        } else if self.starts_declaration() {
            // Declaration includes semicolon, so don't expect another
            let init_loc = self.current_location();
            let mut decls = self.parse_local_declaration()?;
            match decls.len() {
                0 => None,
                1 => decls.pop().map(Box::new),
                _ => Some(Box::new(Stmt::Block {
                    statements: decls,
                    location: init_loc,
                })),
            }
        } else {
            let init_loc = self.current_location();
            let expr = self.parse_expression()?;
            self.expect_semicolon("after for init")?;
            Some(Box::new(Stmt::Expr {
                expr,
                location: init_loc,
            }))
        };

        // Condition (optional)
        let condition = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after for condition")?;

        // Increment (optional)
        let increment = if self.check_punct(Punct::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            condition,
            increment,
            body,
            location: loc,
        })
    }

    /// `case value:`, `case lo ... hi:` or `default:`; the value is `None` for `default`
    fn parse_case_label(&mut self) -> Result<(Option<Expr>, SourceLocation), ParseError> {
        let location = self.current_location();
        let value = if self.match_keyword(Keyword::Case) {
            let value = self.parse_conditional_expression()?;
            if self.match_punct(Punct::Ellipsis) {
                // GNU case range; the low bound stands for the group
                self.parse_conditional_expression()?;
            }
            self.expect_punct(Punct::Colon, "Expected ':' after case value")?;
            Some(value)
        } else if self.match_keyword(Keyword::Default) {
            self.expect_punct(Punct::Colon, "Expected ':' after 'default'")?;
            None
        } else {
            return Err(ParseError {
                message: format!("Expected 'case' or 'default', found {}", self.peek()),
                location,
            });
        };
        Ok((value, location))
    }

    /// Parse switch statement; the body is grouped into one `Case` per label
    fn parse_switch_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'switch'")?;
        let expr = self.parse_expression()?;
        self.expect_rparen("after switch expression")?;

        if !self.match_punct(Punct::LBrace) {
            let body = self.parse_statement()?;
            return Ok(Stmt::Switch {
                expr,
                cases: vec![body],
                location: loc,
            });
        }

        self.push_scope();
        let mut cases: Vec<Stmt> = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.check_keyword(Keyword::Case) || self.check_keyword(Keyword::Default) {
                match self.parse_case_label() {
                    Ok((value, location)) => cases.push(Stmt::Case {
                        value,
                        statements: Vec::new(),
                        location,
                    }),
                    Err(e) => {
                        self.report(e);
                        self.recover_statement();
                    }
                }
                continue;
            }
            match self.parse_block_item() {
                Ok(items) => match cases.last_mut() {
                    Some(Stmt::Case { statements, .. }) => statements.extend(items),
                    // statements before the first label
                    _ => cases.extend(items),
                },
                Err(e) => {
                    self.report(e);
                    self.recover_statement();
                }
            }
        }
        self.pop_scope();

        self.expect_rbrace("after switch body")?;

        Ok(Stmt::Switch {
            expr,
            cases,
            location: loc,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::Compilation;
    use crate::config::options::ParserOptions;
    use crate::parser::ast::*;
    use crate::parser::parse_source;

    fn body(source: &str) -> (Compilation, Vec<Stmt>) {
        let c = parse_source(source, &ParserOptions::default());
        let body = c
            .decl(c.functions[0])
            .as_function()
            .map(|f| f.body.clone())
            .unwrap_or_default();
        (c, body)
    }

    #[test]
    fn test_control_flow_kinds() {
        let (c, stmts) = body(
            "void f(int n) {\n\
                 int i, total = 0;\n\
                 for (i = 0; i < n; i++) total += i;\n\
                 while (total > 10) total--;\n\
                 do { total++; } while (total < 5);\n\
                 if (total) return; else goto done;\n\
             done:\n\
                 ;\n\
             }",
        );
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let kinds: Vec<&str> = stmts.iter().map(|s| s.kind_name()).collect();
        assert_eq!(
            kinds,
            vec!["var_decl", "var_decl", "for", "while", "do_while", "if", "label", "empty"]
        );
    }

    #[test]
    fn test_switch_groups_cases() {
        let (c, stmts) = body(
            "int f(int x) {\n\
                 switch (x) {\n\
                 case 1:\n\
                 case 2: x = 3; break;\n\
                 default: return 0;\n\
                 }\n\
                 return x;\n\
             }",
        );
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let Stmt::Switch { cases, .. } = &stmts[0] else {
            panic!("Expected switch, got {:?}", stmts[0]);
        };
        let shape: Vec<(&str, usize)> = cases
            .iter()
            .map(|case| match case {
                Stmt::Case { statements, .. } => (case.kind_name(), statements.len()),
                other => panic!("Expected case, got {:?}", other),
            })
            .collect();
        assert_eq!(shape, vec![("case", 0), ("case", 2), ("default", 1)]);
    }

    #[test]
    fn test_for_declaration_init() {
        let (c, stmts) = body("void f(void) { for (int i = 0, j = 1; i < j; i++) {} }");
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let Stmt::For { init: Some(init), .. } = &stmts[0] else {
            panic!("Expected for with init");
        };
        let Stmt::Block { statements, .. } = init.as_ref() else {
            panic!("Expected grouped declarations");
        };
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_bad_statement_is_recovered() {
        let (c, stmts) = body("int f(void) { int a = ; a = 1; return a; }");
        assert_eq!(c.diagnostics.error_count(), 1);
        let kinds: Vec<&str> = stmts.iter().map(|s| s.kind_name()).collect();
        assert_eq!(kinds, vec!["expression", "return"]);
    }

    #[test]
    fn test_local_typedef_and_struct() {
        let (c, stmts) = body(
            "void f(void) {\n\
                 typedef unsigned int u32;\n\
                 struct P { u32 x; } p;\n\
                 u32 y = sizeof(p);\n\
             }",
        );
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        assert_eq!(stmts.len(), 2);
        // block scope declarations stay out of the top-level lists
        assert!(c.typedefs.is_empty());
        assert!(c.classes.is_empty());
    }
}
