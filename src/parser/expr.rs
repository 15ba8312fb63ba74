//! Pratt-style expression parsing.
//!
//! `=` is not an expression: a single `=` in expression position is
//! reported with a "did you mean '=='" hint. Equality is lexed as two `=`
//! tokens and consumed as a pair here.

use super::Parser;
use crate::ast::ast::{BinaryOp, Expr};
use crate::lexer::lexer::TokenKind;

/// Binding power of a binary operator token, -1 for non-operators.
fn operator_precedence(kind: TokenKind) -> i32 {
    match kind {
        TokenKind::Asterisk | TokenKind::Slash => 20,
        TokenKind::Plus | TokenKind::Minus => 10,
        TokenKind::Less | TokenKind::Greater => 5,
        TokenKind::Equals => 3,
        _ => -1,
    }
}

impl Parser {
    fn token_to_binary_op(&self, kind: TokenKind) -> BinaryOp {
        match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Asterisk => BinaryOp::Multiply,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::Equals => BinaryOp::Equal,
            _ => self.semantic_error("Invalid binary operator"),
        }
    }

    /// Parse an expression up to (but not including) `terminator`.
    pub(crate) fn parse_expression(&mut self, terminator: TokenKind) -> Expr {
        let lhs = self.parse_primary_expression();
        self.parse_binary_op_rhs(0, lhs, terminator)
    }

    fn parse_primary_expression(&mut self) -> Expr {
        match self.lexer.peek().kind {
            TokenKind::IntLit => {
                let token = self.expect(TokenKind::IntLit);
                Expr::IntLiteral {
                    value: self.int_literal_value(&token.text),
                }
            }

            TokenKind::StringLit => Expr::StringLiteral {
                value: self.expect(TokenKind::StringLit).text,
            },

            TokenKind::FloatLit => {
                let token = self.expect(TokenKind::FloatLit);
                let value = token.text.parse::<f32>().unwrap_or_else(|_| {
                    self.syntax_error(format!("Invalid float literal '{}'", token.text))
                });
                Expr::FloatLiteral { value }
            }

            // unary minus applies directly to a literal
            TokenKind::Minus => {
                self.lexer.consume();
                if self.lexer.peek_kind(TokenKind::FloatLit) {
                    let token = self.expect(TokenKind::FloatLit);
                    let value = token.text.parse::<f32>().unwrap_or_else(|_| {
                        self.syntax_error(format!("Invalid float literal '{}'", token.text))
                    });
                    Expr::FloatLiteral { value: -value }
                } else {
                    let token = self.expect(TokenKind::IntLit);
                    let value = self.int_literal_value(&token.text);
                    Expr::IntLiteral {
                        value: 0i32.wrapping_sub(value),
                    }
                }
            }

            TokenKind::Ampersand | TokenKind::Dollar | TokenKind::Identifier => {
                if self.lexer.peek_kind_nth(TokenKind::LParen, 1) {
                    // function call
                    self.parse_detached_call()
                } else {
                    // a bare identifier may name a compile-time constant
                    if self.lexer.peek_kind(TokenKind::Identifier) {
                        if let Some(&value) = self.int_defs.get(&self.lexer.peek().text) {
                            self.lexer.consume();
                            return Expr::IntLiteral { value };
                        }
                    }

                    self.parse_value().0
                }
            }

            TokenKind::LParen => {
                self.expect(TokenKind::LParen);
                let expr = self.parse_expression(TokenKind::RParen);
                self.expect(TokenKind::RParen);
                expr
            }

            _ => self.syntax_error("Unexpected token in expression"),
        }
    }

    fn parse_binary_op_rhs(&mut self, expr_prec: i32, mut lhs: Expr, terminator: TokenKind) -> Expr {
        loop {
            if self.is_expression_terminator(terminator) {
                return lhs;
            }

            let token_kind = self.lexer.peek().kind;

            if token_kind == TokenKind::Equals
                && !self.lexer.peek_kind_nth(TokenKind::Equals, 1)
            {
                self.semantic_error(
                    "Variable assignment is not an expression, did you mean '=='?",
                );
            }

            let token_prec = operator_precedence(token_kind);
            if token_prec < expr_prec {
                return lhs;
            }

            if token_kind == TokenKind::Equals {
                // '==' is two Equals tokens
                self.lexer.consume();
                self.lexer.consume();
            } else {
                self.lexer.consume();
            }

            let mut rhs = self.parse_primary_expression();

            if !self.is_expression_terminator(terminator) {
                let next_kind = self.lexer.peek().kind;
                let next_is_single_equals = next_kind == TokenKind::Equals
                    && !self.lexer.peek_kind_nth(TokenKind::Equals, 1);
                if !next_is_single_equals {
                    let next_prec = operator_precedence(next_kind);
                    if next_prec > token_prec {
                        rhs = self.parse_binary_op_rhs(token_prec + 1, rhs, terminator);
                    }
                }
            }

            // both operands must agree on signedness; the result inherits it
            if lhs.is_signed() != rhs.is_signed() {
                self.semantic_error(
                    "Cannot create binary operation with types of different signedness",
                );
            }

            let signed = lhs.is_signed();
            lhs = Expr::Binary {
                op: self.token_to_binary_op(token_kind),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                signed,
            };
        }
    }

    fn is_expression_terminator(&self, terminator: TokenKind) -> bool {
        let kind = self.lexer.peek().kind;
        if kind == terminator {
            return true;
        }
        // an argument expression also ends at the closing paren
        terminator == TokenKind::Comma && kind == TokenKind::RParen
    }

    /// Parse `name(args…)` for a function called by its source name. Also
    /// used for call *statements*.
    pub(crate) fn parse_detached_call(&mut self) -> Expr {
        let name_token = self.expect(TokenKind::Identifier);
        self.validate_identifier(&name_token.text);
        let name = name_token.text;

        self.expect(TokenKind::LParen);
        let mut args = Vec::new();
        while !self.lexer.peek_kind(TokenKind::RParen) {
            args.push(self.parse_expression(TokenKind::Comma));
            if self.lexer.peek_kind(TokenKind::Comma) {
                self.lexer.consume();
            }
        }
        self.lexer.consume(); // ')'

        let Some(return_type) = self.lookup_function_return_type(&name) else {
            self.semantic_error(format!("Call to undefined function '{name}'"));
        };

        // member methods need an instance even inside their own class
        if !self.current_class.is_empty() && name.contains('_') {
            let prefix = format!("{}_", self.current_class);
            if name.starts_with(&prefix) {
                self.semantic_error(format!(
                    "Cannot call member function '{name}' without an instance of the class"
                ));
            }
        }

        Expr::Call {
            callee: name,
            args,
            ty: return_type,
        }
    }
}
