//! Statement parsing.
//!
//! Statement forms:
//!   return EXPR? ;
//!   if ( EXPR ) { STMT* } (else { STMT* })?
//!   while ( EXPR ) { STMT* }
//!   TYPE NAME (= EXPR)? ;          variable declaration
//!   NAME ( ARGS ) ;                detached function call
//!   LVALUE = EXPR ;                assignment
//!   LVALUE-CHAIN-ENDING-IN-CALL ;  method call statement

use super::Parser;
use crate::ast::ast::Stmt;
use crate::lexer::lexer::TokenKind;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Stmt {
        match self.lexer.peek().kind {
            TokenKind::Return => {
                self.lexer.consume();

                if self.lexer.peek_kind(TokenKind::Semi) {
                    self.lexer.consume();
                    return Stmt::Return { value: None };
                }

                let value = self.parse_expression(TokenKind::Semi);
                self.expect(TokenKind::Semi);
                Stmt::Return { value: Some(value) }
            }
            TokenKind::If => {
                self.lexer.consume();

                self.expect(TokenKind::LParen);
                let cond = self.parse_expression(TokenKind::RParen);
                self.expect(TokenKind::RParen);

                self.expect(TokenKind::LBrace);
                let mut then_body = Vec::new();
                while !self.lexer.peek_kind(TokenKind::RBrace) {
                    then_body.push(self.parse_statement());
                }
                self.expect(TokenKind::RBrace);

                let else_body = if self.lexer.peek_kind(TokenKind::Else) {
                    self.lexer.consume();
                    self.expect(TokenKind::LBrace);
                    let mut statements = Vec::new();
                    while !self.lexer.peek_kind(TokenKind::RBrace) {
                        statements.push(self.parse_statement());
                    }
                    self.expect(TokenKind::RBrace);
                    Some(statements)
                } else {
                    None
                };

                Stmt::If {
                    cond,
                    then_body,
                    else_body,
                }
            }
            TokenKind::While => {
                self.lexer.consume();

                self.expect(TokenKind::LParen);
                let cond = self.parse_expression(TokenKind::RParen);
                self.expect(TokenKind::RParen);

                self.expect(TokenKind::LBrace);
                let mut body = Vec::new();
                while !self.lexer.peek_kind(TokenKind::RBrace) {
                    body.push(self.parse_statement());
                }
                self.expect(TokenKind::RBrace);

                Stmt::While { cond, body }
            }
            _ => self.parse_simple_statement(),
        }
    }

    /// Declarations, assignments and call statements — everything that is
    /// dispatched by trying to parse a leading type first.
    fn parse_simple_statement(&mut self) -> Stmt {
        if let Some(ty) = self.parse_type() {
            // variable declaration with optional initializer
            let name_token = self.expect(TokenKind::Identifier);
            self.validate_identifier(&name_token.text);
            let name = name_token.text;

            let init = if self.lexer.peek_kind(TokenKind::Equals) {
                self.lexer.consume();
                Some(self.parse_expression(TokenKind::Semi))
            } else {
                None
            };

            self.expect(TokenKind::Semi);

            if self.scopes.exists_in_current(&name) {
                self.semantic_error(format!(
                    "Variable '{name}' is already declared in this scope"
                ));
            }
            self.scopes.declare(name.clone(), ty.clone());

            return Stmt::VarDecl { ty, name, init };
        }

        // detached function call statement
        if self.lexer.peek_kind(TokenKind::Identifier)
            && self.lexer.peek_kind_nth(TokenKind::LParen, 1)
        {
            let call = self.parse_detached_call();
            self.expect(TokenKind::Semi);
            return Stmt::Expr { expr: call };
        }

        // otherwise an l-value chain: either a method call statement or the
        // target of an assignment
        let (target, _derived) = self.parse_value();

        if target.is_call() {
            self.expect(TokenKind::Semi);
            return Stmt::Expr { expr: target };
        }

        self.expect(TokenKind::Equals);
        let value = self.parse_expression(TokenKind::Semi);
        self.expect(TokenKind::Semi);

        Stmt::Assign { target, value }
    }
}
