//! Type parsing: `ptr`* IDENT (`[` INT `]`)?

use super::Parser;
use crate::ast::types::Type;
use crate::lexer::lexer::TokenKind;

impl Parser {
    /// Consume a type (with all modifiers). Returns `None` without
    /// consuming anything when the upcoming tokens do not name a registered
    /// type; a `ptr` prefix in front of an unknown name is fatal.
    ///
    /// Pointer wrapping applies first, then the array wraps the whole:
    /// `ptr int[4]` is an array of four pointers to int.
    pub(crate) fn parse_type(&mut self) -> Option<Type> {
        let mut ptrs = 0;
        while self.lexer.peek_kind(TokenKind::Ptr) {
            ptrs += 1;
            self.lexer.consume();
        }

        let Some(mut ty) = self.types.get(&self.lexer.peek().text) else {
            if ptrs > 0 {
                self.syntax_error(format!("Unknown type name '{}'", self.lexer.peek().text));
            }
            return None;
        };
        self.lexer.consume();

        // zero means not an array
        let mut array_length: u32 = 0;

        if self.lexer.peek_kind(TokenKind::LBracket) {
            self.lexer.consume();
            let literal = self.expect(TokenKind::IntLit).text;
            let value = self.int_literal_value(&literal);
            if value <= 0 {
                self.semantic_error(format!("Array length must be positive, got {value}"));
            }
            array_length = value as u32;
            self.expect(TokenKind::RBracket);
        }

        for _ in 0..ptrs {
            ty = Type::Pointer {
                target: Box::new(ty),
            };
        }

        if array_length > 0 {
            ty = Type::Array {
                element: Box::new(ty),
                length: array_length,
            };
        }

        Some(ty)
    }

    /// Count the tokens the next type would occupy, without consuming
    /// anything. Used to tell methods from members in a class body.
    pub(crate) fn next_type_length(&self) -> usize {
        let mut i = 0;

        while self.lexer.peek_kind_nth(TokenKind::Ptr, i) {
            i += 1;
        }

        if self.lexer.peek_kind_nth(TokenKind::Identifier, i) {
            i += 1;
        }

        if self.lexer.peek_kind_nth(TokenKind::LBracket, i) {
            i += 1;
            if self.lexer.peek_kind_nth(TokenKind::IntLit, i) {
                i += 1;
            }
            if self.lexer.peek_kind_nth(TokenKind::RBracket, i) {
                i += 1;
            }
        }

        i
    }
}
