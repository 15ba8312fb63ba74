//! L-value parsing: prefix `$`/`&`, name resolution (locals first, then
//! members through the implicit `this`), and the postfix chain of `.field`,
//! `.method(args)`, `[index]` and interior `$` dereferences.

use std::cell::RefCell;
use std::rc::Rc;

use super::Parser;
use crate::ast::ast::Expr;
use crate::ast::types::{ClassDecl, Type};
use crate::lexer::lexer::TokenKind;

impl Parser {
    /// Parse an addressable expression (or a method call, which ends the
    /// chain). Returns the expression together with the type it denotes.
    pub(crate) fn parse_value(&mut self) -> (Expr, Type) {
        // prefix dereferences
        let mut drefs = 0;
        while self.lexer.peek_kind(TokenKind::Dollar) {
            drefs += 1;
            self.lexer.consume();
        }

        // address-of operator
        let address_of = if self.lexer.peek_kind(TokenKind::Ampersand) {
            self.lexer.consume();
            true
        } else {
            false
        };

        let name_token = self.expect(TokenKind::Identifier);
        self.validate_identifier(&name_token.text);
        let name = name_token.text;

        let (mut target, mut derived) = match self.scopes.lookup(&name) {
            // a local (non-member) variable
            Some(ty) => (
                Expr::VarRef {
                    name: name.clone(),
                    ty: ty.clone(),
                },
                ty,
            ),
            None => self.resolve_implicit_member(&name),
        };

        for _ in 0..drefs {
            (target, derived) = self.apply_dref(target, derived);
        }

        // postfix chain
        loop {
            if self.lexer.peek_kind(TokenKind::Period) {
                self.lexer.consume();

                // auto-dereference one pointer level when '.' is applied to
                // a pointer to a class
                let mut class_decl: Option<Rc<RefCell<ClassDecl>>> = derived.as_class().cloned();
                if class_decl.is_none() {
                    if let Type::Pointer { target: pointee } = &derived {
                        if let Type::Class { decl } = pointee.as_ref() {
                            class_decl = Some(decl.clone());
                            let pointee = (**pointee).clone();
                            target = Expr::Dref {
                                target: Box::new(target),
                                ty: pointee.clone(),
                            };
                            derived = pointee;
                        }
                    }
                }
                let Some(class_decl) = class_decl else {
                    self.semantic_error("Cannot access member of non-struct type");
                };

                // dereferences applied to the accessed member
                let mut member_drefs = 0;
                while self.lexer.peek_kind(TokenKind::Dollar) {
                    member_drefs += 1;
                    self.lexer.consume();
                }

                let field_token = self.expect(TokenKind::Identifier);
                self.validate_identifier(&field_token.text);
                let field_name = field_token.text;

                if self.lexer.peek_kind(TokenKind::LParen) {
                    // member method call; its result is not addressable
                    if address_of {
                        self.semantic_error(
                            "Cannot take the address of a method call result",
                        );
                    }
                    if member_drefs > 0 {
                        self.semantic_error("Cannot dereference a method name");
                    }
                    return self.parse_method_call(target, class_decl, &field_name);
                }

                let field_type = class_decl.borrow().member_type(&field_name);
                let Some(field_type) = field_type else {
                    self.semantic_error(format!(
                        "Struct '{}' has no member '{field_name}'",
                        class_decl.borrow().name()
                    ));
                };

                target = Expr::StructAccess {
                    target: Box::new(target),
                    class: class_decl,
                    member: field_name,
                    ty: field_type.clone(),
                };
                derived = field_type;

                for _ in 0..member_drefs {
                    (target, derived) = self.apply_dref(target, derived);
                }
            } else if self.lexer.peek_kind(TokenKind::LBracket) {
                self.lexer.consume();

                let index = self.parse_expression(TokenKind::RBracket);
                self.expect(TokenKind::RBracket);

                match derived.clone() {
                    Type::Array { element, .. } => {
                        target = Expr::ArrayAccess {
                            target: Box::new(target),
                            index: Box::new(index),
                            array: derived,
                            ty: (*element).clone(),
                        };
                        derived = *element;
                    }
                    Type::Pointer { target: pointee } => {
                        target = Expr::PtrIndexAccess {
                            target: Box::new(target),
                            index: Box::new(index),
                            ty: (*pointee).clone(),
                        };
                        derived = *pointee;
                    }
                    _ => self.semantic_error(
                        "Cannot apply subscript operator to non-array/non-pointer type",
                    ),
                }
            } else {
                break;
            }
        }

        if address_of {
            target = Expr::AddressOf {
                target: Box::new(target),
            };
        }

        (target, derived)
    }

    /// `x.m(args)` — the receiver's address becomes the first argument of
    /// the mangled `Class_m` function.
    fn parse_method_call(
        &mut self,
        receiver: Expr,
        class_decl: Rc<RefCell<ClassDecl>>,
        method: &str,
    ) -> (Expr, Type) {
        let method_name = format!("{}_{method}", class_decl.borrow().name());

        self.lexer.consume(); // '('

        let mut args = vec![Expr::AddressOf {
            target: Box::new(receiver),
        }];

        while !self.lexer.peek_kind(TokenKind::RParen) {
            args.push(self.parse_expression(TokenKind::Comma));
            if self.lexer.peek_kind(TokenKind::Comma) {
                self.lexer.consume();
            }
        }
        self.lexer.consume(); // ')'

        let Some(return_type) = self.lookup_function_return_type(&method_name) else {
            self.semantic_error(format!(
                "Call to undefined member method '{method_name}'"
            ));
        };

        (
            Expr::Call {
                callee: method_name,
                args,
                ty: return_type.clone(),
            },
            return_type,
        )
    }

    /// `$` on a non-pointer is fatal; otherwise peel one pointer level.
    fn apply_dref(&self, target: Expr, derived: Type) -> (Expr, Type) {
        let Type::Pointer { target: pointee } = derived else {
            self.semantic_error("Cannot dereference non-pointer type");
        };
        let pointee = *pointee;
        (
            Expr::Dref {
                target: Box::new(target),
                ty: pointee.clone(),
            },
            pointee,
        )
    }

    /// A bare identifier that is not in scope: if `this` is in scope and
    /// points at a class with a member of that name, rewrite the access as
    /// `(*this).name`; otherwise the variable is undefined.
    fn resolve_implicit_member(&self, name: &str) -> (Expr, Type) {
        if let Some(this_ty) = self.scopes.lookup("this") {
            if let Type::Pointer { target } = &this_ty {
                if let Type::Class { decl } = target.as_ref() {
                    if let Some(field_type) = decl.borrow().member_type(name) {
                        let this_ref = Expr::VarRef {
                            name: "this".to_string(),
                            ty: this_ty.clone(),
                        };
                        let deref_this = Expr::Dref {
                            target: Box::new(this_ref),
                            ty: (**target).clone(),
                        };
                        let access = Expr::StructAccess {
                            target: Box::new(deref_this),
                            class: decl.clone(),
                            member: name.to_string(),
                            ty: field_type.clone(),
                        };
                        return (access, field_type);
                    }
                }
            }
        }

        self.semantic_error(format!("Undefined variable '{name}'"));
    }
}
