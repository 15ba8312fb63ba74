//! Top-level grammar: imports, file items, classes and functions.

use std::path::PathBuf;

use std::cell::RefCell;
use std::rc::Rc;

use super::Parser;
use crate::ast::ast::Function;
use crate::ast::types::{ClassDecl, Type};
use crate::errors::{self, ErrorKind};
use crate::lexer::lexer::{Lexer, TokenKind};

impl Parser {
    /// Process the leading `import "path";` sequence. Each import is fully
    /// parsed (including its own transitive imports) before control returns
    /// to the importing file, so later code sees all imported names. The
    /// canonical-path set makes re-imports a no-op.
    pub(crate) fn process_imports(&mut self) {
        while !self.lexer.peek_kind(TokenKind::EndOfFile) {
            if !self.lexer.peek_kind(TokenKind::Import) {
                break;
            }
            self.lexer.consume();

            let import_file = self.expect(TokenKind::StringLit).text;
            self.expect(TokenKind::Semi);

            // imports are resolved relative to the importing file
            let mut import_path = PathBuf::from(&import_file);
            if import_path.is_relative() && !self.current_file.as_os_str().is_empty() {
                if let Some(dir) = self.current_file.parent() {
                    import_path = dir.join(import_path);
                }
            }

            let canonical = match self.loader.canonicalize(&import_path) {
                Ok(path) => path,
                Err(_) => {
                    self.semantic_error(format!(
                        "Cannot import nonexistent file: '{import_file}'"
                    ));
                }
            };

            if !self.imported_files.insert(canonical.clone()) {
                continue;
            }

            let source = match self.loader.load(&canonical) {
                Ok(source) => source,
                Err(err) => self.semantic_error(format!(
                    "Could not read imported file '{}': {err}",
                    canonical.display()
                )),
            };

            let saved_lexer = std::mem::replace(&mut self.lexer, Lexer::new(&source));
            let saved_file = std::mem::replace(&mut self.current_file, canonical);

            self.process_imports();
            self.parse_file();

            self.lexer = saved_lexer;
            self.current_file = saved_file;
        }
    }

    /// Parse every top-level item of the current file.
    pub(crate) fn parse_file(&mut self) {
        while !self.lexer.peek_kind(TokenKind::EndOfFile) {
            match self.lexer.peek().kind {
                // already handled by process_imports; skip over it
                TokenKind::Import => {
                    self.lexer.consume();
                    self.expect(TokenKind::StringLit);
                    self.expect(TokenKind::Semi);
                }
                TokenKind::Typedef => {
                    self.expect(TokenKind::Typedef);
                    let alias = self.expect(TokenKind::Identifier).text;
                    let target = self.expect(TokenKind::Identifier).text;
                    self.insert_typedef(alias, &target);
                    self.expect(TokenKind::Semi);
                }
                TokenKind::Intdef => {
                    self.expect(TokenKind::Intdef);
                    let alias = self.expect(TokenKind::Identifier).text;
                    let literal = self.expect(TokenKind::IntLit).text;
                    let value = self.int_literal_value(&literal);
                    self.int_defs.insert(alias, value);
                    self.expect(TokenKind::Semi);
                }
                TokenKind::Class => {
                    self.lexer.consume();
                    let name_token = self.expect(TokenKind::Identifier);
                    self.validate_identifier(&name_token.text);
                    self.current_class = name_token.text;
                    self.expect(TokenKind::LBrace);
                    self.parse_class();
                    self.expect(TokenKind::RBrace);
                    self.current_class.clear();
                }
                // detached function (top-level function outside any class)
                _ => {
                    let function = self.parse_function();
                    self.add_function(function);
                }
            }
        }
    }

    /// Parse a class body in two passes so methods can reference members
    /// declared after them. The first pass collects members and skips
    /// function bodies; the class is then registered (or merged into an
    /// existing declaration when it is being re-opened); the lexer rewinds
    /// and the second pass parses only the functions.
    pub(crate) fn parse_class(&mut self) {
        let saved_state = self.lexer.save_state();

        let mut members: Vec<(String, Type)> = Vec::new();

        // first pass: member variables
        while !self.lexer.peek_kind(TokenKind::EndOfFile) && !self.lexer.peek_kind(TokenKind::RBrace)
        {
            let Some(ty) = self.parse_type() else {
                self.syntax_error(format!("Unknown type name '{}'", self.lexer.peek().text));
            };
            let name_token = self.expect(TokenKind::Identifier);
            self.validate_identifier(&name_token.text);

            if !self.lexer.peek_kind(TokenKind::LParen) {
                self.expect(TokenKind::Semi);
                match members.iter().position(|(name, _)| *name == name_token.text) {
                    Some(index) => members[index].1 = ty,
                    None => members.push((name_token.text, ty)),
                }
                continue;
            }

            // skip a function: the type and name have already been consumed
            self.expect(TokenKind::LParen);
            while !self.lexer.peek_kind(TokenKind::RParen) {
                if !self.lexer.peek_kind(TokenKind::Comma) {
                    if self.parse_type().is_none() {
                        self.syntax_error(format!(
                            "Unknown type name '{}'",
                            self.lexer.peek().text
                        ));
                    }
                    let param_token = self.expect(TokenKind::Identifier);
                    self.validate_identifier(&param_token.text);
                }
                if self.lexer.peek_kind(TokenKind::Comma) {
                    self.lexer.consume();
                }
            }
            self.expect(TokenKind::RParen);

            if self.lexer.peek_kind(TokenKind::LBrace) {
                self.lexer.consume();
                let mut brace_depth = 1;
                while brace_depth > 0 && !self.lexer.peek_kind(TokenKind::EndOfFile) {
                    match self.lexer.peek().kind {
                        TokenKind::LBrace => brace_depth += 1,
                        TokenKind::RBrace => brace_depth -= 1,
                        _ => {}
                    }
                    self.lexer.consume();
                }
            } else {
                self.expect(TokenKind::Semi);
            }
        }

        // register the struct (or merge into a re-opened one) so the second
        // pass can resolve `this` and sibling members
        match self.types.get(&self.current_class) {
            Some(Type::Class { decl }) => decl.borrow_mut().merge_members(members),
            Some(_) => self.semantic_error(format!(
                "Type '{}' is already defined and is not a class",
                self.current_class
            )),
            None => {
                let decl = Rc::new(RefCell::new(ClassDecl::new(
                    self.current_class.clone(),
                    members,
                )));
                self.classes.push(decl.clone());
                self.types
                    .insert(self.current_class.clone(), Type::Class { decl });
            }
        }

        // second pass: functions
        self.lexer.restore_state(saved_state);
        self.parse_class_functions();
    }

    /// Second pass over a class body: parse the functions, skip over the
    /// member declarations collected by the first pass.
    fn parse_class_functions(&mut self) {
        while !self.lexer.peek_kind(TokenKind::EndOfFile) && !self.lexer.peek_kind(TokenKind::RBrace)
        {
            if self
                .lexer
                .peek_kind_nth(TokenKind::LParen, self.next_type_length() + 1)
            {
                let function = self.parse_function();
                self.add_function(function);
                continue;
            }

            // must be a class data member, skip it
            if self.parse_type().is_none() {
                self.syntax_error(format!("Unknown type name '{}'", self.lexer.peek().text));
            }
            self.expect(TokenKind::Identifier);
            self.expect(TokenKind::Semi);
        }
    }

    /// Parse a function header and (optional) body. Inside a class the name
    /// is mangled to `Class_name` and an implicit `this: ptr Class`
    /// parameter is prepended; a `;` instead of a body declares an external
    /// function.
    pub(crate) fn parse_function(&mut self) -> Function {
        let is_detached = self.current_class.is_empty();

        let Some(return_type) = self.parse_type() else {
            self.syntax_error(format!("Unknown type name '{}'", self.lexer.peek().text));
        };

        let name_token = self.expect(TokenKind::Identifier);
        self.validate_identifier(&name_token.text);
        let name = if is_detached {
            name_token.text
        } else {
            format!("{}_{}", self.current_class, name_token.text)
        };

        self.expect(TokenKind::LParen);

        let mut params: Vec<(String, Type)> = Vec::new();

        if !is_detached {
            let Some(class_ty) = self.types.get(&self.current_class) else {
                errors::fatal(
                    ErrorKind::Internal,
                    format!("Class '{}' is missing from the type table", self.current_class),
                );
            };
            params.push((
                "this".to_string(),
                Type::Pointer {
                    target: Box::new(class_ty),
                },
            ));
        }

        while !self.lexer.peek_kind(TokenKind::RParen) {
            let Some(param_type) = self.parse_type() else {
                self.syntax_error(format!("Unknown type name '{}'", self.lexer.peek().text));
            };
            let param_token = self.expect(TokenKind::Identifier);
            self.validate_identifier(&param_token.text);

            if params.iter().any(|(existing, _)| *existing == param_token.text) {
                self.semantic_error(format!("Duplicate parameter name '{}'", param_token.text));
            }
            params.push((param_token.text, param_type));

            if self.lexer.peek_kind(TokenKind::Comma) {
                self.lexer.consume();
            }
        }
        self.expect(TokenKind::RParen);

        // the function may be bodyless; only parse a body if one exists
        let body = if self.lexer.peek_kind(TokenKind::LBrace) {
            self.lexer.consume();

            self.scopes.push();
            for (param_name, param_type) in &params {
                self.scopes.declare(param_name.clone(), param_type.clone());
            }

            let mut statements = Vec::new();
            while !self.lexer.peek_kind(TokenKind::RBrace) {
                statements.push(self.parse_statement());
            }
            self.expect(TokenKind::RBrace);

            self.scopes.pop();
            Some(statements)
        } else {
            self.expect(TokenKind::Semi);
            None
        };

        Function {
            name,
            return_type,
            params,
            body,
            is_public: true,
            is_detached,
        }
    }
}
