//! Recursive-descent parser with integrated type and scope resolution.
//!
//! A single pass over the root file builds the typed AST, registers class
//! and typedef names, tracks lexical scopes, mangles member-function names
//! and inserts the implicit `this` parameter. Imports are processed
//! depth-first before the importer's own declarations, so name resolution
//! always sees imported symbols.

pub mod expr;
pub mod parser;
pub mod stmt;
pub mod types;
pub mod value;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::ast::{Function, Program};
use crate::ast::types::{ClassDecl, Type};
use crate::errors::{self, ErrorKind, SourceLocation};
use crate::lexer::lexer::{Lexer, Token, TokenKind};
use crate::resolver::{ScopeStack, TypeRegistry};

/// Supplies source text for `import` processing. The driver installs a
/// filesystem-backed implementation; tests can serve sources from memory.
pub trait SourceLoader {
    /// Resolve a path to its canonical form. An error means the file does
    /// not exist.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Read the source text behind a (canonical) path.
    fn load(&self, path: &Path) -> io::Result<String>;
}

pub struct Parser {
    lexer: Lexer,
    loader: Box<dyn SourceLoader>,

    current_file: PathBuf,
    current_class: String,

    functions: Vec<Function>,
    classes: Vec<Rc<RefCell<ClassDecl>>>,

    scopes: ScopeStack,
    types: TypeRegistry,
    int_defs: HashMap<String, i32>,
    imported_files: HashSet<PathBuf>,
}

impl Parser {
    /// Create a parser over `source`. `file` may be empty when the source
    /// does not come from disk; it is used to resolve relative imports and
    /// for diagnostics.
    pub fn new(source: &str, file: impl Into<PathBuf>, loader: Box<dyn SourceLoader>) -> Self {
        Self {
            lexer: Lexer::new(source),
            loader,
            current_file: file.into(),
            current_class: String::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            scopes: ScopeStack::new(),
            types: TypeRegistry::new(),
            int_defs: HashMap::new(),
            imported_files: HashSet::new(),
        }
    }

    /// Parse the whole compilation unit, including transitive imports.
    pub fn parse(mut self) -> Program {
        if !self.current_file.as_os_str().is_empty() {
            if let Ok(canonical) = self.loader.canonicalize(&self.current_file) {
                self.imported_files.insert(canonical);
            }
        }

        self.process_imports();
        self.parse_file();

        Program {
            classes: self.classes,
            functions: self.functions,
        }
    }

    // ── diagnostics ─────────────────────────────────────────────────

    fn location(&self) -> SourceLocation {
        let token = self.lexer.peek();
        SourceLocation {
            file: self.current_file.display().to_string(),
            class: self.current_class.clone(),
            row: token.row,
            col: token.col,
            token: token.text.clone(),
        }
    }

    pub(crate) fn syntax_error(&self, message: impl Into<String>) -> ! {
        errors::fatal_at(ErrorKind::Syntax, message, self.location())
    }

    pub(crate) fn semantic_error(&self, message: impl Into<String>) -> ! {
        errors::fatal_at(ErrorKind::Semantic, message, self.location())
    }

    // ── parsing utils ───────────────────────────────────────────────

    /// Consume the next token, asserting its kind.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Token {
        if !self.lexer.peek_kind(kind) {
            self.syntax_error(format!("Expected token: '{kind}'"));
        }
        self.lexer.consume()
    }

    /// Underscores are reserved for name mangling.
    pub(crate) fn validate_identifier(&self, id: &str) {
        if id.contains('_') {
            self.syntax_error(format!(
                "Invalid identifier '{id}': underscores are not allowed in identifiers"
            ));
        }
    }

    /// Decode an integer-literal token: base 16 with a `0x`/`0X` prefix,
    /// base 10 otherwise.
    pub(crate) fn int_literal_value(&self, text: &str) -> i32 {
        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            u32::from_str_radix(hex, 16).map(|v| v as i32)
        } else {
            text.parse::<i32>()
        };
        parsed.unwrap_or_else(|_| {
            self.syntax_error(format!("Integer literal '{text}' is out of range"))
        })
    }

    // ── function table ──────────────────────────────────────────────

    /// Return type of an already-parsed function, looked up by mangled
    /// name. `None` if no such function exists (yet).
    pub(crate) fn lookup_function_return_type(&self, name: &str) -> Option<Type> {
        self.functions
            .iter()
            .find(|func| func.name == name)
            .map(|func| func.return_type.clone())
    }

    /// Register a parsed function. Mangled method names and detached
    /// function names share one namespace; a collision is fatal.
    pub(crate) fn add_function(&mut self, function: Function) {
        if self.functions.iter().any(|f| f.name == function.name) {
            self.semantic_error(format!("Function '{}' is already defined", function.name));
        }
        self.functions.push(function);
    }

    // ── type table ──────────────────────────────────────────────────

    /// `typedef ALIAS TARGET;` — copy the descriptor bound to `TARGET`
    /// under `ALIAS`.
    pub(crate) fn insert_typedef(&mut self, alias: String, target: &str) {
        match self.types.get(target) {
            Some(ty) => self.types.insert(alias, ty),
            None => self.syntax_error(format!("Invalid target type in typedef: '{target}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ast::{Expr, Stmt};
    use crate::ast::types::Primitive;

    /// Loader for sources that must not import anything.
    struct NoImports;

    impl SourceLoader for NoImports {
        fn canonicalize(&self, _path: &Path) -> io::Result<PathBuf> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn load(&self, _path: &Path) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    /// Loader serving sources from an in-memory map.
    struct MapLoader(HashMap<PathBuf, String>);

    impl SourceLoader for MapLoader {
        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            if self.0.contains_key(path) {
                Ok(path.to_path_buf())
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
            }
        }

        fn load(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn parse(source: &str) -> Program {
        Parser::new(source, PathBuf::new(), Box::new(NoImports)).parse()
    }

    #[test]
    fn detached_function_keeps_its_name() {
        let program = parse("int main() { return 0; }");
        assert_eq!(program.functions.len(), 1);
        let main = &program.functions[0];
        assert_eq!(main.name, "main");
        assert!(main.is_detached);
        assert!(main.params.is_empty());
    }

    #[test]
    fn method_is_mangled_and_gets_implicit_this() {
        let program = parse("class Point { int x; int y; int sum() { return x + y; } }");
        let sum = &program.functions[0];
        assert_eq!(sum.name, "Point_sum");
        assert!(!sum.is_detached);

        let (this_name, this_ty) = &sum.params[0];
        assert_eq!(this_name, "this");
        let Type::Pointer { target } = this_ty else {
            panic!("'this' should be a pointer, got {this_ty}");
        };
        let class = target.as_class().expect("'this' should point at a class");
        assert_eq!(class.borrow().name(), "Point");
    }

    #[test]
    fn methods_see_members_declared_after_them() {
        let program = parse("class Acc { int get() { return total; } int total; }");
        assert_eq!(program.functions[0].name, "Acc_get");
        assert_eq!(program.classes[0].borrow().member_index("total"), Some(0));
    }

    #[test]
    fn bare_member_name_becomes_access_through_this() {
        let program = parse("class Cnt { int n; int get() { return n; } }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr) } = &body[0] else {
            panic!("expected a return with a value");
        };
        let Expr::StructAccess { target, member, .. } = expr else {
            panic!("expected member access, got {expr:?}");
        };
        assert_eq!(member, "n");
        assert!(matches!(target.as_ref(), Expr::Dref { .. }));
    }

    #[test]
    fn local_variable_shadows_member() {
        let program = parse("class Cnt { int n; int get() { int n; n = 2; return n; } }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::Assign { target, .. } = &body[1] else {
            panic!("expected an assignment");
        };
        assert!(matches!(target, Expr::VarRef { .. }));
    }

    #[test]
    fn binary_operations_carry_operand_signedness() {
        let program = parse("int f() { return 1 + 2 * 3; }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr) } = &body[0] else {
            panic!("expected a return with a value");
        };
        let Expr::Binary { signed, lhs, rhs, .. } = expr else {
            panic!("expected a binary operation");
        };
        assert!(*signed);
        assert_eq!(lhs.is_signed(), rhs.is_signed());
    }

    #[test]
    fn typedef_copies_the_target_descriptor() {
        let program = parse("typedef word int; word f() { return 0; }");
        let ty = &program.functions[0].return_type;
        assert!(matches!(
            ty,
            Type::Primitive {
                prim: Primitive::Int,
                signed: true,
            }
        ));
    }

    #[test]
    fn intdef_substitutes_a_constant_in_expressions() {
        let program = parse("intdef SIZE 0x10; int f() { return SIZE; }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr) } = &body[0] else {
            panic!("expected a return with a value");
        };
        assert!(matches!(expr, Expr::IntLiteral { value: 16 }));
    }

    #[test]
    fn negated_literals_parse_in_primary_position() {
        let program = parse("int f() { return -7; }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr) } = &body[0] else {
            panic!("expected a return with a value");
        };
        assert!(matches!(expr, Expr::IntLiteral { value: -7 }));
    }

    #[test]
    fn imported_class_is_reopened_in_member_order() {
        let mut files = HashMap::new();
        files.insert(
            PathBuf::from("a.axn"),
            "class C { int a; }".to_string(),
        );
        files.insert(
            PathBuf::from("main.axn"),
            r#"import "a.axn"; class C { int b; } int main() { C c; c.a = 1; c.b = 2; return 0; }"#
                .to_string(),
        );
        let source = files[&PathBuf::from("main.axn")].clone();
        let program = Parser::new(&source, "main.axn", Box::new(MapLoader(files))).parse();

        assert_eq!(program.classes.len(), 1);
        let class = program.classes[0].borrow();
        assert_eq!(class.member_index("a"), Some(0));
        assert_eq!(class.member_index("b"), Some(1));
    }

    #[test]
    fn reimporting_the_same_file_is_idempotent() {
        let mut files = HashMap::new();
        files.insert(PathBuf::from("lib.axn"), "int one() { return 1; }".to_string());
        files.insert(
            PathBuf::from("main.axn"),
            r#"import "lib.axn"; import "lib.axn"; int main() { return one(); }"#.to_string(),
        );
        let source = files[&PathBuf::from("main.axn")].clone();
        let program = Parser::new(&source, "main.axn", Box::new(MapLoader(files))).parse();

        let ones = program.functions.iter().filter(|f| f.name == "one").count();
        assert_eq!(ones, 1);
        assert_eq!(program.functions.len(), 2);
    }

    #[test]
    fn method_call_lowers_to_mangled_call_with_receiver() {
        let program = parse(
            "class Point { int x; int sum() { return x; } }\n\
             int main() { Point p; return p.sum(); }",
        );
        let main = program.functions.iter().find(|f| f.name == "main").unwrap();
        let body = main.body.as_ref().unwrap();
        let Stmt::Return { value: Some(expr) } = &body[1] else {
            panic!("expected a return with a value");
        };
        let Expr::Call { callee, args, .. } = expr else {
            panic!("expected a call, got {expr:?}");
        };
        assert_eq!(callee, "Point_sum");
        assert_eq!(args.len(), 1);
        assert!(matches!(&args[0], Expr::AddressOf { .. }));
    }

    #[test]
    fn bodyless_function_is_an_external_declaration() {
        let program = parse("void log(ptr char msg); void main() { log(\"hi\"); }");
        let log = &program.functions[0];
        assert!(log.body.is_none());
        assert_eq!(log.params.len(), 1);
    }

    #[test]
    fn hex_array_length_parses_as_base_sixteen() {
        let program = parse("int main() { int[0x10] buf; buf[3] = 1; return 0; }");
        let body = program.functions[0].body.as_ref().unwrap();
        let Stmt::VarDecl { ty, .. } = &body[0] else {
            panic!("expected a declaration");
        };
        let Type::Array { length, .. } = ty else {
            panic!("expected an array type, got {ty}");
        };
        assert_eq!(*length, 16);
    }
}
