//! End-to-end tests: parse axen source, lower it to LLVM IR, verify the
//! module and assert on the printed IR.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use inkwell::context::Context;

use axenc::compiler::Compiler;
use axenc::parser::{Parser, SourceLoader};

/// Loader for single-file programs.
struct NoImports;

impl SourceLoader for NoImports {
    fn canonicalize(&self, _path: &Path) -> io::Result<PathBuf> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn load(&self, _path: &Path) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

/// Loader serving imports from an in-memory map.
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

fn compile(source: &str) -> String {
    let program = Parser::new(source, PathBuf::new(), Box::new(NoImports)).parse();
    let context = Context::create();
    let compiler = Compiler::new(&context, "test");
    compiler.compile(&program);
    compiler.verify();
    compiler.ir_string()
}

fn compile_files(root: &str, files: &[(&str, &str)]) -> String {
    let map: HashMap<PathBuf, String> = files
        .iter()
        .map(|(name, source)| (PathBuf::from(name), source.to_string()))
        .collect();
    let source = map[&PathBuf::from(root)].clone();
    let program = Parser::new(&source, root, Box::new(MapLoader(map))).parse();
    let context = Context::create();
    let compiler = Compiler::new(&context, "test");
    compiler.compile(&program);
    compiler.verify();
    compiler.ir_string()
}

#[test]
fn empty_void_function_returns_void() {
    let ir = compile("void main() {}");
    assert!(ir.contains("define void @main()"), "IR was:\n{ir}");
    assert!(ir.contains("ret void"), "IR was:\n{ir}");
}

#[test]
fn narrow_operand_is_sign_extended_before_add() {
    let ir = compile("int add(char a, int b) { int r = b + a; return r; }");
    assert!(ir.contains("sext i8"), "IR was:\n{ir}");
    assert!(ir.contains("add i32"), "IR was:\n{ir}");
    assert!(ir.contains("define i32 @add(i8 %a, i32 %b)"), "IR was:\n{ir}");
}

#[test]
fn int_initializer_reaches_long_via_sign_extension() {
    let ir = compile("long widen(int v) { long x = v; return x; }");
    assert!(ir.contains("sext i32"), "IR was:\n{ir}");
    assert!(ir.contains("ret i64"), "IR was:\n{ir}");
}

#[test]
fn class_methods_are_mangled_and_take_this() {
    let ir = compile(
        "class Point { int x; int y;\n\
           int sum() { return x + y; } }\n\
         int main() { Point p; p.x = 3; p.y = 4; return p.sum(); }",
    );
    assert!(ir.contains("%Point = type { i32, i32 }"), "IR was:\n{ir}");
    assert!(
        ir.contains("define i32 @Point_sum(ptr %this)"),
        "IR was:\n{ir}"
    );
    assert!(ir.contains("call i32 @Point_sum(ptr %p)"), "IR was:\n{ir}");
    // field loads go through struct GEPs
    assert!(ir.contains("getelementptr"), "IR was:\n{ir}");
}

#[test]
fn pointer_subscript_strides_by_element_type() {
    let ir = compile("char get(ptr char s, int i) { return s[i]; }");
    assert!(ir.contains("getelementptr i8, ptr"), "IR was:\n{ir}");
    assert!(ir.contains("load i8"), "IR was:\n{ir}");
}

#[test]
fn comparison_lowers_to_unsigned_predicate_and_branch() {
    let ir = compile("int clamp(int x) { if (x < 0) { return 0; } return x; }");
    assert!(ir.contains("icmp ult i32"), "IR was:\n{ir}");
    assert!(ir.contains("br i1"), "IR was:\n{ir}");
    assert!(ir.contains("ret i32 0"), "IR was:\n{ir}");
}

#[test]
fn if_without_else_branches_straight_to_merge() {
    let ir = compile("int f(int x) { if (x == 1) { return 5; } return 6; }");
    assert!(ir.contains("icmp eq i32"), "IR was:\n{ir}");
    assert!(!ir.contains("else:"), "IR was:\n{ir}");
    assert!(ir.contains("ifcont:"), "IR was:\n{ir}");
}

#[test]
fn while_loop_builds_cond_body_exit_blocks() {
    let ir = compile(
        "int count(int n) {\n\
           int i;\n\
           i = 0;\n\
           while (i < n) { i = i + 1; }\n\
           return i;\n\
         }",
    );
    assert!(ir.contains("br label %cond"), "IR was:\n{ir}");
    assert!(ir.contains("body:"), "IR was:\n{ir}");
    assert!(ir.contains("exit:"), "IR was:\n{ir}");
}

#[test]
fn imported_class_reopens_with_appended_members() {
    let ir = compile_files(
        "main.axn",
        &[
            ("a.axn", "class C { int a; }"),
            (
                "main.axn",
                r#"import "a.axn"; class C { int b; } int main() { C c; c.a = 1; c.b = 2; return 0; }"#,
            ),
        ],
    );
    assert!(ir.contains("%C = type { i32, i32 }"), "IR was:\n{ir}");
    // `b` was appended by the re-open, so it lives at index 1
    assert!(ir.contains("i32 0, i32 1"), "IR was:\n{ir}");
}

#[test]
fn hex_array_length_allocates_sixteen_elements() {
    let ir = compile("int main() { int[0x10] buf; buf[3] = 1; return buf[3]; }");
    assert!(ir.contains("[16 x i32]"), "IR was:\n{ir}");
}

#[test]
fn string_literal_becomes_global_constant() {
    let ir = compile("void log(ptr char msg); void main() { log(\"hi\\n\"); }");
    assert!(ir.contains("declare void @log(ptr)"), "IR was:\n{ir}");
    assert!(ir.contains(r#"c"hi\0A\00""#), "IR was:\n{ir}");
    assert!(ir.contains("call void @log(ptr"), "IR was:\n{ir}");
}

#[test]
fn dereference_loads_through_the_pointer() {
    let ir = compile("int readit(ptr int p) { return $p; }");
    assert!(ir.contains("load ptr"), "IR was:\n{ir}");
    assert!(ir.contains("load i32"), "IR was:\n{ir}");
}

#[test]
fn assignment_through_dereference_stores_to_pointee() {
    let ir = compile("void setit(ptr int p) { $p = 7; }");
    assert!(ir.contains("store i32 7"), "IR was:\n{ir}");
}

#[test]
fn pointer_plus_integer_is_a_gep() {
    let ir = compile("ptr char next(ptr char s) { return s + 1; }");
    assert!(ir.contains("getelementptr ptr, ptr"), "IR was:\n{ir}");
}

#[test]
fn method_call_on_pointer_receiver_auto_dereferences() {
    let ir = compile(
        "class P { int v; int get() { return v; } }\n\
         int peek(ptr P p) { return p.get(); }",
    );
    assert!(ir.contains("call i32 @P_get(ptr"), "IR was:\n{ir}");
}

#[test]
fn intdef_constant_folds_into_expressions() {
    let ir = compile("intdef SIZE 0x10; int f() { return SIZE; }");
    assert!(ir.contains("ret i32 16"), "IR was:\n{ir}");
}

#[test]
fn typedef_alias_lowers_like_its_target() {
    let ir = compile("typedef word int; word f(word w) { return w; }");
    assert!(ir.contains("define i32 @f(i32 %w)"), "IR was:\n{ir}");
}

#[test]
fn parameters_are_spilled_to_mutable_slots() {
    let ir = compile("int id(int x) { x = x + 1; return x; }");
    assert!(ir.contains("alloca i32"), "IR was:\n{ir}");
    assert!(ir.contains("store i32 %x"), "IR was:\n{ir}");
}

#[test]
fn unreachable_while_body_still_verifies() {
    let ir = compile("int f() { while (0 == 1) { int x; x = 1; } return 2; }");
    assert!(ir.contains("ret i32 2"), "IR was:\n{ir}");
}

#[test]
fn code_after_return_is_not_emitted() {
    let ir = compile("int f() { return 1; return 2; }");
    assert!(ir.contains("ret i32 1"), "IR was:\n{ir}");
    assert!(!ir.contains("ret i32 2"), "IR was:\n{ir}");
}

#[test]
fn member_method_sees_sibling_members_declared_later() {
    let ir = compile(
        "class Acc {\n\
           int get() { return total; }\n\
           int total;\n\
         }\n\
         int main() { Acc a; a.total = 9; return a.get(); }",
    );
    assert!(ir.contains("define i32 @Acc_get(ptr %this)"), "IR was:\n{ir}");
    assert!(ir.contains("call i32 @Acc_get(ptr %a)"), "IR was:\n{ir}");
}
