//! LLVM-backed code generation for the axen language.
//!
//! - [`compiler`] — top-level coordinator: module, verification, output
//! - [`types`]    — AST type and class-layout lowering
//! - [`codegen`]  — function, statement and expression lowering

pub mod codegen;
pub mod compiler;
pub mod types;

pub use compiler::Compiler;
