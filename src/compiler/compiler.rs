//! Top-level coordinator for LLVM code generation.
//!
//! Owns the module and builder for a single compilation unit, walks the
//! parsed program (class layouts first, then functions in declaration
//! order) and hands the finished module to one of the output sinks:
//! textual IR or a native object file.

use std::path::Path;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;

use crate::ast::ast::Program;
use crate::errors::{self, ErrorKind};

use super::codegen::Codegen;

/// Holds LLVM state for a single compilation unit.
pub struct Compiler<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
}

impl<'ctx> Compiler<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        Self {
            context,
            module,
            builder,
        }
    }

    // ── codegen entry point ─────────────────────────────────────

    /// Lower a full [`Program`] to LLVM IR.
    pub fn compile(&self, program: &Program) {
        let mut codegen = Codegen::new(self.context, &self.module, &self.builder);

        for class in &program.classes {
            codegen.lower_class(class);
        }

        for function in &program.functions {
            codegen.lower_function(function);
        }
    }

    /// Run LLVM's module verifier; any inconsistency is fatal.
    pub fn verify(&self) {
        if let Err(message) = self.module.verify() {
            errors::fatal(
                ErrorKind::Internal,
                format!("Module verification failed:\n{}", message.to_string()),
            );
        }
    }

    // ── output sinks ────────────────────────────────────────────

    /// Return the textual LLVM IR of the module.
    pub fn ir_string(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Write a native object file for the host triple (position
    /// independent, CPU "generic").
    pub fn write_object_file(&self, path: &Path) {
        Target::initialize_all(&InitializationConfig::default());

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).unwrap_or_else(|err| {
            errors::fatal(ErrorKind::Internal, format!("Unsupported target triple: {err}"))
        });

        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .unwrap_or_else(|| {
                errors::fatal(ErrorKind::Internal, "Failed to create target machine")
            });

        self.module.set_triple(&triple);
        self.module
            .set_data_layout(&machine.get_target_data().get_data_layout());

        machine
            .write_to_file(&self.module, FileType::Object, path)
            .unwrap_or_else(|err| {
                errors::fatal(
                    ErrorKind::Internal,
                    format!("Failed to write object file: {err}"),
                )
            });
    }
}
