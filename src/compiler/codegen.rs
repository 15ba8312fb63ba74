//! Function, statement and expression lowering.
//!
//! Every addressable expression has two lowering paths: the r-value path
//! produces a loaded value, the l-value path produces a pointer to storage
//! together with the stored type. Assignment, address-of and member/array
//! access compose out of the l-value path.

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, StructType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue,
};
use inkwell::{AddressSpace, IntPredicate};

use crate::ast::ast::{BinaryOp, Expr, Function, Stmt};
use crate::errors::{self, ErrorKind};

/// Mutable lowering state: the variable scope stack (name -> stack slot and
/// slot type) and the named-struct table.
pub(crate) struct Codegen<'a, 'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: &'a Module<'ctx>,
    pub(crate) builder: &'a Builder<'ctx>,

    scopes: Vec<HashMap<String, (PointerValue<'ctx>, BasicTypeEnum<'ctx>)>>,
    pub(crate) structs: HashMap<String, StructType<'ctx>>,
}

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    pub(crate) fn new(
        context: &'ctx Context,
        module: &'a Module<'ctx>,
        builder: &'a Builder<'ctx>,
    ) -> Self {
        Self {
            context,
            module,
            builder,
            scopes: Vec::new(),
            structs: HashMap::new(),
        }
    }

    // ── scope handling ──────────────────────────────────────────

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_variable(
        &mut self,
        name: &str,
        slot: PointerValue<'ctx>,
        ty: BasicTypeEnum<'ctx>,
    ) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.to_string(), (slot, ty));
        }
    }

    fn lookup_variable(&self, name: &str) -> Option<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    // ═══════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════

    /// Declare a function and, if it has a body, emit it.
    pub(crate) fn lower_function(&mut self, function: &Function) -> FunctionValue<'ctx> {
        let param_types: Vec<BasicMetadataTypeEnum<'ctx>> = function
            .params
            .iter()
            .map(|(_, ty)| self.basic_type(ty).into())
            .collect();

        let fn_type = if function.return_type.is_void() {
            self.context.void_type().fn_type(&param_types, false)
        } else {
            self.basic_type(&function.return_type)
                .fn_type(&param_types, false)
        };

        let linkage = if function.is_public {
            Linkage::External
        } else {
            Linkage::Internal
        };
        let fn_value = self
            .module
            .add_function(&function.name, fn_type, Some(linkage));

        if let Some(body) = &function.body {
            self.lower_function_body(function, fn_value, body);
        }

        fn_value
    }

    fn lower_function_body(
        &mut self,
        function: &Function,
        fn_value: FunctionValue<'ctx>,
        body: &[Stmt],
    ) {
        let entry = self.context.append_basic_block(fn_value, "entry");
        self.builder.position_at_end(entry);

        self.push_scope();

        // copy parameters to stack slots so they are mutable
        for (i, (param_name, param_type)) in function.params.iter().enumerate() {
            let arg = fn_value
                .get_nth_param(i as u32)
                .unwrap_or_else(|| {
                    errors::fatal(
                        ErrorKind::Internal,
                        format!("Missing parameter {i} in function '{}'", function.name),
                    )
                });
            arg.set_name(param_name);

            let slot_type = self.basic_type(param_type);
            let slot = self
                .builder
                .build_alloca(slot_type, param_name)
                .expect("build alloca");
            self.builder.build_store(slot, arg).expect("build store");

            self.declare_variable(param_name, slot, slot_type);
        }

        self.lower_block(body);

        // implicitly return void if the final block has no terminator
        if self.current_block_unterminated() {
            self.builder.build_return(None).expect("build return");
        }

        self.pop_scope();
    }

    /// Emit a statement sequence, stopping once the insertion block gains a
    /// terminator (nothing may follow a `ret` or `br`).
    fn lower_block(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.lower_statement(statement);
            if !self.current_block_unterminated() {
                break;
            }
        }
    }

    fn current_block_unterminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .is_some_and(|block| block.get_terminator().is_none())
    }

    fn current_function(&self) -> FunctionValue<'ctx> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .unwrap_or_else(|| {
                errors::fatal(ErrorKind::Internal, "No function under construction")
            })
    }

    // ═══════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════

    fn lower_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::VarDecl { ty, name, init } => {
                let slot_type = self.basic_type(ty);
                let slot = self
                    .builder
                    .build_alloca(slot_type, name)
                    .expect("build alloca");

                if let Some(init) = init {
                    let value = self.lower_expression(init);
                    let converted = self.convert_if_needed(value, slot_type, init.is_signed());
                    if converted.get_type() != slot_type {
                        errors::fatal(
                            ErrorKind::Codegen,
                            format!("Cannot initialize variable '{name}' with incompatible type"),
                        );
                    }
                    self.builder.build_store(slot, converted).expect("build store");
                }

                self.declare_variable(name, slot, slot_type);
            }

            Stmt::Assign { target, value } => {
                let (slot, pointee_type) = self.lower_lvalue(target);
                let new_value = self.lower_expression(value);
                let converted = self.convert_if_needed(new_value, pointee_type, value.is_signed());
                self.builder.build_store(slot, converted).expect("build store");
            }

            Stmt::Return { value } => self.lower_return(value.as_ref()),

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => self.lower_if(cond, then_body, else_body.as_deref()),

            Stmt::While { cond, body } => self.lower_while(cond, body),

            Stmt::Expr { expr } => {
                // the value, if any, is discarded
                match expr {
                    Expr::Call { callee, args, .. } => {
                        self.lower_call(callee, args);
                    }
                    _ => {
                        self.lower_expression(expr);
                    }
                }
            }
        }
    }

    fn lower_return(&mut self, value: Option<&Expr>) {
        let return_type = self.current_function().get_type().get_return_type();

        match (value, return_type) {
            (Some(expr), Some(return_type)) => {
                let value = self.lower_expression(expr);
                let converted = self.convert_if_needed(value, return_type, expr.is_signed());
                if converted.get_type() != return_type {
                    errors::fatal(
                        ErrorKind::Codegen,
                        "Return value type does not match function return type",
                    );
                }
                self.builder
                    .build_return(Some(&converted))
                    .expect("build return");
            }
            (Some(_), None) => errors::fatal(
                ErrorKind::Codegen,
                "Return value type does not match function return type",
            ),
            (None, Some(_)) => errors::fatal(
                ErrorKind::Codegen,
                "Non-void function must return a value",
            ),
            (None, None) => {
                self.builder.build_return(None).expect("build return");
            }
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_body: &[Stmt], else_body: Option<&[Stmt]>) {
        let function = self.current_function();

        let then_block = self.context.append_basic_block(function, "then");
        let else_block =
            else_body.map(|_| self.context.append_basic_block(function, "else"));
        let merge_block = self.context.append_basic_block(function, "ifcont");

        let cond_value = self.lower_expression(cond);
        if !cond_value.is_int_value() {
            errors::fatal(ErrorKind::Codegen, "If statement condition must be integer type");
        }

        self.builder
            .build_conditional_branch(
                cond_value.into_int_value(),
                then_block,
                else_block.unwrap_or(merge_block),
            )
            .expect("build conditional branch");

        self.builder.position_at_end(then_block);
        self.lower_block(then_body);
        if self.current_block_unterminated() {
            self.builder
                .build_unconditional_branch(merge_block)
                .expect("build branch");
        }

        if let (Some(else_block), Some(else_body)) = (else_block, else_body) {
            self.builder.position_at_end(else_block);
            self.lower_block(else_body);
            if self.current_block_unterminated() {
                self.builder
                    .build_unconditional_branch(merge_block)
                    .expect("build branch");
            }
        }

        self.builder.position_at_end(merge_block);
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt]) {
        let function = self.current_function();

        let cond_block = self.context.append_basic_block(function, "cond");
        let body_block = self.context.append_basic_block(function, "body");
        let exit_block = self.context.append_basic_block(function, "exit");

        self.builder
            .build_unconditional_branch(cond_block)
            .expect("build branch");

        self.builder.position_at_end(cond_block);
        let cond_value = self.lower_expression(cond);
        if !cond_value.is_int_value() {
            errors::fatal(ErrorKind::Codegen, "While statement condition must be integer type");
        }
        self.builder
            .build_conditional_branch(cond_value.into_int_value(), body_block, exit_block)
            .expect("build conditional branch");

        self.builder.position_at_end(body_block);
        self.lower_block(body);
        if self.current_block_unterminated() {
            self.builder
                .build_unconditional_branch(cond_block)
                .expect("build branch");
        }

        self.builder.position_at_end(exit_block);
    }

    // ═══════════════════════════════════════════════════════════
    // Expressions — r-value path
    // ═══════════════════════════════════════════════════════════

    fn lower_expression(&mut self, expr: &Expr) -> BasicValueEnum<'ctx> {
        match expr {
            // integer literals are 32-bit; widening happens at the use site
            Expr::IntLiteral { value } => self
                .context
                .i32_type()
                .const_int(*value as u64, true)
                .into(),

            Expr::FloatLiteral { value } => self
                .context
                .f32_type()
                .const_float(*value as f64)
                .into(),

            Expr::StringLiteral { value } => self
                .builder
                .build_global_string_ptr(value, "str")
                .expect("build global string")
                .as_pointer_value()
                .into(),

            Expr::VarRef { name, .. } => {
                let (slot, slot_type) = self.lookup_variable(name).unwrap_or_else(|| {
                    errors::fatal(ErrorKind::Codegen, format!("Undefined variable '{name}'"))
                });
                self.builder
                    .build_load(slot_type, slot, name)
                    .expect("build load")
            }

            Expr::Dref { target, ty } => {
                let pointer = self.lower_expression(target);
                if !pointer.is_pointer_value() {
                    errors::fatal(ErrorKind::Codegen, "Cannot dereference non-pointer type");
                }
                let pointee_type = self.basic_type(ty);
                self.builder
                    .build_load(pointee_type, pointer.into_pointer_value(), "deref")
                    .expect("build load")
            }

            Expr::AddressOf { target } => {
                let (pointer, _) = self.lower_lvalue(target);
                pointer.into()
            }

            Expr::StructAccess { member, ty, .. } => {
                let (field_pointer, _) = self.lower_lvalue(expr);
                let field_type = self.basic_type(ty);
                self.builder
                    .build_load(field_type, field_pointer, member)
                    .expect("build load")
            }

            Expr::ArrayAccess { ty, .. } => {
                let (element_pointer, _) = self.lower_lvalue(expr);
                let element_type = self.basic_type(ty);
                self.builder
                    .build_load(element_type, element_pointer, "arrayval")
                    .expect("build load")
            }

            Expr::PtrIndexAccess { ty, .. } => {
                let (element_pointer, _) = self.lower_lvalue(expr);
                let element_type = self.basic_type(ty);
                self.builder
                    .build_load(element_type, element_pointer, "ptrval")
                    .expect("build load")
            }

            Expr::Call { callee, args, .. } => {
                self.lower_call(callee, args).unwrap_or_else(|| {
                    errors::fatal(
                        ErrorKind::Codegen,
                        format!("Void function '{callee}' does not produce a value"),
                    )
                })
            }

            Expr::Binary { op, lhs, rhs, signed } => self.lower_binary(*op, lhs, rhs, *signed),
        }
    }

    /// Lower a call; `None` for void callees.
    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> Option<BasicValueEnum<'ctx>> {
        let callee_fn = self.module.get_function(callee).unwrap_or_else(|| {
            errors::fatal(ErrorKind::Codegen, format!("Unknown function '{callee}'"))
        });

        if callee_fn.count_params() as usize != args.len() {
            errors::fatal(
                ErrorKind::Codegen,
                format!(
                    "Function '{callee}' expects {} arguments, got {}",
                    callee_fn.count_params(),
                    args.len()
                ),
            );
        }

        let arguments: Vec<BasicMetadataValueEnum<'ctx>> = args
            .iter()
            .map(|arg| self.lower_expression(arg).into())
            .collect();

        let name = if callee_fn.get_type().get_return_type().is_none() {
            ""
        } else {
            "calltmp"
        };

        let call = self
            .builder
            .build_call(callee_fn, &arguments, name)
            .expect("build call");

        call.try_as_basic_value().left()
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        signed: bool,
    ) -> BasicValueEnum<'ctx> {
        let left = self.lower_expression(lhs);
        let mut right = self.lower_expression(rhs);

        // operands may differ in width; the right-hand side is brought to
        // the left-hand type
        right = self.convert_if_needed(right, left.get_type(), signed);

        match op {
            BinaryOp::Add => {
                if left.is_pointer_value() {
                    self.pointer_offset(left.into_pointer_value(), right, false)
                } else if right.is_pointer_value() {
                    self.pointer_offset(right.into_pointer_value(), left, false)
                } else {
                    if !left.is_int_value() || !right.is_int_value() {
                        errors::fatal(ErrorKind::Codegen, "Addition requires integer operands");
                    }
                    self.builder
                        .build_int_add(left.into_int_value(), right.into_int_value(), "addtmp")
                        .expect("build add")
                        .into()
                }
            }

            BinaryOp::Subtract => {
                if left.is_pointer_value() {
                    self.pointer_offset(left.into_pointer_value(), right, true)
                } else {
                    if !left.is_int_value() || !right.is_int_value() {
                        errors::fatal(ErrorKind::Codegen, "Subtraction requires integer operands");
                    }
                    self.builder
                        .build_int_sub(left.into_int_value(), right.into_int_value(), "subtmp")
                        .expect("build sub")
                        .into()
                }
            }

            BinaryOp::Multiply => {
                if !left.is_int_value() || !right.is_int_value() {
                    errors::fatal(ErrorKind::Codegen, "Multiplication requires integer operands");
                }
                self.builder
                    .build_int_mul(left.into_int_value(), right.into_int_value(), "multmp")
                    .expect("build mul")
                    .into()
            }

            BinaryOp::Divide => {
                if !left.is_int_value() || !right.is_int_value() {
                    errors::fatal(ErrorKind::Codegen, "Division requires integer operands");
                }
                self.builder
                    .build_int_unsigned_div(
                        left.into_int_value(),
                        right.into_int_value(),
                        "udivtmp",
                    )
                    .expect("build udiv")
                    .into()
            }

            BinaryOp::Less | BinaryOp::Greater | BinaryOp::Equal => {
                if !left.is_int_value() || !right.is_int_value() {
                    errors::fatal(ErrorKind::Codegen, "Comparison requires integer operands");
                }
                let predicate = match op {
                    BinaryOp::Less => IntPredicate::ULT,
                    BinaryOp::Greater => IntPredicate::UGT,
                    _ => IntPredicate::EQ,
                };
                self.builder
                    .build_int_compare(
                        predicate,
                        left.into_int_value(),
                        right.into_int_value(),
                        "cmptmp",
                    )
                    .expect("build compare")
                    .into()
            }
        }
    }

    /// Pointer ± integer arithmetic: a GEP over the opaque pointer type
    /// (pointer-sized stride). Element-sized strides go through indexing.
    fn pointer_offset(
        &mut self,
        pointer: PointerValue<'ctx>,
        offset: BasicValueEnum<'ctx>,
        negate: bool,
    ) -> BasicValueEnum<'ctx> {
        if !offset.is_int_value() {
            let verb = if negate { "subtract" } else { "add" };
            errors::fatal(
                ErrorKind::Codegen,
                format!("Cannot {verb} non-integer and pointer"),
            );
        }

        let mut index = offset.into_int_value();
        if negate {
            index = self
                .builder
                .build_int_neg(index, "negtmp")
                .expect("build neg");
        }

        let pointer_type = self.context.ptr_type(AddressSpace::default());
        unsafe {
            self.builder
                .build_gep(pointer_type, pointer, &[index], "ptroff")
                .expect("build gep")
                .into()
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Expressions — l-value path
    // ═══════════════════════════════════════════════════════════

    /// Lower an addressable expression to a pointer to its storage plus the
    /// stored type (the type an assignment must convert to).
    fn lower_lvalue(&mut self, expr: &Expr) -> (PointerValue<'ctx>, BasicTypeEnum<'ctx>) {
        match expr {
            // a variable's l-value is its stack slot
            Expr::VarRef { name, .. } => self.lookup_variable(name).unwrap_or_else(|| {
                errors::fatal(ErrorKind::Codegen, format!("Undefined variable '{name}'"))
            }),

            // the pointer value itself is the storage address
            Expr::Dref { target, ty } => {
                let pointer = self.lower_expression(target);
                if !pointer.is_pointer_value() {
                    errors::fatal(ErrorKind::Codegen, "Cannot dereference non-pointer type");
                }
                (pointer.into_pointer_value(), self.basic_type(ty))
            }

            Expr::StructAccess {
                target,
                class,
                member,
                ty,
            } => {
                let (struct_pointer, _) = self.lower_lvalue(target);
                let struct_type = self.lower_class(class);

                let index = class.borrow().member_index(member).unwrap_or_else(|| {
                    errors::fatal(
                        ErrorKind::Internal,
                        format!(
                            "Could not find index of member '{member}' in struct '{}'",
                            class.borrow().name()
                        ),
                    )
                });

                let field_pointer = self
                    .builder
                    .build_struct_gep(struct_type, struct_pointer, index as u32, member)
                    .expect("build struct gep");
                (field_pointer, self.basic_type(ty))
            }

            Expr::ArrayAccess {
                target,
                index,
                array,
                ty,
            } => {
                let (array_pointer, _) = self.lower_lvalue(target);

                let index_value = self.lower_expression(index);
                if !index_value.is_int_value() {
                    errors::fatal(ErrorKind::Codegen, "Array index must be an integer type");
                }

                let array_type = self.basic_type(array);
                let zero = self.context.i32_type().const_int(0, false);
                let element_pointer = unsafe {
                    self.builder
                        .build_gep(
                            array_type,
                            array_pointer,
                            &[zero, index_value.into_int_value()],
                            "arrayidx",
                        )
                        .expect("build gep")
                };
                (element_pointer, self.basic_type(ty))
            }

            // the pointer *value* is the base; it is read, not its slot
            Expr::PtrIndexAccess { target, index, ty } => {
                let pointer = self.lower_expression(target);
                if !pointer.is_pointer_value() {
                    errors::fatal(ErrorKind::Codegen, "Cannot index into non-pointer type");
                }

                let index_value = self.lower_expression(index);
                if !index_value.is_int_value() {
                    errors::fatal(ErrorKind::Codegen, "Pointer index must be an integer type");
                }

                let pointee_type = self.basic_type(ty);
                let element_pointer = unsafe {
                    self.builder
                        .build_gep(
                            pointee_type,
                            pointer.into_pointer_value(),
                            &[index_value.into_int_value()],
                            "ptridx",
                        )
                        .expect("build gep")
                };
                (element_pointer, pointee_type)
            }

            _ => errors::fatal(ErrorKind::Codegen, "Expression is not addressable"),
        }
    }

    // ── conversions ─────────────────────────────────────────────

    /// Bring an integer value to the width of `target_type` (sign- or
    /// zero-extending per `signed`, truncating when narrower). Any other
    /// combination is returned unchanged.
    fn convert_if_needed(
        &self,
        value: BasicValueEnum<'ctx>,
        target_type: BasicTypeEnum<'ctx>,
        signed: bool,
    ) -> BasicValueEnum<'ctx> {
        if value.get_type() == target_type {
            return value;
        }

        if let (BasicValueEnum::IntValue(int_value), BasicTypeEnum::IntType(target_int)) =
            (value, target_type)
        {
            let value_bits = int_value.get_type().get_bit_width();
            let target_bits = target_int.get_bit_width();

            if value_bits < target_bits {
                let extended = if signed {
                    self.builder
                        .build_int_s_extend(int_value, target_int, "sext")
                } else {
                    self.builder
                        .build_int_z_extend(int_value, target_int, "zext")
                };
                return extended.expect("build extend").into();
            } else if value_bits > target_bits {
                return self
                    .builder
                    .build_int_truncate(int_value, target_int, "trunc")
                    .expect("build trunc")
                    .into();
            }
        }

        value
    }
}
