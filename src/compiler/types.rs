//! AST type -> LLVM type lowering, including class struct layouts.

use std::cell::RefCell;
use std::rc::Rc;

use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::AddressSpace;

use crate::ast::types::{ClassDecl, Primitive, Type};
use crate::errors::{self, ErrorKind};

use super::codegen::Codegen;

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    /// Lower a class to its named struct type. The opaque struct is
    /// registered before the member types are lowered so recursive
    /// references (through pointers) resolve to the same handle; the body
    /// is then set from the member types in declaration order.
    pub(crate) fn lower_class(&mut self, decl: &Rc<RefCell<ClassDecl>>) -> StructType<'ctx> {
        let decl = decl.borrow();

        if let Some(existing) = self.structs.get(decl.name()) {
            return *existing;
        }

        let struct_type = self.context.opaque_struct_type(decl.name());
        self.structs.insert(decl.name().to_string(), struct_type);

        let field_types: Vec<BasicTypeEnum<'ctx>> = decl
            .members()
            .iter()
            .map(|(_, member_type)| self.basic_type(member_type))
            .collect();

        struct_type.set_body(&field_types, false);
        struct_type
    }

    /// Lower a type descriptor to the LLVM type used for values and stack
    /// slots. `void` has no value representation and is fatal here; it is
    /// only legal as a function return type.
    pub(crate) fn basic_type(&mut self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Primitive { prim, .. } => match prim {
                Primitive::Void => errors::fatal(
                    ErrorKind::Codegen,
                    "'void' cannot be used as a value type",
                ),
                Primitive::Bool => self.context.bool_type().into(),
                Primitive::Char => self.context.i8_type().into(),
                Primitive::Short => self.context.i16_type().into(),
                Primitive::Int => self.context.i32_type().into(),
                Primitive::Long => self.context.i64_type().into(),
                Primitive::Half => self.context.f16_type().into(),
                Primitive::Float => self.context.f32_type().into(),
                Primitive::Double => self.context.f64_type().into(),
                Primitive::Quad => self.context.f128_type().into(),
            },
            // pointers are opaque at the IR level
            Type::Pointer { .. } => self.context.ptr_type(AddressSpace::default()).into(),
            Type::Array { element, length } => {
                self.basic_type(element).array_type(*length).into()
            }
            Type::Class { decl } => self.lower_class(decl).into(),
        }
    }
}
