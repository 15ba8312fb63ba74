//! Typed AST nodes.
//!
//! Every expression is fully typed at construction; the parser never builds
//! an untyped node. Instead of virtual dispatch each node is a variant of a
//! sum type with exactly the fields it needs, plus small capability
//! accessors (`is_signed`, `is_lvalue`) the IR walker matches on.

use std::cell::RefCell;
use std::rc::Rc;

use super::types::{ClassDecl, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Greater,
    Equal,
}

#[derive(Debug)]
pub enum Expr {
    IntLiteral {
        value: i32,
    },
    FloatLiteral {
        value: f32,
    },
    StringLiteral {
        value: String,
    },
    /// A named local variable (or parameter).
    VarRef {
        name: String,
        ty: Type,
    },
    /// `$target` — `ty` is the type after the dereference.
    Dref {
        target: Box<Expr>,
        ty: Type,
    },
    /// `&target` — yields the storage address of an l-value.
    AddressOf {
        target: Box<Expr>,
    },
    /// `target.member` — `ty` is the member's type.
    StructAccess {
        target: Box<Expr>,
        class: Rc<RefCell<ClassDecl>>,
        member: String,
        ty: Type,
    },
    /// `target[index]` over a fixed-length array; `array` is the full array
    /// type, `ty` the element type.
    ArrayAccess {
        target: Box<Expr>,
        index: Box<Expr>,
        array: Type,
        ty: Type,
    },
    /// `target[index]` over a pointer; `ty` is the pointee type.
    PtrIndexAccess {
        target: Box<Expr>,
        index: Box<Expr>,
        ty: Type,
    },
    /// A call by mangled name; `ty` is the callee's return type.
    Call {
        callee: String,
        args: Vec<Expr>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        signed: bool,
    },
}

impl Expr {
    /// Signedness, propagated from the node's resolved type. String
    /// literals are unsigned; both operands of a binary operation share the
    /// result's signedness.
    pub fn is_signed(&self) -> bool {
        match self {
            Expr::IntLiteral { .. } => true,
            Expr::FloatLiteral { .. } => true,
            Expr::StringLiteral { .. } => false,
            Expr::VarRef { ty, .. } => ty.is_signed(),
            Expr::Dref { ty, .. } => ty.is_signed(),
            Expr::AddressOf { target } => target.is_signed(),
            Expr::StructAccess { ty, .. } => ty.is_signed(),
            Expr::ArrayAccess { ty, .. } => ty.is_signed(),
            Expr::PtrIndexAccess { ty, .. } => ty.is_signed(),
            Expr::Call { ty, .. } => ty.is_signed(),
            Expr::Binary { signed, .. } => *signed,
        }
    }

    /// Can this expression be lowered to a storage address?
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::VarRef { .. }
                | Expr::Dref { .. }
                | Expr::StructAccess { .. }
                | Expr::ArrayAccess { .. }
                | Expr::PtrIndexAccess { .. }
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Expr::Call { .. })
    }
}

#[derive(Debug)]
pub enum Stmt {
    VarDecl {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Return {
        value: Option<Expr>,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Expr {
        expr: Expr,
    },
}

/// A function, detached or member. Member functions carry their mangled
/// `Class_name` and an implicit leading `this: ptr Class` parameter.
/// A `None` body is an external declaration.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<(String, Type)>,
    pub body: Option<Vec<Stmt>>,
    pub is_public: bool,
    pub is_detached: bool,
}

/// One fully parsed compilation unit: classes and functions in declaration
/// order (imported files first).
#[derive(Debug)]
pub struct Program {
    pub classes: Vec<Rc<RefCell<ClassDecl>>>,
    pub functions: Vec<Function>,
}
