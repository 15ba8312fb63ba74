//! Name-resolution state shared by the parser: the type registry and the
//! lexical scope stack.

use std::collections::HashMap;

use crate::ast::types::{Primitive, Type};

/// Maps type names to descriptors. Seeded with the primitive names; `class`
/// and `typedef` declarations add entries during parsing.
pub struct TypeRegistry {
    types: HashMap<String, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };

        registry.register("bool", Primitive::Bool, false);
        registry.register("void", Primitive::Void, false);

        registry.register("char", Primitive::Char, true);
        registry.register("uchar", Primitive::Char, false);

        registry.register("short", Primitive::Short, true);
        registry.register("ushort", Primitive::Short, false);

        registry.register("int", Primitive::Int, true);
        registry.register("uint", Primitive::Int, false);

        registry.register("long", Primitive::Long, true);
        registry.register("ulong", Primitive::Long, false);

        // fp types are always signed
        registry.register("half", Primitive::Half, true);
        registry.register("float", Primitive::Float, true);
        registry.register("double", Primitive::Double, true);
        registry.register("quad", Primitive::Quad, true);

        registry
    }

    fn register(&mut self, name: &str, prim: Primitive, signed: bool) {
        self.types
            .insert(name.to_string(), Type::Primitive { prim, signed });
    }

    pub fn insert(&mut self, name: String, ty: Type) {
        self.types.insert(name, ty);
    }

    pub fn get(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A stack of (variable name -> type) maps. One frame per function body;
/// lookup walks from the innermost frame outwards.
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Type>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn declare(&mut self, name: String, ty: Type) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name, ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    /// Checks only the innermost frame.
    pub fn exists_in_current(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Primitive;

    fn int() -> Type {
        Type::Primitive {
            prim: Primitive::Int,
            signed: true,
        }
    }

    fn uint() -> Type {
        Type::Primitive {
            prim: Primitive::Int,
            signed: false,
        }
    }

    #[test]
    fn registry_seeds_primitives() {
        let registry = TypeRegistry::new();
        assert!(registry.get("int").is_some_and(|t| t.is_signed()));
        assert!(registry.get("uint").is_some_and(|t| !t.is_signed()));
        assert!(registry.get("void").is_some_and(|t| t.is_void()));
        assert!(registry.get("quad").is_some_and(|t| t.is_signed()));
        assert!(registry.get("string").is_none());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x".into(), int());
        scopes.push();
        scopes.declare("x".into(), uint());

        assert!(!scopes.lookup("x").unwrap().is_signed());
        scopes.pop();
        assert!(scopes.lookup("x").unwrap().is_signed());
    }

    #[test]
    fn exists_in_current_ignores_outer_frames() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x".into(), int());
        scopes.push();
        assert!(!scopes.exists_in_current("x"));
        assert!(scopes.lookup("x").is_some());
    }
}
