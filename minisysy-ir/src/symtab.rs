//! Scoped name resolution: a stack of scopes bracketing compound
//! statements and function bodies, backed by the module's [`SymbolArena`].

use crate::symbol::{Operand, Scope, SymbolArena};
use crate::types::Type;
use std::collections::HashMap;
use std::rc::Rc;

/// Declaring a name that already exists in the innermost scope.
#[derive(Debug)]
pub struct Redeclaration(pub String);

struct Frame {
    names: HashMap<Rc<str>, Operand>,
}

/// Nested lexical scopes over one [`SymbolArena`]. The outermost frame (index
/// 0) holds globals and is never popped.
pub struct SymbolTable {
    arena: SymbolArena,
    frames: Vec<Frame>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            arena: SymbolArena::new(),
            frames: vec![Frame {
                names: HashMap::new(),
            }],
        }
    }

    pub fn arena(&self) -> &SymbolArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut SymbolArena {
        &mut self.arena
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(Frame {
            names: HashMap::new(),
        });
    }

    pub fn leave_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the global scope");
        self.frames.pop();
    }

    /// Current nesting depth; global scope is level 0.
    pub fn scope_level(&self) -> u32 {
        (self.frames.len() - 1) as u32
    }

    /// Declare `name` as an identifier in the innermost scope.
    ///
    /// Fails with [`Redeclaration`] if `name` is already bound in the
    /// innermost scope; shadowing an outer scope's name is allowed.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        scope: Scope,
        init_val: Option<i64>,
    ) -> Result<Operand, Redeclaration> {
        let rc_name: Rc<str> = Rc::from(name);
        if self.frames.last().unwrap().names.contains_key(&rc_name) {
            return Err(Redeclaration(name.to_string()));
        }
        let level = self.scope_level();
        let op = self
            .arena
            .push_identifier(rc_name.clone(), ty, level, scope, init_val);
        self.frames.last_mut().unwrap().names.insert(rc_name, op);
        Ok(op)
    }

    /// Search innermost-to-outermost for `name`.
    pub fn lookup(&self, name: &str) -> Option<Operand> {
        for frame in self.frames.iter().rev() {
            if let Some(op) = frame.names.get(name) {
                return Some(*op);
            }
        }
        None
    }

    pub fn is_global(&self, op: Operand) -> bool {
        matches!(
            self.arena.get(op),
            crate::symbol::SymbolEntry::Identifier { scope: Scope::Global, .. }
        )
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInterner;

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let mut t = TypeInterner::new();
        let i32_ = t.i32();
        let mut st = SymbolTable::new();
        let outer = st.declare("x", i32_.clone(), Scope::Global, None).unwrap();
        st.enter_scope();
        let inner = st
            .declare("x", i32_.clone(), Scope::Local, None)
            .unwrap();
        assert_ne!(outer, inner);
        assert_eq!(st.lookup("x"), Some(inner));
        st.leave_scope();
        assert_eq!(st.lookup("x"), Some(outer));
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut t = TypeInterner::new();
        let i32_ = t.i32();
        let mut st = SymbolTable::new();
        st.declare("x", i32_.clone(), Scope::Global, None).unwrap();
        assert!(st.declare("x", i32_, Scope::Global, None).is_err());
    }

    #[test]
    fn undeclared_lookup_is_none() {
        let st = SymbolTable::new();
        assert_eq!(st.lookup("missing"), None);
    }
}
