//! `SymbolEntry` and `Operand`: the arena of named and anonymous values
//! that instructions refer to.

use crate::entity::{entity_impl, EntityRef, PrimaryMap};
use crate::types::Type;
use std::rc::Rc;

/// A thin handle referring to one [`SymbolEntry`] in a [`SymbolTable`]'s
/// arena. Operands carry no state of their own; their type is their
/// entry's type.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Operand(u32);
entity_impl!(Operand, "%");

/// Where an `Identifier` entry's name was declared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Param,
}

#[derive(Debug, Clone)]
pub enum SymbolEntry {
    /// A literal value; lowering emits no instruction when one is used
    /// directly, only a reference to this entry.
    Constant { ty: Type, value: i64 },
    /// A source-level name: global, local or parameter.
    Identifier {
        name: Rc<str>,
        ty: Type,
        scope_level: u32,
        scope: Scope,
        /// The pointer operand produced by this entry's `Alloca` (locals,
        /// params) or by module-level global declaration. `None` until the
        /// declaring statement has been lowered.
        addr: Option<Operand>,
        /// Folded value for globals/consts; `None` for ordinary locals.
        init_val: Option<i64>,
    },
    /// An SSA-style virtual register, identified by a label unique within
    /// its function.
    Temporary { ty: Type, label: u64 },
}

impl SymbolEntry {
    pub fn ty(&self) -> &Type {
        match self {
            SymbolEntry::Constant { ty, .. } => ty,
            SymbolEntry::Identifier { ty, .. } => ty,
            SymbolEntry::Temporary { ty, .. } => ty,
        }
    }
}

/// The arena of [`SymbolEntry`] values an operand indexes into. Shared by
/// the whole module: labels handed out here are unique per-function in
/// practice because the lowering pass never interleaves two functions, but
/// nothing here enforces that beyond the monotonically increasing counter.
#[derive(Default)]
pub struct SymbolArena {
    entries: PrimaryMap<Operand, SymbolEntry>,
    next_label: u64,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self {
            entries: PrimaryMap::new(),
            next_label: 0,
        }
    }

    pub fn get(&self, op: Operand) -> &SymbolEntry {
        &self.entries[op]
    }

    pub fn get_mut(&mut self, op: Operand) -> &mut SymbolEntry {
        &mut self.entries[op]
    }

    pub fn ty_of(&self, op: Operand) -> &Type {
        self.entries[op].ty()
    }

    pub fn push_constant(&mut self, ty: Type, value: i64) -> Operand {
        self.entries.push(SymbolEntry::Constant { ty, value })
    }

    pub fn push_identifier(
        &mut self,
        name: Rc<str>,
        ty: Type,
        scope_level: u32,
        scope: Scope,
        init_val: Option<i64>,
    ) -> Operand {
        self.entries.push(SymbolEntry::Identifier {
            name,
            ty,
            scope_level,
            scope,
            addr: None,
            init_val,
        })
    }

    /// Allocate a fresh temporary, sharing the counter used for labels.
    pub fn push_temporary(&mut self, ty: Type) -> Operand {
        let label = self.fresh_label();
        self.entries.push(SymbolEntry::Temporary { ty, label })
    }

    pub fn fresh_label(&mut self) -> u64 {
        let l = self.next_label;
        self.next_label += 1;
        l
    }

    pub fn set_addr(&mut self, op: Operand, addr: Operand) {
        match self.get_mut(op) {
            SymbolEntry::Identifier { addr: a, .. } => *a = Some(addr),
            other => panic!("set_addr on non-identifier entry {other:?}"),
        }
    }

    pub fn addr_of(&self, op: Operand) -> Option<Operand> {
        match self.get(op) {
            SymbolEntry::Identifier { addr, .. } => *addr,
            _ => None,
        }
    }

    pub fn set_init_val(&mut self, op: Operand, value: i64) {
        match self.get_mut(op) {
            SymbolEntry::Identifier { init_val, .. } => *init_val = Some(value),
            other => panic!("set_init_val on non-identifier entry {other:?}"),
        }
    }

    pub fn init_val_of(&self, op: Operand) -> Option<i64> {
        match self.get(op) {
            SymbolEntry::Identifier { init_val, .. } => *init_val,
            _ => None,
        }
    }
}
