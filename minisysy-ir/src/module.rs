//! A module: an ordered list of functions plus global identifier
//! entries, all backed by one [`SymbolTable`].

use crate::function::Function;
use crate::symbol::Operand;
use crate::symtab::SymbolTable;

pub struct Module {
    pub symtab: SymbolTable,
    /// Global (and global `const`) identifier entries, in declaration order.
    pub globals: Vec<Operand>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            symtab: SymbolTable::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| &*f.name == name)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}
