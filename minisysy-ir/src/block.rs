//! Basic blocks: an ordered, non-empty instruction list with one
//! terminator, plus deduplicated predecessor/successor edges.

use crate::entity::entity_impl;
use crate::instruction::Instruction;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
        }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }

    /// Number of `Alloca` instructions currently occupying the front of this
    /// block, i.e. the insertion point for the next one.
    pub fn alloca_prefix_len(&self) -> usize {
        self.instructions
            .iter()
            .take_while(|i| matches!(i, Instruction::Alloca { .. }))
            .count()
    }

    pub(crate) fn add_succ(&mut self, b: BlockId) {
        if !self.succs.contains(&b) {
            self.succs.push(b);
        }
    }

    pub(crate) fn add_pred(&mut self, b: BlockId) {
        if !self.preds.contains(&b) {
            self.preds.push(b);
        }
    }
}
