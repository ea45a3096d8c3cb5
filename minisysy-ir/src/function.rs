//! A function: an ordered list of blocks with a designated entry.

use crate::block::{BasicBlock, BlockId};
use crate::entity::{EntityRef, PrimaryMap};
use crate::symbol::Operand;
use crate::types::Type;
use std::rc::Rc;

pub struct Function {
    pub name: Rc<str>,
    pub ret_ty: Type,
    /// Parameter identifiers, in declaration order.
    pub params: Vec<Operand>,
    pub entry: BlockId,
    pub blocks: PrimaryMap<BlockId, BasicBlock>,
}

impl Function {
    pub fn new(name: Rc<str>, ret_ty: Type, params: Vec<Operand>) -> Self {
        let mut blocks: PrimaryMap<BlockId, BasicBlock> = PrimaryMap::new();
        let entry_id: BlockId = <BlockId as EntityRef>::new(0);
        let entry = blocks.push(BasicBlock::new(entry_id));
        debug_assert_eq!(entry, entry_id);
        Self {
            name,
            ret_ty,
            params,
            entry,
            blocks,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        let id: BlockId = <BlockId as EntityRef>::new(self.blocks.len());
        let pushed = self.blocks.push(BasicBlock::new(id));
        debug_assert_eq!(pushed, id);
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    pub fn blocks_in_order(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter()
    }
}
