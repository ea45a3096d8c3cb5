//! The `Builder` cursor and backpatching support.
//!
//! As an alternative to pointer-to-slot backpatching, a
//! not-yet-known branch target is represented as `None` inside the
//! `CondBr` instruction itself, and a [`PatchSlot`] is a *locator*
//! (block + instruction index + which arm) rather than a raw pointer into
//! the instruction vector. This survives `Vec` growth/reallocation for
//! free, at the cost of one array index on patch — a good trade in a
//! language where a raw `BasicBlock**` slot held across reallocation
//! would otherwise need `unsafe`.

use crate::block::BlockId;
use crate::function::Function;
use crate::instruction::Instruction;
use crate::symbol::Operand;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotKind {
    True,
    False,
}

/// A patchable reference to one arm of a `CondBr` emitted earlier.
#[derive(Copy, Clone, Debug)]
pub struct PatchSlot {
    block: BlockId,
    index: usize,
    kind: SlotKind,
}

/// True/false lists: the patchable slots that should jump to the
/// "condition-true"/"condition-false" destination of the enclosing context.
pub type PatchList = Vec<PatchSlot>;

pub fn merge(mut a: PatchList, mut b: PatchList) -> PatchList {
    a.append(&mut b);
    a
}

/// The mutable cursor the lowering pass emits instructions through.
pub struct Builder<'f> {
    func: &'f mut Function,
    insert_block: BlockId,
    /// Set by the lowering pass before lowering a boolean-expression node to
    /// request that it materialize a pending, unpatched `CondBr` instead of
    /// a plain `i1` value.
    gen_br: bool,
}

impl<'f> Builder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        let entry = func.entry;
        Self {
            func,
            insert_block: entry,
            gen_br: false,
        }
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        self.func
    }

    pub fn insert_block(&self) -> BlockId {
        self.insert_block
    }

    pub fn switch_to_block(&mut self, b: BlockId) {
        self.insert_block = b;
    }

    pub fn create_block(&mut self) -> BlockId {
        self.func.create_block()
    }

    pub fn gen_br(&self) -> bool {
        self.gen_br
    }

    pub fn set_gen_br(&mut self, v: bool) {
        self.gen_br = v;
    }

    fn current_block_mut(&mut self) -> &mut crate::block::BasicBlock {
        self.func.block_mut(self.insert_block)
    }

    /// Append `inst` to the current block. Panics if the current block is
    /// already terminated — callers only emit after switching to a fresh
    /// block or before a terminator.
    pub fn emit(&mut self, inst: Instruction) {
        let block = self.current_block_mut();
        debug_assert!(
            !block.is_terminated(),
            "emitting into an already-terminated block {}",
            block.id
        );
        log::trace!("block {}: emit {:?}", block.id, inst);
        block.instructions.push(inst);
    }

    /// Emit a `CondBr` with unpatched targets, returning the slots to
    /// publish into the caller's true/false lists.
    pub fn emit_cond_br(&mut self, cond: Operand) -> (PatchSlot, PatchSlot) {
        let block = self.insert_block;
        let index = self.func.block(block).instructions.len();
        self.emit(Instruction::CondBr {
            cond,
            true_target: None,
            false_target: None,
        });
        (
            PatchSlot {
                block,
                index,
                kind: SlotKind::True,
            },
            PatchSlot {
                block,
                index,
                kind: SlotKind::False,
            },
        )
    }

    /// Fill in the target of a previously emitted `CondBr` arm.
    pub fn backpatch(&mut self, slot: PatchSlot, target: BlockId) {
        log::debug!("backpatch block {} -> {}", slot.block, target);
        let block = self.func.block_mut(slot.block);
        match &mut block.instructions[slot.index] {
            Instruction::CondBr {
                true_target,
                false_target,
                ..
            } => match slot.kind {
                SlotKind::True => *true_target = Some(target),
                SlotKind::False => *false_target = Some(target),
            },
            other => unreachable!("patch slot does not point at a CondBr: {other:?}"),
        }
    }

    pub fn backpatch_list(&mut self, list: PatchList, target: BlockId) {
        for slot in list {
            self.backpatch(slot, target);
        }
    }

    /// Terminate the current block with an unconditional branch whose
    /// target is already known.
    pub fn terminate_uncond(&mut self, target: BlockId) {
        self.emit(Instruction::UncondBr { target });
    }

    /// Insert an `Alloca` at the front of the function's entry block,
    /// after any allocas already there.
    pub fn alloca_at_entry(&mut self, dst: Operand, for_sym: Operand) {
        let entry = self.func.entry;
        let entry_block = self.func.block_mut(entry);
        let at = entry_block.alloca_prefix_len();
        entry_block
            .instructions
            .insert(at, Instruction::Alloca { dst, for_sym });
    }
}
