//! CFG-edge finalization.
//!
//! This is the *only* place edges get added: the lowering pass
//! itself never touches `preds`/`succs` while emitting `if`/`while`
//! bodies. Adding edges eagerly during lowering instead risks
//! double-adding the `end_bb` edge for an `if` with no `else` (both
//! the fallthrough from `then_bb` and the false-branch backpatch
//! target land on the same block).

use crate::function::Function;
use crate::instruction::Instruction;

/// Walk every block's terminator and materialize `preds`/`succs` edges.
/// Idempotent and safe to call once per fully-lowered function.
pub fn finalize(func: &mut Function) {
    let edges: Vec<_> = func
        .blocks_in_order()
        .map(|(id, b)| {
            let targets = match b.terminator() {
                Some(Instruction::UncondBr { target }) => vec![*target],
                Some(Instruction::CondBr {
                    true_target,
                    false_target,
                    ..
                }) => {
                    let t = true_target.expect("unpatched CondBr true target at finalization");
                    let f = false_target.expect("unpatched CondBr false target at finalization");
                    vec![t, f]
                }
                Some(Instruction::Ret { .. }) => vec![],
                Some(other) => unreachable!("non-terminator instruction flagged as terminator: {other:?}"),
                None => panic!("block {} has no terminator at finalization", id),
            };
            (id, targets)
        })
        .collect();

    for (from, targets) in edges {
        for to in targets {
            func.block_mut(from).add_succ(to);
            func.block_mut(to).add_pred(from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::symbol::Operand;
    use crate::types::TypeInterner;
    use std::rc::Rc;

    fn dummy_operand() -> Operand {
        // CondBr's `cond` field isn't read by finalization, only its
        // presence; any operand id is fine here.
        Operand::new(0)
    }

    #[test]
    fn uncond_chain() {
        let mut t = TypeInterner::new();
        let void = t.void_type();
        let mut f = Function::new(Rc::from("f"), void, vec![]);
        let b1 = f.create_block();
        f.block_mut(f.entry)
            .instructions
            .push(Instruction::UncondBr { target: b1 });
        f.block_mut(b1).instructions.push(Instruction::Ret { value: None });

        finalize(&mut f);

        assert_eq!(f.block(f.entry).succs, vec![b1]);
        assert_eq!(f.block(b1).preds, vec![f.entry]);
        assert!(f.block(b1).succs.is_empty());
    }

    #[test]
    fn cond_br_dedup_on_same_target() {
        let mut t = TypeInterner::new();
        let void = t.void_type();
        let mut f = Function::new(Rc::from("f"), void, vec![]);
        let b1 = f.create_block();
        let cond = dummy_operand();
        f.block_mut(f.entry).instructions.push(Instruction::CondBr {
            cond,
            true_target: Some(b1),
            false_target: Some(b1),
        });
        f.block_mut(b1).instructions.push(Instruction::Ret { value: None });

        finalize(&mut f);

        assert_eq!(f.block(f.entry).succs, vec![b1]);
        assert_eq!(f.block(b1).preds, vec![f.entry]);
    }
}
