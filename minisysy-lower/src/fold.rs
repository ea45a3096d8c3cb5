//! Constant folding: a pure integer evaluator used for global
//! and `const` initializers.
//!
//! Local identifiers are conservatively non-foldable: there is no stack
//! of folded values to consult here, only the module-level constant
//! table passed in through [`GlobalLookup`].

use crate::ast::{BinOp, Expr, ExprKind, UnaryOp};

#[derive(Debug, PartialEq, Eq)]
pub enum FoldError {
    DivisionByZero,
    /// The expression is not foldable at all (non-constant identifier,
    /// a call, etc.) — distinct from `DivisionByZero` so a caller can
    /// tell "not a constant" from "constant but erroneous".
    NotConstant,
}

/// Resolves a global identifier to its already-folded value. `lower.rs`
/// backs this with the symbol table; tests can use a plain closure.
pub trait GlobalLookup {
    fn lookup_global_const(&self, name: &str) -> Option<i64>;
}

pub fn fold(expr: &Expr, globals: &impl GlobalLookup) -> Result<i64, FoldError> {
    match &expr.kind {
        ExprKind::IntLit(v) => Ok(*v),
        ExprKind::Ident(name) => globals
            .lookup_global_const(name)
            .ok_or(FoldError::NotConstant),
        ExprKind::Unary(op, operand) => {
            let v = fold(operand, globals)?;
            Ok(match op {
                UnaryOp::Neg => -v,
                UnaryOp::Not => i64::from(v == 0),
            })
        }
        ExprKind::Binary(BinOp::And, lhs, rhs) => {
            let l = fold(lhs, globals)?;
            if l == 0 {
                return Ok(0);
            }
            let r = fold(rhs, globals)?;
            Ok(i64::from(r != 0))
        }
        ExprKind::Binary(BinOp::Or, lhs, rhs) => {
            let l = fold(lhs, globals)?;
            if l != 0 {
                return Ok(1);
            }
            let r = fold(rhs, globals)?;
            Ok(i64::from(r != 0))
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let l = fold(lhs, globals)?;
            let r = fold(rhs, globals)?;
            match op {
                BinOp::Add => Ok(l.wrapping_add(r)),
                BinOp::Sub => Ok(l.wrapping_sub(r)),
                BinOp::Mul => Ok(l.wrapping_mul(r)),
                BinOp::Div => {
                    if r == 0 {
                        Err(FoldError::DivisionByZero)
                    } else {
                        Ok(l.wrapping_div(r))
                    }
                }
                BinOp::Mod => {
                    if r == 0 {
                        Err(FoldError::DivisionByZero)
                    } else {
                        Ok(l.wrapping_rem(r))
                    }
                }
                BinOp::Lt => Ok(i64::from(l < r)),
                BinOp::Le => Ok(i64::from(l <= r)),
                BinOp::Gt => Ok(i64::from(l > r)),
                BinOp::Ge => Ok(i64::from(l >= r)),
                BinOp::Eq => Ok(i64::from(l == r)),
                BinOp::Ne => Ok(i64::from(l != r)),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
        ExprKind::Call(..) => Err(FoldError::NotConstant),
    }
}
