//! The lowering pass: a single recursive walk that interleaves
//! symbol declaration/lookup, constant folding, type-checking with
//! widening, and IR emission through a [`Builder`] cursor.
//!
//! Two passes over top-level items precede body lowering: first all
//! globals are folded and declared, then every function signature is
//! declared, so forward and mutually recursive calls resolve. Function
//! bodies are lowered in a third pass.

use crate::ast::{self, BinOp, ExprKind, RetType, StmtKind, UnaryOp};
use crate::fold::{self, GlobalLookup};
use minisysy_ir::block::BlockId;
use minisysy_ir::builder::{merge, Builder, PatchList};
use minisysy_ir::error::{Diagnostics, ErrorKind, Location, LowerError};
use minisysy_ir::function::Function;
use minisysy_ir::instruction::{BinaryOp as IrBinaryOp, CmpOp, Instruction};
use minisysy_ir::module::Module;
use minisysy_ir::symbol::{Operand, Scope, SymbolEntry};
use minisysy_ir::symtab::{Redeclaration, SymbolTable};
use minisysy_ir::types::{Type, TypeInterner};
use smallvec::SmallVec;
use std::rc::Rc;

/// Lets the constant folder resolve a previously-declared global without
/// this crate reaching into the arena directly.
impl GlobalLookup for SymbolTable {
    fn lookup_global_const(&self, name: &str) -> Option<i64> {
        let op = self.lookup(name)?;
        if !self.is_global(op) {
            return None;
        }
        self.arena().init_val_of(op)
    }
}

/// A value-producing lowering result. `operand` is `None` only when the
/// expression is a call to a `void` function — a value in name alone,
/// consumers must reject it with [`ErrorKind::TypeMismatch`].
struct ValueResult {
    operand: Option<Operand>,
    ty: Type,
}

/// The true/false lists synthesized while lowering a boolean expression
/// in branch context.
struct BranchResult {
    true_list: PatchList,
    false_list: PatchList,
}

/// `(cond_bb, end_bb)` of one enclosing `while`. Tracked explicitly
/// rather than recovered by inspecting `pred[0]`/`succ[0]` of the
/// current block, which breaks once a block can have more than one
/// predecessor in an unpredictable order.
#[derive(Copy, Clone)]
struct LoopCtx {
    cond_bb: BlockId,
    end_bb: BlockId,
}

pub struct Lowerer {
    types: TypeInterner,
    symtab: SymbolTable,
    diags: Diagnostics,
    loop_stack: Vec<LoopCtx>,
    globals: Vec<Operand>,
    functions: Vec<Function>,
    current_ret_ty: Option<Type>,
}

impl Lowerer {
    pub fn new() -> Self {
        Self {
            types: TypeInterner::new(),
            symtab: SymbolTable::new(),
            diags: Diagnostics::new(),
            loop_stack: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            current_ret_ty: None,
        }
    }

    pub fn lower_program(&mut self, program: &ast::Program) {
        for item in &program.items {
            if let ast::Item::Global(g) = item {
                self.lower_global_decl(g);
            }
        }
        for item in &program.items {
            if let ast::Item::Func(f) = item {
                self.declare_function_signature(f);
            }
        }
        for item in &program.items {
            if let ast::Item::Func(f) = item {
                self.lower_function(f);
            }
        }
    }

    pub fn finish(self) -> Result<Module, Vec<LowerError>> {
        let module = Module {
            symtab: self.symtab,
            globals: self.globals,
            functions: self.functions,
        };
        self.diags.into_result(module)
    }

    // ---- top level declarations -----------------------------------

    /// Every global (`const` or not) must fold: this IR has no
    /// instruction form for addressing module-level storage, so a
    /// global identifier's only representation is its folded value,
    /// inlined as a fresh `Constant` operand at each use.
    fn lower_global_decl(&mut self, g: &ast::GlobalDecl) {
        for d in &g.decls {
            let ty = self.types.i32();
            let value = match &d.init {
                Some(init) => match fold::fold(init, &self.symtab) {
                    Ok(v) => Some(v),
                    Err(fold::FoldError::DivisionByZero) => {
                        self.diags.push(init.location, ErrorKind::DivisionByZero);
                        None
                    }
                    Err(fold::FoldError::NotConstant) => {
                        self.diags.push(d.location, ErrorKind::NonConstantInitializer);
                        None
                    }
                },
                None => {
                    self.diags.push(d.location, ErrorKind::NonConstantInitializer);
                    None
                }
            };
            match self.symtab.declare(&d.name, ty, Scope::Global, value) {
                Ok(op) => self.globals.push(op),
                Err(Redeclaration(n)) => self.diags.push(d.location, ErrorKind::Redeclaration(n)),
            }
        }
    }

    fn declare_function_signature(&mut self, f: &ast::FuncDef) {
        let ret_ty = self.ast_ret_ty(f.ret_ty);
        let param_tys: Vec<Type> = f.params.iter().map(|_| self.types.i32()).collect();
        let fn_ty = self.types.fn_type(ret_ty, param_tys);
        if let Err(Redeclaration(n)) = self.symtab.declare(&f.name, fn_ty, Scope::Global, None) {
            self.diags.push(f.location, ErrorKind::Redeclaration(n));
        }
    }

    fn ast_ret_ty(&mut self, rt: RetType) -> Type {
        match rt {
            RetType::Void => self.types.void_type(),
            RetType::Int => self.types.i32(),
        }
    }

    // ---- functions --------------------------------------------------

    fn lower_function(&mut self, def: &ast::FuncDef) {
        let ret_ty = self.ast_ret_ty(def.ret_ty);
        let param_tys: Vec<Type> = def.params.iter().map(|_| self.types.i32()).collect();
        let mut func = Function::new(Rc::from(def.name.as_str()), ret_ty.clone(), Vec::new());
        self.current_ret_ty = Some(ret_ty.clone());
        self.symtab.enter_scope();
        self.loop_stack.clear();

        let mut param_ops = Vec::with_capacity(def.params.len());
        {
            let mut builder = Builder::new(&mut func);
            for (p, pty) in def.params.iter().zip(param_tys.iter()) {
                let op = match self.symtab.declare(&p.name, pty.clone(), Scope::Param, None) {
                    Ok(op) => op,
                    Err(Redeclaration(n)) => {
                        self.diags.push(p.location, ErrorKind::Redeclaration(n));
                        continue;
                    }
                };
                let ptr_ty = self.types.ptr_type(pty.clone());
                let addr = self.symtab.arena_mut().push_temporary(ptr_ty);
                builder.alloca_at_entry(addr, op);
                self.symtab.arena_mut().set_addr(op, addr);
                builder.emit(Instruction::Store { ptr: addr, src: op });
                param_ops.push(op);
            }

            self.lower_block(&mut builder, &def.body);

            if !builder.func().block(builder.insert_block()).is_terminated() {
                builder.emit(Instruction::Ret { value: None });
            }
        }

        func.params = param_ops;
        minisysy_ir::flowgraph::finalize(&mut func);
        self.symtab.leave_scope();
        self.functions.push(func);
    }

    fn lower_block(&mut self, builder: &mut Builder<'_>, block: &ast::Block) {
        self.symtab.enter_scope();
        for stmt in &block.stmts {
            self.lower_stmt(builder, stmt);
        }
        self.symtab.leave_scope();
    }

    // ---- statements ---------------------------------------------------

    fn lower_stmt(&mut self, builder: &mut Builder<'_>, stmt: &ast::Stmt) {
        match &stmt.kind {
            StmtKind::LocalDecl { is_const, decls } => self.lower_local_decl(builder, *is_const, decls),
            StmtKind::Assign { target, value } => self.lower_assign(builder, target, value),
            StmtKind::If {
                cond,
                then_branch,
                else_branch: None,
            } => self.lower_if(builder, cond, then_branch),
            StmtKind::If {
                cond,
                then_branch,
                else_branch: Some(else_branch),
            } => self.lower_if_else(builder, cond, then_branch, else_branch),
            StmtKind::While { cond, body } => self.lower_while(builder, cond, body),
            StmtKind::Break => self.lower_break(builder, stmt.location),
            StmtKind::Continue => self.lower_continue(builder, stmt.location),
            StmtKind::Return(value) => self.lower_return(builder, value.as_ref(), stmt.location),
            StmtKind::Expr(e) => {
                let _ = self.lower_expr_value(builder, e);
            }
            StmtKind::Block(b) => self.lower_block(builder, b),
            StmtKind::Empty => {}
        }
    }

    fn lower_local_decl(&mut self, builder: &mut Builder<'_>, is_const: bool, decls: &[ast::Declarator]) {
        for d in decls {
            let ty = self.types.i32();
            let op = match self.symtab.declare(&d.name, ty.clone(), Scope::Local, None) {
                Ok(op) => op,
                Err(Redeclaration(n)) => {
                    self.diags.push(d.location, ErrorKind::Redeclaration(n));
                    continue;
                }
            };
            let ptr_ty = self.types.ptr_type(ty.clone());
            let addr = self.symtab.arena_mut().push_temporary(ptr_ty);
            builder.alloca_at_entry(addr, op);
            self.symtab.arena_mut().set_addr(op, addr);

            if is_const {
                match d.init.as_ref().map(|init| fold::fold(init, &self.symtab)) {
                    Some(Ok(v)) => self.symtab.arena_mut().set_init_val(op, v),
                    Some(Err(fold::FoldError::DivisionByZero)) => {
                        let loc = d.init.as_ref().unwrap().location;
                        self.diags.push(loc, ErrorKind::DivisionByZero);
                    }
                    Some(Err(fold::FoldError::NotConstant)) | None => {
                        self.diags.push(d.location, ErrorKind::NonConstantInitializer);
                    }
                }
            }

            if let Some(init) = &d.init {
                let v = self.lower_expr_value(builder, init);
                let (vop, vty) = self.require_value(v, "initializer", init.location);
                let vop = self.maybe_widen(builder, vop, &vty, &ty, init.location, "initializer");
                builder.emit(Instruction::Store { ptr: addr, src: vop });
            }
        }
    }

    fn lower_assign(&mut self, builder: &mut Builder<'_>, target: &ast::Expr, value: &ast::Expr) {
        let ExprKind::Ident(name) = &target.kind else {
            self.diags.push(target.location, ErrorKind::InvalidLValue);
            let _ = self.lower_expr_value(builder, value);
            return;
        };
        let Some(op) = self.symtab.lookup(name) else {
            self.diags
                .push(target.location, ErrorKind::UndeclaredIdentifier(name.clone()));
            let _ = self.lower_expr_value(builder, value);
            return;
        };
        let entry = self.symtab.arena().get(op).clone();
        let (ty, addr) = match entry {
            SymbolEntry::Identifier { ty, addr: Some(addr), .. } => (ty, addr),
            SymbolEntry::Identifier { .. } => {
                // No runtime address: a global, or a folded local const.
                self.diags.push(target.location, ErrorKind::InvalidLValue);
                let _ = self.lower_expr_value(builder, value);
                return;
            }
            other => unreachable!("lookup(\"{name}\") resolved to a non-identifier entry: {other:?}"),
        };

        let v = self.lower_expr_value(builder, value);
        let (vop, vty) = self.require_value(v, "assignment", value.location);
        let vop = self.maybe_widen(builder, vop, &vty, &ty, value.location, "assignment");
        builder.emit(Instruction::Store { ptr: addr, src: vop });
    }

    fn lower_if(&mut self, builder: &mut Builder<'_>, cond: &ast::Expr, then_branch: &ast::Block) {
        let then_bb = builder.create_block();
        let end_bb = builder.create_block();
        let cr = self.lower_condition(builder, cond);
        builder.backpatch_list(cr.true_list, then_bb);
        builder.backpatch_list(cr.false_list, end_bb);
        builder.switch_to_block(then_bb);
        self.lower_block(builder, then_branch);
        builder.terminate_uncond(end_bb);
        builder.switch_to_block(end_bb);
    }

    fn lower_if_else(
        &mut self,
        builder: &mut Builder<'_>,
        cond: &ast::Expr,
        then_branch: &ast::Block,
        else_branch: &ast::Block,
    ) {
        let then_bb = builder.create_block();
        let else_bb = builder.create_block();
        let end_bb = builder.create_block();
        let cr = self.lower_condition(builder, cond);
        builder.backpatch_list(cr.true_list, then_bb);
        builder.backpatch_list(cr.false_list, else_bb);

        builder.switch_to_block(then_bb);
        self.lower_block(builder, then_branch);
        builder.terminate_uncond(end_bb);

        builder.switch_to_block(else_bb);
        self.lower_block(builder, else_branch);
        builder.terminate_uncond(end_bb);

        builder.switch_to_block(end_bb);
    }

    fn lower_while(&mut self, builder: &mut Builder<'_>, cond: &ast::Expr, body: &ast::Block) {
        let cond_bb = builder.create_block();
        let body_bb = builder.create_block();
        let end_bb = builder.create_block();

        builder.terminate_uncond(cond_bb);
        builder.switch_to_block(cond_bb);
        let cr = self.lower_condition(builder, cond);
        builder.backpatch_list(cr.true_list, body_bb);
        builder.backpatch_list(cr.false_list, end_bb);

        builder.switch_to_block(body_bb);
        self.loop_stack.push(LoopCtx { cond_bb, end_bb });
        self.lower_block(builder, body);
        self.loop_stack.pop();
        builder.terminate_uncond(cond_bb);

        builder.switch_to_block(end_bb);
    }

    fn lower_break(&mut self, builder: &mut Builder<'_>, loc: Location) {
        match self.loop_stack.last().copied() {
            Some(ctx) => {
                builder.terminate_uncond(ctx.end_bb);
                let fresh = builder.create_block();
                builder.switch_to_block(fresh);
            }
            None => self.diags.push(loc, ErrorKind::BreakOutsideLoop),
        }
    }

    fn lower_continue(&mut self, builder: &mut Builder<'_>, loc: Location) {
        match self.loop_stack.last().copied() {
            Some(ctx) => {
                builder.terminate_uncond(ctx.cond_bb);
                let fresh = builder.create_block();
                builder.switch_to_block(fresh);
            }
            None => self.diags.push(loc, ErrorKind::ContinueOutsideLoop),
        }
    }

    fn lower_return(&mut self, builder: &mut Builder<'_>, value: Option<&ast::Expr>, loc: Location) {
        let ret_ty = self
            .current_ret_ty
            .clone()
            .expect("return statement lowered outside a function body");
        match value {
            Some(e) => {
                let v = self.lower_expr_value(builder, e);
                let (vop, vty) = self.require_value(v, "return value", e.location);
                if ret_ty.is_void() {
                    self.diags.push(loc, ErrorKind::ReturnTypeMismatch);
                    builder.emit(Instruction::Ret { value: None });
                } else {
                    let vop = self.maybe_widen(builder, vop, &vty, &ret_ty, e.location, "return value");
                    builder.emit(Instruction::Ret { value: Some(vop) });
                }
            }
            None => {
                if !ret_ty.is_void() {
                    self.diags.push(loc, ErrorKind::ReturnTypeMismatch);
                }
                builder.emit(Instruction::Ret { value: None });
            }
        }
        let fresh = builder.create_block();
        builder.switch_to_block(fresh);
    }

    // ---- expressions: branch context -----------------------------------

    fn lower_condition(&mut self, builder: &mut Builder<'_>, expr: &ast::Expr) -> BranchResult {
        match &expr.kind {
            ExprKind::Binary(BinOp::And, lhs, rhs) => {
                let left = self.lower_condition(builder, lhs);
                let true_bb = builder.create_block();
                builder.backpatch_list(left.true_list, true_bb);
                builder.switch_to_block(true_bb);
                let right = self.lower_condition(builder, rhs);
                BranchResult {
                    true_list: right.true_list,
                    false_list: merge(left.false_list, right.false_list),
                }
            }
            ExprKind::Binary(BinOp::Or, lhs, rhs) => {
                let left = self.lower_condition(builder, lhs);
                let false_bb = builder.create_block();
                builder.backpatch_list(left.false_list, false_bb);
                builder.switch_to_block(false_bb);
                let right = self.lower_condition(builder, rhs);
                BranchResult {
                    true_list: merge(left.true_list, right.true_list),
                    false_list: right.false_list,
                }
            }
            ExprKind::Unary(UnaryOp::Not, inner) => {
                let mut r = self.lower_condition(builder, inner);
                std::mem::swap(&mut r.true_list, &mut r.false_list);
                r
            }
            // Negation doesn't change truthiness in branch
            // context, so its lists pass through unchanged.
            ExprKind::Unary(UnaryOp::Neg, inner) => self.lower_condition(builder, inner),
            ExprKind::Binary(op, lhs, rhs) if is_cmp_op(*op) => {
                let dst = self.lower_comparison(builder, *op, lhs, rhs, expr.location);
                let (t, f) = builder.emit_cond_br(dst);
                BranchResult {
                    true_list: vec![t],
                    false_list: vec![f],
                }
            }
            _ => {
                let v = self.lower_expr_value(builder, expr);
                let (op, ty) = self.require_value(v, "condition", expr.location);
                let i1op = self.coerce_value_to_i1(builder, op, ty);
                let (t, f) = builder.emit_cond_br(i1op);
                BranchResult {
                    true_list: vec![t],
                    false_list: vec![f],
                }
            }
        }
    }

    // ---- expressions: value context -----------------------------------

    fn lower_expr_value(&mut self, builder: &mut Builder<'_>, expr: &ast::Expr) -> ValueResult {
        match &expr.kind {
            ExprKind::IntLit(v) => {
                let ty = self.types.i32();
                let op = self.symtab.arena_mut().push_constant(ty.clone(), *v);
                ValueResult { operand: Some(op), ty }
            }
            ExprKind::Ident(name) => self.read_identifier(builder, name, expr.location),
            ExprKind::Call(name, args) => self.lower_call(builder, name, args, expr.location),
            ExprKind::Unary(UnaryOp::Neg, inner) => {
                let v = self.lower_expr_value(builder, inner);
                let (op, ty) = self.require_value(v, "unary `-` operand", expr.location);
                let i32_ = self.types.i32();
                let op = if ty.can_widen_to(&i32_) {
                    self.widen(builder, op, &i32_)
                } else {
                    op
                };
                let zero = self.symtab.arena_mut().push_constant(i32_.clone(), 0);
                let dst = self.symtab.arena_mut().push_temporary(i32_.clone());
                builder.emit(Instruction::Binary {
                    op: IrBinaryOp::Sub,
                    dst,
                    lhs: zero,
                    rhs: op,
                });
                ValueResult {
                    operand: Some(dst),
                    ty: i32_,
                }
            }
            ExprKind::Unary(UnaryOp::Not, inner) => {
                let v = self.lower_expr_value(builder, inner);
                let (op, ty) = self.require_value(v, "unary `!` operand", expr.location);
                let i1op = self.coerce_value_to_i1(builder, op, ty);
                let i1 = self.types.i1();
                let one = self.symtab.arena_mut().push_constant(i1.clone(), 1);
                let dst = self.symtab.arena_mut().push_temporary(i1.clone());
                builder.emit(Instruction::Binary {
                    op: IrBinaryOp::Xor,
                    dst,
                    lhs: i1op,
                    rhs: one,
                });
                ValueResult {
                    operand: Some(dst),
                    ty: i1,
                }
            }
            ExprKind::Binary(BinOp::And, ..) | ExprKind::Binary(BinOp::Or, ..) => {
                self.materialize_branch_value(builder, expr)
            }
            ExprKind::Binary(op, lhs, rhs) if is_cmp_op(*op) => {
                let dst = self.lower_comparison(builder, *op, lhs, rhs, expr.location);
                ValueResult {
                    operand: Some(dst),
                    ty: self.types.i1(),
                }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let lv = self.lower_expr_value(builder, lhs);
                let rv = self.lower_expr_value(builder, rhs);
                let (lop, lty) = self.require_value(lv, "binary operand", expr.location);
                let (rop, rty) = self.require_value(rv, "binary operand", expr.location);
                let (l2, r2, ty) = self.widen_common(builder, (lop, lty), (rop, rty), "binary operand", expr.location);
                let dst = self.symtab.arena_mut().push_temporary(ty.clone());
                builder.emit(Instruction::Binary {
                    op: to_binary_op(*op),
                    dst,
                    lhs: l2,
                    rhs: r2,
                });
                ValueResult { operand: Some(dst), ty }
            }
        }
    }

    /// Shared by both the branch-context and value-context comparison
    /// lowering: always emits a `Cmp`; only the caller decides whether
    /// to additionally emit a `CondBr`.
    fn lower_comparison(
        &mut self,
        builder: &mut Builder<'_>,
        op: BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        loc: Location,
    ) -> Operand {
        let lv = self.lower_expr_value(builder, lhs);
        let rv = self.lower_expr_value(builder, rhs);
        let (lop, lty) = self.require_value(lv, "comparison operand", loc);
        let (rop, rty) = self.require_value(rv, "comparison operand", loc);
        let (l2, r2, _) = self.widen_common(builder, (lop, lty), (rop, rty), "comparison", loc);
        let i1 = self.types.i1();
        let dst = self.symtab.arena_mut().push_temporary(i1);
        builder.emit(Instruction::Cmp {
            op: to_cmp_op(op),
            dst,
            lhs: l2,
            rhs: r2,
        });
        dst
    }

    fn read_identifier(&mut self, builder: &mut Builder<'_>, name: &str, loc: Location) -> ValueResult {
        let Some(op) = self.symtab.lookup(name) else {
            self.diags.push(loc, ErrorKind::UndeclaredIdentifier(name.to_string()));
            return self.poison_value();
        };
        let entry = self.symtab.arena().get(op).clone();
        let (ty, addr, init_val) = match entry {
            SymbolEntry::Identifier { ty, addr, init_val, .. } => (ty, addr, init_val),
            other => unreachable!("lookup(\"{name}\") resolved to a non-identifier entry: {other:?}"),
        };
        if ty.is_function() {
            self.diags.push(
                loc,
                ErrorKind::TypeMismatch {
                    site: format!("use of `{name}`"),
                    got: ty.to_string(),
                    expected: "value".into(),
                },
            );
            return self.poison_value();
        }
        if let Some(addr) = addr {
            let dst = self.symtab.arena_mut().push_temporary(ty.clone());
            builder.emit(Instruction::Load { dst, ptr: addr });
            ValueResult { operand: Some(dst), ty }
        } else if let Some(v) = init_val {
            let c = self.symtab.arena_mut().push_constant(ty.clone(), v);
            ValueResult { operand: Some(c), ty }
        } else {
            // An unfoldable global already reported at its declaration site.
            self.poison_value()
        }
    }

    fn lower_call(&mut self, builder: &mut Builder<'_>, name: &str, args: &[ast::Expr], loc: Location) -> ValueResult {
        let Some(op) = self.symtab.lookup(name) else {
            self.diags.push(loc, ErrorKind::UndeclaredIdentifier(name.to_string()));
            return self.poison_value();
        };
        let entry = self.symtab.arena().get(op).clone();
        let ty = entry.ty().clone();
        if !ty.is_function() {
            self.diags.push(
                loc,
                ErrorKind::TypeMismatch {
                    site: format!("call to `{name}`"),
                    got: ty.to_string(),
                    expected: "function".into(),
                },
            );
            return self.poison_value();
        }
        let ret_ty = ty.fn_ret().unwrap().clone();
        let param_tys = ty.fn_params().unwrap().to_vec();

        if args.len() != param_tys.len() {
            self.diags.push(
                loc,
                ErrorKind::TypeMismatch {
                    site: format!("call to `{name}`"),
                    got: format!("{} argument(s)", args.len()),
                    expected: format!("{} argument(s)", param_tys.len()),
                },
            );
        }

        // Call argument lists are almost always small and fixed-arity;
        // avoid a heap allocation for the common case.
        let mut arg_ops: SmallVec<[Operand; 4]> = SmallVec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let v = self.lower_expr_value(builder, arg);
            let (aop, aty) = self.require_value(v, "call argument", arg.location);
            let aop = match param_tys.get(i) {
                Some(pty) => self.maybe_widen(builder, aop, &aty, pty, arg.location, &format!("argument {} to `{name}`", i + 1)),
                None => aop,
            };
            arg_ops.push(aop);
        }
        let arg_ops = arg_ops.into_vec();

        if ret_ty.is_void() {
            builder.emit(Instruction::Call {
                dst: None,
                callee: op,
                args: arg_ops,
            });
            ValueResult { operand: None, ty: ret_ty }
        } else {
            let dst = self.symtab.arena_mut().push_temporary(ret_ty.clone());
            builder.emit(Instruction::Call {
                dst: Some(dst),
                callee: op,
                args: arg_ops,
            });
            ValueResult {
                operand: Some(dst),
                ty: ret_ty,
            }
        }
    }

    /// The diamond that materializes a `&&`/`||` expression as a plain
    /// `i1` value: lower it in branch context, then store `1`/`0` into a
    /// hidden local slot on each arm and load it back at the join. This
    /// stands in for an SSA φ-node, which is out of scope here.
    fn materialize_branch_value(&mut self, builder: &mut Builder<'_>, expr: &ast::Expr) -> ValueResult {
        let i1 = self.types.i1();
        let slot_sym = self.symtab.arena_mut().push_temporary(i1.clone());
        let ptr_ty = self.types.ptr_type(i1.clone());
        let addr = self.symtab.arena_mut().push_temporary(ptr_ty);
        builder.alloca_at_entry(addr, slot_sym);

        let true_bb = builder.create_block();
        let false_bb = builder.create_block();
        let join_bb = builder.create_block();

        let cr = self.lower_condition(builder, expr);
        builder.backpatch_list(cr.true_list, true_bb);
        builder.backpatch_list(cr.false_list, false_bb);

        builder.switch_to_block(true_bb);
        let one = self.symtab.arena_mut().push_constant(i1.clone(), 1);
        builder.emit(Instruction::Store { ptr: addr, src: one });
        builder.terminate_uncond(join_bb);

        builder.switch_to_block(false_bb);
        let zero = self.symtab.arena_mut().push_constant(i1.clone(), 0);
        builder.emit(Instruction::Store { ptr: addr, src: zero });
        builder.terminate_uncond(join_bb);

        builder.switch_to_block(join_bb);
        let dst = self.symtab.arena_mut().push_temporary(i1.clone());
        builder.emit(Instruction::Load { dst, ptr: addr });
        ValueResult {
            operand: Some(dst),
            ty: i1,
        }
    }

    // ---- shared helpers -------------------------------------------------

    fn require_value(&mut self, vr: ValueResult, site: &str, loc: Location) -> (Operand, Type) {
        match vr.operand {
            Some(op) => (op, vr.ty),
            None => {
                self.diags.push(
                    loc,
                    ErrorKind::TypeMismatch {
                        site: site.into(),
                        got: "void".into(),
                        expected: "value".into(),
                    },
                );
                let ty = self.types.i32();
                (self.poison_operand(), ty)
            }
        }
    }

    fn poison_operand(&mut self) -> Operand {
        let ty = self.types.i32();
        self.symtab.arena_mut().push_constant(ty, 0)
    }

    fn poison_value(&mut self) -> ValueResult {
        let ty = self.types.i32();
        ValueResult {
            operand: Some(self.poison_operand()),
            ty,
        }
    }

    fn widen(&mut self, builder: &mut Builder<'_>, op: Operand, target: &Type) -> Operand {
        let dst = self.symtab.arena_mut().push_temporary(target.clone());
        builder.emit(Instruction::Ext { dst, src: op });
        dst
    }

    /// Widen the narrower of `lhs`/`rhs` to the other's type; reports a
    /// `TypeMismatch` (and returns the operands unchanged) if neither
    /// side can widen to the other.
    fn widen_common(
        &mut self,
        builder: &mut Builder<'_>,
        lhs: (Operand, Type),
        rhs: (Operand, Type),
        site: &str,
        loc: Location,
    ) -> (Operand, Operand, Type) {
        let (lop, lty) = lhs;
        let (rop, rty) = rhs;
        if lty == rty {
            return (lop, rop, lty);
        }
        if lty.can_widen_to(&rty) {
            let lop = self.widen(builder, lop, &rty);
            return (lop, rop, rty);
        }
        if rty.can_widen_to(&lty) {
            let rop = self.widen(builder, rop, &lty);
            return (lop, rop, lty);
        }
        self.diags.push(
            loc,
            ErrorKind::TypeMismatch {
                site: site.into(),
                got: rty.to_string(),
                expected: lty.to_string(),
            },
        );
        (lop, rop, lty)
    }

    fn maybe_widen(
        &mut self,
        builder: &mut Builder<'_>,
        op: Operand,
        from: &Type,
        to: &Type,
        loc: Location,
        site: &str,
    ) -> Operand {
        if from == to {
            return op;
        }
        if from.can_widen_to(to) {
            return self.widen(builder, op, to);
        }
        self.diags.push(
            loc,
            ErrorKind::TypeMismatch {
                site: site.into(),
                got: from.to_string(),
                expected: to.to_string(),
            },
        );
        op
    }

    fn coerce_value_to_i1(&mut self, builder: &mut Builder<'_>, op: Operand, ty: Type) -> Operand {
        if ty.is_i1() {
            return op;
        }
        let i32_ = self.types.i32();
        let op = if ty.can_widen_to(&i32_) {
            self.widen(builder, op, &i32_)
        } else {
            op
        };
        let zero = self.symtab.arena_mut().push_constant(i32_, 0);
        let i1 = self.types.i1();
        let dst = self.symtab.arena_mut().push_temporary(i1);
        builder.emit(Instruction::Cmp {
            op: CmpOp::Ne,
            dst,
            lhs: op,
            rhs: zero,
        });
        dst
    }
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_cmp_op(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
    )
}

fn to_cmp_op(op: BinOp) -> CmpOp {
    match op {
        BinOp::Lt => CmpOp::Lt,
        BinOp::Le => CmpOp::Le,
        BinOp::Gt => CmpOp::Gt,
        BinOp::Ge => CmpOp::Ge,
        BinOp::Eq => CmpOp::Eq,
        BinOp::Ne => CmpOp::Ne,
        other => unreachable!("{other:?} is not a comparison operator"),
    }
}

fn to_binary_op(op: BinOp) -> IrBinaryOp {
    match op {
        BinOp::Add => IrBinaryOp::Add,
        BinOp::Sub => IrBinaryOp::Sub,
        BinOp::Mul => IrBinaryOp::Mul,
        BinOp::Div => IrBinaryOp::Div,
        BinOp::Mod => IrBinaryOp::Mod,
        other => unreachable!("{other:?} is not an arithmetic operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lower, LowerOptions};
    use minisysy_ir::instruction::Instruction;

    fn loc() -> Location {
        Location::default()
    }

    fn int_lit(v: i64) -> ast::Expr {
        ast::Expr {
            kind: ExprKind::IntLit(v),
            location: loc(),
        }
    }

    fn ident(name: &str) -> ast::Expr {
        ast::Expr {
            kind: ExprKind::Ident(name.into()),
            location: loc(),
        }
    }

    fn bin(op: BinOp, l: ast::Expr, r: ast::Expr) -> ast::Expr {
        ast::Expr {
            kind: ExprKind::Binary(op, Box::new(l), Box::new(r)),
            location: loc(),
        }
    }

    fn call(name: &str, args: Vec<ast::Expr>) -> ast::Expr {
        ast::Expr {
            kind: ExprKind::Call(name.into(), args),
            location: loc(),
        }
    }

    fn stmt(kind: StmtKind) -> ast::Stmt {
        ast::Stmt { kind, location: loc() }
    }

    fn block(stmts: Vec<ast::Stmt>) -> ast::Block {
        ast::Block { stmts }
    }

    fn func(name: &str, ret_ty: RetType, params: &[&str], body: ast::Block) -> ast::FuncDef {
        ast::FuncDef {
            name: name.into(),
            ret_ty,
            params: params
                .iter()
                .map(|p| ast::Param {
                    name: (*p).into(),
                    location: loc(),
                })
                .collect(),
            body,
            location: loc(),
        }
    }

    fn program(items: Vec<ast::Item>) -> ast::Program {
        ast::Program { items }
    }

    fn lower_ok(p: &ast::Program) -> Module {
        lower(p, LowerOptions::default()).expect("lowering should succeed")
    }

    /// `int main(){ return 0; }`
    #[test]
    fn scenario_return_literal() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![stmt(StmtKind::Return(Some(int_lit(0))))]),
        ))]);
        let m = lower_ok(&p);
        let f = m.function("main").unwrap();
        assert_eq!(f.blocks.len(), 1);
        let entry = f.block(f.entry);
        assert_eq!(entry.instructions.len(), 1);
        assert!(matches!(
            entry.instructions[0],
            Instruction::Ret { value: Some(_) }
        ));
    }

    /// `int main(){ int x = 3; return x + 2; }`
    #[test]
    fn scenario_local_decl_and_arithmetic() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::LocalDecl {
                    is_const: false,
                    decls: vec![ast::Declarator {
                        name: "x".into(),
                        init: Some(int_lit(3)),
                        location: loc(),
                    }],
                }),
                stmt(StmtKind::Return(Some(bin(BinOp::Add, ident("x"), int_lit(2))))),
            ]),
        ))]);
        let m = lower_ok(&p);
        let f = m.function("main").unwrap();
        let entry = f.block(f.entry);
        let kinds: Vec<&str> = entry
            .instructions
            .iter()
            .map(|i| match i {
                Instruction::Alloca { .. } => "alloca",
                Instruction::Store { .. } => "store",
                Instruction::Load { .. } => "load",
                Instruction::Binary { .. } => "add",
                Instruction::Ret { .. } => "ret",
                other => panic!("unexpected instruction {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec!["alloca", "store", "load", "add", "ret"]);
    }

    /// `int main(){ if (1 && 0) return 1; return 0; }`
    #[test]
    fn scenario_if_with_short_circuit_and() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::If {
                    cond: bin(BinOp::And, int_lit(1), int_lit(0)),
                    then_branch: block(vec![stmt(StmtKind::Return(Some(int_lit(1))))]),
                    else_branch: None,
                }),
                stmt(StmtKind::Return(Some(int_lit(0)))),
            ]),
        ))]);
        let m = lower_ok(&p);
        let f = m.function("main").unwrap();
        // entry, trueBB (rhs of &&), then_bb, end_bb, plus the unreachable
        // block opened after each `return`.
        assert!(f.blocks.len() >= 4);
        for (id, b) in f.blocks_in_order() {
            if !b.instructions.is_empty() {
                assert!(b.is_terminated(), "block {id} has no terminator");
            }
        }
        for (_, b) in f.blocks_in_order() {
            if let Some(Instruction::CondBr {
                true_target,
                false_target,
                ..
            }) = b.terminator()
            {
                assert!(true_target.is_some() && false_target.is_some());
            }
        }
    }

    /// `int main(){ int i=0; while (i<10){ i=i+1; } return i; }`
    #[test]
    fn scenario_while_loop_cfg_shape() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::LocalDecl {
                    is_const: false,
                    decls: vec![ast::Declarator {
                        name: "i".into(),
                        init: Some(int_lit(0)),
                        location: loc(),
                    }],
                }),
                stmt(StmtKind::While {
                    cond: bin(BinOp::Lt, ident("i"), int_lit(10)),
                    body: block(vec![stmt(StmtKind::Assign {
                        target: ident("i"),
                        value: bin(BinOp::Add, ident("i"), int_lit(1)),
                    })]),
                }),
                stmt(StmtKind::Return(Some(ident("i")))),
            ]),
        ))]);
        let m = lower_ok(&p);
        let f = m.function("main").unwrap();
        // entry -> cond, cond -> body / end, body -> cond.
        let entry = f.block(f.entry);
        assert!(matches!(entry.terminator(), Some(Instruction::UncondBr { .. })));
        assert_eq!(entry.succs.len(), 1);
        let cond_bb = entry.succs[0];
        let cond = f.block(cond_bb);
        assert_eq!(cond.succs.len(), 2);
        let body_bb = cond.succs[0];
        let body = f.block(body_bb);
        assert!(body.succs.contains(&cond_bb), "body must branch back to cond");
    }

    /// `int main(){ int i=0; while(1){ if(i==5) break; i=i+1; } return i; }`
    #[test]
    fn scenario_break_targets_loop_end_directly() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::LocalDecl {
                    is_const: false,
                    decls: vec![ast::Declarator {
                        name: "i".into(),
                        init: Some(int_lit(0)),
                        location: loc(),
                    }],
                }),
                stmt(StmtKind::While {
                    cond: int_lit(1),
                    body: block(vec![
                        stmt(StmtKind::If {
                            cond: bin(BinOp::Eq, ident("i"), int_lit(5)),
                            then_branch: block(vec![stmt(StmtKind::Break)]),
                            else_branch: None,
                        }),
                        stmt(StmtKind::Assign {
                            target: ident("i"),
                            value: bin(BinOp::Add, ident("i"), int_lit(1)),
                        }),
                    ]),
                }),
                stmt(StmtKind::Return(Some(ident("i")))),
            ]),
        ))]);
        let m = lower_ok(&p);
        let f = m.function("main").unwrap();
        for (id, b) in f.blocks_in_order() {
            if !b.instructions.is_empty() {
                assert!(b.is_terminated(), "block {id} has no terminator");
            }
        }
    }

    /// `const int N = 2 + 3 * 4;` at global scope.
    #[test]
    fn scenario_global_const_folds_without_ir() {
        let p = program(vec![ast::Item::Global(ast::GlobalDecl {
            is_const: true,
            decls: vec![ast::Declarator {
                name: "N".into(),
                init: Some(bin(BinOp::Add, int_lit(2), bin(BinOp::Mul, int_lit(3), int_lit(4)))),
                location: loc(),
            }],
            location: loc(),
        })]);
        let m = lower_ok(&p);
        assert_eq!(m.globals.len(), 1);
        let op = m.globals[0];
        assert_eq!(m.symtab.arena().init_val_of(op), Some(14));
    }

    #[test]
    fn negative_assignment_to_literal_is_invalid_lvalue() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::Assign {
                    target: int_lit(1),
                    value: int_lit(2),
                }),
                stmt(StmtKind::Return(Some(int_lit(0)))),
            ]),
        ))]);
        let errs = lower(&p, LowerOptions::default()).unwrap_err();
        assert!(matches!(errs[0].kind, ErrorKind::InvalidLValue));
    }

    #[test]
    fn negative_break_outside_loop() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![stmt(StmtKind::Break), stmt(StmtKind::Return(Some(int_lit(0))))]),
        ))]);
        let errs = lower(&p, LowerOptions::default()).unwrap_err();
        assert!(matches!(errs[0].kind, ErrorKind::BreakOutsideLoop));
    }

    #[test]
    fn negative_global_division_by_zero() {
        let p = program(vec![ast::Item::Global(ast::GlobalDecl {
            is_const: false,
            decls: vec![ast::Declarator {
                name: "x".into(),
                init: Some(bin(BinOp::Div, int_lit(1), int_lit(0))),
                location: loc(),
            }],
            location: loc(),
        })]);
        let errs = lower(&p, LowerOptions::default()).unwrap_err();
        assert!(matches!(errs[0].kind, ErrorKind::DivisionByZero));
    }

    #[test]
    fn negative_redeclaration_in_same_scope() {
        let p = program(vec![ast::Item::Func(func(
            "main",
            RetType::Int,
            &[],
            block(vec![
                stmt(StmtKind::LocalDecl {
                    is_const: false,
                    decls: vec![ast::Declarator {
                        name: "x".into(),
                        init: Some(int_lit(1)),
                        location: loc(),
                    }],
                }),
                stmt(StmtKind::LocalDecl {
                    is_const: false,
                    decls: vec![ast::Declarator {
                        name: "x".into(),
                        init: Some(int_lit(2)),
                        location: loc(),
                    }],
                }),
                stmt(StmtKind::Return(Some(int_lit(0)))),
            ]),
        ))]);
        let errs = lower(&p, LowerOptions::default()).unwrap_err();
        assert!(matches!(errs[0].kind, ErrorKind::Redeclaration(_)));
    }

    #[test]
    fn negative_condition_on_void_call_result() {
        let p = program(vec![
            ast::Item::Func(func("helper", RetType::Void, &[], block(vec![stmt(StmtKind::Return(None))]))),
            ast::Item::Func(func(
                "main",
                RetType::Int,
                &[],
                block(vec![
                    stmt(StmtKind::If {
                        cond: call("helper", vec![]),
                        then_branch: block(vec![stmt(StmtKind::Return(Some(int_lit(1))))]),
                        else_branch: None,
                    }),
                    stmt(StmtKind::Return(Some(int_lit(0)))),
                ]),
            )),
        ]);
        let errs = lower(&p, LowerOptions::default()).unwrap_err();
        assert!(matches!(errs[0].kind, ErrorKind::TypeMismatch { .. }));
    }
}
