//! Drives lowering of an [`ast::Program`] into a [`minisysy_ir::module::Module`].
//!
//! This crate owns no parser: `ast` is the contract a (separately
//! maintained) lexer/parser is assumed to populate, the way
//! `cranelift-frontend` is driven by a caller holding its own IR of
//! whatever source language it fronts.

pub mod ast;
pub mod fold;
mod lower;

pub use minisysy_ir::error::LowerError;
pub use minisysy_ir::module::Module;

/// Knobs for the lowering pass. Currently empty: the division-by-zero
/// question is resolved as a hard error unconditionally (see DESIGN.md),
/// leaving nothing here to configure yet. Kept as a struct (rather than
/// deleted) so adding a knob later isn't a breaking signature change.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowerOptions {}

/// Type-check and lower `program`, returning the finished module or the
/// full list of diagnostics collected along the way.
pub fn lower(program: &ast::Program, _opts: LowerOptions) -> Result<Module, Vec<LowerError>> {
    let mut lowerer = lower::Lowerer::new();
    lowerer.lower_program(program);
    lowerer.finish()
}
