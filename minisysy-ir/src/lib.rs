//! The IR model and builder for a small SysY-like language: an interned
//! type system, a scoped symbol table, SSA-style instructions over
//! basic blocks, and a cursor for emitting them with backpatchable
//! branches.
//!
//! This crate has no notion of source syntax; [`crate::builder::Builder`]
//! is driven by a separate lowering pass (see the `minisysy-lower` crate)
//! the way `cranelift-frontend`'s `FunctionBuilder` drives
//! `cranelift-codegen`'s `ir::Function`.

pub mod block;
pub mod builder;
pub mod entity;
pub mod error;
pub mod flowgraph;
pub mod function;
pub mod instruction;
pub mod module;
pub mod symbol;
pub mod symtab;
pub mod types;
