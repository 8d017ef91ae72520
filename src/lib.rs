//! Decompiler for MSC stack bytecode.
//!
//! A decoded [`Program`](bytecode::Program) goes through reference analysis,
//! control-flow structuring, backward tree reconstruction and type inference,
//! and comes out as C-like source text.

pub mod bytecode;
pub mod config;
pub mod decompile;
pub mod lang;
pub mod symbols;

pub use config::DecompilerConfig;
pub use decompile::{decompile_program, Decompilation, DecompileError};
pub use symbols::SymbolTable;
