//! # Decompiled source tree
//!
//! This module defines the C-like tree produced by reconstruction and the
//! printer that turns it into text.
//!
//! ## Conventions
//!
//! - Identifiers are plain names: `arg{i}`, `var{i}`, `global{n}`, function
//!   names, or names taken from a symbol table.
//! - Integer literals print as hexadecimal except zero; floats carry `f`.

pub mod node;
pub mod precedence;
pub mod printer;
pub mod program;
pub mod value;

pub use node::{AssignOp, BinaryOp, Node, UnaryOp};
pub use printer::{render_expr, render_source, render_split, SourcePrinter};
pub use program::{Decl, FuncDef, SourceFile, ValueType};
pub use value::Value;
