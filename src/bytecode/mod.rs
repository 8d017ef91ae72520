pub mod container;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod stack_check;

pub use ir::{Instruction, Param, Program, Scope, Script};
pub use op::{Family, Opcode};
