use crate::bytecode::Opcode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single instruction operand.
///
/// Operands start out as raw integers and targets; the analysis pass may
/// rewrite an `Int` into a `Float`, `Str` or `Script` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Int(i64),
    Float(f32),
    Str(String),
    /// Position of a jump or call-group destination.
    Target(u32),
    /// Symbolic reference to a script, by name.
    Script(String),
}

impl Param {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// Variable scope as encoded by the first parameter of variable opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Local,
    Global,
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    pub params: Vec<Param>,
    /// The instruction's result stays on the stack for a later consumer.
    pub push_bit: bool,
    /// Original byte position; stable key for jump targets.
    pub position: u32,
}

impl Instruction {
    pub fn new(op: Opcode, params: Vec<Param>, push_bit: bool, position: u32) -> Self {
        Self {
            op,
            params,
            push_bit,
            position,
        }
    }

    pub fn param_int(&self, index: usize) -> Option<i64> {
        self.params.get(index).and_then(Param::as_int)
    }

    /// Argument count embedded in printf, syscall and call opcodes.
    pub fn argc(&self) -> usize {
        self.param_int(0).map(|n| n.max(0) as usize).unwrap_or(0)
    }

    /// Destination position for jumps, branches, else markers and `try`.
    pub fn target(&self) -> Option<u32> {
        if !self.op.has_target() {
            return None;
        }
        match self.params.first() {
            Some(Param::Target(t)) => Some(*t),
            Some(Param::Int(n)) => u32::try_from(*n).ok(),
            _ => None,
        }
    }

    /// `(scope, slot)` for opcodes that address a variable.
    pub fn var_ref(&self) -> Option<(Scope, usize)> {
        if !self.op.is_var_access() {
            return None;
        }
        let scope = if self.param_int(0)? == 0 {
            Scope::Local
        } else {
            Scope::Global
        };
        let slot = usize::try_from(self.param_int(1)?).ok()?;
        Some((scope, slot))
    }

    /// Number of stack operands consumed.
    pub fn pops(&self) -> usize {
        use Opcode::*;
        match self.op {
            ReturnValue | ReturnValue8 => 1,

            AddI | SubI | MulI | DivI | ModI => 2,
            NegI => 1,
            BitAnd | BitOr | BitXor | Shl | Shr => 2,
            BitNot => 1,

            SetVar | AddAssignI | SubAssignI | MulAssignI | DivAssignI | ModAssignI
            | AndAssign | OrAssign | XorAssign => 1,

            EqI | NeI | LtI | LeI | GtI | GeI => 2,
            Not => 1,

            Printf | Syscall => self.argc(),
            CallFunc | SetMain | CallFunc3 => self.argc() + 1,

            Pop => 1,
            If | IfNot => 1,

            AddF | SubF | MulF | DivF => 2,
            NegF => 1,
            SetVarF | AddAssignF | SubAssignF | MulAssignF | DivAssignF => 1,
            EqF | NeF | LtF | LeF | GtF | GeF => 2,

            Nop | Begin | End | Jump | Jump5 | Return | Return9 | PushInt | PushVar
            | PushShort | IncI | DecI | Try | Push | Else | IntToFloat | FloatToInt | IncF
            | DecF | Unknown(_) => 0,
        }
    }

    /// Net stack effect: pushes minus pops.
    pub fn net_effect(&self) -> i64 {
        i64::from(self.push_bit) - self.pops() as i64
    }
}

/// A named script: one function of the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// `(start, end)` byte positions; `start` identifies the script.
    pub bounds: (u32, u32),
}

impl Script {
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>, bounds: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            instructions,
            bounds,
        }
    }

    pub fn start(&self) -> u32 {
        self.bounds.0
    }

    /// Index of the instruction at `position`.
    pub fn index_of(&self, position: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&position, |ins| ins.position)
            .ok()
            .or_else(|| self.instructions.iter().position(|ins| ins.position == position))
    }

    /// Every position targeted by a jump, branch, else marker or `try`.
    pub fn jump_targets(&self) -> BTreeSet<u32> {
        self.instructions.iter().filter_map(Instruction::target).collect()
    }
}

/// A whole decoded program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub scripts: Vec<Script>,
    /// String table referenced by printf format arguments.
    pub strings: Vec<String>,
    /// Start position of the entry-point script.
    pub entry_point: u32,
}

impl Program {
    pub fn script_index_at(&self, position: u32) -> Option<usize> {
        self.scripts.iter().position(|s| s.start() == position)
    }

    /// Rename the entry-point script to `main`.
    pub fn rename_entry_point(&mut self) {
        let entry = self.entry_point;
        if let Some(script) = self.scripts.iter_mut().find(|s| s.start() == entry) {
            script.name = "main".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(op: u8, params: Vec<Param>, push_bit: bool, position: u32) -> Instruction {
        Instruction::new(Opcode::from_byte(op), params, push_bit, position)
    }

    #[test]
    fn test_call_arity_includes_callee() {
        let call = ins(0x2F, vec![Param::Int(2)], true, 0x10);
        assert_eq!(call.pops(), 3);
        let sys = ins(0x2D, vec![Param::Int(2), Param::Int(0x29)], false, 0x10);
        assert_eq!(sys.pops(), 2);
    }

    #[test]
    fn test_net_effect() {
        let add = ins(0x0E, vec![], true, 0);
        assert_eq!(add.net_effect(), -1);
        let push = ins(0x0A, vec![Param::Int(1)], true, 0);
        assert_eq!(push.net_effect(), 1);
    }

    #[test]
    fn test_var_ref() {
        let global = ins(0x1C, vec![Param::Int(1), Param::Int(7)], false, 0);
        assert_eq!(global.var_ref(), Some((Scope::Global, 7)));
        let local = ins(0x0B, vec![Param::Int(0), Param::Int(2)], true, 0);
        assert_eq!(local.var_ref(), Some((Scope::Local, 2)));
        let add = ins(0x0E, vec![], true, 0);
        assert_eq!(add.var_ref(), None);
    }

    #[test]
    fn test_index_of_and_targets() {
        let script = Script::new(
            "f",
            vec![
                ins(0x02, vec![Param::Int(0), Param::Int(0)], false, 0x10),
                ins(0x04, vec![Param::Target(0x20)], false, 0x15),
                ins(0x07, vec![], false, 0x20),
            ],
            (0x10, 0x21),
        );
        assert_eq!(script.index_of(0x20), Some(2));
        assert_eq!(script.index_of(0x11), None);
        assert!(script.jump_targets().contains(&0x20));
    }

    #[test]
    fn test_rename_entry_point() {
        let mut program = Program {
            scripts: vec![
                Script::new("script_0", vec![], (0x10, 0x20)),
                Script::new("script_1", vec![], (0x20, 0x30)),
            ],
            strings: vec![],
            entry_point: 0x20,
        };
        program.rename_entry_point();
        assert_eq!(program.scripts[1].name, "main");
        assert_eq!(program.script_index_at(0x20), Some(1));
    }
}
