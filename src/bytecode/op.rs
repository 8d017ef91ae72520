use serde::{Deserialize, Serialize};

// =============================================================================
// OPCODE - MSC bytecode instructions
// =============================================================================

/// A single MSC opcode.
///
/// Parameter layout is fixed per opcode and documented on each variant.
/// Variable opcodes always carry `(scope, slot)` where scope `0` is local and
/// `1` is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    /// `(argc, varc)`
    Begin,
    End,

    // ==========================================================================
    // Jumps and returns
    // ==========================================================================
    /// `(target)`
    Jump,
    /// `(target)`, alternate encoding of `Jump`
    Jump5,
    /// Return the value on top of the stack.
    ReturnValue,
    /// Alternate encoding of `ReturnValue`.
    ReturnValue8,
    Return,
    /// Alternate encoding of `Return`.
    Return9,

    // literals & variables
    /// `(value)`
    PushInt,
    /// `(scope, slot)`
    PushVar,
    /// `(value)`, 16-bit literal
    PushShort,

    // integer arithmetic
    AddI,
    SubI,
    MulI,
    DivI,
    ModI,
    NegI,
    /// `(scope, slot)`
    IncI,
    /// `(scope, slot)`
    DecI,

    // bitwise
    BitAnd,
    BitOr,
    BitNot,
    BitXor,
    Shl,
    Shr,

    // integer assignment, all `(scope, slot)`
    SetVar,
    AddAssignI,
    SubAssignI,
    MulAssignI,
    DivAssignI,
    ModAssignI,
    AndAssign,
    OrAssign,
    XorAssign,

    // integer comparison
    EqI,
    NeI,
    LtI,
    LeI,
    GtI,
    GeI,
    Not,

    // ==========================================================================
    // Calls
    // ==========================================================================
    /// `(argc)`
    Printf,
    /// `(argc, id)`
    Syscall,
    /// `(end target)`, opens a call group closed by the instruction at `end`
    Try,
    /// `(argc)`, callee is pushed last
    CallFunc,
    /// `(argc)`
    SetMain,
    /// `(argc)`
    CallFunc3,

    /// Re-push the value produced by the previous instruction.
    Push,
    Pop,

    // ==========================================================================
    // Structured branches
    // ==========================================================================
    /// `(target)`, branch when the condition is false
    If,
    /// `(target)`, branch when the condition is true
    IfNot,
    /// `(target)`, skip over the false arm
    Else,

    /// `(results back)`
    IntToFloat,
    /// `(results back)`
    FloatToInt,

    // float arithmetic
    AddF,
    SubF,
    MulF,
    DivF,
    NegF,
    /// `(scope, slot)`
    IncF,
    /// `(scope, slot)`
    DecF,

    // float assignment, all `(scope, slot)`
    SetVarF,
    AddAssignF,
    SubAssignF,
    MulAssignF,
    DivAssignF,

    // float comparison
    EqF,
    NeF,
    LtF,
    LeF,
    GtF,
    GeF,

    /// Any byte outside the documented table.
    Unknown(u8),
}

/// Opcode family used by type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Int,
    Float,
    Neither,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Opcode {
        use Opcode::*;
        match byte {
            0x00 => Nop,
            0x02 => Begin,
            0x03 => End,
            0x04 => Jump,
            0x05 => Jump5,
            0x06 => ReturnValue,
            0x07 => Return,
            0x08 => ReturnValue8,
            0x09 => Return9,
            0x0A => PushInt,
            0x0B => PushVar,
            0x0D => PushShort,
            0x0E => AddI,
            0x0F => SubI,
            0x10 => MulI,
            0x11 => DivI,
            0x12 => ModI,
            0x13 => NegI,
            0x14 => IncI,
            0x15 => DecI,
            0x16 => BitAnd,
            0x17 => BitOr,
            0x18 => BitNot,
            0x19 => BitXor,
            0x1A => Shl,
            0x1B => Shr,
            0x1C => SetVar,
            0x1D => AddAssignI,
            0x1E => SubAssignI,
            0x1F => MulAssignI,
            0x20 => DivAssignI,
            0x21 => ModAssignI,
            0x22 => AndAssign,
            0x23 => OrAssign,
            0x24 => XorAssign,
            0x25 => EqI,
            0x26 => NeI,
            0x27 => LtI,
            0x28 => LeI,
            0x29 => GtI,
            0x2A => GeI,
            0x2B => Not,
            0x2C => Printf,
            0x2D => Syscall,
            0x2E => Try,
            0x2F => CallFunc,
            0x30 => SetMain,
            0x31 => CallFunc3,
            0x32 => Push,
            0x33 => Pop,
            0x34 => If,
            0x35 => IfNot,
            0x36 => Else,
            0x38 => IntToFloat,
            0x39 => FloatToInt,
            0x3A => AddF,
            0x3B => SubF,
            0x3C => MulF,
            0x3D => DivF,
            0x3E => NegF,
            0x3F => IncF,
            0x40 => DecF,
            0x41 => SetVarF,
            0x42 => AddAssignF,
            0x43 => SubAssignF,
            0x44 => MulAssignF,
            0x45 => DivAssignF,
            0x46 => EqF,
            0x47 => NeF,
            0x48 => LtF,
            0x49 => LeF,
            0x4A => GtF,
            0x4B => GeF,
            other => Unknown(other),
        }
    }

    pub fn byte(self) -> u8 {
        use Opcode::*;
        match self {
            Nop => 0x00,
            Begin => 0x02,
            End => 0x03,
            Jump => 0x04,
            Jump5 => 0x05,
            ReturnValue => 0x06,
            Return => 0x07,
            ReturnValue8 => 0x08,
            Return9 => 0x09,
            PushInt => 0x0A,
            PushVar => 0x0B,
            PushShort => 0x0D,
            AddI => 0x0E,
            SubI => 0x0F,
            MulI => 0x10,
            DivI => 0x11,
            ModI => 0x12,
            NegI => 0x13,
            IncI => 0x14,
            DecI => 0x15,
            BitAnd => 0x16,
            BitOr => 0x17,
            BitNot => 0x18,
            BitXor => 0x19,
            Shl => 0x1A,
            Shr => 0x1B,
            SetVar => 0x1C,
            AddAssignI => 0x1D,
            SubAssignI => 0x1E,
            MulAssignI => 0x1F,
            DivAssignI => 0x20,
            ModAssignI => 0x21,
            AndAssign => 0x22,
            OrAssign => 0x23,
            XorAssign => 0x24,
            EqI => 0x25,
            NeI => 0x26,
            LtI => 0x27,
            LeI => 0x28,
            GtI => 0x29,
            GeI => 0x2A,
            Not => 0x2B,
            Printf => 0x2C,
            Syscall => 0x2D,
            Try => 0x2E,
            CallFunc => 0x2F,
            SetMain => 0x30,
            CallFunc3 => 0x31,
            Push => 0x32,
            Pop => 0x33,
            If => 0x34,
            IfNot => 0x35,
            Else => 0x36,
            IntToFloat => 0x38,
            FloatToInt => 0x39,
            AddF => 0x3A,
            SubF => 0x3B,
            MulF => 0x3C,
            DivF => 0x3D,
            NegF => 0x3E,
            IncF => 0x3F,
            DecF => 0x40,
            SetVarF => 0x41,
            AddAssignF => 0x42,
            SubAssignF => 0x43,
            MulAssignF => 0x44,
            DivAssignF => 0x45,
            EqF => 0x46,
            NeF => 0x47,
            LtF => 0x48,
            LeF => 0x49,
            GtF => 0x4A,
            GeF => 0x4B,
            Unknown(b) => b,
        }
    }

    /// Mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Begin => "begin",
            End => "end",
            Jump => "jump",
            Jump5 => "jump5",
            ReturnValue => "return_6",
            Return => "return_7",
            ReturnValue8 => "return_8",
            Return9 => "return_9",
            PushInt => "pushInt",
            PushVar => "pushVar",
            PushShort => "pushShort",
            AddI => "addi",
            SubI => "subi",
            MulI => "multi",
            DivI => "divi",
            ModI => "modi",
            NegI => "negi",
            IncI => "i++",
            DecI => "i--",
            BitAnd => "bitAnd",
            BitOr => "bitOr",
            BitNot => "bitNot",
            BitXor => "bitXor",
            Shl => "leftShift",
            Shr => "rightShift",
            SetVar => "setVar",
            AddAssignI => "i+=",
            SubAssignI => "i-=",
            MulAssignI => "i*=",
            DivAssignI => "i/=",
            ModAssignI => "i%=",
            AndAssign => "i&=",
            OrAssign => "i|=",
            XorAssign => "i^=",
            EqI => "equals",
            NeI => "notEquals",
            LtI => "lessThan",
            LeI => "lessOrEqual",
            GtI => "greater",
            GeI => "greaterOrEqual",
            Not => "not",
            Printf => "printf",
            Syscall => "sys",
            Try => "try",
            CallFunc => "callFunc",
            SetMain => "callFunc2",
            CallFunc3 => "callFunc3",
            Push => "push",
            Pop => "pop",
            If => "if",
            IfNot => "ifNot",
            Else => "else",
            IntToFloat => "intToFloat",
            FloatToInt => "floatToInt",
            AddF => "addf",
            SubF => "subf",
            MulF => "multf",
            DivF => "divf",
            NegF => "negf",
            IncF => "f++",
            DecF => "f--",
            SetVarF => "floatVarSet",
            AddAssignF => "f+=",
            SubAssignF => "f-=",
            MulAssignF => "f*=",
            DivAssignF => "f/=",
            EqF => "floatEquals",
            NeF => "floatNotEquals",
            LtF => "floatLess",
            LeF => "floatLessOrEqual",
            GtF => "floatGreater",
            GeF => "floatGreaterOrEqual",
            Unknown(_) => "unk",
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Jump5)
    }

    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::If | Opcode::IfNot)
    }

    /// Instructions that redirect the cursor without a condition.
    pub fn is_unconditional(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Jump5 | Opcode::Else)
    }

    /// Instructions whose first parameter is a position inside the script.
    pub fn has_target(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::Jump5 | Opcode::Try | Opcode::If | Opcode::IfNot | Opcode::Else
        )
    }

    pub fn is_push_const(self) -> bool {
        matches!(self, Opcode::PushInt | Opcode::PushShort)
    }

    pub fn is_cast(self) -> bool {
        matches!(self, Opcode::IntToFloat | Opcode::FloatToInt)
    }

    pub fn is_call(self) -> bool {
        matches!(self, Opcode::CallFunc | Opcode::SetMain | Opcode::CallFunc3)
    }

    pub fn is_return_value(self) -> bool {
        matches!(self, Opcode::ReturnValue | Opcode::ReturnValue8)
    }

    /// Opcodes that name a variable by `(scope, slot)`.
    pub fn is_var_access(self) -> bool {
        self == Opcode::PushVar || self.var_family() != Family::Neither
    }

    /// Family of an opcode that writes or updates a variable slot directly.
    pub fn var_family(self) -> Family {
        use Opcode::*;
        match self {
            IncI | DecI | SetVar | AddAssignI | SubAssignI | MulAssignI | DivAssignI
            | ModAssignI | AndAssign | OrAssign | XorAssign => Family::Int,
            IncF | DecF | SetVarF | AddAssignF | SubAssignF | MulAssignF | DivAssignF => {
                Family::Float
            }
            _ => Family::Neither,
        }
    }

    /// Family of an opcode that consumes a stack value, used to type a value
    /// loaded through the generic `PushVar`.
    pub fn operand_family(self) -> Family {
        use Opcode::*;
        match self {
            AddI | SubI | MulI | DivI | ModI | NegI | AddAssignI | SubAssignI | MulAssignI
            | DivAssignI | ModAssignI | XorAssign | EqI | NeI | LtI | LeI | GtI | GeI => {
                Family::Int
            }
            AddF | SubF | MulF | DivF | NegF | SetVarF | AddAssignF | SubAssignF | MulAssignF
            | DivAssignF | EqF | NeF | LtF | LeF | GtF | GeF => Family::Float,
            _ => Family::Neither,
        }
    }

    /// Opcodes producing a boolean-flavored int.
    pub fn is_comparison(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            EqI | NeI | LtI | LeI | GtI | GeI | Not | EqF | NeF | LtF | LeF | GtF | GeF
        )
    }

    /// Integer-producing arithmetic, bitwise and assignment opcodes.
    pub fn is_int_arithmetic(self) -> bool {
        (0x0E..0x25).contains(&self.byte()) && !matches!(self, Opcode::Unknown(_))
    }

    /// Float-producing arithmetic and assignment opcodes.
    pub fn is_float_arithmetic(self) -> bool {
        (0x3A..0x42).contains(&self.byte()) && !matches!(self, Opcode::Unknown(_))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Opcode::Unknown(b) => write!(f, "unk_{:X}", b),
            other => write!(f, "{}", other.mnemonic()),
        }
    }
}
