use super::program::{Decl, ValueType};
use super::value::Value;

/// Binary operator of the output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

/// Unary operator of the output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
    Not,
    /// Pointer dereference, used for calls through a variable.
    Deref,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
            UnaryOp::Deref => "*",
            UnaryOp::PostInc => "++",
            UnaryOp::PostDec => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }
}

/// Assignment operator, plain or compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
        }
    }
}

/// Node of the decompiled syntax tree.
///
/// Identifiers refer to declarations by name only. A statement sequence is a
/// plain `Vec<Node>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // ───────────────────────────── Expressions ──────────────────────────
    /// Literal constant.
    Literal(Value),

    /// Reference to a variable or function by name.
    Id(String),

    /// `lhs op rhs`
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },

    /// Prefix or postfix operator applied to one operand.
    Unary { op: UnaryOp, operand: Box<Node> },

    /// `cond ? then : otherwise`
    Ternary {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },

    /// `target op value`
    Assign {
        op: AssignOp,
        target: Box<Node>,
        value: Box<Node>,
    },

    /// `(ty)expr`
    Cast { ty: ValueType, expr: Box<Node> },

    /// `callee(args...)`
    Call { callee: Box<Node>, args: Vec<Node> },

    /// `base.member`
    Member { base: Box<Node>, member: String },

    // ───────────────────────────── Statements ───────────────────────────
    /// Variable declaration.
    Decl(Decl),

    If {
        cond: Box<Node>,
        then: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },

    /// Pre-test loop.
    While { cond: Box<Node>, body: Vec<Node> },

    /// Post-test loop.
    DoWhile { cond: Box<Node>, body: Vec<Node> },

    Return(Option<Box<Node>>),
    Break,
    Continue,

    /// Goto target.
    Label(String),
    Goto(String),

    /// Free-form comment, also used as the body of a script that failed.
    Comment(String),
}

impl Node {
    pub fn id(name: impl Into<String>) -> Node {
        Node::Id(name.into())
    }

    pub fn int(n: i64) -> Node {
        Node::Literal(Value::Integer(n))
    }

    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: Node) -> Node {
        Node::unary(UnaryOp::Not, operand)
    }

    pub fn ternary(cond: Node, then: Node, otherwise: Node) -> Node {
        Node::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn call(callee: Node, args: Vec<Node>) -> Node {
        Node::Call {
            callee: Box::new(callee),
            args,
        }
    }
}
