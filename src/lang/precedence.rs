//! Operator precedence of the output language.

use super::node::{BinaryOp, Node};

/// Binding strength, loosest first. Mirrors C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// `=` and compound assignment
    Assign,
    /// `? :`
    Conditional,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    /// `==`, `!=`
    Equality,
    /// `<`, `<=`, `>`, `>=`
    Relational,
    Shift,
    Additive,
    Multiplicative,
    /// Unary prefix operators and casts
    Prefix,
    /// Postfix `++`/`--`, calls and member access
    Postfix,
    /// Literals, identifiers, parenthesized expressions
    Primary,
}

impl BinaryOp {
    pub fn precedence(self) -> Precedence {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => Precedence::Multiplicative,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Additive,
            BinaryOp::Shl | BinaryOp::Shr => Precedence::Shift,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Precedence::Relational,
            BinaryOp::Eq | BinaryOp::Ne => Precedence::Equality,
            BinaryOp::BitAnd => Precedence::BitAnd,
            BinaryOp::BitXor => Precedence::BitXor,
            BinaryOp::BitOr => Precedence::BitOr,
            BinaryOp::LogicalAnd => Precedence::LogicalAnd,
            BinaryOp::LogicalOr => Precedence::LogicalOr,
        }
    }

    /// Operators whose left-nested chains print without parentheses.
    pub fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::BitAnd
                | BinaryOp::BitXor
                | BinaryOp::BitOr
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
        )
    }
}

impl Node {
    /// Precedence of an expression node. Statements report `Primary`.
    pub fn precedence(&self) -> Precedence {
        match self {
            Node::Binary { op, .. } => op.precedence(),
            Node::Unary { op, .. } if op.is_postfix() => Precedence::Postfix,
            Node::Unary { .. } | Node::Cast { .. } => Precedence::Prefix,
            Node::Ternary { .. } => Precedence::Conditional,
            Node::Assign { .. } => Precedence::Assign,
            Node::Call { .. } | Node::Member { .. } => Precedence::Postfix,
            _ => Precedence::Primary,
        }
    }
}

/// Which operand slot of a binary parent a child occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Whether `child` needs parentheses as the `side` operand of a binary `parent`.
pub fn needs_parens_binary(parent: BinaryOp, child: &Node, side: Side) -> bool {
    let parent_prec = parent.precedence();
    let child_prec = child.precedence();
    if child_prec != parent_prec {
        return child_prec < parent_prec;
    }
    match child {
        Node::Binary { op, .. } => !(*op == parent && parent.is_associative() && side == Side::Left),
        _ => true,
    }
}

/// Whether `child` needs parentheses under a ternary or assignment parent of
/// precedence `parent`. Equal precedence is always parenthesized.
pub fn needs_parens_loose(parent: Precedence, child: &Node) -> bool {
    child.precedence() <= parent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_c() {
        assert!(Precedence::Assign < Precedence::Conditional);
        assert!(BinaryOp::LogicalOr.precedence() < BinaryOp::LogicalAnd.precedence());
        assert!(BinaryOp::BitAnd.precedence() < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Lt.precedence());
        assert!(BinaryOp::Shl.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
    }

    #[test]
    fn test_equal_precedence_rules() {
        let sum = Node::binary(BinaryOp::Add, Node::id("a"), Node::id("b"));
        let diff = Node::binary(BinaryOp::Sub, Node::id("a"), Node::id("b"));

        assert!(!needs_parens_binary(BinaryOp::Add, &sum, Side::Left));
        assert!(needs_parens_binary(BinaryOp::Add, &sum, Side::Right));
        assert!(needs_parens_binary(BinaryOp::Sub, &diff, Side::Left));
        assert!(needs_parens_binary(BinaryOp::Add, &diff, Side::Left));
        assert!(!needs_parens_binary(BinaryOp::Mul, &Node::id("a"), Side::Right));
    }
}
