//! Recover boolean expressions from ternaries over 0/1 constants.
//!
//! The compiler lowers `a && b`, `a || b` and friends into branches that
//! push `1` or `0`. Once reconstructed as ternaries, a decision tree of depth
//! at most two over conditions `a` (outer) and `b` (inner) is reduced to its
//! truth table and matched against the expression it encodes.

use crate::lang::{BinaryOp, Node, UnaryOp};

/// Truth table indexed by `[a][b]`.
type Table = [[bool; 2]; 2];

/// Strip a logical not.
fn strip_not(node: &Node) -> Option<&Node> {
    match node {
        Node::Unary {
            op: UnaryOp::Not,
            operand,
        } => Some(operand),
        _ => None,
    }
}

/// Logical negation, removing a double `!`.
pub fn negate(node: Node) -> Node {
    match node {
        Node::Unary {
            op: UnaryOp::Not,
            operand,
        } => *operand,
        other => Node::not(other),
    }
}

fn leaf(node: &Node) -> Option<bool> {
    match node {
        Node::Literal(value) => value.as_truth(),
        _ => None,
    }
}

/// Condition with any leading `!` removed, and whether the arms swap.
fn normalized(cond: &Node) -> (&Node, bool) {
    match strip_not(cond) {
        Some(inner) => (inner, true),
        None => (cond, false),
    }
}

/// One arm of the outer ternary: either a constant, or an inner ternary over
/// constants, returned as `(cond, when_true, when_false)`.
enum Arm<'a> {
    Leaf(bool),
    Inner(&'a Node, bool, bool),
}

fn arm(node: &Node) -> Option<Arm<'_>> {
    if let Some(value) = leaf(node) {
        return Some(Arm::Leaf(value));
    }
    let Node::Ternary {
        cond,
        then,
        otherwise,
    } = node
    else {
        return None;
    };
    let (cond, swapped) = normalized(cond);
    let (t, f) = (leaf(then)?, leaf(otherwise)?);
    Some(if swapped {
        Arm::Inner(cond, f, t)
    } else {
        Arm::Inner(cond, t, f)
    })
}

/// `cond` or `!cond` depending on `polarity`.
fn literal(cond: &Node, polarity: bool) -> Node {
    if polarity {
        cond.clone()
    } else {
        negate(cond.clone())
    }
}

/// Rewrite a ternary over 0/1 leaves as a boolean expression. Returns the
/// node unchanged when it does not match.
pub fn simplify_ternary(node: Node) -> Node {
    match reduce(&node) {
        Some(simplified) => simplified,
        None => node,
    }
}

fn reduce(node: &Node) -> Option<Node> {
    let Node::Ternary {
        cond,
        then,
        otherwise,
    } = node
    else {
        return None;
    };

    let (a, swapped) = normalized(cond);
    let (when_a, when_not_a) = if swapped {
        (arm(otherwise)?, arm(then)?)
    } else {
        (arm(then)?, arm(otherwise)?)
    };

    // the inner condition must be the same on both sides
    let b = match (&when_a, &when_not_a) {
        (Arm::Inner(x, ..), Arm::Inner(y, ..)) if x != y => return None,
        (Arm::Inner(x, ..), _) | (_, Arm::Inner(x, ..)) => Some(*x),
        _ => None,
    };

    let row = |arm: &Arm| match *arm {
        Arm::Leaf(v) => [v, v],
        // [b false, b true]
        Arm::Inner(_, t, f) => [f, t],
    };
    let table: Table = [row(&when_not_a), row(&when_a)];

    Some(match_table(&table, a, b))
}

fn match_table(table: &Table, a: &Node, b: Option<&Node>) -> Node {
    let cells = [table[0][0], table[0][1], table[1][0], table[1][1]];
    let trues = cells.iter().filter(|&&c| c).count();

    if trues == 0 || trues == 4 {
        return Node::int(i64::from(trues == 4));
    }

    // independent of b
    if table[0][0] == table[0][1] && table[1][0] == table[1][1] {
        return literal(a, table[1][0]);
    }

    // b is present from here on: a table that ignores b returned above
    let Some(b) = b else {
        return literal(a, table[1][0]);
    };

    // independent of a
    if table[0][0] == table[1][0] && table[0][1] == table[1][1] {
        return literal(b, table[0][1]);
    }

    let position = |value: bool| {
        let index = cells.iter().position(|&c| c == value).unwrap_or(0);
        (index >= 2, index % 2 == 1)
    };

    match trues {
        // a single true cell: conjunction of two literals
        1 => {
            let (pa, pb) = position(true);
            combine(BinaryOp::LogicalAnd, BinaryOp::LogicalOr, a, pa, b, pb)
        }
        // a single false cell: disjunction of the opposite literals
        3 => {
            let (pa, pb) = position(false);
            combine(BinaryOp::LogicalOr, BinaryOp::LogicalAnd, a, !pa, b, !pb)
        }
        // exclusive-or shapes have no short form
        _ => Node::ternary(
            a.clone(),
            ternary_row(b, table[1]),
            ternary_row(b, table[0]),
        ),
    }
}

fn ternary_row(b: &Node, row: [bool; 2]) -> Node {
    Node::ternary(b.clone(), Node::int(i64::from(row[1])), Node::int(i64::from(row[0])))
}

/// `x op y` over two literals; when both are negated, the De Morgan dual
/// `!(x' dual y')` is emitted instead.
fn combine(op: BinaryOp, dual: BinaryOp, a: &Node, pa: bool, b: &Node, pb: bool) -> Node {
    if !pa && !pb {
        Node::not(Node::binary(dual, a.clone(), b.clone()))
    } else {
        Node::binary(op, literal(a, pa), literal(b, pb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::render_expr;

    fn a() -> Node {
        Node::id("a")
    }

    fn b() -> Node {
        Node::id("b")
    }

    fn c(n: i64) -> Node {
        Node::int(n)
    }

    fn inner(t: i64, f: i64) -> Node {
        Node::ternary(b(), c(t), c(f))
    }

    fn simplified(node: Node) -> String {
        render_expr(&simplify_ternary(node))
    }

    #[test]
    fn test_or_pattern() {
        assert_eq!(simplified(Node::ternary(a(), c(1), inner(1, 0))), "a || b");
    }

    #[test]
    fn test_and_pattern() {
        assert_eq!(simplified(Node::ternary(a(), inner(1, 0), c(0))), "a && b");
    }

    #[test]
    fn test_negation_pattern() {
        assert_eq!(simplified(Node::ternary(a(), c(0), inner(1, 1))), "!a");
    }

    #[test]
    fn test_outer_condition_ignored() {
        assert_eq!(simplified(Node::ternary(a(), inner(1, 0), inner(1, 0))), "b");
        assert_eq!(simplified(Node::ternary(a(), inner(0, 1), inner(0, 1))), "!b");
    }

    #[test]
    fn test_single_level() {
        assert_eq!(simplified(Node::ternary(a(), c(1), c(0))), "a");
        assert_eq!(simplified(Node::ternary(a(), c(0), c(1))), "!a");
        assert_eq!(simplified(Node::ternary(a(), c(1), c(1))), "0x1");
    }

    #[test]
    fn test_negated_conditions_are_normalized() {
        // !a ? 0 : (b ? 1 : 0)  ==  a ? (b ? 1 : 0) : 0
        let node = Node::ternary(Node::not(a()), c(0), inner(1, 0));
        assert_eq!(simplified(node), "a && b");

        // a ? 1 : (!b ? 0 : 1)  ==  a || b
        let node = Node::ternary(a(), c(1), Node::ternary(Node::not(b()), c(0), c(1)));
        assert_eq!(simplified(node), "a || b");
    }

    #[test]
    fn test_de_morgan_forms() {
        // true unless both hold
        assert_eq!(simplified(Node::ternary(a(), inner(0, 1), c(1))), "!(a && b)");
        // true only when neither holds
        assert_eq!(simplified(Node::ternary(a(), c(0), inner(0, 1))), "!(a || b)");
        // mixed polarity
        assert_eq!(simplified(Node::ternary(a(), inner(0, 1), c(0))), "a && !b");
    }

    #[test]
    fn test_non_boolean_ternary_untouched() {
        let node = Node::ternary(a(), c(2), c(0));
        assert_eq!(simplify_ternary(node.clone()), node);
        let mixed = Node::ternary(a(), inner(1, 0), Node::ternary(Node::id("z"), c(1), c(0)));
        assert_eq!(simplify_ternary(mixed.clone()), mixed);
    }

    #[test]
    fn test_negate_removes_double_not() {
        assert_eq!(negate(Node::not(a())), a());
        assert_eq!(negate(a()), Node::not(a()));
    }
}
