//! Recover structured control flow from jump-based instruction streams.
//!
//! A script is first turned into a flat list of [`Item`]s with a label
//! before every jump target. Loops are then extracted by a backward scan
//! (back-edge branches), and if/else blocks, call groups and cast markers by
//! a forward scan. Both scans recurse into every extracted body.

use std::ops::RangeInclusive;

use tracing::trace;

use super::error::{DecompileError, Result};
use crate::bytecode::{Instruction, Opcode, Script};
use crate::lang::ValueType;

/// One element of a structured instruction list.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Instr(Instruction),
    /// Jump target at the given position.
    Label(u32),
    IfElse(IfElse),
    Loop(Loop),
    CallGroup(CallGroup),
    /// Coerce the value produced by the preceding operand.
    Cast(ValueType),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfElse {
    /// Opened by `ifNot` rather than `if`.
    pub negated: bool,
    pub then: Vec<Item>,
    pub otherwise: Option<Vec<Item>>,
    /// Both arms leave a value on the stack.
    pub push_bit: bool,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `while`: entered by a jump to the condition.
    PreTest,
    /// `do ... while`
    PostTest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub kind: LoopKind,
    /// Back-edge is an `ifNot`.
    pub negated: bool,
    /// Body items; the condition is computed at the tail.
    pub body: Vec<Item>,
    /// The jump into the condition of a pre-test loop.
    pub entry: Option<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallGroup {
    /// The `try` instruction that opened the group.
    pub opener: Instruction,
    /// Contents, ending with the closing label.
    pub items: Vec<Item>,
    pub push_bit: bool,
}

impl Item {
    fn instr(&self) -> Option<&Instruction> {
        match self {
            Item::Instr(ins) => Some(ins),
            _ => None,
        }
    }

    /// Whether this item leaves a value for a later consumer.
    pub fn push_bit(&self) -> bool {
        match self {
            Item::Instr(ins) => ins.push_bit,
            Item::IfElse(block) => block.push_bit,
            Item::CallGroup(group) => group.push_bit,
            Item::Cast(_) => true,
            _ => false,
        }
    }
}

/// Lay out a script's instructions with a label before each jump target.
///
/// A target one past the last instruction gets a trailing label; any other
/// target that matches no instruction is an error.
pub fn label_script(script: &Script) -> Result<Vec<Item>> {
    let targets = script.jump_targets();
    let mut items = Vec::with_capacity(script.instructions.len() + targets.len());

    for ins in &script.instructions {
        if targets.contains(&ins.position) {
            items.push(Item::Label(ins.position));
        }
        items.push(Item::Instr(ins.clone()));
    }

    for &target in &targets {
        if script.index_of(target).is_some() {
            continue;
        }
        if target == script.bounds.1 {
            items.push(Item::Label(target));
            continue;
        }
        let culprit = script
            .instructions
            .iter()
            .find(|ins| ins.target() == Some(target));
        return Err(DecompileError::LabelNotFound {
            op: culprit.map(|ins| ins.op.to_string()).unwrap_or_default(),
            position: culprit.map(|ins| ins.position).unwrap_or(script.start()),
            target,
        });
    }

    Ok(items)
}

fn find_label(items: &[Item], target: u32) -> Option<usize> {
    items
        .iter()
        .position(|item| matches!(item, Item::Label(p) if *p == target))
}

fn label_of(items: &[Item], ins: &Instruction) -> Result<usize> {
    let target = ins.target().unwrap_or(u32::MAX);
    find_label(items, target).ok_or_else(|| DecompileError::LabelNotFound {
        op: ins.op.to_string(),
        position: ins.position,
        target,
    })
}

/// Index spans `label..=back_edge` of loops strictly inside `start..end`.
fn nested_loop_spans(items: &[Item], start: usize, end: usize) -> Vec<RangeInclusive<usize>> {
    (start + 1..end)
        .filter_map(|k| {
            let ins = items[k].instr().filter(|ins| ins.op.is_branch())?;
            let label = find_label(items, ins.target()?)?;
            (label > start && label < k).then_some(label..=k)
        })
        .collect()
}

/// Last item of a branch arm that is not a label.
fn last_non_label(items: &[Item]) -> Option<&Item> {
    items.iter().rev().find(|item| !matches!(item, Item::Label(_)))
}

/// Extracts loops, if/else blocks, call groups and casts.
pub struct Structurer {
    pub max_depth: usize,
    /// Rewrite jumps back to a pre-test loop's condition as `continue`.
    pub continues: bool,
}

impl Default for Structurer {
    fn default() -> Self {
        Self {
            max_depth: 256,
            continues: true,
        }
    }
}

impl Structurer {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Structure a labeled item list.
    pub fn structure(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        self.structure_at(items, 0)
    }

    fn structure_at(&self, items: Vec<Item>, depth: usize) -> Result<Vec<Item>> {
        let looped = self.pull_out_loops(items, depth)?;
        self.pull_out_groups(&looped, depth)
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        if depth >= self.max_depth {
            return Err(DecompileError::NestingTooDeep(self.max_depth));
        }
        Ok(depth + 1)
    }

    // =========================================================================
    // Loops (backward scan)
    // =========================================================================

    pub fn pull_out_loops(&self, mut items: Vec<Item>, depth: usize) -> Result<Vec<Item>> {
        let mut out: Vec<Item> = Vec::new();
        let mut i = items.len();

        while i > 0 {
            i -= 1;
            let back_edge = match &items[i] {
                Item::Instr(ins) if ins.op.is_branch() => ins
                    .target()
                    .and_then(|t| find_label(&items, t))
                    .filter(|&label| label < i)
                    .map(|label| (label, ins.op == Opcode::IfNot, ins.position)),
                _ => None,
            };
            let Some((label_pos, negated, position)) = back_edge else {
                out.push(items[i].clone());
                continue;
            };

            let entry = self.pre_test_entry(&items, label_pos, i);
            let kind = if entry.is_some() {
                LoopKind::PreTest
            } else {
                LoopKind::PostTest
            };
            trace!(position, ?kind, "loop");

            if let Some(Item::Label(end)) = items.get(i + 1) {
                let end = *end;
                let condition = entry.as_ref().and_then(Instruction::target);
                // jumps inside an inner loop belong to that loop
                let nested = nested_loop_spans(&items, label_pos, i);
                for j in label_pos..i {
                    if nested.iter().any(|span| span.contains(&j)) {
                        continue;
                    }
                    let Some(jump) = items[j].instr() else {
                        continue;
                    };
                    if !jump.op.is_unconditional() {
                        continue;
                    }
                    let target = jump.target();
                    if target == Some(end) {
                        items[j] = Item::Break;
                    } else if self.continues && jump.op.is_jump() && target.is_some() && target == condition {
                        items[j] = Item::Continue;
                    }
                }
            }

            let inner = self.enter(depth)?;
            let body = self.structure_at(items[label_pos..i].to_vec(), inner)?;
            out.push(Item::Loop(Loop {
                kind,
                negated,
                body,
                entry: entry.clone(),
            }));

            // the entry jump of a pre-test loop is folded into the loop
            i = if entry.is_some() { label_pos - 1 } else { label_pos };
        }

        out.reverse();
        Ok(out)
    }

    /// The unconditional jump just before the loop label that enters the
    /// loop at its condition, if there is one.
    fn pre_test_entry(&self, items: &[Item], label_pos: usize, branch: usize) -> Option<Instruction> {
        let prev = items.get(label_pos.checked_sub(1)?)?.instr()?;
        if !prev.op.is_unconditional() {
            return None;
        }
        let target = find_label(items, prev.target()?)?;
        (label_pos..branch).contains(&target).then(|| prev.clone())
    }

    // =========================================================================
    // If/else, call groups and casts (forward scan)
    // =========================================================================

    pub fn pull_out_groups(&self, items: &[Item], depth: usize) -> Result<Vec<Item>> {
        let mut out: Vec<Item> = Vec::new();
        let mut i = 0;

        while i < items.len() {
            match &items[i] {
                Item::Instr(ins) if ins.op == Opcode::Try => {
                    let target = ins.target().unwrap_or(u32::MAX);
                    let end = items[i + 1..]
                        .iter()
                        .position(|item| matches!(item, Item::Label(p) if *p == target))
                        .map(|offset| i + 1 + offset)
                        .ok_or(DecompileError::UnterminatedCallGroup {
                            position: ins.position,
                        })?;

                    let inner = self.enter(depth)?;
                    let contents = self.pull_out_groups(&items[i + 1..=end], inner)?;
                    out.push(Item::CallGroup(CallGroup {
                        opener: ins.clone(),
                        items: contents,
                        push_bit: ins.push_bit,
                    }));
                    out.push(items[end].clone());
                    i = end;
                }
                Item::Instr(ins) if ins.op.is_cast() => {
                    insert_cast(&mut out, ins)?;
                }
                Item::Instr(ins) if ins.op.is_branch() => {
                    i = self.if_else(items, i, ins, depth, &mut out)?;
                }
                other => out.push(other.clone()),
            }
            i += 1;
        }

        Ok(out)
    }

    /// Extract the block opened by the forward branch at `i`. Returns the
    /// index of the last item consumed.
    fn if_else(
        &self,
        items: &[Item],
        i: usize,
        ins: &Instruction,
        depth: usize,
        out: &mut Vec<Item>,
    ) -> Result<usize> {
        let label_pos = label_of(items, ins)?;
        if label_pos < i {
            return Err(DecompileError::UnstructuredLoop {
                position: ins.position,
            });
        }
        let inner = self.enter(depth)?;
        let negated = ins.op == Opcode::IfNot;
        let block = |then: Vec<Item>, otherwise: Option<Vec<Item>>, push_bit: bool| {
            Item::IfElse(IfElse {
                negated,
                then,
                otherwise,
                push_bit,
                position: ins.position,
            })
        };
        let arm_push_bit = |then: &[Item]| last_non_label(then).is_some_and(Item::push_bit);

        // empty if
        if label_pos == i + 1 {
            trace!(position = ins.position, "empty if");
            out.push(block(Vec::new(), None, false));
            return Ok(i);
        }

        match items[label_pos - 1].instr() {
            // comparison chain: another branch right before the label
            Some(bad_if) if bad_if.op.is_branch() => {
                let bad_if_label = label_of(items, bad_if)?;
                let bad_else = bad_if_label
                    .checked_sub(1)
                    .and_then(|p| items[p].instr())
                    .filter(|prev| prev.op == Opcode::Else);

                if let Some(bad_else) = bad_else {
                    let bad_else_label = label_of(items, bad_else)?;
                    if bad_else_label < i + 1 || bad_if_label < label_pos + 2 {
                        return Err(DecompileError::UnclassifiedIfElse {
                            position: ins.position,
                        });
                    }
                    trace!(position = ins.position, "comparison chain with else");
                    let then = self.pull_out_groups(&items[i + 1..=bad_else_label], inner)?;
                    let otherwise =
                        self.pull_out_groups(&items[label_pos + 1..bad_if_label - 1], inner)?;
                    let push_bit = arm_push_bit(&then);
                    out.push(block(then, Some(otherwise), push_bit));
                    Ok(bad_else_label)
                } else if bad_if_label == label_pos {
                    trace!(position = ins.position, "comparison chain sharing a label");
                    let then = self.pull_out_groups(&items[i + 1..=label_pos], inner)?;
                    out.push(block(then, None, false));
                    Ok(label_pos)
                } else {
                    Err(DecompileError::UnclassifiedIfElse {
                        position: ins.position,
                    })
                }
            }

            // if/else: the true arm ends with an else marker
            Some(else_marker) if else_marker.op == Opcode::Else => {
                let else_label = label_of(items, else_marker)?;
                if else_label < label_pos {
                    return Err(DecompileError::UnclassifiedIfElse {
                        position: ins.position,
                    });
                }
                let copy_else = items[i + 1..label_pos - 1].iter().any(|item| {
                    item.instr()
                        .is_some_and(|j| j.op.is_branch() && j.target() == ins.target())
                });

                let then_end = if copy_else { else_label + 1 } else { label_pos - 1 };
                let then = self.pull_out_groups(&items[i + 1..then_end], inner)?;
                let otherwise = self.pull_out_groups(&items[label_pos + 1..=else_label], inner)?;
                let push_bit = arm_push_bit(&then);
                trace!(position = ins.position, copy_else, "if/else");
                out.push(block(then, Some(otherwise), push_bit));
                Ok(else_label)
            }

            _ => {
                let then = self.pull_out_groups(&items[i + 1..=label_pos], inner)?;
                out.push(block(then, None, false));
                Ok(label_pos)
            }
        }
    }
}

/// Place a cast right after the item producing the value it coerces.
///
/// Walks back over already-emitted items, summing net stack effects, until
/// the running count matches the cast's "results back" operand.
fn insert_cast(out: &mut Vec<Item>, ins: &Instruction) -> Result<()> {
    let back = ins.param_int(0).unwrap_or(0);
    let ty = if ins.op == Opcode::IntToFloat {
        ValueType::Float
    } else {
        ValueType::Int
    };

    let mut pushed_back: i64 = 0;
    for index in (0..out.len()).rev() {
        let item = &out[index];
        let candidate = matches!(item, Item::Instr(_) | Item::CallGroup(_) | Item::IfElse(_));
        if candidate && item.push_bit() && pushed_back == back {
            out.insert(index + 1, Item::Cast(ty));
            return Ok(());
        }
        pushed_back += match item {
            Item::Instr(prev) => prev.net_effect(),
            Item::CallGroup(group) => i64::from(group.push_bit),
            Item::IfElse(block) => i64::from(block.push_bit) - 1,
            _ => 0,
        };
    }

    Err(DecompileError::CastTargetNotFound {
        position: ins.position,
        back,
    })
}

/// Label a script and structure it.
pub fn structure_script(script: &Script, max_depth: usize) -> Result<Vec<Item>> {
    let items = label_script(script)?;
    Structurer::new(max_depth).structure(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Param;
    use pretty_assertions::assert_eq;

    fn ins(op: Opcode, params: Vec<Param>, push_bit: bool, position: u32) -> Instruction {
        Instruction::new(op, params, push_bit, position)
    }

    fn push(n: i64, position: u32) -> Instruction {
        ins(Opcode::PushInt, vec![Param::Int(n)], true, position)
    }

    fn var(slot: i64, position: u32) -> Instruction {
        ins(Opcode::PushVar, vec![Param::Int(0), Param::Int(slot)], true, position)
    }

    fn to(op: Opcode, target: u32, position: u32) -> Instruction {
        ins(op, vec![Param::Target(target)], false, position)
    }

    fn script(instructions: Vec<Instruction>) -> Script {
        let end = instructions.last().map(|i| i.position + 1).unwrap_or(0);
        Script::new("f", instructions, (0, end))
    }

    fn only_loop(items: &[Item]) -> &Loop {
        items
            .iter()
            .find_map(|item| match item {
                Item::Loop(l) => Some(l),
                _ => None,
            })
            .unwrap()
    }

    /// while (var0 < 3) { var0++; }
    fn while_loop() -> Script {
        script(vec![
            to(Opcode::Jump, 0x20, 0x00),
            ins(Opcode::IncI, vec![Param::Int(0), Param::Int(0)], false, 0x10),
            var(0, 0x20),
            push(3, 0x21),
            ins(Opcode::LtI, vec![], true, 0x22),
            to(Opcode::IfNot, 0x10, 0x23),
            ins(Opcode::Return, vec![], false, 0x30),
        ])
    }

    #[test]
    fn test_pre_test_loop_when_entry_jumps_into_body() {
        let items = structure_script(&while_loop(), 16).unwrap();
        let l = only_loop(&items);
        assert_eq!(l.kind, LoopKind::PreTest);
        assert!(l.negated);
        assert_eq!(l.entry.as_ref().map(|e| e.position), Some(0x00));
        // the entry jump is gone from the outer list
        assert!(!items.iter().any(|i| matches!(i, Item::Instr(j) if j.op == Opcode::Jump)));
    }

    #[test]
    fn test_post_test_loop_without_entry_jump() {
        let s = script(vec![
            ins(Opcode::IncI, vec![Param::Int(0), Param::Int(0)], false, 0x10),
            var(0, 0x11),
            push(3, 0x12),
            ins(Opcode::LtI, vec![], true, 0x13),
            to(Opcode::IfNot, 0x10, 0x14),
            ins(Opcode::Return, vec![], false, 0x20),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let l = only_loop(&items);
        assert_eq!(l.kind, LoopKind::PostTest);
        assert!(l.entry.is_none());
    }

    #[test]
    fn test_jump_outside_body_range_is_not_an_entry() {
        // the jump before the loop label lands after the back-edge
        let s = script(vec![
            to(Opcode::Jump, 0x30, 0x00),
            ins(Opcode::IncI, vec![Param::Int(0), Param::Int(0)], false, 0x10),
            var(0, 0x11),
            to(Opcode::If, 0x10, 0x12),
            ins(Opcode::Return, vec![], false, 0x30),
        ]);
        let items = structure_script(&s, 16).unwrap();
        assert_eq!(only_loop(&items).kind, LoopKind::PostTest);
    }

    #[test]
    fn test_break_and_continue() {
        let s = script(vec![
            to(Opcode::Jump, 0x20, 0x00),
            var(1, 0x10),
            to(Opcode::If, 0x15, 0x11),
            to(Opcode::Jump, 0x40, 0x12),
            to(Opcode::Jump, 0x20, 0x15),
            var(0, 0x20),
            to(Opcode::IfNot, 0x10, 0x21),
            ins(Opcode::Return, vec![], false, 0x40),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let l = only_loop(&items);
        let Some(Item::IfElse(block)) = l.body.iter().find(|i| matches!(i, Item::IfElse(_))) else {
            panic!("no if in loop body");
        };
        assert_eq!(block.then[0], Item::Break);
        assert!(l.body.contains(&Item::Continue));
    }

    #[test]
    fn test_inner_break_to_outer_condition_stays_break() {
        // while (var2) { if (var3) break; while (var0) { if (var1) break; var0++; } }
        let s = script(vec![
            to(Opcode::Jump, 0x50, 0x00),
            var(3, 0x10),
            to(Opcode::If, 0x18, 0x11),
            to(Opcode::Jump, 0x60, 0x12),
            to(Opcode::Jump, 0x40, 0x18),
            var(1, 0x20),
            to(Opcode::If, 0x30, 0x21),
            to(Opcode::Jump, 0x50, 0x22),
            ins(Opcode::IncI, vec![Param::Int(0), Param::Int(0)], false, 0x30),
            var(0, 0x40),
            to(Opcode::IfNot, 0x20, 0x42),
            var(2, 0x50),
            to(Opcode::IfNot, 0x10, 0x51),
            ins(Opcode::Return, vec![], false, 0x60),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let first_if = |body: &[Item]| -> IfElse {
            body.iter()
                .find_map(|i| match i {
                    Item::IfElse(block) => Some(block.clone()),
                    _ => None,
                })
                .unwrap()
        };

        let outer = only_loop(&items);
        assert_eq!(outer.kind, LoopKind::PreTest);
        assert_eq!(first_if(&outer.body).then[0], Item::Break);

        let inner = only_loop(&outer.body);
        assert_eq!(inner.kind, LoopKind::PreTest);
        assert_eq!(first_if(&inner.body).then[0], Item::Break);
        assert!(!inner.body.contains(&Item::Continue));
        assert!(!outer.body.contains(&Item::Continue));
    }

    #[test]
    fn test_if_else_with_value() {
        // var0 ? 1 : 2 used as a value
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            push(1, 0x10),
            to(Opcode::Else, 0x30, 0x15),
            push(2, 0x20),
            ins(Opcode::ReturnValue, vec![], false, 0x30),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let Item::IfElse(block) = &items[1] else {
            panic!("expected if/else, got {:?}", items[1]);
        };
        assert!(block.push_bit);
        assert_eq!(block.then, vec![Item::Instr(push(1, 0x10))]);
        assert_eq!(
            block.otherwise,
            Some(vec![Item::Instr(push(2, 0x20)), Item::Label(0x30)])
        );
    }

    #[test]
    fn test_empty_if() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x10, 0x01),
            ins(Opcode::Return, vec![], false, 0x10),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let Item::IfElse(block) = &items[1] else {
            panic!("expected if");
        };
        assert!(block.then.is_empty());
        assert_eq!(items[2], Item::Label(0x10));
    }

    #[test]
    fn test_comparison_chain_sharing_label_appends_once() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            var(1, 0x10),
            to(Opcode::If, 0x20, 0x11),
            ins(Opcode::Return, vec![], false, 0x20),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let blocks = items.iter().filter(|i| matches!(i, Item::IfElse(_))).count();
        assert_eq!(blocks, 1);
    }

    #[test]
    fn test_comparison_chain_with_else() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            var(1, 0x10),
            to(Opcode::If, 0x30, 0x11),
            push(1, 0x20),
            to(Opcode::Else, 0x40, 0x25),
            push(2, 0x30),
            ins(Opcode::Return, vec![], false, 0x40),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let inner = IfElse {
            negated: false,
            then: vec![Item::Label(0x20), Item::Instr(push(1, 0x20))],
            otherwise: Some(vec![Item::Instr(push(2, 0x30)), Item::Label(0x40)]),
            push_bit: true,
            position: 0x11,
        };
        let outer = IfElse {
            negated: false,
            then: vec![Item::Instr(var(1, 0x10)), Item::IfElse(inner)],
            otherwise: Some(vec![Item::Instr(push(1, 0x20))]),
            push_bit: true,
            position: 0x01,
        };
        assert_eq!(
            items,
            vec![
                Item::Instr(var(0, 0x00)),
                Item::IfElse(outer),
                Item::Instr(ins(Opcode::Return, vec![], false, 0x40)),
            ]
        );
    }

    #[test]
    fn test_else_copied_when_inner_branch_shares_target() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x30, 0x01),
            var(1, 0x10),
            to(Opcode::If, 0x30, 0x11),
            push(1, 0x20),
            to(Opcode::Else, 0x40, 0x25),
            push(2, 0x30),
            ins(Opcode::ReturnValue, vec![], false, 0x40),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let inner = IfElse {
            negated: false,
            then: vec![Item::Instr(push(1, 0x20))],
            otherwise: Some(vec![Item::Instr(push(2, 0x30)), Item::Label(0x40)]),
            push_bit: true,
            position: 0x11,
        };
        let outer = IfElse {
            negated: false,
            then: vec![Item::Instr(var(1, 0x10)), Item::IfElse(inner)],
            otherwise: Some(vec![Item::Instr(push(2, 0x30)), Item::Label(0x40)]),
            push_bit: true,
            position: 0x01,
        };
        assert_eq!(
            items,
            vec![
                Item::Instr(var(0, 0x00)),
                Item::IfElse(outer),
                Item::Instr(ins(Opcode::ReturnValue, vec![], false, 0x40)),
            ]
        );
    }

    #[test]
    fn test_unclassified_chain_is_flagged() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            var(1, 0x10),
            to(Opcode::If, 0x30, 0x11),
            ins(Opcode::Nop, vec![], false, 0x20),
            ins(Opcode::Return, vec![], false, 0x30),
        ]);
        assert_eq!(
            structure_script(&s, 16),
            Err(DecompileError::UnclassifiedIfElse { position: 0x01 })
        );
    }

    #[test]
    fn test_call_group_and_cast() {
        let s = script(vec![
            ins(Opcode::Try, vec![Param::Target(0x20)], true, 0x00),
            var(0, 0x05),
            ins(Opcode::PushInt, vec![Param::Script("g".to_string())], true, 0x06),
            ins(Opcode::CallFunc, vec![Param::Int(1)], true, 0x07),
            push(2, 0x20),
            ins(Opcode::IntToFloat, vec![Param::Int(1)], false, 0x21),
            ins(Opcode::AddF, vec![], true, 0x22),
            ins(Opcode::ReturnValue, vec![], false, 0x23),
        ]);
        let items = structure_script(&s, 16).unwrap();
        let Item::CallGroup(group) = &items[0] else {
            panic!("expected call group");
        };
        assert!(group.push_bit);
        assert_eq!(group.items.last(), Some(&Item::Label(0x20)));
        // the cast lands right after the call group, one value back
        assert_eq!(items[1], Item::Cast(ValueType::Float));
        assert_eq!(items[2], Item::Label(0x20));
    }

    #[test]
    fn test_cast_without_source_fails() {
        let s = script(vec![
            ins(Opcode::FloatToInt, vec![Param::Int(0)], false, 0x00),
            ins(Opcode::Return, vec![], false, 0x01),
        ]);
        assert_eq!(
            structure_script(&s, 16),
            Err(DecompileError::CastTargetNotFound {
                position: 0x00,
                back: 0
            })
        );
    }

    #[test]
    fn test_structuring_is_idempotent() {
        for s in [while_loop(), script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            push(1, 0x10),
            to(Opcode::Else, 0x30, 0x15),
            push(2, 0x20),
            ins(Opcode::ReturnValue, vec![], false, 0x30),
        ])] {
            let once = structure_script(&s, 16).unwrap();
            let twice = Structurer::new(16).structure(once.clone()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_unresolved_target_is_an_error() {
        let s = script(vec![
            to(Opcode::Jump, 0x400, 0x00),
            ins(Opcode::Return, vec![], false, 0x05),
        ]);
        assert!(matches!(
            label_script(&s),
            Err(DecompileError::LabelNotFound { target: 0x400, .. })
        ));
    }

    #[test]
    fn test_nesting_ceiling() {
        let s = script(vec![
            var(0, 0x00),
            to(Opcode::If, 0x20, 0x01),
            var(1, 0x10),
            to(Opcode::If, 0x18, 0x11),
            ins(Opcode::Nop, vec![], false, 0x18),
            ins(Opcode::Return, vec![], false, 0x20),
        ]);
        assert_eq!(
            structure_script(&s, 1),
            Err(DecompileError::NestingTooDeep(1))
        );
        assert!(structure_script(&s, 2).is_ok());
    }
}
