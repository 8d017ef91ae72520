//! Backward reconstruction of expression and statement trees.
//!
//! A structured item list is read from the end. Each item that consumes
//! stack operands pulls them from the items before it: an item whose value
//! stays on the stack becomes an operand, anything else visited on the way
//! becomes a statement hoisted in front of the node being built. The cursor
//! into the current list is passed explicitly, and every nested block is
//! read with its own cursor.

use std::collections::{BTreeMap, HashSet};

use super::boolean::{negate, simplify_ternary};
use super::error::{DecompileError, Result};
use super::structure::{CallGroup, IfElse, Item, Loop, LoopKind};
use crate::bytecode::disasm::label_name;
use crate::bytecode::{Instruction, Opcode, Param, Scope};
use crate::lang::{AssignOp, BinaryOp, Node, UnaryOp, Value};
use crate::symbols::{global_name, syscall_name, SymbolTable};

/// Whole-program naming shared by every function.
#[derive(Debug, Clone, Default)]
pub struct ProgramContext<'a> {
    pub function_names: HashSet<String>,
    /// Name per referenced global slot.
    pub global_names: BTreeMap<usize, String>,
    pub symbols: Option<&'a SymbolTable>,
}

impl ProgramContext<'_> {
    fn global(&self, slot: usize) -> String {
        self.global_names
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| global_name(self.symbols, slot))
    }
}

/// Output of reading one item: hoisted statements, then the item's node.
#[derive(Debug, Default)]
struct Decompiled {
    before: Vec<Node>,
    node: Option<Node>,
}

impl Decompiled {
    fn node(node: Node) -> Self {
        Self {
            before: Vec::new(),
            node: Some(node),
        }
    }

    fn with(before: Vec<Node>, node: Node) -> Self {
        Self {
            before,
            node: Some(node),
        }
    }

    fn nothing() -> Self {
        Self::default()
    }
}

/// Items whose value is taken as an operand by a later consumer.
fn is_operand(item: &Item) -> bool {
    match item {
        Item::Instr(ins) if ins.op == Opcode::Push => true,
        Item::Instr(_) | Item::CallGroup(_) | Item::IfElse(_) => item.push_bit(),
        Item::Cast(_) => true,
        _ => false,
    }
}

/// Labels still targeted by unstructured jumps, at any depth.
pub fn referenced_labels(items: &[Item]) -> HashSet<u32> {
    let mut labels = HashSet::new();
    collect_labels(items, &mut labels);
    labels
}

fn collect_labels(items: &[Item], labels: &mut HashSet<u32>) {
    for item in items {
        match item {
            Item::Instr(ins) if ins.op != Opcode::Try => {
                labels.extend(ins.target());
            }
            Item::IfElse(block) => {
                collect_labels(&block.then, labels);
                if let Some(otherwise) = &block.otherwise {
                    collect_labels(otherwise, labels);
                }
            }
            Item::Loop(l) => collect_labels(&l.body, labels),
            Item::CallGroup(group) => collect_labels(&group.items, labels),
            _ => {}
        }
    }
}

/// Convert an if/else with one statement per arm into a ternary.
pub fn if_to_ternary(node: Node) -> Result<Node> {
    let Node::If {
        cond,
        then,
        otherwise: Some(otherwise),
    } = node
    else {
        return Err(DecompileError::BadTernary);
    };
    let (Ok([then]), Ok([otherwise])) =
        (<[Node; 1]>::try_from(then), <[Node; 1]>::try_from(otherwise))
    else {
        return Err(DecompileError::BadTernary);
    };

    let arm = |n: Node| match n {
        nested @ Node::If { .. } => if_to_ternary(nested),
        other => Ok(other),
    };
    Ok(Node::Ternary {
        cond,
        then: Box::new(arm(then)?),
        otherwise: Box::new(arm(otherwise)?),
    })
}

fn binary_op(op: Opcode) -> Option<BinaryOp> {
    use Opcode::*;
    Some(match op {
        AddI | AddF => BinaryOp::Add,
        SubI | SubF => BinaryOp::Sub,
        MulI | MulF => BinaryOp::Mul,
        DivI | DivF => BinaryOp::Div,
        ModI => BinaryOp::Mod,
        BitAnd => BinaryOp::BitAnd,
        BitOr => BinaryOp::BitOr,
        BitXor => BinaryOp::BitXor,
        Shl => BinaryOp::Shl,
        Shr => BinaryOp::Shr,
        EqI | EqF => BinaryOp::Eq,
        NeI | NeF => BinaryOp::Ne,
        LtI | LtF => BinaryOp::Lt,
        LeI | LeF => BinaryOp::Le,
        GtI | GtF => BinaryOp::Gt,
        GeI | GeF => BinaryOp::Ge,
        _ => return None,
    })
}

fn assign_op(op: Opcode) -> Option<AssignOp> {
    use Opcode::*;
    Some(match op {
        SetVar | SetVarF => AssignOp::Assign,
        AddAssignI | AddAssignF => AssignOp::Add,
        SubAssignI | SubAssignF => AssignOp::Sub,
        MulAssignI | MulAssignF => AssignOp::Mul,
        DivAssignI | DivAssignF => AssignOp::Div,
        ModAssignI => AssignOp::Mod,
        AndAssign => AssignOp::And,
        OrAssign => AssignOp::Or,
        XorAssign => AssignOp::Xor,
        _ => return None,
    })
}

/// Rebuilds one function body.
pub struct Reconstructor<'a> {
    program: &'a ProgramContext<'a>,
    /// Names of the local slots, arguments first.
    locals: Vec<String>,
    /// Labels that need to be emitted for `goto`.
    labels: HashSet<u32>,
    max_depth: usize,
}

impl<'a> Reconstructor<'a> {
    pub fn new(
        program: &'a ProgramContext<'a>,
        locals: Vec<String>,
        labels: HashSet<u32>,
        max_depth: usize,
    ) -> Self {
        Self {
            program,
            locals,
            labels,
            max_depth,
        }
    }

    /// Decompile a whole item list into statements in source order.
    pub fn block(&self, items: &[Item], depth: usize) -> Result<Vec<Node>> {
        if depth > self.max_depth {
            return Err(DecompileError::NestingTooDeep(self.max_depth));
        }

        let mut chunks: Vec<Vec<Node>> = Vec::new();
        let mut cursor = items.len();
        while cursor > 0 {
            cursor -= 1;
            let d = self.item(items, &mut cursor, depth)?;
            let mut chunk = d.before;
            chunk.extend(d.node);
            chunks.push(chunk);
        }

        Ok(chunks.into_iter().rev().flatten().collect())
    }

    /// Pull `argc` operands from the items before `cursor`.
    ///
    /// Returns hoisted statements in source order and the operands with the
    /// most recently pushed first.
    fn take_args(
        &self,
        items: &[Item],
        cursor: &mut usize,
        argc: usize,
        depth: usize,
        context: &str,
    ) -> Result<(Vec<Node>, Vec<Node>)> {
        // every operand is one level deeper in the expression tree
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(DecompileError::NestingTooDeep(self.max_depth));
        }

        let mut other: Vec<Node> = Vec::new();
        let mut args: Vec<Node> = Vec::with_capacity(argc);

        while args.len() < argc {
            if *cursor == 0 {
                return Err(DecompileError::StackUnderflow {
                    context: context.to_string(),
                    needed: argc,
                    found: args.len(),
                });
            }
            *cursor -= 1;
            let index = *cursor;
            let d = self.item(items, cursor, depth)?;

            let mut chunk = d.before;
            if is_operand(&items[index]) {
                let node = d.node.ok_or_else(|| DecompileError::StackUnderflow {
                    context: context.to_string(),
                    needed: argc,
                    found: args.len(),
                })?;
                let node = match items[index] {
                    Item::IfElse(_) => simplify_ternary(if_to_ternary(node)?),
                    _ => node,
                };
                args.push(node);
            } else {
                chunk.extend(d.node);
            }
            chunk.append(&mut other);
            other = chunk;
        }

        Ok((other, args))
    }

    fn item(&self, items: &[Item], cursor: &mut usize, depth: usize) -> Result<Decompiled> {
        match &items[*cursor] {
            Item::Instr(ins) => self.instruction(ins, items, cursor, depth),
            Item::Label(position) => Ok(if self.labels.contains(position) {
                Decompiled::node(Node::Label(label_name(*position)))
            } else {
                Decompiled::nothing()
            }),
            Item::Break => Ok(Decompiled::node(Node::Break)),
            Item::Continue => Ok(Decompiled::node(Node::Continue)),
            Item::Cast(ty) => {
                let (before, mut args) = self.take_args(items, cursor, 1, depth, "cast")?;
                let expr = Box::new(args.remove(0));
                Ok(Decompiled::with(before, Node::Cast { ty: *ty, expr }))
            }
            Item::IfElse(block) => self.if_else(block, items, cursor, depth),
            Item::Loop(l) => self.loop_(l, depth).map(Decompiled::node),
            Item::CallGroup(group) => self.call_group(group, depth),
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    fn if_else(
        &self,
        block: &IfElse,
        items: &[Item],
        cursor: &mut usize,
        depth: usize,
    ) -> Result<Decompiled> {
        let (before, mut args) = self.take_args(items, cursor, 1, depth, "if")?;
        let cond = args.remove(0);
        let cond = if block.negated { negate(cond) } else { cond };

        let then = self.block(&block.then, depth + 1)?;
        let otherwise = match &block.otherwise {
            Some(arm) => Some(self.block(arm, depth + 1)?),
            None => None,
        };

        Ok(Decompiled::with(
            before,
            Node::If {
                cond: Box::new(cond),
                then,
                otherwise,
            },
        ))
    }

    fn loop_(&self, l: &Loop, depth: usize) -> Result<Node> {
        // the condition is computed at the tail of the body
        let mut cursor = l.body.len();
        let (tail, mut args) = self.take_args(&l.body, &mut cursor, 1, depth + 1, "loop condition")?;
        let cond = args.remove(0);
        let cond = if l.negated { cond } else { negate(cond) };

        let mut body = self.block(&l.body[..cursor], depth + 1)?;
        body.extend(tail);

        let cond = Box::new(cond);
        Ok(match l.kind {
            LoopKind::PreTest => Node::While { cond, body },
            LoopKind::PostTest => Node::DoWhile { cond, body },
        })
    }

    fn call_group(&self, group: &CallGroup, depth: usize) -> Result<Decompiled> {
        let malformed = || DecompileError::MalformedCallGroup {
            position: group.opener.position,
        };
        let mut cursor = group
            .items
            .iter()
            .rposition(|item| !matches!(item, Item::Label(_)))
            .ok_or_else(malformed)?;
        let call = match &group.items[cursor] {
            Item::Instr(ins) if ins.op == Opcode::CallFunc => ins,
            _ => return Err(malformed()),
        };

        let (other, args) =
            self.take_args(&group.items, &mut cursor, call.argc() + 1, depth + 1, "call")?;
        let mut before = self.block(&group.items[..cursor], depth + 1)?;
        before.extend(other);

        Ok(Decompiled::with(before, self.call_node(args)))
    }

    /// `callee(args...)` from operands popped for a call, callee first.
    fn call_node(&self, mut args: Vec<Node>) -> Node {
        let callee = match args.remove(0) {
            Node::Id(name) if !self.program.function_names.contains(&name) => {
                Node::unary(UnaryOp::Deref, Node::Id(name))
            }
            Node::Literal(Value::String(name)) => Node::Id(name),
            other => other,
        };
        args.reverse();
        Node::call(callee, args)
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    fn var(&self, ins: &Instruction) -> Result<Node> {
        match ins.var_ref() {
            Some((Scope::Local, slot)) => self
                .locals
                .get(slot)
                .map(|name| Node::Id(name.clone()))
                .ok_or(DecompileError::UnknownLocal {
                    slot,
                    count: self.locals.len(),
                }),
            Some((Scope::Global, slot)) => Ok(Node::Id(self.program.global(slot))),
            None => Ok(Node::Comment(format!("bad variable operand at {:#x}", ins.position))),
        }
    }

    fn instruction(
        &self,
        ins: &Instruction,
        items: &[Item],
        cursor: &mut usize,
        depth: usize,
    ) -> Result<Decompiled> {
        use Opcode::*;
        let context = ins.op.mnemonic();
        let take = |cursor: &mut usize, n: usize| self.take_args(items, cursor, n, depth, context);

        if let Some(op) = binary_op(ins.op) {
            let (before, mut args) = take(cursor, 2)?;
            let rhs = args.remove(0);
            let lhs = args.remove(0);
            return Ok(Decompiled::with(before, Node::binary(op, lhs, rhs)));
        }

        if let Some(op) = assign_op(ins.op) {
            let target = self.var(ins)?;
            let (before, mut args) = take(cursor, 1)?;
            let node = Node::Assign {
                op,
                target: Box::new(target),
                value: Box::new(args.remove(0)),
            };
            return Ok(Decompiled::with(before, node));
        }

        Ok(match ins.op {
            Nop | Begin | End | IntToFloat | FloatToInt => Decompiled::nothing(),

            Jump | Jump5 | Else => match ins.target() {
                Some(target) => Decompiled::node(Node::Goto(label_name(target))),
                None => Decompiled::nothing(),
            },

            If | IfNot => {
                let (before, mut args) = take(cursor, 1)?;
                let cond = args.remove(0);
                let cond = if ins.op == If { negate(cond) } else { cond };
                let jump = ins.target().map(|t| Node::Goto(label_name(t)));
                Decompiled::with(
                    before,
                    Node::If {
                        cond: Box::new(cond),
                        then: jump.into_iter().collect(),
                        otherwise: None,
                    },
                )
            }

            ReturnValue | ReturnValue8 => {
                let (before, mut args) = take(cursor, 1)?;
                Decompiled::with(before, Node::Return(Some(Box::new(args.remove(0)))))
            }
            Return | Return9 => Decompiled::node(Node::Return(None)),

            PushInt | PushShort => Decompiled::node(match ins.params.first() {
                Some(Param::Int(n)) => Node::int(*n),
                Some(Param::Float(f)) => Node::Literal(Value::Float(*f)),
                Some(Param::Str(s)) => Node::Literal(Value::String(s.clone())),
                Some(Param::Script(name)) => Node::Id(name.clone()),
                Some(Param::Target(t)) => Node::int(i64::from(*t)),
                None => Node::int(0),
            }),
            PushVar => Decompiled::node(self.var(ins)?),

            NegI | NegF | BitNot | Not => {
                let op = match ins.op {
                    BitNot => UnaryOp::BitNot,
                    Not => UnaryOp::Not,
                    _ => UnaryOp::Neg,
                };
                let (before, mut args) = take(cursor, 1)?;
                Decompiled::with(before, Node::unary(op, args.remove(0)))
            }
            IncI | IncF => Decompiled::node(Node::unary(UnaryOp::PostInc, self.var(ins)?)),
            DecI | DecF => Decompiled::node(Node::unary(UnaryOp::PostDec, self.var(ins)?)),

            Printf => {
                let (before, mut args) = take(cursor, ins.argc())?;
                args.reverse();
                Decompiled::with(before, Node::call(Node::id("printf"), args))
            }
            Syscall => {
                let (before, mut args) = take(cursor, ins.argc())?;
                args.reverse();
                Decompiled::with(before, self.syscall(ins.param_int(1).unwrap_or(0), args))
            }
            SetMain | CallFunc3 => {
                let (before, mut args) = take(cursor, ins.argc() + 1)?;
                let callee = match args.remove(0) {
                    Node::Literal(Value::String(name)) => Node::Id(name),
                    other => other,
                };
                args.reverse();
                args.insert(0, callee);
                let name = if ins.op == SetMain { "set_main" } else { "callFunc3" };
                Decompiled::with(before, Node::call(Node::id(name), args))
            }
            CallFunc => {
                let (before, args) = take(cursor, ins.argc() + 1)?;
                Decompiled::with(before, self.call_node(args))
            }

            Pop => {
                let (before, mut args) = take(cursor, 1)?;
                Decompiled::with(before, args.remove(0))
            }
            // copy of the value below, which stays for the next consumer
            Push => {
                let mut below = *cursor;
                let (_, mut args) = take(&mut below, 1)?;
                Decompiled::node(args.remove(0))
            }

            // binary and assignment opcodes were handled above
            _ => Decompiled::node(Node::Comment(format!(
                "unsupported opcode {:#04x}",
                ins.op.byte()
            ))),
        })
    }

    /// Syscall node, using `namespace.method(...)` when the symbol table
    /// names the method selected by an integer first argument.
    fn syscall(&self, id: i64, mut args: Vec<Node>) -> Node {
        let symbol = self.program.symbols.and_then(|s| s.syscall(id));
        if let Some(symbol) = symbol {
            let method = match args.first() {
                Some(Node::Literal(Value::Integer(m))) => symbol.methods.get(m),
                _ => None,
            };
            if let Some(method) = method {
                let member = Node::Member {
                    base: Box::new(Node::id(symbol.name.clone())),
                    member: method.clone(),
                };
                args.remove(0);
                return Node::call(member, args);
            }
        }
        Node::call(Node::Id(syscall_name(self.program.symbols, id)), args)
    }
}
