//! Best-effort type inference for variables and return values.
//!
//! Variables are typed by majority vote of the opcodes touching them; float
//! must strictly outnumber int to win. Return types look at the instruction
//! feeding each `return` and settle across call chains over a few rounds.
//! Anything left unresolved defaults to `int`.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::bytecode::{Family, Instruction, Opcode, Param, Program, Scope, Script};
use crate::config::DecompilerConfig;
use crate::lang::ValueType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub int: usize,
    pub float: usize,
}

impl Tally {
    fn add(&mut self, family: Family) {
        match family {
            Family::Int => self.int += 1,
            Family::Float => self.float += 1,
            Family::Neither => {}
        }
    }

    pub fn resolve(self) -> ValueType {
        if self.float > self.int {
            ValueType::Float
        } else {
            ValueType::Int
        }
    }
}

/// Family of the instruction that consumes the value loaded at `load`.
///
/// Scans forward tracking how deep the loaded value sits; stops at casts and
/// control transfers.
fn consumer_family(instructions: &[Instruction], load: usize) -> Family {
    let mut depth: i64 = 1;
    for ins in &instructions[load + 1..] {
        if ins.op.is_cast() || ins.op.is_unconditional() {
            return Family::Neither;
        }
        let pops = ins.pops() as i64;
        if pops >= depth {
            return ins.op.operand_family();
        }
        depth -= pops;
        if ins.push_bit {
            depth += 1;
        }
        if ins.op == Opcode::Push {
            depth += 1;
        }
    }
    Family::Neither
}

/// Count int/float evidence per slot of `scope` in one instruction list.
pub fn tally_slots(instructions: &[Instruction], scope: Scope, tallies: &mut BTreeMap<usize, Tally>) {
    for (i, ins) in instructions.iter().enumerate() {
        let Some((s, slot)) = ins.var_ref() else {
            continue;
        };
        if s != scope {
            continue;
        }
        let family = if ins.op == Opcode::PushVar {
            consumer_family(instructions, i)
        } else {
            ins.op.var_family()
        };
        tallies.entry(slot).or_default().add(family);
    }
}

/// Types of a script's `count` local slots.
pub fn local_types(script: &Script, count: usize) -> Vec<ValueType> {
    let mut tallies = BTreeMap::new();
    tally_slots(&script.instructions, Scope::Local, &mut tallies);
    (0..count)
        .map(|slot| tallies.get(&slot).copied().unwrap_or_default().resolve())
        .collect()
}

/// Types of every global slot referenced anywhere in the program.
pub fn global_types(program: &Program) -> BTreeMap<usize, ValueType> {
    let mut tallies = BTreeMap::new();
    for script in &program.scripts {
        tally_slots(&script.instructions, Scope::Global, &mut tallies);
    }
    tallies
        .into_iter()
        .map(|(slot, tally)| (slot, tally.resolve()))
        .collect()
}

/// `(argc, varc)` from a script's leading `begin`.
pub fn frame_size(script: &Script) -> Option<(usize, usize)> {
    let begin = script.instructions.first()?;
    if begin.op != Opcode::Begin {
        return None;
    }
    let argc = usize::try_from(begin.param_int(0)?).ok()?;
    let varc = usize::try_from(begin.param_int(1)?).ok()?;
    Some((argc, varc.max(argc)))
}

/// Inferred variable types for the whole program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTypes {
    /// Per script, in program order.
    pub locals: Vec<Vec<ValueType>>,
    pub globals: BTreeMap<usize, ValueType>,
}

impl VariableTypes {
    pub fn infer(program: &Program) -> Self {
        let locals = program
            .scripts
            .iter()
            .map(|s| {
                let varc = frame_size(s).map(|(_, varc)| varc).unwrap_or(0);
                local_types(s, varc)
            })
            .collect();
        Self {
            locals,
            globals: global_types(program),
        }
    }

    fn slot(&self, script: usize, scope: Scope, slot: usize) -> ValueType {
        match scope {
            Scope::Local => self
                .locals
                .get(script)
                .and_then(|l| l.get(slot))
                .copied()
                .unwrap_or(ValueType::Int),
            Scope::Global => self.globals.get(&slot).copied().unwrap_or(ValueType::Int),
        }
    }
}

// =============================================================================
// Return types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Known(ValueType),
    /// Returns whatever the script at this index returns.
    SameAs(usize),
}

/// Confidence per candidate, in tie-break order.
#[derive(Debug, Default)]
struct Levels {
    string: u8,
    float: u8,
    int: u8,
    bool: u8,
}

impl Levels {
    fn raise(&mut self, ty: ValueType, level: u8) {
        let slot = match ty {
            ValueType::String => &mut self.string,
            ValueType::Float => &mut self.float,
            ValueType::Bool => &mut self.bool,
            ValueType::Int | ValueType::Void => &mut self.int,
        };
        *slot = (*slot).max(level);
    }

    /// Highest level wins; ties go to the earlier of string, float, int, bool.
    fn best(&self) -> Option<ValueType> {
        let ranked = [
            (self.string, ValueType::String),
            (self.float, ValueType::Float),
            (self.int, ValueType::Int),
            (self.bool, ValueType::Bool),
        ];
        let top = ranked.iter().map(|(level, _)| *level).max().unwrap_or(0);
        if top == 0 {
            return None;
        }
        ranked.iter().find(|(level, _)| *level == top).map(|(_, ty)| *ty)
    }
}

/// Infer every script's return type, in program order.
pub fn return_types(
    program: &Program,
    vars: &VariableTypes,
    config: &DecompilerConfig,
) -> Vec<ValueType> {
    let by_name: HashMap<&str, usize> = program
        .scripts
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut inferred: Vec<Option<Inferred>> = vec![None; program.scripts.len()];

    for round in 0..config.return_type_rounds {
        let pending = inferred
            .iter()
            .filter(|t| !matches!(t, Some(Inferred::Known(_))))
            .count();
        if pending == 0 {
            break;
        }
        debug!(round, pending, "return type round");

        for index in 0..program.scripts.len() {
            if matches!(inferred[index], Some(Inferred::Known(_))) {
                continue;
            }
            let script = &program.scripts[index];
            if let Some(found) = infer_one(script, index, vars, &by_name, &inferred) {
                inferred[index] = Some(found);
            }
        }
    }

    (0..inferred.len())
        .map(|index| resolve_chain(&inferred, index, config.max_chain))
        .collect()
}

fn infer_one(
    script: &Script,
    index: usize,
    vars: &VariableTypes,
    by_name: &HashMap<&str, usize>,
    inferred: &[Option<Inferred>],
) -> Option<Inferred> {
    let returns: Vec<usize> = script
        .instructions
        .iter()
        .enumerate()
        .filter(|(_, ins)| ins.op.is_return_value())
        .map(|(i, _)| i)
        .collect();
    if returns.is_empty() {
        return Some(Inferred::Known(ValueType::Void));
    }

    let mut levels = Levels::default();
    let mut callee = None;

    for &ret in &returns {
        let Some(prev) = ret.checked_sub(1).map(|p| &script.instructions[p]) else {
            continue;
        };
        if !prev.push_bit {
            continue;
        }

        match prev.op {
            op if op.is_push_const() => match prev.params.first() {
                Some(Param::Float(_)) => levels.raise(ValueType::Float, 1),
                Some(Param::Str(_)) => levels.raise(ValueType::String, 1),
                Some(_) => levels.raise(ValueType::Int, 1),
                None => {}
            },
            Opcode::PushVar => {
                if let Some((scope, slot)) = prev.var_ref() {
                    levels.raise(vars.slot(index, scope, slot), 1);
                }
            }
            op if op.is_int_arithmetic() => levels.raise(ValueType::Int, 2),
            op if op.is_float_arithmetic() => levels.raise(ValueType::Float, 2),
            op if op.is_comparison() => levels.raise(ValueType::Bool, 2),
            op if op.is_call() => {
                let target = ret
                    .checked_sub(2)
                    .map(|p| &script.instructions[p])
                    .filter(|p| p.op.is_push_const())
                    .and_then(|p| match p.params.first() {
                        Some(Param::Script(name)) => by_name.get(name.as_str()).copied(),
                        _ => None,
                    });
                if target.is_some() {
                    callee = target;
                }
            }
            _ => {}
        }
    }

    if let Some(best) = levels.best() {
        return Some(Inferred::Known(best));
    }
    let callee = callee?;
    match inferred.get(callee).copied().flatten() {
        Some(Inferred::Known(ty)) => Some(Inferred::Known(ty)),
        _ if callee == index => None,
        _ => Some(Inferred::SameAs(callee)),
    }
}

/// Follow `SameAs` links to a known type, at most `cap` steps.
fn resolve_chain(inferred: &[Option<Inferred>], index: usize, cap: usize) -> ValueType {
    let mut current = index;
    for _ in 0..cap {
        match inferred.get(current).copied().flatten() {
            Some(Inferred::Known(ty)) => return ty,
            Some(Inferred::SameAs(next)) => current = next,
            None => return ValueType::Int,
        }
    }
    ValueType::Int
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(op: Opcode, params: Vec<Param>, push_bit: bool, position: u32) -> Instruction {
        Instruction::new(op, params, push_bit, position)
    }

    fn local(op: Opcode, slot: i64, push_bit: bool) -> Instruction {
        ins(op, vec![Param::Int(0), Param::Int(slot)], push_bit, 0)
    }

    fn begin(argc: i64, varc: i64) -> Instruction {
        ins(Opcode::Begin, vec![Param::Int(argc), Param::Int(varc)], false, 0)
    }

    fn returning(name: &str, start: u32, body: Vec<Instruction>) -> Script {
        let mut instructions = vec![begin(0, 0)];
        instructions.extend(body);
        instructions.push(ins(Opcode::ReturnValue, vec![], false, 0));
        Script::new(name, instructions, (start, start + 0x10))
    }

    #[test]
    fn test_float_majority() {
        let script = Script::new(
            "f",
            vec![
                begin(0, 1),
                local(Opcode::SetVarF, 0, false),
                local(Opcode::AddAssignF, 0, false),
                local(Opcode::IncF, 0, false),
                local(Opcode::IncI, 0, false),
            ],
            (0, 0x10),
        );
        assert_eq!(local_types(&script, 1), vec![ValueType::Float]);
    }

    #[test]
    fn test_tie_is_int() {
        let script = Script::new(
            "f",
            vec![
                begin(0, 1),
                local(Opcode::SetVarF, 0, false),
                local(Opcode::IncF, 0, false),
                local(Opcode::SetVar, 0, false),
                local(Opcode::IncI, 0, false),
            ],
            (0, 0x10),
        );
        assert_eq!(local_types(&script, 1), vec![ValueType::Int]);
    }

    #[test]
    fn test_generic_load_uses_consumer() {
        // var0 is only loaded, then multiplied as floats two values later
        let script = Script::new(
            "f",
            vec![
                begin(0, 2),
                local(Opcode::PushVar, 0, true),
                local(Opcode::PushVar, 1, true),
                ins(Opcode::PushInt, vec![Param::Float(2.0)], true, 0),
                ins(Opcode::MulF, vec![], true, 0),
                ins(Opcode::AddF, vec![], true, 0),
                ins(Opcode::Pop, vec![], false, 0),
            ],
            (0, 0x10),
        );
        assert_eq!(local_types(&script, 2), vec![ValueType::Float, ValueType::Float]);
    }

    #[test]
    fn test_cast_stops_consumer_scan() {
        let script = Script::new(
            "f",
            vec![
                begin(0, 1),
                local(Opcode::PushVar, 0, true),
                ins(Opcode::IntToFloat, vec![Param::Int(0)], false, 0),
                ins(Opcode::NegF, vec![], true, 0),
                ins(Opcode::Pop, vec![], false, 0),
            ],
            (0, 0x10),
        );
        assert_eq!(local_types(&script, 1), vec![ValueType::Int]);
    }

    #[test]
    fn test_only_referenced_globals() {
        let program = Program {
            scripts: vec![Script::new(
                "main",
                vec![
                    begin(0, 0),
                    ins(Opcode::SetVarF, vec![Param::Int(1), Param::Int(7)], false, 0),
                    ins(Opcode::IncI, vec![Param::Int(1), Param::Int(3)], false, 0),
                ],
                (0, 0x10),
            )],
            strings: vec![],
            entry_point: 0,
        };
        let globals = global_types(&program);
        assert_eq!(globals.len(), 2);
        assert_eq!(globals[&7], ValueType::Float);
        assert_eq!(globals[&3], ValueType::Int);
    }

    #[test]
    fn test_return_types() {
        let push = |param: Param| ins(Opcode::PushInt, vec![param], true, 0);
        let program = Program {
            scripts: vec![
                Script::new("none", vec![begin(0, 0), ins(Opcode::Return, vec![], false, 0)], (0, 0x10)),
                returning("float", 0x10, vec![push(Param::Float(1.5))]),
                returning("text", 0x20, vec![push(Param::Str("x".to_string()))]),
                returning("cmp", 0x30, vec![push(Param::Int(1)), push(Param::Int(2)), ins(Opcode::LtI, vec![], true, 0)]),
                returning("sum", 0x40, vec![push(Param::Int(1)), push(Param::Int(2)), ins(Opcode::AddI, vec![], true, 0)]),
                returning("script", 0x50, vec![push(Param::Script("none".to_string()))]),
            ],
            strings: vec![],
            entry_point: 0,
        };
        let vars = VariableTypes::infer(&program);
        let types = return_types(&program, &vars, &DecompilerConfig::default());
        assert_eq!(
            types,
            vec![
                ValueType::Void,
                ValueType::Float,
                ValueType::String,
                ValueType::Bool,
                ValueType::Int,
                ValueType::Int,
            ]
        );
    }

    fn tail_call(name: &str, start: u32, callee: &str) -> Script {
        returning(
            name,
            start,
            vec![
                ins(Opcode::PushInt, vec![Param::Script(callee.to_string())], true, 0),
                ins(Opcode::CallFunc, vec![Param::Int(0)], true, 0),
            ],
        )
    }

    #[test]
    fn test_tail_call_chains_settle() {
        let program = Program {
            scripts: vec![
                tail_call("a", 0x00, "b"),
                tail_call("b", 0x10, "c"),
                returning("c", 0x20, vec![ins(Opcode::PushInt, vec![Param::Float(0.5)], true, 0)]),
            ],
            strings: vec![],
            entry_point: 0,
        };
        let vars = VariableTypes::infer(&program);
        let types = return_types(&program, &vars, &DecompilerConfig::default());
        assert_eq!(types, vec![ValueType::Float; 3]);
    }

    #[test]
    fn test_cyclic_chain_defaults_to_int() {
        let program = Program {
            scripts: vec![tail_call("a", 0x00, "b"), tail_call("b", 0x10, "a")],
            strings: vec![],
            entry_point: 0,
        };
        let vars = VariableTypes::infer(&program);
        let config = DecompilerConfig {
            max_chain: 50,
            ..DecompilerConfig::default()
        };
        assert_eq!(return_types(&program, &vars, &config), vec![ValueType::Int; 2]);
    }
}
