//! Symbolic-stack analysis over raw instructions.
//!
//! Each script is walked forward with a stack of *instruction indices*
//! instead of values. When an instruction consumes operands, the indices it
//! pops identify the instructions that produced them, and those producers are
//! rewritten in place:
//!
//! - integer constants equal to a script start become [`Param::Script`]
//! - string-table indices used as a printf format become [`Param::Str`]
//! - local slots passed to a dynamic call are remembered per callee, so later
//!   passes can resolve the constants stored into them
//!
//! After the final pass, constants whose bit pattern looks like an IEEE-754
//! float become [`Param::Float`]. That last step is a heuristic and both
//! false positives and false negatives are expected.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::bytecode::{Opcode, Param, Program, Scope, Script};
use crate::config::DecompilerConfig;

/// Global slots that hold script offsets when set.
const OFFSET_GLOBALS: &[usize] = &[
    7, 11, 12, 13, 14, 15, 16, 21, 22, 23, 25, 26, 27, 28, 30, 34, 35, 36, 37, 39, 40, 41, 42,
    43, 44, 56, 57, 58, 59, 60, 61,
];

/// Syscalls whose first argument is a script offset.
const SCRIPT_ARG0_SYSCALLS: &[i64] = &[0x0, 0x3];
/// Syscalls whose second argument is a script offset.
const SCRIPT_ARG1_SYSCALLS: &[i64] = &[0x29];

/// A stack underflow tolerated during analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Underflow {
    pub script: String,
    pub position: u32,
    pub needed: usize,
    pub available: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub underflows: Vec<Underflow>,
    /// Per script, local slots that receive dynamic call arguments.
    pub called_vars: HashMap<String, BTreeSet<usize>>,
}

/// Run every analysis pass over `program`, rewriting parameters in place.
pub fn analyze_program(program: &mut Program, config: &DecompilerConfig) -> AnalysisReport {
    let Program {
        scripts, strings, ..
    } = program;

    let mut analyzer = Analyzer {
        script_starts: scripts.iter().map(|s| (s.start(), s.name.clone())).collect(),
        called_vars: HashMap::new(),
        underflows: Vec::new(),
        strings: strings.as_slice(),
        max_depth: config.max_nesting,
    };

    let final_pass = config.analysis_passes;
    for pass in 0..=final_pass {
        debug!(pass, "reference analysis pass");
        for script in scripts.iter_mut() {
            analyzer.run(script, pass, pass == final_pass);
        }
    }

    for script in scripts.iter_mut() {
        pick_float_literals(script);
    }

    AnalysisReport {
        underflows: analyzer.underflows,
        called_vars: analyzer.called_vars,
    }
}

struct Analyzer<'a> {
    script_starts: HashMap<u32, String>,
    called_vars: HashMap<String, BTreeSet<usize>>,
    underflows: Vec<Underflow>,
    strings: &'a [String],
    max_depth: usize,
}

/// Bounds and bookkeeping for one branch of the walk.
struct Walk {
    start: usize,
    /// Stop once this index is reached with an empty stack.
    end: Option<usize>,
    depth: usize,
}

impl Analyzer<'_> {
    fn run(&mut self, script: &mut Script, pass: usize, record_underflows: bool) {
        let mut explored = HashSet::new();
        let mut stack = Vec::new();
        let walk = Walk {
            start: 0,
            end: None,
            depth: 0,
        };
        self.walk(script, walk, &mut stack, pass, record_underflows, &mut explored);
    }

    fn walk(
        &mut self,
        script: &mut Script,
        walk: Walk,
        stack: &mut Vec<usize>,
        pass: usize,
        record_underflows: bool,
        explored: &mut HashSet<u32>,
    ) {
        if walk.depth > self.max_depth {
            warn!(script = %script.name, "branch nesting too deep, abandoning path");
            return;
        }

        let mut backward_taken = HashSet::new();
        let mut i = walk.start;
        while i < script.instructions.len() {
            if let Some(end) = walk.end {
                if i >= end && stack.is_empty() {
                    return;
                }
            }

            let ins = &script.instructions[i];
            let (op, position, push_bit) = (ins.op, ins.position, ins.push_bit);
            let pops = ins.pops();

            let mut popped = Vec::with_capacity(pops);
            for _ in 0..pops {
                match stack.pop() {
                    Some(index) => popped.push(index),
                    None => break,
                }
            }
            if popped.len() < pops && record_underflows {
                warn!(
                    script = %script.name,
                    position,
                    needed = pops,
                    available = popped.len(),
                    "stack underflow during analysis"
                );
                self.underflows.push(Underflow {
                    script: script.name.clone(),
                    position,
                    needed: pops,
                    available: popped.len(),
                });
            }

            if pass == 0 {
                self.first_pass_rewrites(script, i, &popped);
            } else {
                self.call_argument_rewrites(script, i, &popped);
            }

            if op == Opcode::Push && i > 0 {
                stack.push(i - 1);
            }
            if push_bit {
                stack.push(i);
            }

            if op.is_branch() {
                self.follow_branch(script, i, stack, pass, record_underflows, explored, walk.depth);
            }

            if op.is_unconditional() {
                match script.instructions[i].target().and_then(|t| script.index_of(t)) {
                    Some(next) => {
                        if next <= i && !backward_taken.insert(i) {
                            trace!(script = %script.name, position, "backward jump already taken");
                            return;
                        }
                        i = next;
                    }
                    None => i += 1,
                }
            } else {
                i += 1;
            }
        }
    }

    /// Explore the taken side of a conditional branch with a copy of the
    /// stack. The fallthrough side continues in the caller.
    #[allow(clippy::too_many_arguments)]
    fn follow_branch(
        &mut self,
        script: &mut Script,
        i: usize,
        stack: &[usize],
        pass: usize,
        record_underflows: bool,
        explored: &mut HashSet<u32>,
        depth: usize,
    ) {
        let position = script.instructions[i].position;
        let Some(jump_index) = script.instructions[i].target().and_then(|t| script.index_of(t))
        else {
            return;
        };
        if !explored.insert(position) {
            return;
        }

        let end = match jump_index.checked_sub(1).map(|p| &script.instructions[p]) {
            Some(prev) if prev.op.is_unconditional() => {
                prev.target().and_then(|t| script.index_of(t))
            }
            _ if !stack.is_empty() => Some(jump_index),
            _ => return,
        };

        trace!(script = %script.name, position, jump_index, "exploring branch");
        let mut branch_stack = stack.to_vec();
        let walk = Walk {
            start: jump_index,
            end,
            depth: depth + 1,
        };
        self.walk(script, walk, &mut branch_stack, pass, record_underflows, explored);
    }

    fn first_pass_rewrites(&mut self, script: &mut Script, i: usize, popped: &[usize]) {
        let ins = &script.instructions[i];
        let (op, syscall_id, var) = (ins.op, ins.param_int(1), ins.var_ref());

        if op.is_call() {
            self.update_script_reference(script, popped.first().copied());
        }

        if op == Opcode::Printf {
            if let Some(&format) = popped.last() {
                self.inline_format_string(script, format);
            }
        }

        if op == Opcode::Syscall {
            let id = syscall_id.unwrap_or(-1);
            if SCRIPT_ARG0_SYSCALLS.contains(&id) {
                self.update_script_reference(script, popped.first().copied());
            } else if SCRIPT_ARG1_SYSCALLS.contains(&id) {
                self.update_script_reference(script, popped.get(1).copied());
            }
        }

        if op == Opcode::SetVar {
            if let Some((Scope::Global, slot)) = var {
                if OFFSET_GLOBALS.contains(&slot) {
                    self.update_script_reference(script, popped.first().copied());
                }
            }
        }
    }

    fn call_argument_rewrites(&mut self, script: &mut Script, i: usize, popped: &[usize]) {
        let ins = &script.instructions[i];
        let (op, var) = (ins.op, ins.var_ref());

        if matches!(op, Opcode::SetVar | Opcode::SetVarF) {
            if let Some((Scope::Local, slot)) = var {
                let known = self
                    .called_vars
                    .get(&script.name)
                    .is_some_and(|slots| slots.contains(&slot));
                if known {
                    self.update_script_reference(script, popped.first().copied());
                }
            }
        }

        if op.is_call() {
            let Some(callee) = popped.first().and_then(|&c| self.callee_name(script, c)) else {
                return;
            };
            let slots: Vec<usize> = match self.called_vars.get(&callee) {
                Some(slots) => slots.iter().copied().collect(),
                None => return,
            };
            for slot in slots {
                if slot + 1 < popped.len() {
                    let index = popped.len() - (slot + 1);
                    self.update_script_reference(script, Some(popped[index]));
                }
            }
        }
    }

    /// Script name pushed by the constant at `index`, if any.
    fn callee_name(&self, script: &Script, index: usize) -> Option<String> {
        let ins = &script.instructions[index];
        if !ins.op.is_push_const() {
            return None;
        }
        match ins.params.first()? {
            Param::Int(n) => u32::try_from(*n)
                .ok()
                .and_then(|p| self.script_starts.get(&p))
                .cloned(),
            Param::Script(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Rewrite the producer at `index` into a script reference, or record it
    /// as a local slot carrying one.
    fn update_script_reference(&mut self, script: &mut Script, index: Option<usize>) {
        let Some(index) = index else {
            return;
        };
        let name = script.name.clone();
        let ins = &mut script.instructions[index];

        if ins.op.is_push_const() {
            if let Some(Param::Int(n)) = ins.params.first() {
                let target = u32::try_from(*n).ok().and_then(|p| self.script_starts.get(&p));
                if let Some(target) = target {
                    trace!(script = %name, position = ins.position, %target, "script reference");
                    ins.params[0] = Param::Script(target.clone());
                }
            }
        }

        if ins.op == Opcode::PushVar {
            if let Some((Scope::Local, slot)) = ins.var_ref() {
                self.called_vars.entry(name).or_default().insert(slot);
            }
        }
    }

    fn inline_format_string(&mut self, script: &mut Script, index: usize) {
        let ins = &mut script.instructions[index];
        if !ins.op.is_push_const() {
            return;
        }
        if let Some(Param::Int(n)) = ins.params.first() {
            let text = usize::try_from(*n).ok().and_then(|i| self.strings.get(i));
            if let Some(text) = text {
                ins.params[0] = Param::Str(text.clone());
            }
        }
    }
}

/// Replace integer constants that look like floats with float literals.
pub fn pick_float_literals(script: &mut Script) {
    for ins in &mut script.instructions {
        if !ins.op.is_push_const() {
            continue;
        }
        let Some(Param::Int(n)) = ins.params.first() else {
            continue;
        };
        let bits = u32::try_from(*n)
            .ok()
            .or_else(|| i32::try_from(*n).ok().map(|v| v as u32));
        if let Some(bits) = bits {
            if guess_is_float(bits) {
                ins.params[0] = Param::Float(f32::from_bits(bits));
            }
        }
    }
}

/// Whether a 32-bit pattern plausibly encodes a hand-written float.
///
/// Zero, NaN and magnitudes below `1e-6` are rejected. Any other negative
/// value is accepted. Positive values at or above `1e7` are rejected, the rest
/// are accepted if their exponent is within `±30` or the low 16 mantissa bits
/// are clear.
pub fn guess_is_float(bits: u32) -> bool {
    if bits == 0 {
        return false;
    }

    let value = f32::from_bits(bits);
    if value.is_nan() || value.abs() < 0.000_001 {
        return false;
    }
    if value.is_sign_negative() {
        return true;
    }
    if value >= 10_000_000.0 {
        return false;
    }

    let exponent = ((bits & 0x7f80_0000) >> 23) as i32 - 127;
    let mantissa = bits & 0x007f_ffff;

    (-30..=30).contains(&exponent) || mantissa & 0xffff == 0
}
