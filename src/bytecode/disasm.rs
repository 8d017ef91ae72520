use crate::bytecode::stack_check::check_instructions;
use crate::bytecode::{Instruction, Param, Program, Script};
use std::collections::BTreeSet;

/// Name given to the synthetic label at a jump target.
pub fn label_name(position: u32) -> String {
    format!("loc_{:X}", position)
}

/// Print disassembly of a whole program
pub fn print_program(program: &Program) {
    print!("{}", disassemble_program(program));
}

/// Return disassembly of every script as a String
pub fn disassemble_program(program: &Program) -> String {
    let mut output = String::new();

    for script in &program.scripts {
        output.push_str("════════════════════════════════════════\n");
        output.push_str(&format!(" {}", script.name));
        if script.start() == program.entry_point {
            output.push_str(" (entry point)");
        }
        output.push('\n');
        output.push_str(&format!(
            " {} instructions, {:#x}..{:#x}\n",
            script.instructions.len(),
            script.bounds.0,
            script.bounds.1
        ));
        if let Err(e) = check_instructions(&script.instructions) {
            output.push_str(&format!(" ; {}\n", e));
        }
        output.push_str("════════════════════════════════════════\n");
        output.push_str(&disassemble_script(script));
        output.push('\n');
    }

    output
}

/// Disassemble one script, with a label line before every jump target.
pub fn disassemble_script(script: &Script) -> String {
    let jump_targets: BTreeSet<u32> = script.jump_targets();
    let mut output = String::new();

    for ins in &script.instructions {
        if jump_targets.contains(&ins.position) {
            output.push_str(&format!("{}:\n", label_name(ins.position)));
        }
        output.push_str(&format!("  {:08X}  {}\n", ins.position, format_instruction(ins)));
    }

    // a target one past the last instruction still gets its label
    if let Some(last) = jump_targets.iter().next_back() {
        if script.index_of(*last).is_none() && *last >= script.bounds.1 {
            output.push_str(&format!("{}:\n", label_name(*last)));
        }
    }

    output
}

pub fn format_instruction(ins: &Instruction) -> String {
    let mut text = ins.op.to_string();
    if ins.push_bit {
        text.push('*');
    }

    let params: Vec<String> = ins.params.iter().map(format_param).collect();
    if params.is_empty() {
        text
    } else {
        format!("{:<20}{}", text, params.join(", "))
    }
}

fn format_param(param: &Param) -> String {
    match param {
        Param::Int(n) => format!("{:#x}", n),
        Param::Float(f) => format!("{:?}f", f),
        Param::Str(s) => format!("{:?}", s),
        Param::Target(t) => label_name(*t),
        Param::Script(name) => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;

    fn sample() -> Script {
        Script::new(
            "script_0",
            vec![
                Instruction::new(Opcode::Begin, vec![Param::Int(0), Param::Int(0)], false, 0x10),
                Instruction::new(Opcode::PushInt, vec![Param::Int(1)], true, 0x15),
                Instruction::new(Opcode::If, vec![Param::Target(0x24)], false, 0x1A),
                Instruction::new(Opcode::PushInt, vec![Param::Float(1.5)], true, 0x1F),
                Instruction::new(Opcode::Pop, vec![], false, 0x23),
                Instruction::new(Opcode::Return, vec![], false, 0x24),
            ],
            (0x10, 0x25),
        )
    }

    #[test]
    fn test_labels_precede_targets() {
        let output = disassemble_script(&sample());
        let label = output.find("loc_24:").unwrap();
        let ret = output.find("return_7").unwrap();
        assert!(label < ret);
    }

    #[test]
    fn test_push_bit_marker() {
        let ins = Instruction::new(Opcode::PushInt, vec![Param::Int(5)], true, 0);
        assert!(format_instruction(&ins).starts_with("pushInt*"));
        assert!(format_instruction(&ins).ends_with("0x5"));
    }

    #[test]
    fn test_program_header_flags_entry_and_stack_errors() {
        let mut broken = sample();
        broken.name = "broken".to_string();
        broken.bounds = (0x100, 0x125);
        // the branch now has no condition to pop
        broken.instructions.remove(1);

        let program = Program {
            scripts: vec![sample(), broken],
            strings: vec![],
            entry_point: 0x10,
        };
        let output = disassemble_program(&program);
        assert!(output.contains("script_0 (entry point)"));
        assert!(output.contains("stack-check error"));
    }
}
