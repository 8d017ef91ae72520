use crate::bytecode::Instruction;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("stack-check error: {message}")]
pub struct StackCheckError {
    pub message: String,
    /// Position of the offending instruction.
    pub position: u32,
}

impl StackCheckError {
    fn new(message: impl Into<String>, position: u32) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Check stack depth with a given initial height.
///
/// NOTE: This is a simple linear scan that doesn't follow jump targets.
/// Both arms of an if/else are counted, so the height over-approximates at
/// join points; an underflow reported here is still a real inconsistency.
pub fn check_instructions_with_initial(
    instructions: &[Instruction],
    initial_height: i64,
) -> Result<(), StackCheckError> {
    let mut h: i64 = initial_height;

    for ins in instructions {
        let pops = ins.pops() as i64;
        h -= pops;
        if h < 0 {
            return Err(StackCheckError::new(
                format!(
                    "stack underflow at {:#x}, op={}, needed {} items",
                    ins.position, ins.op, pops
                ),
                ins.position,
            ));
        }
        if ins.push_bit {
            h += 1;
        }
    }

    Ok(())
}

/// Check stack depth starting from an empty stack.
pub fn check_instructions(instructions: &[Instruction]) -> Result<(), StackCheckError> {
    check_instructions_with_initial(instructions, 0)
}
