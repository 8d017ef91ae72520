//! Serialized program container.
//!
//! A [`Program`] is stored with `postcard` so a program parsed once from the
//! proprietary on-disk format can be decompiled repeatedly.

use std::path::Path;

use crate::bytecode::Program;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed program container: {0}")]
    Decode(#[from] postcard::Error),
    #[error("malformed symbol table: {0}")]
    Symbols(#[from] serde_json::Error),
}

impl LoadError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub fn from_bytes(bytes: &[u8]) -> Result<Program, LoadError> {
    Ok(postcard::from_bytes(bytes)?)
}

pub fn to_bytes(program: &Program) -> Result<Vec<u8>, LoadError> {
    Ok(postcard::to_allocvec(program)?)
}

pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Instruction, Opcode, Param, Script};

    #[test]
    fn test_container_keeps_program() {
        let program = Program {
            scripts: vec![Script::new(
                "main",
                vec![
                    Instruction::new(Opcode::Begin, vec![Param::Int(0), Param::Int(1)], false, 0x10),
                    Instruction::new(Opcode::PushInt, vec![Param::Int(5)], true, 0x15),
                    Instruction::new(Opcode::Unknown(0x4C), vec![], false, 0x1A),
                ],
                (0x10, 0x1B),
            )],
            strings: vec!["hello %d".to_string()],
            entry_point: 0x10,
        };

        let bytes = to_bytes(&program).unwrap();
        assert_eq!(from_bytes(&bytes).unwrap(), program);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = from_bytes(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(LoadError::Decode(_))));
    }
}
