//! Optional human names for syscalls, syscall methods and global slots.
//!
//! The table is a JSON document:
//!
//! ```json
//! {
//!   "syscalls": { "22": { "name": "sound", "methods": { "0": "play" } } },
//!   "globals": { "7": "current_action" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bytecode::container::LoadError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyscallSymbol {
    pub name: String,
    /// Sub-methods selected by an integer first argument.
    #[serde(default)]
    pub methods: BTreeMap<i64, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    #[serde(default)]
    pub syscalls: BTreeMap<i64, SyscallSymbol>,
    #[serde(default)]
    pub globals: BTreeMap<usize, String>,
}

impl SymbolTable {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn syscall(&self, id: i64) -> Option<&SyscallSymbol> {
        self.syscalls.get(&id)
    }

    pub fn global(&self, slot: usize) -> Option<&str> {
        self.globals.get(&slot).map(String::as_str)
    }
}

/// Name of a syscall, falling back to `sys_<HEX>`.
pub fn syscall_name(symbols: Option<&SymbolTable>, id: i64) -> String {
    symbols
        .and_then(|s| s.syscall(id))
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("sys_{:X}", id))
}

/// Name of a global slot, falling back to `global<N>`.
pub fn global_name(symbols: Option<&SymbolTable>, slot: usize) -> String {
    symbols
        .and_then(|s| s.global(slot))
        .map(str::to_string)
        .unwrap_or_else(|| format!("global{}", slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "syscalls": { "22": { "name": "sound", "methods": { "0": "play", "3": "stop" } },
                      "45": { "name": "rand" } },
        "globals": { "7": "current_action" }
    }"#;

    #[test]
    fn test_load_from_json() {
        let table = SymbolTable::from_json(SAMPLE).unwrap();
        let sound = table.syscall(22).unwrap();
        assert_eq!(sound.name, "sound");
        assert_eq!(sound.methods.get(&3).map(String::as_str), Some("stop"));
        assert!(table.syscall(45).unwrap().methods.is_empty());
        assert_eq!(table.global(7), Some("current_action"));
    }

    #[test]
    fn test_fallback_names() {
        let table = SymbolTable::from_json(SAMPLE).unwrap();
        assert_eq!(syscall_name(Some(&table), 45), "rand");
        assert_eq!(syscall_name(Some(&table), 0x2A), "sys_2A");
        assert_eq!(syscall_name(None, 0x29), "sys_29");
        assert_eq!(global_name(Some(&table), 7), "current_action");
        assert_eq!(global_name(None, 7), "global7");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            SymbolTable::from_json("{\"globals\": []"),
            Err(LoadError::Symbols(_))
        ));
    }
}
