use crate::symbols::SymbolTable;

/// Tuning knobs for the decompilation pipeline.
#[derive(Debug, Clone)]
pub struct DecompilerConfig {
    /// Whole-program reference-analysis passes run before the final pass.
    pub analysis_passes: usize,
    /// Rounds allowed for return types to settle across call chains.
    pub return_type_rounds: usize,
    /// Deepest block or branch nesting accepted before a script is failed.
    pub max_nesting: usize,
    /// Cap on following "returns the same as callee" links.
    pub max_chain: usize,
    /// Optional names for syscalls, their methods and global slots.
    pub symbols: Option<SymbolTable>,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            analysis_passes: 2,
            return_type_rounds: 4,
            max_nesting: 256,
            max_chain: 10_000,
            symbols: None,
        }
    }
}

impl DecompilerConfig {
    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = Some(symbols);
        self
    }
}
