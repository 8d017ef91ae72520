/// Failure that ends decompilation of a single script.
///
/// These never escape the function boundary: the pipeline turns each one
/// into a comment in place of the function body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecompileError {
    #[error("script {0} doesn't start with a begin")]
    MissingBegin(String),

    #[error("label for {op} at {position:#x} not found (target {target:#x})")]
    LabelNotFound {
        op: String,
        position: u32,
        target: u32,
    },

    #[error("call group opened at {position:#x} is never closed")]
    UnterminatedCallGroup { position: u32 },

    #[error("call group opened at {position:#x} doesn't end in a call")]
    MalformedCallGroup { position: u32 },

    #[error("backward branch at {position:#x} is not a recognizable loop")]
    UnstructuredLoop { position: u32 },

    #[error("if/else shape at {position:#x} needs manual review")]
    UnclassifiedIfElse { position: u32 },

    #[error("no value found for cast at {position:#x} ({back} results back)")]
    CastTargetNotFound { position: u32, back: i64 },

    #[error("stack underflow: {context} needs {needed} operands, found {found}")]
    StackUnderflow {
        context: String,
        needed: usize,
        found: usize,
    },

    #[error("found a bad if/else ternary block")]
    BadTernary,

    #[error("local variable {slot} is outside the {count} declared slots")]
    UnknownLocal { slot: usize, count: usize },

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

pub type Result<T> = std::result::Result<T, DecompileError>;
