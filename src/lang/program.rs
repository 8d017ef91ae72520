use super::node::Node;

/// Semantic type attached to declarations and function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Float,
    /// Boolean-flavored int, produced by comparisons.
    Bool,
    String,
    Void,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Void => "void",
        };
        write!(f, "{}", name)
    }
}

/// `ty name` or `ty name = init`
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub ty: ValueType,
    pub name: String,
    pub init: Option<Box<Node>>,
}

impl Decl {
    pub fn new(ty: ValueType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            init: None,
        }
    }
}

/// One decompiled script.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub ret: ValueType,
    pub name: String,
    pub params: Vec<Decl>,
    pub body: Vec<Node>,
}

/// Decompiled program: global declarations followed by every function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFile {
    pub globals: Vec<Decl>,
    pub functions: Vec<FuncDef>,
}
