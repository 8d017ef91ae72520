/// Literal value in decompiled source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer literal, rendered in hexadecimal except for zero.
    Integer(i64),

    /// 32-bit float literal, rendered with an `f` suffix.
    Float(f32),

    /// String literal, rendered double-quoted and verbatim.
    String(String),

    /// Boolean literal.
    Bool(bool),
}

impl Value {
    /// `Some(true)` / `Some(false)` for literals usable as a truth-table leaf.
    pub fn as_truth(&self) -> Option<bool> {
        match self {
            Value::Integer(0) | Value::Bool(false) => Some(false),
            Value::Integer(1) | Value::Bool(true) => Some(true),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value using C surface syntax.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(0) => write!(f, "0"),
            Value::Integer(n) if *n < 0 => write!(f, "-{:#x}", n.unsigned_abs()),
            Value::Integer(n) => write!(f, "{:#x}", n),
            Value::Float(n) => {
                let text = n.to_string();
                if text.contains('.') || text.contains("inf") || text.contains("NaN") {
                    write!(f, "{}f", text)
                } else {
                    write!(f, "{}.0f", text)
                }
            }
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_hex_except_zero() {
        assert_eq!(Value::Integer(0).to_string(), "0");
        assert_eq!(Value::Integer(5).to_string(), "0x5");
        assert_eq!(Value::Integer(255).to_string(), "0xff");
        assert_eq!(Value::Integer(-16).to_string(), "-0x10");
    }

    #[test]
    fn test_floats_carry_suffix() {
        assert_eq!(Value::Float(1.5).to_string(), "1.5f");
        assert_eq!(Value::Float(100.0).to_string(), "100.0f");
        assert_eq!(Value::Float(-0.25).to_string(), "-0.25f");
    }

    #[test]
    fn test_strings_and_bools() {
        assert_eq!(Value::String("a %d".to_string()).to_string(), "\"a %d\"");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_truth_leaves() {
        assert_eq!(Value::Integer(1).as_truth(), Some(true));
        assert_eq!(Value::Bool(false).as_truth(), Some(false));
        assert_eq!(Value::Integer(2).as_truth(), None);
    }
}
