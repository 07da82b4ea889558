//! Values held by the state store
//!
//! Business logic only ever does arithmetic on integers; text and raw bytes
//! are carried through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value stored under a state key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Value {
    /// Placeholder for a key that exists but was never assigned
    #[default]
    Null,
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Integer payload, if this is a counter-style value
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_integers_accumulate() {
        assert_eq!(Value::from(-3).as_i64(), Some(-3));
        assert_eq!(Value::from("12").as_i64(), None);
        assert_eq!(Value::default().as_i64(), None);
        assert_eq!(Value::from(vec![0u8; 4]).kind(), "bytes");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_string(), "bytes[3]");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
