//! Typed attribute values.
//!
//! Values are persisted as text in the value table; the paired definition row
//! records a [`TypeTag`] so the text can be decoded back into the variant it
//! was written from. Decoding never coerces: a tag/text mismatch is a
//! [`DecodeError`], not a silently wrong-typed value.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE TAG
// ============================================================================

/// Declared runtime type of a stored attribute value.
///
/// The tag is what the definition table's `type` column stores. It is chosen
/// once when a value enters the system and is the sole decode authority on
/// the way back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
}

impl TypeTag {
    /// Storage representation of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Text => "text",
        }
    }

    /// Parse a stored tag string.
    pub fn parse(tag: &str) -> Result<Self, DecodeError> {
        match tag {
            "null" => Ok(TypeTag::Null),
            "boolean" => Ok(TypeTag::Boolean),
            "integer" => Ok(TypeTag::Integer),
            "float" => Ok(TypeTag::Float),
            "text" => Ok(TypeTag::Text),
            other => Err(DecodeError::UnknownTag {
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// The tag recorded in the definition row for this value.
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Integer(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::Text(_) => TypeTag::Text,
        }
    }

    /// Encode for the untyped `value` column.
    pub fn to_storage_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Decode a stored text value under the tag its definition row declares.
    pub fn decode(tag: TypeTag, raw: &str) -> Result<Self, DecodeError> {
        match tag {
            TypeTag::Null => Ok(Value::Null),
            TypeTag::Boolean => match raw {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(DecodeError::InvalidValue {
                    tag,
                    raw: raw.to_string(),
                }),
            },
            TypeTag::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| {
                DecodeError::InvalidValue {
                    tag,
                    raw: raw.to_string(),
                }
            }),
            TypeTag::Float => raw.parse::<f64>().map(Value::Float).map_err(|_| {
                DecodeError::InvalidValue {
                    tag,
                    raw: raw.to_string(),
                }
            }),
            TypeTag::Text => Ok(Value::Text(raw.to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view used by typed comparisons; integers widen to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_text())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in [
            TypeTag::Null,
            TypeTag::Boolean,
            TypeTag::Integer,
            TypeTag::Float,
            TypeTag::Text,
        ] {
            assert_eq!(TypeTag::parse(tag.as_str()).unwrap(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = TypeTag::parse("double").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag { .. }));
    }

    #[test]
    fn test_value_storage_round_trip() {
        let values = [
            Value::Null,
            Value::Boolean(false),
            Value::Integer(-42),
            Value::Float(2.5),
            Value::Text("red".to_string()),
        ];
        for value in values {
            let decoded = Value::decode(value.tag(), &value.to_storage_text()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_decode_mismatch_is_error() {
        let err = Value::decode(TypeTag::Integer, "not-a-number").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { .. }));

        let err = Value::decode(TypeTag::Boolean, "1").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { .. }));
    }

    #[test]
    fn test_text_decode_is_verbatim() {
        // Text that looks numeric stays text under a text tag.
        let decoded = Value::decode(TypeTag::Text, "123").unwrap();
        assert_eq!(decoded, Value::Text("123".to_string()));
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Text("3".to_string()).as_f64(), None);
    }
}
