use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::field::FieldType;

/// A single field value carried by an entity instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(Decimal),
    String(String),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
    Byte(u8),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The semantic type of the value, or `None` for Null
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Decimal(_) => Some(FieldType::Decimal),
            Value::String(_) => Some(FieldType::String),
            Value::DateTime(_) => Some(FieldType::DateTime),
            Value::Binary(_) => Some(FieldType::Binary),
            Value::Byte(_) => Some(FieldType::Byte),
        }
    }

    /// Short type label used in validation messages
    pub fn type_name(&self) -> &'static str {
        self.field_type().map(|t| t.as_str()).unwrap_or("null")
    }

    /// Integer view of Integer and Byte values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Byte(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value leaves a store-generated key for the store to fill
    ///
    /// Null and the zero value of the key type both mean "not assigned yet".
    pub fn is_unassigned_key(&self) -> bool {
        matches!(self, Value::Null | Value::Integer(0) | Value::Byte(0))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Binary(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Byte(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_key_values() {
        assert!(Value::Null.is_unassigned_key());
        assert!(Value::Integer(0).is_unassigned_key());
        assert!(Value::Byte(0).is_unassigned_key());
        assert!(!Value::Integer(7).is_unassigned_key());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Byte(3).to_string(), "3");
        assert_eq!(Value::Binary(vec![0, 171]).to_string(), "0x00ab");
        assert_eq!(Value::Decimal(Decimal::new(450, 2)).to_string(), "4.50");
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let json = serde_json::to_string(&Value::Integer(5)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":5}"#);
    }
}
