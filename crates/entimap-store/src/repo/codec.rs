//! Value encoding between entity values and SQLite storage classes
//!
//! Decimals are stored as their canonical text so no precision is lost;
//! date-times as RFC 3339 text in UTC. Text written by SQLite itself
//! (`CURRENT_TIMESTAMP`) is accepted on read.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use entimap_core::{FieldType, Value};
use rust_decimal::Decimal;
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Encode a value for binding as a statement parameter
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Byte(v) => SqlValue::Integer(i64::from(*v)),
        Value::Decimal(v) => SqlValue::Text(v.to_string()),
        Value::String(v) => SqlValue::Text(v.clone()),
        Value::DateTime(v) => SqlValue::Text(format_date_time(v)),
        Value::Binary(v) => SqlValue::Blob(v.clone()),
    }
}

pub fn format_date_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Decode a column read back from SQLite
///
/// # Errors
///
/// A message naming the mismatch when the stored value cannot represent
/// `field_type`.
pub fn from_sql(field_type: FieldType, raw: ValueRef<'_>) -> Result<Value, String> {
    if let ValueRef::Null = raw {
        return Ok(Value::Null);
    }

    match field_type {
        FieldType::Integer => integer(raw).map(Value::Integer),
        FieldType::Byte => {
            let v = integer(raw)?;
            u8::try_from(v)
                .map(Value::Byte)
                .map_err(|_| format!("{} is out of byte range", v))
        }
        FieldType::Decimal => match raw {
            ValueRef::Text(bytes) => {
                let text = utf8(bytes)?;
                Decimal::from_str(text)
                    .map(Value::Decimal)
                    .map_err(|e| format!("invalid decimal {:?}: {}", text, e))
            }
            ValueRef::Integer(v) => Ok(Value::Decimal(Decimal::from(v))),
            ValueRef::Real(v) => Decimal::try_from(v)
                .map(Value::Decimal)
                .map_err(|e| format!("invalid decimal {}: {}", v, e)),
            other => Err(format!("expected decimal text, got {:?}", other.data_type())),
        },
        FieldType::String => match raw {
            ValueRef::Text(bytes) => utf8(bytes).map(|s| Value::String(s.to_string())),
            ValueRef::Integer(v) => Ok(Value::String(v.to_string())),
            ValueRef::Real(v) => Ok(Value::String(v.to_string())),
            other => Err(format!("expected text, got {:?}", other.data_type())),
        },
        FieldType::DateTime => match raw {
            ValueRef::Text(bytes) => parse_date_time(utf8(bytes)?).map(Value::DateTime),
            other => Err(format!("expected date-time text, got {:?}", other.data_type())),
        },
        FieldType::Binary => match raw {
            ValueRef::Blob(bytes) => Ok(Value::Binary(bytes.to_vec())),
            ValueRef::Text(bytes) => Ok(Value::Binary(bytes.to_vec())),
            other => Err(format!("expected blob, got {:?}", other.data_type())),
        },
    }
}

fn integer(raw: ValueRef<'_>) -> Result<i64, String> {
    match raw {
        ValueRef::Integer(v) => Ok(v),
        other => Err(format!("expected integer, got {:?}", other.data_type())),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("invalid utf-8: {}", e))
}

fn parse_date_time(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("invalid date-time {:?}: {}", text, e))
}
