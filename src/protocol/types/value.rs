//! Oracle value types for query results and bind parameters.

use crate::protocol::codec::RowId;
use crate::protocol::types::LobValue;
use chrono::{Duration, NaiveDateTime};
use std::fmt;

/// A single column or bind value.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleValue {
    /// NULL value.
    Null,
    /// String value (VARCHAR2, CHAR, LONG, inline CLOB).
    String(String),
    /// Number value as decimal text (preserves full precision).
    Number(String),
    /// Integer convenience variant; transmitted as NUMBER.
    Integer(i64),
    /// BINARY_DOUBLE value (also used for BINARY_FLOAT).
    Double(f64),
    /// Raw bytes (RAW, LONG RAW, inline BLOB).
    Bytes(Vec<u8>),
    /// DATE value (second precision).
    Date(NaiveDateTime),
    /// TIMESTAMP value (fractional seconds, no timezone).
    Timestamp(NaiveDateTime),
    /// TIMESTAMP WITH TIME ZONE: datetime plus offset minutes east of UTC.
    TimestampTz(NaiveDateTime, i32),
    /// INTERVAL DAY TO SECOND value.
    IntervalDs(Duration),
    /// BOOLEAN value.
    Boolean(bool),
    /// ROWID value.
    Rowid(RowId),
    /// LOB locator, possibly with prefetched data.
    Lob(LobValue),
}

impl OracleValue {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, OracleValue::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OracleValue::String(s) => Some(s),
            OracleValue::Number(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            OracleValue::Number(s) => s.parse().ok(),
            OracleValue::Integer(v) => Some(*v),
            OracleValue::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            OracleValue::Number(s) => s.parse().ok(),
            OracleValue::Integer(v) => Some(*v as f64),
            OracleValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get the value as a NaiveDateTime.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            OracleValue::Date(dt)
            | OracleValue::Timestamp(dt)
            | OracleValue::TimestampTz(dt, _) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OracleValue::Bytes(b) => Some(b),
            OracleValue::Lob(lob) => lob.as_bytes(),
            _ => None,
        }
    }

    /// Try to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OracleValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for OracleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleValue::Null => write!(f, "NULL"),
            OracleValue::String(s) => write!(f, "{}", s),
            OracleValue::Number(n) => write!(f, "{}", n),
            OracleValue::Integer(v) => write!(f, "{}", v),
            OracleValue::Double(v) => write!(f, "{}", v),
            OracleValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            OracleValue::Date(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            OracleValue::Timestamp(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            OracleValue::TimestampTz(dt, offset) => {
                let sign = if *offset < 0 { '-' } else { '+' };
                write!(
                    f,
                    "{} {}{:02}:{:02}",
                    dt.format("%Y-%m-%d %H:%M:%S%.f"),
                    sign,
                    offset.abs() / 60,
                    offset.abs() % 60
                )
            }
            OracleValue::IntervalDs(d) => write!(f, "{}s", d.num_milliseconds() as f64 / 1000.0),
            OracleValue::Boolean(b) => write!(f, "{}", b),
            OracleValue::Rowid(r) => write!(f, "{}", r),
            OracleValue::Lob(lob) => write!(f, "<LOB size={}>", lob.size()),
        }
    }
}

impl From<i64> for OracleValue {
    fn from(v: i64) -> Self {
        OracleValue::Integer(v)
    }
}

impl From<i32> for OracleValue {
    fn from(v: i32) -> Self {
        OracleValue::Integer(v as i64)
    }
}

impl From<f64> for OracleValue {
    fn from(v: f64) -> Self {
        OracleValue::Double(v)
    }
}

impl From<&str> for OracleValue {
    fn from(v: &str) -> Self {
        OracleValue::String(v.to_string())
    }
}

impl From<String> for OracleValue {
    fn from(v: String) -> Self {
        OracleValue::String(v)
    }
}

impl From<Vec<u8>> for OracleValue {
    fn from(v: Vec<u8>) -> Self {
        OracleValue::Bytes(v)
    }
}

impl From<bool> for OracleValue {
    fn from(v: bool) -> Self {
        OracleValue::Boolean(v)
    }
}

impl From<NaiveDateTime> for OracleValue {
    fn from(v: NaiveDateTime) -> Self {
        OracleValue::Timestamp(v)
    }
}

impl<T: Into<OracleValue>> From<Option<T>> for OracleValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => OracleValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_value_null() {
        let val = OracleValue::Null;
        assert!(val.is_null());
        assert_eq!(val.as_str(), None);
        assert_eq!(format!("{}", val), "NULL");
    }

    #[test]
    fn test_oracle_value_string() {
        let val = OracleValue::String("hello".to_string());
        assert!(!val.is_null());
        assert_eq!(val.as_str(), Some("hello"));
        assert_eq!(format!("{}", val), "hello");
    }

    #[test]
    fn test_oracle_value_number() {
        let val = OracleValue::Number("123.45".to_string());
        assert_eq!(val.to_i64(), None);
        assert_eq!(val.to_f64(), Some(123.45));

        let int_val = OracleValue::Number("42".to_string());
        assert_eq!(int_val.to_i64(), Some(42));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(OracleValue::from(5i64), OracleValue::Integer(5));
        assert_eq!(
            OracleValue::from("x"),
            OracleValue::String("x".to_string())
        );
        assert_eq!(OracleValue::from(true), OracleValue::Boolean(true));
        assert_eq!(OracleValue::from(None::<i64>), OracleValue::Null);
        assert_eq!(OracleValue::from(Some(7i64)), OracleValue::Integer(7));
    }

    #[test]
    fn test_bytes_display() {
        let val = OracleValue::Bytes(vec![0xDE, 0xAD]);
        assert_eq!(format!("{}", val), "DEAD");
    }
}
