//! Oracle data type enum with type-specific attributes.
//!
//! Nullability is a column property, not a type property.

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Oracle data type with type-specific attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleType {
    /// VARCHAR2(max_size) - variable-length string.
    Varchar2 { max_size: u32 },
    /// NUMBER(precision, scale) - numeric type.
    Number { precision: i8, scale: i8 },
    /// BINARY_INTEGER - integer type.
    BinaryInteger,
    /// BINARY_FLOAT - IEEE-754 single precision.
    BinaryFloat,
    /// BINARY_DOUBLE - IEEE-754 double precision.
    BinaryDouble,
    /// LONG - legacy large text type.
    Long,
    /// LONG RAW - legacy large binary type.
    LongRaw,
    /// CHAR(size) - fixed-length string.
    Char { max_size: u32 },
    /// RAW(size) - variable-length binary.
    Raw { max_size: u32 },
    /// DATE - date/time (no timezone, second precision).
    Date,
    /// TIMESTAMP - fractional-second precision.
    Timestamp,
    /// TIMESTAMP WITH TIME ZONE.
    TimestampTz,
    /// TIMESTAMP WITH LOCAL TIME ZONE.
    TimestampLtz,
    /// INTERVAL DAY TO SECOND.
    IntervalDs,
    /// ROWID.
    Rowid,
    /// BOOLEAN.
    Boolean,
    /// CLOB - Character Large Object.
    Clob,
    /// NCLOB - National Character Large Object.
    Nclob,
    /// BLOB - Binary Large Object.
    Blob,
}

impl OracleType {
    /// Create from raw Oracle type number and metadata.
    ///
    /// Returns `Err(Error::UnsupportedType)` for unsupported types.
    pub fn from_raw(
        oracle_type: u8,
        precision: i8,
        scale: i8,
        max_size: u32,
        csfrm: u8,
    ) -> Result<Self> {
        match oracle_type as u16 {
            ORA_TYPE_NUM_VARCHAR => Ok(OracleType::Varchar2 { max_size }),
            ORA_TYPE_NUM_NUMBER => Ok(OracleType::Number { precision, scale }),
            ORA_TYPE_NUM_BINARY_INTEGER => Ok(OracleType::BinaryInteger),
            ORA_TYPE_NUM_BINARY_FLOAT => Ok(OracleType::BinaryFloat),
            ORA_TYPE_NUM_BINARY_DOUBLE => Ok(OracleType::BinaryDouble),
            ORA_TYPE_NUM_LONG => Ok(OracleType::Long),
            ORA_TYPE_NUM_LONG_RAW => Ok(OracleType::LongRaw),
            ORA_TYPE_NUM_CHAR => Ok(OracleType::Char { max_size }),
            ORA_TYPE_NUM_RAW => Ok(OracleType::Raw { max_size }),
            ORA_TYPE_NUM_DATE => Ok(OracleType::Date),
            ORA_TYPE_NUM_TIMESTAMP => Ok(OracleType::Timestamp),
            ORA_TYPE_NUM_TIMESTAMP_TZ => Ok(OracleType::TimestampTz),
            ORA_TYPE_NUM_TIMESTAMP_LTZ => Ok(OracleType::TimestampLtz),
            ORA_TYPE_NUM_INTERVAL_DS => Ok(OracleType::IntervalDs),
            ORA_TYPE_NUM_ROWID | ORA_TYPE_NUM_UROWID => Ok(OracleType::Rowid),
            ORA_TYPE_NUM_BOOLEAN => Ok(OracleType::Boolean),
            ORA_TYPE_NUM_CLOB if csfrm == CS_FORM_NCHAR => Ok(OracleType::Nclob),
            ORA_TYPE_NUM_CLOB => Ok(OracleType::Clob),
            ORA_TYPE_NUM_BLOB => Ok(OracleType::Blob),
            _ => Err(Error::UnsupportedType {
                type_num: oracle_type,
            }),
        }
    }

    /// Get the Oracle type number.
    pub fn type_num(&self) -> u8 {
        let num = match self {
            OracleType::Varchar2 { .. } => ORA_TYPE_NUM_VARCHAR,
            OracleType::Number { .. } => ORA_TYPE_NUM_NUMBER,
            OracleType::BinaryInteger => ORA_TYPE_NUM_BINARY_INTEGER,
            OracleType::BinaryFloat => ORA_TYPE_NUM_BINARY_FLOAT,
            OracleType::BinaryDouble => ORA_TYPE_NUM_BINARY_DOUBLE,
            OracleType::Long => ORA_TYPE_NUM_LONG,
            OracleType::LongRaw => ORA_TYPE_NUM_LONG_RAW,
            OracleType::Char { .. } => ORA_TYPE_NUM_CHAR,
            OracleType::Raw { .. } => ORA_TYPE_NUM_RAW,
            OracleType::Date => ORA_TYPE_NUM_DATE,
            OracleType::Timestamp => ORA_TYPE_NUM_TIMESTAMP,
            OracleType::TimestampTz => ORA_TYPE_NUM_TIMESTAMP_TZ,
            OracleType::TimestampLtz => ORA_TYPE_NUM_TIMESTAMP_LTZ,
            OracleType::IntervalDs => ORA_TYPE_NUM_INTERVAL_DS,
            OracleType::Rowid => ORA_TYPE_NUM_ROWID,
            OracleType::Boolean => ORA_TYPE_NUM_BOOLEAN,
            OracleType::Clob | OracleType::Nclob => ORA_TYPE_NUM_CLOB,
            OracleType::Blob => ORA_TYPE_NUM_BLOB,
        };
        num as u8
    }

    /// Whether this type is fetched through a LOB locator.
    pub fn is_lob(&self) -> bool {
        matches!(self, OracleType::Clob | OracleType::Nclob | OracleType::Blob)
    }

    /// The family member used for implicit "long" fetching when the client
    /// opts out of LOB locators.
    pub fn long_fallback(&self) -> Option<OracleType> {
        match self {
            OracleType::Clob | OracleType::Nclob => Some(OracleType::Long),
            OracleType::Blob => Some(OracleType::LongRaw),
            _ => None,
        }
    }

    /// Get precision (for Number types, 0 otherwise).
    pub fn precision(&self) -> i8 {
        match self {
            OracleType::Number { precision, .. } => *precision,
            _ => 0,
        }
    }

    /// Get scale (for Number types, 0 otherwise).
    pub fn scale(&self) -> i8 {
        match self {
            OracleType::Number { scale, .. } => *scale,
            _ => 0,
        }
    }

    /// Get max_size (for sized types like Varchar2/Char/Raw, 0 otherwise).
    pub fn max_size(&self) -> u32 {
        match self {
            OracleType::Varchar2 { max_size }
            | OracleType::Char { max_size }
            | OracleType::Raw { max_size } => *max_size,
            _ => 0,
        }
    }
}

impl std::fmt::Display for OracleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleType::Varchar2 { max_size } => write!(f, "VARCHAR2({})", max_size),
            OracleType::Number { precision, scale } => {
                if *precision == 0 && *scale == 0 {
                    write!(f, "NUMBER")
                } else if *scale == 0 {
                    write!(f, "NUMBER({})", precision)
                } else {
                    write!(f, "NUMBER({},{})", precision, scale)
                }
            }
            OracleType::BinaryInteger => write!(f, "BINARY_INTEGER"),
            OracleType::BinaryFloat => write!(f, "BINARY_FLOAT"),
            OracleType::BinaryDouble => write!(f, "BINARY_DOUBLE"),
            OracleType::Long => write!(f, "LONG"),
            OracleType::LongRaw => write!(f, "LONG RAW"),
            OracleType::Char { max_size } => write!(f, "CHAR({})", max_size),
            OracleType::Raw { max_size } => write!(f, "RAW({})", max_size),
            OracleType::Date => write!(f, "DATE"),
            OracleType::Timestamp => write!(f, "TIMESTAMP"),
            OracleType::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            OracleType::TimestampLtz => write!(f, "TIMESTAMP WITH LOCAL TIME ZONE"),
            OracleType::IntervalDs => write!(f, "INTERVAL DAY TO SECOND"),
            OracleType::Rowid => write!(f, "ROWID"),
            OracleType::Boolean => write!(f, "BOOLEAN"),
            OracleType::Clob => write!(f, "CLOB"),
            OracleType::Nclob => write!(f, "NCLOB"),
            OracleType::Blob => write!(f, "BLOB"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_varchar2() {
        let t = OracleType::from_raw(ORA_TYPE_NUM_VARCHAR as u8, 0, 0, 100, 1);
        assert_eq!(t.unwrap(), OracleType::Varchar2 { max_size: 100 });
    }

    #[test]
    fn test_from_raw_number() {
        let t = OracleType::from_raw(ORA_TYPE_NUM_NUMBER as u8, 10, 2, 0, 0);
        assert_eq!(
            t.unwrap(),
            OracleType::Number {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_from_raw_nclob_by_csfrm() {
        let t = OracleType::from_raw(ORA_TYPE_NUM_CLOB as u8, 0, 0, 0, CS_FORM_NCHAR);
        assert_eq!(t.unwrap(), OracleType::Nclob);
        let t = OracleType::from_raw(ORA_TYPE_NUM_CLOB as u8, 0, 0, 0, CS_FORM_IMPLICIT);
        assert_eq!(t.unwrap(), OracleType::Clob);
    }

    #[test]
    fn test_from_raw_unsupported() {
        let t = OracleType::from_raw(255, 0, 0, 0, 0);
        match t {
            Err(Error::UnsupportedType { type_num }) => assert_eq!(type_num, 255),
            _ => panic!("Expected UnsupportedType error"),
        }
    }

    #[test]
    fn test_long_fallback() {
        assert_eq!(OracleType::Clob.long_fallback(), Some(OracleType::Long));
        assert_eq!(OracleType::Blob.long_fallback(), Some(OracleType::LongRaw));
        assert_eq!(OracleType::Date.long_fallback(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", OracleType::Varchar2 { max_size: 50 }),
            "VARCHAR2(50)"
        );
        assert_eq!(
            format!(
                "{}",
                OracleType::Number {
                    precision: 10,
                    scale: 2
                }
            ),
            "NUMBER(10,2)"
        );
        assert_eq!(
            format!("{}", OracleType::IntervalDs),
            "INTERVAL DAY TO SECOND"
        );
    }
}
