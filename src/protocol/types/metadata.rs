//! Internal column metadata from wire format.
//!
//! This struct preserves the raw DescribeInfo data. For user-facing API,
//! use `Column` which provides a cleaner interface.

/// Internal column metadata from the DescribeInfo message.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Oracle data type number (raw wire format).
    pub oracle_type: u8,
    /// Numeric precision.
    pub precision: i8,
    /// Numeric scale.
    pub scale: i8,
    /// Maximum size in bytes.
    pub max_size: u32,
    /// Buffer size for this column.
    pub buffer_size: u32,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Character set form (implicit or NCHAR).
    pub csfrm: u8,
    /// Owning schema, when supplied.
    pub schema: Option<String>,
    /// Named type name, when supplied.
    pub type_name: Option<String>,
}

impl ColumnMetadata {
    /// Create new column metadata with minimal info.
    pub fn new(name: String, oracle_type: u8) -> Self {
        Self {
            name,
            oracle_type,
            precision: 0,
            scale: 0,
            max_size: 0,
            buffer_size: 0,
            nullable: true,
            csfrm: 0,
            schema: None,
            type_name: None,
        }
    }
}
