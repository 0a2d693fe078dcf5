//! Column and ColumnInfo types for user-facing API.
//!
//! These types provide a clean interface for accessing column information
//! from query results, derived from the internal ColumnMetadata.

use crate::error::Result;

use super::metadata::ColumnMetadata;
use super::oracle_type::OracleType;

/// A column in a result set (user-facing representation).
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Column data type.
    pub data_type: OracleType,
    /// Raw Oracle type number.
    pub oracle_type_num: u8,
}

impl Column {
    /// Create a column from metadata.
    ///
    /// Returns error if the Oracle type is not supported.
    pub fn from_metadata(meta: &ColumnMetadata) -> Result<Self> {
        Ok(Self {
            name: meta.name.clone(),
            nullable: meta.nullable,
            data_type: OracleType::from_raw(
                meta.oracle_type,
                meta.precision,
                meta.scale,
                meta.max_size,
                meta.csfrm,
            )?,
            oracle_type_num: meta.oracle_type,
        })
    }
}

/// Shared column information for all rows in a result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column definitions.
    pub columns: Vec<Column>,
}

impl ColumnInfo {
    /// Create new column info from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Create column info from internal metadata.
    ///
    /// Returns error if any column has an unsupported Oracle type.
    pub fn from_metadata(metadata: &[ColumnMetadata]) -> Result<Self> {
        let columns: Result<Vec<Column>> = metadata.iter().map(Column::from_metadata).collect();
        Ok(Self { columns: columns? })
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by index.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find column index by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
