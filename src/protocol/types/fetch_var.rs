//! Fetch variable definitions for column defines.
//!
//! When re-defining a query, the client tells the server what format it
//! expects for each column. This matters most for LOB columns where the
//! prefetch flag and size must be specified, and for the implicit "long"
//! fallback when LOB locators are not wanted.

use crate::protocol::constants::*;
use crate::protocol::types::ColumnMetadata;

/// Metadata for a fetch variable (column define).
///
/// Sent to the server as part of the execute message when
/// `TNS_EXEC_OPTION_DEFINE` is set.
#[derive(Debug, Clone)]
pub struct FetchVar {
    /// Oracle data type number.
    pub ora_type_num: u8,
    /// Bind flags (TNS_BIND_USE_INDICATORS, TNS_BIND_ARRAY).
    pub flags: u8,
    /// Buffer size for this column.
    pub buffer_size: u32,
    /// Max array elements (0 if not array).
    pub max_num_elements: u32,
    /// Content flags (includes TNS_LOB_PREFETCH_FLAG for LOBs).
    pub cont_flag: u64,
    /// Character set ID (UTF-8 id for text, 0 for binary).
    pub charset_id: u16,
    /// Character set form.
    pub charset_form: u8,
    /// LOB prefetch length in bytes.
    pub lob_prefetch_length: u32,
}

impl FetchVar {
    /// Create a fetch var for a regular (non-LOB) column.
    pub fn new(ora_type_num: u8, buffer_size: u32, charset_form: u8) -> Self {
        Self {
            ora_type_num,
            flags: TNS_BIND_USE_INDICATORS as u8,
            buffer_size,
            max_num_elements: 0,
            cont_flag: 0,
            charset_id: if charset_form != 0 {
                TNS_CHARSET_UTF8
            } else {
                0
            },
            charset_form,
            lob_prefetch_length: 0,
        }
    }

    /// Create a fetch var for a LOB column with prefetch enabled.
    pub fn new_lob(ora_type_num: u8, buffer_size: u32, prefetch_length: u32) -> Self {
        let is_clob = ora_type_num == ORA_TYPE_NUM_CLOB as u8;
        Self {
            ora_type_num,
            flags: TNS_BIND_USE_INDICATORS as u8,
            buffer_size,
            max_num_elements: 0,
            cont_flag: TNS_LOB_PREFETCH_FLAG,
            charset_id: if is_clob { TNS_CHARSET_UTF8 } else { 0 },
            charset_form: if is_clob { CS_FORM_IMPLICIT } else { 0 },
            lob_prefetch_length: prefetch_length,
        }
    }

    /// Check if this is a LOB type (CLOB, BLOB, BFILE).
    pub fn is_lob(&self) -> bool {
        matches!(
            self.ora_type_num as u16,
            ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_BLOB | ORA_TYPE_NUM_BFILE
        )
    }

    /// Check if LOB prefetch is enabled.
    pub fn has_lob_prefetch(&self) -> bool {
        self.cont_flag & TNS_LOB_PREFETCH_FLAG != 0
    }
}

/// Build fetch var definitions from column metadata.
///
/// Used after receiving DescribeInfo to build the define metadata for a
/// subsequent DEFINE+FETCH operation. When `fetch_lobs` is false, LOB
/// columns fall back to their LONG / LONG RAW family members so the data
/// arrives inline.
pub fn build_fetch_vars(
    columns: &[ColumnMetadata],
    lob_prefetch_size: u32,
    fetch_lobs: bool,
) -> Vec<FetchVar> {
    columns
        .iter()
        .map(|col| {
            let ora_type_num = col.oracle_type;

            // ROWID/UROWID come back as text
            if ora_type_num as u16 == ORA_TYPE_NUM_ROWID
                || ora_type_num as u16 == ORA_TYPE_NUM_UROWID
            {
                return FetchVar::new(ORA_TYPE_NUM_VARCHAR as u8, TNS_MAX_UROWID_LENGTH, 0);
            }

            match ora_type_num as u16 {
                ORA_TYPE_NUM_CLOB if !fetch_lobs => {
                    FetchVar::new(ORA_TYPE_NUM_LONG as u8, TNS_MAX_LONG_LENGTH, CS_FORM_IMPLICIT)
                }
                ORA_TYPE_NUM_BLOB if !fetch_lobs => {
                    FetchVar::new(ORA_TYPE_NUM_LONG_RAW as u8, TNS_MAX_LONG_LENGTH, 0)
                }
                ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_BLOB => FetchVar::new_lob(
                    ora_type_num,
                    if lob_prefetch_size > 0 {
                        lob_prefetch_size
                    } else {
                        col.buffer_size
                    },
                    lob_prefetch_size,
                ),
                ORA_TYPE_NUM_BFILE => FetchVar::new_lob(ora_type_num, col.buffer_size, 0),
                ORA_TYPE_NUM_VARCHAR | ORA_TYPE_NUM_CHAR | ORA_TYPE_NUM_LONG => {
                    FetchVar::new(ora_type_num, col.buffer_size, CS_FORM_IMPLICIT)
                }
                _ => FetchVar::new(ora_type_num, col.buffer_size, 0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_column() {
        let var = FetchVar::new(ORA_TYPE_NUM_VARCHAR as u8, 100, 1);
        assert_eq!(var.ora_type_num, ORA_TYPE_NUM_VARCHAR as u8);
        assert_eq!(var.buffer_size, 100);
        assert_eq!(var.charset_id, TNS_CHARSET_UTF8);
        assert!(!var.is_lob());
        assert!(!var.has_lob_prefetch());
    }

    #[test]
    fn test_clob_column() {
        let var = FetchVar::new_lob(ORA_TYPE_NUM_CLOB as u8, 4000, TNS_DEFAULT_LOB_PREFETCH_SIZE);
        assert_eq!(var.charset_id, TNS_CHARSET_UTF8);
        assert_eq!(var.charset_form, CS_FORM_IMPLICIT);
        assert_eq!(var.lob_prefetch_length, TNS_DEFAULT_LOB_PREFETCH_SIZE);
        assert!(var.is_lob());
        assert!(var.has_lob_prefetch());
    }

    #[test]
    fn test_blob_column() {
        let var = FetchVar::new_lob(ORA_TYPE_NUM_BLOB as u8, 4000, TNS_DEFAULT_LOB_PREFETCH_SIZE);
        assert_eq!(var.charset_id, 0);
        assert_eq!(var.charset_form, 0);
        assert!(var.is_lob());
    }

    #[test]
    fn test_lob_family_fallback_when_lobs_disabled() {
        let columns = vec![
            ColumnMetadata::new("DOC".to_string(), ORA_TYPE_NUM_CLOB as u8),
            ColumnMetadata::new("IMG".to_string(), ORA_TYPE_NUM_BLOB as u8),
        ];
        let vars = build_fetch_vars(&columns, 0, false);
        assert_eq!(vars[0].ora_type_num, ORA_TYPE_NUM_LONG as u8);
        assert_eq!(vars[1].ora_type_num, ORA_TYPE_NUM_LONG_RAW as u8);
    }

    #[test]
    fn test_rowid_fetched_as_text() {
        let columns = vec![ColumnMetadata::new(
            "RID".to_string(),
            ORA_TYPE_NUM_ROWID as u8,
        )];
        let vars = build_fetch_vars(&columns, 0, true);
        assert_eq!(vars[0].ora_type_num, ORA_TYPE_NUM_VARCHAR as u8);
        assert_eq!(vars[0].buffer_size, TNS_MAX_UROWID_LENGTH);
    }
}
