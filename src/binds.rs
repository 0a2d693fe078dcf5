//! Bind parameter encoding.
//!
//! Bound values live in an arena of columns addressed by stable
//! [`BindRef`] ids. A ref bound more than once in the same statement
//! (the INOUT case) keeps its original position; the bind count never
//! grows on repeated appearance. Batch executions accumulate rows and
//! grow the per-column metadata to the elementwise maximum, since the
//! transmitted metadata must accommodate the largest row.

use crate::error::{Error, Result};
use crate::protocol::codec::{encode_binary_double, encode_date, encode_interval_ds, encode_number, encode_timestamp};
use crate::protocol::constants::*;
use crate::protocol::message::{bytes_with_length_wire_size, ub_wire_size, WriteExt};
use crate::protocol::types::OracleValue;

/// Stable identity of a bound value within one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindRef(u32);

impl BindRef {
    /// Zero-based bind position.
    pub fn position(&self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_position(position: u32) -> Self {
        Self(position)
    }
}

/// Per-column bind metadata, transmitted ahead of the row data.
#[derive(Debug, Clone)]
pub struct BindMetadata {
    /// Oracle data type number.
    pub ora_type_num: u8,
    /// Bind flags (array bit).
    pub flags: u8,
    /// Transmitted buffer size; the max over all batch rows, capped at
    /// the long limit for long binds.
    pub buffer_size: u32,
    /// Maximum encoded value size over all batch rows.
    pub max_size: u32,
    /// Maximum array elements (0 for scalar binds).
    pub max_array_elements: u32,
    /// Content flags (LOB prefetch bit for BLOB/CLOB binds).
    pub cont_flag: u64,
    /// Character set id for text binds.
    pub charset_id: u16,
    /// Character set form.
    pub charset_form: u8,
    /// Whether this is a RETURNING ... INTO output bind.
    pub is_return: bool,
    /// Whether the value must be withheld from logs.
    pub protected: bool,
}

impl BindMetadata {
    fn for_type(ora_type_num: u8) -> Self {
        let is_text = matches!(
            ora_type_num as u16,
            ORA_TYPE_NUM_VARCHAR | ORA_TYPE_NUM_CHAR | ORA_TYPE_NUM_LONG | ORA_TYPE_NUM_CLOB
        );
        let is_lob = matches!(ora_type_num as u16, ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_BLOB);
        Self {
            ora_type_num,
            flags: 0,
            buffer_size: 0,
            max_size: 0,
            max_array_elements: 0,
            cont_flag: if is_lob { TNS_LOB_PREFETCH_FLAG } else { 0 },
            charset_id: if is_text { TNS_CHARSET_UTF8 } else { 0 },
            charset_form: if is_text { CS_FORM_IMPLICIT } else { 0 },
            is_return: false,
            protected: false,
        }
    }

    /// Whether values of this column travel in the long segment.
    pub fn is_long(&self) -> bool {
        self.max_size as usize >= TNS_MIN_LONG_LENGTH
    }
}

/// One encoded bind value.
#[derive(Debug, Clone)]
struct EncodedValue {
    null: bool,
    bytes: Vec<u8>,
}

/// One value or array entry per batch row.
#[derive(Debug, Clone)]
enum BindEntry {
    Single(EncodedValue),
    Array(Vec<EncodedValue>),
}

#[derive(Debug, Clone)]
struct BindColumn {
    metadata: BindMetadata,
    entries: Vec<BindEntry>,
    out_value: Option<OracleValue>,
}

/// The bind arena for one statement execution.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    columns: Vec<BindColumn>,
    row_count: usize,
}

impl Bindings {
    /// Create an empty bind set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-row bind set from positional values.
    pub fn from_row(values: Vec<OracleValue>) -> Result<Self> {
        let mut binds = Self::new();
        binds.add_row(values)?;
        Ok(binds)
    }

    /// Number of bind positions.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no binds are present.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of accumulated batch rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Append a positional value to a new bind position (single row).
    pub fn push(&mut self, value: OracleValue) -> Result<BindRef> {
        if self.row_count > 1 {
            return Err(Error::protocol(
                "positional push is not valid on a batch bind set",
            ));
        }
        let encoded = encode_value(&value)?;
        let ora_type_num = value_type_num(&value);
        let mut column = BindColumn {
            metadata: BindMetadata::for_type(ora_type_num),
            entries: vec![BindEntry::Single(encoded)],
            out_value: None,
        };
        grow_metadata(&mut column.metadata, &column.entries[0]);
        self.columns.push(column);
        self.row_count = 1;
        Ok(BindRef(self.columns.len() as u32 - 1))
    }

    /// Re-reference an existing bind position. The bind count does not
    /// grow: identity is the ref id.
    pub fn push_ref(&mut self, r: BindRef) -> BindRef {
        debug_assert!((r.0 as usize) < self.columns.len());
        r
    }

    /// Append an array bind (PL/SQL index-by tables).
    pub fn push_array(
        &mut self,
        values: Vec<OracleValue>,
        max_elements: u32,
    ) -> Result<BindRef> {
        let ora_type_num = values
            .iter()
            .find(|v| !v.is_null())
            .map(value_type_num)
            .unwrap_or(ORA_TYPE_NUM_VARCHAR as u8);
        let encoded: Result<Vec<EncodedValue>> = values.iter().map(encode_value).collect();
        let encoded = encoded?;

        let mut metadata = BindMetadata::for_type(ora_type_num);
        metadata.flags |= TNS_BIND_ARRAY as u8;
        metadata.max_array_elements = max_elements.max(encoded.len() as u32);

        let entry = BindEntry::Array(encoded);
        grow_metadata(&mut metadata, &entry);

        self.columns.push(BindColumn {
            metadata,
            entries: vec![entry],
            out_value: None,
        });
        self.row_count = self.row_count.max(1);
        Ok(BindRef(self.columns.len() as u32 - 1))
    }

    /// Append a batch row. The first row fixes the column count; every
    /// later row must match it. Metadata grows in place to the
    /// elementwise maximum over rows.
    pub fn add_row(&mut self, values: Vec<OracleValue>) -> Result<()> {
        if self.columns.is_empty() && self.row_count == 0 {
            for value in &values {
                self.columns.push(BindColumn {
                    metadata: BindMetadata::for_type(value_type_num(value)),
                    entries: Vec::new(),
                    out_value: None,
                });
            }
        } else if values.len() != self.columns.len() {
            return Err(Error::protocol(format!(
                "bind row has {} values, expected {}",
                values.len(),
                self.columns.len()
            )));
        }

        for (column, value) in self.columns.iter_mut().zip(values.iter()) {
            let encoded = encode_value(value)?;
            // A null first row leaves the column typed VARCHAR; adopt the
            // real type from the first non-null value
            if !value.is_null() {
                let type_num = value_type_num(value);
                if column.metadata.max_size == 0
                    && column.metadata.ora_type_num != type_num
                    && column.entries.iter().all(|e| match e {
                        BindEntry::Single(v) => v.null,
                        BindEntry::Array(_) => false,
                    })
                {
                    let preserved_return = column.metadata.is_return;
                    let preserved_protected = column.metadata.protected;
                    column.metadata = BindMetadata::for_type(type_num);
                    column.metadata.is_return = preserved_return;
                    column.metadata.protected = preserved_protected;
                }
            }
            let entry = BindEntry::Single(encoded);
            grow_metadata(&mut column.metadata, &entry);
            column.entries.push(entry);
        }
        self.row_count += 1;
        Ok(())
    }

    /// Mark a bind as a RETURNING ... INTO output.
    pub fn mark_return(&mut self, r: BindRef) {
        if let Some(column) = self.columns.get_mut(r.0 as usize) {
            column.metadata.is_return = true;
        }
    }

    /// Mark a bind as protected: its value is withheld from logs.
    pub fn mark_protected(&mut self, r: BindRef) {
        if let Some(column) = self.columns.get_mut(r.0 as usize) {
            column.metadata.protected = true;
        }
    }

    /// Per-column metadata, in bind order.
    pub fn metadata(&self) -> impl Iterator<Item = &BindMetadata> {
        self.columns.iter().map(|c| &c.metadata)
    }

    /// Store an out-bind value delivered by the server.
    pub(crate) fn set_out_value(&mut self, position: usize, value: OracleValue) {
        if let Some(column) = self.columns.get_mut(position) {
            column.out_value = Some(value);
        }
    }

    /// Read the out-bind value for a ref, when one was delivered.
    pub fn out_value(&self, r: BindRef) -> Option<&OracleValue> {
        self.columns
            .get(r.0 as usize)
            .and_then(|c| c.out_value.as_ref())
    }

    /// Wire size of the bind metadata block.
    pub fn metadata_wire_size(&self, ttc_field_version: u8) -> usize {
        self.columns
            .iter()
            .map(|c| {
                let m = &c.metadata;
                let mut size = 4; // type, flags, precision, scale
                size += ub_wire_size(transmit_buffer_size(m) as u64);
                size += ub_wire_size(m.max_array_elements as u64);
                size += ub_wire_size(m.cont_flag);
                size += ub_wire_size(0); // OID
                size += ub_wire_size(0); // version
                size += ub_wire_size(m.charset_id as u64);
                size += 1; // charset form
                size += ub_wire_size(0); // max chars
                if ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
                    size += ub_wire_size(0); // oaccolid
                }
                size
            })
            .sum()
    }

    /// Write the bind metadata block, one entry per column.
    pub fn write_metadata(&self, buf: &mut Vec<u8>, ttc_field_version: u8) {
        for column in &self.columns {
            let m = &column.metadata;
            buf.write_u8(m.ora_type_num);
            buf.write_u8(m.flags);
            buf.write_u8(0); // precision
            buf.write_u8(0); // scale
            buf.write_ub4(transmit_buffer_size(m));
            buf.write_ub4(m.max_array_elements);
            buf.write_ub8(m.cont_flag);
            buf.write_ub4(0); // OID
            buf.write_ub2(0); // version
            buf.write_ub2(m.charset_id);
            buf.write_u8(m.charset_form);
            buf.write_ub4(0); // max chars
            if ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
                buf.write_ub4(0); // oaccolid
            }
        }
    }

    /// Wire size of one row of bind values (including the row-data byte).
    pub fn row_wire_size(&self, row: usize) -> usize {
        let mut size = 1; // TNS_MSG_TYPE_ROW_DATA
        for column in &self.columns {
            if column.metadata.is_long() {
                continue;
            }
            size += self.entry_wire_size(column, row);
        }
        for column in &self.columns {
            if column.metadata.is_long() {
                size += self.entry_wire_size(column, row);
            }
        }
        size
    }

    fn entry_wire_size(&self, column: &BindColumn, row: usize) -> usize {
        match column.entries.get(row) {
            Some(BindEntry::Single(v)) => encoded_wire_size(&column.metadata, v),
            Some(BindEntry::Array(items)) => {
                ub_wire_size(items.len() as u64)
                    + items
                        .iter()
                        .map(|v| encoded_wire_size(&column.metadata, v))
                        .sum::<usize>()
            }
            None => 1,
        }
    }

    /// Write one row of bind values as a RowData message. Short binds go
    /// first; values at or beyond the long threshold follow them within
    /// the same iteration.
    pub fn write_row(&self, buf: &mut Vec<u8>, row: usize) {
        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        for column in &self.columns {
            if column.metadata.is_long() {
                continue;
            }
            write_entry(buf, column, row);
        }
        for column in &self.columns {
            if column.metadata.is_long() {
                write_entry(buf, column, row);
            }
        }
    }
}

/// Buffer size as transmitted: long binds cap at the long limit.
fn transmit_buffer_size(m: &BindMetadata) -> u32 {
    if m.is_long() {
        TNS_MAX_LONG_LENGTH
    } else {
        m.buffer_size
    }
}

fn grow_metadata(metadata: &mut BindMetadata, entry: &BindEntry) {
    match entry {
        BindEntry::Single(v) => {
            let len = v.bytes.len() as u32;
            metadata.max_size = metadata.max_size.max(len);
            metadata.buffer_size = metadata.buffer_size.max(len);
        }
        BindEntry::Array(items) => {
            for v in items {
                let len = v.bytes.len() as u32;
                metadata.max_size = metadata.max_size.max(len);
                metadata.buffer_size = metadata.buffer_size.max(len);
            }
        }
    }
}

fn write_entry(buf: &mut Vec<u8>, column: &BindColumn, row: usize) {
    match column.entries.get(row) {
        Some(BindEntry::Single(v)) => write_encoded(buf, &column.metadata, v),
        Some(BindEntry::Array(items)) => {
            buf.write_ub4(items.len() as u32);
            for v in items {
                write_encoded(buf, &column.metadata, v);
            }
        }
        // Parse-only PL/SQL batches send all-null rows
        None => buf.write_u8(TNS_NULL_LENGTH_INDICATOR),
    }
}

fn write_encoded(buf: &mut Vec<u8>, metadata: &BindMetadata, value: &EncodedValue) {
    if value.null {
        match metadata.ora_type_num as u16 {
            ORA_TYPE_NUM_BOOLEAN => {
                buf.write_u8(TNS_ESCAPE_CHAR);
                buf.write_u8(0x01);
            }
            ORA_TYPE_NUM_OBJECT => {
                // Fixed null prefix: TOID/OID/snapshot/version/packed
                // length all zero, then the top-level object flag
                buf.write_zeros(20);
                buf.write_u32_be(TNS_OBJ_TOP_LEVEL as u32);
            }
            _ => buf.write_u8(TNS_NULL_LENGTH_INDICATOR),
        }
    } else {
        buf.write_bytes_with_length(&value.bytes);
    }
}

fn encoded_wire_size(metadata: &BindMetadata, value: &EncodedValue) -> usize {
    if value.null {
        match metadata.ora_type_num as u16 {
            ORA_TYPE_NUM_BOOLEAN => 2,
            ORA_TYPE_NUM_OBJECT => 24,
            _ => 1,
        }
    } else {
        bytes_with_length_wire_size(value.bytes.len())
    }
}

fn value_type_num(value: &OracleValue) -> u8 {
    let num = match value {
        OracleValue::Null => ORA_TYPE_NUM_VARCHAR,
        OracleValue::String(_) => ORA_TYPE_NUM_VARCHAR,
        OracleValue::Number(_) | OracleValue::Integer(_) => ORA_TYPE_NUM_NUMBER,
        OracleValue::Double(_) => ORA_TYPE_NUM_BINARY_DOUBLE,
        OracleValue::Bytes(_) => ORA_TYPE_NUM_RAW,
        OracleValue::Date(_) => ORA_TYPE_NUM_DATE,
        OracleValue::Timestamp(_) => ORA_TYPE_NUM_TIMESTAMP,
        OracleValue::TimestampTz(_, _) => ORA_TYPE_NUM_TIMESTAMP_TZ,
        OracleValue::IntervalDs(_) => ORA_TYPE_NUM_INTERVAL_DS,
        OracleValue::Boolean(_) => ORA_TYPE_NUM_BOOLEAN,
        OracleValue::Rowid(_) => ORA_TYPE_NUM_VARCHAR,
        OracleValue::Lob(lob) => {
            if lob.locator.is_blob() {
                ORA_TYPE_NUM_BLOB
            } else {
                ORA_TYPE_NUM_CLOB
            }
        }
    };
    num as u8
}

fn encode_value(value: &OracleValue) -> Result<EncodedValue> {
    let bytes = match value {
        OracleValue::Null => {
            return Ok(EncodedValue {
                null: true,
                bytes: Vec::new(),
            })
        }
        OracleValue::String(s) => s.as_bytes().to_vec(),
        OracleValue::Number(text) => encode_number(text)?,
        OracleValue::Integer(v) => encode_number(&v.to_string())?,
        OracleValue::Double(v) => encode_binary_double(*v).to_vec(),
        OracleValue::Bytes(b) => b.clone(),
        OracleValue::Date(dt) => encode_date(dt).to_vec(),
        OracleValue::Timestamp(dt) => encode_timestamp(dt, None),
        OracleValue::TimestampTz(dt, offset) => encode_timestamp(dt, Some(*offset)),
        OracleValue::IntervalDs(d) => encode_interval_ds(d),
        OracleValue::Boolean(true) => vec![1, 1],
        OracleValue::Boolean(false) => vec![0],
        OracleValue::Rowid(r) => r.to_string().into_bytes(),
        OracleValue::Lob(lob) => lob.locator.locator.clone(),
    };
    Ok(EncodedValue { null: false, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_binds() {
        let binds = Bindings::from_row(vec![
            OracleValue::Integer(1),
            OracleValue::String("John".to_string()),
            OracleValue::Integer(20),
        ])
        .unwrap();

        assert_eq!(binds.len(), 3);
        assert_eq!(binds.row_count(), 1);

        let meta: Vec<_> = binds.metadata().collect();
        assert_eq!(meta[0].ora_type_num, ORA_TYPE_NUM_NUMBER as u8);
        assert_eq!(meta[1].ora_type_num, ORA_TYPE_NUM_VARCHAR as u8);
        assert_eq!(meta[1].charset_id, TNS_CHARSET_UTF8);
    }

    #[test]
    fn test_batch_metadata_grows_to_max() {
        let mut binds = Bindings::new();
        binds
            .add_row(vec![OracleValue::String("a".to_string())])
            .unwrap();
        binds
            .add_row(vec![OracleValue::String("abcdef".to_string())])
            .unwrap();
        binds
            .add_row(vec![OracleValue::String("abc".to_string())])
            .unwrap();

        assert_eq!(binds.row_count(), 3);
        let meta: Vec<_> = binds.metadata().collect();
        assert_eq!(meta[0].max_size, 6);
        assert_eq!(meta[0].buffer_size, 6);
    }

    #[test]
    fn test_batch_row_arity_checked() {
        let mut binds = Bindings::new();
        binds
            .add_row(vec![OracleValue::Integer(1), OracleValue::Integer(2)])
            .unwrap();
        assert!(binds.add_row(vec![OracleValue::Integer(3)]).is_err());
    }

    #[test]
    fn test_ref_identity_does_not_grow() {
        let mut binds = Bindings::new();
        let a = binds.push(OracleValue::Integer(1)).unwrap();
        let b = binds.push(OracleValue::String("x".to_string())).unwrap();
        assert_eq!(binds.len(), 2);

        // INOUT bind referenced again: same position, no growth
        let a2 = binds.push_ref(a);
        assert_eq!(a2, a);
        assert_eq!(binds.len(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_null_then_value_adopts_type() {
        let mut binds = Bindings::new();
        binds.add_row(vec![OracleValue::Null]).unwrap();
        binds.add_row(vec![OracleValue::Integer(5)]).unwrap();

        let meta: Vec<_> = binds.metadata().collect();
        assert_eq!(meta[0].ora_type_num, ORA_TYPE_NUM_NUMBER as u8);
    }

    #[test]
    fn test_long_bind_segregation() {
        let mut binds = Bindings::new();
        let long_text = "x".repeat(TNS_MIN_LONG_LENGTH + 1);
        binds
            .add_row(vec![
                OracleValue::String(long_text.clone()),
                OracleValue::Integer(5),
            ])
            .unwrap();

        let meta: Vec<_> = binds.metadata().collect();
        assert!(meta[0].is_long());
        assert!(!meta[1].is_long());

        let mut buf = Vec::new();
        binds.write_row(&mut buf, 0);
        assert_eq!(buf.len(), binds.row_wire_size(0));

        // The short NUMBER value must come first: row-data byte, then a
        // short length-prefixed number, then the chunked long value
        assert_eq!(buf[0], TNS_MSG_TYPE_ROW_DATA);
        assert!(buf[1] < TNS_ESCAPE_CHAR);
        let number_len = buf[1] as usize;
        assert_eq!(buf[2 + number_len], TNS_LONG_LENGTH_INDICATOR);
    }

    #[test]
    fn test_boolean_null_escape() {
        let mut binds = Bindings::new();
        binds.add_row(vec![OracleValue::Boolean(true)]).unwrap();
        binds.add_row(vec![OracleValue::Null]).unwrap();

        let mut buf = Vec::new();
        binds.write_row(&mut buf, 1);
        assert_eq!(buf, vec![TNS_MSG_TYPE_ROW_DATA, TNS_ESCAPE_CHAR, 0x01]);

        buf.clear();
        binds.write_row(&mut buf, 0);
        assert_eq!(buf, vec![TNS_MSG_TYPE_ROW_DATA, 2, 1, 1]);
    }

    #[test]
    fn test_plain_null_single_byte() {
        let binds = Bindings::from_row(vec![OracleValue::Null]).unwrap();
        let mut buf = Vec::new();
        binds.write_row(&mut buf, 0);
        assert_eq!(buf, vec![TNS_MSG_TYPE_ROW_DATA, TNS_NULL_LENGTH_INDICATOR]);
    }

    #[test]
    fn test_array_bind() {
        let mut binds = Bindings::new();
        let r = binds
            .push_array(
                vec![OracleValue::Integer(1), OracleValue::Integer(2)],
                10,
            )
            .unwrap();
        assert_eq!(r.position(), 0);

        let meta: Vec<_> = binds.metadata().collect();
        assert_eq!(meta[0].flags & TNS_BIND_ARRAY as u8, TNS_BIND_ARRAY as u8);
        assert_eq!(meta[0].max_array_elements, 10);

        let mut buf = Vec::new();
        binds.write_row(&mut buf, 0);
        // row-data byte, ub4 count=2, then two number encodings
        assert_eq!(buf[0], TNS_MSG_TYPE_ROW_DATA);
        assert_eq!(&buf[1..3], &[1, 2]);
        assert_eq!(buf.len(), binds.row_wire_size(0));
    }

    #[test]
    fn test_out_value_round_trip() {
        let mut binds = Bindings::new();
        let r = binds.push(OracleValue::Integer(1)).unwrap();
        assert!(binds.out_value(r).is_none());
        binds.set_out_value(r.position(), OracleValue::Integer(99));
        assert_eq!(binds.out_value(r), Some(&OracleValue::Integer(99)));
    }

    #[test]
    fn test_metadata_wire_size_matches() {
        let binds = Bindings::from_row(vec![
            OracleValue::Integer(5),
            OracleValue::String("hello".to_string()),
            OracleValue::Null,
        ])
        .unwrap();

        for ttc in [TNS_CCAP_FIELD_VERSION_12_2, TNS_CCAP_FIELD_VERSION_MAX, 0] {
            let mut buf = Vec::new();
            binds.write_metadata(&mut buf, ttc);
            assert_eq!(buf.len(), binds.metadata_wire_size(ttc), "ttc {}", ttc);
        }
    }
}
