//! Inbound TTC message decoding.
//!
//! [`ResponseDecoder`] is a switch on message id driving the per-statement
//! state machine: DescribeInfo fixes the column set, RowHeader/BitVector
//! prepare the next row, RowData emits it (re-using the previous row's
//! columns where the bit vector says they were not re-sent), and the
//! Error message closes the call with either ORA-01403 (normal end of
//! fetch) or a real error.

use std::sync::Arc;

use crate::binds::Bindings;
use crate::error::{BatchError, Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::codec::{
    decode_binary_double, decode_binary_float, decode_date, decode_interval_ds, decode_number,
    decode_timestamp, RowId,
};
use crate::protocol::constants::*;
use crate::protocol::types::{ColumnInfo, ColumnMetadata, OracleValue, Row};

/// Information extracted from the error/end-of-call message.
#[derive(Debug, Default)]
pub struct ErrorInfo {
    /// Call status word.
    pub call_status: u32,
    /// Error number (0 = success, 1403 = end of fetch).
    pub error_num: u32,
    /// Cursor ID assigned by the server.
    pub cursor_id: u16,
    /// Row count for queries/DML.
    pub row_count: u64,
    /// Offset of the error within the SQL text.
    pub error_pos: u16,
    /// Error message (if any).
    pub message: Option<String>,
    /// Logical rowid attached to the error, when supplied.
    pub rowid: Option<RowId>,
    /// Per-row failures, when batch error mode is on.
    pub batch_errors: Vec<BatchError>,
}

impl ErrorInfo {
    /// Whether this error ends a fetch normally.
    pub fn is_end_of_fetch(&self) -> bool {
        self.error_num == TNS_ERR_NO_DATA_FOUND
    }

    /// Convert a real server failure into an [`Error`]; end-of-fetch and
    /// success return `None`.
    pub fn to_error(&self) -> Option<Error> {
        if self.error_num == 0 || self.is_end_of_fetch() {
            return None;
        }
        Some(Error::Oracle {
            code: self.error_num,
            message: self.message.clone().unwrap_or_default(),
            position: self.error_pos,
            cursor_id: self.cursor_id,
            row_count: self.row_count,
            batch_errors: self.batch_errors.clone(),
        })
    }
}

/// Fully decoded response to one request.
#[derive(Debug, Default)]
pub struct DecodedResponse {
    /// Column metadata, when a describe arrived.
    pub columns: Vec<ColumnMetadata>,
    /// Rows decoded from this response.
    pub rows: Vec<Row>,
    /// Error/status information.
    pub error_info: ErrorInfo,
    /// Whether the cursor has more rows on the server.
    pub more_rows: bool,
    /// Whether the statement needs a re-define round before fetching
    /// (LOB columns fetched inline).
    pub needs_define: bool,
    /// Cursor ids of implicit result sets, in arrival order.
    pub implicit_cursors: Vec<u16>,
    /// Per-statement row counts from a DML batch, when requested.
    pub row_counts: Vec<u64>,
    /// Whether a DRCP session change invalidated cached cursors.
    pub session_invalidated: bool,
}

/// Decoder state for one request/response exchange.
pub struct ResponseDecoder<'a> {
    ttc_field_version: u8,
    server_ttc_field_version: u8,
    fetch_lobs: bool,
    expected_dml_counts: u32,
    columns: Vec<ColumnMetadata>,
    column_info: Option<Arc<ColumnInfo>>,
    /// Values of the previous row, for bit-vector column reuse.
    last_row: Option<Vec<OracleValue>>,
    /// Bit vector in effect for the next row. Copied out of the input
    /// buffer: later packets reuse it.
    bit_vector: Option<Vec<u8>>,
    /// Out binds to populate when a FlushOutBinds arrives.
    binds: Option<&'a mut Bindings>,
    pending_out_binds: bool,
    response: DecodedResponse,
    end_of_response: bool,
}

impl<'a> ResponseDecoder<'a> {
    /// Create a decoder for an execute response.
    pub fn new(ttc_field_version: u8, server_ttc_field_version: u8, fetch_lobs: bool) -> Self {
        Self {
            ttc_field_version,
            server_ttc_field_version,
            fetch_lobs,
            expected_dml_counts: 0,
            columns: Vec::new(),
            column_info: None,
            last_row: None,
            bit_vector: None,
            binds: None,
            pending_out_binds: false,
            response: DecodedResponse::default(),
            end_of_response: false,
        }
    }

    /// Reuse column metadata from a previous describe (fetch responses
    /// carry no DescribeInfo of their own).
    pub fn with_columns(mut self, columns: Vec<ColumnMetadata>) -> Result<Self> {
        if !columns.is_empty() {
            self.column_info = Some(Arc::new(ColumnInfo::from_metadata(&columns)?));
        }
        self.columns = columns;
        Ok(self)
    }

    /// Attach the bind set so out-bind values can be deposited.
    pub fn with_binds(mut self, binds: &'a mut Bindings) -> Self {
        self.binds = Some(binds);
        self
    }

    /// Expect `n` UB8 row counts from a DML-rowcounts batch.
    pub fn expect_dml_counts(mut self, n: u32) -> Self {
        self.expected_dml_counts = n;
        self
    }

    /// Whether the logical response has concluded.
    pub fn is_done(&self) -> bool {
        self.end_of_response
    }

    /// Take the accumulated response.
    pub fn finish(self) -> DecodedResponse {
        let mut response = self.response;
        response.columns = self.columns;
        if response.error_info.error_num == 0 {
            response.more_rows = true;
        }
        response
    }

    /// Decode every message in one data payload (data flags already
    /// consumed). Returns whether the response has concluded.
    pub fn process_payload(&mut self, buf: &mut ReadBuffer) -> Result<bool> {
        while buf.remaining() > 0 && !self.end_of_response {
            let msg_type = buf.read_u8()?;
            self.process_message(msg_type, buf)?;
        }
        Ok(self.end_of_response)
    }

    fn process_message(&mut self, msg_type: u8, buf: &mut ReadBuffer) -> Result<()> {
        match msg_type {
            TNS_MSG_TYPE_DESCRIBE_INFO => {
                buf.skip_raw_bytes_chunked()?;
                self.process_describe_info(buf)?;
            }
            TNS_MSG_TYPE_ROW_HEADER => self.process_row_header(buf)?,
            TNS_MSG_TYPE_ROW_DATA => self.process_row_data(buf)?,
            TNS_MSG_TYPE_BIT_VECTOR => self.process_bit_vector(buf)?,
            TNS_MSG_TYPE_IO_VECTOR => self.process_io_vector(buf)?,
            TNS_MSG_TYPE_FLUSH_OUT_BINDS => {
                self.pending_out_binds = true;
            }
            TNS_MSG_TYPE_ERROR => {
                self.response.error_info = parse_error_info(buf, self.server_ttc_field_version)?;
                if self.response.error_info.is_end_of_fetch() {
                    self.response.more_rows = false;
                }
                // The error block is the end-of-call status; servers
                // without the end-of-request flag send nothing after it
                self.end_of_response = true;
            }
            TNS_MSG_TYPE_IMPLICIT_RESULTSET => self.process_implicit_resultset(buf)?,
            TNS_MSG_TYPE_SERVER_SIDE_PIGGYBACK => self.process_server_side_piggyback(buf)?,
            TNS_MSG_TYPE_WARNING => self.process_warning(buf)?,
            TNS_MSG_TYPE_PARAMETER => self.process_return_parameters(buf)?,
            TNS_MSG_TYPE_STATUS => {
                self.response.error_info.call_status = buf.read_ub4()?;
                let _end_to_end_seq = buf.read_ub2()?;
                // Recent servers append fields we do not model; the
                // remainder of the payload is theirs
                if buf.remaining() > 0 {
                    buf.skip(buf.remaining())?;
                }
                self.end_of_response = true;
            }
            TNS_MSG_TYPE_END_OF_RESPONSE => {
                self.end_of_response = true;
            }
            other => {
                return Err(Error::protocol(format!(
                    "Unexpected message type in response: {}",
                    other
                )));
            }
        }
        Ok(())
    }

    fn process_describe_info(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let _max_row_size = buf.read_ub4()?;
        let num_columns = buf.read_ub4()?;

        if num_columns > 0 {
            let _ = buf.read_u8()?;
        }

        let mut columns = Vec::with_capacity(num_columns as usize);
        for _ in 0..num_columns {
            columns.push(self.parse_column_metadata(buf)?);
        }

        let num_bytes = buf.read_ub4()?;
        if num_bytes > 0 {
            buf.skip_raw_bytes_chunked()?;
        }
        let _ = buf.read_ub4()?; // dcbflag
        let _ = buf.read_ub4()?; // dcbmdbz
        let _ = buf.read_ub4()?; // dcbmnpr
        let _ = buf.read_ub4()?; // dcbmxpr
        let num_bytes2 = buf.read_ub4()?;
        if num_bytes2 > 0 {
            buf.skip_raw_bytes_chunked()?;
        }

        // Inline LOB fetching needs a re-define round: the columns are
        // re-requested as their LONG family members
        self.response.needs_define = !self.fetch_lobs
            && columns.iter().any(|c| {
                matches!(c.oracle_type as u16, ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_BLOB)
            });

        self.column_info = Some(Arc::new(ColumnInfo::from_metadata(&columns)?));
        self.columns = columns;
        self.last_row = None;
        Ok(())
    }

    fn parse_column_metadata(&self, buf: &mut ReadBuffer) -> Result<ColumnMetadata> {
        let oracle_type = buf.read_u8()?;
        let _flags = buf.read_u8()?;

        let precision = buf.read_u8()? as i8;
        let scale = buf.read_u8()? as i8;
        let buffer_size = buf.read_ub4()?;
        let _ = buf.read_ub4()?; // max array elements
        let _ = buf.read_ub8()?; // cont flags

        let _oid = buf.read_bytes_with_length()?;

        let _ = buf.read_ub2()?; // version
        let _ = buf.read_ub2()?; // charset id
        let csfrm = buf.read_u8()?;
        let max_size = buf.read_ub4()?;

        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
            let _oaccolid = buf.read_ub4()?;
        }

        let nullable = buf.read_u8()? != 0;
        let _v7_len = buf.read_u8()?;

        let name = read_column_string(buf)?;
        let schema = read_column_string(buf)?;
        let type_name = read_column_string(buf)?;
        let _col_pos = buf.read_ub2()?;
        let _uds_flags = buf.read_ub4()?;

        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1 {
            let _domain_schema = read_column_string(buf)?;
            let _domain_name = read_column_string(buf)?;
        }

        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1_EXT_3 {
            let num_annotations = buf.read_ub4()?;
            if num_annotations > 0 {
                let _ = buf.read_u8()?;
                let actual_count = buf.read_ub4()?;
                let _ = buf.read_u8()?;
                for _ in 0..actual_count {
                    let _key = read_column_string(buf)?;
                    let _value = read_column_string(buf)?;
                    let _ = buf.read_ub4()?;
                }
                let _ = buf.read_ub4()?;
            }
        }

        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_4 {
            let _ = buf.read_ub4()?; // vector dimensions
            let _ = buf.read_u8()?; // vector format
            let _ = buf.read_u8()?; // vector flags
        }

        Ok(ColumnMetadata {
            name,
            oracle_type,
            precision,
            scale,
            max_size,
            buffer_size,
            nullable,
            csfrm,
            schema: if schema.is_empty() { None } else { Some(schema) },
            type_name: if type_name.is_empty() {
                None
            } else {
                Some(type_name)
            },
        })
    }

    fn process_row_header(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let _flags = buf.read_u8()?;
        let _num_requests = buf.read_ub2()?;
        let _iter_num = buf.read_ub4()?;
        let _num_iters = buf.read_ub4()?;
        let _buffer_length = buf.read_ub2()?;

        // Bit vector, when carried here: copy it out, the input buffer
        // is reused by the next packet
        let num_bytes = buf.read_ub4()?;
        if num_bytes > 0 {
            let _ = buf.read_u8()?; // repeated length
            let vector = buf.read_bytes((num_bytes - 1) as usize)?;
            self.bit_vector = Some(vector.to_vec());
        }

        let num_bytes = buf.read_ub4()?;
        if num_bytes > 0 {
            buf.skip_raw_bytes_chunked()?;
        }

        Ok(())
    }

    fn process_bit_vector(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let _num_columns_sent = buf.read_ub2()?;
        let num_bytes = self.columns.len().div_ceil(8);
        if num_bytes > 0 {
            let vector = buf.read_bytes(num_bytes)?;
            self.bit_vector = Some(vector.to_vec());
        }
        Ok(())
    }

    /// Whether the bit vector in effect says column `index` was re-sent.
    fn is_column_sent(&self, index: usize) -> bool {
        match &self.bit_vector {
            Some(vector) => vector
                .get(index / 8)
                .is_some_and(|byte| byte & (1 << (index % 8)) != 0),
            None => true,
        }
    }

    fn process_row_data(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        // A DML-rowcounts response delivers the per-statement counts in
        // its own row data message
        if self.expected_dml_counts > 0 && self.columns.is_empty() {
            for _ in 0..self.expected_dml_counts {
                self.response.row_counts.push(buf.read_ub8()?);
            }
            self.expected_dml_counts = 0;
            return Ok(());
        }

        // Out binds flushed by the server
        if self.pending_out_binds {
            self.pending_out_binds = false;
            if let Some(binds) = self.binds.as_deref_mut() {
                let metadata: Vec<(usize, u8)> = binds
                    .metadata()
                    .enumerate()
                    .map(|(i, m)| (i, m.ora_type_num))
                    .collect();
                for (position, ora_type_num) in metadata {
                    let value = parse_column_value_of_type(buf, ora_type_num, 0, true)?;
                    binds.set_out_value(position, value);
                }
            }
            return Ok(());
        }

        let info = self
            .column_info
            .clone()
            .ok_or_else(|| Error::protocol("Row data received before column metadata"))?;

        let mut values = Vec::with_capacity(self.columns.len());
        for (index, col) in self.columns.iter().enumerate() {
            if !self.is_column_sent(index) {
                let prev = self
                    .last_row
                    .as_ref()
                    .and_then(|row| row.get(index))
                    .cloned()
                    .ok_or_else(|| {
                        Error::protocol("Bit vector reuse without a previous row")
                    })?;
                values.push(prev);
                continue;
            }
            values.push(parse_column_value_of_type(
                buf,
                col.oracle_type,
                col.csfrm,
                self.fetch_lobs,
            )?);
        }

        self.last_row = Some(values.clone());
        self.bit_vector = None;
        self.response.rows.push(Row::new(values, info));
        Ok(())
    }

    fn process_io_vector(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let _flag = buf.read_u8()?;
        let _num_requests = buf.read_ub2()?;
        let _iter_num = buf.read_ub4()?;
        let _num_iters = buf.read_ub4()?;
        let _uac_length = buf.read_ub2()?;

        let bvec_bytes = buf.read_ub2()?;
        if bvec_bytes > 0 {
            buf.skip(bvec_bytes as usize)?;
        }
        let rowid_bytes = buf.read_ub2()?;
        if rowid_bytes > 0 {
            buf.skip(rowid_bytes as usize)?;
        }

        // One direction byte per bind
        if let Some(binds) = self.binds.as_deref_mut() {
            for _ in 0..binds.len() {
                let _direction = buf.read_u8()?;
            }
        }
        Ok(())
    }

    fn process_implicit_resultset(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let num_results = buf.read_ub4()?;
        for _ in 0..num_results {
            let num_bytes = buf.read_ub4()?;
            if num_bytes > 0 {
                buf.skip_raw_bytes_chunked()?;
            }
            let cursor_id = buf.read_ub2()?;
            self.response.implicit_cursors.push(cursor_id);
        }
        tracing::debug!(
            cursors = ?self.response.implicit_cursors,
            "implicit result sets returned"
        );
        Ok(())
    }

    fn process_warning(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let code = buf.read_ub2()?;
        let length = buf.read_ub2()?;
        let _flags = buf.read_ub2()?;
        if length > 0 {
            let message = buf.read_bytes(length as usize)?;
            tracing::warn!(code, message = %String::from_utf8_lossy(&message), "server warning");
        }
        Ok(())
    }

    fn process_return_parameters(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let num_params = buf.read_ub2()?;
        for _ in 0..num_params {
            let _ = buf.read_ub4()?;
        }

        let num_bytes = buf.read_ub2()?;
        if num_bytes > 0 {
            buf.skip(num_bytes as usize)?;
        }

        let num_pairs = buf.read_ub2()?;
        for _ in 0..num_pairs {
            let text_len = buf.read_ub2()?;
            if text_len > 0 {
                buf.skip(text_len as usize)?;
            }
            let bin_len = buf.read_ub2()?;
            if bin_len > 0 {
                buf.skip(bin_len as usize)?;
            }
            let _keyword = buf.read_ub2()?;
        }

        let num_bytes = buf.read_ub2()?;
        if num_bytes > 0 {
            buf.skip(num_bytes as usize)?;
        }

        Ok(())
    }

    fn process_server_side_piggyback(&mut self, buf: &mut ReadBuffer) -> Result<()> {
        let opcode = buf.read_u8()?;

        match opcode {
            TNS_SERVER_PIGGYBACK_LTXID => {
                let num_bytes = buf.read_ub4()?;
                if num_bytes > 0 {
                    buf.skip_raw_bytes_chunked()?;
                }
            }
            TNS_SERVER_PIGGYBACK_QUERY_CACHE_INVALIDATION | TNS_SERVER_PIGGYBACK_TRACE_EVENT => {}
            TNS_SERVER_PIGGYBACK_OS_PID_MTS => {
                let _ = buf.read_ub2()?;
                buf.skip_raw_bytes_chunked()?;
            }
            TNS_SERVER_PIGGYBACK_SYNC | TNS_SERVER_PIGGYBACK_EXT_SYNC => {
                let _dty_count = buf.read_ub2()?;
                let _length = buf.read_u8()?;
                let num_pairs = buf.read_ub2()?;
                for _ in 0..num_pairs {
                    let key_len = buf.read_ub2()?;
                    if key_len > 0 {
                        buf.skip_raw_bytes_chunked()?;
                    }
                    let value_len = buf.read_ub2()?;
                    if value_len > 0 {
                        buf.skip_raw_bytes_chunked()?;
                    }
                    let _keyword = buf.read_ub2()?;
                }
            }
            TNS_SERVER_PIGGYBACK_AC_REPLAY_CONTEXT => {
                let _flags = buf.read_ub4()?;
                let _error_code = buf.read_ub4()?;
                let _queue = buf.read_u8()?;
                let num_bytes = buf.read_ub4()?;
                if num_bytes > 0 {
                    buf.skip_raw_bytes_chunked()?;
                }
            }
            TNS_SERVER_PIGGYBACK_SESS_RET => {
                let _ = buf.read_ub2()?;
                let _ = buf.read_u8()?;
                let num_pairs = buf.read_ub2()?;
                for _ in 0..num_pairs {
                    let key_len = buf.read_ub2()?;
                    if key_len > 0 {
                        buf.skip_raw_bytes_chunked()?;
                    }
                    let value_len = buf.read_ub2()?;
                    if value_len > 0 {
                        buf.skip_raw_bytes_chunked()?;
                    }
                    let _keyword = buf.read_ub2()?;
                }
                let flags = buf.read_ub4()?;
                if flags & TNS_SESSGET_SESSION_CHANGED != 0 {
                    // The DRCP session changed underneath us: every
                    // cached cursor belongs to the old session
                    self.response.session_invalidated = true;
                    tracing::debug!("DRCP session changed, statement cache invalidated");
                }
            }
            TNS_SERVER_PIGGYBACK_SESS_SIGNATURE => {
                let num_bytes = buf.read_ub4()?;
                if num_bytes > 0 {
                    buf.skip_raw_bytes_chunked()?;
                }
            }
            other => {
                tracing::warn!(opcode = other, "unknown server piggyback opcode");
            }
        }

        Ok(())
    }
}

/// Decode one length-prefixed column value by its Oracle type number.
fn parse_column_value_of_type(
    buf: &mut ReadBuffer,
    oracle_type: u8,
    csfrm: u8,
    fetch_lobs: bool,
) -> Result<OracleValue> {
    match oracle_type as u16 {
        // ROWID is structural, not length-prefixed
        ORA_TYPE_NUM_ROWID => {
            return Ok(match RowId::read(buf)? {
                Some(rowid) => OracleValue::Rowid(rowid),
                None => OracleValue::Null,
            });
        }
        ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_BLOB if fetch_lobs => {
            let is_clob = oracle_type as u16 == ORA_TYPE_NUM_CLOB;
            return Ok(match buf.read_lob_with_length(false, false, is_clob)? {
                Some(lob) => OracleValue::Lob(lob),
                None => OracleValue::Null,
            });
        }
        _ => {}
    }

    let data = buf.read_bytes_with_length()?;
    let bytes = match data {
        None => return Ok(OracleValue::Null),
        Some(bytes) => bytes,
    };
    if bytes.is_empty() {
        return Ok(OracleValue::Null);
    }

    match oracle_type as u16 {
        ORA_TYPE_NUM_VARCHAR | ORA_TYPE_NUM_CHAR | ORA_TYPE_NUM_LONG => {
            let _ = csfrm;
            Ok(OracleValue::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        }
        ORA_TYPE_NUM_NUMBER | ORA_TYPE_NUM_BINARY_INTEGER => {
            Ok(OracleValue::Number(decode_number(&bytes)?))
        }
        ORA_TYPE_NUM_DATE => Ok(OracleValue::Date(decode_date(&bytes)?)),
        ORA_TYPE_NUM_TIMESTAMP | ORA_TYPE_NUM_TIMESTAMP_LTZ => {
            let ts = decode_timestamp(&bytes)?;
            Ok(OracleValue::Timestamp(ts.datetime))
        }
        ORA_TYPE_NUM_TIMESTAMP_TZ => {
            let ts = decode_timestamp(&bytes)?;
            Ok(match ts.tz_offset_minutes {
                Some(offset) => OracleValue::TimestampTz(ts.datetime, offset),
                None => OracleValue::Timestamp(ts.datetime),
            })
        }
        ORA_TYPE_NUM_INTERVAL_DS => Ok(OracleValue::IntervalDs(decode_interval_ds(&bytes)?)),
        ORA_TYPE_NUM_BINARY_FLOAT => {
            Ok(OracleValue::Double(decode_binary_float(&bytes)? as f64))
        }
        ORA_TYPE_NUM_BINARY_DOUBLE => Ok(OracleValue::Double(decode_binary_double(&bytes)?)),
        ORA_TYPE_NUM_RAW | ORA_TYPE_NUM_LONG_RAW => Ok(OracleValue::Bytes(bytes.to_vec())),
        ORA_TYPE_NUM_BOOLEAN => Ok(OracleValue::Boolean(
            bytes.last().is_some_and(|b| b & 1 != 0),
        )),
        // Inline CLOB/BLOB data after a LONG re-define
        ORA_TYPE_NUM_CLOB => Ok(OracleValue::String(
            String::from_utf8_lossy(&bytes).to_string(),
        )),
        ORA_TYPE_NUM_BLOB => Ok(OracleValue::Bytes(bytes.to_vec())),
        _ => Ok(OracleValue::Bytes(bytes.to_vec())),
    }
}

/// Parse the full error/end-of-call information block.
pub fn parse_error_info(buf: &mut ReadBuffer, server_ttc_field_version: u8) -> Result<ErrorInfo> {
    let mut info = ErrorInfo {
        call_status: buf.read_ub4()?,
        ..ErrorInfo::default()
    };
    let _end_to_end_seq = buf.read_ub2()?;
    let _current_row = buf.read_ub4()?;
    let _error_num_hint = buf.read_ub2()?; // not the real error number
    let _ = buf.read_ub2()?; // array elem error
    let _ = buf.read_ub2()?; // array elem error
    info.cursor_id = buf.read_ub2()?;
    info.error_pos = buf.read_sb2()?.max(0) as u16;
    let _sql_type = buf.read_u8()?;
    let _fatal = buf.read_u8()?;
    let _flags = buf.read_u8()?;
    let _user_cursor_options = buf.read_u8()?;
    let _upi_param = buf.read_u8()?;
    let _warning_flags = buf.read_u8()?;

    info.rowid = RowId::read(buf)?;

    let _os_error = buf.read_ub4()?;
    let _stmt_num = buf.read_u8()?;
    let _call_num = buf.read_u8()?;
    let _padding = buf.read_ub2()?;
    let _success_iters = buf.read_ub4()?;

    // oerrdd (logical rowid)
    let num_bytes = buf.read_ub4()?;
    if num_bytes > 0 {
        buf.skip_raw_bytes_chunked()?;
    }

    // batch error codes
    let mut batch_codes: Vec<u32> = Vec::new();
    let num_errors = buf.read_ub2()?;
    if num_errors > 0 {
        let first_byte = buf.read_u8()?;
        for _ in 0..num_errors {
            if first_byte == TNS_LONG_LENGTH_INDICATOR {
                let _chunk_len = buf.read_ub4()?;
            }
            batch_codes.push(buf.read_ub2()? as u32);
        }
        if first_byte == TNS_LONG_LENGTH_INDICATOR {
            buf.skip(1)?;
        }
    }

    // batch error offsets
    let mut batch_offsets: Vec<u32> = Vec::new();
    let num_offsets = buf.read_ub4()?;
    if num_offsets > 0 {
        let first_byte = buf.read_u8()?;
        for _ in 0..num_offsets {
            if first_byte == TNS_LONG_LENGTH_INDICATOR {
                let _chunk_len = buf.read_ub4()?;
            }
            batch_offsets.push(buf.read_ub4()?);
        }
        if first_byte == TNS_LONG_LENGTH_INDICATOR {
            buf.skip(1)?;
        }
    }

    // batch error messages
    let mut batch_messages: Vec<String> = Vec::new();
    let num_messages = buf.read_ub2()?;
    if num_messages > 0 {
        buf.skip(1)?; // packed size
        for _ in 0..num_messages {
            let _chunk_length = buf.read_ub2()?;
            let message = buf.read_str_with_length()?.unwrap_or_default();
            batch_messages.push(message);
            buf.skip(2)?; // end marker
        }
    }

    info.error_num = buf.read_ub4()?;
    info.row_count = buf.read_ub8()?;

    // 20c+ trailing fields, present per the server's own field version
    if server_ttc_field_version >= TNS_CCAP_FIELD_VERSION_20_1 {
        let _sql_type = buf.read_ub4()?;
        let _server_checksum = buf.read_ub4()?;
    }

    if info.error_num != 0 {
        info.message = buf.read_str_with_length()?;
    }

    info.batch_errors = batch_codes
        .iter()
        .enumerate()
        .map(|(i, &code)| BatchError {
            offset: batch_offsets.get(i).copied().unwrap_or(i as u32),
            code,
            message: batch_messages.get(i).cloned(),
        })
        .collect();

    Ok(info)
}

/// Read a column string: UB4 indicator, then the length-prefixed bytes.
fn read_column_string(buf: &mut ReadBuffer) -> Result<String> {
    let indicator = buf.read_ub4()?;
    if indicator == 0 {
        return Ok(String::new());
    }
    Ok(buf.read_str_with_length()?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buffer::WriteBuffer;
    use crate::protocol::codec::encode_number;

    /// Serialize one column's metadata the way the server describes it,
    /// for a client field version below 12.2 (no oaccolid).
    fn write_column_metadata(buf: &mut WriteBuffer, name: &str, oracle_type: u8) {
        buf.write_u8(oracle_type);
        buf.write_u8(0); // flags
        buf.write_u8(0); // precision
        buf.write_u8(0); // scale
        buf.write_ub4(22); // buffer size
        buf.write_ub4(0); // max array elements
        buf.write_ub8(0); // cont flags
        buf.write_u8(0); // OID (null bytes-with-length)
        buf.write_ub2(0); // version
        buf.write_ub2(873); // charset id
        buf.write_u8(1); // csfrm
        buf.write_ub4(22); // max size
        buf.write_u8(1); // nullable
        buf.write_u8(0); // v7 length
        buf.write_ub4(1); // name indicator
        buf.write_str_with_length(name);
        buf.write_ub4(0); // schema indicator
        buf.write_ub4(0); // type name indicator
        buf.write_ub2(1); // column position
        buf.write_ub4(0); // uds flags
    }

    fn write_describe_info(buf: &mut WriteBuffer, columns: &[(&str, u8)]) {
        buf.write_u8(TNS_MSG_TYPE_DESCRIBE_INFO);
        buf.write_u8(0); // leading chunked bytes: none
        buf.write_ub4(100); // max row size
        buf.write_ub4(columns.len() as u32);
        buf.write_u8(0); // flags byte
        for (name, oracle_type) in columns {
            write_column_metadata(buf, name, *oracle_type);
        }
        buf.write_ub4(0); // trailing bytes
        buf.write_ub4(0); // dcbflag
        buf.write_ub4(0); // dcbmdbz
        buf.write_ub4(0); // dcbmnpr
        buf.write_ub4(0); // dcbmxpr
        buf.write_ub4(0); // trailing bytes 2
    }

    /// Serialize an error info block (server field version below 20.1).
    fn write_error_info(
        buf: &mut WriteBuffer,
        error_num: u32,
        cursor_id: u16,
        row_count: u64,
        message: Option<&str>,
        batch: &[(u32, u32, &str)],
    ) {
        buf.write_u8(TNS_MSG_TYPE_ERROR);
        buf.write_ub4(0); // call status
        buf.write_ub2(0); // end-to-end seq
        buf.write_ub4(0); // current row
        buf.write_ub2(error_num.min(0xFFFF) as u16); // hint
        buf.write_ub2(0);
        buf.write_ub2(0);
        buf.write_ub2(cursor_id);
        buf.write_u8(0); // error position (sb2, zero)
        buf.write_u8(0); // sql type
        buf.write_u8(0); // fatal
        buf.write_u8(0); // flags
        buf.write_u8(0); // user cursor options
        buf.write_u8(0); // upi param
        buf.write_u8(0); // warning flags
        // rowid: all-zero record
        buf.write_ub4(0);
        buf.write_ub2(0);
        buf.write_u8(0);
        buf.write_ub4(0);
        buf.write_ub2(0);
        buf.write_ub4(0); // os error
        buf.write_u8(0); // stmt num
        buf.write_u8(0); // call num
        buf.write_ub2(0); // padding
        buf.write_ub4(0); // success iters
        buf.write_ub4(0); // oerrdd

        // batch error codes
        buf.write_ub2(batch.len() as u16);
        if !batch.is_empty() {
            buf.write_u8(4); // plain array marker
            for (code, _, _) in batch {
                buf.write_ub2(*code as u16);
            }
        }
        // batch error offsets
        buf.write_ub4(batch.len() as u32);
        if !batch.is_empty() {
            buf.write_u8(4);
            for (_, offset, _) in batch {
                buf.write_ub4(*offset);
            }
        }
        // batch error messages
        buf.write_ub2(batch.len() as u16);
        if !batch.is_empty() {
            buf.write_u8(0); // packed size
            for (_, _, msg) in batch {
                buf.write_ub2(0); // chunk length
                buf.write_str_with_length(msg);
                buf.write_u8(0); // end marker
                buf.write_u8(0);
            }
        }

        buf.write_ub4(error_num);
        buf.write_ub8(row_count);
        if error_num != 0 {
            buf.write_str_with_length(message.unwrap_or("error"));
        }
    }

    fn decode(payload: WriteBuffer) -> DecodedResponse {
        let mut decoder = ResponseDecoder::new(0, 0, false);
        let mut rbuf = ReadBuffer::new(payload.freeze());
        decoder.process_payload(&mut rbuf).unwrap();
        decoder.finish()
    }

    #[test]
    fn test_simple_query_response() {
        // SELECT 1 FROM DUAL: describe, row header, one NUMBER row,
        // terminal ORA-01403
        let mut buf = WriteBuffer::new();
        write_describe_info(&mut buf, &[("1", ORA_TYPE_NUM_NUMBER as u8)]);

        buf.write_u8(TNS_MSG_TYPE_ROW_HEADER);
        buf.write_u8(0); // flags
        buf.write_ub2(0); // num requests
        buf.write_ub4(0); // iteration number
        buf.write_ub4(0); // num iters
        buf.write_ub2(0); // buffer length
        buf.write_ub4(0); // bit vector
        buf.write_ub4(0); // rxhrid

        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        buf.write_bytes_with_length(&encode_number("1").unwrap());

        write_error_info(&mut buf, TNS_ERR_NO_DATA_FOUND, 7, 1, Some("no data found"), &[]);

        let response = decode(buf);
        assert_eq!(response.columns.len(), 1);
        assert_eq!(response.columns[0].name, "1");
        assert_eq!(response.rows.len(), 1);
        assert_eq!(
            response.rows[0].get(0),
            Some(&OracleValue::Number("1".to_string()))
        );
        assert!(response.error_info.is_end_of_fetch());
        assert!(response.error_info.to_error().is_none());
        assert!(!response.more_rows);
        assert_eq!(response.error_info.cursor_id, 7);
    }

    #[test]
    fn test_bit_vector_carries_columns_forward() {
        let mut buf = WriteBuffer::new();
        write_describe_info(
            &mut buf,
            &[
                ("A", ORA_TYPE_NUM_NUMBER as u8),
                ("B", ORA_TYPE_NUM_VARCHAR as u8),
            ],
        );

        // First row: both columns sent
        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        buf.write_bytes_with_length(&encode_number("5").unwrap());
        buf.write_bytes_with_length(b"hello");

        // Bit vector: only column 1 (B) re-sent for the next row
        buf.write_u8(TNS_MSG_TYPE_BIT_VECTOR);
        buf.write_ub2(1); // columns sent
        buf.write_u8(0b0000_0010);

        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        buf.write_bytes_with_length(b"world");

        write_error_info(&mut buf, TNS_ERR_NO_DATA_FOUND, 1, 2, None, &[]);

        let response = decode(buf);
        assert_eq!(response.rows.len(), 2);
        assert_eq!(
            response.rows[1].get(0),
            Some(&OracleValue::Number("5".to_string())),
            "column A carried forward from the previous row"
        );
        assert_eq!(
            response.rows[1].get(1),
            Some(&OracleValue::String("world".to_string()))
        );
    }

    #[test]
    fn test_batch_errors_collected() {
        let mut buf = WriteBuffer::new();
        write_error_info(
            &mut buf,
            1,
            3,
            4,
            Some("unique constraint violated"),
            &[(1, 2, "ORA-00001: unique constraint violated")],
        );

        let response = decode(buf);
        let info = &response.error_info;
        assert_eq!(info.error_num, 1);
        assert_eq!(info.row_count, 4);
        assert_eq!(info.batch_errors.len(), 1);
        assert_eq!(info.batch_errors[0].offset, 2);
        assert_eq!(info.batch_errors[0].code, 1);
        assert!(info.batch_errors[0]
            .message
            .as_deref()
            .unwrap()
            .contains("unique constraint"));

        let err = info.to_error().unwrap();
        assert_eq!(err.oracle_code(), Some(1));
    }

    #[test]
    fn test_dml_row_counts() {
        let mut buf = WriteBuffer::new();
        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        for _ in 0..5 {
            buf.write_ub8(1);
        }
        write_error_info(&mut buf, 0, 9, 5, None, &[]);

        let mut decoder = ResponseDecoder::new(0, 0, false).expect_dml_counts(5);
        let mut rbuf = ReadBuffer::new(buf.freeze());
        decoder.process_payload(&mut rbuf).unwrap();
        let response = decoder.finish();

        assert_eq!(response.row_counts, vec![1, 1, 1, 1, 1]);
        assert_eq!(response.error_info.row_count, 5);
    }

    #[test]
    fn test_status_tolerates_trailing_bytes() {
        let mut buf = WriteBuffer::new();
        buf.write_u8(TNS_MSG_TYPE_STATUS);
        buf.write_ub4(0); // call status
        buf.write_ub2(3); // end-to-end seq
        buf.write_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]); // unknown trailing fields

        let mut decoder = ResponseDecoder::new(0, 0, false);
        let mut rbuf = ReadBuffer::new(buf.freeze());
        let done = decoder.process_payload(&mut rbuf).unwrap();
        assert!(done);
    }

    #[test]
    fn test_sess_ret_piggyback_invalidates() {
        let mut buf = WriteBuffer::new();
        buf.write_u8(TNS_MSG_TYPE_SERVER_SIDE_PIGGYBACK);
        buf.write_u8(TNS_SERVER_PIGGYBACK_SESS_RET);
        buf.write_ub2(0);
        buf.write_u8(0);
        buf.write_ub2(0); // no kv pairs
        buf.write_ub4(TNS_SESSGET_SESSION_CHANGED);
        buf.write_u8(TNS_MSG_TYPE_END_OF_RESPONSE);

        let response = decode(buf);
        assert!(response.session_invalidated);
    }

    #[test]
    fn test_needs_define_for_inline_lobs() {
        let mut buf = WriteBuffer::new();
        write_describe_info(&mut buf, &[("DOC", ORA_TYPE_NUM_CLOB as u8)]);
        buf.write_u8(TNS_MSG_TYPE_END_OF_RESPONSE);

        let response = decode(buf);
        assert!(response.needs_define);
    }

    #[test]
    fn test_row_before_describe_rejected() {
        let mut buf = WriteBuffer::new();
        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        buf.write_bytes_with_length(b"x");

        let mut decoder = ResponseDecoder::new(0, 0, false);
        let mut rbuf = ReadBuffer::new(buf.freeze());
        assert!(decoder.process_payload(&mut rbuf).is_err());
    }

    #[test]
    fn test_flush_out_binds() {
        use crate::protocol::types::OracleValue as V;
        let mut binds = Bindings::from_row(vec![V::Integer(1), V::String("x".into())]).unwrap();

        let mut buf = WriteBuffer::new();
        buf.write_u8(TNS_MSG_TYPE_FLUSH_OUT_BINDS);
        buf.write_u8(TNS_MSG_TYPE_ROW_DATA);
        buf.write_bytes_with_length(&encode_number("99").unwrap());
        buf.write_bytes_with_length(b"out");
        buf.write_u8(TNS_MSG_TYPE_END_OF_RESPONSE);

        let mut decoder = ResponseDecoder::new(0, 0, false).with_binds(&mut binds);
        let mut rbuf = ReadBuffer::new(buf.freeze());
        decoder.process_payload(&mut rbuf).unwrap();
        drop(decoder);

        assert_eq!(
            binds.out_value(crate::binds::BindRef::from_position(0)),
            Some(&V::Number("99".to_string()))
        );
        assert_eq!(
            binds.out_value(crate::binds::BindRef::from_position(1)),
            Some(&V::String("out".to_string()))
        );
    }
}
