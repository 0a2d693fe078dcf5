//! Execute and re-execute messages for SQL statement execution.

use crate::binds::Bindings;
use crate::error::Result;
use crate::protocol::constants::*;
use crate::protocol::message::{
    bytes_with_length_wire_size, ub_wire_size, DataMessage, Message, WriteExt,
};
use crate::protocol::types::FetchVar;
use crate::statement::Statement;

/// Full execute message (TNS_FUNC_EXECUTE).
///
/// Covers first execution (parse + execute), parse-only describes,
/// re-define rounds, and batch DML with accumulated bind rows.
pub struct ExecuteMessage<'a> {
    /// The statement to execute.
    pub stmt: &'a Statement,
    /// Bound parameter values, when any.
    pub binds: Option<&'a Bindings>,
    /// Fetch variable definitions for a re-define round.
    pub fetch_vars: Option<&'a [FetchVar]>,
    /// Rows the server returns in the execute response.
    pub prefetch_rows: u32,
    /// Parse without executing (describe round).
    pub parse_only: bool,
    /// Collect per-row errors instead of failing the batch.
    pub batch_errors: bool,
    /// Request per-statement DML row counts for batches.
    pub dml_row_counts: bool,
    /// Commit as part of this execution.
    pub auto_commit: bool,
    /// Request sequence number.
    pub sequence_number: u8,
    /// TTC field version from capabilities.
    pub ttc_field_version: u8,
}

impl<'a> ExecuteMessage<'a> {
    /// Create an execute message with everything defaulted except the
    /// statement itself.
    pub fn new(stmt: &'a Statement, prefetch_rows: u32, ttc_field_version: u8) -> Self {
        Self {
            stmt,
            binds: None,
            fetch_vars: None,
            prefetch_rows,
            parse_only: false,
            batch_errors: false,
            dml_row_counts: false,
            auto_commit: false,
            sequence_number: 1,
            ttc_field_version,
        }
    }

    /// Create a re-define message for an already-open cursor.
    pub fn new_define(
        stmt: &'a Statement,
        fetch_vars: &'a [FetchVar],
        prefetch_rows: u32,
        ttc_field_version: u8,
    ) -> Self {
        Self {
            stmt,
            binds: None,
            fetch_vars: Some(fetch_vars),
            prefetch_rows,
            parse_only: false,
            batch_errors: false,
            dml_row_counts: false,
            auto_commit: false,
            sequence_number: 2,
            ttc_field_version,
        }
    }

    fn is_new_cursor(&self) -> bool {
        self.stmt.cursor_id() == 0 || self.stmt.kind().is_ddl()
    }

    fn has_binds(&self) -> bool {
        self.binds.is_some_and(|b| !b.is_empty())
    }

    /// Execution count: 1 for single statements, n for an n-row batch.
    fn num_iters(&self) -> u32 {
        self.binds.map_or(1, |b| b.row_count().max(1)) as u32
    }

    /// Options word for this execution.
    fn calc_options(&self) -> u32 {
        let mut options: u32 = 0;
        if self.fetch_vars.is_some() {
            options |= TNS_EXEC_OPTION_DEFINE;
        } else if !self.parse_only {
            options |= TNS_EXEC_OPTION_EXECUTE;
        }
        if self.is_new_cursor() {
            options |= TNS_EXEC_OPTION_PARSE;
        }
        if self.parse_only {
            options |= TNS_EXEC_OPTION_DESCRIBE;
        }
        if self.stmt.kind().is_query()
            && self.prefetch_rows > 0
            && self.fetch_vars.is_none()
            && !self.parse_only
        {
            options |= TNS_EXEC_OPTION_FETCH;
        }
        if self.stmt.kind().is_plsql() {
            if self.has_binds() {
                options |= TNS_EXEC_OPTION_PLSQL_BIND;
            }
        } else {
            options |= TNS_EXEC_OPTION_NOT_PLSQL;
        }
        if self.has_binds() {
            options |= TNS_EXEC_OPTION_BIND;
        }
        if self.batch_errors {
            options |= TNS_EXEC_OPTION_BATCH_ERRORS;
        }
        if self.auto_commit {
            options |= TNS_EXEC_OPTION_COMMIT;
        }
        options
    }

    /// al8i4[9] flags word.
    fn calc_exec_flags(&self) -> u32 {
        let mut exec_flags: u32 = 0;
        if !self.stmt.sql().is_empty() && !self.parse_only {
            exec_flags |= TNS_EXEC_FLAGS_IMPLICIT_RESULTSET;
        }
        if self.dml_row_counts {
            exec_flags |= TNS_EXEC_FLAGS_DML_ROWCOUNTS;
        }
        exec_flags
    }

    /// al8i4[1]: execution count transmitted to the server.
    fn calc_exec_count(&self) -> u32 {
        if self.parse_only {
            0
        } else if self.stmt.kind().is_query() {
            if self.is_new_cursor() || self.fetch_vars.is_some() {
                0
            } else {
                self.prefetch_rows
            }
        } else {
            self.num_iters()
        }
    }

    /// Wire size of the column define metadata.
    fn define_metadata_wire_size(&self) -> usize {
        let fetch_vars = match &self.fetch_vars {
            Some(vars) => vars,
            None => return 0,
        };

        let mut size = 0;
        for var in fetch_vars.iter() {
            size += 4; // type, flags, precision, scale
            size += ub_wire_size(var.buffer_size as u64);
            size += ub_wire_size(var.max_num_elements as u64);
            size += ub_wire_size(var.cont_flag);
            size += ub_wire_size(0); // OID
            size += ub_wire_size(0); // version
            size += ub_wire_size(var.charset_id as u64);
            size += 1; // charset form
            size += ub_wire_size(var.lob_prefetch_length as u64);
            if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
                size += ub_wire_size(0); // oaccolid
            }
        }
        size
    }

    /// Write the column define metadata, one entry per fetch variable.
    fn write_define_metadata(&self, buf: &mut Vec<u8>) {
        let fetch_vars = match &self.fetch_vars {
            Some(vars) => vars,
            None => return,
        };

        for var in fetch_vars.iter() {
            buf.write_u8(var.ora_type_num);
            buf.write_u8(var.flags);
            buf.write_u8(0); // precision
            buf.write_u8(0); // scale
            buf.write_ub4(var.buffer_size);
            buf.write_ub4(var.max_num_elements);
            buf.write_ub8(var.cont_flag);
            buf.write_ub4(0); // OID
            buf.write_ub2(0); // version
            buf.write_ub2(var.charset_id);
            buf.write_u8(var.charset_form);
            buf.write_ub4(var.lob_prefetch_length);
            if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
                buf.write_ub4(0); // oaccolid
            }
        }
    }

    /// Whether bind row data follows the metadata, and over which rows.
    fn bind_rows(&self) -> Option<(&'a Bindings, std::ops::Range<usize>)> {
        let binds = self.binds.filter(|b| !b.is_empty())?;
        if self.parse_only {
            if self.stmt.kind().is_plsql() {
                // Parse-only PL/SQL batch sends a single all-null row;
                // an out-of-range index encodes null in every column
                let row_count = binds.row_count();
                Some((binds, row_count..row_count + 1))
            } else {
                None
            }
        } else {
            Some((binds, 0..binds.row_count().max(1)))
        }
    }
}

impl Message for ExecuteMessage<'_> {
    fn wire_size(&self) -> usize {
        let sql_bytes = self.stmt.sql().as_bytes();
        let is_new_cursor = self.is_new_cursor();
        let num_binds = self.binds.map_or(0, |b| b.len() as u32);

        let mut size = 0;

        // Function header
        size += 3; // message type, function code, sequence
        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1_EXT_1 {
            size += 1; // extended sequence number
        }

        size += ub_wire_size(self.calc_options() as u64);
        size += ub_wire_size(self.stmt.cursor_id() as u64);

        // SQL pointer and length
        size += 1;
        size += ub_wire_size(if is_new_cursor {
            sql_bytes.len() as u64
        } else {
            0
        });

        // al8i4 vector pointer and length
        size += 1;
        size += ub_wire_size(13);

        size += 2; // al8o4 and al8o4l pointers

        size += ub_wire_size(0); // prefetch buffer size
        size += ub_wire_size(self.prefetch_rows as u64);
        size += ub_wire_size(TNS_MAX_LONG_LENGTH as u64); // max long size

        // Bind pointers
        size += 1;
        size += ub_wire_size(num_binds as u64);

        size += 5; // al8app, al8txn, al8txl, al8kv, al8kvl pointers

        // Define pointers
        size += 1;
        let num_defines = self.fetch_vars.map_or(0, |v| v.len() as u32);
        size += ub_wire_size(num_defines as u64);

        size += ub_wire_size(0); // registration id
        size += 1; // al8objlist pointer
        size += 1; // al8objlen pointer
        size += 1; // al8blv pointer
        size += ub_wire_size(0); // al8blvl
        size += 1; // al8dnam pointer
        size += ub_wire_size(0); // al8dnaml
        size += ub_wire_size(0); // al8regid_msb

        // DML rowcount pointers
        size += 1;
        size += ub_wire_size(if self.dml_row_counts {
            self.num_iters() as u64
        } else {
            0
        });
        size += 1;

        // 12.2+ fields
        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
            size += 1; // al8sqlsig pointer
            size += ub_wire_size(0); // SQL signature length
            size += 1; // SQL ID pointer
            size += ub_wire_size(0); // SQL ID size
            size += 1; // SQL ID length pointer

            if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2_EXT_1 {
                size += 1; // chunk ids pointer
                size += ub_wire_size(0); // num chunk ids
            }
        }

        if is_new_cursor {
            size += bytes_with_length_wire_size(sql_bytes.len());
        }

        // al8i4 array (13 slots)
        size += ub_wire_size(if is_new_cursor { 1 } else { 0 });
        size += ub_wire_size(self.calc_exec_count() as u64);
        size += ub_wire_size(0) * 5; // [2-6]
        size += ub_wire_size(if self.stmt.kind().is_query() { 1 } else { 0 });
        size += ub_wire_size(0); // [8]
        size += ub_wire_size(self.calc_exec_flags() as u64);
        size += ub_wire_size(0) * 3; // [10-12]

        size += self.define_metadata_wire_size();

        if self.fetch_vars.is_none() {
            if let Some(binds) = self.binds.filter(|b| !b.is_empty()) {
                size += binds.metadata_wire_size(self.ttc_field_version);
                if let Some((binds, rows)) = self.bind_rows() {
                    for row in rows {
                        size += binds.row_wire_size(row);
                    }
                }
            }
        }

        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        let sql_bytes = self.stmt.sql().as_bytes();
        let is_new_cursor = self.is_new_cursor();
        let num_binds = self.binds.map_or(0, |b| b.len() as u32);
        let options = self.calc_options();

        // Function header
        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(TNS_FUNC_EXECUTE);
        buf.write_u8(self.sequence_number);
        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1_EXT_1 {
            buf.write_u8(0); // extended sequence number
        }

        buf.write_ub4(options);
        buf.write_ub4(self.stmt.cursor_id() as u32);

        if is_new_cursor {
            buf.write_u8(1); // has SQL
            buf.write_ub4(sql_bytes.len() as u32);
        } else {
            buf.write_u8(0);
            buf.write_ub4(0);
        }

        buf.write_u8(1); // al8i4 vector pointer
        buf.write_ub4(13); // al8i4 array length

        buf.write_u8(0); // al8o4 pointer
        buf.write_u8(0); // al8o4l pointer

        buf.write_ub4(0); // prefetch buffer size
        buf.write_ub4(self.prefetch_rows);
        buf.write_ub4(TNS_MAX_LONG_LENGTH); // max long size

        if num_binds > 0 {
            buf.write_u8(1);
        } else {
            buf.write_u8(0);
        }
        buf.write_ub4(num_binds);

        buf.write_u8(0); // al8app
        buf.write_u8(0); // al8txn
        buf.write_u8(0); // al8txl
        buf.write_u8(0); // al8kv
        buf.write_u8(0); // al8kvl

        if let Some(fetch_vars) = &self.fetch_vars {
            buf.write_u8(1); // al8doac pointer (defines follow)
            buf.write_ub4(fetch_vars.len() as u32);
        } else {
            buf.write_u8(0);
            buf.write_ub4(0);
        }

        buf.write_ub4(0); // registration id
        buf.write_u8(0); // al8objlist pointer
        buf.write_u8(1); // al8objlen pointer
        buf.write_u8(0); // al8blv pointer
        buf.write_ub4(0); // al8blvl
        buf.write_u8(0); // al8dnam pointer
        buf.write_ub4(0); // al8dnaml
        buf.write_ub4(0); // al8regid_msb

        if self.dml_row_counts {
            buf.write_u8(1); // al8pidmlrc pointer
            buf.write_ub4(self.num_iters());
            buf.write_u8(1); // al8pidmlrcl pointer
        } else {
            buf.write_u8(0);
            buf.write_ub4(0);
            buf.write_u8(0);
        }

        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2 {
            buf.write_u8(0); // al8sqlsig pointer
            buf.write_ub4(0); // SQL signature length
            buf.write_u8(0); // SQL ID pointer
            buf.write_ub4(0); // SQL ID size
            buf.write_u8(0); // SQL ID length pointer

            if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_12_2_EXT_1 {
                buf.write_u8(0); // chunk ids pointer
                buf.write_ub4(0); // num chunk ids
            }
        }

        if is_new_cursor {
            buf.write_bytes_with_length(sql_bytes);
        }

        // al8i4 array
        buf.write_ub4(if is_new_cursor { 1 } else { 0 }); // [0] parse flag
        buf.write_ub4(self.calc_exec_count()); // [1] execution count
        buf.write_ub4(0); // [2]
        buf.write_ub4(0); // [3]
        buf.write_ub4(0); // [4]
        buf.write_ub4(0); // [5] SCN
        buf.write_ub4(0); // [6] SCN
        buf.write_ub4(if self.stmt.kind().is_query() { 1 } else { 0 }); // [7]
        buf.write_ub4(0); // [8]
        buf.write_ub4(self.calc_exec_flags()); // [9]
        buf.write_ub4(0); // [10] fetch orientation
        buf.write_ub4(0); // [11] fetch position
        buf.write_ub4(0); // [12]

        self.write_define_metadata(buf);

        if self.fetch_vars.is_none() {
            if let Some(binds) = self.binds.filter(|b| !b.is_empty()) {
                binds.write_metadata(buf, self.ttc_field_version);
                if let Some((binds, rows)) = self.bind_rows() {
                    for row in rows {
                        binds.write_row(buf, row);
                    }
                }
            }
        }

        Ok(())
    }
}

impl DataMessage for ExecuteMessage<'_> {}

/// Short re-execute message for an already-parsed cursor
/// (TNS_FUNC_REEXECUTE, or TNS_FUNC_REEXECUTE_AND_FETCH when the fetch is
/// fused into the same round trip).
pub struct ReexecuteMessage<'a> {
    /// The statement; must carry a server cursor id.
    pub stmt: &'a Statement,
    /// Bound parameter values, when any.
    pub binds: Option<&'a Bindings>,
    /// Fuse the first fetch into this round trip (queries only).
    pub fetch: bool,
    /// Iterations (fetch row count for fused fetch, batch rows otherwise).
    pub num_iters: u32,
    /// Commit as part of this execution.
    pub auto_commit: bool,
    /// Request sequence number.
    pub sequence_number: u8,
    /// TTC field version from capabilities.
    pub ttc_field_version: u8,
}

impl ReexecuteMessage<'_> {
    fn function_code(&self) -> u8 {
        if self.fetch {
            TNS_FUNC_REEXECUTE_AND_FETCH
        } else {
            TNS_FUNC_REEXECUTE
        }
    }

    fn exec_flags(&self) -> (u32, u32) {
        let mut flags1 = 0;
        let mut flags2 = 0;
        if self.fetch {
            flags1 |= TNS_EXEC_OPTION_EXECUTE;
        } else if self.auto_commit {
            flags2 |= TNS_EXEC_OPTION_COMMIT_REEXECUTE;
        }
        (flags1, flags2)
    }
}

impl Message for ReexecuteMessage<'_> {
    fn wire_size(&self) -> usize {
        let (flags1, flags2) = self.exec_flags();
        let mut size = 3; // message type, function code, sequence
        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1_EXT_1 {
            size += 1;
        }
        size += ub_wire_size(self.stmt.cursor_id() as u64);
        size += ub_wire_size(self.num_iters as u64);
        size += ub_wire_size(flags1 as u64);
        size += ub_wire_size(flags2 as u64);
        if let Some(binds) = self.binds.filter(|b| !b.is_empty()) {
            for row in 0..binds.row_count().max(1) {
                size += binds.row_wire_size(row);
            }
        }
        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        let (flags1, flags2) = self.exec_flags();
        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(self.function_code());
        buf.write_u8(self.sequence_number);
        if self.ttc_field_version >= TNS_CCAP_FIELD_VERSION_23_1_EXT_1 {
            buf.write_u8(0);
        }
        buf.write_ub4(self.stmt.cursor_id() as u32);
        buf.write_ub4(self.num_iters);
        buf.write_ub4(flags1);
        buf.write_ub4(flags2);
        if let Some(binds) = self.binds.filter(|b| !b.is_empty()) {
            for row in 0..binds.row_count().max(1) {
                binds.write_row(buf, row);
            }
        }
        Ok(())
    }
}

impl DataMessage for ReexecuteMessage<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::OracleValue;

    fn query_stmt() -> Statement {
        Statement::parse("SELECT 1 FROM DUAL").unwrap()
    }

    #[test]
    fn test_execute_message_wire_size() {
        let stmt = query_stmt();
        for ttc in [
            0,
            TNS_CCAP_FIELD_VERSION_12_2,
            TNS_CCAP_FIELD_VERSION_12_2_EXT_1,
            TNS_CCAP_FIELD_VERSION_23_1_EXT_1,
            TNS_CCAP_FIELD_VERSION_MAX,
        ] {
            let msg = ExecuteMessage::new(&stmt, 100, ttc);
            let mut buf = Vec::with_capacity(msg.wire_size());
            msg.write_to(&mut buf).unwrap();
            assert_eq!(buf.len(), msg.wire_size(), "ttc {}", ttc);
        }
    }

    #[test]
    fn test_execute_message_options() {
        let stmt = query_stmt();
        let msg = ExecuteMessage::new(&stmt, 100, TNS_CCAP_FIELD_VERSION_19_1);
        let options = msg.calc_options();

        assert!(options & TNS_EXEC_OPTION_PARSE != 0);
        assert!(options & TNS_EXEC_OPTION_EXECUTE != 0);
        assert!(options & TNS_EXEC_OPTION_FETCH != 0);
        assert!(options & TNS_EXEC_OPTION_NOT_PLSQL != 0);
        assert!(options & TNS_EXEC_OPTION_BIND == 0);
    }

    #[test]
    fn test_dml_batch_execute() {
        let stmt = Statement::parse("INSERT INTO t(id) VALUES (:1)").unwrap();
        let mut binds = Bindings::new();
        for i in 0..5 {
            binds.add_row(vec![OracleValue::Integer(i)]).unwrap();
        }

        let mut msg = ExecuteMessage::new(&stmt, 0, TNS_CCAP_FIELD_VERSION_19_1);
        msg.binds = Some(&binds);
        msg.dml_row_counts = true;

        assert_eq!(msg.num_iters(), 5);
        assert_eq!(msg.calc_exec_count(), 5);
        assert!(msg.calc_exec_flags() & TNS_EXEC_FLAGS_DML_ROWCOUNTS != 0);
        assert!(msg.calc_options() & TNS_EXEC_OPTION_BIND != 0);

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());

        // One row-data message per batch row
        let row_data_count = buf
            .windows(1)
            .filter(|w| w[0] == TNS_MSG_TYPE_ROW_DATA)
            .count();
        assert!(row_data_count >= 5);
    }

    #[test]
    fn test_batch_errors_option() {
        let stmt = Statement::parse("INSERT INTO t(id) VALUES (:1)").unwrap();
        let mut msg = ExecuteMessage::new(&stmt, 0, TNS_CCAP_FIELD_VERSION_19_1);
        msg.batch_errors = true;
        assert!(msg.calc_options() & TNS_EXEC_OPTION_BATCH_ERRORS != 0);
    }

    #[test]
    fn test_plsql_bind_option() {
        let stmt = Statement::parse("BEGIN proc(:1); END;").unwrap();
        let binds = Bindings::from_row(vec![OracleValue::Integer(1)]).unwrap();
        let mut msg = ExecuteMessage::new(&stmt, 0, TNS_CCAP_FIELD_VERSION_19_1);
        msg.binds = Some(&binds);

        let options = msg.calc_options();
        assert!(options & TNS_EXEC_OPTION_PLSQL_BIND != 0);
        assert!(options & TNS_EXEC_OPTION_NOT_PLSQL == 0);
    }

    #[test]
    fn test_execute_with_defines() {
        let mut stmt = query_stmt();
        stmt.set_cursor_id(1);
        let fetch_vars = vec![
            FetchVar::new(ORA_TYPE_NUM_VARCHAR as u8, 100, 1),
            FetchVar::new_lob(ORA_TYPE_NUM_CLOB as u8, 4000, TNS_DEFAULT_LOB_PREFETCH_SIZE),
        ];

        let msg =
            ExecuteMessage::new_define(&stmt, &fetch_vars, 100, TNS_CCAP_FIELD_VERSION_19_1);

        let options = msg.calc_options();
        assert!(options & TNS_EXEC_OPTION_DEFINE != 0);
        assert!(options & TNS_EXEC_OPTION_FETCH == 0);
        assert!(options & TNS_EXEC_OPTION_PARSE == 0);
        assert!(options & TNS_EXEC_OPTION_EXECUTE == 0);

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
    }

    #[test]
    fn test_ddl_always_parses() {
        let mut stmt = Statement::parse("CREATE TABLE t (x NUMBER)").unwrap();
        stmt.set_cursor_id(55);
        let msg = ExecuteMessage::new(&stmt, 0, TNS_CCAP_FIELD_VERSION_19_1);
        assert!(msg.calc_options() & TNS_EXEC_OPTION_PARSE != 0);
    }

    #[test]
    fn test_reexecute_wire_size() {
        let mut stmt = query_stmt();
        stmt.set_cursor_id(12);
        let binds = Bindings::from_row(vec![OracleValue::Integer(3)]).unwrap();

        for fetch in [false, true] {
            let msg = ReexecuteMessage {
                stmt: &stmt,
                binds: Some(&binds),
                fetch,
                num_iters: 21,
                auto_commit: false,
                sequence_number: 3,
                ttc_field_version: TNS_CCAP_FIELD_VERSION_19_1,
            };
            let mut buf = Vec::with_capacity(msg.wire_size());
            msg.write_to(&mut buf).unwrap();
            assert_eq!(buf.len(), msg.wire_size(), "fetch={}", fetch);
            assert_eq!(
                buf[1],
                if fetch {
                    TNS_FUNC_REEXECUTE_AND_FETCH
                } else {
                    TNS_FUNC_REEXECUTE
                }
            );
        }
    }

    #[test]
    fn test_reexecute_autocommit_flag() {
        let mut stmt = Statement::parse("INSERT INTO t(id) VALUES (:1)").unwrap();
        stmt.set_cursor_id(9);
        let msg = ReexecuteMessage {
            stmt: &stmt,
            binds: None,
            fetch: false,
            num_iters: 1,
            auto_commit: true,
            sequence_number: 2,
            ttc_field_version: TNS_CCAP_FIELD_VERSION_19_1,
        };
        let (flags1, flags2) = msg.exec_flags();
        assert_eq!(flags1, 0);
        assert_eq!(flags2, TNS_EXEC_OPTION_COMMIT_REEXECUTE);
    }
}
