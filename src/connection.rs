//! High-level connection API.
//!
//! A [`Connection`] owns the packet stream, the negotiated capabilities
//! and the cleanup context. Every operation takes `&mut self`: exclusive
//! access is the task queue, so requests on one connection are strictly
//! FIFO and never interleave on the wire.

use crate::binds::Bindings;
use crate::config::{AuthParams, ConnectParams, StatementOptions};
use crate::cursor::Cursor;
use crate::error::{BatchError, Error, Result, TransactionError};
use crate::protocol::auth::{authenticate, phase_two, SessionData};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::cleanup::CleanupContext;
use crate::protocol::connect::{connect, exchange_data_types, fast_auth};
use crate::protocol::constants::*;
use crate::protocol::messages::execute::ReexecuteMessage;
use crate::protocol::messages::{
    ExecuteMessage, FetchMessage, FunctionMessage, MarkerMessage, WithPiggybacks,
};
use crate::protocol::packet::{Capabilities, Packet, PacketStream};
use crate::protocol::response::{DecodedResponse, ResponseDecoder};
use crate::protocol::types::{build_fetch_vars, ColumnMetadata, OracleValue, Row};
use crate::statement::{Statement, StatementKind};
use futures::future::BoxFuture;
use std::collections::HashMap;
use tokio::net::TcpStream;

/// Result of a query execution.
#[derive(Debug)]
pub struct QueryResult {
    /// Column metadata.
    pub columns: Vec<ColumnMetadata>,
    /// Rows returned.
    pub rows: Vec<Row>,
    /// Total row count reported by the server.
    pub row_count: u64,
    /// Whether more rows are available (for pagination).
    pub more_rows: bool,
}

impl QueryResult {
    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Result of a DML/DDL/PLSQL execution.
#[derive(Debug, Default)]
pub struct ExecuteResult {
    /// Rows affected across the whole execution.
    pub affected_rows: u64,
    /// Per-statement row counts, when array DML row counts were on.
    pub row_counts: Vec<u64>,
    /// Per-row failures, when batch error mode was on. A non-empty list
    /// accompanies an otherwise successful batch.
    pub batch_errors: Vec<BatchError>,
}

/// Cached parse state for one SQL text.
#[derive(Debug, Clone)]
struct CachedStatement {
    cursor_id: u16,
    requires_full_execute: bool,
    /// Column metadata from the last describe; re-execute responses do
    /// not repeat it.
    columns: Vec<ColumnMetadata>,
}

/// An Oracle database connection.
pub struct Connection {
    /// Framed packet transport.
    stream: PacketStream,
    /// Negotiated capabilities; immutable after the handshake.
    caps: Capabilities,
    /// Session data from authentication.
    session: SessionData,
    /// Default statement options.
    options: StatementOptions,
    /// Deferred cursor / temp LOB closes.
    cleanup: CleanupContext,
    /// Cursor ids by SQL text, for the re-execute fast path.
    stmt_cache: HashMap<String, CachedStatement>,
    /// Request sequence number.
    seq: u8,
}

impl Connection {
    /// Connect to an Oracle database.
    ///
    /// # Arguments
    ///
    /// * `conn_str` - Connection string in format "host:port/service_name"
    /// * `username` - Database username
    /// * `password` - Database password
    ///
    /// # Example
    ///
    /// ```no_run
    /// use orathin::{Connection, Result};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<()> {
    ///     let mut conn = Connection::connect(
    ///         "localhost:1521/FREEPDB1",
    ///         "username",
    ///         "password"
    ///     ).await?;
    ///
    ///     let result = conn.query("SELECT 1 FROM DUAL").await?;
    ///     println!("{} row(s)", result.len());
    ///
    ///     conn.close().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(conn_str: &str, username: &str, password: &str) -> Result<Self> {
        let params = ConnectParams::parse(conn_str)?;
        let auth = AuthParams::new(username, password);
        Self::connect_with_params(&params, auth).await
    }

    /// Connect with explicit connection and authentication parameters.
    pub async fn connect_with_params(params: &ConnectParams, mut auth: AuthParams) -> Result<Self> {
        let mut attempt = 0;
        let tcp_stream = loop {
            match Self::open_socket(params).await {
                Ok(stream) => break stream,
                Err(e) if attempt < params.retry_count => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "connect failed, retrying");
                    tokio::time::sleep(params.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        tcp_stream.set_nodelay(true)?;

        let mut stream = PacketStream::new(tcp_stream);
        let mut caps = Capabilities::new();

        connect(&mut stream, params, &mut caps).await?;

        let session = if caps.supports_fast_auth {
            let mut session = fast_auth(&mut stream, &mut caps, &auth, params).await?;
            phase_two(&mut stream, &auth, params, &caps, &mut session).await?;
            session
        } else {
            exchange_data_types(&mut stream, &mut caps).await?;
            authenticate(&mut stream, &auth, params, &caps).await?
        };

        auth.clear_secrets();

        Ok(Self {
            stream,
            caps,
            session,
            options: StatementOptions::default(),
            cleanup: CleanupContext::new(),
            stmt_cache: HashMap::new(),
            seq: 0,
        })
    }

    async fn open_socket(params: &ConnectParams) -> Result<TcpStream> {
        let addr = format!("{}:{}", params.host, params.port);
        match tokio::time::timeout(params.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::ConnectionTimeout {
                host: params.host.clone(),
                port: params.port,
                timeout: params.connect_timeout,
            }),
        }
    }

    /// Get the protocol version.
    pub fn protocol_version(&self) -> u16 {
        self.caps.protocol_version
    }

    /// Get the SDU size.
    pub fn sdu(&self) -> u32 {
        self.caps.sdu
    }

    /// Default statement options for this connection.
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// Replace the default statement options.
    pub fn set_options(&mut self, options: StatementOptions) {
        self.options = options;
    }

    /// Get a session parameter value from authentication.
    pub fn session_param(&self, key: &str) -> Option<&str> {
        self.session.get(key)
    }

    /// Get the server version 5-tuple.
    pub fn server_version(&self) -> Option<(u8, u8, u8, u8, u8)> {
        self.session.server_version(self.caps.ttc_field_version)
    }

    fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        if self.seq == 0 {
            self.seq = 1;
        }
        self.seq
    }

    fn lookup_statement(&self, sql: &str) -> Result<Statement> {
        let mut stmt = Statement::parse(sql)?;
        if let Some(cached) = self.stmt_cache.get(sql) {
            stmt.set_cursor_id(cached.cursor_id);
            stmt.set_requires_full_execute(cached.requires_full_execute);
        }
        Ok(stmt)
    }

    fn remember_statement(&mut self, stmt: &Statement, columns: &[ColumnMetadata]) {
        if stmt.cursor_id() != 0 && !stmt.sql().is_empty() {
            self.stmt_cache.insert(
                stmt.sql().to_string(),
                CachedStatement {
                    cursor_id: stmt.cursor_id(),
                    requires_full_execute: stmt.requires_full_execute(),
                    columns: columns.to_vec(),
                },
            );
        }
    }

    fn cached_columns(&self, sql: &str) -> Vec<ColumnMetadata> {
        self.stmt_cache
            .get(sql)
            .map(|c| c.columns.clone())
            .unwrap_or_default()
    }

    /// Drop every cached cursor, queueing their closure.
    fn invalidate_statement_cache(&mut self, reusable: bool) {
        let cached: Vec<CachedStatement> = self.stmt_cache.drain().map(|(_, v)| v).collect();
        if reusable {
            for entry in cached {
                self.cleanup.add_cursor(entry.cursor_id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Request/response plumbing
    // ------------------------------------------------------------------

    /// Read one logical response, feeding every data packet into the
    /// decoder until it concludes, then drain to the end-of-request
    /// marker so the wire is clean for the next task.
    async fn read_response(&mut self, decoder: &mut ResponseDecoder<'_>) -> Result<()> {
        let mut saw_end_flag = false;
        loop {
            let packet = self.read_data_response().await?;
            if packet.has_eof() {
                return Err(Error::ConnectionClosed);
            }
            saw_end_flag = packet.has_end_of_request();

            let mut buf = ReadBuffer::new(packet.payload);
            let _data_flags = buf.read_u16_be()?;
            let done = decoder.process_payload(&mut buf)?;

            if done {
                break;
            }
            if saw_end_flag {
                break;
            }
        }

        // Any trailing packets of this request belong to it, not to the
        // next one
        if self.caps.supports_end_of_request && !saw_end_flag {
            loop {
                let packet = self.read_data_response().await?;
                if packet.has_end_of_request() || packet.has_eof() {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Read a DATA packet, handling control and marker packets.
    ///
    /// A MARKER means the server broke the current call: answer with a
    /// RESET marker, wait for the server's own RESET, then read the error
    /// payload that follows.
    async fn read_data_response(&mut self) -> Result<Packet> {
        loop {
            let packet = self.stream.read_packet().await?;

            match packet.packet_type {
                TNS_PACKET_TYPE_DATA => return Ok(packet),
                TNS_PACKET_TYPE_MARKER => {
                    let msg = MarkerMessage::reset();
                    self.stream.send_message(TNS_PACKET_TYPE_MARKER, &msg).await?;

                    loop {
                        let next = self.stream.read_packet().await?;
                        if next.packet_type == TNS_PACKET_TYPE_MARKER {
                            if next.marker_type() == Some(TNS_MARKER_TYPE_RESET) {
                                break;
                            }
                            continue;
                        } else if next.packet_type == TNS_PACKET_TYPE_DATA {
                            return Ok(next);
                        }
                    }
                    continue;
                }
                TNS_PACKET_TYPE_CONTROL => continue,
                TNS_PACKET_TYPE_REFUSE => {
                    return Err(Error::ConnectionRefused {
                        message: String::from_utf8_lossy(&packet.payload).to_string(),
                    });
                }
                other => {
                    return Err(Error::UnexpectedPacketType {
                        expected: TNS_PACKET_TYPE_DATA,
                        actual: other,
                    });
                }
            }
        }
    }

    fn apply_response_state(&mut self, response: &DecodedResponse) {
        if response.session_invalidated {
            // The DRCP session changed; cached cursor ids are meaningless
            // on the new session
            self.invalidate_statement_cache(false);
        }
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    /// Execute a statement without binds, returning the affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<ExecuteResult> {
        let mut binds = Bindings::new();
        self.execute_with(sql, &mut binds).await
    }

    /// Execute a statement with bound values. INOUT binds receive their
    /// output values back into `binds`.
    pub async fn execute_with(&mut self, sql: &str, binds: &mut Bindings) -> Result<ExecuteResult> {
        let mut stmt = self.lookup_statement(sql)?;
        let options = self.options.clone();
        let response = self.run_statement(&mut stmt, binds, &options).await?;

        self.remember_statement(&stmt, &response.columns);
        self.apply_response_state(&response);

        if let Some(err) = response.error_info.to_error() {
            return Err(err);
        }

        Ok(ExecuteResult {
            affected_rows: response.error_info.row_count,
            row_counts: response.row_counts,
            batch_errors: response.error_info.batch_errors,
        })
    }

    /// Execute a DML statement once per row of binds, as one round trip.
    pub async fn execute_batch(
        &mut self,
        sql: &str,
        rows: Vec<Vec<OracleValue>>,
    ) -> Result<ExecuteResult> {
        let mut binds = Bindings::new();
        for row in rows {
            binds.add_row(row)?;
        }
        self.execute_with(sql, &mut binds).await
    }

    /// Execute a query and collect every row.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let mut binds = Bindings::new();
        self.query_with(sql, &mut binds).await
    }

    /// Execute a query with bound values and collect every row.
    pub async fn query_with(&mut self, sql: &str, binds: &mut Bindings) -> Result<QueryResult> {
        let mut cursor = self.open_cursor_with(sql, binds).await?;
        self.fetch_all(&mut cursor).await
    }

    /// Open a cursor for a query, using the connection's default options.
    pub async fn open_cursor(&mut self, sql: &str) -> Result<Cursor> {
        let mut binds = Bindings::new();
        self.open_cursor_with(sql, &mut binds).await
    }

    /// Open a cursor for a query with bound values.
    pub async fn open_cursor_with(&mut self, sql: &str, binds: &mut Bindings) -> Result<Cursor> {
        let mut stmt = self.lookup_statement(sql)?;
        let options = self.options.clone();
        let mut response = self.run_statement(&mut stmt, binds, &options).await?;

        // Inline LOB fetching: re-define the columns as their LONG family
        // members and re-fetch from the start
        if response.needs_define {
            stmt.set_requires_define(true);
            response = self.run_define(&stmt, &response, &options).await?;
        }

        self.remember_statement(&stmt, &response.columns);
        self.apply_response_state(&response);

        if let Some(err) = response.error_info.to_error() {
            return Err(err);
        }

        let more_rows = response.more_rows && !response.error_info.is_end_of_fetch();
        let mut cursor = Cursor::new(
            response.columns,
            stmt.cursor_id(),
            response.rows,
            more_rows,
            options.array_size,
        );
        if !response.implicit_cursors.is_empty() {
            // The first implicit result set supersedes the statement's
            // own (empty) stream
            cursor = Cursor::new(
                Vec::new(),
                response.implicit_cursors[0],
                Vec::new(),
                true,
                options.array_size,
            );
        }
        Ok(cursor)
    }

    /// Run one execute/reexecute round trip for a statement.
    async fn run_statement(
        &mut self,
        stmt: &mut Statement,
        binds: &mut Bindings,
        options: &StatementOptions,
    ) -> Result<DecodedResponse> {
        let seq = self.next_seq();
        let cleanup = self.cleanup.take();
        let num_iters = binds.row_count().max(1) as u32;
        let expect_counts = if options.array_dml_row_counts && stmt.kind() == StatementKind::Dml {
            num_iters
        } else {
            0
        };

        let use_reexecute = stmt.can_reexecute() && !stmt.is_returning();
        let fused_fetch = use_reexecute
            && stmt.kind().is_query()
            && !stmt.requires_define()
            && options.prefetch_rows > 0;

        if use_reexecute {
            let msg = ReexecuteMessage {
                stmt,
                binds: Some(binds),
                fetch: fused_fetch,
                num_iters: if fused_fetch {
                    options.prefetch_rows
                } else {
                    num_iters
                },
                auto_commit: options.auto_commit,
                sequence_number: seq,
                ttc_field_version: self.caps.ttc_field_version,
            };
            let msg = WithPiggybacks::new(cleanup, msg);
            self.stream.send_data_message(&msg).await?;
        } else {
            let msg = ExecuteMessage {
                stmt,
                binds: Some(binds),
                fetch_vars: None,
                prefetch_rows: if stmt.kind().is_query() {
                    options.prefetch_rows
                } else {
                    0
                },
                parse_only: false,
                batch_errors: options.batch_errors,
                dml_row_counts: options.array_dml_row_counts,
                auto_commit: options.auto_commit,
                sequence_number: seq,
                ttc_field_version: self.caps.ttc_field_version,
            };
            let msg = WithPiggybacks::new(cleanup, msg);
            self.stream.send_data_message(&msg).await?;
        }

        let cached_columns = if use_reexecute && stmt.kind().is_query() {
            self.cached_columns(stmt.sql())
        } else {
            Vec::new()
        };
        let mut decoder = ResponseDecoder::new(
            self.caps.ttc_field_version,
            self.caps.server_ttc_field_version,
            options.fetch_lobs,
        )
        .with_columns(cached_columns)?
        .with_binds(binds)
        .expect_dml_counts(expect_counts);

        let read = self.read_response(&mut decoder).await;
        let response = decoder.finish();
        read?;

        if response.error_info.cursor_id != 0 {
            stmt.set_cursor_id(response.error_info.cursor_id);
        }
        // A DDL statement cannot be re-executed on its cursor
        stmt.set_requires_full_execute(stmt.kind().is_ddl());

        Ok(response)
    }

    /// Issue the re-define round converting LOB columns for inline fetch.
    async fn run_define(
        &mut self,
        stmt: &Statement,
        prior: &DecodedResponse,
        options: &StatementOptions,
    ) -> Result<DecodedResponse> {
        let seq = self.next_seq();
        let cleanup = self.cleanup.take();
        let fetch_vars = build_fetch_vars(
            &prior.columns,
            TNS_DEFAULT_LOB_PREFETCH_SIZE,
            options.fetch_lobs,
        );

        let msg = ExecuteMessage {
            stmt,
            binds: None,
            fetch_vars: Some(&fetch_vars),
            prefetch_rows: options.prefetch_rows,
            parse_only: false,
            batch_errors: false,
            dml_row_counts: false,
            auto_commit: false,
            sequence_number: seq,
            ttc_field_version: self.caps.ttc_field_version,
        };
        let msg = WithPiggybacks::new(cleanup, msg);
        self.stream.send_data_message(&msg).await?;

        let mut decoder = ResponseDecoder::new(
            self.caps.ttc_field_version,
            self.caps.server_ttc_field_version,
            options.fetch_lobs,
        )
        .with_columns(prior.columns.clone())?;

        let read = self.read_response(&mut decoder).await;
        let response = decoder.finish();
        read?;
        Ok(response)
    }

    /// Fetch more rows into a cursor.
    pub async fn fetch_more(&mut self, cursor: &mut Cursor) -> Result<()> {
        if !cursor.needs_fetch() {
            return Ok(());
        }

        let seq = self.next_seq();
        let cleanup = self.cleanup.take();

        let msg = WithPiggybacks::new(
            cleanup,
            FetchMessage::new(cursor.cursor_id(), cursor.fetch_size(), seq),
        );
        self.stream.send_data_message(&msg).await?;

        let options = self.options.clone();
        let mut decoder = ResponseDecoder::new(
            self.caps.ttc_field_version,
            self.caps.server_ttc_field_version,
            options.fetch_lobs,
        )
        .with_columns(cursor.columns().to_vec())?;

        let read = self.read_response(&mut decoder).await;
        let response = decoder.finish();
        read?;
        self.apply_response_state(&response);

        if let Some(err) = response.error_info.to_error() {
            return Err(err);
        }

        let more_rows = response.more_rows && !response.error_info.is_end_of_fetch();
        cursor.add_rows(response.rows, more_rows);

        Ok(())
    }

    /// Get the next row from a cursor, fetching more if needed.
    ///
    /// Returns `Ok(None)` when all rows have been consumed.
    pub async fn next_row(&mut self, cursor: &mut Cursor) -> Result<Option<Row>> {
        if let Some(row) = cursor.next_buffered() {
            return Ok(Some(row));
        }

        if cursor.needs_fetch() {
            self.fetch_more(cursor).await?;
            return Ok(cursor.next_buffered());
        }

        Ok(None)
    }

    /// Fetch all remaining rows from a cursor, then release it.
    pub async fn fetch_all(&mut self, cursor: &mut Cursor) -> Result<QueryResult> {
        let mut all_rows = cursor.drain();

        while cursor.needs_fetch() {
            self.fetch_more(cursor).await?;
            all_rows.append(&mut cursor.drain());
        }

        self.close_cursor(cursor);

        Ok(QueryResult {
            columns: cursor.columns().to_vec(),
            rows: all_rows,
            row_count: cursor.rows_seen(),
            more_rows: false,
        })
    }

    /// Cancel a cursor whose consumer stopped early. The server-side
    /// cursor is queued for a close piggyback on the next request.
    pub fn cancel(&mut self, cursor: &mut Cursor) {
        cursor.mark_cancelled();
        self.close_cursor(cursor);
    }

    /// Queue a cursor close. Idempotent per cursor id.
    pub fn close_cursor(&mut self, cursor: &Cursor) {
        if cursor.cursor_id() != 0 {
            self.cleanup.add_cursor(cursor.cursor_id());
            self.stmt_cache
                .retain(|_, cached| cached.cursor_id != cursor.cursor_id());
        }
    }

    /// Fetch an implicit result set by its cursor id. Column metadata
    /// arrives with the first fetch response.
    pub async fn fetch_implicit(&mut self, cursor_id: u16) -> Result<QueryResult> {
        let mut cursor = Cursor::new(
            Vec::new(),
            cursor_id,
            Vec::new(),
            true,
            self.options.array_size,
        );
        self.fetch_all(&mut cursor).await
    }

    // ------------------------------------------------------------------
    // Round trips without statements
    // ------------------------------------------------------------------

    async fn simple_round_trip(&mut self, mut msg: FunctionMessage) -> Result<()> {
        msg.sequence_number = self.next_seq();
        let cleanup = self.cleanup.take();
        let msg = WithPiggybacks::new(cleanup, msg);
        self.stream.send_data_message(&msg).await?;

        let mut decoder = ResponseDecoder::new(
            self.caps.ttc_field_version,
            self.caps.server_ttc_field_version,
            false,
        );
        let read = self.read_response(&mut decoder).await;
        let response = decoder.finish();
        read?;
        self.apply_response_state(&response);

        if let Some(err) = response.error_info.to_error() {
            return Err(err);
        }
        Ok(())
    }

    /// Check the connection is alive with one round trip. No capability
    /// renegotiation happens; the session stays as it was.
    pub async fn ping(&mut self) -> Result<()> {
        self.simple_round_trip(FunctionMessage::ping()).await
    }

    /// Commit the current transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.simple_round_trip(FunctionMessage::commit()).await
    }

    /// Roll back the current transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.simple_round_trip(FunctionMessage::rollback()).await
    }

    /// Run a closure inside a transaction.
    ///
    /// On closure success a COMMIT is sent; on closure failure a
    /// ROLLBACK. Every failure that occurs (closure, commit, rollback)
    /// is reported in the returned [`TransactionError`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use orathin::Connection;
    /// use futures::FutureExt;
    ///
    /// # async fn demo(conn: &mut Connection) {
    /// let outcome = conn
    ///     .with_transaction(|conn| {
    ///         async move {
    ///             conn.execute("INSERT INTO t(id) VALUES (1)").await?;
    ///             conn.execute("INSERT INTO t(id) VALUES (2)").await?;
    ///             Ok(())
    ///         }
    ///         .boxed()
    ///     })
    ///     .await;
    /// # let _ = outcome;
    /// # }
    /// ```
    pub async fn with_transaction<T, F>(&mut self, f: F) -> std::result::Result<T, TransactionError>
    where
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>>,
    {
        match f(self).await {
            Ok(value) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    let mut err = TransactionError {
                        commit_error: Some(commit_err),
                        ..TransactionError::default()
                    };
                    if let Err(rb) = self.rollback().await {
                        err.rollback_error = Some(rb);
                    }
                    Err(err)
                }
            },
            Err(closure_err) => {
                let mut err = TransactionError::from_closure(closure_err);
                if let Err(rb) = self.rollback().await {
                    err.rollback_error = Some(rb);
                }
                Err(err)
            }
        }
    }

    /// Close the connection gracefully: flush pending cursor and temp
    /// LOB closes, log off, and drop the transport.
    pub async fn close(mut self) -> Result<()> {
        self.invalidate_statement_cache(true);

        // Logoff carries the final cleanup piggybacks. Both are best
        // effort: the transport goes away either way.
        let mut msg = FunctionMessage::logoff();
        msg.sequence_number = self.next_seq();
        let cleanup = self.cleanup.take();
        let msg = WithPiggybacks::new(cleanup, msg);
        if self.stream.send_data_message(&msg).await.is_ok() {
            let mut decoder = ResponseDecoder::new(
                self.caps.ttc_field_version,
                self.caps.server_ttc_field_version,
                false,
            );
            let _ = self.read_response(&mut decoder).await;
        }
        Ok(())
    }
}
