//! Cursor over query results.
//!
//! A cursor is a bounded row queue in front of a server-side cursor id.
//! Rows land in the queue from the execute prefetch and from FETCH round
//! trips; consumers pop them out by value. Nothing is fetched until the
//! queue runs dry, which is the driver's backpressure contract, and a
//! cancelled cursor never fetches again.

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::types::{ColumnMetadata, Row};
use futures::stream::Stream;
use std::collections::VecDeque;

/// Server-side progress of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// The server still holds rows; a FETCH will produce more.
    Streaming,
    /// The server reported end of fetch.
    Drained,
    /// The consumer abandoned the stream. The server cursor is left for
    /// the connection's cleanup piggyback and no further FETCH happens.
    Cancelled,
}

/// A cursor over query results.
#[derive(Debug)]
pub struct Cursor {
    /// Column metadata from describe.
    columns: Vec<ColumnMetadata>,
    /// Server-assigned cursor id (0 means none).
    cursor_id: u16,
    /// Rows waiting for the consumer, oldest first.
    buffer: VecDeque<Row>,
    /// Whether the server side is live, drained or cancelled.
    state: CursorState,
    /// Rows requested per FETCH round trip.
    fetch_size: u32,
    /// Rows that have passed through the queue so far.
    rows_seen: u64,
}

impl Cursor {
    pub(crate) fn new(
        columns: Vec<ColumnMetadata>,
        cursor_id: u16,
        rows: Vec<Row>,
        more_rows: bool,
        fetch_size: u32,
    ) -> Self {
        let rows_seen = rows.len() as u64;
        Self {
            columns,
            cursor_id,
            buffer: VecDeque::from(rows),
            state: if more_rows {
                CursorState::Streaming
            } else {
                CursorState::Drained
            },
            fetch_size,
            rows_seen,
        }
    }

    /// Column metadata.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Column names, in select-list order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The server cursor id.
    pub fn cursor_id(&self) -> u16 {
        self.cursor_id
    }

    /// Rows requested per FETCH round trip.
    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Change the FETCH size for subsequent round trips.
    pub fn set_fetch_size(&mut self, size: u32) {
        self.fetch_size = size;
    }

    /// Total rows that have entered the queue so far.
    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    /// Rows currently waiting in the queue.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the consumer cancelled the cursor before exhaustion.
    pub fn is_cancelled(&self) -> bool {
        self.state == CursorState::Cancelled
    }

    /// Whether any rows remain, queued here or on the server.
    pub fn has_more(&self) -> bool {
        !self.buffer.is_empty() || self.state == CursorState::Streaming
    }

    /// Whether the cursor is finished: queue empty and server done.
    pub fn is_exhausted(&self) -> bool {
        !self.has_more()
    }

    /// Pop the next queued row, oldest first. Returns `None` on an empty
    /// queue; use [`Connection::next_row`] to refill over the wire.
    pub fn next_buffered(&mut self) -> Option<Row> {
        self.buffer.pop_front()
    }

    /// Take every queued row at once, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Row> {
        self.buffer.drain(..).collect()
    }

    /// Stop streaming. The queue keeps its rows, but the server side is
    /// done as far as this cursor is concerned.
    pub(crate) fn mark_cancelled(&mut self) {
        self.state = CursorState::Cancelled;
    }

    /// Whether the connection must go to the server for more rows.
    pub(crate) fn needs_fetch(&self) -> bool {
        self.buffer.is_empty() && self.state == CursorState::Streaming
    }

    /// Queue rows from a FETCH response. A cancelled cursor stays
    /// cancelled regardless of what the server reported.
    pub(crate) fn add_rows(&mut self, rows: Vec<Row>, more_rows: bool) {
        self.rows_seen += rows.len() as u64;
        self.buffer.extend(rows);
        if self.state == CursorState::Streaming && !more_rows {
            self.state = CursorState::Drained;
        }
    }
}

/// Adapt a cursor into an async [`Stream`] of rows.
///
/// The stream borrows the connection for its lifetime, which keeps the
/// wire exclusive to this cursor: the next fetch is issued only when the
/// consumer polls past the buffered rows. Dropping the stream before
/// exhaustion leaves the cursor to be closed by the connection's cleanup
/// piggyback on the next request.
pub fn row_stream<'a>(
    conn: &'a mut Connection,
    cursor: Cursor,
) -> impl Stream<Item = Result<Row>> + 'a {
    futures::stream::unfold(
        (conn, cursor, false),
        |(conn, mut cursor, failed)| async move {
            if failed {
                return None;
            }
            match conn.next_row(&mut cursor).await {
                Ok(Some(row)) => Some((Ok(row), (conn, cursor, false))),
                Ok(None) => None,
                Err(e) => Some((Err(e), (conn, cursor, true))),
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{ColumnInfo, OracleValue};
    use std::sync::Arc;

    fn id_column() -> Vec<ColumnMetadata> {
        vec![ColumnMetadata::new("ID".to_string(), 2)]
    }

    fn rows(ids: &[i64]) -> Vec<Row> {
        let info = Arc::new(ColumnInfo::from_metadata(&id_column()).unwrap());
        ids.iter()
            .map(|id| Row::new(vec![OracleValue::Number(id.to_string())], info.clone()))
            .collect()
    }

    #[test]
    fn test_pop_moves_rows_out_in_order() {
        let mut cursor = Cursor::new(id_column(), 42, rows(&[1, 2]), false, 100);

        assert_eq!(cursor.cursor_id(), 42);
        assert_eq!(cursor.buffered(), 2);
        assert!(cursor.has_more());

        let first = cursor.next_buffered().unwrap();
        assert_eq!(first.get(0).unwrap().to_i64(), Some(1));
        let second = cursor.next_buffered().unwrap();
        assert_eq!(second.get(0).unwrap().to_i64(), Some(2));

        assert!(cursor.next_buffered().is_none());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_streaming_until_server_drains() {
        let mut cursor = Cursor::new(id_column(), 42, rows(&[1]), true, 100);

        // Queue holds a row, so no round trip yet
        assert!(!cursor.needs_fetch());
        cursor.next_buffered();
        assert!(cursor.needs_fetch());

        // A fetch that still leaves rows on the server
        cursor.add_rows(rows(&[2, 3]), true);
        assert_eq!(cursor.buffered(), 2);
        assert_eq!(cursor.rows_seen(), 3);
        assert!(!cursor.needs_fetch());

        // The final fetch drains the server side
        cursor.drain();
        cursor.add_rows(rows(&[4]), false);
        cursor.next_buffered();
        assert!(!cursor.needs_fetch());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_drain_empties_the_queue() {
        let mut cursor = Cursor::new(id_column(), 42, rows(&[1, 2, 3]), false, 100);

        cursor.next_buffered();
        let drained = cursor.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(cursor.buffered(), 0);
        assert_eq!(cursor.rows_seen(), 3);
    }

    #[test]
    fn test_cancellation_stops_fetching() {
        let mut cursor = Cursor::new(id_column(), 42, rows(&[1]), true, 100);
        cursor.next_buffered();
        assert!(cursor.needs_fetch());

        cursor.mark_cancelled();
        assert!(cursor.is_cancelled());
        assert!(!cursor.needs_fetch());
        assert!(cursor.is_exhausted());

        // Late rows (already on the wire) never revive the stream
        cursor.add_rows(rows(&[2]), true);
        assert!(cursor.is_cancelled());
        assert!(!cursor.needs_fetch());
    }
}
