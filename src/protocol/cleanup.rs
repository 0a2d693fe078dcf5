//! Deferred resource cleanup.
//!
//! Cursors abandoned by their consumer and temporary LOBs awaiting closure
//! are not worth a round trip of their own. Their ids queue here and ride
//! as piggyback messages on the next outgoing request, or are flushed at
//! graceful close. Temporary-LOB closure is best effort: when the queue
//! exceeds its byte budget, further locators are dropped rather than
//! blocking user operations.

use crate::protocol::constants::{TNS_MAX_CURSORS_TO_CLOSE, TNS_MAX_TEMP_LOB_CLEANUP_BYTES};
use std::collections::HashSet;

/// Pending resource closures for one connection.
#[derive(Debug, Default)]
pub struct CleanupContext {
    cursors_to_close: HashSet<u16>,
    temp_lobs_to_close: Vec<Vec<u8>>,
    temp_lob_total_size: usize,
}

impl CleanupContext {
    /// Create an empty cleanup context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cursor id for closure on the next request.
    ///
    /// Each cursor is queued at most once; the set is bounded, and a full
    /// set drops the oldest guarantee of batching (the id is still
    /// recorded so it is never leaked silently).
    pub fn add_cursor(&mut self, cursor_id: u16) {
        if cursor_id != 0 && self.cursors_to_close.len() < TNS_MAX_CURSORS_TO_CLOSE {
            self.cursors_to_close.insert(cursor_id);
        }
    }

    /// Queue a temporary LOB locator for closure.
    pub fn add_temp_lob(&mut self, locator: Vec<u8>) {
        if self.temp_lob_total_size + locator.len() > TNS_MAX_TEMP_LOB_CLEANUP_BYTES {
            tracing::warn!(
                queued = self.temp_lobs_to_close.len(),
                "temp LOB cleanup queue full, dropping locator"
            );
            return;
        }
        self.temp_lob_total_size += locator.len();
        self.temp_lobs_to_close.push(locator);
    }

    /// Whether anything is waiting to be flushed.
    pub fn is_empty(&self) -> bool {
        self.cursors_to_close.is_empty() && self.temp_lobs_to_close.is_empty()
    }

    /// Number of queued cursor closes.
    pub fn cursor_count(&self) -> usize {
        self.cursors_to_close.len()
    }

    /// Total bytes of queued temporary LOB locators.
    pub fn temp_lob_total_size(&self) -> usize {
        self.temp_lob_total_size
    }

    /// Drain everything queued, for attachment to the next request.
    pub fn take(&mut self) -> PendingCleanup {
        let mut cursor_ids: Vec<u16> = self.cursors_to_close.drain().collect();
        cursor_ids.sort_unstable();
        self.temp_lob_total_size = 0;
        PendingCleanup {
            cursor_ids,
            temp_lob_locators: std::mem::take(&mut self.temp_lobs_to_close),
        }
    }
}

/// A drained snapshot of the cleanup context, ready for serialization.
#[derive(Debug, Default, Clone)]
pub struct PendingCleanup {
    /// Cursor ids to close, in ascending order.
    pub cursor_ids: Vec<u16>,
    /// Temporary LOB locators to free.
    pub temp_lob_locators: Vec<Vec<u8>>,
}

impl PendingCleanup {
    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.cursor_ids.is_empty() && self.temp_lob_locators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_queue_dedups() {
        let mut ctx = CleanupContext::new();
        ctx.add_cursor(5);
        ctx.add_cursor(5);
        ctx.add_cursor(9);
        ctx.add_cursor(0); // id 0 is never a real cursor
        assert_eq!(ctx.cursor_count(), 2);

        let pending = ctx.take();
        assert_eq!(pending.cursor_ids, vec![5, 9]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_take_clears_lobs() {
        let mut ctx = CleanupContext::new();
        ctx.add_temp_lob(vec![1; 40]);
        ctx.add_temp_lob(vec![2; 40]);
        assert_eq!(ctx.temp_lob_total_size(), 80);

        let pending = ctx.take();
        assert_eq!(pending.temp_lob_locators.len(), 2);
        assert_eq!(ctx.temp_lob_total_size(), 0);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_lob_queue_is_bounded() {
        let mut ctx = CleanupContext::new();
        ctx.add_temp_lob(vec![0; TNS_MAX_TEMP_LOB_CLEANUP_BYTES]);
        // Over budget: dropped, best effort
        ctx.add_temp_lob(vec![0; 40]);
        assert_eq!(ctx.take().temp_lob_locators.len(), 1);
    }
}
