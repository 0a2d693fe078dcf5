//! Piggyback messages prepended to outgoing requests.
//!
//! A piggyback is a small auxiliary function call that shares the data
//! packet of the next real request: closing cursors the client abandoned
//! and freeing temporary LOBs.

use crate::error::Result;
use crate::protocol::cleanup::PendingCleanup;
use crate::protocol::constants::*;
use crate::protocol::message::{ub_wire_size, DataMessage, Message, WriteExt};

/// Wraps an inner message with the pending cleanup piggybacks, which are
/// written first into the same data payload.
pub struct WithPiggybacks<M> {
    /// Drained cleanup state to flush ahead of the request.
    pub cleanup: PendingCleanup,
    /// The actual request message.
    pub inner: M,
}

impl<M: Message> WithPiggybacks<M> {
    /// Wrap a message; an empty cleanup set writes nothing extra.
    pub fn new(cleanup: PendingCleanup, inner: M) -> Self {
        Self { cleanup, inner }
    }

    fn close_cursors_wire_size(&self) -> usize {
        if self.cleanup.cursor_ids.is_empty() {
            return 0;
        }
        let mut size = 3; // message type, function code, sequence
        size += 1; // array pointer
        size += ub_wire_size(self.cleanup.cursor_ids.len() as u64);
        size += self
            .cleanup
            .cursor_ids
            .iter()
            .map(|&id| ub_wire_size(id as u64))
            .sum::<usize>();
        size
    }

    fn close_temp_lobs_wire_size(&self) -> usize {
        if self.cleanup.temp_lob_locators.is_empty() {
            return 0;
        }
        let total: usize = self.cleanup.temp_lob_locators.iter().map(Vec::len).sum();
        let mut size = 3; // message type, function code, sequence
        size += 1; // source locator pointer
        size += ub_wire_size(total as u64);
        size += 1; // destination locator pointer
        size += ub_wire_size(0); // destination length
        size += ub_wire_size(0); // source offset
        size += ub_wire_size(0); // destination offset
        size += 1; // charset pointer
        size += ub_wire_size(0); // charset id
        size += ub_wire_size(TNS_LOB_OP_FREE_TEMP as u64);
        size += 1; // scn pointer
        size += ub_wire_size(0); // scn length
        size += 2; // offset and amount pointers
        size += 1; // send amount flag
        size += total;
        size
    }

    fn write_close_cursors(&self, buf: &mut Vec<u8>) {
        if self.cleanup.cursor_ids.is_empty() {
            return;
        }
        buf.write_u8(TNS_MSG_TYPE_PIGGYBACK);
        buf.write_u8(TNS_FUNC_CLOSE_CURSORS);
        buf.write_u8(0); // sequence
        buf.write_u8(1); // array pointer
        buf.write_ub4(self.cleanup.cursor_ids.len() as u32);
        for &cursor_id in &self.cleanup.cursor_ids {
            buf.write_ub4(cursor_id as u32);
        }
    }

    fn write_close_temp_lobs(&self, buf: &mut Vec<u8>) {
        if self.cleanup.temp_lob_locators.is_empty() {
            return;
        }
        let total: usize = self.cleanup.temp_lob_locators.iter().map(Vec::len).sum();
        buf.write_u8(TNS_MSG_TYPE_PIGGYBACK);
        buf.write_u8(TNS_FUNC_LOB_OP);
        buf.write_u8(0); // sequence
        buf.write_u8(1); // source locator pointer
        buf.write_ub4(total as u32);
        buf.write_u8(0); // destination locator pointer
        buf.write_ub4(0); // destination length
        buf.write_ub4(0); // source offset
        buf.write_ub4(0); // destination offset
        buf.write_u8(0); // charset pointer
        buf.write_ub4(0); // charset id
        buf.write_ub4(TNS_LOB_OP_FREE_TEMP);
        buf.write_u8(0); // scn pointer
        buf.write_ub4(0); // scn length
        buf.write_u8(0); // offset pointer
        buf.write_u8(0); // amount pointer
        buf.write_u8(0); // send amount flag
        for locator in &self.cleanup.temp_lob_locators {
            buf.write_bytes(locator);
        }
    }
}

impl<M: Message> Message for WithPiggybacks<M> {
    fn wire_size(&self) -> usize {
        self.close_cursors_wire_size() + self.close_temp_lobs_wire_size() + self.inner.wire_size()
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.write_close_cursors(buf);
        self.write_close_temp_lobs(buf);
        self.inner.write_to(buf)
    }
}

impl<M: DataMessage> DataMessage for WithPiggybacks<M> {
    fn data_flags(&self) -> u16 {
        self.inner.data_flags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::FunctionMessage;

    #[test]
    fn test_empty_cleanup_adds_nothing() {
        let inner = FunctionMessage::ping();
        let inner_size = inner.wire_size();
        let msg = WithPiggybacks::new(PendingCleanup::default(), inner);
        assert_eq!(msg.wire_size(), inner_size);

        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf[0], TNS_MSG_TYPE_FUNCTION);
    }

    #[test]
    fn test_close_cursors_precede_request() {
        let cleanup = PendingCleanup {
            cursor_ids: vec![3, 12],
            temp_lob_locators: Vec::new(),
        };
        let msg = WithPiggybacks::new(cleanup, FunctionMessage::ping());

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());

        assert_eq!(buf[0], TNS_MSG_TYPE_PIGGYBACK);
        assert_eq!(buf[1], TNS_FUNC_CLOSE_CURSORS);
        // cursor count then ids as UB4s: [1, 2], [1, 3], [1, 12]
        assert_eq!(&buf[4..10], &[1, 2, 1, 3, 1, 12]);
        // The real request follows
        assert_eq!(buf[10], TNS_MSG_TYPE_FUNCTION);
        assert_eq!(buf[11], TNS_FUNC_PING);
    }

    #[test]
    fn test_temp_lob_piggyback_size() {
        let cleanup = PendingCleanup {
            cursor_ids: Vec::new(),
            temp_lob_locators: vec![vec![0xAA; 40], vec![0xBB; 40]],
        };
        let msg = WithPiggybacks::new(cleanup, FunctionMessage::ping());

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.wire_size());
        assert_eq!(buf[0], TNS_MSG_TYPE_PIGGYBACK);
        assert_eq!(buf[1], TNS_FUNC_LOB_OP);
    }
}
