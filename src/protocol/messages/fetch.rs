//! Fetch message for retrieving more rows from an open cursor.

use crate::error::Result;
use crate::protocol::constants::*;
use crate::protocol::message::{ub_wire_size, DataMessage, Message, WriteExt};

/// Fetch request: just the cursor id and the number of rows wanted.
pub struct FetchMessage {
    /// Cursor ID (assigned by server during execute).
    pub cursor_id: u16,
    /// Number of rows to fetch (the array size).
    pub fetch_size: u32,
    /// Request sequence number.
    pub sequence_number: u8,
}

impl FetchMessage {
    /// Create a new fetch message.
    pub fn new(cursor_id: u16, fetch_size: u32, sequence_number: u8) -> Self {
        Self {
            cursor_id,
            fetch_size,
            sequence_number,
        }
    }
}

impl Message for FetchMessage {
    fn wire_size(&self) -> usize {
        let mut size = 3; // message type, function code, sequence
        size += ub_wire_size(self.cursor_id as u64);
        size += ub_wire_size(self.fetch_size as u64);
        size
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(TNS_MSG_TYPE_FUNCTION);
        buf.write_u8(TNS_FUNC_FETCH);
        buf.write_u8(self.sequence_number);
        buf.write_ub4(self.cursor_id as u32);
        buf.write_ub4(self.fetch_size);
        Ok(())
    }
}

impl DataMessage for FetchMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_message_wire_size() {
        let msg = FetchMessage::new(42, 100, 1);

        let mut buf = Vec::with_capacity(msg.wire_size());
        msg.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), msg.wire_size());
    }

    #[test]
    fn test_fetch_message_content() {
        let msg = FetchMessage::new(42, 100, 2);

        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();

        assert_eq!(buf[0], TNS_MSG_TYPE_FUNCTION);
        assert_eq!(buf[1], TNS_FUNC_FETCH);
        assert_eq!(buf[2], 2);
    }
}
