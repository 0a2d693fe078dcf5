//! ROWID decoding and universal-rowid text rendering.

use crate::protocol::buffer::ReadBuffer;
use crate::protocol::constants::TNS_BASE64_ALPHABET;
use crate::error::Result;
use std::fmt;

/// A physical ROWID record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowId {
    /// Relative block address of the data object.
    pub rba: u32,
    /// Partition (file) identifier.
    pub partition_id: u16,
    /// Block number within the file.
    pub block_num: u32,
    /// Slot (row) number within the block.
    pub slot_num: u16,
}

impl RowId {
    /// Read a ROWID from its wire form (rba ub4, partition ub2, reserved
    /// u8, block ub4, slot ub2). Returns `None` for the all-zero record.
    pub fn read(buf: &mut ReadBuffer) -> Result<Option<Self>> {
        let rba = buf.read_ub4()?;
        let partition_id = buf.read_ub2()?;
        let _ = buf.read_u8()?;
        let block_num = buf.read_ub4()?;
        let slot_num = buf.read_ub2()?;

        if rba == 0 && partition_id == 0 && block_num == 0 && slot_num == 0 {
            Ok(None)
        } else {
            Ok(Some(Self {
                rba,
                partition_id,
                block_num,
                slot_num,
            }))
        }
    }

    fn push_encoded(out: &mut String, mut value: u64, num_chars: usize) {
        let mut chars = [0u8; 8];
        for i in (0..num_chars).rev() {
            chars[i] = TNS_BASE64_ALPHABET[(value & 0x3f) as usize];
            value >>= 6;
        }
        for &c in &chars[..num_chars] {
            out.push(c as char);
        }
    }
}

impl fmt::Display for RowId {
    /// Universal rowid text: a '*' marker followed by base-64 groups for
    /// rba (6 chars), partition (3), block (6) and slot (3).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::with_capacity(19);
        text.push('*');
        Self::push_encoded(&mut text, self.rba as u64, 6);
        Self::push_encoded(&mut text, self.partition_id as u64, 3);
        Self::push_encoded(&mut text, self.block_num as u64, 6);
        Self::push_encoded(&mut text, self.slot_num as u64, 3);
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buffer::WriteBuffer;
    use bytes::Bytes;

    fn wire(rba: u32, partition: u16, block: u32, slot: u16) -> Bytes {
        let mut buf = WriteBuffer::new();
        buf.write_ub4(rba);
        buf.write_ub2(partition);
        buf.write_u8(0);
        buf.write_ub4(block);
        buf.write_ub2(slot);
        buf.freeze()
    }

    #[test]
    fn test_read_zero_is_none() {
        let mut buf = ReadBuffer::new(wire(0, 0, 0, 0));
        assert_eq!(RowId::read(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_read_round_trip() {
        let mut buf = ReadBuffer::new(wire(0x4000, 6, 0x321, 7));
        let rowid = RowId::read(&mut buf).unwrap().unwrap();
        assert_eq!(rowid.rba, 0x4000);
        assert_eq!(rowid.partition_id, 6);
        assert_eq!(rowid.block_num, 0x321);
        assert_eq!(rowid.slot_num, 7);
    }

    #[test]
    fn test_display_format() {
        let rowid = RowId {
            rba: 0,
            partition_id: 0,
            block_num: 0,
            slot_num: 0,
        };
        let text = rowid.to_string();
        assert_eq!(text.len(), 19);
        assert!(text.starts_with('*'));
        assert_eq!(&text[1..], "AAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn test_display_encodes_fields() {
        // slot 1 encodes as "AAB" in the final group
        let rowid = RowId {
            rba: 0,
            partition_id: 0,
            block_num: 0,
            slot_num: 1,
        };
        let text = rowid.to_string();
        assert!(text.ends_with("AAB"));

        // rba 26 encodes into the first group
        let rowid = RowId {
            rba: 26,
            partition_id: 0,
            block_num: 0,
            slot_num: 0,
        };
        let text = rowid.to_string();
        assert_eq!(&text[1..7], "AAAAAa");
    }
}
