//! Outbound message traits and serialization helpers.
//!
//! A request message knows its exact wire size before serialization, so
//! the payload is built with a single allocation. The variable-length
//! integer layout itself lives in [`crate::protocol::buffer`]; the size
//! helpers and the [`WriteExt`] writers here both delegate to that one
//! implementation, so a computed size can never drift from the bytes
//! actually produced.

use crate::error::Result;
use crate::protocol::buffer::{uvar_bytes, uvar_wire_size};
use crate::protocol::constants::*;

/// A message that can report its serialized size and write itself.
///
/// 1. `wire_size()` gives the byte count, excluding the packet header
/// 2. the caller allocates once
/// 3. `write_to()` serializes straight into the buffer
pub trait Message {
    /// Serialized size in bytes (excluding packet header).
    fn wire_size(&self) -> usize;

    /// Write the message content. The caller guarantees capacity for
    /// `wire_size()` bytes.
    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// A message carried in a DATA packet, which prefixes a data-flags word.
pub trait DataMessage: Message {
    /// Data flags for this message.
    fn data_flags(&self) -> u16 {
        0
    }

    /// Total wire size including the 2-byte data-flags prefix.
    fn data_wire_size(&self) -> usize {
        2 + self.wire_size()
    }
}

/// Wire size of any UBx value (UB2/UB4/UB8 share one layout: a length
/// prefix byte plus the significant big-endian bytes).
#[inline]
pub fn ub_wire_size(val: u64) -> usize {
    uvar_wire_size(val)
}

/// Exact wire size of length-prefixed bytes.
///
/// Values shorter than the long indicator cost one length byte; longer
/// values switch to the chunked form, whose per-chunk UB4 headers depend
/// on each chunk's length, so the chunks are walked rather than
/// approximated.
pub fn bytes_with_length_wire_size(len: usize) -> usize {
    if len == 0 {
        1
    } else if len < TNS_LONG_LENGTH_INDICATOR as usize {
        1 + len
    } else {
        // Indicator byte plus the zero chunk terminator
        let mut size = 1 + ub_wire_size(0);
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(TNS_CHUNK_MAX);
            size += ub_wire_size(chunk as u64) + chunk;
            remaining -= chunk;
        }
        size
    }
}

/// Wire size of one key/value pair in an authentication message.
pub fn key_value_wire_size(key: &str, value: &str, flags: u32) -> usize {
    let mut size = ub_wire_size(key.len() as u64) + bytes_with_length_wire_size(key.len());
    size += ub_wire_size(value.len() as u64);
    if !value.is_empty() {
        size += bytes_with_length_wire_size(value.len());
    }
    size + ub_wire_size(flags as u64)
}

fn put_uvar(buf: &mut Vec<u8>, val: u64) {
    let (len, bytes) = uvar_bytes(val);
    buf.push(len as u8);
    buf.extend_from_slice(&bytes[8 - len..]);
}

/// Extension trait for writing TNS protocol data into a `Vec<u8>`.
pub trait WriteExt {
    /// Write a single byte.
    fn write_u8(&mut self, val: u8);

    /// Write a big-endian u16.
    fn write_u16_be(&mut self, val: u16);

    /// Write a little-endian u16.
    fn write_u16_le(&mut self, val: u16);

    /// Write a big-endian u32.
    fn write_u32_be(&mut self, val: u32);

    /// Write raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Write zeros.
    fn write_zeros(&mut self, count: usize);

    /// Write a UB2 value.
    fn write_ub2(&mut self, val: u16);

    /// Write a UB4 value.
    fn write_ub4(&mut self, val: u32);

    /// Write a UB8 value.
    fn write_ub8(&mut self, val: u64);

    /// Write bytes with a length prefix, chunked when long.
    fn write_bytes_with_length(&mut self, bytes: &[u8]);

    /// Write a string with a length prefix.
    fn write_str_with_length(&mut self, s: &str);

    /// Write one key/value pair of an authentication message.
    fn write_key_value(&mut self, key: &str, value: &str, flags: u32);
}

impl WriteExt for Vec<u8> {
    #[inline]
    fn write_u8(&mut self, val: u8) {
        self.push(val);
    }

    #[inline]
    fn write_u16_be(&mut self, val: u16) {
        self.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    fn write_u16_le(&mut self, val: u16) {
        self.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    fn write_u32_be(&mut self, val: u32) {
        self.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    #[inline]
    fn write_zeros(&mut self, count: usize) {
        self.resize(self.len() + count, 0);
    }

    #[inline]
    fn write_ub2(&mut self, val: u16) {
        put_uvar(self, val as u64);
    }

    #[inline]
    fn write_ub4(&mut self, val: u32) {
        put_uvar(self, val as u64);
    }

    #[inline]
    fn write_ub8(&mut self, val: u64) {
        put_uvar(self, val);
    }

    fn write_bytes_with_length(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        if len == 0 {
            self.push(0);
        } else if len < TNS_LONG_LENGTH_INDICATOR as usize {
            self.push(len as u8);
            self.extend_from_slice(bytes);
        } else {
            self.push(TNS_LONG_LENGTH_INDICATOR);
            for chunk in bytes.chunks(TNS_CHUNK_MAX) {
                put_uvar(self, chunk.len() as u64);
                self.extend_from_slice(chunk);
            }
            put_uvar(self, 0);
        }
    }

    #[inline]
    fn write_str_with_length(&mut self, s: &str) {
        self.write_bytes_with_length(s.as_bytes());
    }

    fn write_key_value(&mut self, key: &str, value: &str, flags: u32) {
        self.write_ub4(key.len() as u32);
        self.write_bytes_with_length(key.as_bytes());
        self.write_ub4(value.len() as u32);
        if !value.is_empty() {
            self.write_bytes_with_length(value.as_bytes());
        }
        self.write_ub4(flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ub_wire_size_matches_writer() {
        for val in [
            0u64,
            1,
            255,
            256,
            0x8061,
            65535,
            65536,
            0xFFFFFF,
            0x1000000,
            u32::MAX as u64,
            u64::MAX,
        ] {
            let mut buf = Vec::new();
            buf.write_ub8(val);
            assert_eq!(buf.len(), ub_wire_size(val), "size mismatch for {}", val);
        }
    }

    #[test]
    fn test_ub_writers_share_one_layout() {
        // The same value through UB2, UB4 and UB8 yields the same bytes
        let mut b2 = Vec::new();
        let mut b4 = Vec::new();
        let mut b8 = Vec::new();
        b2.write_ub2(0x1234);
        b4.write_ub4(0x1234);
        b8.write_ub8(0x1234);
        assert_eq!(b2, vec![2, 0x12, 0x34]);
        assert_eq!(b2, b4);
        assert_eq!(b2, b8);
    }

    #[test]
    fn test_bytes_with_length_wire_size_exact() {
        // The chunked form's headers vary with chunk length; the size
        // helper must agree with the writer everywhere, including the
        // uneven final chunk
        for len in [0usize, 1, 100, 252, 253, 254, 1000, TNS_CHUNK_MAX, 70000, 140000] {
            let data = vec![0xA5u8; len];
            let mut buf = Vec::new();
            buf.write_bytes_with_length(&data);
            assert_eq!(
                buf.len(),
                bytes_with_length_wire_size(len),
                "size mismatch for len={}",
                len
            );
        }
    }

    #[test]
    fn test_chunked_layout() {
        let data = vec![0x11u8; 300];
        let mut buf = Vec::new();
        buf.write_bytes_with_length(&data);
        // Indicator, ub4(300) = 3 bytes, data, zero terminator
        assert_eq!(buf[0], TNS_LONG_LENGTH_INDICATOR);
        assert_eq!(&buf[1..4], &[2, 0x01, 0x2C]);
        assert_eq!(buf.len(), 1 + 3 + 300 + 1);
        assert_eq!(buf[buf.len() - 1], 0);
    }

    #[test]
    fn test_write_key_value_matches_size() {
        for (key, value, flags) in [
            ("AUTH_TERMINAL", "unknown", 0u32),
            ("AUTH_SESSKEY", "", 1),
            ("AUTH_ALTER_SESSION", "ALTER SESSION SET TIME_ZONE='+00:00'\0", 1),
        ] {
            let mut buf = Vec::new();
            buf.write_key_value(key, value, flags);
            assert_eq!(
                buf.len(),
                key_value_wire_size(key, value, flags),
                "size mismatch for {}",
                key
            );
        }
    }
}
