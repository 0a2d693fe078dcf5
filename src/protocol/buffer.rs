//! Buffer utilities for reading and writing TNS protocol data.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use bytes::{BufMut, Bytes, BytesMut};

/// Split a value into its UBx wire form: the number of significant bytes
/// and the full big-endian byte array to slice them from. Zero has no
/// payload bytes, only the zero length prefix.
///
/// This is the one place the variable-length integer layout is defined;
/// every writer and every wire-size computation goes through it.
pub(crate) fn uvar_bytes(val: u64) -> (usize, [u8; 8]) {
    let significant = (64 - val.leading_zeros() as usize).div_ceil(8);
    (significant, val.to_be_bytes())
}

/// Wire size of a UBx value: the length prefix plus its significant bytes.
pub(crate) fn uvar_wire_size(val: u64) -> usize {
    1 + uvar_bytes(val).0
}

/// A buffer for reading TNS protocol data.
pub struct ReadBuffer {
    data: Bytes,
    pos: usize,
}

impl ReadBuffer {
    /// Create a new read buffer from bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the current position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the remaining bytes in the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if the buffer has at least `n` bytes remaining.
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Get a slice of the remaining data.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[track_caller]
    fn require(&self, n: usize) -> Result<()> {
        if !self.has_remaining(n) {
            return Err(Error::BufferTooSmall {
                needed: n,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        Ok(())
    }

    /// Skip `n` bytes.
    #[track_caller]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a single byte.
    #[track_caller]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let val = self.data[self.pos];
        self.pos += 1;
        Ok(val)
    }

    /// Read a big-endian u16.
    #[track_caller]
    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.require(2)?;
        let val = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(val)
    }

    /// Read a little-endian u16.
    #[track_caller]
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.require(2)?;
        let val = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(val)
    }

    /// Read a big-endian u32.
    #[track_caller]
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.require(4)?;
        let val = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(val)
    }

    /// Read a big-endian u64.
    #[track_caller]
    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.require(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read raw bytes.
    #[track_caller]
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.require(n)?;
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    /// Read a UB1 value.
    pub fn read_ub1(&mut self) -> Result<u8> {
        self.read_u8()
    }

    /// Read a variable-length u16 (Oracle's UB2 format).
    pub fn read_ub2(&mut self) -> Result<u16> {
        Ok(self.read_uvar(2)? as u16)
    }

    /// Read a variable-length u32 (Oracle's UB4 format).
    pub fn read_ub4(&mut self) -> Result<u32> {
        Ok(self.read_uvar(4)? as u32)
    }

    /// Read a variable-length u64 (Oracle's UB8 format).
    pub fn read_ub8(&mut self) -> Result<u64> {
        self.read_uvar(8)
    }

    /// Read a variable-length signed i16 (Oracle's SB2 format).
    /// The high bit of the length byte flags a negative value.
    pub fn read_sb2(&mut self) -> Result<i16> {
        self.read_svar(2).map(|v| v as i16)
    }

    /// Read a variable-length signed i32 (Oracle's SB4 format).
    pub fn read_sb4(&mut self) -> Result<i32> {
        self.read_svar(4).map(|v| v as i32)
    }

    /// Read a variable-length signed i64 (Oracle's SB8 format).
    pub fn read_sb8(&mut self) -> Result<i64> {
        self.read_svar(8)
    }

    /// Core variable-length unsigned read: a length prefix byte followed by
    /// that many big-endian bytes. Length 0 decodes to 0.
    fn read_uvar(&mut self, max_len: usize) -> Result<u64> {
        let length = self.read_u8()?;
        if length & 0x80 != 0 || length as usize > max_len {
            return Err(Error::protocol(format!(
                "Invalid UB{} length: {}",
                max_len, length
            )));
        }
        let mut val: u64 = 0;
        for _ in 0..length {
            val = (val << 8) | (self.read_u8()? as u64);
        }
        Ok(val)
    }

    fn read_svar(&mut self, max_len: usize) -> Result<i64> {
        let length = self.read_u8()?;
        let negative = length & 0x80 != 0;
        let length = (length & 0x7f) as usize;
        if length > max_len {
            return Err(Error::protocol(format!(
                "Invalid SB{} length: {}",
                max_len, length
            )));
        }
        let mut val: i64 = 0;
        for _ in 0..length {
            val = (val << 8) | (self.read_u8()? as i64);
        }
        Ok(if negative { -val } else { val })
    }

    /// Skip a variable-length u32 (Oracle's UB4 format).
    pub fn skip_ub4(&mut self) -> Result<()> {
        let length = self.read_u8()?;
        if length & 0x7f > 0 {
            self.skip((length & 0x7f) as usize)?;
        }
        Ok(())
    }

    /// Read bytes with a length prefix.
    ///
    /// A `TNS_NULL_LENGTH_INDICATOR` prefix is an explicit null, distinct
    /// from a zero-length value. A `TNS_LONG_LENGTH_INDICATOR` prefix
    /// introduces UB4-length chunks terminated by a zero chunk length.
    pub fn read_bytes_with_length(&mut self) -> Result<Option<Bytes>> {
        let length = self.read_u8()?;
        if length == TNS_NULL_LENGTH_INDICATOR {
            return Ok(None);
        }
        if length == TNS_LONG_LENGTH_INDICATOR {
            let mut result = BytesMut::new();
            loop {
                let chunk_len = self.read_ub4()?;
                if chunk_len == 0 {
                    break;
                }
                let chunk = self.read_bytes(chunk_len as usize)?;
                result.extend_from_slice(&chunk);
            }
            return Ok(Some(result.freeze()));
        }
        let data = self.read_bytes(length as usize)?;
        Ok(Some(data))
    }

    /// Read a string with a length prefix.
    /// Uses lossy UTF-8 conversion to handle binary data gracefully.
    pub fn read_str_with_length(&mut self) -> Result<Option<String>> {
        match self.read_bytes_with_length()? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
            None => Ok(None),
        }
    }

    /// Skip length-prefixed bytes that may or may not be chunked.
    pub fn skip_raw_bytes_chunked(&mut self) -> Result<()> {
        let length = self.read_u8()?;
        if length != TNS_LONG_LENGTH_INDICATOR {
            self.skip(length as usize)?;
        } else {
            loop {
                let chunk_len = self.read_ub4()?;
                if chunk_len == 0 {
                    break;
                }
                self.skip(chunk_len as usize)?;
            }
        }
        Ok(())
    }

    /// Read a LOB value with its metadata and any prefetched data.
    ///
    /// Wire format:
    /// ```text
    /// prefetch_length: ub4     (0 means NULL LOB)
    /// size: ub8                (absent for BFILE)
    /// chunk_size: ub4          (absent for BFILE)
    /// prefetch_data: bytes     (present when prefetch was requested)
    /// locator: bytes           (length-prefixed handle)
    /// ```
    pub fn read_lob_with_length(
        &mut self,
        is_bfile: bool,
        is_prefetched: bool,
        is_clob: bool,
    ) -> Result<Option<crate::protocol::types::LobValue>> {
        use crate::protocol::types::{LobLocator, LobValue};
        let num_bytes = self.read_ub4()?;
        if num_bytes == 0 {
            return Ok(None);
        }
        let (size, chunk_size) = if is_bfile {
            (0u64, 0u32)
        } else {
            let size = self.read_ub8()?;
            let chunk_size = self.read_ub4()?;
            (size, chunk_size)
        };
        let prefetch_data = if is_prefetched {
            if is_clob {
                // CLOB prefetch carries a short charset preamble before the data
                self.skip(2)?;
                let _encoding = self.read_u16_be()?;
                self.skip(1)?;
            }
            self.read_bytes_with_length()?
        } else {
            None
        };

        let locator_bytes = self.read_bytes_with_length()?.unwrap_or_default();
        let locator = LobLocator::new(locator_bytes.to_vec(), size, chunk_size, !is_bfile);

        let lob_value = match prefetch_data {
            Some(data) => LobValue::with_data(locator, data.to_vec()),
            None => LobValue::locator_only(locator),
        };
        Ok(Some(lob_value))
    }
}

/// A buffer for writing TNS protocol data.
pub struct WriteBuffer {
    data: BytesMut,
}

impl WriteBuffer {
    /// Create a new write buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    /// Create a new write buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current length of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the buffer contents as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable bytes.
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, val: u8) {
        self.data.put_u8(val);
    }

    /// Write a big-endian u16.
    pub fn write_u16_be(&mut self, val: u16) {
        self.data.put_u16(val);
    }

    /// Write a big-endian u32.
    pub fn write_u32_be(&mut self, val: u32) {
        self.data.put_u32(val);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write a variable-length u16 (Oracle's UB2 format).
    pub fn write_ub2(&mut self, val: u16) {
        self.write_uvar(val as u64);
    }

    /// Write a variable-length u32 (Oracle's UB4 format).
    pub fn write_ub4(&mut self, val: u32) {
        self.write_uvar(val as u64);
    }

    /// Write a variable-length u64 (Oracle's UB8 format).
    pub fn write_ub8(&mut self, val: u64) {
        self.write_uvar(val);
    }

    fn write_uvar(&mut self, val: u64) {
        let (len, bytes) = uvar_bytes(val);
        self.write_u8(len as u8);
        self.data.extend_from_slice(&bytes[8 - len..]);
    }

    /// Write bytes with a length prefix, chunking long values.
    pub fn write_bytes_with_length(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        if len == 0 {
            self.write_u8(0);
        } else if len < TNS_LONG_LENGTH_INDICATOR as usize {
            self.write_u8(len as u8);
            self.write_bytes(bytes);
        } else {
            self.write_u8(TNS_LONG_LENGTH_INDICATOR);
            let mut offset = 0;
            while offset < len {
                let chunk_len = std::cmp::min(len - offset, TNS_CHUNK_MAX);
                self.write_ub4(chunk_len as u32);
                self.write_bytes(&bytes[offset..offset + chunk_len]);
                offset += chunk_len;
            }
            self.write_ub4(0);
        }
    }

    /// Write a string with a length prefix.
    pub fn write_str_with_length(&mut self, s: &str) {
        self.write_bytes_with_length(s.as_bytes());
    }

    /// Write padding zeros.
    pub fn write_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_ub4(val: u32) -> Vec<u8> {
        let mut buf = WriteBuffer::new();
        buf.write_ub4(val);
        buf.as_bytes().to_vec()
    }

    #[test]
    fn test_uvar_wire_size_matches_writer() {
        for val in [0u64, 1, 255, 256, 65535, 65536, 0xFFFFFF, 0x1000000, u64::MAX] {
            let mut buf = WriteBuffer::new();
            buf.write_ub8(val);
            assert_eq!(buf.len(), uvar_wire_size(val), "size mismatch for {}", val);
        }
    }

    #[test]
    fn test_ub_round_trip() {
        for val in [0u32, 1, 127, 255, 256, 0x8061, 65535, 65536, u32::MAX] {
            let encoded = encode_ub4(val);
            let mut rbuf = ReadBuffer::new(Bytes::from(encoded));
            assert_eq!(rbuf.read_ub4().unwrap(), val, "round trip of {}", val);
        }
    }

    #[test]
    fn test_ub2_big_endian() {
        let mut buf = WriteBuffer::new();
        buf.write_ub2(0x1234);
        assert_eq!(buf.as_bytes(), &[2, 0x12, 0x34]);
    }

    #[test]
    fn test_sb_reads() {
        // Positive SB2: length 1, value 5
        let mut buf = ReadBuffer::new(Bytes::from_static(&[1, 5]));
        assert_eq!(buf.read_sb2().unwrap(), 5);

        // Negative SB2: high bit of length set
        let mut buf = ReadBuffer::new(Bytes::from_static(&[0x81, 5]));
        assert_eq!(buf.read_sb2().unwrap(), -5);

        // Zero length decodes to 0
        let mut buf = ReadBuffer::new(Bytes::from_static(&[0]));
        assert_eq!(buf.read_sb4().unwrap(), 0);
    }

    #[test]
    fn test_null_vs_empty_length() {
        // NULL indicator yields None
        let mut buf = ReadBuffer::new(Bytes::from_static(&[TNS_NULL_LENGTH_INDICATOR]));
        assert_eq!(buf.read_bytes_with_length().unwrap(), None);
    }

    #[test]
    fn test_chunked_read() {
        let mut wbuf = WriteBuffer::new();
        let payload = vec![0xAB; 70000];
        wbuf.write_bytes_with_length(&payload);
        let encoded = wbuf.freeze();
        assert_eq!(encoded[0], TNS_LONG_LENGTH_INDICATOR);

        let mut rbuf = ReadBuffer::new(encoded);
        let decoded = rbuf.read_bytes_with_length().unwrap().unwrap();
        assert_eq!(decoded.len(), payload.len());
        assert_eq!(&decoded[..], &payload[..]);
        assert_eq!(rbuf.remaining(), 0);
    }

    #[test]
    fn test_short_read_reports_need() {
        let mut buf = ReadBuffer::new(Bytes::from_static(&[4, 1, 2]));
        // Declares 4 bytes but only 2 available
        match buf.read_bytes_with_length() {
            Err(Error::BufferTooSmall {
                needed, available, ..
            }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected BufferTooSmall, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_read_lob_with_length_null() {
        let mut buf = ReadBuffer::new(Bytes::from_static(&[0]));
        let result = buf.read_lob_with_length(false, false, false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_lob_with_length_locator_only() {
        let mut data = WriteBuffer::new();
        data.write_ub4(1); // present
        data.write_ub8(1_000_000); // size
        data.write_ub4(8192); // chunk size
        data.write_bytes_with_length(&[10, 20, 30, 40]); // locator

        let mut buf = ReadBuffer::new(data.freeze());
        let lob = buf
            .read_lob_with_length(false, false, false)
            .unwrap()
            .unwrap();
        assert!(!lob.has_data());
        assert_eq!(lob.locator.size, 1_000_000);
        assert_eq!(lob.locator.chunk_size, 8192);
        assert_eq!(lob.locator.locator, vec![10, 20, 30, 40]);
        assert!(lob.locator.has_metadata);
    }

    #[test]
    fn test_read_lob_with_length_bfile() {
        let mut data = WriteBuffer::new();
        data.write_ub4(1); // present
        data.write_bytes_with_length(&[1, 2, 3, 4]); // locator, no size metadata

        let mut buf = ReadBuffer::new(data.freeze());
        let lob = buf
            .read_lob_with_length(true, false, false)
            .unwrap()
            .unwrap();
        assert_eq!(lob.locator.size, 0);
        assert!(!lob.locator.has_metadata);
        assert!(!lob.has_data());
    }
}
