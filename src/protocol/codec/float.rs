//! BINARY_FLOAT and BINARY_DOUBLE codec.
//!
//! Oracle stores IEEE-754 values sign-magnitude transformed so that byte
//! comparison matches numeric ordering: positive values have the sign bit
//! set, negative values have every byte inverted.

use crate::error::{Error, Result};

/// Decode a 4-byte BINARY_FLOAT value.
pub fn decode_binary_float(data: &[u8]) -> Result<f32> {
    if data.len() != 4 {
        return Err(Error::protocol(format!(
            "BINARY_FLOAT value must be exactly 4 bytes, got {}",
            data.len()
        )));
    }
    let mut bytes = [data[0], data[1], data[2], data[3]];
    untransform(&mut bytes);
    Ok(f32::from_be_bytes(bytes))
}

/// Decode an 8-byte BINARY_DOUBLE value.
pub fn decode_binary_double(data: &[u8]) -> Result<f64> {
    if data.len() != 8 {
        return Err(Error::protocol(format!(
            "BINARY_DOUBLE value must be exactly 8 bytes, got {}",
            data.len()
        )));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(data);
    untransform(&mut bytes);
    Ok(f64::from_be_bytes(bytes))
}

/// Encode a BINARY_FLOAT value.
pub fn encode_binary_float(val: f32) -> [u8; 4] {
    let mut bytes = val.to_be_bytes();
    transform(&mut bytes);
    bytes
}

/// Encode a BINARY_DOUBLE value.
pub fn encode_binary_double(val: f64) -> [u8; 8] {
    let mut bytes = val.to_be_bytes();
    transform(&mut bytes);
    bytes
}

fn untransform(bytes: &mut [u8]) {
    if bytes[0] & 0x80 != 0 {
        bytes[0] &= 0x7f;
    } else {
        for b in bytes.iter_mut() {
            *b = !*b;
        }
    }
}

fn transform(bytes: &mut [u8]) {
    if bytes[0] & 0x80 == 0 {
        bytes[0] |= 0x80;
    } else {
        for b in bytes.iter_mut() {
            *b = !*b;
        }
    }
}
