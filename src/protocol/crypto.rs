//! Cryptographic primitives for the authentication handshake.

use crate::error::{Error, Result};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;
use sha2::Sha512;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;

/// Encrypt data using AES-CBC with a zero IV, as the O5LOGON exchange
/// requires. The plaintext is always padded out to a block boundary
/// (length padding, or zeros when requested).
pub fn encrypt_cbc(key: &[u8], plaintext: &[u8], use_zero_padding: bool) -> Result<Vec<u8>> {
    let iv = [0u8; 16];
    let block_size = 16;

    let mut padded = plaintext.to_vec();
    let padding_needed = block_size - (padded.len() % block_size);
    if use_zero_padding {
        padded.extend(std::iter::repeat(0u8).take(padding_needed));
    } else {
        padded.extend(std::iter::repeat(padding_needed as u8).take(padding_needed));
    }

    let len = padded.len();
    match key.len() {
        32 => {
            let encryptor = Aes256CbcEnc::new(key.into(), &iv.into());
            encryptor
                .encrypt_padded_mut::<NoPadding>(&mut padded, len)
                .map_err(|_| Error::protocol("AES encryption failed"))?;
            Ok(padded)
        }
        24 => {
            let encryptor = Aes192CbcEnc::new(key.into(), &iv.into());
            encryptor
                .encrypt_padded_mut::<NoPadding>(&mut padded, len)
                .map_err(|_| Error::protocol("AES encryption failed"))?;
            Ok(padded)
        }
        other => Err(Error::protocol(format!("Invalid AES key length: {}", other))),
    }
}

/// Decrypt data using AES-CBC with a zero IV.
pub fn decrypt_cbc(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let iv = [0u8; 16];
    let mut buf = ciphertext.to_vec();

    match key.len() {
        32 => {
            let decryptor = Aes256CbcDec::new(key.into(), &iv.into());
            let plain = decryptor
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::protocol("AES decryption failed"))?;
            Ok(plain.to_vec())
        }
        24 => {
            let decryptor = Aes192CbcDec::new(key.into(), &iv.into());
            let plain = decryptor
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::protocol("AES decryption failed"))?;
            Ok(plain.to_vec())
        }
        other => Err(Error::protocol(format!("Invalid AES key length: {}", other))),
    }
}

/// Derive a key using PBKDF2 with HMAC-SHA512.
pub fn derive_key_pbkdf2(
    password: &[u8],
    salt: &[u8],
    length: usize,
    iterations: u32,
) -> Result<Vec<u8>> {
    let mut key = vec![0u8; length];
    pbkdf2::<Hmac<Sha512>>(password, salt, iterations, &mut key)
        .map_err(|_| Error::protocol("PBKDF2 derivation failed"))?;
    Ok(key)
}

/// Compute a SHA-1 hash.
pub fn sha1_hash(data: &[u8]) -> [u8; 20] {
    use sha1::Digest;
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute a SHA-512 hash.
pub fn sha512_hash(data: &[u8]) -> [u8; 64] {
    use sha2::Digest;
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Convert bytes to an uppercase hex string.
pub fn bytes_to_hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Convert a hex string to bytes.
pub fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
