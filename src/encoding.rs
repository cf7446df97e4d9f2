//! Hex and byte-order helpers
//!
//! Getwork templates arrive as hex text whose header fields are serialized
//! as sequences of little-endian 32-bit words. These helpers convert between
//! that text and raw bytes, and flip byte order either over a whole buffer
//! or within each 4-byte word.

use crate::{Error, Result};

/// Decode a hex string into bytes
///
/// Upper and lower case digits are accepted. Odd lengths and non-hex
/// characters are rejected with [`Error::Format`].
pub fn hex_decode(hex_str: &str) -> Result<Vec<u8>> {
    if hex_str.len() % 2 != 0 {
        return Err(Error::format(format!(
            "Odd hex length: {} characters",
            hex_str.len()
        )));
    }

    hex::decode(hex_str).map_err(|e| Error::format(format!("Invalid hex: {}", e)))
}

/// Decode a hex string that must describe exactly `expected_len` bytes
pub fn hex_decode_exact(hex_str: &str, expected_len: usize) -> Result<Vec<u8>> {
    if hex_str.len() != expected_len * 2 {
        return Err(Error::format(format!(
            "Expected {} hex characters, got {}",
            expected_len * 2,
            hex_str.len()
        )));
    }
    hex_decode(hex_str)
}

/// Encode bytes as lowercase hex without separators
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Return a copy of `bytes` with the byte order fully reversed
pub fn reverse_all(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Return a copy of `bytes` with each 4-byte word reversed independently
///
/// Word order is preserved. Fails with [`Error::Alignment`] when the length
/// is not a multiple of 4.
pub fn reverse_words(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::alignment(bytes.len()));
    }

    let mut out = Vec::with_capacity(bytes.len());
    for word in bytes.chunks_exact(4) {
        out.extend(word.iter().rev());
    }
    Ok(out)
}
