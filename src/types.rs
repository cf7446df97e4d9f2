//! Core types for getwork mining
//!
//! Work templates as received from the server, and the fixed-size values
//! the search operates on: targets, digests and nonces.

use crate::encoding::{hex_decode_exact, hex_encode};
use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Work template handed out by the mining server
///
/// Only `data` and `target` are kept. Any extra keys a server includes in
/// its getwork result (`midstate`, `hash1`, ...) are ignored on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTemplate {
    /// Hex-encoded header, 160 characters
    pub data: String,
    /// Hex-encoded target, 64 characters, least significant byte first
    pub target: String,
}

impl WorkTemplate {
    /// Create a new work template
    pub fn new(data: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            target: target.into(),
        }
    }
}

/// Mining target: a 256-bit unsigned magnitude stored most significant byte first
///
/// The derived ordering compares the byte arrays lexicographically, which is
/// exactly unsigned big-number comparison for big-endian storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target([u8; 32]);

impl Target {
    /// Size of a target in bytes
    pub const SIZE: usize = 32;

    /// Create a target from big-endian bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a target from a big-endian byte slice
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::format(format!(
                "Invalid target length: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Big-endian bytes of the target
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Maximum possible target (easiest difficulty)
    pub fn max() -> Self {
        Self([0xFF; 32])
    }

    /// Minimum possible target, which no digest can fall below
    pub fn min() -> Self {
        Self([0; 32])
    }

    /// Number of leading zero bits, a rough difficulty indicator for logs
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0;
        for byte in self.0 {
            if byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }

    /// Convert to big-endian hex
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl FromStr for Target {
    type Err = Error;

    /// Parse a big-endian hex target
    fn from_str(s: &str) -> Result<Self> {
        Self::from_be_slice(&hex_decode_exact(s, Self::SIZE)?)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Raw 32-byte output of the proof-of-work hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap raw hash output
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash output bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest reversed into the big-endian orientation of [`Target`]
    pub fn normalized(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// Big-endian hex of the normalized digest, as block explorers show it
    pub fn to_hex(&self) -> String {
        hex_encode(&self.normalized())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Proof-of-work nonce: the last four header bytes, in header byte order
///
/// The bytes are treated as a big-endian counter when searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Nonce([u8; 4]);

impl Nonce {
    /// Size of the nonce field in bytes
    pub const SIZE: usize = 4;

    /// Create a nonce from header-order bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Header-order bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Counter value of the nonce
    pub fn value(&self) -> u32 {
        BigEndian::read_u32(&self.0)
    }

    /// Increment as a big-endian counter
    ///
    /// Starting from the least significant (last) byte, a byte that wraps
    /// from 0xFF to 0x00 carries into the byte on its left. A carry out of
    /// the first byte is dropped, so the nonce space wraps around.
    pub fn increment(&mut self) {
        let next = self.value().wrapping_add(1);
        BigEndian::write_u32(&mut self.0, next);
    }

    /// Incremented copy of this nonce
    pub fn incremented(mut self) -> Self {
        self.increment();
        self
    }

    /// Bytes as they appear in the getwork hex, one reversed 32-bit word
    pub fn to_wire(&self) -> [u8; 4] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl From<u32> for Nonce {
    fn from(value: u32) -> Self {
        let mut bytes = [0u8; Self::SIZE];
        BigEndian::write_u32(&mut bytes, value);
        Self(bytes)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_encode(&self.0))
    }
}
