//! Block header assembly
//!
//! The getwork `data` string carries an 80-byte block header in which every
//! field is serialized as a run of little-endian 32-bit words. Hashing needs
//! the header in its native byte order, so each field is decoded and
//! word-reversed on its own before being placed at its fixed offset.
//!
//! The target is a single scalar rather than a structured record and is
//! reversed as a whole.

use crate::encoding::{hex_decode, hex_decode_exact, hex_encode, reverse_all, reverse_words};
use crate::types::{Nonce, Target, WorkTemplate};
use crate::{Error, Result};
use std::fmt;

/// Header fields in serialization order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Version,
    PrevHash,
    MerkleRoot,
    Timestamp,
    Bits,
    Nonce,
}

impl HeaderField {
    /// All fields in the order they appear in the header
    pub const ALL: [HeaderField; 6] = [
        HeaderField::Version,
        HeaderField::PrevHash,
        HeaderField::MerkleRoot,
        HeaderField::Timestamp,
        HeaderField::Bits,
        HeaderField::Nonce,
    ];

    /// Byte offset of the field within the header
    pub const fn offset(self) -> usize {
        match self {
            HeaderField::Version => 0,
            HeaderField::PrevHash => 4,
            HeaderField::MerkleRoot => 36,
            HeaderField::Timestamp => 68,
            HeaderField::Bits => 72,
            HeaderField::Nonce => 76,
        }
    }

    /// Length of the field in bytes
    pub const fn len(self) -> usize {
        match self {
            HeaderField::Version => 4,
            HeaderField::PrevHash => 32,
            HeaderField::MerkleRoot => 32,
            HeaderField::Timestamp => 4,
            HeaderField::Bits => 4,
            HeaderField::Nonce => 4,
        }
    }

    /// Byte range of the field within the header
    pub const fn range(self) -> std::ops::Range<usize> {
        self.offset()..self.offset() + self.len()
    }

    /// Character range of the field within the template hex
    pub const fn hex_range(self) -> std::ops::Range<usize> {
        self.offset() * 2..(self.offset() + self.len()) * 2
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderField::Version => "version",
            HeaderField::PrevHash => "prev-hash",
            HeaderField::MerkleRoot => "merkle-root",
            HeaderField::Timestamp => "timestamp",
            HeaderField::Bits => "bits",
            HeaderField::Nonce => "nonce",
        };
        write!(f, "{}", name)
    }
}

/// An 80-byte block header in hashing byte order
#[derive(Clone, PartialEq, Eq)]
pub struct BlockHeader {
    bytes: [u8; BlockHeader::SIZE],
}

impl BlockHeader {
    /// Header size in bytes
    pub const SIZE: usize = 80;

    /// Length of the template hex that describes a header
    pub const HEX_LEN: usize = Self::SIZE * 2;

    /// Create a header from raw bytes already in hashing order
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self { bytes }
    }

    /// Header bytes
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.bytes
    }

    /// Bytes of a single field
    pub fn field(&self, field: HeaderField) -> &[u8] {
        &self.bytes[field.range()]
    }

    /// Current nonce field
    pub fn nonce(&self) -> Nonce {
        let mut nonce = [0u8; Nonce::SIZE];
        nonce.copy_from_slice(self.field(HeaderField::Nonce));
        Nonce::new(nonce)
    }

    /// Overwrite the nonce field
    pub fn set_nonce(&mut self, nonce: Nonce) {
        self.bytes[HeaderField::Nonce.range()].copy_from_slice(nonce.as_bytes());
    }

    /// Increment the nonce field in place as a big-endian counter
    pub fn increment_nonce(&mut self) {
        self.set_nonce(self.nonce().incremented());
    }

    /// Header bytes as hex
    pub fn to_hex(&self) -> String {
        hex_encode(&self.bytes)
    }
}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHeader")
            .field("hex", &self.to_hex())
            .field("nonce", &self.nonce())
            .finish()
    }
}

/// Converts between getwork templates and binary headers
pub struct HeaderBuilder;

impl HeaderBuilder {
    /// Parse the template's `data` into an 80-byte header
    ///
    /// Every field is hex-decoded and word-reversed independently, then
    /// written at its fixed offset.
    pub fn parse(template: &WorkTemplate) -> Result<BlockHeader> {
        let data = template.data.as_str();
        if data.len() != BlockHeader::HEX_LEN {
            return Err(Error::format(format!(
                "Invalid work data length: expected {} hex characters, got {}",
                BlockHeader::HEX_LEN,
                data.len()
            )));
        }
        if !data.is_ascii() {
            return Err(Error::format("Work data contains non-ASCII characters"));
        }

        let mut bytes = [0u8; BlockHeader::SIZE];
        for field in HeaderField::ALL {
            let raw = hex_decode(&data[field.hex_range()])
                .map_err(|e| Error::format(format!("Invalid {} field: {}", field, e)))?;
            let swapped = reverse_words(&raw)?;
            bytes[field.range()].copy_from_slice(&swapped);
        }

        Ok(BlockHeader::from_bytes(bytes))
    }

    /// Parse the template's `target` into a big-endian [`Target`]
    pub fn parse_target(template: &WorkTemplate) -> Result<Target> {
        let raw = hex_decode_exact(&template.target, Target::SIZE)
            .map_err(|e| Error::format(format!("Invalid target: {}", e)))?;
        Target::from_be_slice(&reverse_all(&raw))
    }

    /// Build the submission hex for a solved nonce
    ///
    /// The original template hex is validated and only its last 8 characters
    /// are replaced, so every other character goes back exactly as it was
    /// received, letter case included.
    pub fn serialize_solution(original_data_hex: &str, nonce: &Nonce) -> Result<String> {
        hex_decode_exact(original_data_hex, BlockHeader::SIZE)?;

        let nonce_range = HeaderField::Nonce.hex_range();
        let mut solution = String::with_capacity(BlockHeader::HEX_LEN);
        solution.push_str(&original_data_hex[..nonce_range.start]);
        solution.push_str(&hex_encode(&nonce.to_wire()));
        solution.push_str(&original_data_hex[nonce_range.end..]);
        Ok(solution)
    }
}
