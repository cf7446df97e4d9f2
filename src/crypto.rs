//! Proof-of-work hashing
//!
//! Headers are hashed with scrypt using the header itself as both password
//! and salt, N = 1024, r = 1, p = 1 and a 32-byte output.

use crate::header::BlockHeader;
use crate::types::{Digest, Target};
use crate::{Error, Result};
use scrypt::Params;
use std::cmp::Ordering;

/// log2 of the scrypt cost factor N = 1024
pub const SCRYPT_LOG_N: u8 = 10;
/// scrypt block-mixing factor
pub const SCRYPT_R: u32 = 1;
/// scrypt parallelization factor
pub const SCRYPT_P: u32 = 1;
/// Digest length in bytes
pub const DIGEST_LEN: usize = 32;

/// scrypt hasher with the fixed mining parameters
#[derive(Clone)]
pub struct ScryptHasher {
    params: Params,
}

impl ScryptHasher {
    /// Create a new hasher
    pub fn new() -> Result<Self> {
        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, DIGEST_LEN)
            .map_err(|e| Error::crypto(format!("Invalid scrypt parameters: {}", e)))?;
        Ok(Self { params })
    }

    /// Hash a header
    pub fn hash(&self, header: &BlockHeader) -> Result<Digest> {
        let bytes = header.as_bytes();
        let mut output = [0u8; DIGEST_LEN];
        scrypt::scrypt(bytes, bytes, &self.params, &mut output)
            .map_err(|e| Error::crypto(format!("scrypt failed: {}", e)))?;
        Ok(Digest::new(output))
    }

    /// Hash a header and report whether it meets the target
    pub fn hash_and_check(&self, header: &BlockHeader, target: &Target) -> Result<(bool, Digest)> {
        let digest = self.hash(header)?;
        let meets_target = compare_to_target(&digest, target) == Ordering::Less;
        Ok((meets_target, digest))
    }
}

/// Compare a digest with a target as unsigned 256-bit numbers
///
/// The digest is normalized to big-endian first; the target already is.
pub fn compare_to_target(digest: &Digest, target: &Target) -> Ordering {
    digest.normalized().cmp(target.as_bytes())
}
