//! Digest primitives.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of a [`Hash`] in bytes.
pub const HASH_SIZE_BYTES: usize = 32;

/// Compute the keccak256 hash of arbitrary bytes.
pub fn keccak256(bytes: &[u8]) -> [u8; HASH_SIZE_BYTES] {
    use sha3::{Digest, Keccak256};
    Keccak256::digest(bytes).into()
}

/// Errors raised when constructing a [`Hash`] from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Input slice had the wrong length.
    #[error("expected {HASH_SIZE_BYTES} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte keccak256 digest.
///
/// Guardians sign the digest of an observed message, never the message
/// itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE_BYTES]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE_BYTES]);

    /// Wrap an existing digest.
    pub const fn new(bytes: [u8; HASH_SIZE_BYTES]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary content with keccak256.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(keccak256(data))
    }

    /// Interpret a slice as an existing digest. The slice must be exactly
    /// 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let raw: [u8; HASH_SIZE_BYTES] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        &self.0
    }

    /// Copy out the underlying bytes.
    pub fn to_bytes(self) -> [u8; HASH_SIZE_BYTES] {
        self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl From<[u8; HASH_SIZE_BYTES]> for Hash {
    fn from(bytes: [u8; HASH_SIZE_BYTES]) -> Self {
        Self(bytes)
    }
}
