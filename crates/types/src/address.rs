//! Guardian addresses.

use crate::crypto::PublicKey;
use crate::hash::keccak256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of an [`Address`] in bytes.
pub const ADDRESS_SIZE_BYTES: usize = 20;

/// Errors raised when constructing an [`Address`] from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Input slice had the wrong length.
    #[error("expected {ADDRESS_SIZE_BYTES} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte guardian address.
///
/// Derived from a secp256k1 public key as the last 20 bytes of the keccak256
/// hash of the raw (uncompressed, prefix-stripped) key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE_BYTES]);

impl Address {
    /// Wrap existing address bytes.
    pub const fn new(bytes: [u8; ADDRESS_SIZE_BYTES]) -> Self {
        Self(bytes)
    }

    /// Interpret a slice as an address. The slice must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let raw: [u8; ADDRESS_SIZE_BYTES] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// Derive the address of a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let serialized = public_key.serialize_uncompressed();
        let hash = keccak256(&serialized[1..]);
        let mut bytes = [0u8; ADDRESS_SIZE_BYTES];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE_BYTES] {
        &self.0
    }

    /// Copy out the underlying bytes.
    pub fn to_bytes(self) -> [u8; ADDRESS_SIZE_BYTES] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
