//! Recoverable secp256k1 signatures and keys.
//!
//! Guardians sign 32-byte digests with secp256k1. Signatures carry a
//! recovery byte so verifiers can recover the signing public key without a
//! key registry; identity is established by comparing the recovered key's
//! address against the claimed one.

use crate::address::Address;
use crate::hash::Hash;
use libsecp256k1::{Message, RecoveryId, SecretKey};
use std::fmt;
use thiserror::Error;

/// Size of a serialized [`Signature`] in bytes: r (32) ‖ s (32) ‖ v (1).
pub const SIGNATURE_SIZE_BYTES: usize = 65;

/// Errors raised by signature and key operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature bytes are not a well-formed r‖s‖v encoding.
    #[error("malformed signature encoding")]
    InvalidSignature,
    /// Recovery byte is outside the valid range.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    /// No public key could be recovered from the signature.
    #[error("public key recovery failed")]
    RecoveryFailed,
    /// Secret key bytes are not a valid curve scalar.
    #[error("invalid secret key")]
    InvalidSecretKey,
}

/// A secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(libsecp256k1::PublicKey);

impl PublicKey {
    /// Serialize to the 65-byte uncompressed form (0x04 ‖ x ‖ y).
    pub fn serialize_uncompressed(&self) -> [u8; 65] {
        self.0.serialize()
    }

    /// Derive the guardian address of this key.
    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

/// A 65-byte recoverable ECDSA signature over a 32-byte digest.
///
/// Layout is r ‖ s ‖ v with v ∈ {0, 1}. The fixed-size representation makes
/// a wrong-length stored signature unrepresentable; raw wire bytes are
/// checked at parse time.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE_BYTES]);

impl Signature {
    /// Parse a signature from raw bytes. The slice must be exactly 65 bytes;
    /// the r/s components are validated when the signature is recovered.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; SIGNATURE_SIZE_BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(raw))
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE_BYTES] {
        &self.0
    }

    /// Copy out the underlying bytes.
    pub fn to_bytes(self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0
    }

    /// Recover the public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &Hash) -> Result<PublicKey, CryptoError> {
        let message = Message::parse(digest.as_bytes());
        let signature = libsecp256k1::Signature::parse_standard_slice(&self.0[..64])
            .map_err(|_| CryptoError::InvalidSignature)?;
        let recovery_id =
            RecoveryId::parse(self.0[64]).map_err(|_| CryptoError::InvalidRecoveryId(self.0[64]))?;
        let public = libsecp256k1::recover(&message, &signature, &recovery_id)
            .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(PublicKey(public))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.0))
    }
}

/// A secp256k1 signing keypair.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Derive a keypair from 32 seed bytes. The seed must be a valid,
    /// non-zero curve scalar.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::parse(seed).map_err(|_| CryptoError::InvalidSecretKey)?;
        let public = PublicKey(libsecp256k1::PublicKey::from_secret_key(&secret));
        Ok(Self { secret, public })
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// The guardian address of this keypair.
    pub fn address(&self) -> Address {
        self.public.address()
    }

    /// Produce a recoverable signature over a digest.
    pub fn sign(&self, digest: &Hash) -> Signature {
        let message = Message::parse(digest.as_bytes());
        let (signature, recovery_id) = libsecp256k1::sign(&message, &self.secret);
        let mut bytes = [0u8; SIGNATURE_SIZE_BYTES];
        bytes[..64].copy_from_slice(&signature.serialize());
        bytes[64] = recovery_id.serialize();
        Signature(bytes)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.address())
    }
}
