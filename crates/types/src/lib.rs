//! Core types for the Vigil guardian network.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Primitives**: [`Hash`] digests, keccak hashing
//! - **Crypto**: recoverable secp256k1 keys and signatures
//! - **Identity**: guardian [`Address`]es and the [`GuardianSet`] snapshot
//! - **Capabilities**: the [`Observation`] trait implemented by any message
//!   the network attests to
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod address;
mod crypto;
mod guardian_set;
mod hash;
mod observation;

pub use address::{Address, AddressError, ADDRESS_SIZE_BYTES};
pub use crypto::{CryptoError, KeyPair, PublicKey, Signature, SIGNATURE_SIZE_BYTES};
pub use guardian_set::{quorum_count, GuardianSet};
pub use hash::{keccak256, Hash, HashError, HASH_SIZE_BYTES};
pub use observation::Observation;

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a deterministic test keypair from a seed byte.
    ///
    /// Seeds produce distinct, valid secret keys for any value, including 0.
    pub fn test_keypair(seed: u8) -> KeyPair {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        bytes[31] = seed;
        KeyPair::from_seed(&bytes).expect("test seed is a valid secret key")
    }

    /// Create `n` test guardians and the guardian set listing their addresses
    /// in seed order.
    pub fn test_guardian_set(n: usize) -> (Vec<KeyPair>, GuardianSet) {
        let keypairs: Vec<KeyPair> = (0..n).map(|i| test_keypair(i as u8)).collect();
        let keys = keypairs.iter().map(|kp| kp.address()).collect();
        (keypairs, GuardianSet::new(keys, 0))
    }
}
