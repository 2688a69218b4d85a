//! In-memory guardian signer.

use crate::traits::{Signer, SignerError};
use async_trait::async_trait;
use vigil_types::{Address, Hash, KeyPair, Signature};

/// A [`Signer`] backed by a guardian keypair held in process memory.
pub struct LocalSigner {
    keypair: KeyPair,
}

impl LocalSigner {
    /// Create a signer over an in-memory keypair.
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn address(&self) -> Result<Address, SignerError> {
        Ok(self.keypair.address())
    }

    async fn sign(&self, digest: &Hash) -> Result<Signature, SignerError> {
        Ok(self.keypair.sign(digest))
    }
}
