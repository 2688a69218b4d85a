//! Interfaces to the reactor's external collaborators.
//!
//! The gossip transport, the signing backend, and the transition hook are
//! owned by the caller; the reactor invokes them but does not manage their
//! lifecycles.

use crate::reactor::ReactorHandle;
use crate::state::State;
use async_trait::async_trait;
use thiserror::Error;
use vigil_messages::GossipMessage;
use vigil_types::{Address, Hash, Observation, Signature};

/// Error returned by a gossip sender.
#[derive(Debug, Clone, Error)]
#[error("gossip send failed: {0}")]
pub struct GossipSendError(pub String);

/// Error returned by a signer.
#[derive(Debug, Clone, Error)]
#[error("signer failure: {0}")]
pub struct SignerError(pub String);

/// Publishes messages to the gossip network.
#[async_trait]
pub trait GossipSender: Send + Sync {
    /// Publish one message. Callers bound each invocation with a timeout.
    async fn send(&self, message: GossipMessage) -> Result<(), GossipSendError>;
}

/// Produces guardian signatures over observation digests.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The guardian address of this signer.
    async fn address(&self) -> Result<Address, SignerError>;

    /// Sign a 32-byte digest, returning the recoverable 65-byte signature.
    async fn sign(&self, digest: &Hash) -> Result<Signature, SignerError>;
}

/// Callback invoked after every reactor state transition.
///
/// The hook runs on its own task after the transition has been recorded. It
/// must not assume the state it was handed still holds by the time it reads
/// other fields through the handle.
#[async_trait]
pub trait StateTransitionHook<K: Observation>: Send + Sync {
    /// Called with the reactor's accessor handle and the transition edge.
    async fn on_transition(&self, reactor: ReactorHandle<K>, old_state: State, new_state: State);
}
