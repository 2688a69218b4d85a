//! SignedObservation gossip message.

use crate::NetworkMessage;
use serde::{Deserialize, Serialize};
use vigil_types::{Address, Hash};

/// One guardian's signature over an observed message digest.
///
/// Receivers treat the sender as untrusted: the signature is re-verified
/// against `hash` and the claimed `addr` before it counts toward quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedObservation {
    /// Address of the guardian claiming to have produced the signature.
    pub addr: Address,
    /// Signing digest of the observed message.
    pub hash: Hash,
    /// 65-byte recoverable ECDSA signature over `hash`. Carried as raw
    /// bytes; verification parses and rejects malformed encodings.
    pub signature: Vec<u8>,
    /// Opaque transaction hash from the chain the message was observed on.
    /// Empty when the observation was produced locally.
    pub tx_hash: Vec<u8>,
    /// Human-readable message identifier.
    pub message_id: String,
}

impl SignedObservation {
    /// Create a new signed observation.
    pub fn new(
        addr: Address,
        hash: Hash,
        signature: Vec<u8>,
        tx_hash: Vec<u8>,
        message_id: String,
    ) -> Self {
        Self {
            addr,
            hash,
            signature,
            tx_hash,
            message_id,
        }
    }
}

impl NetworkMessage for SignedObservation {
    fn message_type_id() -> &'static str {
        "observation.signed"
    }
}

/// Envelope for messages published to the gossip network.
///
/// One signed observation is wrapped per publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipMessage {
    /// A guardian's signature over an observed message.
    SignedObservation(SignedObservation),
}

impl GossipMessage {
    /// Stable identifier of the wrapped message type.
    pub fn message_type_id(&self) -> &'static str {
        match self {
            GossipMessage::SignedObservation(_) => SignedObservation::message_type_id(),
        }
    }
}
