//! Network messages for the guardian attestation protocol.

pub mod gossip;

mod network;

// Re-export commonly used types
pub use gossip::{GossipMessage, SignedObservation};
pub use network::NetworkMessage;
