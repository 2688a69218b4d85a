//! Gossip messages broadcast between guardians.

mod observation;

pub use observation::{GossipMessage, SignedObservation};
