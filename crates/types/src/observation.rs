//! The observation capability.

use crate::hash::Hash;

/// A message witnessed by a guardian, to be attested by the network.
///
/// The consensus reactor is generic over the concrete message type; it only
/// needs a stable identifier for logging and routing, and the digest that
/// guardians sign.
pub trait Observation: Clone + Send + Sync + 'static {
    /// Human-readable message identifier.
    fn message_id(&self) -> String;

    /// Digest of the canonical signing body of the message. Used for
    /// signature generation and verification.
    fn signing_digest(&self) -> Hash;
}
