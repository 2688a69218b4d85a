//! Network message marker trait.

/// Marker for types carried on the gossip network.
pub trait NetworkMessage {
    /// Stable identifier for this message type on the wire.
    fn message_type_id() -> &'static str;
}
