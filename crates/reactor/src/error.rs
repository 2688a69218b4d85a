//! Reactor errors.

use crate::traits::{GossipSendError, SignerError};
use thiserror::Error;

/// Errors surfaced by a consensus reactor.
///
/// Only cancellation and signer hard-failures escape the driver loop; all
/// other conditions are handled locally and reflected in metrics.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The driver loop was cancelled by its caller.
    #[error("reactor cancelled")]
    Cancelled,
    /// The driver loop was started more than once.
    #[error("driver loop already running")]
    AlreadyRunning,
    /// The configured signer failed; the local path cannot continue.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// A bounded signer or sender call exceeded its deadline.
    #[error("{0} timed out")]
    Timeout(&'static str),
    /// The gossip sender rejected a broadcast.
    #[error(transparent)]
    Send(#[from] GossipSendError),
    /// A broadcast was requested without a configured signer.
    #[error("cannot broadcast a signature without a signer")]
    MissingSigner,
    /// A broadcast was requested without a configured gossip sender.
    #[error("cannot broadcast a signature without a gossip sender")]
    MissingSender,
    /// A broadcast was requested before a local observation was recorded.
    #[error("no local observation to broadcast")]
    MissingObservation,
    /// A broadcast was requested before a local signature was produced.
    #[error("no local signature to broadcast")]
    MissingSignature,
}
