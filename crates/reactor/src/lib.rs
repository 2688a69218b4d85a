//! Single-observation consensus reactor.
//!
//! A [`ConsensusReactor`] drives exactly one observed message from first
//! sighting through signature collection to either finalization (a full
//! quorum of guardian signatures is assembled) or timeout. A reactor is
//! never reused: the owning router creates one per message digest and
//! discards it once it reaches a terminal state.
//!
//! # Architecture
//!
//! The reactor is a small event-driven state machine behind a driver loop:
//!
//! ```text
//! local observations  ─┐
//! foreign observations ┼─▶ driver loop ─▶ transition engine ─▶ gossip sender
//! 1s housekeeping tick ─┘                 (one mutex)          transition hook
//! ```
//!
//! - Local observations are signed (when a [`Signer`] is configured),
//!   recorded, and broadcast.
//! - Foreign observations are verified against the guardian-set snapshot,
//!   deduplicated per guardian, and counted toward quorum.
//! - The periodic tick evaluates retransmission and the timeout ladder.
//!
//! All mutable state lives under a single async mutex, held across signer
//! and sender calls so the state machine is fully serialized. Transition
//! hooks run on their own tasks and see the reactor only through a
//! lock-free-accessor [`ReactorHandle`].

mod config;
mod error;
mod metrics;
mod reactor;
mod signer;
mod state;
mod traits;
mod verify;

pub use config::ReactorConfig;
pub use error::ReactorError;
pub use reactor::{AttestationSignature, ConsensusReactor, ReactorHandle};
pub use signer::LocalSigner;
pub use state::State;
pub use traits::{GossipSendError, GossipSender, Signer, SignerError, StateTransitionHook};
pub use verify::{verify_signed_observation, VerifyError};
