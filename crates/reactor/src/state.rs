//! Reactor states and the guarded state record.

use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;
use vigil_types::{Address, Signature};

/// State of the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Freshly created; waiting for either a local or foreign observation.
    Initialized,
    /// One local observation and any number of foreign observations seen.
    /// Able to contribute to a full attestation once quorum is reached.
    Observed,
    /// Foreign observations seen but no local observation yet. Cannot
    /// contribute a local signature until the message is observed locally.
    Unobserved,
    /// Local observation plus a quorum of signatures: all data needed for a
    /// full attestation is present, collection continues through the grace
    /// period.
    Quorum,
    /// A quorum of foreign signatures with no local observation. A full
    /// attestation is only possible after a late local observation.
    QuorumUnobserved,
    /// Terminal: the reactor holds everything required for a full
    /// attestation.
    Finalized,
    /// Terminal: locally confirmed quorum was not achieved within the
    /// configured timeouts.
    TimedOut,
}

impl State {
    /// Stable snake_case name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Initialized => "initialized",
            State::Observed => "observed",
            State::Unobserved => "unobserved",
            State::Quorum => "quorum",
            State::QuorumUnobserved => "quorum_unobserved",
            State::Finalized => "finalized",
            State::TimedOut => "timed_out",
        }
    }

    /// Whether the reactor performs no further work in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Finalized | State::TimedOut)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All mutable fields of a reactor. May only be touched while holding the
/// reactor's state mutex.
pub(crate) struct ReactorState<K> {
    /// Current state of the reactor.
    pub(crate) current_state: State,
    /// First time this digest was seen, locally or from a peer.
    pub(crate) first_seen: Option<Instant>,
    /// Time the most recent new signature was accepted.
    pub(crate) last_observation: Option<Instant>,
    /// Most recent time the local signature was broadcast.
    pub(crate) last_transmission: Option<Instant>,
    /// Time quorum was reached.
    pub(crate) time_quorum: Option<Instant>,
    /// Our own copy of the observed message.
    pub(crate) observation: Option<K>,
    /// Signatures seen, one per guardian. During guardian set rotation this
    /// may hold entries from both the old and the new set; only addresses in
    /// the snapshot captured at construction count toward the attestation.
    pub(crate) signatures: HashMap<Address, Signature>,
    /// The signature we broadcast, kept for retransmissions.
    pub(crate) local_signature: Option<Signature>,
}

impl<K> ReactorState<K> {
    pub(crate) fn new() -> Self {
        Self {
            current_state: State::Initialized,
            first_seen: None,
            last_observation: None,
            last_transmission: None,
            time_quorum: None,
            observation: None,
            signatures: HashMap::new(),
            local_signature: None,
        }
    }
}
