//! Reactor configuration.

use crate::traits::Signer;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Parameters of a consensus reactor.
#[derive(Clone)]
pub struct ReactorConfig {
    /// How often the local signature is rebroadcast while waiting for
    /// quorum.
    pub retransmit_frequency: Duration,
    /// Extra collection time after quorum before the reactor finalizes.
    pub quorum_grace_period: Duration,
    /// How long to wait for new signatures after the last one before giving
    /// up on quorum.
    pub quorum_timeout: Duration,
    /// How long to wait for a local observation after only having seen
    /// foreign ones.
    pub unobserved_timeout: Duration,
    /// Signer for local observations. Without one the reactor is an
    /// observer: it tracks consensus but never contributes a signature.
    pub signer: Option<Arc<dyn Signer>>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            retransmit_frequency: Duration::from_secs(5 * 60),
            quorum_grace_period: Duration::from_secs(60),
            quorum_timeout: Duration::from_secs(5 * 60),
            unobserved_timeout: Duration::from_secs(5 * 60),
            signer: None,
        }
    }
}

impl fmt::Debug for ReactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorConfig")
            .field("retransmit_frequency", &self.retransmit_frequency)
            .field("quorum_grace_period", &self.quorum_grace_period)
            .field("quorum_timeout", &self.quorum_timeout)
            .field("unobserved_timeout", &self.unobserved_timeout)
            .field("signer", &self.signer.is_some())
            .finish()
    }
}
