//! Reactor metrics using the native Prometheus client.
//!
//! Counters are labelled by reactor group so one process can run reactors
//! for several message classes against a single registry.

use prometheus::{register_counter_vec, CounterVec};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Counters tracking reactor activity.
pub struct Metrics {
    /// Foreign observations received, valid or not.
    pub observations_received: CounterVec,
    /// Verified foreign observations, by signing guardian.
    pub observations_received_by_guardian: CounterVec,
    /// Foreign observations rejected during verification, by reason.
    pub observations_failed: CounterVec,
    /// Local signatures broadcast to the network.
    pub observations_broadcast: CounterVec,
    /// Digests signed with the local guardian key.
    pub messages_signed: CounterVec,
    /// Periodic rebroadcasts of the local signature.
    pub reactor_resubmission: CounterVec,
    /// Quorums reached, by variant (with or without a local observation).
    pub reactor_quorum: CounterVec,
    /// Reactors that finalized with a full attestation.
    pub reactor_finalized: CounterVec,
    /// Reactors that timed out, by the state they timed out from.
    pub reactor_timed_out: CounterVec,
    /// Local observations that arrived after quorum was already reached.
    pub reactor_observed_late: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        Self {
            observations_received: register_counter_vec!(
                "vigil_observations_received_total",
                "Total number of signed observations received from the network",
                &["group"]
            )
            .unwrap(),

            observations_received_by_guardian: register_counter_vec!(
                "vigil_observations_received_by_guardian_total",
                "Total number of verified signed observations, by guardian address",
                &["group", "addr"]
            )
            .unwrap(),

            observations_failed: register_counter_vec!(
                "vigil_observations_failed_total",
                "Total number of signed observations that failed verification",
                &["group", "reason"]
            )
            .unwrap(),

            observations_broadcast: register_counter_vec!(
                "vigil_observations_broadcast_total",
                "Total number of signed observations broadcast to the network",
                &["group"]
            )
            .unwrap(),

            messages_signed: register_counter_vec!(
                "vigil_messages_signed_total",
                "Total number of digests signed with the local guardian key",
                &["group"]
            )
            .unwrap(),

            reactor_resubmission: register_counter_vec!(
                "vigil_reactor_resubmission_total",
                "Total number of local signature rebroadcasts",
                &["group"]
            )
            .unwrap(),

            reactor_quorum: register_counter_vec!(
                "vigil_reactor_quorum_total",
                "Total number of reactors that reached quorum, by variant",
                &["group", "variant"]
            )
            .unwrap(),

            reactor_finalized: register_counter_vec!(
                "vigil_reactor_finalized_total",
                "Total number of reactors that finalized",
                &["group"]
            )
            .unwrap(),

            reactor_timed_out: register_counter_vec!(
                "vigil_reactor_timed_out_total",
                "Total number of reactors that timed out, by originating state",
                &["group", "from_state"]
            )
            .unwrap(),

            reactor_observed_late: register_counter_vec!(
                "vigil_reactor_observed_late_total",
                "Total number of local observations made after quorum",
                &["group"]
            )
            .unwrap(),
        }
    }
}

/// Global metrics handle, registered on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
