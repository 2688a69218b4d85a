//! The consensus reactor and its driver loop.

use crate::config::ReactorConfig;
use crate::error::ReactorError;
use crate::metrics::metrics;
use crate::state::{ReactorState, State};
use crate::traits::{GossipSender, StateTransitionHook};
use crate::verify::verify_signed_observation;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_messages::{GossipMessage, SignedObservation};
use vigil_types::{Address, GuardianSet, Observation, Signature};

/// How often housekeeping runs.
const TICK_FREQUENCY: Duration = Duration::from_secs(1);

/// Per-call bound on signer and gossip-sender invocations.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of each inbound event queue. Producers see backpressure when a
/// queue is full.
const CHANNEL_CAPACITY: usize = 10;

/// One guardian signature of the final attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationSignature {
    /// Position of the signing guardian in the guardian set.
    pub index: u8,
    /// The guardian's 65-byte recoverable signature.
    pub signature: Signature,
}

/// Receivers for the two inbound event queues, claimed by the driver loop.
struct EventReceivers<K> {
    observation_rx: mpsc::Receiver<K>,
    foreign_rx: mpsc::Receiver<SignedObservation>,
}

/// The full consensus processor for a single observed message. A reactor
/// cannot be reused after reaching a terminal state.
///
/// Externally the reactor is driven through three inputs: the local
/// observation queue, the foreign observation queue, and [`run`], which owns
/// the housekeeping tick. All mutations happen under one mutex, so handlers
/// and read accessors serialize against each other.
///
/// [`run`]: ConsensusReactor::run
pub struct ConsensusReactor<K: Observation> {
    /// Name of the reactor group, used as a metric label.
    group: String,
    /// Copy of the guardian set valid at observation/injection time.
    gs: Arc<GuardianSet>,
    /// Configuration of the reactor.
    config: ReactorConfig,
    /// Sender used to publish local signatures to the network.
    sender: Option<Arc<dyn GossipSender>>,
    /// Hook called on every state transition, on its own task.
    hook: Option<Arc<dyn StateTransitionHook<K>>>,
    /// All mutable fields of the reactor. May only be used while holding
    /// the lock.
    state: Arc<Mutex<ReactorState<K>>>,
    /// Queue handle for local observations.
    observation_tx: mpsc::Sender<K>,
    /// Queue handle for foreign signed observations.
    foreign_tx: mpsc::Sender<SignedObservation>,
    /// Queue receivers, taken exactly once by the driver loop.
    receivers: Mutex<Option<EventReceivers<K>>>,
}

impl<K: Observation> ConsensusReactor<K> {
    /// Create a reactor for one message, snapshotting the guardian set.
    pub fn new(
        group: impl Into<String>,
        config: ReactorConfig,
        gs: Arc<GuardianSet>,
        sender: Option<Arc<dyn GossipSender>>,
        hook: Option<Arc<dyn StateTransitionHook<K>>>,
    ) -> Self {
        let (observation_tx, observation_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (foreign_tx, foreign_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            group: group.into(),
            gs,
            config,
            sender,
            hook,
            state: Arc::new(Mutex::new(ReactorState::new())),
            observation_tx,
            foreign_tx,
            receivers: Mutex::new(Some(EventReceivers {
                observation_rx,
                foreign_rx,
            })),
        }
    }

    /// Drive the reactor until it reaches a terminal state or is cancelled.
    ///
    /// Multiplexes the two inbound queues, the cancellation token, and a
    /// one-second housekeeping tick. Returns `Ok(())` once housekeeping
    /// reports a terminal state, [`ReactorError::Cancelled`] when the token
    /// fires, or a signer error if local signing hard-fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ReactorError> {
        let EventReceivers {
            mut observation_rx,
            mut foreign_rx,
        } = self
            .receivers
            .lock()
            .await
            .take()
            .ok_or(ReactorError::AlreadyRunning)?;

        debug!(group = %self.group, "reactor driver loop started");

        // A reconstructed reactor may already hold a full attestation.
        if self.state().await == State::Finalized {
            debug!(group = %self.group, "reactor already finalized");
            return Ok(());
        }

        let mut ticker = interval_at(Instant::now() + TICK_FREQUENCY, TICK_FREQUENCY);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ReactorError::Cancelled);
                }
                Some(observation) = observation_rx.recv() => {
                    self.observed(observation).await?;
                }
                Some(signed) = foreign_rx.recv() => {
                    self.observation_received(signed).await;
                }
                _ = ticker.tick() => {
                    if self.housekeeping().await {
                        debug!(group = %self.group, "reactor concluded; shutting down driver loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Queue handle for local observations. Sends block while the queue is
    /// full.
    pub fn observation_sender(&self) -> mpsc::Sender<K> {
        self.observation_tx.clone()
    }

    /// Queue handle for foreign signed observations. Sends block while the
    /// queue is full.
    pub fn foreign_observation_sender(&self) -> mpsc::Sender<SignedObservation> {
        self.foreign_tx.clone()
    }

    /// The guardian set snapshot this reactor verifies against.
    pub fn guardian_set(&self) -> &GuardianSet {
        &self.gs
    }

    /// A lock-free-accessor view of this reactor, safe to hold from hook
    /// tasks.
    pub fn handle(&self) -> ReactorHandle<K> {
        ReactorHandle {
            state: Arc::clone(&self.state),
            gs: Arc::clone(&self.gs),
        }
    }

    /// Current state of the reactor.
    pub async fn state(&self) -> State {
        self.state.lock().await.current_state
    }

    /// The local copy of the observed message, once one was made.
    pub async fn observation(&self) -> Option<K> {
        self.state.lock().await.observation.clone()
    }

    /// Whether the reactor holds a quorum of signatures.
    pub async fn has_quorum(&self) -> bool {
        let state = self.state.lock().await;
        self.quorum_reached(&state)
    }

    /// Time the last new signed observation was accepted.
    pub async fn last_observation(&self) -> Option<Instant> {
        self.state.lock().await.last_observation
    }

    /// The collected signatures in attestation order: ascending by
    /// guardian-set index, skipping any signature whose address is not in
    /// the snapshot.
    pub async fn attestation_signatures(&self) -> Vec<AttestationSignature> {
        let state = self.state.lock().await;
        collect_signatures(&self.gs, &state.signatures)
    }

    /// Handle a local observation of the message.
    async fn observed(&self, observation: K) -> Result<(), ReactorError> {
        let mut state = self.state.lock().await;

        debug!(
            group = %self.group,
            message_id = %observation.message_id(),
            "observed message locally"
        );

        if !matches!(
            state.current_state,
            State::Initialized | State::Unobserved | State::QuorumUnobserved
        ) {
            return Ok(());
        }

        if state.current_state == State::QuorumUnobserved {
            metrics()
                .reactor_observed_late
                .with_label_values(&[&self.group])
                .inc();
        }

        let digest = observation.signing_digest();
        state.observation = Some(observation);

        if let Some(signer) = self.config.signer.clone() {
            // Sign the digest with our guardian key. A signer failure is
            // fatal: the local path cannot continue without a signature.
            let local_addr = timeout(IO_TIMEOUT, signer.address())
                .await
                .map_err(|_| ReactorError::Timeout("signer address lookup"))??;
            let signature = timeout(IO_TIMEOUT, signer.sign(&digest))
                .await
                .map_err(|_| ReactorError::Timeout("signing"))??;
            state.local_signature = Some(signature);

            metrics()
                .messages_signed
                .with_label_values(&[&self.group])
                .inc();

            state.signatures.insert(local_addr, signature);

            if let Err(err) = self.transmit_signature(&mut state).await {
                warn!(
                    group = %self.group,
                    error = %err,
                    "failed to transmit signature on observation"
                );
            }
        }

        let now = Instant::now();
        match state.current_state {
            State::Initialized => {
                state.first_seen = Some(now);
                state.last_observation = Some(now);
                self.state_transition(&mut state, State::Observed);
            }
            State::Unobserved => {
                state.last_observation = Some(now);
                self.state_transition(&mut state, State::Observed);
            }
            State::QuorumUnobserved => {
                metrics()
                    .reactor_quorum
                    .with_label_values(&[&self.group, "quorum"])
                    .inc();
                self.state_transition(&mut state, State::Quorum);
                return Ok(());
            }
            _ => {}
        }

        // The local signature alone may have tipped the quorum.
        if !self.quorum_reached(&state) {
            return Ok(());
        }

        if state.current_state == State::Observed {
            metrics()
                .reactor_quorum
                .with_label_values(&[&self.group, "quorum"])
                .inc();
            state.time_quorum = Some(Instant::now());
            self.state_transition(&mut state, State::Quorum);
        }

        Ok(())
    }

    /// Handle a signed observation received from another guardian.
    async fn observation_received(&self, m: SignedObservation) {
        let mut state = self.state.lock().await;

        metrics()
            .observations_received
            .with_label_values(&[&self.group])
            .inc();

        debug!(
            group = %self.group,
            message_id = %m.message_id,
            digest = %m.hash,
            "received foreign observation"
        );

        if !matches!(
            state.current_state,
            State::Initialized
                | State::Observed
                | State::Unobserved
                | State::Quorum
                | State::QuorumUnobserved
        ) {
            return;
        }

        // The sender may still be byzantine, but a verified signature tells
        // us which guardian we are dealing with.
        let (their_addr, signature) = match verify_signed_observation(&self.group, &m, &self.gs) {
            Ok(verified) => verified,
            Err(err) => {
                info!(
                    group = %self.group,
                    error = %err,
                    digest = %m.hash,
                    addr = %m.addr,
                    "failed to verify signed observation"
                );
                return;
            }
        };

        let addr_label = their_addr.to_string();
        metrics()
            .observations_received_by_guardian
            .with_label_values(&[&self.group, &addr_label])
            .inc();

        debug!(
            group = %self.group,
            address = %their_addr,
            "accepted foreign observation"
        );

        // Only the first signature per guardian counts.
        if state.signatures.contains_key(&their_addr) {
            return;
        }

        state.signatures.insert(their_addr, signature);
        state.last_observation = Some(Instant::now());

        if state.current_state == State::Initialized {
            debug!(
                group = %self.group,
                message_id = %m.message_id,
                "received foreign observation before our own"
            );
            state.first_seen = Some(Instant::now());
            self.state_transition(&mut state, State::Unobserved);
        }

        if !self.quorum_reached(&state) {
            return;
        }

        match state.current_state {
            State::Observed => {
                metrics()
                    .reactor_quorum
                    .with_label_values(&[&self.group, "quorum"])
                    .inc();
                state.time_quorum = Some(Instant::now());
                self.state_transition(&mut state, State::Quorum);
            }
            State::Unobserved => {
                metrics()
                    .reactor_quorum
                    .with_label_values(&[&self.group, "quorum_unobserved"])
                    .inc();
                state.time_quorum = Some(Instant::now());
                self.state_transition(&mut state, State::QuorumUnobserved);
            }
            _ => {}
        }
    }

    /// Evaluate timers for the current state. Returns `true` once the
    /// reactor is terminal and the driver loop should exit.
    async fn housekeeping(&self) -> bool {
        let mut state = self.state.lock().await;

        match state.current_state {
            State::Initialized => {}
            State::Unobserved => {
                if elapsed(state.first_seen) > self.config.unobserved_timeout {
                    debug!(group = %self.group, reason = "unobserved_timeout", "timing out");
                    self.time_out(&mut state);
                }
            }
            State::Observed => {
                if elapsed(state.last_observation) > self.config.quorum_timeout {
                    debug!(group = %self.group, reason = "quorum_timeout", "timing out");
                    self.time_out(&mut state);
                }

                if state.current_state == State::Observed
                    && self.config.signer.is_some()
                    && elapsed(state.last_transmission) > self.config.retransmit_frequency
                {
                    debug!(group = %self.group, "retransmitting");
                    metrics()
                        .reactor_resubmission
                        .with_label_values(&[&self.group])
                        .inc();
                    if let Err(err) = self.transmit_signature(&mut state).await {
                        warn!(
                            group = %self.group,
                            error = %err,
                            "failed to retransmit signature"
                        );
                    }
                }
            }
            State::Quorum => {
                if elapsed(state.time_quorum) > self.config.quorum_grace_period
                    || state.signatures.len() == self.gs.len()
                {
                    debug!(group = %self.group, reason = "quorum_grace", "concluding");
                    self.time_out(&mut state);
                }
            }
            State::QuorumUnobserved => {
                if elapsed(state.first_seen) > self.config.unobserved_timeout {
                    debug!(
                        group = %self.group,
                        reason = "quorum_unobserved_timeout",
                        "timing out"
                    );
                    self.time_out(&mut state);
                }
            }
            State::Finalized | State::TimedOut => {
                // Final iteration; the driver loop exits.
                return true;
            }
        }

        false
    }

    /// Conclude the reactor. From `Quorum` this is the happy-path
    /// finalization; from every other state it is a timeout. Must only be
    /// called while holding the state lock.
    fn time_out(&self, state: &mut ReactorState<K>) {
        if state.current_state == State::Quorum {
            metrics()
                .reactor_finalized
                .with_label_values(&[&self.group])
                .inc();
            self.state_transition(state, State::Finalized);
        } else {
            metrics()
                .reactor_timed_out
                .with_label_values(&[&self.group, state.current_state.as_str()])
                .inc();
            self.state_transition(state, State::TimedOut);
        }
    }

    /// Record a state transition and dispatch the hook on its own task.
    /// Must only be called while holding the state lock.
    fn state_transition(&self, state: &mut ReactorState<K>, to: State) {
        debug!(
            group = %self.group,
            from = %state.current_state,
            to = %to,
            "state transition"
        );
        let previous = state.current_state;
        state.current_state = to;

        if let Some(hook) = &self.hook {
            let hook = Arc::clone(hook);
            let handle = self.handle();
            tokio::spawn(async move {
                hook.on_transition(handle, previous, to).await;
            });
        }
    }

    /// Whether the stored signatures meet quorum. Must only be called while
    /// holding the state lock.
    fn quorum_reached(&self, state: &ReactorState<K>) -> bool {
        state.signatures.len() >= self.gs.quorum()
    }

    /// Broadcast the local signature. Must only be called while holding the
    /// state lock.
    async fn transmit_signature(&self, state: &mut ReactorState<K>) -> Result<(), ReactorError> {
        let signer = self.config.signer.as_ref().ok_or(ReactorError::MissingSigner)?;
        let sender = self.sender.as_ref().ok_or(ReactorError::MissingSender)?;
        let observation = state
            .observation
            .as_ref()
            .ok_or(ReactorError::MissingObservation)?;
        let local_signature = state
            .local_signature
            .ok_or(ReactorError::MissingSignature)?;

        let addr = timeout(IO_TIMEOUT, signer.address())
            .await
            .map_err(|_| ReactorError::Timeout("signer address lookup"))??;

        let signed = SignedObservation::new(
            addr,
            observation.signing_digest(),
            local_signature.to_bytes().to_vec(),
            Vec::new(),
            observation.message_id(),
        );
        timeout(
            IO_TIMEOUT,
            sender.send(GossipMessage::SignedObservation(signed)),
        )
        .await
        .map_err(|_| ReactorError::Timeout("gossip send"))??;

        metrics()
            .observations_broadcast
            .with_label_values(&[&self.group])
            .inc();
        state.last_transmission = Some(Instant::now());

        Ok(())
    }
}

/// Lightweight read-only view of a reactor.
///
/// Hook tasks receive a handle instead of the reactor itself, so they can
/// inspect state without being able to re-enter the transition engine.
pub struct ReactorHandle<K: Observation> {
    state: Arc<Mutex<ReactorState<K>>>,
    gs: Arc<GuardianSet>,
}

impl<K: Observation> Clone for ReactorHandle<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            gs: Arc::clone(&self.gs),
        }
    }
}

impl<K: Observation> ReactorHandle<K> {
    /// Current state of the reactor.
    pub async fn state(&self) -> State {
        self.state.lock().await.current_state
    }

    /// The local copy of the observed message, once one was made.
    pub async fn observation(&self) -> Option<K> {
        self.state.lock().await.observation.clone()
    }

    /// Whether the reactor holds a quorum of signatures.
    pub async fn has_quorum(&self) -> bool {
        let state = self.state.lock().await;
        state.signatures.len() >= self.gs.quorum()
    }

    /// Time the last new signed observation was accepted.
    pub async fn last_observation(&self) -> Option<Instant> {
        self.state.lock().await.last_observation
    }

    /// The collected signatures in attestation order.
    pub async fn attestation_signatures(&self) -> Vec<AttestationSignature> {
        let state = self.state.lock().await;
        collect_signatures(&self.gs, &state.signatures)
    }

    /// The guardian set snapshot this reactor verifies against.
    pub fn guardian_set(&self) -> &GuardianSet {
        &self.gs
    }
}

/// Emit the stored signatures ordered by guardian-set index. Addresses
/// outside the snapshot are skipped: they may be residue from a previous
/// guardian set.
fn collect_signatures(
    gs: &GuardianSet,
    signatures: &HashMap<Address, Signature>,
) -> Vec<AttestationSignature> {
    let mut out = Vec::new();
    for (index, addr) in gs.keys().iter().enumerate() {
        if let Some(signature) = signatures.get(addr) {
            out.push(AttestationSignature {
                index: index as u8,
                signature: *signature,
            });
        }
    }
    out
}

/// Time elapsed since `since`, or effectively infinite if it was never set.
fn elapsed(since: Option<Instant>) -> Duration {
    since.map_or(Duration::MAX, |instant| instant.elapsed())
}
