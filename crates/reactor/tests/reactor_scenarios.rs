//! End-to-end reactor scenarios.
//!
//! Each test drives a full reactor task against a 19-guardian set
//! (quorum 13) with the tokio clock paused: sleeping in a test auto-advances
//! the clock, so the one-second housekeeping ticker and the timeout ladder
//! fire deterministically.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use vigil_messages::{GossipMessage, SignedObservation};
use vigil_reactor::{
    ConsensusReactor, GossipSendError, GossipSender, LocalSigner, ReactorConfig, ReactorError,
    ReactorHandle, Signer, State, StateTransitionHook,
};
use vigil_types::test_utils::{test_guardian_set, test_keypair};
use vigil_types::{Hash, KeyPair, Observation};

/// Guardian count used by most scenarios; quorum is 13.
const GUARDIANS: usize = 19;

const RETRANSMIT_FREQUENCY: Duration = Duration::from_secs(300);
const QUORUM_GRACE_PERIOD: Duration = Duration::from_secs(60);
const QUORUM_TIMEOUT: Duration = Duration::from_secs(600);
const UNOBSERVED_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestObservation {
    message_id: String,
    payload: Vec<u8>,
}

impl TestObservation {
    fn new(payload: &[u8]) -> Self {
        Self {
            message_id: "testchain/1/message".to_string(),
            payload: payload.to_vec(),
        }
    }
}

impl Observation for TestObservation {
    fn message_id(&self) -> String {
        self.message_id.clone()
    }

    fn signing_digest(&self) -> Hash {
        Hash::from_bytes(&self.payload)
    }
}

/// Gossip sender that records everything it is asked to publish.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<GossipMessage>>,
}

impl RecordingSender {
    fn sent(&self) -> Vec<GossipMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl GossipSender for RecordingSender {
    async fn send(&self, message: GossipMessage) -> Result<(), GossipSendError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Hook that records every transition edge it is called with.
#[derive(Default)]
struct RecordingHook {
    transitions: Mutex<Vec<(State, State)>>,
}

impl RecordingHook {
    fn transitions(&self) -> Vec<(State, State)> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateTransitionHook<TestObservation> for RecordingHook {
    async fn on_transition(
        &self,
        reactor: ReactorHandle<TestObservation>,
        old_state: State,
        new_state: State,
    ) {
        // The handle is usable from the hook task; the state it reports may
        // already have moved past `new_state`.
        let _ = reactor.state().await;
        self.transitions.lock().unwrap().push((old_state, new_state));
    }
}

struct Fixture {
    keypairs: Vec<KeyPair>,
    sender: Arc<RecordingSender>,
    reactor: Arc<ConsensusReactor<TestObservation>>,
    cancel: CancellationToken,
    driver: JoinHandle<Result<(), ReactorError>>,
}

/// Spawn a reactor over `guardians` test guardians. `signer_seat` selects
/// which guardian's key signs locally; `None` makes the reactor an observer.
fn spawn_reactor(
    group: &str,
    guardians: usize,
    signer_seat: Option<usize>,
    hook: Option<Arc<dyn StateTransitionHook<TestObservation>>>,
) -> Fixture {
    let (keypairs, gs) = test_guardian_set(guardians);
    let sender = Arc::new(RecordingSender::default());
    let signer = signer_seat
        .map(|seat| Arc::new(LocalSigner::new(keypairs[seat].clone())) as Arc<dyn Signer>);

    let config = ReactorConfig {
        retransmit_frequency: RETRANSMIT_FREQUENCY,
        quorum_grace_period: QUORUM_GRACE_PERIOD,
        quorum_timeout: QUORUM_TIMEOUT,
        unobserved_timeout: UNOBSERVED_TIMEOUT,
        signer,
    };

    let reactor = Arc::new(ConsensusReactor::new(
        group,
        config,
        Arc::new(gs),
        Some(sender.clone() as Arc<dyn GossipSender>),
        hook,
    ));

    let cancel = CancellationToken::new();
    let driver = tokio::spawn({
        let reactor = Arc::clone(&reactor);
        let cancel = cancel.clone();
        async move { reactor.run(cancel).await }
    });

    Fixture {
        keypairs,
        sender,
        reactor,
        cancel,
        driver,
    }
}

/// Build a signed observation the way a remote guardian would.
fn signed_observation(keypair: &KeyPair, observation: &TestObservation) -> SignedObservation {
    let digest = observation.signing_digest();
    SignedObservation::new(
        keypair.address(),
        digest,
        keypair.sign(&digest).to_bytes().to_vec(),
        Vec::new(),
        observation.message_id(),
    )
}

/// Let queued events drain without reaching the next housekeeping tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Advance far enough past `duration` for the tick after it to run too.
async fn advance_past(duration: Duration) {
    tokio::time::sleep(duration + Duration::from_secs(2)).await;
}

/// Read a counter from the global registry, matching all given labels.
fn counter_value(name: &str, labels: &[(&str, &str)]) -> f64 {
    for family in prometheus::gather() {
        if family.get_name() != name {
            continue;
        }
        'metric: for metric in family.get_metric() {
            for (key, value) in labels {
                let found = metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == *key && pair.get_value() == *value);
                if !found {
                    continue 'metric;
                }
            }
            return metric.get_counter().get_value();
        }
    }
    0.0
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_happy_path_reaches_quorum_and_finalizes() {
    let f = spawn_reactor("happy-path", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"happy path");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Observed);
    assert_eq!(f.sender.sent_count(), 1);

    // Eleven foreign signatures leave the reactor one short of quorum.
    for keypair in &f.keypairs[1..12] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Observed);
    assert!(!f.reactor.has_quorum().await);

    // The twelfth foreign signature makes 13 with our own.
    f.reactor
        .foreign_observation_sender()
        .send(signed_observation(&f.keypairs[12], &observation))
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Quorum);
    assert!(f.reactor.has_quorum().await);

    advance_past(QUORUM_GRACE_PERIOD).await;
    assert_eq!(f.reactor.state().await, State::Finalized);

    let signatures = f.reactor.attestation_signatures().await;
    assert_eq!(signatures.len(), 13);
    let indices: Vec<u8> = signatures.iter().map(|s| s.index).collect();
    assert_eq!(indices, (0..=12).collect::<Vec<u8>>());

    advance_past(Duration::ZERO).await;
    let outcome = f.driver.await.unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_late_local_observation_completes_the_attestation() {
    let f = spawn_reactor("late-local", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"late local");

    for keypair in &f.keypairs[1..13] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Unobserved);

    f.reactor
        .foreign_observation_sender()
        .send(signed_observation(&f.keypairs[13], &observation))
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::QuorumUnobserved);

    // The late local observation upgrades the quorum to a usable one.
    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Quorum);

    advance_past(QUORUM_GRACE_PERIOD).await;
    assert_eq!(f.reactor.state().await, State::Finalized);

    let signatures = f.reactor.attestation_signatures().await;
    assert_eq!(signatures.len(), 14);
    let indices: Vec<u8> = signatures.iter().map(|s| s.index).collect();
    assert_eq!(indices, (0..=13).collect::<Vec<u8>>());
}

#[tokio::test(start_paused = true)]
async fn test_unobserved_reactor_times_out() {
    let f = spawn_reactor("unobserved-timeout", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"unobserved timeout");

    for keypair in &f.keypairs[1..4] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Unobserved);

    advance_past(UNOBSERVED_TIMEOUT).await;
    assert_eq!(f.reactor.state().await, State::TimedOut);

    advance_past(Duration::ZERO).await;
    let outcome = f.driver.await.unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_observed_reactor_times_out_without_quorum() {
    let f = spawn_reactor("quorum-timeout", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"quorum timeout");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    for keypair in &f.keypairs[1..6] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Observed);
    assert!(!f.reactor.has_quorum().await);

    advance_past(QUORUM_TIMEOUT).await;
    assert_eq!(f.reactor.state().await, State::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_local_signature_is_retransmitted() {
    let f = spawn_reactor("retransmit", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"retransmit");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.sender.sent_count(), 1);

    advance_past(RETRANSMIT_FREQUENCY).await;
    assert_eq!(f.reactor.state().await, State::Observed);

    let sent = f.sender.sent();
    assert_eq!(sent.len(), 2);
    // The rebroadcast carries exactly the original address, digest and
    // signature bytes.
    assert_eq!(sent[1], sent[0]);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_unknown_guardian_is_rejected() {
    let f = spawn_reactor("byzantine", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"byzantine");

    let before = counter_value(
        "vigil_observations_failed_total",
        &[("group", "byzantine"), ("reason", "unknown_guardian")],
    );

    let outsider = test_keypair(200);
    f.reactor
        .foreign_observation_sender()
        .send(signed_observation(&outsider, &observation))
        .await
        .unwrap();
    settle().await;

    let after = counter_value(
        "vigil_observations_failed_total",
        &[("group", "byzantine"), ("reason", "unknown_guardian")],
    );
    assert_eq!(after, before + 1.0);

    // Nothing was stored and no transition happened.
    assert_eq!(f.reactor.state().await, State::Initialized);
    assert!(f.reactor.attestation_signatures().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_guardian_signature_is_dropped() {
    let f = spawn_reactor("duplicate", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"duplicate");

    let first = signed_observation(&f.keypairs[1], &observation);
    f.reactor
        .foreign_observation_sender()
        .send(first.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Unobserved);

    // A second, different signature from the same guardian: signed over
    // another digest, so the bytes differ but verification still passes
    // (digests are not cross-checked). It must not replace the first.
    let second = signed_observation(&f.keypairs[1], &TestObservation::new(b"other message"));
    assert_ne!(second.signature, first.signature);
    f.reactor
        .foreign_observation_sender()
        .send(second)
        .await
        .unwrap();
    settle().await;

    let signatures = f.reactor.attestation_signatures().await;
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].index, 1);
    assert_eq!(signatures[0].signature.to_bytes().to_vec(), first.signature);
}

#[tokio::test(start_paused = true)]
async fn test_full_set_finalizes_before_grace_period() {
    let f = spawn_reactor("full-set", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"full set");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    for keypair in &f.keypairs[1..] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Quorum);

    // With every guardian accounted for there is nothing left to wait for;
    // the next tick finalizes well before the grace period elapses.
    advance_past(Duration::ZERO).await;
    assert_eq!(f.reactor.state().await, State::Finalized);
    assert_eq!(f.reactor.attestation_signatures().await.len(), GUARDIANS);
}

#[tokio::test(start_paused = true)]
async fn test_observer_without_signer_never_broadcasts() {
    let f = spawn_reactor("observer", GUARDIANS, None, None);
    let observation = TestObservation::new(b"observer");

    // The state machine still advances on the local observation.
    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Observed);
    assert_eq!(f.sender.sent_count(), 0);

    // Quorum must come entirely from foreign signatures.
    for keypair in &f.keypairs[1..14] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    assert_eq!(f.reactor.state().await, State::Quorum);

    advance_past(QUORUM_GRACE_PERIOD).await;
    assert_eq!(f.reactor.state().await, State::Finalized);

    let signatures = f.reactor.attestation_signatures().await;
    assert_eq!(signatures.len(), 13);
    // No self-signature: the observer's own seat (index 0) is absent.
    let indices: Vec<u8> = signatures.iter().map(|s| s.index).collect();
    assert_eq!(indices, (1..=13).collect::<Vec<u8>>());

    // Never signed, never broadcast, not even on the retransmission path.
    advance_past(RETRANSMIT_FREQUENCY).await;
    assert_eq!(f.sender.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_reactor_accepts_no_further_events() {
    let f = spawn_reactor("terminal", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"terminal");

    for keypair in &f.keypairs[1..4] {
        f.reactor
            .foreign_observation_sender()
            .send(signed_observation(keypair, &observation))
            .await
            .unwrap();
    }
    settle().await;
    advance_past(UNOBSERVED_TIMEOUT).await;
    assert_eq!(f.reactor.state().await, State::TimedOut);

    advance_past(Duration::ZERO).await;
    let outcome = f.driver.await.unwrap();
    assert!(outcome.is_ok());

    // The driver has exited and torn down its queues: late events cannot
    // reach the reactor, let alone mutate it.
    let late = f
        .reactor
        .foreign_observation_sender()
        .send(signed_observation(&f.keypairs[5], &observation))
        .await;
    assert!(late.is_err());
    assert_eq!(f.reactor.state().await, State::TimedOut);
    assert_eq!(f.reactor.attestation_signatures().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_preserves_state() {
    let f = spawn_reactor("cancel", GUARDIANS, Some(0), None);
    let observation = TestObservation::new(b"cancel");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    assert_eq!(f.reactor.state().await, State::Observed);

    f.cancel.cancel();
    let outcome = f.driver.await.unwrap();
    assert!(matches!(outcome, Err(ReactorError::Cancelled)));

    // Cancellation is not a state transition.
    assert_eq!(f.reactor.state().await, State::Observed);
}

#[tokio::test(start_paused = true)]
async fn test_driver_loop_runs_only_once() {
    let f = spawn_reactor("double-run", GUARDIANS, Some(0), None);

    f.cancel.cancel();
    let outcome = f.driver.await.unwrap();
    assert!(matches!(outcome, Err(ReactorError::Cancelled)));

    let rerun = f.reactor.run(CancellationToken::new()).await;
    assert!(matches!(rerun, Err(ReactorError::AlreadyRunning)));
}

#[tokio::test(start_paused = true)]
async fn test_hook_sees_every_transition() {
    let hook = Arc::new(RecordingHook::default());
    // A single-guardian set reaches quorum on the local signature alone and
    // finalizes on the next tick, exercising three transitions.
    let f = spawn_reactor(
        "hook",
        1,
        Some(0),
        Some(hook.clone() as Arc<dyn StateTransitionHook<TestObservation>>),
    );
    let observation = TestObservation::new(b"hook");

    f.reactor
        .observation_sender()
        .send(observation.clone())
        .await
        .unwrap();
    settle().await;
    advance_past(Duration::ZERO).await;
    assert_eq!(f.reactor.state().await, State::Finalized);

    assert_eq!(
        hook.transitions(),
        vec![
            (State::Initialized, State::Observed),
            (State::Observed, State::Quorum),
            (State::Quorum, State::Finalized),
        ]
    );
}
