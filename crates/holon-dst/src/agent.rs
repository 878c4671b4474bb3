//! Simulated agents driven by the kernel
//!
//! TigerStyle: Agents record every callback before acting on it.
//!
//! A [`SimAgent`] is an [`Activable`] with a staged mailbox. On each LIVE
//! callback it drains its mailbox and may post a message to a random peer
//! through the [`SimDirectory`]. Faults come from the shared
//! [`FaultInjector`]; everything the agent observes goes to a
//! [`TraceRecorder`] for the invariant checker.

use crate::fault::{FaultInjector, FaultType, OPERATION_LEAVE, OPERATION_SEND};
use crate::invariants::{Delivery, LifecycleEvent, PassRecord, SystemState};
use crate::rng::DeterministicRng;
use bytes::Bytes;
use holon_core::address::Address;
use holon_core::error::{Error, Result};
use holon_core::io::IoContext;
use holon_core::outcome::Outcome;
use holon_runtime::activation::{ActivationParams, ActivationStage, Activable, LifecyclePhase};
use holon_runtime::envelope::Envelope;
use holon_runtime::mailbox::{BufferedMailbox, Mailbox, StagedMailbox};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kind of the messages agents exchange
pub const MESSAGE_KIND_PING: &str = "ping";

/// Messages drained in one LIVE callback above which the agent warns
const BACKLOG_WARNING_COUNT: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// TraceRecorder
// =============================================================================

#[derive(Debug, Default)]
struct RecorderState {
    trace: SystemState,
    pass: u64,
    passes_started: u64,
    faults_count: u64,
}

/// Shared trace of a simulation run
///
/// Clones append to the same trace.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next pass; callbacks from now on belong to it
    pub fn begin_pass(&self) -> u64 {
        let mut state = lock(&self.state);
        state.pass = state.passes_started;
        state.passes_started += 1;
        state.faults_count = 0;
        state.pass
    }

    /// Record the outcome of the current pass
    pub fn finish_pass(&self, stage: ActivationStage, outcome: Outcome) {
        let mut state = lock(&self.state);
        let record = PassRecord {
            pass: state.pass,
            stage,
            outcome,
            faults_count: state.faults_count,
        };
        state.trace.passes.push(record);
        state.faults_count = 0;
    }

    pub fn current_pass(&self) -> u64 {
        lock(&self.state).pass
    }

    pub fn record(&self, entity: &Address, stage: ActivationStage) {
        let mut state = lock(&self.state);
        let pass = state.pass;
        state.trace.events.push(LifecycleEvent {
            entity: entity.clone(),
            stage,
            pass,
        });
    }

    pub fn note_fault(&self) {
        lock(&self.state).faults_count += 1;
    }

    pub fn note_delivery(&self, entity: &Address, created_at_ms: Vec<u64>) {
        let mut state = lock(&self.state);
        let pass = state.pass;
        state.trace.deliveries.push(Delivery {
            entity: entity.clone(),
            pass,
            created_at_ms,
        });
    }

    pub fn note_phase_error(&self, entity: &Address, error: &Error) {
        lock(&self.state)
            .trace
            .phase_errors
            .push(format!("{}: {}", entity, error));
    }

    /// Copy of the trace so far
    pub fn snapshot(&self) -> SystemState {
        lock(&self.state).trace.clone()
    }
}

// =============================================================================
// SimDirectory
// =============================================================================

/// Address book routing messages to agent mailboxes
#[derive(Clone, Default)]
pub struct SimDirectory {
    mailboxes: Arc<Mutex<BTreeMap<Address, Arc<StagedMailbox<Envelope>>>>>,
    dropped_count: Arc<AtomicU64>,
}

impl SimDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: Address, mailbox: Arc<StagedMailbox<Envelope>>) {
        lock(&self.mailboxes).insert(address, mailbox);
    }

    pub fn unregister(&self, address: &Address) -> bool {
        lock(&self.mailboxes).remove(address).is_some()
    }

    /// Registered addresses in order
    pub fn addresses(&self) -> Vec<Address> {
        lock(&self.mailboxes).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.mailboxes).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.mailboxes).is_empty()
    }

    /// Deliver to the receiver's buffer
    ///
    /// Returns false when the receiver is unknown or its mailbox is full.
    pub fn post(&self, envelope: Envelope) -> bool {
        let Some(receiver) = envelope.receiver.clone() else {
            self.dropped_count.fetch_add(1, Ordering::SeqCst);
            return false;
        };
        let Some(mailbox) = lock(&self.mailboxes).get(&receiver).cloned() else {
            self.dropped_count.fetch_add(1, Ordering::SeqCst);
            return false;
        };

        match mailbox.add(envelope) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(receiver = %receiver, error = %error, "Message dropped");
                self.dropped_count.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Messages that never reached a mailbox
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SimDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDirectory")
            .field("agents", &self.len())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

// =============================================================================
// SimAgent
// =============================================================================

/// What every agent of a simulation shares
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub directory: SimDirectory,
    pub faults: Arc<FaultInjector>,
    pub rng: DeterministicRng,
    pub io: IoContext,
    pub recorder: TraceRecorder,
    /// Probability of posting a message on each LIVE callback
    pub send_probability: f64,
}

/// Agent recording its lifecycle and exchanging messages
pub struct SimAgent {
    address: Address,
    mailbox: Arc<StagedMailbox<Envelope>>,
    context: AgentContext,
    phase: Mutex<LifecyclePhase>,
    leaving: AtomicBool,
    sent_count: AtomicU64,
    received_count: AtomicU64,
}

impl SimAgent {
    /// Create an agent and register its mailbox
    pub fn new(address: Address, context: &AgentContext) -> Arc<Self> {
        debug_assert!((0.0..=1.0).contains(&context.send_probability));

        let mailbox = Arc::new(StagedMailbox::new());
        context.directory.register(address.clone(), mailbox.clone());

        Arc::new(Self {
            address,
            mailbox,
            context: context.clone(),
            phase: Mutex::new(LifecyclePhase::NotStarted),
            leaving: AtomicBool::new(false),
            sent_count: AtomicU64::new(0),
            received_count: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn phase(&self) -> LifecyclePhase {
        *lock(&self.phase)
    }

    pub fn mailbox(&self) -> &Arc<StagedMailbox<Envelope>> {
        &self.mailbox
    }

    /// Whether the agent asked to leave since the last call
    pub fn take_leave(&self) -> bool {
        self.leaving.swap(false, Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::SeqCst)
    }

    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::SeqCst)
    }

    /// Record the callback, then advance the phase it implies
    fn enter(&self, stage: ActivationStage) {
        self.context.recorder.record(&self.address, stage);

        let mut phase = lock(&self.phase);
        if !phase.accepts(stage) {
            let error = Error::InvalidStageTransition {
                from: phase.to_string(),
                to: stage.to_string(),
            };
            self.context.recorder.note_phase_error(&self.address, &error);
            return;
        }

        let next = match stage {
            ActivationStage::Initialization => LifecyclePhase::Active,
            ActivationStage::Live => return,
            ActivationStage::Destruction => LifecyclePhase::Terminated,
        };
        match phase.transition_to(next) {
            Ok(next) => *phase = next,
            Err(error) => self.context.recorder.note_phase_error(&self.address, &error),
        }
    }

    /// Apply a callback fault, if one is injected
    fn inject(&self, stage: ActivationStage) -> Result<()> {
        let operation = format!("callback:{}", stage.name());
        match self.context.faults.should_inject(&operation) {
            Some(FaultType::CallbackError) => {
                self.context.recorder.note_fault();
                Err(Error::callback_failed(
                    self.address.as_str(),
                    stage.name(),
                    "injected fault",
                ))
            }
            Some(FaultType::CallbackPanic) => {
                self.context.recorder.note_fault();
                panic!("injected panic in {} of {}", stage, self.address);
            }
            _ => Ok(()),
        }
    }

    fn drain(&self) -> usize {
        self.mailbox.synchronize();
        let created_at_ms: Vec<u64> = self
            .mailbox
            .iter(true)
            .map(|envelope| envelope.created_at_ms)
            .collect();

        let drained = created_at_ms.len();
        if drained > 0 {
            self.received_count.fetch_add(drained as u64, Ordering::SeqCst);
            self.context.recorder.note_delivery(&self.address, created_at_ms);
        }
        drained
    }

    fn maybe_send(&self) {
        if !self.context.rng.next_bool(self.context.send_probability) {
            return;
        }

        let peers: Vec<Address> = self
            .context
            .directory
            .addresses()
            .into_iter()
            .filter(|peer| peer != &self.address)
            .collect();
        let Some(peer) = self.context.rng.choose(&peers) else {
            return;
        };

        let mut envelope = Envelope::new_with_io(
            self.address.clone(),
            MESSAGE_KIND_PING,
            Bytes::new(),
            &self.context.io,
        )
        .with_receiver(peer.clone());

        match self.context.faults.should_inject(OPERATION_SEND) {
            Some(FaultType::MessageDrop) => return,
            Some(FaultType::MessageReorder { skew_ms }) => {
                let created_at_ms = envelope.created_at_ms.saturating_sub(skew_ms);
                envelope = envelope.with_created_at_ms(created_at_ms);
            }
            _ => {}
        }

        if self.context.directory.post(envelope) {
            self.sent_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Activable for SimAgent {
    fn activate(&self, _params: &ActivationParams) -> Result<Outcome> {
        self.enter(ActivationStage::Initialization);
        self.inject(ActivationStage::Initialization)?;
        Ok(Outcome::ok(self.address.as_str()))
    }

    fn live(&self) -> Result<Outcome> {
        self.enter(ActivationStage::Live);
        self.inject(ActivationStage::Live)?;

        let drained = self.drain();
        self.maybe_send();

        if self.context.faults.should_inject(OPERATION_LEAVE) == Some(FaultType::AgentLeave) {
            self.leaving.store(true, Ordering::SeqCst);
        }

        if drained > BACKLOG_WARNING_COUNT {
            return Ok(Outcome::warning(
                self.address.as_str(),
                format!("{} messages in one pass", drained),
            ));
        }
        Ok(Outcome::ok(self.address.as_str()))
    }

    fn end(&self) -> Result<Outcome> {
        self.enter(ActivationStage::Destruction);
        self.context.directory.unregister(&self.address);
        self.inject(ActivationStage::Destruction)?;
        Ok(Outcome::ok(self.address.as_str()))
    }
}

impl fmt::Debug for SimAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimAgent")
            .field("address", &self.address)
            .field("phase", &self.phase())
            .field("sent", &self.sent_count())
            .field("received", &self.received_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::fault::{FaultConfig, FaultInjectorBuilder};
    use crate::time::SimTime;

    fn context(faults: FaultInjector, send_probability: f64) -> AgentContext {
        let rng = DeterministicRng::new(42);
        let time = Arc::new(SimTime::new(SimClock::from_millis(1000)));
        AgentContext {
            directory: SimDirectory::new(),
            faults: Arc::new(faults),
            rng: rng.clone(),
            io: IoContext::new(time, Arc::new(rng)),
            recorder: TraceRecorder::new(),
            send_probability,
        }
    }

    fn quiet() -> FaultInjector {
        FaultInjector::new(DeterministicRng::new(0))
    }

    fn address(name: &str) -> Address {
        Address::new(name).unwrap()
    }

    #[test]
    fn test_agent_records_lifecycle() {
        let context = context(quiet(), 0.0);
        let agent = SimAgent::new(address("a"), &context);

        context.recorder.begin_pass();
        agent.activate(&ActivationParams::empty()).unwrap();
        context.recorder.begin_pass();
        agent.live().unwrap();
        context.recorder.begin_pass();
        agent.end().unwrap();

        let trace = context.recorder.snapshot();
        let stages: Vec<_> = trace.events.iter().map(|e| (e.stage, e.pass)).collect();
        assert_eq!(
            stages,
            vec![
                (ActivationStage::Initialization, 0),
                (ActivationStage::Live, 1),
                (ActivationStage::Destruction, 2),
            ]
        );
        assert!(trace.phase_errors.is_empty());
        assert_eq!(agent.phase(), LifecyclePhase::Terminated);
        assert!(context.directory.is_empty());
    }

    #[test]
    fn test_agent_detects_live_after_end() {
        let context = context(quiet(), 0.0);
        let agent = SimAgent::new(address("a"), &context);

        agent.activate(&ActivationParams::empty()).unwrap();
        agent.end().unwrap();
        agent.live().unwrap();

        assert_eq!(context.recorder.snapshot().phase_errors.len(), 1);
    }

    #[test]
    fn test_agents_exchange_messages() {
        let context = context(quiet(), 1.0);
        let a = SimAgent::new(address("a"), &context);
        let b = SimAgent::new(address("b"), &context);
        for agent in [&a, &b] {
            agent.activate(&ActivationParams::empty()).unwrap();
        }

        a.live().unwrap();
        assert_eq!(a.sent_count(), 1);
        assert_eq!(b.mailbox().buffer_len(), 1);

        b.live().unwrap();
        assert_eq!(b.received_count(), 1);
        assert_eq!(context.recorder.snapshot().deliveries.len(), 1);
    }

    #[test]
    fn test_injected_error_is_noted() {
        let faults = FaultInjectorBuilder::new(DeterministicRng::new(1))
            .with_fault(
                FaultConfig::new(FaultType::CallbackError, 1.0).with_filter("callback:live"),
            )
            .build();
        let context = context(faults, 0.0);
        let agent = SimAgent::new(address("a"), &context);

        context.recorder.begin_pass();
        agent.activate(&ActivationParams::empty()).unwrap();
        assert!(agent.live().is_err());

        context
            .recorder
            .finish_pass(ActivationStage::Live, Outcome::error("root", "boom"));
        assert_eq!(context.recorder.snapshot().passes[0].faults_count, 1);
    }

    #[test]
    fn test_dropped_message_never_arrives() {
        let faults = FaultInjectorBuilder::new(DeterministicRng::new(1))
            .with_fault(
                FaultConfig::new(FaultType::MessageDrop, 1.0).with_filter(OPERATION_SEND),
            )
            .build();
        let context = context(faults, 1.0);
        let a = SimAgent::new(address("a"), &context);
        let b = SimAgent::new(address("b"), &context);
        a.activate(&ActivationParams::empty()).unwrap();

        a.live().unwrap();

        assert_eq!(a.sent_count(), 0);
        assert!(b.mailbox().is_buffer_empty());
    }

    #[test]
    fn test_post_to_unknown_receiver() {
        let directory = SimDirectory::new();
        let envelope =
            Envelope::new(address("a"), "ping", Bytes::new()).with_receiver(address("z"));

        assert!(!directory.post(envelope));
        assert_eq!(directory.dropped_count(), 1);
    }
}
