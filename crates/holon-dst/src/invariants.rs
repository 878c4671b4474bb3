//! Kernel invariants over recorded simulation traces
//!
//! TigerStyle: Each invariant names one safety property, violations carry evidence.
//!
//! Simulated agents append what happened to them to a [`SystemState`]: the
//! lifecycle callbacks they received, the pass each callback belonged to, and
//! the creation times of the messages they consumed. The harness appends the
//! outcome of every pass. Invariants are checked against that trace once the
//! run is over, or after any pass.
//!
//! # Example
//!
//! ```rust,ignore
//! let checker = InvariantChecker::new().with_standard_invariants();
//! checker.verify_all(&recorder.snapshot())?;
//! ```

use holon_core::address::Address;
use holon_core::outcome::{Outcome, Severity};
use holon_runtime::activation::{ActivationStage, LifecyclePhase};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Core Types
// =============================================================================

/// A failed invariant, with what the checker saw
#[derive(Error, Debug, Clone)]
#[error("Invariant '{name}' violated: {message}")]
pub struct InvariantViolation {
    pub name: String,
    pub message: String,
    pub evidence: Option<String>,
}

impl InvariantViolation {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(
        name: impl Into<String>,
        message: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            evidence: Some(evidence.into()),
        }
    }
}

/// One stage callback received by an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub entity: Address,
    pub stage: ActivationStage,
    /// Pass during which the callback ran
    pub pass: u64,
}

/// One kernel pass and what it reported
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub pass: u64,
    pub stage: ActivationStage,
    pub outcome: Outcome,
    /// Callback faults injected since the previous pass ended
    pub faults_count: u64,
}

/// Messages one entity consumed in one drain of its mailbox
#[derive(Debug, Clone)]
pub struct Delivery {
    pub entity: Address,
    pub pass: u64,
    pub created_at_ms: Vec<u64>,
}

/// Trace of a simulation run
#[derive(Debug, Clone, Default)]
pub struct SystemState {
    pub events: Vec<LifecycleEvent>,
    pub passes: Vec<PassRecord>,
    pub deliveries: Vec<Delivery>,
    /// Transitions an entity observed as invalid from its own side
    pub phase_errors: Vec<String>,
}

impl SystemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks received by `entity`, in order
    pub fn events_of<'a>(
        &'a self,
        entity: &'a Address,
    ) -> impl Iterator<Item = &'a LifecycleEvent> + 'a {
        self.events.iter().filter(move |event| &event.entity == entity)
    }

    /// Number of callbacks of `stage` received by all entities
    pub fn count_of(&self, stage: ActivationStage) -> usize {
        self.events.iter().filter(|e| e.stage == stage).count()
    }

    /// Every entity that received at least one callback
    pub fn entities(&self) -> BTreeSet<Address> {
        self.events.iter().map(|e| e.entity.clone()).collect()
    }
}

/// A safety property of the kernel
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation>;
}

/// Checks several invariants against a trace
pub struct InvariantChecker {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    pub fn with_invariant(mut self, invariant: impl Invariant + 'static) -> Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Every kernel invariant
    pub fn with_standard_invariants(self) -> Self {
        self.with_invariant(StageOrdering)
            .with_invariant(SingleLivePerPass)
            .with_invariant(EveryActiveEntityLives)
            .with_invariant(OutcomeOrdering)
            .with_invariant(PackIdempotence)
            .with_invariant(FaultsSurface)
            .with_invariant(MailboxOrdering)
    }

    /// First violation, if any
    pub fn verify_all(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        for invariant in &self.invariants {
            invariant.check(state)?;
        }
        Ok(())
    }

    /// Every violation
    pub fn verify_all_collect(&self, state: &SystemState) -> Vec<InvariantViolation> {
        self.invariants
            .iter()
            .filter_map(|invariant| invariant.check(state).err())
            .collect()
    }

    pub fn invariant_names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

impl fmt::Debug for InvariantChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvariantChecker")
            .field("invariants", &self.invariant_names())
            .finish()
    }
}

// =============================================================================
// Lifecycle Invariants
// =============================================================================

/// INIT once, then LIVE any number of times, then DESTROY at most once
pub struct StageOrdering;

impl Invariant for StageOrdering {
    fn name(&self) -> &'static str {
        "StageOrdering"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        if let Some(error) = state.phase_errors.first() {
            return Err(InvariantViolation::with_evidence(
                self.name(),
                "entity observed an invalid transition",
                error.clone(),
            ));
        }

        let mut phases: BTreeMap<&Address, LifecyclePhase> = BTreeMap::new();
        for event in &state.events {
            let phase = phases.entry(&event.entity).or_default();
            let next = match (*phase, event.stage) {
                (LifecyclePhase::NotStarted, ActivationStage::Initialization) => {
                    LifecyclePhase::Active
                }
                (LifecyclePhase::Active, ActivationStage::Live) => LifecyclePhase::Active,
                (LifecyclePhase::Active, ActivationStage::Destruction) => {
                    LifecyclePhase::Terminated
                }
                (current, stage) => {
                    return Err(InvariantViolation::with_evidence(
                        self.name(),
                        format!("{} received {} while {}", event.entity, stage, current),
                        format!("pass {}", event.pass),
                    ));
                }
            };
            *phase = next;
        }
        Ok(())
    }
}

/// No entity lives twice in one pass
pub struct SingleLivePerPass;

impl Invariant for SingleLivePerPass {
    fn name(&self) -> &'static str {
        "SingleLivePerPass"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        let mut seen: BTreeSet<(u64, &Address)> = BTreeSet::new();
        for event in state.events.iter().filter(|e| e.stage == ActivationStage::Live) {
            if !seen.insert((event.pass, &event.entity)) {
                return Err(InvariantViolation::new(
                    self.name(),
                    format!("{} lived twice in pass {}", event.entity, event.pass),
                ));
            }
        }
        Ok(())
    }
}

/// Every entity initialized in an earlier pass and not destroyed lives in
/// each LIVE pass, whatever its siblings did
pub struct EveryActiveEntityLives;

impl Invariant for EveryActiveEntityLives {
    fn name(&self) -> &'static str {
        "EveryActiveEntityLives"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        let mut initialized: BTreeMap<&Address, u64> = BTreeMap::new();
        let mut destroyed: BTreeMap<&Address, u64> = BTreeMap::new();
        let mut lived: BTreeSet<(u64, &Address)> = BTreeSet::new();

        for event in &state.events {
            match event.stage {
                ActivationStage::Initialization => {
                    initialized.entry(&event.entity).or_insert(event.pass);
                }
                ActivationStage::Live => {
                    lived.insert((event.pass, &event.entity));
                }
                ActivationStage::Destruction => {
                    destroyed.entry(&event.entity).or_insert(event.pass);
                }
            }
        }

        let live_passes = state
            .passes
            .iter()
            .filter(|record| record.stage == ActivationStage::Live);
        for record in live_passes {
            for (entity, init_pass) in &initialized {
                let gone = destroyed
                    .get(entity)
                    .map_or(false, |destroy_pass| *destroy_pass <= record.pass);
                if *init_pass < record.pass && !gone && !lived.contains(&(record.pass, *entity)) {
                    return Err(InvariantViolation::with_evidence(
                        self.name(),
                        format!("{} skipped by pass {}", entity, record.pass),
                        format!("pass outcome: {}", record.outcome),
                    ));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Outcome Invariants
// =============================================================================

/// Aggregates are ordered most severe first at every level
pub struct OutcomeOrdering;

impl Invariant for OutcomeOrdering {
    fn name(&self) -> &'static str {
        "OutcomeOrdering"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        for record in &state.passes {
            let mut stack: Vec<&Outcome> = vec![&record.outcome];
            while let Some(outcome) = stack.pop() {
                let children = outcome.children();
                let sorted = children
                    .windows(2)
                    .all(|pair| pair[0].severity() >= pair[1].severity());
                if !sorted {
                    return Err(InvariantViolation::with_evidence(
                        self.name(),
                        format!("children out of order in pass {}", record.pass),
                        outcome.to_string(),
                    ));
                }
                if let Some(head) = children.first() {
                    if head.severity() != outcome.severity()
                        || head.is_failure() != outcome.is_failure()
                    {
                        return Err(InvariantViolation::with_evidence(
                            self.name(),
                            format!("head does not lead in pass {}", record.pass),
                            outcome.to_string(),
                        ));
                    }
                }
                stack.extend(children);
            }
        }
        Ok(())
    }
}

/// Pass outcomes are packed, and packing them again changes nothing
pub struct PackIdempotence;

impl Invariant for PackIdempotence {
    fn name(&self) -> &'static str {
        "PackIdempotence"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        for record in &state.passes {
            let provider = record.outcome.provider().unwrap_or("kernel");
            let once = record.outcome.pack(provider);
            if once != once.pack(provider) {
                return Err(InvariantViolation::with_evidence(
                    self.name(),
                    format!("pack is not idempotent in pass {}", record.pass),
                    record.outcome.to_string(),
                ));
            }
            let healthy = record.outcome.severity() <= Severity::Info;
            if healthy && record.outcome.children().len() > 1 {
                return Err(InvariantViolation::with_evidence(
                    self.name(),
                    format!("healthy pass {} was not collapsed", record.pass),
                    record.outcome.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A pass during which a callback faulted reports a failure
pub struct FaultsSurface;

impl Invariant for FaultsSurface {
    fn name(&self) -> &'static str {
        "FaultsSurface"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        for record in &state.passes {
            if record.faults_count > 0 && !record.outcome.is_failure() {
                return Err(InvariantViolation::with_evidence(
                    self.name(),
                    format!(
                        "{} faults hidden by pass {}",
                        record.faults_count, record.pass
                    ),
                    record.outcome.to_string(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Mailbox Invariants
// =============================================================================

/// Each drain of a mailbox yields messages in creation order
pub struct MailboxOrdering;

impl Invariant for MailboxOrdering {
    fn name(&self) -> &'static str {
        "MailboxOrdering"
    }

    fn check(&self, state: &SystemState) -> Result<(), InvariantViolation> {
        for delivery in &state.deliveries {
            if !delivery.created_at_ms.windows(2).all(|pair| pair[0] <= pair[1]) {
                return Err(InvariantViolation::with_evidence(
                    self.name(),
                    format!(
                        "{} consumed messages out of order in pass {}",
                        delivery.entity, delivery.pass
                    ),
                    format!("{:?}", delivery.created_at_ms),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holon_core::outcome::MultipleOutcome;

    fn address(name: &str) -> Address {
        Address::new(name).unwrap()
    }

    fn event(entity: &str, stage: ActivationStage, pass: u64) -> LifecycleEvent {
        LifecycleEvent {
            entity: address(entity),
            stage,
            pass,
        }
    }

    fn pass(pass: u64, stage: ActivationStage, outcome: Outcome) -> PassRecord {
        PassRecord {
            pass,
            stage,
            outcome,
            faults_count: 0,
        }
    }

    fn healthy_trace() -> SystemState {
        SystemState {
            events: vec![
                event("a", ActivationStage::Initialization, 0),
                event("b", ActivationStage::Initialization, 0),
                event("a", ActivationStage::Live, 1),
                event("b", ActivationStage::Live, 1),
                event("a", ActivationStage::Destruction, 2),
                event("b", ActivationStage::Destruction, 2),
            ],
            passes: vec![
                pass(0, ActivationStage::Initialization, Outcome::ok("root")),
                pass(1, ActivationStage::Live, Outcome::ok("root")),
                pass(2, ActivationStage::Destruction, Outcome::ok("root")),
            ],
            deliveries: vec![Delivery {
                entity: address("a"),
                pass: 1,
                created_at_ms: vec![1, 1, 5],
            }],
            phase_errors: Vec::new(),
        }
    }

    #[test]
    fn test_healthy_trace_passes() {
        let checker = InvariantChecker::new().with_standard_invariants();
        assert_eq!(checker.len(), 7);
        checker.verify_all(&healthy_trace()).unwrap();
    }

    #[test]
    fn test_live_before_init_detected() {
        let mut state = healthy_trace();
        state.events.insert(0, event("c", ActivationStage::Live, 0));

        let violation = StageOrdering.check(&state).unwrap_err();
        assert_eq!(violation.name, "StageOrdering");
    }

    #[test]
    fn test_live_after_destroy_detected() {
        let mut state = healthy_trace();
        state.events.push(event("a", ActivationStage::Live, 3));
        assert!(StageOrdering.check(&state).is_err());
    }

    #[test]
    fn test_skipped_entity_detected() {
        let mut state = healthy_trace();
        state.events.remove(3);

        let violation = EveryActiveEntityLives.check(&state).unwrap_err();
        assert!(violation.message.contains("b"));
    }

    #[test]
    fn test_double_live_detected() {
        let mut state = healthy_trace();
        state.events.insert(3, event("a", ActivationStage::Live, 1));
        assert!(SingleLivePerPass.check(&state).is_err());
    }

    #[test]
    fn test_hidden_fault_detected() {
        let mut state = healthy_trace();
        state.passes[1].faults_count = 1;
        assert!(FaultsSurface.check(&state).is_err());

        state.passes[1].outcome = Outcome::error("root", "boom");
        FaultsSurface.check(&state).unwrap();
    }

    #[test]
    fn test_uncollapsed_success_detected() {
        let mut state = healthy_trace();
        state.passes[1].outcome = MultipleOutcome::new()
            .with(Outcome::ok("a"))
            .with(Outcome::ok("b"))
            .into();
        assert!(PackIdempotence.check(&state).is_err());
    }

    #[test]
    fn test_unordered_delivery_detected() {
        let mut state = healthy_trace();
        state.deliveries[0].created_at_ms = vec![5, 1];
        assert!(MailboxOrdering.check(&state).is_err());
    }

    #[test]
    fn test_collect_reports_every_violation() {
        let mut state = healthy_trace();
        state.phase_errors.push("a: terminated -> active".into());
        state.deliveries[0].created_at_ms = vec![2, 1];

        let checker = InvariantChecker::new().with_standard_invariants();
        let violations = checker.verify_all_collect(&state);
        assert_eq!(violations.len(), 2);
    }
}
