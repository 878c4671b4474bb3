//! Activation engine
//!
//! TigerStyle: Explicit lifecycle phases, fault isolation at the driver boundary.
//!
//! An [`Activator`] drives the three-stage lifecycle of the entities held in
//! its [`StagedCollection`]:
//!
//! ```text
//!   NotStarted ──activate──► Active ──live (0..n)──► Active ──end──► Terminated
//!        │                                                            ▲
//!        └──────────── removed before activation (no callback) ───────┘
//! ```
//!
//! Every pass synchronizes the collection, asks the execution policy for an
//! order over a cursor snapshot, invokes the stage callback on each member and
//! folds the per-member outcomes into one packed [`Outcome`]. A callback that
//! returns `Err` or panics yields an `ERROR` outcome naming the activator; the
//! rest of the pass still runs.
//!
//! Members that join while the activator is running are initialized when the
//! fold that makes them visible happens; members that leave are destroyed the
//! same way. Those outcomes are reported by the next pass.

use crate::staged::{
    Cursor, ListenerId, StagedCollection, StagedListener, StagedOptions, StagedView,
};
use holon_core::constants::{COLLECTION_MEMBERS_COUNT_MAX, SCHEDULER_PARTITIONS_COUNT_MAX};
use holon_core::error::{Error, Result};
use holon_core::logging::{Logger, LoggerProvider};
use holon_core::metrics;
use holon_core::outcome::{MultipleOutcome, Outcome, Severity};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Parameters, stages and phases
// =============================================================================

/// Opaque activation parameters, passed through from the registrar
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationParams(Arc<[Value]>);

impl Default for ActivationParams {
    fn default() -> Self {
        Self::empty()
    }
}

impl ActivationParams {
    pub fn new(values: Vec<Value>) -> Self {
        Self(Arc::from(values))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserialize the parameter at `index`
    pub fn decode<T: DeserializeOwned>(&self, index: usize) -> Option<T> {
        self.get(index)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for ActivationParams {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Lifecycle stage driven by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationStage {
    Initialization,
    Live,
    Destruction,
}

impl ActivationStage {
    pub fn name(self) -> &'static str {
        match self {
            ActivationStage::Initialization => "initialization",
            ActivationStage::Live => "live",
            ActivationStage::Destruction => "destruction",
        }
    }
}

impl fmt::Display for ActivationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle phase of one member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Registered, `activate` not called yet
    #[default]
    NotStarted = 0,
    /// `activate` called; `live` may be called
    Active = 1,
    /// `end` called, or removed before activation
    Terminated = 2,
}

impl LifecyclePhase {
    /// Check if transition to the given phase is valid
    pub fn can_transition_to(&self, next: LifecyclePhase) -> bool {
        matches!(
            (self, next),
            (LifecyclePhase::NotStarted, LifecyclePhase::Active)
                | (LifecyclePhase::Active, LifecyclePhase::Terminated)
                | (LifecyclePhase::NotStarted, LifecyclePhase::Terminated)
        )
    }

    /// Validated transition
    ///
    /// # Errors
    /// Returns `InvalidStageTransition` when `next` cannot follow `self`.
    pub fn transition_to(self, next: LifecyclePhase) -> Result<LifecyclePhase> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidStageTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }

    /// Whether the callback of `stage` may run in this phase
    pub fn accepts(&self, stage: ActivationStage) -> bool {
        matches!(
            (self, stage),
            (LifecyclePhase::NotStarted, ActivationStage::Initialization)
                | (LifecyclePhase::Active, ActivationStage::Live)
                | (LifecyclePhase::Active, ActivationStage::Destruction)
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecyclePhase::NotStarted,
            1 => LifecyclePhase::Active,
            _ => LifecyclePhase::Terminated,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::NotStarted => write!(f, "not_started"),
            LifecyclePhase::Active => write!(f, "active"),
            LifecyclePhase::Terminated => write!(f, "terminated"),
        }
    }
}

// =============================================================================
// Activable
// =============================================================================

/// Anything with an initialization, live, destruction lifecycle
///
/// Callbacks must return promptly: a pass advances synchronously through every
/// member. Faults are reported by returning `Err` (or by panicking) and are
/// turned into `ERROR` outcomes by the driving activator.
pub trait Activable: Send + Sync {
    /// Called once, on the first pass after registration
    fn activate(&self, params: &ActivationParams) -> Result<Outcome>;

    /// Called once per tick while registered and active
    fn live(&self) -> Result<Outcome>;

    /// Called once, when the entity is being unregistered
    fn end(&self) -> Result<Outcome>;
}

// =============================================================================
// Member
// =============================================================================

/// Registered entity plus its lifecycle phase
///
/// Two members are equal when they wrap the same allocation.
pub struct Member<E: ?Sized> {
    entity: Arc<E>,
    phase: Arc<AtomicU8>,
}

impl<E: ?Sized> Member<E> {
    pub fn new(entity: Arc<E>) -> Self {
        Self {
            entity,
            phase: Arc::new(AtomicU8::new(LifecyclePhase::NotStarted as u8)),
        }
    }

    pub fn entity(&self) -> &Arc<E> {
        &self.entity
    }

    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`; false if the member is not in `from`
    fn transition(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        debug_assert!(from.can_transition_to(to), "invalid transition {} -> {}", from, to);
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl<E: ?Sized> Clone for Member<E> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            phase: self.phase.clone(),
        }
    }
}

impl<E: ?Sized> PartialEq for Member<E> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.entity) as *const (),
            Arc::as_ptr(&other.entity) as *const (),
        )
    }
}

impl<E: ?Sized> fmt::Debug for Member<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("entity", &(Arc::as_ptr(&self.entity) as *const ()))
            .field("phase", &self.phase())
            .finish()
    }
}

// =============================================================================
// Execution policies
// =============================================================================

/// Chooses the order in which a pass visits the members
pub type ExecutionPolicy<E> =
    Arc<dyn Fn(ActivationStage, &[Member<E>]) -> Vec<Member<E>> + Send + Sync>;

/// Collection order (the default)
pub fn insertion_order<E: ?Sized + 'static>() -> ExecutionPolicy<E> {
    Arc::new(|_stage, members: &[Member<E>]| members.to_vec())
}

/// Reverse collection order
pub fn reverse_order<E: ?Sized + 'static>() -> ExecutionPolicy<E> {
    Arc::new(|_stage, members: &[Member<E>]| members.iter().rev().cloned().collect())
}

/// Collection order, starting one member further on every pass
pub fn round_robin<E: ?Sized + 'static>() -> ExecutionPolicy<E> {
    let offset = Arc::new(AtomicUsize::new(0));
    Arc::new(move |_stage, members: &[Member<E>]| {
        if members.is_empty() {
            return Vec::new();
        }
        let start = offset.fetch_add(1, Ordering::Relaxed) % members.len();
        members[start..]
            .iter()
            .chain(members[..start].iter())
            .cloned()
            .collect()
    })
}

/// Ascending `key` order, ties kept in collection order
pub fn ordered_by<E, K, F>(key: F) -> ExecutionPolicy<E>
where
    E: ?Sized + 'static,
    K: Ord,
    F: Fn(&E) -> K + Send + Sync + 'static,
{
    Arc::new(move |_stage, members: &[Member<E>]| {
        let mut ordered = members.to_vec();
        ordered.sort_by_key(|member| key(member.entity()));
        ordered
    })
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters kept by an activator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationStats {
    /// Passes run, any stage
    pub passes_count: u64,
    /// Callbacks that returned `Err` or panicked
    pub faults_count: u64,
    /// Callbacks invoked
    pub callbacks_count: u64,
    /// Severity of the last packed pass outcome
    pub last_severity: Option<Severity>,
}

// =============================================================================
// Activator
// =============================================================================

struct ActivatorInner<E: ?Sized> {
    name: Arc<str>,
    members: StagedCollection<Member<E>>,
    used: AtomicBool,
    running: AtomicBool,
    params: Mutex<ActivationParams>,
    logger: Mutex<Option<Weak<dyn LoggerProvider>>>,
    policy: Mutex<ExecutionPolicy<E>>,
    stats: Mutex<ActivationStats>,
    /// Outcomes of joins and leaves, reported by the next pass
    deferred: Mutex<Vec<Outcome>>,
    listener: Mutex<Option<ListenerId>>,
    /// Serializes passes and synchronizations
    pass_lock: Mutex<()>,
}

impl<E: Activable + ?Sized + 'static> ActivatorInner<E> {
    /// Destroy the members on their way out, then fold
    fn sync(&self) {
        let leaving = self.members.leaving();
        if !leaving.is_empty() {
            let params = self.params();
            for member in &leaving {
                if let Some(outcome) = self.invoke(ActivationStage::Destruction, member, &params) {
                    self.defer(outcome);
                }
            }
        }
        self.members.synchronize();
    }

    fn params(&self) -> ActivationParams {
        lock(&self.params).clone()
    }

    /// Run the callback of `stage` on `member` if its phase allows it
    fn invoke(
        &self,
        stage: ActivationStage,
        member: &Member<E>,
        params: &ActivationParams,
    ) -> Option<Outcome> {
        match stage {
            ActivationStage::Initialization => {
                if !member.transition(LifecyclePhase::NotStarted, LifecyclePhase::Active) {
                    return None;
                }
            }
            ActivationStage::Live => {
                if !member.phase().accepts(ActivationStage::Live) {
                    return None;
                }
            }
            ActivationStage::Destruction => {
                // Never activated: retire without calling `end`
                if member.transition(LifecyclePhase::NotStarted, LifecyclePhase::Terminated) {
                    return None;
                }
                if !member.transition(LifecyclePhase::Active, LifecyclePhase::Terminated) {
                    return None;
                }
            }
        }

        let entity = member.entity();
        let result = panic::catch_unwind(AssertUnwindSafe(|| match stage {
            ActivationStage::Initialization => entity.activate(params),
            ActivationStage::Live => entity.live(),
            ActivationStage::Destruction => entity.end(),
        }));
        lock(&self.stats).callbacks_count += 1;

        Some(match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => self.fault(stage, error.to_string()),
            Err(payload) => self.fault(stage, format!("panic: {}", panic_text(payload.as_ref()))),
        })
    }

    fn fault(&self, stage: ActivationStage, fault: String) -> Outcome {
        warn!(provider = %self.name, stage = %stage, fault = %fault, "Member callback failed");
        metrics::record_member_fault(stage.name());
        lock(&self.stats).faults_count += 1;
        Outcome::error(self.name.clone(), fault)
    }

    fn defer(&self, outcome: Outcome) {
        lock(&self.deferred).push(outcome);
    }

    fn take_deferred(&self) -> Vec<Outcome> {
        std::mem::take(&mut *lock(&self.deferred))
    }

    fn policy(&self) -> ExecutionPolicy<E> {
        lock(&self.policy).clone()
    }

    /// One pass; the caller holds `pass_lock`
    fn pass(&self, stage: ActivationStage, params: &ActivationParams) -> Outcome {
        let started = Instant::now();
        self.sync();

        let cursor = self.members.iter();
        let ordered = (self.policy())(stage, cursor.as_slice());
        debug_assert!(ordered.len() <= cursor.total_len());

        let mut outcome: MultipleOutcome = self.take_deferred().into_iter().collect();
        for member in &ordered {
            if let Some(member_outcome) = self.invoke(stage, member, params) {
                outcome.push(member_outcome);
            }
        }
        drop(cursor);

        self.finish(stage, outcome, ordered.len(), started)
    }

    fn finish(
        &self,
        stage: ActivationStage,
        outcome: MultipleOutcome,
        members_count: usize,
        started: Instant,
    ) -> Outcome {
        let packed = Outcome::Multiple(outcome).pack(&self.name);

        {
            let mut stats = lock(&self.stats);
            stats.passes_count += 1;
            stats.last_severity = Some(packed.severity());
        }
        metrics::record_pass(
            stage.name(),
            packed.severity().name(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            provider = %self.name,
            stage = %stage,
            members = members_count,
            severity = %packed.severity(),
            "Pass complete"
        );

        packed
    }
}

/// Runs INIT on members that join a running activator and DESTROY on members
/// that leave it
struct MembershipListener<E: ?Sized> {
    inner: Weak<ActivatorInner<E>>,
}

impl<E: Activable + ?Sized + 'static> StagedListener<Member<E>> for MembershipListener<E> {
    fn on_added(&self, added: &[Member<E>]) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if !inner.running.load(Ordering::SeqCst) {
            return;
        }

        let params = inner.params();
        for member in added {
            if let Some(outcome) = inner.invoke(ActivationStage::Initialization, member, &params) {
                inner.defer(outcome);
            }
        }
    }

    fn on_removed(&self, removed: &[Member<E>]) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let params = inner.params();
        for member in removed {
            if let Some(outcome) = inner.invoke(ActivationStage::Destruction, member, &params) {
                inner.defer(outcome);
            }
        }
    }
}

/// Driver of the lifecycle of a collection of entities
///
/// Membership changes are buffered until the next pass (or `sync`). Passes of
/// one activator are serialized and are not reentrant: a member callback must
/// not drive a pass of its own activator.
pub struct Activator<E: ?Sized> {
    inner: Arc<ActivatorInner<E>>,
}

impl<E: Activable + ?Sized + 'static> Activator<E> {
    /// Create an activator visiting members in insertion order
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_members_count_max(name, COLLECTION_MEMBERS_COUNT_MAX)
    }

    /// Create an activator holding at most `members_count_max` members
    pub fn with_members_count_max(name: impl Into<Arc<str>>, members_count_max: usize) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "activator name must not be empty");

        let options = StagedOptions::new()
            .with_auto_apply(false)
            .with_members_count_max(members_count_max);

        let activator = Self {
            inner: Arc::new(ActivatorInner {
                name,
                members: StagedCollection::with_options(options),
                used: AtomicBool::new(false),
                running: AtomicBool::new(false),
                params: Mutex::new(ActivationParams::empty()),
                logger: Mutex::new(None),
                policy: Mutex::new(insertion_order()),
                stats: Mutex::new(ActivationStats::default()),
                deferred: Mutex::new(Vec::new()),
                listener: Mutex::new(None),
                pass_lock: Mutex::new(()),
            }),
        };
        activator.attach_listener();
        activator
    }

    /// Replace the execution policy
    pub fn with_policy(self, policy: ExecutionPolicy<E>) -> Self {
        self.set_policy(policy);
        self
    }

    pub fn set_policy(&self, policy: ExecutionPolicy<E>) {
        *lock(&self.inner.policy) = policy;
    }

    fn attach_listener(&self) {
        let mut listener = lock(&self.inner.listener);
        if listener.is_none() {
            let membership = MembershipListener {
                inner: Arc::downgrade(&self.inner),
            };
            *listener = Some(self.inner.members.add_listener(Arc::new(membership)));
        }
    }

    fn detach_listener(&self) {
        if let Some(id) = lock(&self.inner.listener).take() {
            self.inner.members.remove_listener(id);
        }
    }

    fn lock_pass(&self) -> MutexGuard<'_, ()> {
        lock(&self.inner.pass_lock)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register an entity; visible from the next pass
    ///
    /// Returns `Ok(false)` when the entity is already registered.
    pub fn add_member(&self, entity: Arc<E>) -> Result<bool> {
        let added = self.inner.members.add(Member::new(entity))?;
        if added {
            self.inner.used.store(true, Ordering::SeqCst);
        }
        Ok(added)
    }

    /// Unregister an entity; it is destroyed at the next pass
    pub fn remove_member(&self, entity: &Arc<E>) -> bool {
        self.inner.members.remove(&Member::new(entity.clone()))
    }

    /// Unregister every entity
    pub fn remove_all_members(&self) {
        self.inner.members.clear();
    }

    /// Live members
    pub fn members(&self) -> Vec<Arc<E>> {
        self.inner
            .members
            .snapshot()
            .iter()
            .map(|member| member.entity().clone())
            .collect()
    }

    /// Cursor over the live members
    pub fn cursor(&self) -> Cursor<Member<E>> {
        self.inner.members.iter()
    }

    /// Live members followed by the registrations still pending
    pub fn view(&self) -> StagedView<Member<E>> {
        self.inner.members.view()
    }

    /// Observe the batches folded into the membership
    pub fn add_membership_listener(
        &self,
        listener: Arc<dyn StagedListener<Member<E>>>,
    ) -> ListenerId {
        self.inner.members.add_listener(listener)
    }

    /// Phase of a live member
    pub fn phase_of(&self, entity: &Arc<E>) -> Option<LifecyclePhase> {
        let key = Member::new(entity.clone());
        self.inner
            .members
            .snapshot()
            .iter()
            .find(|member| **member == key)
            .map(Member::phase)
    }

    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.members.has_pending()
    }

    /// Set the logger provider; only a weak reference is kept
    pub fn set_logger_provider(&self, provider: &Arc<dyn LoggerProvider>) {
        *lock(&self.inner.logger) = Some(Arc::downgrade(provider));
    }

    /// Logger of the provider, or the anonymous logger
    pub fn logger(&self) -> Logger {
        lock(&self.inner.logger)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|provider| provider.logger())
            .unwrap_or_else(Logger::anonymous)
    }

    pub fn stats(&self) -> ActivationStats {
        lock(&self.inner.stats).clone()
    }

    /// Parameters passed to the last `activate`
    pub fn params(&self) -> ActivationParams {
        self.inner.params()
    }

    /// Whether the activator is between `activate` and `end`
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn run_activate(&self, params: &ActivationParams) -> Outcome {
        let _pass = self.lock_pass();
        *lock(&self.inner.params) = params.clone();
        self.attach_listener();
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.pass(ActivationStage::Initialization, params)
    }

    fn run_live(&self) -> Outcome {
        let _pass = self.lock_pass();
        let params = self.inner.params();
        self.inner.pass(ActivationStage::Live, &params)
    }

    fn run_end(&self) -> Outcome {
        let _pass = self.lock_pass();
        self.inner.running.store(false, Ordering::SeqCst);
        let params = self.inner.params();
        let outcome = self.inner.pass(ActivationStage::Destruction, &params);

        // Every member has been destroyed; drop them without notifying
        self.detach_listener();
        self.inner.members.clear();
        self.inner.members.synchronize();

        outcome
    }

    /// LIVE pass with members split over `partitions` scoped threads
    ///
    /// Each thread takes a contiguous range of the ordered snapshot; outcomes
    /// are folded in positional order.
    pub fn live_partitioned(&self, partitions: usize) -> Outcome {
        debug_assert!(partitions > 0);
        debug_assert!(partitions <= SCHEDULER_PARTITIONS_COUNT_MAX);

        let partitions = partitions.clamp(1, SCHEDULER_PARTITIONS_COUNT_MAX);
        if partitions == 1 {
            return self.run_live();
        }

        let _pass = self.lock_pass();
        let started = Instant::now();
        let inner = &self.inner;
        inner.sync();

        let cursor = inner.members.iter();
        let ordered = (inner.policy())(ActivationStage::Live, cursor.as_slice());
        let params = inner.params();
        let chunk_len = ordered.len().div_ceil(partitions).max(1);

        let partitioned: Vec<Outcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = ordered
                .chunks(chunk_len)
                .map(|chunk| {
                    let params = &params;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .filter_map(|member| {
                                inner.invoke(ActivationStage::Live, member, params)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(outcomes) => outcomes,
                    Err(payload) => vec![inner.fault(
                        ActivationStage::Live,
                        format!("partition panic: {}", panic_text(payload.as_ref())),
                    )],
                })
                .collect()
        });
        drop(cursor);

        let mut outcome: MultipleOutcome = inner.take_deferred().into_iter().collect();
        outcome.extend(partitioned);
        inner.finish(ActivationStage::Live, outcome, ordered.len(), started)
    }
}

impl<E: Activable + ?Sized + 'static> Activable for Activator<E> {
    fn activate(&self, params: &ActivationParams) -> Result<Outcome> {
        Ok(self.run_activate(params))
    }

    fn live(&self) -> Result<Outcome> {
        Ok(self.run_live())
    }

    fn end(&self) -> Result<Outcome> {
        Ok(self.run_end())
    }
}

impl<E: ?Sized> fmt::Debug for Activator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("name", &self.inner.name)
            .field("members", &self.inner.members)
            .field("used", &self.inner.used.load(Ordering::SeqCst))
            .finish()
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// ActivatorNode
// =============================================================================

/// A node of the activator tree: an activator or a scheduler of activators
pub trait ActivatorNode: Activable {
    fn name(&self) -> &str;

    /// Fold pending membership changes
    fn sync(&self);

    /// Whether the node holds something to drive, after synchronizing
    fn has_activable(&self) -> bool;

    /// Sticky: whether the node ever held an entity
    fn is_used(&self) -> bool;

    /// Logger used to report this node's outcomes
    fn logger(&self) -> Logger;

    /// LIVE pass over `partitions` threads; sequential by default
    fn live_partitioned(&self, partitions: usize) -> Outcome {
        debug_assert!(partitions > 0);
        self.live()
            .unwrap_or_else(|error| Outcome::error(self.name().to_string(), error.to_string()))
    }
}

impl<E: Activable + ?Sized + 'static> ActivatorNode for Activator<E> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn sync(&self) {
        let _pass = self.lock_pass();
        self.inner.sync();
    }

    fn has_activable(&self) -> bool {
        ActivatorNode::sync(self);
        !self.inner.members.is_empty()
    }

    fn is_used(&self) -> bool {
        self.inner.used.load(Ordering::SeqCst)
    }

    fn logger(&self) -> Logger {
        Activator::logger(self)
    }

    fn live_partitioned(&self, partitions: usize) -> Outcome {
        Activator::live_partitioned(self, partitions)
    }
}
