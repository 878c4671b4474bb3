//! Scheduler of activators
//!
//! TigerStyle: Same passes one level up, sticky flags updated monotonically.
//!
//! A [`Scheduler`] is an [`Activator`] whose members are themselves
//! [`ActivatorNode`]s, so schedulers nest to any depth. Each pass delegates to
//! the children and packs their outcomes, which makes a healthy subtree report
//! a plain `OK`.

use crate::activation::{
    ActivationParams, ActivationStats, Activable, Activator, ActivatorNode, ExecutionPolicy,
    Member,
};
use crate::staged::StagedListener;
use holon_core::constants::COLLECTION_MEMBERS_COUNT_MAX;
use holon_core::error::Result;
use holon_core::logging::{Logger, LoggerProvider};
use holon_core::outcome::Outcome;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Latches the used flag when a used child leaves the membership
struct UsedLatch {
    used: Arc<AtomicBool>,
}

impl<A: ActivatorNode + ?Sized> StagedListener<Member<A>> for UsedLatch {
    fn on_removed(&self, removed: &[Member<A>]) {
        if removed.iter().any(|member| member.entity().is_used()) {
            self.used.store(true, Ordering::SeqCst);
        }
    }
}

/// Composite driver over child activators
pub struct Scheduler<A: ActivatorNode + ?Sized + 'static = dyn ActivatorNode> {
    activator: Activator<A>,
    /// Some descendant held an entity at some point
    used: Arc<AtomicBool>,
}

impl<A: ActivatorNode + ?Sized + 'static> Scheduler<A> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_activators_count_max(name, COLLECTION_MEMBERS_COUNT_MAX)
    }

    pub fn with_activators_count_max(
        name: impl Into<Arc<str>>,
        activators_count_max: usize,
    ) -> Self {
        let activator = Activator::with_members_count_max(name, activators_count_max);
        let used = Arc::new(AtomicBool::new(false));
        activator.add_membership_listener(Arc::new(UsedLatch { used: used.clone() }));

        Self { activator, used }
    }

    /// Replace the order in which children are driven
    pub fn with_policy(self, policy: ExecutionPolicy<A>) -> Self {
        self.activator.set_policy(policy);
        self
    }

    /// Register a child; it is initialized by the next pass
    pub fn add_activator(&self, activator: Arc<A>) -> Result<bool> {
        self.activator.add_member(activator)
    }

    /// Unregister a child; it is destroyed by the next pass
    pub fn remove_activator(&self, activator: &Arc<A>) -> bool {
        self.remember_used(activator);
        self.activator.remove_member(activator)
    }

    /// Unregister every child
    pub fn remove_all(&self) {
        for member in self.activator.view().queued() {
            self.remember_used(member.entity());
        }
        self.activator.remove_all_members();
    }

    /// A child withdrawn before any fold never reaches the latch
    fn remember_used(&self, activator: &Arc<A>) {
        if activator.is_used() {
            self.used.store(true, Ordering::SeqCst);
        }
    }

    /// Live children
    pub fn activators(&self) -> Vec<Arc<A>> {
        self.activator.members()
    }

    pub fn len(&self) -> usize {
        self.activator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activator.is_empty()
    }

    pub fn set_logger_provider(&self, provider: &Arc<dyn LoggerProvider>) {
        self.activator.set_logger_provider(provider);
    }

    pub fn stats(&self) -> ActivationStats {
        self.activator.stats()
    }
}

impl<A: ActivatorNode + ?Sized + 'static> Activable for Scheduler<A> {
    fn activate(&self, params: &ActivationParams) -> Result<Outcome> {
        self.activator.activate(params)
    }

    fn live(&self) -> Result<Outcome> {
        self.activator.live()
    }

    fn end(&self) -> Result<Outcome> {
        self.activator.end()
    }
}

impl<A: ActivatorNode + ?Sized + 'static> ActivatorNode for Scheduler<A> {
    fn name(&self) -> &str {
        self.activator.name()
    }

    fn sync(&self) {
        ActivatorNode::sync(&self.activator);
    }

    /// Non-empty, and at least one child has something to drive
    fn has_activable(&self) -> bool {
        ActivatorNode::sync(&self.activator);
        let mut cursor = self.activator.cursor();
        cursor.any(|member| member.entity().has_activable())
    }

    /// Some child, live or pending, ever held an entity; cached once true
    fn is_used(&self) -> bool {
        if self.used.load(Ordering::SeqCst) {
            return true;
        }
        if !self.activator.is_used() {
            return false;
        }

        let view = self.activator.view();
        let used = view
            .fused()
            .iter()
            .any(|member| member.entity().is_used());
        if used {
            self.used.store(true, Ordering::SeqCst);
        }
        used
    }

    fn logger(&self) -> Logger {
        self.activator.logger()
    }

    fn live_partitioned(&self, partitions: usize) -> Outcome {
        self.activator.live_partitioned(partitions)
    }
}

impl<A: ActivatorNode + ?Sized + 'static> fmt::Debug for Scheduler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("activator", &self.activator)
            .field("used", &self.used.load(Ordering::SeqCst))
            .finish()
    }
}
