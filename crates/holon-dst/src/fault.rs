//! Fault injection for deterministic testing
//!
//! TigerStyle: Explicit fault types, probabilistic injection, seeded decisions.

use crate::rng::DeterministicRng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of the operations of stage callbacks, e.g. `callback:live`
pub const OPERATION_CALLBACK: &str = "callback";
/// Operation of posting a message to a peer
pub const OPERATION_SEND: &str = "send";
/// Operation of deciding whether an agent leaves
pub const OPERATION_LEAVE: &str = "leave";

/// Creation time skew of reordered messages
pub const MESSAGE_SKEW_MS_DEFAULT: u64 = 50;

/// Faults a simulated agent can suffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Stage callback returns an error
    CallbackError,
    /// Stage callback panics
    CallbackPanic,
    /// Outgoing message is lost before reaching the receiver mailbox
    MessageDrop,
    /// Outgoing message is stamped earlier than its creation time
    MessageReorder { skew_ms: u64 },
    /// Agent leaves its activator
    AgentLeave,
}

impl FaultType {
    pub fn name(&self) -> &'static str {
        match self {
            FaultType::CallbackError => "callback_error",
            FaultType::CallbackPanic => "callback_panic",
            FaultType::MessageDrop => "message_drop",
            FaultType::MessageReorder { .. } => "message_reorder",
            FaultType::AgentLeave => "agent_leave",
        }
    }
}

/// One fault injection rule
#[derive(Debug, Clone)]
pub struct FaultConfig {
    pub fault_type: FaultType,
    /// Probability of injection (0.0 - 1.0)
    pub probability: f64,
    /// Only operations whose name contains this string
    pub operation_filter: Option<String>,
    /// Operations to let through before the rule arms
    pub after_operations: u64,
    pub triggers_count_max: Option<u64>,
    pub enabled: bool,
}

impl FaultConfig {
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            after_operations: 0,
            triggers_count_max: None,
            enabled: true,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    pub fn after(mut self, operations: u64) -> Self {
        self.after_operations = operations;
        self
    }

    pub fn max_triggers(mut self, max: u64) -> Self {
        self.triggers_count_max = Some(max);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug)]
struct FaultState {
    config: FaultConfig,
    triggers_count: AtomicU64,
}

/// Decides, from the simulation seed, which operations fail
#[derive(Debug)]
pub struct FaultInjector {
    faults: Vec<FaultState>,
    rng: DeterministicRng,
    operations_count: AtomicU64,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            faults: Vec::new(),
            rng,
            operations_count: AtomicU64::new(0),
        }
    }

    pub fn register(&mut self, config: FaultConfig) {
        self.faults.push(FaultState {
            config,
            triggers_count: AtomicU64::new(0),
        });
    }

    /// Fault to inject into `operation`, if any
    ///
    /// Rules are tried in registration order; the first that fires wins.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        let operations_count = self.operations_count.fetch_add(1, Ordering::SeqCst);

        for state in &self.faults {
            let config = &state.config;
            if !config.enabled || operations_count < config.after_operations {
                continue;
            }
            if let Some(filter) = &config.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            let triggers_count = state.triggers_count.load(Ordering::SeqCst);
            if config
                .triggers_count_max
                .map_or(false, |max| triggers_count >= max)
            {
                continue;
            }

            if self.rng.next_bool(config.probability) {
                state.triggers_count.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    fault = config.fault_type.name(),
                    operation = operation,
                    triggers_count = triggers_count + 1,
                    "Injecting fault"
                );
                return Some(config.fault_type);
            }
        }

        None
    }

    pub fn operations_count(&self) -> u64 {
        self.operations_count.load(Ordering::SeqCst)
    }

    /// Triggers of every rule, in registration order
    pub fn stats(&self) -> Vec<FaultStats> {
        self.faults
            .iter()
            .map(|state| FaultStats {
                fault_type: state.config.fault_type.name(),
                probability: state.config.probability,
                triggers_count: state.triggers_count.load(Ordering::SeqCst),
                enabled: state.config.enabled,
            })
            .collect()
    }

    /// Total triggers of rules injecting `fault_type`
    pub fn triggers_of(&self, fault_type: FaultType) -> u64 {
        self.faults
            .iter()
            .filter(|state| state.config.fault_type.name() == fault_type.name())
            .map(|state| state.triggers_count.load(Ordering::SeqCst))
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct FaultStats {
    pub fault_type: &'static str,
    pub probability: f64,
    pub triggers_count: u64,
    pub enabled: bool,
}

/// Builder for a [`FaultInjector`] with several rules
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    faults: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            faults: Vec::new(),
        }
    }

    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.faults.push(config);
        self
    }

    /// Error and panic faults on every stage callback
    pub fn with_callback_faults(self, probability: f64) -> Self {
        self.with_fault(
            FaultConfig::new(FaultType::CallbackError, probability).with_filter(OPERATION_CALLBACK),
        )
        .with_fault(
            FaultConfig::new(FaultType::CallbackPanic, probability / 2.0)
                .with_filter(OPERATION_CALLBACK),
        )
    }

    /// Lost and skewed messages
    pub fn with_message_faults(self, probability: f64) -> Self {
        self.with_fault(
            FaultConfig::new(FaultType::MessageDrop, probability).with_filter(OPERATION_SEND),
        )
        .with_fault(
            FaultConfig::new(
                FaultType::MessageReorder {
                    skew_ms: MESSAGE_SKEW_MS_DEFAULT,
                },
                probability,
            )
            .with_filter(OPERATION_SEND),
        )
    }

    /// Agents leaving their activator during a LIVE callback
    pub fn with_churn_faults(self, probability: f64) -> Self {
        self.with_fault(
            FaultConfig::new(FaultType::AgentLeave, probability).with_filter(OPERATION_LEAVE),
        )
    }

    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.faults {
            injector.register(config);
        }
        injector
    }
}
