//! Simulation harness for deterministic testing
//!
//! TigerStyle: Reproducible runs with explicit configuration and budgets.
//!
//! Kernel passes are driven synchronously from the test, one at a time, so a
//! run is a pure function of its seed when the LIVE pass is sequential. Time
//! moves only when the harness advances the [`SimClock`], or when the kernel
//! sleeps on [`SimTime`].

use crate::agent::{AgentContext, SimAgent, SimDirectory, TraceRecorder};
use crate::clock::SimClock;
use crate::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder};
use crate::invariants::{InvariantChecker, InvariantViolation, SystemState};
use crate::rng::{seed_from_env_or_random, DeterministicRng};
use crate::time::SimTime;
use holon_core::address::Address;
use holon_core::config::SchedulerConfig;
use holon_core::constants::{DST_STEPS_COUNT_MAX, DST_TIME_MS_MAX};
use holon_core::error::{Error, Result};
use holon_core::io::{IoContext, RngProvider, TimeProvider};
use holon_core::outcome::Outcome;
use holon_core::telemetry::{try_init_telemetry, TelemetryConfig};
use holon_runtime::activation::{ActivationParams, ActivationStage, ActivatorNode};
use holon_runtime::kernel::Kernel;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Configuration for a simulation
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Maximum passes driven by one run
    pub max_steps: u64,
    /// Maximum simulated time in milliseconds
    pub max_time_ms: u64,
    /// Probability that an agent posts a message on each LIVE callback
    pub send_probability: f64,
}

impl SimConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_steps: DST_STEPS_COUNT_MAX,
            max_time_ms: DST_TIME_MS_MAX,
            send_probability: 0.5,
        }
    }

    /// Seed from `DST_SEED` when set, randomly otherwise
    pub fn from_env_or_random() -> Self {
        Self::new(seed_from_env_or_random())
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_max_time_ms(mut self, ms: u64) -> Self {
        self.max_time_ms = ms;
        self
    }

    pub fn with_send_probability(mut self, probability: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&probability));
        self.send_probability = probability;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Errors of a simulation run
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Simulation test failed: {0}")]
    TestFailed(#[from] Error),

    #[error("Simulation runtime error: {0}")]
    RuntimeError(String),

    #[error(transparent)]
    InvariantViolation(#[from] InvariantViolation),
}

// =============================================================================
// SimEnvironment
// =============================================================================

/// Everything a simulation test works with
pub struct SimEnvironment {
    pub config: SimConfig,
    pub clock: SimClock,
    pub rng: DeterministicRng,
    /// Simulated time and seeded identifiers
    pub io_context: IoContext,
    pub faults: Arc<FaultInjector>,
    pub directory: SimDirectory,
    pub recorder: TraceRecorder,
}

impl SimEnvironment {
    fn build(config: SimConfig, fault_configs: Vec<FaultConfig>) -> Self {
        let rng = DeterministicRng::new(config.seed);
        let clock = SimClock::default();

        let mut builder = FaultInjectorBuilder::new(rng.fork());
        for fault in fault_configs {
            builder = builder.with_fault(fault);
        }
        let faults = Arc::new(builder.build());

        let io_context = IoContext::new(
            Arc::new(SimTime::new(clock.clone())) as Arc<dyn TimeProvider>,
            Arc::new(rng.fork()) as Arc<dyn RngProvider>,
        );

        Self {
            config,
            clock,
            rng,
            io_context,
            faults,
            directory: SimDirectory::new(),
            recorder: TraceRecorder::new(),
        }
    }

    /// Independent random stream
    pub fn fork_rng(&self) -> DeterministicRng {
        self.rng.fork()
    }

    pub fn advance_time_ms(&self, ms: u64) {
        self.clock.advance_ms(ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Context shared by the agents of this run
    pub fn agent_context(&self) -> AgentContext {
        AgentContext {
            directory: self.directory.clone(),
            faults: self.faults.clone(),
            rng: self.rng.clone(),
            io: self.io_context.clone(),
            recorder: self.recorder.clone(),
            send_probability: self.config.send_probability,
        }
    }

    /// Create an agent named `name`
    ///
    /// # Errors
    /// Returns `InvalidAddress` when `name` is not a valid address.
    pub fn agent(&self, name: &str) -> Result<Arc<SimAgent>> {
        let address = Address::new(name)?;
        Ok(SimAgent::new(address, &self.agent_context()))
    }

    /// Kernel over `root` running on simulated time
    pub fn kernel<N: ActivatorNode + ?Sized + 'static>(
        &self,
        root: Arc<N>,
        config: SchedulerConfig,
    ) -> Result<Kernel<N>> {
        Kernel::with_io(root, config, self.io_context.clone())
    }

    /// Run the INIT pass through `kernel` and record it
    pub fn activate<N: ActivatorNode + ?Sized + 'static>(
        &self,
        kernel: &Kernel<N>,
        params: &ActivationParams,
    ) -> Result<Outcome> {
        self.recorder.begin_pass();
        let outcome = kernel.activate(params)?;
        self.recorder
            .finish_pass(ActivationStage::Initialization, outcome.clone());
        Ok(outcome)
    }

    /// Run one LIVE pass through `kernel`, record it, then advance time by
    /// one tick interval
    pub fn tick<N>(&self, kernel: &Kernel<N>) -> Result<Outcome>
    where
        N: ActivatorNode + ?Sized + 'static,
    {
        self.recorder.begin_pass();
        let outcome = kernel.tick()?;
        self.recorder.finish_pass(ActivationStage::Live, outcome.clone());
        self.clock.advance_ms(kernel.config().tick_interval_ms);
        Ok(outcome)
    }

    /// Run the DESTROY pass through `kernel` and record it
    pub fn end<N>(&self, kernel: &Kernel<N>) -> Result<Outcome>
    where
        N: ActivatorNode + ?Sized + 'static,
    {
        self.recorder.begin_pass();
        let outcome = kernel.end()?;
        self.recorder
            .finish_pass(ActivationStage::Destruction, outcome.clone());
        Ok(outcome)
    }

    /// Activate, tick `passes` times calling `between` after each tick, end
    ///
    /// Stops ticking early once the simulated time budget is spent.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when `passes` exceeds the step budget.
    pub fn drive<N, F>(
        &self,
        kernel: &Kernel<N>,
        params: &ActivationParams,
        passes: u64,
        mut between: F,
    ) -> Result<Vec<Outcome>>
    where
        N: ActivatorNode + ?Sized + 'static,
        F: FnMut(u64) -> Result<()>,
    {
        if passes > self.config.max_steps {
            return Err(Error::InvalidConfiguration {
                field: "passes".into(),
                reason: format!("{} exceeds step budget {}", passes, self.config.max_steps),
            });
        }

        let started_ms = self.now_ms();
        let mut outcomes = Vec::with_capacity(passes as usize + 2);
        outcomes.push(self.activate(kernel, params)?);

        for pass in 0..passes {
            if self.now_ms() - started_ms >= self.config.max_time_ms {
                tracing::debug!(pass, "Simulated time budget spent");
                break;
            }
            outcomes.push(self.tick(kernel)?);
            between(pass)?;
        }

        outcomes.push(self.end(kernel)?);
        Ok(outcomes)
    }

    /// Trace recorded so far
    pub fn trace(&self) -> SystemState {
        self.recorder.snapshot()
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Main simulation harness
pub struct Simulation {
    config: SimConfig,
    fault_configs: Vec<FaultConfig>,
    invariant_checker: Option<InvariantChecker>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            fault_configs: Vec::new(),
            invariant_checker: None,
        }
    }

    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.fault_configs.push(fault);
        self
    }

    pub fn with_faults(mut self, faults: Vec<FaultConfig>) -> Self {
        self.fault_configs.extend(faults);
        self
    }

    /// Check the recorded trace against `checker` once the test returns
    pub fn with_invariants(mut self, checker: InvariantChecker) -> Self {
        self.invariant_checker = Some(checker);
        self
    }

    pub fn has_invariant_checker(&self) -> bool {
        self.invariant_checker.is_some()
    }

    /// Run `test` on a fresh current-thread runtime
    pub fn run<F, Fut, T>(self, test: F) -> std::result::Result<T, SimulationError>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SimulationError::RuntimeError(e.to_string()))?;

        runtime.block_on(self.run_async(test))
    }

    /// Run `test` on the current runtime
    pub async fn run_async<F, Fut, T>(self, test: F) -> std::result::Result<T, SimulationError>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Captured per test; shown with the seed when a run fails
        let _telemetry = try_init_telemetry(&TelemetryConfig::for_simulation());
        tracing::info!(
            seed = self.config.seed,
            faults = self.fault_configs.len(),
            "Starting simulation"
        );

        let env = SimEnvironment::build(self.config, self.fault_configs);
        let recorder = env.recorder.clone();

        let value = test(env).await?;

        if let Some(checker) = &self.invariant_checker {
            checker.verify_all(&recorder.snapshot())?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultType;
    use crate::invariants::StageOrdering;
    use holon_runtime::activation::Activator;

    #[test]
    fn test_simulation_returns_value() {
        let result = Simulation::new(SimConfig::new(42)).run(|env| async move {
            assert_eq!(env.config.seed, 42);
            Ok(env.now_ms())
        });
        assert_eq!(result.unwrap(), 1_704_067_200_000);
    }

    #[test]
    fn test_simulation_installs_telemetry_once() {
        for seed in [3, 4] {
            let result = Simulation::new(SimConfig::new(seed)).run(|_env| async move {
                tracing::info!("inside simulation");
                Ok(())
            });
            assert!(result.is_ok());
        }

        // The harness left a subscriber in place
        assert!(try_init_telemetry(&TelemetryConfig::for_simulation()).is_none());
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_simulation_propagates_test_error() {
        let result: std::result::Result<(), _> = Simulation::new(SimConfig::new(1))
            .run(|_env| async move { Err(Error::internal("expected")) });
        assert!(matches!(result, Err(SimulationError::TestFailed(_))));
    }

    #[test]
    fn test_drive_records_every_pass() {
        let result = Simulation::new(SimConfig::new(7))
            .with_invariants(InvariantChecker::new().with_invariant(StageOrdering))
            .run(|env| async move {
                let activator = Arc::new(Activator::<SimAgent>::new("root"));
                activator.add_member(env.agent("a")?)?;
                let kernel = env.kernel(activator, SchedulerConfig::default())?;

                let outcomes = env.drive(&kernel, &ActivationParams::empty(), 3, |_| Ok(()))?;
                assert_eq!(outcomes.len(), 5);
                Ok(env.trace())
            });

        let trace = result.unwrap();
        assert_eq!(trace.passes.len(), 5);
        assert_eq!(trace.count_of(ActivationStage::Live), 3);
    }

    #[test]
    fn test_drive_rejects_oversized_run() {
        let result = Simulation::new(SimConfig::new(7).with_max_steps(2)).run(|env| async move {
            let root = Arc::new(Activator::<SimAgent>::new("root"));
            let kernel = env.kernel(root, SchedulerConfig::default())?;
            env.drive(&kernel, &ActivationParams::empty(), 3, |_| Ok(()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_time_budget_stops_ticking() {
        let config = SimConfig::new(7).with_max_time_ms(250);
        let result = Simulation::new(config).run(|env| async move {
            let activator = Arc::new(Activator::<SimAgent>::new("root"));
            activator.add_member(env.agent("a")?)?;
            let kernel = env.kernel(activator, SchedulerConfig::default())?;
            let outcomes = env.drive(&kernel, &ActivationParams::empty(), 100, |_| Ok(()))?;
            Ok((outcomes.len(), kernel.config().tick_interval_ms))
        });

        let (outcomes_count, interval_ms) = result.unwrap();
        let ticks = (250 + interval_ms - 1) / interval_ms;
        assert_eq!(outcomes_count as u64, ticks.min(100) + 2);
    }

    #[test]
    fn test_same_seed_same_faults() {
        let run = |seed: u64| {
            Simulation::new(SimConfig::new(seed))
                .with_fault(
                    FaultConfig::new(FaultType::CallbackError, 0.3).with_filter("callback"),
                )
                .run(|env| async move {
                    let triggers: Vec<bool> = (0..50)
                        .map(|_| env.faults.should_inject("callback:live").is_some())
                        .collect();
                    Ok(triggers)
                })
                .unwrap()
        };
        assert_eq!(run(99), run(99));
    }
}
