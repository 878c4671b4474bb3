//! Kernel tick loop
//!
//! TigerStyle: One loop drives the tree, explicit start and stop, clean shutdown.
//!
//! The [`Kernel`] owns the root of an activator tree and paces its passes:
//! one INIT pass, LIVE passes separated by the configured tick interval, and
//! one DESTROY pass when the loop stops. Time goes through the injected
//! [`IoContext`], so the same loop runs under simulated time.

use crate::activation::{ActivationParams, ActivationStage, ActivatorNode};
use holon_core::config::SchedulerConfig;
use holon_core::error::{Error, Result};
use holon_core::io::IoContext;
use holon_core::outcome::Outcome;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Outcomes of one kernel run
#[derive(Debug, Clone)]
pub struct KernelReport {
    /// LIVE passes run
    pub ticks: u64,
    /// Outcome of the INIT pass
    pub activation: Outcome,
    /// Outcome of the last LIVE pass, if any ran
    pub last_tick: Option<Outcome>,
    /// Outcome of the DESTROY pass
    pub destruction: Outcome,
}

impl KernelReport {
    /// Whether every reported pass succeeded
    pub fn is_success(&self) -> bool {
        self.activation.is_success()
            && self.last_tick.as_ref().map_or(true, Outcome::is_success)
            && self.destruction.is_success()
    }
}

#[derive(Debug, Default)]
struct KernelState {
    running: AtomicBool,
    ticks: AtomicU64,
}

/// Driver of an activator tree
pub struct Kernel<N: ActivatorNode + ?Sized + 'static> {
    root: Arc<N>,
    config: SchedulerConfig,
    io: IoContext,
    state: Arc<KernelState>,
}

impl<N: ActivatorNode + ?Sized + 'static> Kernel<N> {
    /// Create a kernel on the production clock
    pub fn new(root: Arc<N>, config: SchedulerConfig) -> Result<Self> {
        Self::with_io(root, config, IoContext::production())
    }

    /// Create a kernel with injected I/O (for DST)
    pub fn with_io(root: Arc<N>, config: SchedulerConfig, io: IoContext) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            root,
            config,
            io,
            state: Arc::new(KernelState::default()),
        })
    }

    pub fn root(&self) -> &Arc<N> {
        &self.root
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether the INIT pass ran and the DESTROY pass did not
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// LIVE passes run since creation
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::SeqCst)
    }

    /// The root was used and holds nothing left to drive
    pub fn is_idle(&self) -> bool {
        self.root.is_used() && !self.root.has_activable()
    }

    /// Run the INIT pass
    ///
    /// # Errors
    /// Returns `KernelAlreadyStarted` if the kernel is running.
    pub fn activate(&self, params: &ActivationParams) -> Result<Outcome> {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return Err(Error::KernelAlreadyStarted);
        }

        info!(root = %self.root.name(), "Activating kernel");
        let outcome = self.root.activate(params);
        Ok(self.report(ActivationStage::Initialization, outcome))
    }

    /// Run one LIVE pass
    ///
    /// # Errors
    /// Returns `KernelNotRunning` before `activate` or after `end`.
    pub fn tick(&self) -> Result<Outcome> {
        if !self.is_running() {
            return Err(Error::KernelNotRunning);
        }

        let outcome = if self.config.partitions_count > 1 {
            Ok(self.root.live_partitioned(self.config.partitions_count))
        } else {
            self.root.live()
        };
        self.state.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(self.report(ActivationStage::Live, outcome))
    }

    /// Run the DESTROY pass
    ///
    /// # Errors
    /// Returns `KernelNotRunning` if the kernel is not running.
    pub fn end(&self) -> Result<Outcome> {
        if !self.state.running.swap(false, Ordering::SeqCst) {
            return Err(Error::KernelNotRunning);
        }

        info!(root = %self.root.name(), ticks = self.ticks(), "Ending kernel");
        let outcome = self.root.end();
        Ok(self.report(ActivationStage::Destruction, outcome))
    }

    /// Activate, tick until a stop condition holds, then end
    ///
    /// Without `ticks_count_max` or `stop_when_idle` this only returns if
    /// the tree is ended from elsewhere.
    pub async fn run(&self, params: &ActivationParams) -> Result<KernelReport> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let activation = self.activate(params)?;
        Ok(self.drive(activation, shutdown_rx).await)
    }

    /// Activate now and tick on a background task
    ///
    /// # Errors
    /// Returns `KernelAlreadyStarted` if the kernel is running.
    pub fn start(&self, params: &ActivationParams) -> Result<KernelHandle> {
        let activation = self.activate(params)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let kernel = self.clone();
        let task = tokio::spawn(async move { kernel.drive(activation, shutdown_rx).await });

        Ok(KernelHandle {
            shutdown: shutdown_tx,
            task,
        })
    }

    #[instrument(skip(self, activation, shutdown), fields(root = %self.root.name()), level = "info")]
    async fn drive(&self, activation: Outcome, mut shutdown: watch::Receiver<bool>) -> KernelReport {
        let mut ticks = 0u64;
        let mut last_tick = None;

        loop {
            if shutdown_requested(&shutdown) {
                debug!("Shutdown requested");
                break;
            }
            if self.config.ticks_count_max.map_or(false, |max| ticks >= max) {
                debug!(ticks, "Tick budget reached");
                break;
            }
            if self.config.stop_when_idle && self.is_idle() {
                debug!(ticks, "Tree is idle");
                break;
            }

            match self.tick() {
                Ok(outcome) => {
                    ticks += 1;
                    last_tick = Some(outcome);
                }
                Err(_) => break,
            }

            tokio::select! {
                _ = self.io.sleep_ms(self.config.tick_interval_ms) => {}
                _ = shutdown.changed() => {}
            }
        }

        let destruction = self
            .end()
            .unwrap_or_else(|_| Outcome::cancel(self.root.name().to_string()));

        KernelReport {
            ticks,
            activation,
            last_tick,
            destruction,
        }
    }

    fn report(&self, stage: ActivationStage, outcome: Result<Outcome>) -> Outcome {
        let outcome =
            outcome.unwrap_or_else(|e| Outcome::error(self.root.name().to_string(), e.to_string()));

        debug!(stage = %stage, severity = %outcome.severity(), "Kernel pass");
        if !outcome.is_success() {
            outcome.log_on(&self.root.logger());
        }
        outcome
    }
}

impl<N: ActivatorNode + ?Sized + 'static> Clone for Kernel<N> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            config: self.config.clone(),
            io: self.io.clone(),
            state: self.state.clone(),
        }
    }
}

impl<N: ActivatorNode + ?Sized + 'static> fmt::Debug for Kernel<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("root", &self.root.name())
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    // A dropped sender counts as a request
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Handle on a kernel loop running in the background
#[derive(Debug)]
pub struct KernelHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<KernelReport>,
}

impl KernelHandle {
    /// Ask the loop to stop and wait for its report
    pub async fn stop(self) -> Result<KernelReport> {
        // The loop may have already finished on its own
        let _ = self.shutdown.send(true);
        self.join().await
    }

    /// Wait for the loop to stop on its own
    pub async fn join(self) -> Result<KernelReport> {
        self.task
            .await
            .map_err(|e| Error::internal(format!("kernel task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
