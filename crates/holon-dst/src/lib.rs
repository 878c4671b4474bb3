//! Holon DST - Deterministic Simulation Testing
//!
//! Seeded simulation of agents driven by the Holon kernel.
//!
//! # Overview
//!
//! DST runs the real activation engine and mailboxes with:
//! - Deterministic time control (SimClock, SimTime)
//! - Reproducible random numbers (DeterministicRng)
//! - Fault injection into callbacks and message delivery (FaultInjector)
//! - Trace-based invariant checking (InvariantChecker)
//!
//! # Example
//!
//! ```rust,ignore
//! use holon_dst::{InvariantChecker, SimConfig, Simulation};
//!
//! #[test]
//! fn test_with_faults() {
//!     Simulation::new(SimConfig::from_env_or_random())
//!         .with_invariants(InvariantChecker::new().with_standard_invariants())
//!         .run(|env| async move {
//!             // Build agents with env.agent(..), drive them with env.drive(..)
//!             Ok(())
//!         })
//!         .unwrap();
//! }
//! ```
//!
//! # TigerStyle
//!
//! - All decisions derive from one seed
//! - Always log the seed for reproducibility
//! - Explicit fault types and probabilities

pub mod agent;
pub mod clock;
pub mod fault;
pub mod invariants;
pub mod rng;
pub mod simulation;
pub mod time;

pub use agent::{AgentContext, SimAgent, SimDirectory, TraceRecorder, MESSAGE_KIND_PING};
pub use clock::SimClock;
pub use fault::{
    FaultConfig, FaultInjector, FaultInjectorBuilder, FaultStats, FaultType, OPERATION_CALLBACK,
    OPERATION_LEAVE, OPERATION_SEND,
};
pub use invariants::{
    Delivery, EveryActiveEntityLives, FaultsSurface, Invariant, InvariantChecker,
    InvariantViolation, LifecycleEvent, MailboxOrdering, OutcomeOrdering, PackIdempotence,
    PassRecord, SingleLivePerPass, StageOrdering, SystemState,
};
pub use rng::DeterministicRng;
pub use simulation::{SimConfig, SimEnvironment, Simulation, SimulationError};
pub use time::SimTime;
