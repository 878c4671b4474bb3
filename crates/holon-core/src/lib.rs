//! Holon Core
//!
//! Core types, errors, and constants for the Holon multi-agent execution kernel.
//!
//! # Overview
//!
//! Holon drives populations of agents through a three-stage lifecycle
//! (initialization, live, destruction) and aggregates what every agent
//! reported into a single [`Outcome`]. This crate holds the vocabulary shared
//! by the runtime and the simulation harness: the outcome model, addresses,
//! configuration, the logger seam and the I/O abstractions.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `MAILBOX_DEPTH_MAX`)
//! - Assertions on every invariant that is cheap to check
//! - No recursion where iteration will do

pub mod address;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod telemetry;

pub use address::Address;
pub use config::{CollectionConfig, HolonConfig, MailboxConfig, MailboxKind, SchedulerConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use io::{IoContext, RngProvider, StdRngProvider, TimeProvider, WallClockTime};
pub use logging::{LogLevel, Logger, LoggerProvider, OutcomeLog};
pub use outcome::{
    MultipleOutcome, Outcome, Severity, SingleOutcome, SEVERITY_MASK_ALL, SEVERITY_MASK_FAILURE,
    SEVERITY_MASK_SUCCESS,
};
pub use telemetry::{
    init_telemetry, try_init_telemetry, LogOutput, TelemetryConfig, TelemetryGuard,
};
