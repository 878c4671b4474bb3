//! Simulated clock
//!
//! TigerStyle: Time moves only when the simulation moves it.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Simulation start, 2024-01-01T00:00:00Z
const SIM_EPOCH_MS: u64 = 1_704_067_200_000;

/// Shared simulated wall clock
///
/// Clones observe the same time.
#[derive(Debug, Clone)]
pub struct SimClock {
    now_ms: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        debug_assert!(start.timestamp_millis() >= 0, "start before epoch");
        Self::from_millis(start.timestamp_millis().max(0) as u64)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(ms)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms() as i64).unwrap_or_default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Whether `deadline_ms` has been reached
    pub fn is_past_ms(&self, deadline_ms: u64) -> bool {
        self.now_ms() >= deadline_ms
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::from_millis(SIM_EPOCH_MS)
    }
}
