//! Simulated time provider
//!
//! TigerStyle: Sleeping advances the clock instantly, no real delays.

use crate::clock::SimClock;
use async_trait::async_trait;
use holon_core::io::TimeProvider;

/// [`TimeProvider`] backed by a [`SimClock`]
///
/// `sleep_ms` advances the clock and yields once, so a kernel loop over
/// simulated time runs as fast as the host allows.
#[derive(Debug, Clone)]
pub struct SimTime {
    clock: SimClock,
}

impl SimTime {
    pub fn new(clock: SimClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

#[async_trait]
impl TimeProvider for SimTime {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    async fn sleep_ms(&self, ms: u64) {
        let before_ms = self.clock.now_ms();
        self.clock.advance_ms(ms);
        tokio::task::yield_now().await;

        debug_assert!(self.clock.now_ms() >= before_ms + ms);
    }
}
