//! I/O abstraction layer
//!
//! TigerStyle: All non-deterministic inputs go through abstraction traits.
//!
//! The kernel reads time in three places (message creation timestamps, tick
//! pacing, waiting mailbox reads) and randomness in one (message identifiers).
//! Each of them goes through [`IoContext`] so the same scheduling code runs
//! against the wall clock in production and against a simulated clock under
//! deterministic simulation testing.
//!
//! ```text
//!   Kernel / Mailbox / Envelope
//!              │
//!         IoContext
//!     ┌────────┴────────┐
//!  WallClockTime     SimTime      (holon-dst)
//!  StdRngProvider    DeterministicRng
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// ============================================================================
// Time Provider
// ============================================================================

/// Time provider abstraction
///
/// Code that stamps messages or paces ticks must use this trait and never
/// read `SystemTime::now()` directly.
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    ///
    /// Simulated providers advance their clock and return immediately.
    async fn sleep_ms(&self, ms: u64);

    /// Monotonic timestamp in milliseconds (for measuring durations)
    fn monotonic_ms(&self) -> u64 {
        self.now_ms()
    }
}

/// Production time provider using the system clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

fn process_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }

    fn monotonic_ms(&self) -> u64 {
        process_start().elapsed().as_millis() as u64
    }
}

// ============================================================================
// RNG Provider
// ============================================================================

/// Random number generator abstraction
///
/// Message identifiers are drawn from this trait so simulated runs replay
/// the same identifiers for the same seed.
pub trait RngProvider: Send + Sync + std::fmt::Debug {
    /// Generate a random u64
    fn next_u64(&self) -> u64;

    /// Generate a random value in [min, max)
    fn gen_range(&self, min: u64, max: u64) -> u64 {
        assert!(min < max, "min must be less than max");
        min + (self.next_u64() % (max - min))
    }

    /// Generate a random version 4 UUID string
    fn gen_uuid(&self) -> String {
        let high = self.next_u64();
        let low = self.next_u64();

        // Version nibble 4, variant bits 10
        let high = (high & 0xffff_ffff_ffff_0fff) | 0x0000_0000_0000_4000;
        let low = (low & 0x3fff_ffff_ffff_ffff) | 0x8000_0000_0000_0000;

        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            high >> 32,
            (high >> 16) & 0xffff,
            high & 0xffff,
            low >> 48,
            low & 0x0000_ffff_ffff_ffff
        )
    }
}

/// Production RNG provider
///
/// Lock-free xorshift64* over an atomic state. Not cryptographically secure.
#[derive(Debug)]
pub struct StdRngProvider {
    state: AtomicU64,
}

impl Default for StdRngProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StdRngProvider {
    /// Create a new RNG provider seeded from system time
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::with_seed(seed)
    }

    /// Create with specific seed (for testing)
    pub fn with_seed(seed: u64) -> Self {
        // xorshift has a fixed point at zero
        let seed = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self {
            state: AtomicU64::new(seed),
        }
    }
}

impl RngProvider for StdRngProvider {
    fn next_u64(&self) -> u64 {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            let mut x = state;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;

            match self
                .state
                .compare_exchange_weak(state, x, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return x.wrapping_mul(0x2545_F491_4F6C_DD1D),
                Err(current) => state = current,
            }
        }
    }
}

// ============================================================================
// I/O Context
// ============================================================================

/// Bundle of all I/O providers
#[derive(Clone)]
pub struct IoContext {
    /// Time provider
    pub time: Arc<dyn TimeProvider>,
    /// RNG provider
    pub rng: Arc<dyn RngProvider>,
}

impl std::fmt::Debug for IoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoContext")
            .field("time", &self.time)
            .field("rng", &self.rng)
            .finish()
    }
}

impl Default for IoContext {
    fn default() -> Self {
        Self::production()
    }
}

impl IoContext {
    /// Production I/O context with the wall clock and the standard RNG
    pub fn production() -> Self {
        Self {
            time: Arc::new(WallClockTime::new()),
            rng: Arc::new(StdRngProvider::new()),
        }
    }

    /// I/O context with custom providers
    pub fn new(time: Arc<dyn TimeProvider>, rng: Arc<dyn RngProvider>) -> Self {
        Self { time, rng }
    }

    /// Current time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }

    /// Sleep for the specified duration
    pub async fn sleep_ms(&self, ms: u64) {
        self.time.sleep_ms(ms).await;
    }

    /// Generate a UUID string
    pub fn gen_uuid(&self) -> String {
        self.rng.gen_uuid()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_time_now_ms() {
        let clock = WallClockTime::new();
        let now = clock.now_ms();
        assert!(now > 1_577_836_800_000); // Jan 1, 2020

        let later = clock.now_ms();
        assert!(later >= now);
    }

    #[test]
    fn test_wall_clock_monotonic_never_goes_back() {
        let clock = WallClockTime::new();
        let first = clock.monotonic_ms();
        let second = clock.monotonic_ms();
        assert!(second >= first);
    }

    #[tokio::test]
    async fn test_wall_clock_time_sleep() {
        let clock = WallClockTime::new();
        let start = clock.monotonic_ms();
        clock.sleep_ms(10).await;
        let elapsed = clock.monotonic_ms() - start;
        assert!(elapsed >= 9, "elapsed: {}", elapsed);
    }

    #[test]
    fn test_std_rng_same_seed_same_sequence() {
        let rng1 = StdRngProvider::with_seed(12345);
        let rng2 = StdRngProvider::with_seed(12345);
        for _ in 0..16 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_std_rng_zero_seed_is_usable() {
        let rng = StdRngProvider::with_seed(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn test_gen_uuid_format() {
        let rng = StdRngProvider::with_seed(42);
        let uuid = rng.gen_uuid();

        assert_eq!(uuid.len(), 36);
        assert_eq!(&uuid[8..9], "-");
        assert_eq!(&uuid[13..14], "-");
        assert_eq!(&uuid[18..19], "-");
        assert_eq!(&uuid[23..24], "-");
        assert_eq!(&uuid[14..15], "4");
        assert!(matches!(&uuid[19..20], "8" | "9" | "a" | "b"));
    }

    #[test]
    fn test_gen_range_bounds() {
        let rng = StdRngProvider::with_seed(7);
        for _ in 0..100 {
            let value = rng.gen_range(10, 20);
            assert!((10..20).contains(&value));
        }
    }

    #[test]
    fn test_io_context_production() {
        let ctx = IoContext::production();
        assert!(ctx.now_ms() > 1_577_836_800_000);
        assert_eq!(ctx.gen_uuid().len(), 36);
    }
}
