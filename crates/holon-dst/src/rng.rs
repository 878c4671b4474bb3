//! Deterministic RNG for simulation
//!
//! TigerStyle: One seed replays the whole run.

use holon_core::io::RngProvider;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DST_SEED_ENV: &str = "DST_SEED";

/// Read `DST_SEED`, or draw a fresh seed, and log it
pub(crate) fn seed_from_env_or_random() -> u64 {
    let seed = std::env::var(DST_SEED_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(rand::random);

    tracing::info!(seed = seed, "DST seed (set DST_SEED={} to replay)", seed);
    seed
}

/// Seeded ChaCha20 generator shared by every simulated component
///
/// Clones share one stream; [`DeterministicRng::fork`] derives an
/// independent one.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    rng: Arc<Mutex<ChaCha20Rng>>,
    forks_count: Arc<AtomicU64>,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            forks_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Seed from `DST_SEED` when set, randomly otherwise
    pub fn from_env_or_random() -> Self {
        Self::new(seed_from_env_or_random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn generator(&self) -> MutexGuard<'_, ChaCha20Rng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_u64(&self) -> u64 {
        self.generator().gen()
    }

    /// Uniform in [0, 1)
    pub fn next_f64(&self) -> f64 {
        self.generator().gen()
    }

    /// True with the given probability
    pub fn next_bool(&self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );
        self.next_f64() < probability
    }

    /// Uniform in [min, max)
    pub fn next_range(&self, min: u64, max: u64) -> u64 {
        debug_assert!(min < max, "min must be less than max");
        self.generator().gen_range(min..max)
    }

    /// Uniform index into a slice of length `len`
    pub fn next_index(&self, len: usize) -> usize {
        debug_assert!(len > 0, "length must be positive");
        self.generator().gen_range(0..len)
    }

    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_index(items.len()))
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&self, items: &mut [T]) {
        let mut rng = self.generator();
        for i in (1..items.len()).rev() {
            let j = rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }

    /// Independent stream seeded from this one
    pub fn fork(&self) -> Self {
        let fork_id = self.forks_count.fetch_add(1, Ordering::SeqCst);
        let fork_seed = self
            .seed
            .wrapping_add(fork_id)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self::new(fork_seed)
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RngProvider for DeterministicRng {
    fn next_u64(&self) -> u64 {
        DeterministicRng::next_u64(self)
    }

    fn gen_range(&self, min: u64, max: u64) -> u64 {
        self.next_range(min, max)
    }
}
