//! Deterministic random number generation.
//!
//! Randomness is an explicitly injected dependency: every consumer (a lossy
//! receiver, a fan-out relay, the kernel's latency sampler) holds its own
//! [`RandomSource`], so a component is deterministic and replayable under a
//! fixed seed without any shared or thread-local stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;

/// A source of randomness for simulation components.
///
/// Implementations must be deterministic for a given construction (seed or
/// script); the production implementation is [`SimRng`]. Tests inject
/// scripted sources to force specific loss patterns.
pub trait RandomSource {
    /// Returns a value in `[0.0, 1.0)`, used for probability draws.
    fn random_ratio(&mut self) -> f64;

    /// Returns a value uniformly drawn from `range` (exclusive upper bound).
    fn random_range_u64(&mut self, range: Range<u64>) -> u64;

    /// Chooses an index into a collection of length `len`.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    fn choice_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot choose from an empty collection");
        self.random_range_u64(0..len as u64) as usize
    }
}

/// Seeded ChaCha8-backed random source.
///
/// The same seed always produces the same sequence of draws, which is what
/// makes whole simulation runs reproducible.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha8Rng,
}

impl SimRng {
    /// Creates a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SimRng {
    fn random_ratio(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn random_range_u64(&mut self, range: Range<u64>) -> u64 {
        self.rng.random_range(range)
    }
}
