//! Seedable random source for feature sampling and random splits.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Pseudo-random source backing feature subsampling and the `random` split
/// policy.
///
/// A non-negative seed gives bit-reproducible construction across runs; a
/// seed of `-1` draws the initial state from OS entropy.
#[derive(Debug, Clone)]
pub struct RandomState {
    rng: Xoshiro256PlusPlus,
}

impl RandomState {
    /// Create a random state from a seed (`-1` for non-deterministic).
    pub fn new(seed: i64) -> Self {
        let rng = if seed < 0 {
            Xoshiro256PlusPlus::from_entropy()
        } else {
            Xoshiro256PlusPlus::seed_from_u64(seed as u64)
        };
        Self { rng }
    }

    /// Uniform integer in `[low, high)`.
    #[inline]
    pub fn uniform_int(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..high)
    }

    /// Uniform real in `[low, high)`.
    #[inline]
    pub fn uniform_real(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }
}
