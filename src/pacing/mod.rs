//! Randomized amounts, gas limits and delays
//!
//! Keeps on-chain activity from following a fixed pattern. All randomness
//! flows through [`Randomizer`], which can be seeded for reproducible runs.

pub mod amount;
pub mod delay;

use alloy::primitives::U256;
use rand::prelude::*;
use rand::rngs::StdRng;

pub use amount::{amount_from_balance, random_amount, AmountBand};
pub use delay::{pause, DelayBand};

/// Source of randomness for one account's run
pub struct Randomizer {
    rng: StdRng,
}

impl Randomizer {
    /// Create a new randomizer with optional seed
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Create randomizer from entropy (random seed)
    pub fn from_entropy() -> Self {
        Self::new(None)
    }

    /// Uniform integer in `[min, max]`; returns `min` when the band is empty
    pub fn uniform_between(&mut self, min: U256, max: U256) -> U256 {
        if max <= min {
            return min;
        }
        let span = max - min;
        let raw = U256::from_be_bytes(self.rng.gen::<[u8; 32]>());
        if span == U256::MAX {
            return raw;
        }
        min + raw % (span + U256::from(1u8))
    }

    /// Gas limit drawn from `[min, max]`
    pub fn random_gas_limit(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Index into a collection of `len` items
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }

    pub(crate) fn gen_millis(&mut self, min_ms: u64, max_ms: u64) -> u64 {
        if max_ms <= min_ms {
            return min_ms;
        }
        self.rng.gen_range(min_ms..=max_ms)
    }
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::from_entropy()
    }
}
