//! Generate pseudorandom excitation.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BLOCK_SIZE, Q15, SignalBlock};

/// Uniform white noise source.
///
/// Deterministic for a given seed. As an iterator it yields unscaled
/// full range samples.
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    /// Create new noise source.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate one block, each sample scaled by `power`.
    pub fn next_block(&mut self, power: Q15) -> SignalBlock {
        let mut block = [Q15::ZERO; BLOCK_SIZE];
        for (to, from) in block.iter_mut().zip(self.by_ref()) {
            *to = from * power;
        }
        block
    }
}

impl Iterator for NoiseSource {
    type Item = Q15;
    fn next(&mut self) -> Option<Q15> {
        Some(Q15::from_raw(self.rng.random()))
    }
}
