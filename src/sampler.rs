//! Random-number interface consumed by the kernel.
//!
//! The kernel only draws from a sampler at explicit model sites (random
//! resource selection, generator inter-arrival times). Reproducibility
//! requires the same implementation and seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A seeded stream of uniform draws.
pub trait Sampler {
    /// Next uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform draw in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Exponential draw with the given mean (inverse-CDF).
    fn exponential(&mut self, mean: f64) -> f64 {
        -mean * (1.0 - self.next_f64()).ln()
    }

    /// Uniform index in `0..n`. `n` must be non-zero.
    fn index(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n.saturating_sub(1))
    }
}

/// The default sampler, backed by ChaCha8.
#[derive(Debug, Clone)]
pub struct SeededSampler {
    rng: ChaCha8Rng,
}

impl SeededSampler {
    /// A ChaCha8 stream seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        SeededSampler {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for SeededSampler {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n.max(1))
    }
}
