//! Simple random number generator for reproducibility.
//!
//! A lightweight xorshift-based PRNG that doesn't require external
//! dependencies, ensuring identical weight initialization across runs with
//! the same seed.

use std::f32::consts::PI;

/// Simple RNG for reproducibility without external crates.
///
/// Uses the xorshift algorithm for fast, deterministic random number
/// generation. A Gaussian sampler (Box-Muller) is layered on top for
/// normal-distributed matrix fills.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with an explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Gaussian sample via the Box-Muller transform.
    ///
    /// The first uniform draw is nudged away from zero so the log stays
    /// finite.
    pub fn next_normal(&mut self, mean: f32, stddev: f32) -> f32 {
        let u1 = self.next_f32().max(f32::MIN_POSITIVE);
        let u2 = self.next_f32();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + stddev * z
    }
}
