//! # RandomNumberGenerator
//!
//! Every stochastic operation in the crate (network initialization, mutation
//! noise, spawn-heading jitter) draws from an explicit `RandomNumberGenerator`
//! seeded by the caller. The core is a 64-bit linear congruential generator
//! exposed through `rand::RngCore`, so the usual `rand::Rng` helpers work on
//! it, plus a Box-Muller gaussian sampler.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::rng::RandomNumberGenerator;
//!
//! let mut a = RandomNumberGenerator::from_seed(7);
//! let mut b = RandomNumberGenerator::from_seed(7);
//! assert_eq!(a.gaussian(), b.gaussian());
//! assert_eq!(a.gen_range(-1.0..1.0), b.gen_range(-1.0..1.0));
//! ```
//!
//! ## Seed sources
//!
//! Components that need a stream of fresh seeds take a [`SeedSource`]. A
//! seeded `RandomNumberGenerator` is itself a deterministic source; the
//! [`EntropySeeds`] source is the explicit opt-in for non-reproducible runs.

use std::fmt::Debug;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::{thread_rng, Rng, RngCore, SeedableRng};

const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// A 64-bit linear congruential generator.
///
/// Only the high 32 bits of each state are handed out; the low bits of an LCG
/// with a power-of-two modulus have short periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        let mut lcg = Self { state: seed };
        lcg.step();
        lcg
    }

    fn step(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }
}

impl RngCore for Lcg {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Lcg {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

/// A wrapper around [`Lcg`] that provides uniform and gaussian sampling.
#[derive(Debug, Clone)]
pub struct RandomNumberGenerator {
    pub rng: Lcg,
    spare_gaussian: Option<f64>,
}

impl RandomNumberGenerator {
    /// Creates a generator with a specific seed.
    ///
    /// This is the constructor every deterministic code path uses.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Lcg::seed_from_u64(seed),
            spare_gaussian: None,
        }
    }

    /// Creates a generator seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        Self::from_seed(thread_rng().gen())
    }

    /// Uniform sample in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform sample in the given range.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// Standard normal sample using the Box-Muller transform.
    ///
    /// Each transform produces two independent samples; the second one is
    /// cached and returned by the next call.
    pub fn gaussian(&mut self) -> f64 {
        if let Some(spare) = self.spare_gaussian.take() {
            return spare;
        }

        // u1 must stay away from zero so the logarithm is finite.
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        self.spare_gaussian = Some(radius * theta.sin());
        radius * theta.cos()
    }

    /// Normal sample with the given mean and standard deviation.
    pub fn normal(&mut self, mean: f64, sigma: f64) -> f64 {
        mean + sigma * self.gaussian()
    }

    /// Draws a seed for a child generator.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// A stream of seeds for locally scoped generators.
pub trait SeedSource: Debug {
    fn next_seed(&mut self) -> u64;
}

impl SeedSource for RandomNumberGenerator {
    fn next_seed(&mut self) -> u64 {
        RandomNumberGenerator::next_seed(self)
    }
}

/// Non-deterministic seed source backed by the thread-local entropy RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropySeeds;

impl SeedSource for EntropySeeds {
    fn next_seed(&mut self) -> u64 {
        thread_rng().gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomNumberGenerator::from_seed(42);
        let mut b = RandomNumberGenerator::from_seed(42);
        for _ in 0..100 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomNumberGenerator::from_seed(1);
        let mut b = RandomNumberGenerator::from_seed(2);
        let same = (0..32).filter(|_| a.next_seed() == b.next_seed()).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn test_uniform_in_range() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..1000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
            let ranged = rng.gen_range(-5.0..5.0);
            assert!((-5.0..5.0).contains(&ranged));
        }
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = RandomNumberGenerator::from_seed(99);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.normal(2.0, 0.5)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.02, "mean was {}", mean);
        assert!((var.sqrt() - 0.5).abs() < 0.02, "std was {}", var.sqrt());
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_clone() {
        let mut rng1 = RandomNumberGenerator::from_seed(42);
        rng1.gaussian();
        let mut rng2 = rng1.clone();
        assert_eq!(rng1.gaussian(), rng2.gaussian());
        assert_eq!(rng1.gaussian(), rng2.gaussian());
    }

    #[test]
    fn test_fill_bytes_partial_chunk() {
        let mut lcg = Lcg::new(5);
        let mut buf = [0u8; 7];
        lcg.fill_bytes(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_entropy_seeds() {
        let mut seeds = EntropySeeds;
        let a = seeds.next_seed();
        let b = seeds.next_seed();
        assert_ne!(a, b);
    }
}
