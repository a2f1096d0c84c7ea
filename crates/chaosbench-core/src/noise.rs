//! Stochastic perturbation for chaos mode.
//!
//! Every noise sample is a Gaussian draw (mean 0, σ = φ/5) plus a harmonic
//! term `sin(iteration·φ)·amplitude·0.1` that is fully deterministic in the
//! iteration index. The Gaussian draw sits behind [`GaussianSource`] so a
//! session can be replayed exactly without turning chaos mode off.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::PHI;

/// Standard deviation of the Gaussian noise component.
pub const NOISE_STD_DEV: f64 = PHI / 5.0;

/// Scale applied to the harmonic term.
const HARMONIC_GAIN: f64 = 0.1;

/// Capability: produce the next standard-normal (mean 0, σ 1) sample.
pub trait GaussianSource: Send {
    fn next_standard_normal(&mut self) -> f64;
}

/// Gaussian source backed by a `StdRng` and the Box–Muller transform.
pub struct RandomGaussian {
    rng: StdRng,
}

impl RandomGaussian {
    /// Seeded from OS entropy. Output is not reproducible.
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded from an explicit value. Same seed, same stream.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl GaussianSource for RandomGaussian {
    fn next_standard_normal(&mut self) -> f64 {
        let u1 = self.rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
        let u2 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Replays a fixed list of standard-normal samples, then yields zeros.
#[derive(Debug, Clone, Default)]
pub struct ReplayGaussian {
    samples: Vec<f64>,
    cursor: usize,
}

impl ReplayGaussian {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples, cursor: 0 }
    }

    /// Samples not yet consumed.
    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.cursor)
    }
}

impl GaussianSource for ReplayGaussian {
    fn next_standard_normal(&mut self) -> f64 {
        let value = self.samples.get(self.cursor).copied().unwrap_or(0.0);
        self.cursor += 1;
        value
    }
}

/// Produces bounded-variance noise samples for chaos mode.
pub struct NoiseGenerator {
    source: Box<dyn GaussianSource>,
}

impl NoiseGenerator {
    pub fn new(source: Box<dyn GaussianSource>) -> Self {
        Self { source }
    }

    /// OS-seeded generator, or a reproducible one when `seed` is given.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::new(Box::new(RandomGaussian::from_seed(s))),
            None => Self::new(Box::new(RandomGaussian::from_os())),
        }
    }

    /// Draw one noise sample for `iteration`.
    pub fn sample(&mut self, iteration: u64, amplitude: f64) -> f64 {
        self.source.next_standard_normal() * NOISE_STD_DEV + harmonic(iteration, amplitude)
    }
}

impl std::fmt::Debug for NoiseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseGenerator").finish_non_exhaustive()
    }
}

/// Deterministic harmonic component of the noise.
pub fn harmonic(iteration: u64, amplitude: f64) -> f64 {
    (iteration as f64 * PHI).sin() * amplitude * HARMONIC_GAIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::statistics::Statistics;

    #[test]
    fn test_harmonic_zero_at_origin() {
        assert_eq!(harmonic(0, 1.0), 0.0);
        assert_eq!(harmonic(17, 0.0), 0.0);
    }

    #[test]
    fn test_harmonic_bounded_by_amplitude() {
        for i in 0..1000 {
            assert!(harmonic(i, 2.0).abs() <= 0.2 + 1e-12);
        }
    }

    #[test]
    fn test_replay_only_adds_harmonic() {
        let mut noise = NoiseGenerator::new(Box::new(ReplayGaussian::new(vec![0.0, 1.0])));
        assert_eq!(noise.sample(3, 1.0), harmonic(3, 1.0));
        let expected = NOISE_STD_DEV + harmonic(4, 1.0);
        assert!((noise.sample(4, 1.0) - expected).abs() < 1e-15);
        // Exhausted replay falls back to zeros.
        assert_eq!(noise.sample(5, 0.0), 0.0);
    }

    #[test]
    fn test_replay_remaining() {
        let mut replay = ReplayGaussian::new(vec![1.0, 2.0]);
        assert_eq!(replay.remaining(), 2);
        replay.next_standard_normal();
        replay.next_standard_normal();
        replay.next_standard_normal();
        assert_eq!(replay.remaining(), 0);
    }

    #[test]
    fn test_seeded_streams_reproduce() {
        let mut a = NoiseGenerator::from_seed(Some(42));
        let mut b = NoiseGenerator::from_seed(Some(42));
        for i in 0..64 {
            assert_eq!(a.sample(i, 1.0).to_bits(), b.sample(i, 1.0).to_bits());
        }
    }

    #[test]
    fn test_gaussian_moments() {
        let mut source = RandomGaussian::from_seed(0xC0FFEE);
        let samples: Vec<f64> = (0..20_000).map(|_| source.next_standard_normal()).collect();
        let mean = samples.iter().mean();
        let std = samples.iter().std_dev();
        assert!(mean.abs() < 0.05, "mean drifted: {mean}");
        assert!((std - 1.0).abs() < 0.05, "std drifted: {std}");
    }

    #[test]
    fn test_noise_std_dev_matches_golden_ratio() {
        let mut noise = NoiseGenerator::from_seed(Some(9));
        // Amplitude 0 isolates the Gaussian component.
        let samples: Vec<f64> = (0..20_000).map(|i| noise.sample(i, 0.0)).collect();
        let std = samples.iter().std_dev();
        assert!((std - NOISE_STD_DEV).abs() < 0.02, "std {std} vs {NOISE_STD_DEV}");
    }
}
