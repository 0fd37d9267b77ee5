//! Injectable randomness
//!
//! The variation model and the probabilistic insight cadence draw all their
//! randomness from a `NoiseSource`, so tests can swap in a silent or fixed source
//! and assert exact values for the deterministic part.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomness for the simulation
pub trait NoiseSource: Send {
    /// Uniform sample in [-1, 1)
    fn symmetric(&mut self) -> f64;

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool;
}

/// Noise drawn from a `rand` generator
pub struct RngNoise<R = StdRng> {
    rng: R,
}

impl RngNoise<StdRng> {
    /// Reproducible noise
    pub fn seeded(seed: u64) -> Self {
        RngNoise {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Noise seeded from the OS
    pub fn from_entropy() -> Self {
        RngNoise {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> RngNoise<R> {
    pub fn new(rng: R) -> Self {
        RngNoise { rng }
    }
}

impl<R: Rng + Send> NoiseSource for RngNoise<R> {
    fn symmetric(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }

    fn chance(&mut self, p: f64) -> bool {
        if p.is_nan() || p <= 0.0 {
            return false;
        }
        self.rng.gen_bool(p.min(1.0))
    }
}

/// No noise at all: `symmetric` is 0 and `chance` never fires
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNoise;

impl NoiseSource for SilentNoise {
    fn symmetric(&mut self) -> f64 {
        0.0
    }

    fn chance(&mut self, _p: f64) -> bool {
        false
    }
}

/// Constant noise, for steering tests
#[derive(Clone, Copy, Debug)]
pub struct FixedNoise {
    pub sample: f64,
    pub fire: bool,
}

impl NoiseSource for FixedNoise {
    fn symmetric(&mut self) -> f64 {
        self.sample.clamp(-1.0, 1.0)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.fire && p > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = RngNoise::seeded(7);
        let mut b = RngNoise::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.symmetric(), b.symmetric());
        }
    }

    #[test]
    fn test_symmetric_range() {
        let mut noise = RngNoise::seeded(11);
        for _ in 0..1000 {
            let s = noise.symmetric();
            assert!((-1.0..1.0).contains(&s));
        }
    }

    #[test]
    fn test_chance_edges() {
        let mut noise = RngNoise::seeded(3);
        assert!(!noise.chance(0.0));
        assert!(!noise.chance(f64::NAN));
        assert!(noise.chance(1.0));
        assert!(noise.chance(2.0));
    }

    #[test]
    fn test_silent_noise() {
        let mut noise = SilentNoise;
        assert_eq!(noise.symmetric(), 0.0);
        assert!(!noise.chance(1.0));
    }
}
