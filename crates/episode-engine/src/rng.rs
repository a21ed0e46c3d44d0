//! Randomness Sources
//!
//! Two deliberately separate sources: [`SeededStream`] for anything that is
//! graded or must be replayable, and [`EntropySource`] for cosmetic practice
//! content. Generation entry points take the concrete type they need so the
//! two modes cannot be swapped by accident.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MULTIPLIER: u64 = 9301;
const INCREMENT: u64 = 49297;
const MODULUS: u64 = 233280;

/// A source of uniform values in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// Uniform value in `[low, high)`.
    fn next_between(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_unit()
    }
}

/// Deterministic linear-congruential stream.
///
/// `state = (state * 9301 + 49297) mod 233280`, output `state / 233280`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededStream {
    seed: u64,
}

impl SeededStream {
    /// Create a stream from any integer seed.
    ///
    /// The seed is reduced modulo 233280 up front; for non-negative seeds this
    /// yields exactly the same outputs as applying the recurrence directly.
    pub fn new(seed: i64) -> Self {
        Self {
            seed: seed.rem_euclid(MODULUS as i64) as u64,
        }
    }

    /// Current internal state.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next(&mut self) -> f64 {
        self.seed = (self.seed * MULTIPLIER + INCREMENT) % MODULUS;
        self.seed as f64 / MODULUS as f64
    }
}

impl RandomSource for SeededStream {
    fn next_unit(&mut self) -> f64 {
        self.next()
    }
}

/// Unconstrained source for non-graded content. Never use for exams.
#[derive(Debug)]
pub struct EntropySource {
    rng: StdRng,
}

impl EntropySource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw a fresh scenario seed.
    pub fn draw_seed(&mut self) -> i64 {
        self.rng.gen_range(0..MODULUS as i64)
    }
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropySource {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededStream::new(12345);
        let mut b = SeededStream::new(12345);

        for _ in 0..10_000 {
            assert_eq!(a.next().to_bits(), b.next().to_bits());
        }
    }

    #[test]
    fn test_known_first_values() {
        let mut rng = SeededStream::new(1);
        // (1 * 9301 + 49297) % 233280 = 58598
        assert_eq!(rng.next(), 58598.0 / 233280.0);
        // (58598 * 9301 + 49297) % 233280
        let expected = ((58598u64 * 9301 + 49297) % 233280) as f64 / 233280.0;
        assert_eq!(rng.next(), expected);
    }

    #[test]
    fn test_output_in_unit_interval() {
        for seed in [-7_i64, 0, 1, 233_279, 233_280, i64::MAX, i64::MIN] {
            let mut rng = SeededStream::new(seed);
            for _ in 0..1_000 {
                let v = rng.next();
                assert!((0.0..1.0).contains(&v), "seed {} produced {}", seed, v);
            }
        }
    }

    #[test]
    fn test_large_seed_matches_reduced_seed() {
        let mut big = SeededStream::new(233_280 + 42);
        let mut small = SeededStream::new(42);
        for _ in 0..100 {
            assert_eq!(big.next(), small.next());
        }
    }

    #[test]
    fn test_entropy_source_in_range() {
        let mut source = EntropySource::new();
        for _ in 0..100 {
            let v = source.next_between(2.0, 3.0);
            assert!((2.0..3.0).contains(&v));
        }
        let seed = source.draw_seed();
        assert!((0..233_280).contains(&seed));
    }
}
