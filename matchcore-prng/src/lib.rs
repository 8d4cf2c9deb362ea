// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// This is a hand-rolled implementation with zero external dependencies, chosen
// for portability and to guarantee identical output across all platforms.
//
// This crate is the single PRNG used by the match simulation core
// (`matchcore`) and by every callback it schedules — ball physics, player
// physics, AI, vision. By sharing one PRNG, we avoid depending on external
// RNG crates (like `rand`) and guarantee deterministic, reproducible output
// given the same seed and external-event log.
//
// **Critical constraint: determinism.** Every method on `MatchRng` must
// produce identical output given the same prior state, regardless of
// platform, compiler version, or optimization level. Do not use
// floating-point arithmetic in the core generator, stdlib PRNG, or any
// source of non-determinism in this module.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG — the match simulation's sole source of randomness.
///
/// Exactly one `MatchRng` exists per match (see `matchcore::Match`), seeded
/// deterministically from the match seed. Every stochastic decision inside a
/// scheduled callback — AI dice rolls, physics noise, event-timing jitter,
/// referee discretion — draws from it, and from no other source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRng {
    s: [u64; 4],
}

impl MatchRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two `MatchRng` instances created with the same seed will produce
    /// identical output sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a `u32` by taking the upper 32 bits of a `u64`.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Generate a uniform `f32` in [0, 1).
    ///
    /// Uses the upper 24 bits of a `u64` to fill the mantissa of an f32.
    /// This is the standard technique — 24 bits gives full f32 precision.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa of an f64.
    /// 53 bits gives full f64 precision (IEEE 754 double has a 52-bit
    /// mantissa + 1 implicit bit).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate 16 random bytes (used for deterministic entity-ID generation).
    pub fn next_128_bits(&mut self) -> [u8; 16] {
        let a = self.next_u64().to_le_bytes();
        let b = self.next_u64().to_le_bytes();
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&a);
        out[8..].copy_from_slice(&b);
        out
    }

    /// Generate a uniform random value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        assert!(low < high, "range_f32: low must be less than high");
        low + self.next_f32() * (high - low)
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        // Rejection sampling to avoid modulo bias.
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Delegates to `range_u64` for the actual sampling.
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Generate a uniform random `usize` in `[low, high]` (inclusive on both ends).
    ///
    /// Panics if `low > high`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "range_usize_inclusive: low must be <= high");
        self.range_u64(low as u64, high as u64 + 1) as usize
    }

    /// Generate a uniform random `u8` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_u8(&mut self, low: u8, high: u8) -> u8 {
        self.range_u64(low as u64, high as u64) as u8
    }

    /// Return `true` with probability `p`, `false` otherwise.
    ///
    /// `p` should be in [0.0, 1.0]. Values outside this range are clamped:
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Sample a standard normal value (mean 0, stddev 1) via the Box-Muller
    /// transform, then scale to `mean`/`std_dev`.
    ///
    /// Used for physics noise and attribute jitter where a uniform
    /// distribution would look too mechanical. Consumes two `f64` draws.
    pub fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // Avoid ln(0.0) by excluding 0 from the first draw's range.
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        let mag = std_dev * (-2.0 * u1.ln()).sqrt();
        mean + mag * (std::f64::consts::TAU * u2).cos()
    }

    /// Pick an index into `weights` with probability proportional to its
    /// weight. Weights must be non-negative and sum to a positive total;
    /// panics otherwise.
    ///
    /// Used for AI decision weighting (utility selection among candidate
    /// actions) and any other weighted-choice roll a callback needs.
    pub fn weighted_index(&mut self, weights: &[f32]) -> usize {
        let total: f32 = weights.iter().sum();
        assert!(total > 0.0, "weighted_index: weights must sum to > 0");
        let target = self.range_f32(0.0, total);
        let mut cumulative = 0.0f32;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if target < cumulative {
                return i;
            }
        }
        // Floating-point rounding can leave `target` a hair above the last
        // cumulative sum; the last index is the correct fallback.
        weights.len() - 1
    }
}

/// SplitMix64 — used only for seeding xoshiro256++ from a single `u64`.
///
/// This is the standard recommendation from the xoshiro authors for
/// expanding a small seed into a larger state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
