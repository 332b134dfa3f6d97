// Copyright (c) 2024 Mike Tsao

//! Provides the seeded random-number source that players draw velocity,
//! swing, and probability values from.

use byteorder::{BigEndian, ByteOrder};
use delegate::delegate;

/// A pseudorandom number generator (PRNG) for applications such as step
/// sequencers that don't require cryptographically secure random numbers.
///
/// Every player owns one, derived from the session seed and the player's uid,
/// so a run is reproducible no matter which worker thread evaluates which
/// player.
#[derive(Debug, Clone)]
pub struct Rng(oorandom::Rand64);
impl Default for Rng {
    fn default() -> Self {
        // If the OS can't hand us entropy, something is badly wrong, but the
        // sequencer can still run with a fixed stream.
        Self::new_with_seed(Self::generate_seed().unwrap_or(Self::FALLBACK_SEED))
    }
}
#[allow(missing_docs)]
impl Rng {
    const FALLBACK_SEED: u128 = 0x5eed_5eed_5eed_5eed;

    /// Pass the same number to [Rng::new_with_seed()] to get the same stream
    /// back again. Good for reproducing test failures.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// Create a sufficiently high-quality random number that's suitable for
    /// [Rng].
    pub fn generate_seed() -> anyhow::Result<u128> {
        let mut bytes = [0u8; 16];

        getrandom::getrandom(&mut bytes)?;
        Ok(BigEndian::read_u128(&bytes))
    }

    /// Derives an independent stream for a child (a player, or a ratchet
    /// spawned by one) from a base seed and a salt.
    pub fn derive_seed(base_seed: u128, salt: i64) -> u128 {
        // SplitMix-style scramble so that neighboring salts diverge quickly.
        let mut z = (base_seed as u64) ^ (salt as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        ((base_seed >> 64) << 64) | z as u128
    }

    delegate! {
        to self.0 {
            pub fn rand_u64(&mut self) -> u64;
            pub fn rand_float(&mut self) -> f64;
            pub fn rand_range(&mut self, range: core::ops::Range<u64>) -> u64;
        }
    }

    /// A uniform draw from `[low, high)`. An empty range yields `low`.
    pub fn rand_between(&mut self, low: u64, high: u64) -> u64 {
        if high > low {
            self.rand_range(low..high)
        } else {
            low
        }
    }

    /// A uniform integer draw from `[0, 100)`.
    pub fn rand_percent(&mut self) -> u64 {
        self.rand_range(0..100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainline() {
        let mut r = Rng::default();
        assert_ne!(r.rand_u64(), r.rand_u64());
    }

    #[test]
    fn reproducible_stream() {
        let mut r1 = Rng::new_with_seed(1);
        let mut r2 = Rng::new_with_seed(2);
        assert!(
            (0..100).any(|_| r1.rand_u64() != r2.rand_u64()),
            "RNGs with different seeds should produce different streams."
        );

        let mut r1 = Rng::new_with_seed(1);
        let mut r2 = Rng::new_with_seed(1);
        assert!(
            (0..100).all(|_| r1.rand_u64() == r2.rand_u64()),
            "RNGs with same seeds should produce same streams."
        );
    }

    #[test]
    fn derived_seeds_differ_by_salt() {
        let a = Rng::derive_seed(42, 1);
        let b = Rng::derive_seed(42, 2);
        let c = Rng::derive_seed(42, -1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Rng::derive_seed(42, 1));
    }

    #[test]
    fn ranges_are_respected() {
        let mut r = Rng::new_with_seed(7);
        for _ in 0..1000 {
            assert!(r.rand_percent() < 100);
            let v = r.rand_between(60, 61);
            assert_eq!(v, 60);
        }
        assert_eq!(r.rand_between(10, 10), 10, "empty range yields its low end");
        assert_eq!(r.rand_between(10, 3), 10);
    }
}
