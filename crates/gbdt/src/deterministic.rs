//! Deterministic utilities for reproducible training
//!
//! Provides an LCG-based RNG and tie-breaking logic so that identical inputs
//! and seeds produce identical models across platforms and runs.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    // LCG constants (compatible with glibc)
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping((seed % Self::MODULUS as u64) as i64),
        }
    }

    /// Generate next random i64 in range [0, MODULUS)
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        (self.state.0 & (Self::MODULUS - 1)).abs()
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }

    /// Uniform value in [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        self.next_i64() as f64 / Self::MODULUS as f64
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }

    /// Random permutation of `0..n`
    pub fn permutation(&mut self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        self.shuffle(&mut indices);
        indices
    }
}

/// Deterministic tie-breaker for split selection
/// Returns consistent ordering based on (feature_idx, bin, node_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub bin: usize,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, bin: usize, node_id: usize) -> Self {
        Self {
            feature_idx,
            bin,
            node_id,
        }
    }
}

/// Keep `candidate` over `current` when it has strictly more gain, or equal
/// gain and a smaller tie-breaker.
pub(crate) fn prefer(
    candidate_gain: f64,
    candidate_tie: SplitTieBreaker,
    current: Option<(f64, SplitTieBreaker)>,
) -> bool {
    match current {
        None => true,
        Some((gain, tie)) => {
            candidate_gain > gain || (candidate_gain == gain && candidate_tie < tie)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..100 {
            let val = rng.next_range(10);
            assert!(val < 10);
        }
    }

    #[test]
    fn test_unit_interval() {
        let mut rng = LcgRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_permutation_is_complete() {
        let mut rng = LcgRng::new(3);
        let mut perm = rng.permutation(50);
        perm.sort_unstable();
        assert_eq!(perm, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 100, 0);
        let t2 = SplitTieBreaker::new(0, 100, 1);
        let t3 = SplitTieBreaker::new(1, 50, 0);

        assert!(t1 < t2);
        assert!(t1 < t3);
    }

    #[test]
    fn test_prefer_on_equal_gain() {
        let low = SplitTieBreaker::new(0, 1, 0);
        let high = SplitTieBreaker::new(2, 0, 0);
        assert!(prefer(1.0, low, Some((1.0, high))));
        assert!(!prefer(1.0, high, Some((1.0, low))));
        assert!(prefer(2.0, high, Some((1.0, low))));
    }
}
