//! Splittable RNG keys for deterministic shuffling and dataset splits.
//!
//! Keys are u64 seeds; splitting draws child seeds from ChaCha8 so the same
//! parent always yields the same children.

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngKey(pub u64);

impl RngKey {
    pub fn new(seed: u64) -> Self {
        RngKey(seed)
    }

    /// Split this key into `n` independent keys.
    pub fn split(self, n: usize) -> Vec<RngKey> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![self];
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        (0..n).map(|_| RngKey(rng.next_u64())).collect()
    }

    pub fn split_two(self) -> (RngKey, RngKey) {
        let keys = self.split(2);
        (keys[0], keys[1])
    }

    /// A generator seeded from this key.
    pub fn rng(self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Deterministic, uniformly shuffled permutation of `0..n`.
    pub fn permutation(self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng());
        order
    }

    pub fn seed(&self) -> u64 {
        self.0
    }
}
