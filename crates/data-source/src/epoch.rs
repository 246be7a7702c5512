//! Deterministic per-epoch shuffling
//!
//! Each epoch gets its own permutation derived from a base seed, so the order
//! of any epoch can be rebuilt from `(seed, epoch)` alone after a restore.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use runtime_core::Epoch;
use std::sync::Arc;

/// Produces record orderings for each epoch
#[derive(Debug, Clone)]
pub struct EpochShuffler {
    /// Base seed for deterministic shuffling
    base_seed: u64,

    /// Whether to shuffle at all
    shuffle: bool,

    /// Most recently built order: (epoch, len) -> indices
    cached: Option<(Epoch, u64, Arc<Vec<u64>>)>,
}

impl EpochShuffler {
    /// Create a shuffler with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            base_seed: seed,
            shuffle: true,
            cached: None,
        }
    }

    /// A shuffler that keeps records in their stored order
    pub fn sequential() -> Self {
        Self {
            base_seed: 0,
            shuffle: false,
            cached: None,
        }
    }

    /// Get the base seed for reproducibility
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Record indices for `epoch` over a dataset of `len` records
    pub fn order(&mut self, epoch: Epoch, len: u64) -> Arc<Vec<u64>> {
        if let Some((cached_epoch, cached_len, order)) = &self.cached {
            if *cached_epoch == epoch && *cached_len == len {
                return Arc::clone(order);
            }
        }

        let mut indices: Vec<u64> = (0..len).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.epoch_seed(epoch));
            indices.shuffle(&mut rng);
        }

        tracing::debug!(epoch, len, shuffled = self.shuffle, "Built epoch order");

        let order = Arc::new(indices);
        self.cached = Some((epoch, len, Arc::clone(&order)));
        order
    }

    /// Mix the base seed and epoch with splitmix64 so the result does not
    /// depend on the standard library's hasher
    fn epoch_seed(&self, epoch: Epoch) -> u64 {
        let mut z = self
            .base_seed
            .wrapping_add(epoch.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
