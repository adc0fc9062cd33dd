// ============================================================
// Layer 4 — Positive-Phase Batcher
// ============================================================
// Partitions dataset indices into mini-batches, once per epoch.
//
// Partial-batch policy:
//   The last batch holds the remainder (len % batch_size) and is
//   kept as-is: never dropped, never padded. Every sample is
//   therefore visited exactly once per epoch.
//
// Ordering:
//   Without shuffling, batches follow dataset order every epoch.
//   With shuffling, the permutation is redrawn each epoch from an
//   RNG seeded once, so a run with the same seed repeats exactly.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Produces the batch index lists for successive epochs.
pub struct Batcher {
    batch_size: usize,
    order:      Vec<usize>,
    shuffle:    Option<StdRng>,
}

impl Batcher {
    /// Batches in dataset order.
    pub fn sequential(len: usize, batch_size: usize) -> Self {
        Self { batch_size, order: (0..len).collect(), shuffle: None }
    }

    /// Batches in a fresh seeded permutation each epoch.
    pub fn shuffled(len: usize, batch_size: usize, seed: u64) -> Self {
        Self {
            batch_size,
            order:   (0..len).collect(),
            shuffle: Some(StdRng::seed_from_u64(seed)),
        }
    }

    /// Number of batches per epoch, counting the partial one.
    pub fn batches_per_epoch(&self) -> usize {
        self.order.len().div_ceil(self.batch_size.max(1))
    }

    /// Index lists for the next epoch.
    pub fn next_epoch(&mut self) -> Vec<Vec<usize>> {
        if let Some(rng) = self.shuffle.as_mut() {
            self.order.shuffle(rng);
        }
        partition(&self.order, self.batch_size)
    }
}

/// Split `order` into consecutive chunks of `batch_size`; the last
/// chunk may be shorter.
pub fn partition(order: &[usize], batch_size: usize) -> Vec<Vec<usize>> {
    order.chunks(batch_size.max(1)).map(<[usize]>::to_vec).collect()
}
