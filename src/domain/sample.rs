use crate::domain::basis::BasisLabel;

/// One measurement outcome per visible unit, each 0 or 1.
pub type Sample = Vec<u8>;

// ─── Batch ────────────────────────────────────────────────────────────────────
/// Borrowed view of the positive-phase samples for one update step.
/// `samples[i]` was measured in `bases[i]`.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    pub samples: Vec<&'a [u8]>,
    pub bases:   Vec<&'a BasisLabel>,
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples measured in the computational basis.
    pub fn computational(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.samples
            .iter()
            .zip(&self.bases)
            .filter(|(_, b)| b.is_computational())
            .map(|(s, _)| *s)
    }
}

// ─── ChainState ───────────────────────────────────────────────────────────────
/// Persistent negative-phase Markov chains.
///
/// Owned by the trainer and lent to the model on every update, so the
/// chains carry over from batch to batch and epoch to epoch. `sweeps`
/// counts how many sampling sweeps have been applied since the pool
/// was drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    chains: Vec<Sample>,
    sweeps: u64,
}

impl ChainState {
    pub fn new(chains: Vec<Sample>) -> Self {
        Self { chains, sweeps: 0 }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn chains(&self) -> &[Sample] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [Sample] {
        &mut self.chains
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Record that `n` sweeps were applied to every chain.
    pub fn advance(&mut self, n: usize) {
        self.sweeps += n as u64;
    }

    /// Per-site mean over all chains.
    pub fn site_means(&self) -> Vec<f64> {
        site_means(self.chains.iter().map(Vec::as_slice))
    }
}

/// Per-site mean of a set of equal-width samples. Empty input gives an
/// empty vector.
pub fn site_means<'s>(samples: impl IntoIterator<Item = &'s [u8]>) -> Vec<f64> {
    let mut sums: Vec<f64> = Vec::new();
    let mut count          = 0usize;
    for s in samples {
        if sums.is_empty() {
            sums = vec![0.0; s.len()];
        }
        for (acc, &v) in sums.iter_mut().zip(s) {
            *acc += f64::from(v);
        }
        count += 1;
    }
    if count > 0 {
        sums.iter_mut().for_each(|v| *v /= count as f64);
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_means() {
        let chains = ChainState::new(vec![vec![1, 0, 1], vec![1, 1, 0]]);
        assert_eq!(chains.site_means(), vec![1.0, 0.5, 0.5]);
        assert!(ChainState::new(vec![]).site_means().is_empty());
    }

    #[test]
    fn test_advance_counts_sweeps() {
        let mut chains = ChainState::new(vec![vec![0]]);
        chains.advance(3);
        chains.advance(2);
        assert_eq!(chains.sweeps(), 5);
    }

    #[test]
    fn test_batch_computational_filter() {
        let z: BasisLabel = "ZZ".parse().unwrap();
        let x: BasisLabel = "XZ".parse().unwrap();
        let a = vec![0u8, 1];
        let b = vec![1u8, 1];
        let batch = Batch { samples: vec![&a, &b], bases: vec![&z, &x] };
        let picked: Vec<&[u8]> = batch.computational().collect();
        assert_eq!(picked, vec![a.as_slice()]);
    }
}
