// Deterministic WaveFunction double for trainer tests.
//
// Chains behave like binary counters (site 0 is the most significant
// bit): every sweep adds one, so the chain pool changes on every
// update and the sweep count is easy to predict. `weights[0]` counts
// the updates that were applied.

use num_complex::Complex64;
use rand::{Rng, RngCore};

use crate::data::dataset::state_from_index;
use crate::domain::error::ModelUpdateError;
use crate::domain::parameters::{ParamGroup, ParamTensor, ParameterSet};
use crate::domain::sample::{Batch, ChainState, Sample};
use crate::domain::traits::WaveFunction;

pub struct CountingModel {
    num_visible: usize,
    weights:     Vec<f64>,
    calls:       usize,
    fail_at:     Option<usize>,
    /// Samples of every applied batch, in call order.
    pub seen:    Vec<Vec<Sample>>,
}

impl CountingModel {
    pub fn new(num_visible: usize) -> Self {
        Self { num_visible, weights: vec![0.0; num_visible], calls: 0, fail_at: None, seen: Vec::new() }
    }

    /// The `call`-th update (1-based) corrupts the parameters and the
    /// chains, then fails.
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn applied_updates(&self) -> f64 {
        self.weights[0]
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

fn increment(state: &mut [u8]) {
    for bit in state.iter_mut().rev() {
        if *bit == 0 {
            *bit = 1;
            return;
        }
        *bit = 0;
    }
}

impl WaveFunction for CountingModel {
    fn num_visible(&self) -> usize {
        self.num_visible
    }

    fn initialize(&mut self, rng: &mut dyn RngCore) {
        for w in &mut self.weights {
            *w = rng.gen_range(-1.0..1.0);
        }
    }

    fn parameters(&self) -> ParameterSet {
        let mut amplitude = ParamGroup::new();
        amplitude.insert("weights".into(), ParamTensor::new(vec![self.num_visible], self.weights.clone()));
        ParameterSet::new(amplitude, ParamGroup::new())
    }

    fn load_parameters(&mut self, params: ParameterSet) -> Result<(), ModelUpdateError> {
        let w = params
            .amplitude
            .get("weights")
            .filter(|t| t.values.len() == self.num_visible)
            .ok_or_else(|| ModelUpdateError::Incompatible("weights".into()))?;
        self.weights = w.values.clone();
        Ok(())
    }

    fn update(
        &mut self,
        batch:          &Batch<'_>,
        chains:         &mut ChainState,
        steps:          usize,
        _learning_rate: f64,
        _rng:           &mut dyn RngCore,
    ) -> Result<(), ModelUpdateError> {
        self.calls += 1;
        if let Some(s) = batch.samples.iter().find(|s| s.len() != self.num_visible) {
            return Err(ModelUpdateError::Shape { expected: self.num_visible, found: s.len() });
        }

        for chain in chains.chains_mut() {
            for _ in 0..steps {
                increment(chain);
            }
        }
        chains.advance(steps);

        if self.fail_at == Some(self.calls) {
            self.weights.iter_mut().for_each(|w| *w += 1000.0);
            return Err(ModelUpdateError::Diverged("amplitude.weights".into()));
        }

        self.weights[0] += 1.0;
        self.seen.push(batch.samples.iter().map(|s| s.to_vec()).collect());
        Ok(())
    }

    fn sample(&self, count: usize, steps: usize, _rng: &mut dyn RngCore) -> Vec<Sample> {
        let modulus = 1usize << self.num_visible;
        (0..count)
            .map(|j| {
                let mut state = state_from_index(j % modulus, self.num_visible);
                for _ in 0..steps {
                    increment(&mut state);
                }
                state
            })
            .collect()
    }

    fn amplitude(&self, _state: &[u8]) -> Complex64 {
        Complex64::new(1.0, 0.0)
    }
}
