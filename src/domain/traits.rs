// ============================================================
// Layer 3 — Core Traits
// ============================================================
// The training loop only ever talks to a model through the
// WaveFunction trait. Implementations:
//   - ProductStateModel (ml/product.rs), the bundled baseline
//   - test doubles in ml/testing.rs
//
// The trait is object safe: the trainer takes
// `&mut dyn WaveFunction`, and randomness is passed in as
// `&mut dyn RngCore` so a seeded run stays reproducible.

use num_complex::Complex64;
use rand::RngCore;

use crate::domain::error::ModelUpdateError;
use crate::domain::parameters::ParameterSet;
use crate::domain::sample::{Batch, ChainState, Sample};

/// Capability interface of a trainable wavefunction.
pub trait WaveFunction {
    /// Number of visible units (qubits).
    fn num_visible(&self) -> usize;

    /// Replace all parameters with a fresh random draw.
    fn initialize(&mut self, rng: &mut dyn RngCore);

    /// Snapshot of the current parameters.
    fn parameters(&self) -> ParameterSet;

    /// Replace the parameters wholesale. Shapes must match.
    fn load_parameters(&mut self, params: ParameterSet) -> Result<(), ModelUpdateError>;

    /// One contrastive-divergence step.
    ///
    /// `chains` is evolved in place by `steps` sampling sweeps and then
    /// used as the negative phase. Parameters are mutated in place.
    fn update(
        &mut self,
        batch:         &Batch<'_>,
        chains:        &mut ChainState,
        steps:         usize,
        learning_rate: f64,
        rng:           &mut dyn RngCore,
    ) -> Result<(), ModelUpdateError>;

    /// Draw `count` fresh samples using `steps` sweeps per chain.
    fn sample(&self, count: usize, steps: usize, rng: &mut dyn RngCore) -> Vec<Sample>;

    /// Unnormalised complex amplitude of a computational basis state.
    fn amplitude(&self, state: &[u8]) -> Complex64;
}

