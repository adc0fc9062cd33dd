// ============================================================
// Layer 5 — Product-State Reference Model
// ============================================================
// The smallest trainable WaveFunction: every site is independent.
//
//   ψ(s) = Π_i √p_i(s_i) · exp(i·φ_i(s_i)),   p_i(1) = σ(θ_i)
//
// Parameters
//   amplitude.logits  [n]     θ_i
//   phase.phases      [n, 2]  φ_i(0), φ_i(1)
//
// Sampling draws every site from its marginal, so a single sweep
// is already an exact sample. Training only sees computational
// (all-Z) samples; the phases are carried and persisted but never
// updated.

use num_complex::Complex64;
use rand::{Rng, RngCore};

use crate::domain::error::ModelUpdateError;
use crate::domain::parameters::{ParamGroup, ParamTensor, ParameterSet};
use crate::domain::sample::{site_means, Batch, ChainState, Sample};
use crate::domain::traits::WaveFunction;

const LOGITS: &str = "logits";
const PHASES: &str = "phases";

/// Scale of the uniform draw used by `initialize`.
const INIT_SCALE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ProductStateModel {
    num_visible: usize,
    logits:      Vec<f64>,
    phases:      Vec<[f64; 2]>,
}

impl ProductStateModel {
    /// Uniform distribution, zero phases.
    pub fn new(num_visible: usize) -> Self {
        Self {
            num_visible,
            logits: vec![0.0; num_visible],
            phases: vec![[0.0; 2]; num_visible],
        }
    }

    /// Model with the given per-site probabilities of measuring 1.
    /// Probabilities of exactly 0 or 1 give infinite logits.
    pub fn with_probabilities(probabilities: &[f64]) -> Self {
        let logits = probabilities.iter().map(|&p| (p / (1.0 - p)).ln()).collect();
        Self {
            num_visible: probabilities.len(),
            logits,
            phases: vec![[0.0; 2]; probabilities.len()],
        }
    }

    pub fn with_phases(mut self, phases: Vec<[f64; 2]>) -> Self {
        self.phases = phases;
        self
    }

    /// p_i(1) for every site.
    pub fn probabilities(&self) -> Vec<f64> {
        self.logits.iter().map(|&t| sigmoid(t)).collect()
    }

    fn site_probability(&self, site: usize, bit: u8) -> f64 {
        let theta = self.logits[site];
        if bit == 1 {
            sigmoid(theta)
        } else {
            sigmoid(-theta)
        }
    }

    fn sweep(&self, state: &mut [u8], rng: &mut dyn RngCore) {
        for (bit, &theta) in state.iter_mut().zip(&self.logits) {
            *bit = u8::from(rng.gen::<f64>() < sigmoid(theta));
        }
    }

    fn check_width(&self, sample: &[u8]) -> Result<(), ModelUpdateError> {
        if sample.len() != self.num_visible {
            return Err(ModelUpdateError::Shape { expected: self.num_visible, found: sample.len() });
        }
        Ok(())
    }
}

impl WaveFunction for ProductStateModel {
    fn num_visible(&self) -> usize {
        self.num_visible
    }

    fn initialize(&mut self, rng: &mut dyn RngCore) {
        for theta in &mut self.logits {
            *theta = rng.gen_range(-INIT_SCALE..INIT_SCALE);
        }
        for phase in &mut self.phases {
            *phase = [rng.gen_range(-INIT_SCALE..INIT_SCALE), rng.gen_range(-INIT_SCALE..INIT_SCALE)];
        }
    }

    fn parameters(&self) -> ParameterSet {
        let mut amplitude = ParamGroup::new();
        amplitude.insert(LOGITS.into(), ParamTensor::new(vec![self.num_visible], self.logits.clone()));

        let mut phase = ParamGroup::new();
        phase.insert(
            PHASES.into(),
            ParamTensor::new(vec![self.num_visible, 2], self.phases.iter().flatten().copied().collect()),
        );
        ParameterSet::new(amplitude, phase)
    }

    fn load_parameters(&mut self, params: ParameterSet) -> Result<(), ModelUpdateError> {
        let n = self.num_visible;

        let logits = params
            .amplitude
            .get(LOGITS)
            .ok_or_else(|| ModelUpdateError::Incompatible(format!("missing amplitude.{LOGITS}")))?;
        if logits.shape != [n] || logits.values.len() != n {
            return Err(ModelUpdateError::Incompatible(format!(
                "amplitude.{LOGITS} has shape {:?}, expected [{n}]",
                logits.shape
            )));
        }

        let phases = params
            .phase
            .get(PHASES)
            .ok_or_else(|| ModelUpdateError::Incompatible(format!("missing phase.{PHASES}")))?;
        if phases.shape != [n, 2] || phases.values.len() != 2 * n {
            return Err(ModelUpdateError::Incompatible(format!(
                "phase.{PHASES} has shape {:?}, expected [{n}, 2]",
                phases.shape
            )));
        }

        self.logits = logits.values.clone();
        self.phases = phases.values.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        Ok(())
    }

    fn update(
        &mut self,
        batch:         &Batch<'_>,
        chains:        &mut ChainState,
        steps:         usize,
        learning_rate: f64,
        rng:           &mut dyn RngCore,
    ) -> Result<(), ModelUpdateError> {
        for sample in &batch.samples {
            self.check_width(sample)?;
        }
        for chain in chains.chains() {
            self.check_width(chain)?;
        }

        let positive = site_means(batch.computational());

        for chain in chains.chains_mut() {
            for _ in 0..steps {
                self.sweep(chain, rng);
            }
        }
        chains.advance(steps);

        // No computational samples in this batch: nothing to learn from
        if positive.is_empty() || chains.is_empty() {
            return Ok(());
        }
        let negative = chains.site_means();

        let next: Vec<f64> = self
            .logits
            .iter()
            .zip(positive.iter().zip(&negative))
            .map(|(theta, (pos, neg))| theta + learning_rate * (pos - neg))
            .collect();
        if next.iter().any(|t| !t.is_finite()) {
            return Err(ModelUpdateError::Diverged(format!("amplitude.{LOGITS}")));
        }
        self.logits = next;
        Ok(())
    }

    fn sample(&self, count: usize, steps: usize, rng: &mut dyn RngCore) -> Vec<Sample> {
        (0..count)
            .map(|_| {
                let mut state: Sample = (0..self.num_visible).map(|_| u8::from(rng.gen::<bool>())).collect();
                for _ in 0..steps {
                    self.sweep(&mut state, rng);
                }
                state
            })
            .collect()
    }

    fn amplitude(&self, state: &[u8]) -> Complex64 {
        let (modulus, phase) = state.iter().enumerate().fold((1.0, 0.0), |(m, p), (site, &bit)| {
            let b = usize::from(bit == 1);
            (m * self.site_probability(site, bit).sqrt(), p + self.phases[site][b])
        });
        Complex64::from_polar(modulus, phase)
    }
}

/// Logistic function, stable for large |x| and exact at ±∞.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::state_from_index;
    use crate::domain::basis::BasisLabel;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn norm(model: &ProductStateModel) -> f64 {
        let n = model.num_visible();
        (0..1usize << n).map(|i| model.amplitude(&state_from_index(i, n)).norm_sqr()).sum()
    }

    #[test]
    fn test_amplitudes_are_normalised() {
        let model = ProductStateModel::with_probabilities(&[0.1, 0.6, 0.9]).with_phases(vec![[0.3, 1.2]; 3]);
        assert_abs_diff_eq!(norm(&model), 1.0, epsilon = 1e-12);

        let mut rng   = StdRng::seed_from_u64(7);
        let mut model = ProductStateModel::new(4);
        model.initialize(&mut rng);
        assert_abs_diff_eq!(norm(&model), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_amplitude_of_known_state() {
        let model = ProductStateModel::with_probabilities(&[0.25, 0.5]).with_phases(vec![[0.0, 0.5], [0.2, 0.0]]);
        // s = (1, 0): √0.25 · √0.5 · e^{i(0.5 + 0.2)}
        let a = model.amplitude(&[1, 0]);
        assert_abs_diff_eq!(a.norm(), (0.25f64 * 0.5).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.arg(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_parameters_round_trip() {
        let mut rng   = StdRng::seed_from_u64(1);
        let mut model = ProductStateModel::new(3);
        model.initialize(&mut rng);
        let params = model.parameters();

        let mut other = ProductStateModel::new(3);
        other.load_parameters(params.clone()).unwrap();
        assert!(other.parameters().bit_eq(&params));
        assert_eq!(other, model);
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        let params = ProductStateModel::new(2).parameters();
        let mut model = ProductStateModel::new(3);
        assert!(matches!(model.load_parameters(params), Err(ModelUpdateError::Incompatible(_))));
        assert!(matches!(
            model.load_parameters(ParameterSet::default()),
            Err(ModelUpdateError::Incompatible(_))
        ));
    }

    #[test]
    fn test_training_moves_towards_data() {
        let mut rng   = StdRng::seed_from_u64(3);
        let mut model = ProductStateModel::new(2);
        let z         = BasisLabel::computational(2);
        let data      = vec![vec![1u8, 0u8]; 16];
        let batch     = Batch {
            samples: data.iter().map(Vec::as_slice).collect(),
            bases:   vec![&z; data.len()],
        };

        let mut chains = ChainState::new(model.sample(64, 1, &mut rng));
        for _ in 0..200 {
            model.update(&batch, &mut chains, 1, 0.2, &mut rng).unwrap();
        }
        let p = model.probabilities();
        assert!(p[0] > 0.9, "p(s0 = 1) = {}", p[0]);
        assert!(p[1] < 0.1, "p(s1 = 1) = {}", p[1]);
        assert_eq!(chains.sweeps(), 200);
    }

    #[test]
    fn test_non_computational_batch_only_evolves_chains() {
        let mut rng   = StdRng::seed_from_u64(5);
        let mut model = ProductStateModel::new(2);
        let x: BasisLabel = "XX".parse().unwrap();
        let data      = [vec![1u8, 1u8]];
        let batch     = Batch { samples: vec![data[0].as_slice()], bases: vec![&x] };
        let before    = model.parameters();

        let mut chains = ChainState::new(model.sample(8, 1, &mut rng));
        model.update(&batch, &mut chains, 3, 0.5, &mut rng).unwrap();
        assert!(model.parameters().bit_eq(&before));
        assert_eq!(chains.sweeps(), 3);
    }

    #[test]
    fn test_width_mismatch() {
        let mut rng    = StdRng::seed_from_u64(0);
        let mut model  = ProductStateModel::new(3);
        let z          = BasisLabel::computational(2);
        let data       = [vec![0u8, 1u8]];
        let batch      = Batch { samples: vec![data[0].as_slice()], bases: vec![&z] };
        let mut chains = ChainState::new(model.sample(4, 1, &mut rng));
        assert!(matches!(
            model.update(&batch, &mut chains, 1, 0.1, &mut rng),
            Err(ModelUpdateError::Shape { expected: 3, found: 2 })
        ));
        assert_eq!(chains.sweeps(), 0);
    }

    #[test]
    fn test_divergence_is_reported() {
        let mut rng    = StdRng::seed_from_u64(0);
        let mut model  = ProductStateModel::new(1);
        let z          = BasisLabel::computational(1);
        let data       = [vec![1u8]];
        let batch      = Batch { samples: vec![data[0].as_slice()], bases: vec![&z] };
        let mut chains = ChainState::new(vec![vec![0]; 4]);
        let result     = model.update(&batch, &mut chains, 1, f64::INFINITY, &mut rng);
        // Either the step is +inf (diverged) or pos == neg gives NaN
        assert!(matches!(result, Err(ModelUpdateError::Diverged(_))));
    }

    #[test]
    fn test_sample_width_and_bits() {
        let mut rng = StdRng::seed_from_u64(11);
        let model   = ProductStateModel::with_probabilities(&[0.0, 1.0, 0.5]);
        let samples = model.sample(32, 2, &mut rng);
        assert_eq!(samples.len(), 32);
        for s in samples {
            assert_eq!(s.len(), 3);
            assert_eq!(s[0], 0);
            assert_eq!(s[1], 1);
            assert!(s[2] <= 1);
        }
    }
}
