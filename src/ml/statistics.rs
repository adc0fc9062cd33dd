// ============================================================
// Layer 5 — Training Statistics
// ============================================================
// Distances between the model's induced state and the reference
// target, computed by enumerating the full Hilbert space through
// WaveFunction::amplitude. Monitoring only; never fed back into
// training.
//
//   fidelity       |<ψ_target|ψ_model>|² with both states normalised
//   kl_divergence  Σ p_target · ln(p_target / p_model) over the
//                  computational basis
//
// Enumeration is exponential in the number of sites and is
// refused above MAX_ENUMERABLE_SITES.

use num_complex::Complex64;

use crate::data::dataset::{state_from_index, TargetState};
use crate::domain::basis::BasisLabel;
use crate::domain::error::MetricComputationError;
use crate::domain::traits::WaveFunction;

pub const MAX_ENUMERABLE_SITES: usize = 24;

/// Everything a metric function may look at.
pub struct MetricContext<'a> {
    pub epoch:  usize,
    pub model:  &'a dyn WaveFunction,
    pub target: Option<&'a TargetState>,
    /// Reference bases (the full basis set or a chosen subset)
    pub bases:  &'a [BasisLabel],
}

impl<'a> MetricContext<'a> {
    pub fn require_target(&self) -> Result<&'a TargetState, MetricComputationError> {
        self.target.ok_or(MetricComputationError::MissingTarget)
    }
}

/// Unnormalised model amplitudes for every basis state, index order
/// matching `TargetState`.
pub fn model_amplitudes(model: &dyn WaveFunction) -> Result<Vec<Complex64>, MetricComputationError> {
    let n = model.num_visible();
    if n > MAX_ENUMERABLE_SITES {
        return Err(MetricComputationError::TooLarge(n));
    }
    Ok((0..1usize << n).map(|i| model.amplitude(&state_from_index(i, n))).collect())
}

/// Σ |ψ(s)|² over the Hilbert space.
pub fn partition_function(model: &dyn WaveFunction) -> Result<f64, MetricComputationError> {
    Ok(model_amplitudes(model)?.iter().map(Complex64::norm_sqr).sum())
}

fn checked_pair<'a>(
    ctx: &MetricContext<'a>,
) -> Result<(&'a TargetState, Vec<Complex64>, f64), MetricComputationError> {
    let target = ctx.require_target()?;
    if target.num_visible() != ctx.model.num_visible() {
        return Err(MetricComputationError::Other(format!(
            "target has {} sites, model has {}",
            target.num_visible(),
            ctx.model.num_visible()
        )));
    }

    let psi = model_amplitudes(ctx.model)?;
    let z   = psi.iter().map(Complex64::norm_sqr).sum::<f64>();
    if !(z.is_finite() && z > 0.0) {
        return Err(MetricComputationError::ZeroNorm);
    }
    let target_norm = target.norm_sqr();
    if !(target_norm.is_finite() && target_norm > 0.0) {
        return Err(MetricComputationError::Other("target is not normalisable".into()));
    }
    Ok((target, psi, z))
}

fn finite(name: &str, value: f64) -> Result<f64, MetricComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricComputationError::Other(format!("{name} is not finite ({value})")))
    }
}

pub fn fidelity(ctx: &MetricContext<'_>) -> Result<f64, MetricComputationError> {
    let (target, psi, z) = checked_pair(ctx)?;
    let target_norm      = target.norm_sqr();

    let overlap: Complex64 = target
        .amplitudes()
        .iter()
        .zip(&psi)
        .map(|(t, m)| t.conj() * m)
        .sum();

    finite("fidelity", overlap.norm_sqr() / (z * target_norm))
}

pub fn kl_divergence(ctx: &MetricContext<'_>) -> Result<f64, MetricComputationError> {
    let (target, psi, z) = checked_pair(ctx)?;

    let mut kl = 0.0;
    for (i, (p_t, m)) in target.probabilities().into_iter().zip(&psi).enumerate() {
        if p_t <= 0.0 {
            continue;
        }
        let p_m = m.norm_sqr() / z;
        if p_m <= 0.0 {
            return Err(MetricComputationError::Unsupported(i));
        }
        kl += p_t * (p_t / p_m).ln();
    }
    finite("kl_divergence", kl)
}
