use num_complex::Complex64;
use std::collections::HashMap;

use crate::domain::basis::BasisLabel;
use crate::domain::error::DataFormatError;
use crate::domain::sample::{Batch, Sample};

// ─── TargetState ──────────────────────────────────────────────────────────────
/// Reference wavefunction over the full computational basis.
/// Index `i` encodes the state with site 0 as the most significant bit.
/// Amplitudes are finite and not all zero.
/// Used for evaluation only.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    num_visible: usize,
    amplitudes:  Vec<Complex64>,
}

impl TargetState {
    pub fn new(num_visible: usize, amplitudes: Vec<Complex64>) -> Result<Self, DataFormatError> {
        let expected = if num_visible < usize::BITS as usize { 1usize << num_visible } else { usize::MAX };
        if amplitudes.len() != expected {
            return Err(DataFormatError::TargetLength {
                num_visible,
                expected,
                found: amplitudes.len(),
            });
        }
        if let Some(index) = amplitudes.iter().position(|a| !a.is_finite()) {
            return Err(DataFormatError::NonFiniteAmplitude { index });
        }
        if amplitudes.iter().all(|a| a.norm_sqr() == 0.0) {
            return Err(DataFormatError::ZeroNormTarget);
        }
        Ok(Self { num_visible, amplitudes })
    }

    pub fn num_visible(&self) -> usize {
        self.num_visible
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Squared norm of the stored amplitudes.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(Complex64::norm_sqr).sum()
    }

    /// Normalised Born probabilities.
    pub fn probabilities(&self) -> Vec<f64> {
        let z = self.norm_sqr();
        self.amplitudes.iter().map(|a| a.norm_sqr() / z).collect()
    }
}

/// Bits of basis-state `index` over `n` sites, site 0 most significant.
pub fn state_from_index(index: usize, n: usize) -> Sample {
    (0..n).map(|site| ((index >> (n - 1 - site)) & 1) as u8).collect()
}

// ─── Dataset ──────────────────────────────────────────────────────────────────
/// Validated in-memory training data.
///
/// Invariants, checked by `Dataset::new`:
///   - at least one sample, every sample of width `num_visible`, values in {0,1}
///   - one basis label per sample, each present in `basis_set`
///   - `basis_set` entries are distinct and of width `num_visible`
///   - the optional target has 2^num_visible amplitudes
#[derive(Debug, Clone)]
pub struct Dataset {
    num_visible: usize,
    samples:     Vec<Sample>,
    /// Index into `basis_set` for every sample
    basis_index: Vec<usize>,
    basis_set:   Vec<BasisLabel>,
    target:      Option<TargetState>,
}

impl Dataset {
    pub fn new(
        samples:   Vec<Sample>,
        labels:    Vec<BasisLabel>,
        basis_set: Vec<BasisLabel>,
        target:    Option<TargetState>,
    ) -> Result<Self, DataFormatError> {
        let num_visible = samples.first().map(Vec::len).ok_or(DataFormatError::Empty)?;

        for (row, s) in samples.iter().enumerate() {
            if s.len() != num_visible {
                return Err(DataFormatError::WidthMismatch { expected: num_visible, found: s.len() });
            }
            if let Some(&value) = s.iter().find(|&&v| v > 1) {
                return Err(DataFormatError::NonBinary { row: row + 1, value });
            }
        }

        if labels.len() != samples.len() {
            return Err(DataFormatError::CountMismatch {
                samples: samples.len(),
                labels:  labels.len(),
            });
        }

        let basis_index = {
            let mut lookup: HashMap<&BasisLabel, usize> = HashMap::with_capacity(basis_set.len());
            for (i, b) in basis_set.iter().enumerate() {
                if b.len() != num_visible {
                    return Err(DataFormatError::WidthMismatch { expected: num_visible, found: b.len() });
                }
                if lookup.insert(b, i).is_some() {
                    return Err(DataFormatError::DuplicateBasis(b.to_string()));
                }
            }

            labels
                .iter()
                .enumerate()
                .map(|(row, label)| {
                    lookup.get(label).copied().ok_or_else(|| DataFormatError::UnknownBasis {
                        row:   row + 1,
                        label: label.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        if let Some(t) = &target {
            if t.num_visible() != num_visible {
                return Err(DataFormatError::WidthMismatch {
                    expected: num_visible,
                    found:    t.num_visible(),
                });
            }
        }

        Ok(Self { num_visible, samples, basis_index, basis_set, target })
    }

    /// Dataset whose samples were all measured in the computational basis.
    pub fn computational(samples: Vec<Sample>, target: Option<TargetState>) -> Result<Self, DataFormatError> {
        let n      = samples.first().map(Vec::len).ok_or(DataFormatError::Empty)?;
        let labels = vec![BasisLabel::computational(n); samples.len()];
        Self::new(samples, labels, vec![BasisLabel::computational(n)], target)
    }

    pub fn num_visible(&self) -> usize {
        self.num_visible
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn basis_set(&self) -> &[BasisLabel] {
        &self.basis_set
    }

    pub fn basis_of(&self, index: usize) -> &BasisLabel {
        &self.basis_set[self.basis_index[index]]
    }

    pub fn target(&self) -> Option<&TargetState> {
        self.target.as_ref()
    }

    /// Number of samples recorded in each basis, in basis-set order.
    pub fn basis_counts(&self) -> Vec<(&BasisLabel, usize)> {
        let mut counts = vec![0usize; self.basis_set.len()];
        for &i in &self.basis_index {
            counts[i] += 1;
        }
        self.basis_set.iter().zip(counts).collect()
    }

    /// Borrowed batch of the samples at `indices`.
    pub fn batch(&self, indices: &[usize]) -> Batch<'_> {
        Batch {
            samples: indices.iter().map(|&i| self.samples[i].as_slice()).collect(),
            bases:   indices.iter().map(|&i| self.basis_of(i)).collect(),
        }
    }
}
