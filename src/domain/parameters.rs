// ============================================================
// Layer 3 — Model Parameters
// ============================================================
// Plain-data snapshot of a model's trainable state, split into
// the amplitude group and the phase group. Models hand these
// out and take them back; the checkpoint layer serialises them.
//
// Values are f64 and serialised bit-for-bit, so equality after
// a round trip is checked with `bit_eq`, not approximate math.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dense tensor stored as a shape plus row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f64>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), values.len());
        Self { shape, values }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self { shape, values: vec![0.0; len] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn bit_eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// Named tensors belonging to one sub-network.
pub type ParamGroup = BTreeMap<String, ParamTensor>;

/// Full trainable state: amplitude network plus phase network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub amplitude: ParamGroup,
    pub phase:     ParamGroup,
}

impl ParameterSet {
    pub fn new(amplitude: ParamGroup, phase: ParamGroup) -> Self {
        Self { amplitude, phase }
    }

    /// Total number of scalar parameters across both groups.
    pub fn num_values(&self) -> usize {
        self.amplitude.values().chain(self.phase.values()).map(ParamTensor::len).sum()
    }

    /// Exact equality, including the sign of zero and NaN payloads.
    pub fn bit_eq(&self, other: &Self) -> bool {
        group_bit_eq(&self.amplitude, &other.amplitude) && group_bit_eq(&self.phase, &other.phase)
    }

    /// `(group, name, tensor)` for every tensor, amplitude first.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &String, &ParamTensor)> {
        self.amplitude
            .iter()
            .map(|(k, v)| ("amplitude", k, v))
            .chain(self.phase.iter().map(|(k, v)| ("phase", k, v)))
    }

    /// First tensor holding a NaN or infinity, if any.
    pub fn first_non_finite(&self) -> Option<String> {
        self.iter()
            .find(|(_, _, t)| t.values.iter().any(|v| !v.is_finite()))
            .map(|(group, name, _)| format!("{group}.{name}"))
    }
}

fn group_bit_eq(a: &ParamGroup, b: &ParamGroup) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((ka, ta), (kb, tb))| ka == kb && ta.bit_eq(tb))
}
