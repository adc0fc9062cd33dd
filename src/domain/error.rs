// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Typed errors for the training harness. Each kind maps to one
// failure policy:
//
//   DataFormatError           — fatal, raised before training starts
//   InvalidConfigurationError — fatal, raised before any mutation
//   MetricComputationError    — recovered by the evaluator
//   ModelUpdateError          — fatal, loop ends in Failed
//   SerializationError        — fatal to the save/load call only
//
// TrainError aggregates the fatal kinds for Trainer::fit.
// The application and CLI layers wrap these in anyhow.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or misaligned dataset input.
#[derive(Debug, Error)]
pub enum DataFormatError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path:    PathBuf,
        line:    usize,
        message: String,
    },

    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    RaggedRow {
        path:     PathBuf,
        line:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("sample row {row} contains non-binary value {value}")]
    NonBinary { row: usize, value: u8 },

    #[error("{samples} samples but {labels} basis labels")]
    CountMismatch { samples: usize, labels: usize },

    #[error("basis label '{label}' on sample row {row} is not in the basis set")]
    UnknownBasis { row: usize, label: String },

    #[error("basis '{0}' appears more than once in the basis set")]
    DuplicateBasis(String),

    #[error("target has {found} amplitudes, expected 2^{num_visible} = {expected}")]
    TargetLength {
        num_visible: usize,
        expected:    usize,
        found:       usize,
    },

    #[error("target amplitude {index} is not finite")]
    NonFiniteAmplitude { index: usize },

    #[error("target state has zero norm")]
    ZeroNormTarget,

    #[error("dataset has {found} visible units, model expects {expected}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("dataset contains no samples")]
    Empty,
}

/// Out-of-range hyperparameter, detected before the model is touched.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid configuration: {field} {reason}")]
pub struct InvalidConfigurationError {
    pub field:  &'static str,
    pub reason: String,
}

impl InvalidConfigurationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

/// A single metric function failed. Never escapes the evaluator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricComputationError {
    #[error("no reference target loaded")]
    MissingTarget,

    #[error("Hilbert space of {0} sites is too large to enumerate")]
    TooLarge(usize),

    #[error("model distribution is not normalisable")]
    ZeroNorm,

    #[error("model assigns zero probability to state {0} supported by the target")]
    Unsupported(usize),

    #[error("metric panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// The opaque model step failed.
#[derive(Debug, Error)]
pub enum ModelUpdateError {
    #[error("sample width {found} does not match {expected} visible units")]
    Shape { expected: usize, found: usize },

    #[error("parameter '{0}' diverged to a non-finite value")]
    Diverged(String),

    #[error("parameter set is incompatible: {0}")]
    Incompatible(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Checkpoint write or read failed.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("checkpoint I/O on '{path}': {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint encoding for '{path}': {source}")]
    Encode {
        path:   PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("unsupported checkpoint format version {found} (expected {expected})")]
    Version { expected: u32, found: u32 },
}

/// Fatal outcome of a `Trainer::fit` call.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    DataFormat(#[from] DataFormatError),

    #[error(transparent)]
    InvalidConfiguration(#[from] InvalidConfigurationError),

    #[error("model update failed at epoch {epoch}, batch {batch}: {source}")]
    ModelUpdate {
        epoch:  usize,
        batch:  usize,
        #[source]
        source: ModelUpdateError,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
