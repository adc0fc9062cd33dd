// ============================================================
// Layer 3 — Fit Configuration
// ============================================================
// Hyperparameters consumed by Trainer::fit. Validation happens
// eagerly, before the model or the chains are touched.

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidConfigurationError;

/// Hyperparameters for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Number of full passes over the dataset (1-based, contiguous)
    pub epochs:              usize,
    /// Positive-phase samples per update step
    pub batch_size:          usize,
    /// Size of the persistent negative-phase chain pool
    pub num_negative_chains: usize,
    /// Contrastive-divergence sweeps per update (the `k` in CD-k)
    pub sampling_steps:      usize,
    pub learning_rate:       f64,
    /// Metric cadence in epochs
    pub log_every:           usize,
    /// Seeds initialisation, chain draws and shuffling
    pub seed:                Option<u64>,
    /// Permute batch order each epoch (seeded)
    pub shuffle:             bool,
    /// Call `initialize` on the model before the first epoch
    pub reinitialize:        bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs:              500,
            batch_size:          100,
            num_negative_chains: 200,
            sampling_steps:      10,
            learning_rate:       0.01,
            log_every:           10,
            seed:                None,
            shuffle:             false,
            reinitialize:        false,
        }
    }
}

impl FitConfig {
    /// Check every field; the first offending field is reported.
    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        let positive = [
            ("epochs",              self.epochs),
            ("batch_size",          self.batch_size),
            ("num_negative_chains", self.num_negative_chains),
            ("sampling_steps",      self.sampling_steps),
            ("log_every",           self.log_every),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(InvalidConfigurationError::new(field, "must be greater than 0"));
            }
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(InvalidConfigurationError::new(
                "learning_rate",
                format!("must be a positive finite number, got {}", self.learning_rate),
            ));
        }
        Ok(())
    }

    /// Epochs at which the metric evaluator fires.
    pub fn evaluation_epochs(&self) -> impl Iterator<Item = usize> {
        let every = self.log_every.max(1);
        (every..=self.epochs).step_by(every)
    }
}
