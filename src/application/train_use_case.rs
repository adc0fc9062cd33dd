// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run:
//
//   Step 1: Load and validate the dataset      (Layer 4 - data)
//   Step 2: Prepare the run directory          (Layer 6 - infra)
//   Step 3: Build the model                    (Layer 5 - ml)
//   Step 4: Register metrics, sinks, callbacks (Layer 5/6)
//   Step 5: Run Trainer::fit                   (Layer 5 - ml)
//   Step 6: Draw samples, save final artifact  (Layer 6 - infra)

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::loader::DatasetLoader;
use crate::domain::config::FitConfig;
use crate::domain::traits::WaveFunction;
use crate::infra::checkpoint::{CheckpointManager, MetaValue, Metadata};
use crate::infra::metrics::{CsvSink, TracingSink};
use crate::ml::callback::{EarlyStopping, Mode, ModelSaver};
use crate::ml::evaluator::MetricEvaluator;
use crate::ml::product::ProductStateModel;
use crate::ml::trainer::{FitReport, Trainer};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs. Saved next to the checkpoints as
// train_config.json so `inspect` can show how an artifact was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub samples:              String,
    pub bases:                Option<String>,
    pub basis_set:            Option<String>,
    pub target:               Option<String>,
    pub checkpoint_dir:       String,
    pub epochs:               usize,
    pub batch_size:           usize,
    pub num_negative_chains:  usize,
    pub sampling_steps:       usize,
    pub lr:                   f64,
    pub log_every:            usize,
    pub seed:                 Option<u64>,
    pub shuffle:              bool,
    pub save_every:           Option<usize>,
    pub num_samples:          usize,
    pub early_stop_patience:  Option<usize>,
    pub early_stop_tolerance: f64,
    pub quiet:                bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let fit = FitConfig::default();
        Self {
            samples:              "data/samples.txt".to_string(),
            bases:                None,
            basis_set:            None,
            target:               None,
            checkpoint_dir:       "checkpoints".to_string(),
            epochs:               fit.epochs,
            batch_size:           fit.batch_size,
            num_negative_chains:  fit.num_negative_chains,
            sampling_steps:       fit.sampling_steps,
            lr:                   fit.learning_rate,
            log_every:            fit.log_every,
            seed:                 None,
            shuffle:              false,
            save_every:           None,
            num_samples:          0,
            early_stop_patience:  None,
            early_stop_tolerance: 1e-4,
            quiet:                false,
        }
    }
}

impl TrainConfig {
    /// Hyperparameters handed to the trainer. The model is always
    /// freshly initialised from the run seed.
    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            epochs:               self.epochs,
            batch_size:           self.batch_size,
            num_negative_chains:  self.num_negative_chains,
            sampling_steps:       self.sampling_steps,
            learning_rate:        self.lr,
            log_every:            self.log_every,
            seed:                 self.seed,
            shuffle:              self.shuffle,
            reinitialize:         true,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FitReport> {
        let cfg = &self.config;
        let fit = cfg.fit_config();
        fit.validate().context("Invalid training configuration")?;

        // ── Step 1: Load dataset ──────────────────────────────────────────────
        let mut loader = DatasetLoader::new(&cfg.samples);
        if let Some(p) = &cfg.bases {
            loader = loader.with_bases(p);
        }
        if let Some(p) = &cfg.basis_set {
            loader = loader.with_basis_set(p);
        }
        if let Some(p) = &cfg.target {
            loader = loader.with_target(p);
        }
        let dataset = loader
            .load()
            .with_context(|| format!("Failed to load dataset from '{}'", cfg.samples))?;

        // ── Step 2: Run directory ─────────────────────────────────────────────
        let manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        manager.save_config(cfg)?;

        // ── Step 3: Model ─────────────────────────────────────────────────────
        let mut model = ProductStateModel::new(dataset.num_visible());
        tracing::info!("Model ready: product state over {} sites", model.num_visible());

        // ── Step 4: Metrics and callbacks ─────────────────────────────────────
        let mut evaluator = MetricEvaluator::new(cfg.log_every)
            .verbose(!cfg.quiet)
            .with_sink(CsvSink::new(manager.dir())?);
        if cfg.quiet {
            evaluator = evaluator.with_sink(TracingSink);
        }
        if dataset.target().is_some() {
            evaluator = evaluator.with_standard_metrics();
        } else {
            tracing::warn!("No target state given: fidelity and KL divergence are unavailable");
        }

        let mut trainer = Trainer::new(fit.clone()).with_evaluator(evaluator);
        if let Some(every) = cfg.save_every {
            trainer.add_callback(ModelSaver::new(manager.clone(), every));
        }
        match (cfg.early_stop_patience, dataset.target().is_some()) {
            (Some(patience), true) => trainer.add_callback(EarlyStopping::new(
                "fidelity",
                Mode::Maximize,
                cfg.early_stop_tolerance,
                patience,
            )),
            (Some(_), false) => tracing::warn!("Early stopping needs a target state; ignoring patience"),
            (None, _) => {}
        }

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let report = trainer.fit(&mut model, &dataset).context("Training failed")?;

        // ── Step 6: Final artifact ────────────────────────────────────────────
        let mut metadata = Metadata::new();
        metadata.insert("num_visible".into(), MetaValue::Int(dataset.num_visible() as i64));
        metadata.insert("epochs_completed".into(), MetaValue::Int(report.epochs_completed as i64));
        metadata.insert("stop_reason".into(), MetaValue::Text(report.stop_reason.as_str().into()));
        metadata.insert("chain_sweeps".into(), MetaValue::Int(report.chain_sweeps as i64));
        if let Some(last) = report.records.last() {
            for entry in &last.entries {
                if let Some(v) = last.get(&entry.name) {
                    metadata.insert(format!("final_{}", entry.name), MetaValue::Float(v));
                }
            }
        }
        if cfg.num_samples > 0 {
            let mut rng = match cfg.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
                None       => StdRng::from_entropy(),
            };
            let samples = model.sample(cfg.num_samples, cfg.sampling_steps, &mut rng);
            tracing::info!("Drew {} samples from the trained model", samples.len());
            metadata.insert("samples".into(), MetaValue::Samples(samples));
        }

        let path = manager.save_final(&model.parameters(), &metadata)?;
        tracing::info!("Final checkpoint: '{}'", path.display());
        Ok(report)
    }

    pub fn checkpoint_dir(&self) -> &Path {
        Path::new(&self.config.checkpoint_dir)
    }
}
