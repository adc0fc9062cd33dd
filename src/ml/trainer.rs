// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives contrastive-divergence training of any WaveFunction.
//
//   Uninitialized ─fit─▶ Initializing ─▶ Running(1) ─▶ … ─▶ Running(epochs) ─▶ Completed
//                              │               │
//                              └──── Failed ◀──┘
//
// Per epoch:
//   1. batches are drawn (dataset order, or a seeded permutation)
//   2. model.update(batch, chains, k, lr) for every batch
//   3. the MetricEvaluator runs if the cadence matches
//   4. callbacks see the epoch end and may request a stop
//
// The negative-phase chains are drawn once per fit and persist
// across batches and epochs. Before every batch the parameters and
// chains are snapshotted; a failed update restores both, so the
// model never holds a half-applied step.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::batcher::Batcher;
use crate::data::dataset::Dataset;
use crate::domain::config::FitConfig;
use crate::domain::error::{DataFormatError, InvalidConfigurationError, TrainError};
use crate::domain::sample::ChainState;
use crate::domain::traits::WaveFunction;
use crate::infra::checkpoint::{self, MetaValue, Metadata};
use crate::infra::metrics::MetricRecord;
use crate::ml::callback::{CallbackAction, CallbackContext, CallbackManager, TrainerCallback};
use crate::ml::evaluator::MetricEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Uninitialized,
    Initializing,
    Running { epoch: usize },
    Completed,
    /// `epoch` is 0 when the run failed before the first epoch.
    Failed { epoch: usize },
}

/// Why a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    Callback,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Finished  => "finished",
            StopReason::Callback  => "callback",
            StopReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    /// Epochs whose every batch was applied
    pub epochs_completed: usize,
    pub stop_reason:      StopReason,
    pub records:          Vec<MetricRecord>,
    pub chain_sweeps:     u64,
    pub elapsed:          Duration,
}

/// Cooperative cancellation, checked before every batch.
///
/// `Trainer::fit` clears the flag when it returns a cancelled run, so
/// the next `fit` on the same trainer starts uncancelled. A cancel
/// issued before `fit` is called still stops that run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Trainer {
    config:     FitConfig,
    evaluator:  MetricEvaluator,
    callbacks:  CallbackManager,
    cancel:     CancelToken,
    state:      TrainingState,
    chains:     Option<ChainState>,
    checkpoint: Option<(PathBuf, Metadata)>,
}

impl Trainer {
    /// Trainer with an empty evaluator firing every `config.log_every`.
    pub fn new(config: FitConfig) -> Self {
        let evaluator = MetricEvaluator::new(config.log_every);
        Self {
            config,
            evaluator,
            callbacks:  CallbackManager::new(),
            cancel:     CancelToken::new(),
            state:      TrainingState::Uninitialized,
            chains:     None,
            checkpoint: None,
        }
    }

    /// Replace the evaluator. Its cadence must equal `config.log_every`;
    /// `fit` rejects a mismatch before touching the model.
    pub fn with_evaluator(mut self, evaluator: MetricEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_callback<C: TrainerCallback + 'static>(mut self, callback: C) -> Self {
        self.callbacks.add(callback);
        self
    }

    pub fn add_callback<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    /// Persist parameters and `metadata` to `path` when the run completes.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        self.checkpoint = Some((path.into(), metadata));
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &MetricEvaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut MetricEvaluator {
        &mut self.evaluator
    }

    /// Handle that cancels a running `fit` from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Chain pool as left by the last `fit`.
    pub fn chains(&self) -> Option<&ChainState> {
        self.chains.as_ref()
    }

    /// Train `model` on `dataset`.
    ///
    /// The configuration (evaluator cadence included) and the dataset
    /// shape are checked before the model is touched. A cancelled run resets the cancel
    /// token before returning. On a model failure the parameters and chains are rolled
    /// back to their state before the failing batch and the metric
    /// history up to that point stays on the evaluator.
    pub fn fit(&mut self, model: &mut dyn WaveFunction, dataset: &Dataset) -> Result<FitReport, TrainError> {
        let started = Instant::now();
        self.state  = TrainingState::Initializing;

        if let Err(e) = self.check(&*model, dataset) {
            self.state = TrainingState::Failed { epoch: 0 };
            return Err(e);
        }

        let cfg = self.config.clone();
        if cfg.evaluation_epochs().next().is_none() {
            tracing::warn!(
                "log_every ({}) exceeds epochs ({}): no metrics will be recorded",
                cfg.log_every,
                cfg.epochs
            );
        }

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        if cfg.reinitialize {
            model.initialize(&mut rng);
        }

        let mut batcher = if cfg.shuffle {
            Batcher::shuffled(dataset.len(), cfg.batch_size, rng.gen())
        } else {
            Batcher::sequential(dataset.len(), cfg.batch_size)
        };
        let mut chains = ChainState::new(model.sample(cfg.num_negative_chains, cfg.sampling_steps, &mut rng));
        self.evaluator.clear_history();

        tracing::info!(
            "Training: {} samples, {} visible units, {} epochs × {} batches, {} chains, CD-{}",
            dataset.len(),
            dataset.num_visible(),
            cfg.epochs,
            batcher.batches_per_epoch(),
            chains.len(),
            cfg.sampling_steps,
        );

        let outcome = self.run_epochs(model, dataset, &mut batcher, &mut chains, &mut rng);
        let sweeps  = chains.sweeps();
        self.chains = Some(chains);
        let (stop_reason, epochs_completed) = outcome?;
        if stop_reason == StopReason::Cancelled {
            self.cancel.reset();
        }

        if let Some(chains) = &self.chains {
            let ctx = context(epochs_completed, &cfg, 0, 0, &*model, chains, self.evaluator.latest());
            self.callbacks.on_train_end(&ctx);
        }
        self.state = TrainingState::Completed;

        let elapsed = started.elapsed();
        tracing::info!(
            "Training {} after {} epochs in {:.1}s ({} chain sweeps)",
            stop_reason.as_str(),
            epochs_completed,
            elapsed.as_secs_f64(),
            sweeps,
        );

        if let Some((path, extra)) = &self.checkpoint {
            let mut metadata = extra.clone();
            metadata.insert("epochs_completed".into(), MetaValue::Int(epochs_completed as i64));
            metadata.insert("stop_reason".into(), MetaValue::Text(stop_reason.as_str().into()));
            metadata.insert("chain_sweeps".into(), MetaValue::Int(sweeps as i64));
            checkpoint::save(path, &model.parameters(), &metadata)?;
            tracing::info!("Checkpoint written to '{}'", path.display());
        }

        Ok(FitReport {
            epochs_completed,
            stop_reason,
            records: self.evaluator.history().to_vec(),
            chain_sweeps: sweeps,
            elapsed,
        })
    }

    fn check(&self, model: &dyn WaveFunction, dataset: &Dataset) -> Result<(), TrainError> {
        self.config.validate()?;
        if self.evaluator.log_every() != self.config.log_every {
            return Err(InvalidConfigurationError::new(
                "log_every",
                format!(
                    "is {} but the evaluator fires every {} epochs",
                    self.config.log_every,
                    self.evaluator.log_every()
                ),
            )
            .into());
        }
        if dataset.num_visible() != model.num_visible() {
            return Err(DataFormatError::WidthMismatch {
                expected: model.num_visible(),
                found:    dataset.num_visible(),
            }
            .into());
        }
        Ok(())
    }

    /// The epoch loop. Returns the stop reason and the number of fully
    /// applied epochs.
    fn run_epochs(
        &mut self,
        model:   &mut dyn WaveFunction,
        dataset: &Dataset,
        batcher: &mut Batcher,
        chains:  &mut ChainState,
        rng:     &mut StdRng,
    ) -> Result<(StopReason, usize), TrainError> {
        let cfg = self.config.clone();
        let bpe = batcher.batches_per_epoch();

        let ctx = context(0, &cfg, 0, bpe, &*model, chains, None);
        if self.callbacks.on_train_begin(&ctx) == CallbackAction::Stop {
            return Ok((StopReason::Callback, 0));
        }

        for epoch in 1..=cfg.epochs {
            self.state = TrainingState::Running { epoch };

            let ctx = context(epoch, &cfg, 0, bpe, &*model, chains, self.evaluator.latest());
            if self.callbacks.on_epoch_begin(&ctx) == CallbackAction::Stop {
                return Ok((StopReason::Callback, epoch - 1));
            }

            for (i, indices) in batcher.next_epoch().iter().enumerate() {
                if self.cancel.is_cancelled() {
                    tracing::info!("Cancelled at epoch {}, batch {}", epoch, i + 1);
                    return Ok((StopReason::Cancelled, epoch - 1));
                }

                let batch           = dataset.batch(indices);
                let params_snapshot = model.parameters();
                let chains_snapshot = chains.clone();

                if let Err(source) = model.update(&batch, chains, cfg.sampling_steps, cfg.learning_rate, rng) {
                    *chains = chains_snapshot;
                    if let Err(e) = model.load_parameters(params_snapshot) {
                        tracing::warn!("Could not restore parameters after failed update: {}", e);
                    }
                    self.state = TrainingState::Failed { epoch };
                    tracing::warn!("Model update failed at epoch {}, batch {}: {}", epoch, i + 1, source);
                    return Err(TrainError::ModelUpdate { epoch, batch: i + 1, source });
                }
                tracing::debug!("Epoch {} batch {}/{}: {} samples", epoch, i + 1, bpe, batch.len());

                let ctx = context(epoch, &cfg, i + 1, bpe, &*model, chains, self.evaluator.latest());
                if self.callbacks.on_batch_end(&ctx) == CallbackAction::Stop {
                    return Ok((StopReason::Callback, epoch - 1));
                }
            }

            self.evaluator.on_epoch_end(epoch, &*model, dataset);

            let ctx = context(epoch, &cfg, 0, bpe, &*model, chains, self.evaluator.latest());
            if self.callbacks.on_epoch_end(&ctx) == CallbackAction::Stop {
                return Ok((StopReason::Callback, epoch));
            }
        }

        Ok((StopReason::Finished, cfg.epochs))
    }
}

fn context<'a>(
    epoch:   usize,
    cfg:     &FitConfig,
    batch:   usize,
    bpe:     usize,
    model:   &'a dyn WaveFunction,
    chains:  &'a ChainState,
    latest:  Option<&'a MetricRecord>,
) -> CallbackContext<'a> {
    CallbackContext {
        epoch,
        max_epochs: cfg.epochs,
        batch,
        batches_per_epoch: bpe,
        model,
        chains,
        latest_record: latest,
    }
}
