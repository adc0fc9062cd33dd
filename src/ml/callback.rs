// ============================================================
// Layer 5 — Training Callbacks
// ============================================================
// Hooks into the epoch loop without touching it:
//
//   TrainerCallback   trait every callback implements
//   CallbackManager   dispatches events in registration order
//   EarlyStopping     stops when a monitored metric stops improving
//   ModelSaver        periodic checkpoints through CheckpointManager

use crate::domain::sample::ChainState;
use crate::domain::traits::WaveFunction;
use crate::infra::checkpoint::{CheckpointManager, MetaValue, Metadata};
use crate::infra::metrics::MetricRecord;

/// Training state visible to callbacks.
pub struct CallbackContext<'a> {
    /// Current epoch (1-based)
    pub epoch:             usize,
    pub max_epochs:        usize,
    /// Current batch within the epoch (1-based, 0 outside a batch)
    pub batch:             usize,
    pub batches_per_epoch: usize,
    pub model:             &'a dyn WaveFunction,
    pub chains:            &'a ChainState,
    /// Most recent metric record, from this or an earlier epoch
    pub latest_record:     Option<&'a MetricRecord>,
}

/// What the trainer should do after a hook returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Implement the hooks you need; the rest default to `Continue`.
pub trait TrainerCallback {
    fn on_train_begin(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_epoch_begin(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_batch_end(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Runs after the metric evaluator for the epoch.
    fn on_epoch_end(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_train_end(&mut self, _ctx: &CallbackContext<'_>) {}

    fn name(&self) -> &'static str {
        "TrainerCallback"
    }
}

// ─── CallbackManager ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn on_train_begin(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        self.dispatch(|cb| cb.on_train_begin(ctx))
    }

    pub fn on_epoch_begin(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        self.dispatch(|cb| cb.on_epoch_begin(ctx))
    }

    pub fn on_batch_end(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        self.dispatch(|cb| cb.on_batch_end(ctx))
    }

    pub fn on_epoch_end(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        self.dispatch(|cb| cb.on_epoch_end(ctx))
    }

    pub fn on_train_end(&mut self, ctx: &CallbackContext<'_>) {
        for cb in &mut self.callbacks {
            cb.on_train_end(ctx);
        }
    }

    /// First `Stop` wins; later callbacks are not called for this event.
    fn dispatch<F>(&mut self, mut hook: F) -> CallbackAction
    where
        F: FnMut(&mut dyn TrainerCallback) -> CallbackAction,
    {
        for cb in &mut self.callbacks {
            if hook(cb.as_mut()) == CallbackAction::Stop {
                tracing::info!("{} requested stop", cb.name());
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }
}

// ─── EarlyStopping ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Minimize,
    Maximize,
}

/// Stops training when `metric` has not improved by more than
/// `tolerance` for `patience` consecutive evaluations.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    metric:      String,
    mode:        Mode,
    tolerance:   f64,
    patience:    usize,
    best:        Option<f64>,
    stale_evals: usize,
    last_epoch:  Option<usize>,
}

impl EarlyStopping {
    pub fn new(metric: impl Into<String>, mode: Mode, tolerance: f64, patience: usize) -> Self {
        Self {
            metric: metric.into(),
            mode,
            tolerance,
            patience: patience.max(1),
            best: None,
            stale_evals: 0,
            last_epoch: None,
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    fn improved(&self, value: f64) -> bool {
        match (self.best, self.mode) {
            (None, _)                 => true,
            (Some(b), Mode::Minimize) => value < b - self.tolerance,
            (Some(b), Mode::Maximize) => value > b + self.tolerance,
        }
    }
}

impl TrainerCallback for EarlyStopping {
    fn on_epoch_end(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        let Some(record) = ctx.latest_record.filter(|r| r.epoch == ctx.epoch) else {
            return CallbackAction::Continue;
        };
        if self.last_epoch == Some(record.epoch) {
            return CallbackAction::Continue;
        }
        self.last_epoch = Some(record.epoch);

        // Errored evaluations neither count as progress nor as stagnation
        let Some(value) = record.get(&self.metric) else {
            return CallbackAction::Continue;
        };

        if self.improved(value) {
            self.best        = Some(value);
            self.stale_evals = 0;
        } else {
            self.stale_evals += 1;
        }

        if self.stale_evals >= self.patience {
            tracing::info!(
                "Early stopping at epoch {}: '{}' has not improved for {} evaluations (best {:.6})",
                ctx.epoch,
                self.metric,
                self.patience,
                self.best.unwrap_or(f64::NAN),
            );
            return CallbackAction::Stop;
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &'static str {
        "EarlyStopping"
    }
}

// ─── ModelSaver ───────────────────────────────────────────────────────────────

/// Saves a checkpoint every `save_every` epochs. A failed save is
/// logged and training carries on.
pub struct ModelSaver {
    manager:    CheckpointManager,
    save_every: usize,
    saved:      Vec<usize>,
}

impl ModelSaver {
    pub fn new(manager: CheckpointManager, save_every: usize) -> Self {
        Self { manager, save_every: save_every.max(1), saved: Vec::new() }
    }

    pub fn saved_epochs(&self) -> &[usize] {
        &self.saved
    }
}

impl TrainerCallback for ModelSaver {
    fn on_epoch_end(&mut self, ctx: &CallbackContext<'_>) -> CallbackAction {
        if ctx.epoch % self.save_every != 0 {
            return CallbackAction::Continue;
        }

        let mut metadata = Metadata::new();
        metadata.insert("epoch".into(), MetaValue::Int(ctx.epoch as i64));
        metadata.insert("chain_sweeps".into(), MetaValue::Int(ctx.chains.sweeps() as i64));

        match self.manager.save_epoch(&ctx.model.parameters(), &metadata, ctx.epoch) {
            Ok(path) => {
                tracing::debug!("Saved epoch {} to '{}'", ctx.epoch, path.display());
                self.saved.push(ctx.epoch);
            }
            Err(e) => tracing::warn!("Checkpoint at epoch {} failed: {:#}", ctx.epoch, e),
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &'static str {
        "ModelSaver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint;
    use crate::infra::metrics::MetricOutcome;
    use crate::ml::product::ProductStateModel;

    fn record(epoch: usize, value: f64) -> MetricRecord {
        let mut r = MetricRecord::new(epoch);
        r.push("kl", MetricOutcome::Value(value));
        r
    }

    fn ctx<'a>(
        epoch: usize,
        model: &'a dyn WaveFunction,
        chains: &'a ChainState,
        latest: Option<&'a MetricRecord>,
    ) -> CallbackContext<'a> {
        CallbackContext {
            epoch,
            max_epochs: 100,
            batch: 0,
            batches_per_epoch: 1,
            model,
            chains,
            latest_record: latest,
        }
    }

    #[test]
    fn test_early_stopping_minimize() {
        let model  = ProductStateModel::new(1);
        let chains = ChainState::new(vec![vec![0]]);
        let mut es = EarlyStopping::new("kl", Mode::Minimize, 0.01, 2);

        let values = [(1, 1.0), (2, 0.5), (3, 0.495), (4, 0.6)];
        let mut actions = Vec::new();
        for (epoch, v) in values {
            let r = record(epoch, v);
            actions.push(es.on_epoch_end(&ctx(epoch, &model, &chains, Some(&r))));
        }
        assert_eq!(
            actions,
            vec![CallbackAction::Continue, CallbackAction::Continue, CallbackAction::Continue, CallbackAction::Stop]
        );
        assert_eq!(es.best(), Some(0.5));
    }

    #[test]
    fn test_early_stopping_ignores_stale_records() {
        let model  = ProductStateModel::new(1);
        let chains = ChainState::new(vec![vec![0]]);
        let mut es = EarlyStopping::new("kl", Mode::Maximize, 0.0, 1);
        let r      = record(10, 0.3);

        assert_eq!(es.on_epoch_end(&ctx(10, &model, &chains, Some(&r))), CallbackAction::Continue);
        // Same record seen again at epochs without evaluation
        for epoch in 11..15 {
            assert_eq!(es.on_epoch_end(&ctx(epoch, &model, &chains, Some(&r))), CallbackAction::Continue);
        }
    }

    #[test]
    fn test_manager_first_stop_wins() {
        struct Stopper;
        impl TrainerCallback for Stopper {
            fn on_epoch_end(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
                CallbackAction::Stop
            }
        }
        struct Counter(std::rc::Rc<std::cell::Cell<usize>>);
        impl TrainerCallback for Counter {
            fn on_epoch_end(&mut self, _ctx: &CallbackContext<'_>) -> CallbackAction {
                self.0.set(self.0.get() + 1);
                CallbackAction::Continue
            }
        }

        let calls   = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut mgr = CallbackManager::new();
        mgr.add(Counter(calls.clone()));
        mgr.add(Stopper);
        mgr.add(Counter(calls.clone()));

        let model  = ProductStateModel::new(1);
        let chains = ChainState::new(vec![vec![0]]);
        assert_eq!(mgr.on_epoch_end(&ctx(1, &model, &chains, None)), CallbackAction::Stop);
        assert_eq!(calls.get(), 1);
        assert_eq!(mgr.len(), 3);
    }

    #[test]
    fn test_model_saver_cadence() {
        let dir       = tempfile::tempdir().unwrap();
        let manager   = CheckpointManager::new(dir.path()).unwrap();
        let mut saver = ModelSaver::new(manager.clone(), 3);
        let model     = ProductStateModel::with_probabilities(&[0.25, 0.75]);
        let chains    = ChainState::new(vec![vec![0, 1]]);

        for epoch in 1..=7 {
            saver.on_epoch_end(&ctx(epoch, &model, &chains, None));
        }
        assert_eq!(saver.saved_epochs(), &[3, 6]);

        let loaded = checkpoint::load(manager.epoch_path(6)).unwrap();
        assert!(loaded.parameters.bit_eq(&model.parameters()));
        assert_eq!(loaded.metadata.get("epoch"), Some(&MetaValue::Int(6)));
    }
}
