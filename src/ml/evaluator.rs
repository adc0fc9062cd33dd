// ============================================================
// Layer 5 — Metric Evaluator
// ============================================================
// Computes named diagnostics every `log_every` epochs and keeps
// the resulting MetricRecords.
//
// Cadence policy:
//   The evaluator fires when `epoch % log_every == 0`. If
//   log_every is larger than the number of epochs it never
//   fires and the run ends with zero records; Trainer::fit logs
//   a warning up front in that case.
//
// Failure isolation:
//   Each metric runs on its own. An Err or a panic marks that
//   metric as errored in the record; the remaining metrics of
//   the same report still run and training continues.

use std::panic::{self, AssertUnwindSafe};

use crate::data::dataset::Dataset;
use crate::domain::basis::BasisLabel;
use crate::domain::error::MetricComputationError;
use crate::domain::traits::WaveFunction;
use crate::infra::metrics::{MetricOutcome, MetricRecord, MetricSink};
use crate::ml::statistics::{self, MetricContext};

/// A scalar diagnostic of the current model.
pub type MetricFn = Box<dyn Fn(&MetricContext<'_>) -> Result<f64, MetricComputationError>>;

pub struct MetricEvaluator {
    log_every: usize,
    metrics:   Vec<(String, MetricFn)>,
    bases:     Option<Vec<BasisLabel>>,
    verbose:   bool,
    sinks:     Vec<Box<dyn MetricSink>>,
    history:   Vec<MetricRecord>,
}

impl MetricEvaluator {
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every,
            metrics: Vec::new(),
            bases:   None,
            verbose: false,
            sinks:   Vec::new(),
            history: Vec::new(),
        }
    }

    /// Register a metric; reports list metrics in registration order.
    pub fn with_metric<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&MetricContext<'_>) -> Result<f64, MetricComputationError> + 'static,
    {
        self.metrics.push((name.into(), Box::new(f)));
        self
    }

    /// `fidelity` and `kl_divergence` against the dataset target.
    pub fn with_standard_metrics(self) -> Self {
        self.with_metric("fidelity", statistics::fidelity)
            .with_metric("kl_divergence", statistics::kl_divergence)
    }

    /// Evaluate against this subset of bases instead of the full set.
    pub fn with_bases(mut self, bases: Vec<BasisLabel>) -> Self {
        self.bases = Some(bases);
        self
    }

    /// Print a report line to stdout on every evaluation.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_sink<S: MetricSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn log_every(&self) -> usize {
        self.log_every
    }

    pub fn num_metrics(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_due(&self, epoch: usize) -> bool {
        self.log_every > 0 && epoch % self.log_every == 0
    }

    /// Evaluate if `epoch` matches the cadence.
    pub fn on_epoch_end(&mut self, epoch: usize, model: &dyn WaveFunction, dataset: &Dataset) -> Option<&MetricRecord> {
        if !self.is_due(epoch) {
            return None;
        }
        Some(self.evaluate(epoch, model, dataset))
    }

    /// Compute every metric now, record the result and emit it.
    pub fn evaluate(&mut self, epoch: usize, model: &dyn WaveFunction, dataset: &Dataset) -> &MetricRecord {
        let ctx = MetricContext {
            epoch,
            model,
            target: dataset.target(),
            bases:  self.bases.as_deref().unwrap_or(dataset.basis_set()),
        };

        let mut record = MetricRecord::new(epoch);
        for (name, f) in &self.metrics {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| f(&ctx))) {
                Ok(Ok(v))  => MetricOutcome::Value(v),
                Ok(Err(e)) => MetricOutcome::Errored(e.to_string()),
                Err(payload) => {
                    MetricOutcome::Errored(MetricComputationError::Panicked(panic_message(payload.as_ref())).to_string())
                }
            };
            if let MetricOutcome::Errored(msg) = &outcome {
                tracing::debug!("Metric '{}' failed at epoch {}: {}", name, epoch, msg);
            }
            record.push(name.clone(), outcome);
        }

        if self.verbose {
            println!("{}", record.report_line());
        }
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(&record) {
                tracing::warn!("{} failed to emit epoch {}: {:#}", sink.name(), epoch, e);
            }
        }

        self.history.push(record);
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[MetricRecord] {
        &self.history
    }

    pub fn latest(&self) -> Option<&MetricRecord> {
        self.history.last()
    }

    /// `(epoch, value)` series of one metric; errored entries are skipped.
    pub fn values(&self, name: &str) -> Vec<(usize, f64)> {
        self.history
            .iter()
            .filter_map(|r| r.get(name).map(|v| (r.epoch, v)))
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::ReportSink;
    use crate::ml::product::ProductStateModel;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dataset() -> Dataset {
        Dataset::computational(vec![vec![0, 1], vec![1, 1]], None).unwrap()
    }

    #[test]
    fn test_cadence() {
        let ev = MetricEvaluator::new(10);
        assert!(!ev.is_due(5));
        assert!(ev.is_due(10));
        assert!(ev.is_due(20));
        assert!(!ev.is_due(25));
    }

    #[test]
    fn test_failing_metric_is_isolated() {
        let model  = ProductStateModel::new(2);
        let ds     = dataset();
        let mut ev = MetricEvaluator::new(1)
            .with_metric("broken", |_ctx: &MetricContext<'_>| Err(MetricComputationError::Other("nope".into())))
            .with_metric("epoch", |ctx: &MetricContext<'_>| Ok(ctx.epoch as f64));

        let record = ev.evaluate(3, &model, &ds).clone();
        assert!(record.is_errored("broken"));
        assert_eq!(record.get("epoch"), Some(3.0));
        assert_eq!(record.entries[0].name, "broken");
    }

    #[test]
    fn test_panicking_metric_is_isolated() {
        let model  = ProductStateModel::new(2);
        let ds     = dataset();
        let mut ev = MetricEvaluator::new(1)
            .with_metric("panics", |_ctx: &MetricContext<'_>| -> Result<f64, MetricComputationError> {
                panic!("metric blew up")
            })
            .with_metric("one", |_ctx: &MetricContext<'_>| Ok(1.0));

        let record = ev.evaluate(1, &model, &ds);
        assert!(record.is_errored("panics"));
        assert_eq!(record.get("one"), Some(1.0));
    }

    #[test]
    fn test_standard_metrics_without_target_are_errored() {
        let model  = ProductStateModel::new(2);
        let ds     = dataset();
        let mut ev = MetricEvaluator::new(1).with_standard_metrics();
        let record = ev.evaluate(1, &model, &ds);
        assert!(record.is_errored("fidelity"));
        assert!(record.is_errored("kl_divergence"));
    }

    #[test]
    fn test_basis_subset_reaches_metrics() {
        let model  = ProductStateModel::new(2);
        let ds     = dataset();
        let subset = vec!["XZ".parse().unwrap(), "ZX".parse().unwrap()];
        let mut ev = MetricEvaluator::new(1)
            .with_bases(subset)
            .with_metric("n_bases", |ctx: &MetricContext<'_>| Ok(ctx.bases.len() as f64));
        assert_eq!(ev.evaluate(1, &model, &ds).get("n_bases"), Some(2.0));
    }

    #[test]
    fn test_history_and_values() {
        let model  = ProductStateModel::new(2);
        let ds     = dataset();
        let mut ev = MetricEvaluator::new(2).with_metric("epoch", |ctx: &MetricContext<'_>| Ok(ctx.epoch as f64));
        for epoch in 1..=6 {
            ev.on_epoch_end(epoch, &model, &ds);
        }
        let epochs: Vec<usize> = ev.history().iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![2, 4, 6]);
        assert_eq!(ev.values("epoch"), vec![(2, 2.0), (4, 4.0), (6, 6.0)]);
        assert_eq!(ev.latest().unwrap().epoch, 6);
    }

    #[test]
    fn test_sink_receives_records() {
        #[derive(Clone, Default)]
        struct Shared(Rc<RefCell<Vec<u8>>>);
        impl std::io::Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                std::io::Write::write(&mut *self.0.borrow_mut(), buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Shared::default();
        let model  = ProductStateModel::new(1);
        let ds     = Dataset::computational(vec![vec![1]], None).unwrap();
        let mut ev = MetricEvaluator::new(1)
            .with_metric("one", |_ctx: &MetricContext<'_>| Ok(1.0))
            .with_sink(ReportSink::new(buffer.clone()));
        ev.evaluate(4, &model, &ds);

        let text = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        assert_eq!(text, "Epoch: 4\tone = 1.000000\n");
    }
}
