// ============================================================
// Layer 5 — Training Layer
// ============================================================
// Everything that drives or measures a WaveFunction:
//
//   trainer.rs    — the epoch loop and its state machine
//                   Owns the persistent chains, snapshots before
//                   every batch, honours cancellation and
//                   callback stop requests
//
//   evaluator.rs  — cadence-driven metric evaluation with
//                   per-metric failure isolation
//
//   statistics.rs — fidelity and KL divergence by full
//                   enumeration of the Hilbert space
//
//   callback.rs   — hook trait plus EarlyStopping and
//                   ModelSaver
//
//   product.rs    — independent-site reference model, the
//                   wavefunction the CLI trains

/// Epoch loop, cancellation, fit report
pub mod trainer;

/// Metric registry and cadence
pub mod evaluator;

/// Fidelity, KL divergence, partition function
pub mod statistics;

/// Training hooks
pub mod callback;

/// Product-state reference wavefunction
pub mod product;

#[cfg(test)]
pub mod testing;
