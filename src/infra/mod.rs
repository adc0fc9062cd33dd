// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence and reporting:
//
//   checkpoint.rs — atomic bincode checkpoints with bit-exact
//                   parameter recovery, plus a run-directory
//                   manager (periodic snapshots, final artifact,
//                   saved configuration)
//
//   metrics.rs    — metric records and the sinks that receive
//                   them (report lines, tracing, CSV)

/// Checkpoint save/load and run-directory layout
pub mod checkpoint;

/// Metric records and report sinks
pub mod metrics;
