// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From text files on disk to index batches for the trainer:
//
//   samples / bases / basis set / target files
//       │
//       ▼
//   DatasetLoader   → parses and validates every file
//       │
//       ▼
//   Dataset         → samples, per-sample basis, optional target
//       │
//       ▼
//   Batcher         → per-epoch index batches (seeded shuffle)
//       │
//       ▼
//   Dataset::batch  → borrowed Batch handed to the model

/// Reads the tomography text files
pub mod loader;

/// Validated in-memory dataset and reference target
pub mod dataset;

/// Per-epoch mini-batch partitioning
pub mod batcher;
