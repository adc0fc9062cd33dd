// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that every other layer shares:
// what a sample, a basis, a parameter set and a model ARE.
//
// Rules for this layer:
//   - NO file I/O
//   - NO training-loop logic
//   - Only structs, enums, traits and their invariants

// Measurement bases and per-sample basis labels
pub mod basis;

// Fit hyperparameters and their validation
pub mod config;

// Typed error taxonomy
pub mod error;

// Amplitude / phase parameter snapshots
pub mod parameters;

// Samples, batches and the persistent chain state
pub mod sample;

// The WaveFunction capability trait
pub mod traits;
