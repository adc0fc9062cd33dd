// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case wires the lower layers together for one CLI
// command. No training math lives here; errors are reported as
// anyhow::Result with context for the user.

// Load data, train, write checkpoints
pub mod train_use_case;

// Load and summarise a dataset
pub mod validate_use_case;

// Describe a saved checkpoint
pub mod inspect_use_case;
