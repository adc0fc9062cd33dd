// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Subcommands `train`, `validate` and `inspect` with their flags.
// Defaults mirror FitConfig::default().

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a product-state model on measurement data
    Train(TrainArgs),

    /// Check that a dataset loads and print a summary
    Validate(DatasetArgs),

    /// Describe a saved checkpoint
    Inspect(InspectArgs),
}

/// Dataset files shared by `train` and `validate`.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Whitespace-separated 0/1 samples, one per line
    #[arg(long)]
    pub samples: String,

    /// Basis label per sample (e.g. `XZZ` or `X Z Z`); all-Z if omitted
    #[arg(long)]
    pub bases: Option<String>,

    /// Reference basis set; derived from --bases if omitted
    #[arg(long)]
    pub basis_set: Option<String>,

    /// Target amplitudes, `re im` per line in basis-index order
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DatasetArgs,

    /// Directory for checkpoints, metrics.csv and train_config.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 500)]
    pub epochs: usize,

    /// Positive-phase samples per update
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Persistent negative-phase chains
    #[arg(long, default_value_t = 200)]
    pub num_chains: usize,

    /// Sampling sweeps per update (CD-k)
    #[arg(long, default_value_t = 10)]
    pub k: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// Evaluate metrics every N epochs
    #[arg(long, default_value_t = 10)]
    pub log_every: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Shuffle batch order every epoch
    #[arg(long)]
    pub shuffle: bool,

    /// Save a snapshot every N epochs
    #[arg(long)]
    pub save_every: Option<usize>,

    /// Samples to draw from the trained model into the final checkpoint
    #[arg(long, default_value_t = 0)]
    pub num_samples: usize,

    /// Stop after N evaluations without fidelity improvement
    #[arg(long)]
    pub early_stop_patience: Option<usize>,

    #[arg(long, default_value_t = 1e-4)]
    pub early_stop_tolerance: f64,

    /// Do not print metric report lines to stdout
    #[arg(long, short)]
    pub quiet: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            samples:              a.data.samples,
            bases:                a.data.bases,
            basis_set:            a.data.basis_set,
            target:               a.data.target,
            checkpoint_dir:       a.checkpoint_dir,
            epochs:               a.epochs,
            batch_size:           a.batch_size,
            num_negative_chains:  a.num_chains,
            sampling_steps:       a.k,
            lr:                   a.lr,
            log_every:            a.log_every,
            seed:                 a.seed,
            shuffle:              a.shuffle,
            save_every:           a.save_every,
            num_samples:          a.num_samples,
            early_stop_patience:  a.early_stop_patience,
            early_stop_tolerance: a.early_stop_tolerance,
            quiet:                a.quiet,
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Checkpoint file; defaults to the newest one in --checkpoint-dir
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}
