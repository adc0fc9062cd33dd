// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case in Layer 2. Printing for the user happens here.
//
//   1. `train`    — fit a model, write checkpoints and metrics
//   2. `validate` — load a dataset and summarise it
//   3. `inspect`  — describe a checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DatasetArgs, InspectArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "qst-fit",
    version,
    about = "Train and evaluate quantum-state reconstruction models from measurement data."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Validate(args) => run_validate(args),
            Commands::Inspect(args)  => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.data.samples);
    let use_case = TrainUseCase::new(args.into());
    let report   = use_case.execute()?;

    println!(
        "Training {} after {} epochs ({:.1}s). Checkpoints in '{}'.",
        report.stop_reason.as_str(),
        report.epochs_completed,
        report.elapsed.as_secs_f64(),
        use_case.checkpoint_dir().display(),
    );
    Ok(())
}

fn run_validate(args: DatasetArgs) -> Result<()> {
    use crate::application::validate_use_case::{summary, ValidateUseCase};

    let use_case = ValidateUseCase::new(
        &args.samples,
        args.bases.as_deref(),
        args.basis_set.as_deref(),
        args.target.as_deref(),
    );
    let dataset = use_case.execute()?;
    print!("{}", summary(&dataset)?);
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let inspection = InspectUseCase::new(args.checkpoint, args.checkpoint_dir).execute()?;
    print!("{}", inspection.render()?);
    Ok(())
}
