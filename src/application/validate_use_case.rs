// ============================================================
// Layer 2 — ValidateUseCase
// ============================================================
// Loads a dataset with the same rules training uses and reports
// what was found, without touching any model.

use anyhow::{Context, Result};
use std::fmt::Write as _;

use crate::data::dataset::Dataset;
use crate::data::loader::DatasetLoader;

pub struct ValidateUseCase {
    loader: DatasetLoader,
    source: String,
}

impl ValidateUseCase {
    pub fn new(samples: &str, bases: Option<&str>, basis_set: Option<&str>, target: Option<&str>) -> Self {
        let mut loader = DatasetLoader::new(samples);
        if let Some(p) = bases {
            loader = loader.with_bases(p);
        }
        if let Some(p) = basis_set {
            loader = loader.with_basis_set(p);
        }
        if let Some(p) = target {
            loader = loader.with_target(p);
        }
        Self { loader, source: samples.to_string() }
    }

    pub fn execute(&self) -> Result<Dataset> {
        self.loader
            .load()
            .with_context(|| format!("Dataset '{}' is invalid", self.source))
    }
}

/// Human-readable summary of a loaded dataset.
pub fn summary(dataset: &Dataset) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "samples:      {}", dataset.len())?;
    writeln!(out, "visible:      {}", dataset.num_visible())?;
    writeln!(out, "bases:        {}", dataset.basis_set().len())?;
    for (basis, count) in dataset.basis_counts() {
        writeln!(out, "  {basis:<10} {count}")?;
    }
    match dataset.target() {
        Some(t) => writeln!(out, "target:       {} amplitudes, norm² = {:.6}", t.amplitudes().len(), t.norm_sqr())?,
        None    => writeln!(out, "target:       none")?,
    }
    Ok(out)
}
