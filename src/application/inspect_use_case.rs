// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Reads a checkpoint (a given file, or the newest artifact of a
// run directory) and describes it: parameter shapes, metadata
// and, when available, the configuration that produced it.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::infra::checkpoint::{self, Checkpoint, CheckpointManager};

pub struct Inspection {
    pub path:       PathBuf,
    pub checkpoint: Checkpoint,
    pub config:     Option<TrainConfig>,
}

pub struct InspectUseCase {
    checkpoint:     Option<PathBuf>,
    checkpoint_dir: PathBuf,
}

impl InspectUseCase {
    pub fn new(checkpoint: Option<PathBuf>, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self { checkpoint, checkpoint_dir: checkpoint_dir.into() }
    }

    pub fn execute(&self) -> Result<Inspection> {
        let manager = CheckpointManager::open(&self.checkpoint_dir);
        let path    = match &self.checkpoint {
            Some(p) => p.clone(),
            None    => manager.latest_path()?,
        };
        let checkpoint = checkpoint::load(&path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        // The config lives next to the artifact
        let config_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let config     = CheckpointManager::open(config_dir).load_config::<TrainConfig>().ok();
        if config.is_none() {
            tracing::debug!("No train_config.json next to '{}'", path.display());
        }

        Ok(Inspection { path, checkpoint, config })
    }
}

impl Inspection {
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "checkpoint: {}", self.path.display())?;
        writeln!(out, "format:     v{}", self.checkpoint.format_version)?;
        writeln!(out, "parameters: {} values", self.checkpoint.parameters.num_values())?;
        for (group, name, tensor) in self.checkpoint.parameters.iter() {
            writeln!(out, "  {group}.{name:<16} {:?}", tensor.shape)?;
        }

        writeln!(out, "metadata:")?;
        for (key, value) in &self.checkpoint.metadata {
            writeln!(out, "  {key:<18} {}", value.summary())?;
        }

        if let Some(cfg) = &self.config {
            writeln!(out, "config:")?;
            writeln!(out, "{}", serde_json::to_string_pretty(cfg)?)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::WaveFunction;
    use crate::infra::checkpoint::{MetaValue, Metadata};
    use crate::ml::product::ProductStateModel;

    #[test]
    fn test_inspect_latest_in_directory() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let model   = ProductStateModel::with_probabilities(&[0.3, 0.6]);

        let mut meta = Metadata::new();
        meta.insert("epochs_completed".into(), MetaValue::Int(12));
        manager.save_epoch(&model.parameters(), &meta, 12).unwrap();
        manager.save_config(&TrainConfig::default()).unwrap();

        let inspection = InspectUseCase::new(None, dir.path()).execute().unwrap();
        assert_eq!(inspection.path, manager.epoch_path(12));
        assert_eq!(inspection.config, Some(TrainConfig::default()));

        let text = inspection.render().unwrap();
        assert!(text.contains("amplitude.logits"));
        assert!(text.contains("[2, 2]"));
        assert!(text.contains("epochs_completed"));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InspectUseCase::new(None, dir.path()).execute().is_err());
    }
}
