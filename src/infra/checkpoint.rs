// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// A checkpoint is one binary file (bincode) holding
//
//   { format_version, parameters, metadata }
//
// where `parameters` is the model's ParameterSet and `metadata`
// is any caller-supplied mapping (e.g. generated samples).
//
// Writes are atomic: the artifact is encoded into a temporary
// file in the destination directory, flushed, fsync'ed and then
// renamed over the target. If anything fails the temporary file
// is dropped and removed, so the target path never holds a
// truncated artifact.
//
// bincode stores f64 as raw little-endian bits, so loading gives
// back bit-identical parameters.
//
// CheckpointManager lays out a run directory:
//   checkpoints/
//     model_epoch_10.qst    ← periodic snapshots (ModelSaver)
//     latest_epoch.json     ← number of the newest periodic snapshot
//     final.qst             ← end-of-run artifact
//     train_config.json     ← configuration of the run

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::domain::error::SerializationError;
use crate::domain::parameters::ParameterSet;

pub const FORMAT_VERSION: u32 = 1;

/// A metadata value stored next to the parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
    Samples(Vec<Vec<u8>>),
}

impl MetaValue {
    /// Short human-readable summary for `inspect`.
    pub fn summary(&self) -> String {
        match self {
            MetaValue::Bool(b)    => b.to_string(),
            MetaValue::Int(i)     => i.to_string(),
            MetaValue::Float(f)   => format!("{f}"),
            MetaValue::Text(s)    => format!("{s:?}"),
            MetaValue::Floats(v)  => format!("[{} floats]", v.len()),
            MetaValue::Samples(s) => format!(
                "[{} samples x {} sites]",
                s.len(),
                s.first().map_or(0, Vec::len)
            ),
        }
    }
}

pub type Metadata = BTreeMap<String, MetaValue>;

/// Decoded checkpoint artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub parameters:     ParameterSet,
    pub metadata:       Metadata,
}

/// Borrowing twin of `Checkpoint`; same encoding, no clone on save.
#[derive(Serialize)]
struct CheckpointRef<'a> {
    format_version: u32,
    parameters:     &'a ParameterSet,
    metadata:       &'a Metadata,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SerializationError + '_ {
    move |source| SerializationError::Io { path: path.to_path_buf(), source }
}

/// Atomically write `parameters` and `metadata` to `path`.
pub fn save(path: impl AsRef<Path>, parameters: &ParameterSet, metadata: &Metadata) -> Result<(), SerializationError> {
    let path = path.as_ref();
    let dir  = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        let artifact   = CheckpointRef { format_version: FORMAT_VERSION, parameters, metadata };
        bincode::serialize_into(&mut writer, &artifact)
            .map_err(|source| SerializationError::Encode { path: path.to_path_buf(), source })?;
        writer.flush().map_err(io_error(path))?;
    }
    tmp.as_file().sync_all().map_err(io_error(path))?;
    tmp.persist(path).map_err(|e| SerializationError::Io { path: path.to_path_buf(), source: e.error })?;

    tracing::debug!("Wrote checkpoint '{}' ({} parameters)", path.display(), parameters.num_values());
    Ok(())
}

/// Read a checkpoint written by `save`.
pub fn load(path: impl AsRef<Path>) -> Result<Checkpoint, SerializationError> {
    let path   = path.as_ref();
    let file   = fs::File::open(path).map_err(io_error(path))?;
    let reader = BufReader::new(file);

    let checkpoint: Checkpoint = bincode::deserialize_from(reader)
        .map_err(|source| SerializationError::Encode { path: path.to_path_buf(), source })?;

    if checkpoint.format_version != FORMAT_VERSION {
        return Err(SerializationError::Version {
            expected: FORMAT_VERSION,
            found:    checkpoint.format_version,
        });
    }
    Ok(checkpoint)
}

// ─── CheckpointManager ────────────────────────────────────────────────────────

/// Manages the checkpoint files of one training run directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing directory without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}.qst"))
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join("final.qst")
    }

    /// Save a periodic snapshot and move the latest-epoch pointer.
    pub fn save_epoch(&self, parameters: &ParameterSet, metadata: &Metadata, epoch: usize) -> Result<PathBuf> {
        let path = self.epoch_path(epoch);
        save(&path, parameters, metadata)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest = self.dir.join("latest_epoch.json");
        fs::write(&latest, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(path)
    }

    /// Save the end-of-run artifact.
    pub fn save_final(&self, parameters: &ParameterSet, metadata: &Metadata) -> Result<PathBuf> {
        let path = self.final_path();
        save(&path, parameters, metadata)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        Ok(path)
    }

    /// Path of the newest artifact: `final.qst` if present, otherwise
    /// the snapshot named by `latest_epoch.json`.
    pub fn latest_path(&self) -> Result<PathBuf> {
        let final_path = self.final_path();
        if final_path.exists() {
            return Ok(final_path);
        }
        Ok(self.epoch_path(self.latest_epoch()?))
    }

    pub fn load_latest(&self) -> Result<Checkpoint> {
        let path = self.latest_path()?;
        tracing::info!("Loading checkpoint '{}'", path.display());
        load(&path).with_context(|| {
            format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
        })
    }

    /// Save the run configuration as pretty JSON.
    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json).with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<C: DeserializeOwned>(&self) -> Result<C> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read config from '{}'. Make sure you have run 'train' first.", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let s    = fs::read_to_string(&path)
            .with_context(|| format!("No checkpoint found in '{}'. Have you run 'train' first?", self.dir.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
