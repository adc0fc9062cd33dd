// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads the plain-text tomography files into a validated Dataset.
//
// File formats (blank lines and lines starting with '#' are skipped):
//
//   samples     one measurement per line, whitespace-separated 0/1
//               (numpy-style "1.000e+00" is accepted)
//   bases       one label per line, "X Z Z" or "XZZ"
//   basis set   distinct labels, same line format as bases
//   target      one amplitude per line, "re im" or just "re";
//               line i is basis state i, site 0 most significant
//
// Without a bases file every sample is taken to be measured in
// the computational basis. Without a basis-set file the set is
// derived from the labels in first-seen order.
//
// All failures are DataFormatError, raised before training.

use num_complex::Complex64;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::{Dataset, TargetState};
use crate::domain::basis::BasisLabel;
use crate::domain::error::DataFormatError;
use crate::domain::sample::Sample;

/// Loads a tomography dataset from text files.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    samples:   PathBuf,
    bases:     Option<PathBuf>,
    basis_set: Option<PathBuf>,
    target:    Option<PathBuf>,
}

impl DatasetLoader {
    pub fn new(samples: impl Into<PathBuf>) -> Self {
        Self { samples: samples.into(), bases: None, basis_set: None, target: None }
    }

    pub fn with_bases(mut self, labels: impl Into<PathBuf>) -> Self {
        self.bases = Some(labels.into());
        self
    }

    pub fn with_basis_set(mut self, set: impl Into<PathBuf>) -> Self {
        self.basis_set = Some(set.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Read and validate every configured file.
    pub fn load(&self) -> Result<Dataset, DataFormatError> {
        let samples = read_samples(&self.samples)?;
        let n       = samples.first().map(Vec::len).ok_or(DataFormatError::Empty)?;
        tracing::debug!("Read {} samples of width {} from '{}'", samples.len(), n, self.samples.display());

        let labels = match &self.bases {
            Some(path) => read_labels(path)?,
            None       => vec![BasisLabel::computational(n); samples.len()],
        };

        let basis_set = match (&self.basis_set, &self.bases) {
            (Some(path), _) => read_labels(path)?,
            (None, Some(_)) => distinct(&labels),
            (None, None)    => vec![BasisLabel::computational(n)],
        };

        let target = match &self.target {
            Some(path) => Some(TargetState::new(n, read_target(path)?)?),
            None       => None,
        };

        let dataset = Dataset::new(samples, labels, basis_set, target)?;
        tracing::info!(
            "Loaded dataset: {} samples, {} visible units, {} bases, target {}",
            dataset.len(),
            dataset.num_visible(),
            dataset.basis_set().len(),
            if dataset.target().is_some() { "present" } else { "absent" },
        );
        Ok(dataset)
    }
}

/// `load(samples, target, basis_labels, basis_set)` in one call.
pub fn load(
    samples_path:      impl AsRef<Path>,
    target_path:       Option<&Path>,
    basis_labels_path: Option<&Path>,
    basis_set_path:    Option<&Path>,
) -> Result<Dataset, DataFormatError> {
    let mut loader = DatasetLoader::new(samples_path.as_ref());
    if let Some(p) = target_path {
        loader = loader.with_target(p);
    }
    if let Some(p) = basis_labels_path {
        loader = loader.with_bases(p);
    }
    if let Some(p) = basis_set_path {
        loader = loader.with_basis_set(p);
    }
    loader.load()
}

// ─── Line readers ─────────────────────────────────────────────────────────────

/// Non-empty, non-comment lines with their 1-based line numbers.
fn content_lines(path: &Path) -> Result<Vec<(usize, String)>, DataFormatError> {
    let text = fs::read_to_string(path).map_err(|source| DataFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(i, l)| (i, l.to_string()))
        .collect())
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> DataFormatError {
    DataFormatError::Parse { path: path.to_path_buf(), line, message: message.into() }
}

fn read_samples(path: &Path) -> Result<Vec<Sample>, DataFormatError> {
    let mut width   = None;
    let mut samples = Vec::new();

    for (line, text) in content_lines(path)? {
        let row = text
            .split_whitespace()
            .map(|field| parse_bit(field).ok_or_else(|| parse_error(path, line, format!("'{field}' is not a binary outcome"))))
            .collect::<Result<Sample, _>>()?;

        let expected = *width.get_or_insert(row.len());
        if row.len() != expected {
            return Err(DataFormatError::RaggedRow {
                path: path.to_path_buf(),
                line,
                expected,
                found: row.len(),
            });
        }
        samples.push(row);
    }
    Ok(samples)
}

fn parse_bit(field: &str) -> Option<u8> {
    match field {
        "0" => Some(0),
        "1" => Some(1),
        other => match other.parse::<f64>().ok()? {
            v if v == 0.0 => Some(0),
            v if v == 1.0 => Some(1),
            _ => None,
        },
    }
}

fn read_labels(path: &Path) -> Result<Vec<BasisLabel>, DataFormatError> {
    let mut width  = None;
    let mut labels = Vec::new();

    for (line, text) in content_lines(path)? {
        let label: BasisLabel = text.parse().map_err(|e: String| parse_error(path, line, e))?;

        let expected = *width.get_or_insert(label.len());
        if label.len() != expected {
            return Err(DataFormatError::RaggedRow {
                path: path.to_path_buf(),
                line,
                expected,
                found: label.len(),
            });
        }
        labels.push(label);
    }
    Ok(labels)
}

fn read_target(path: &Path) -> Result<Vec<Complex64>, DataFormatError> {
    content_lines(path)?
        .into_iter()
        .map(|(line, text)| {
            let fields = text
                .split_whitespace()
                .map(|f| f.parse::<f64>().map_err(|e| parse_error(path, line, format!("'{f}': {e}"))))
                .collect::<Result<Vec<_>, _>>()?;

            match fields.as_slice() {
                [re]     => Ok(Complex64::new(*re, 0.0)),
                [re, im] => Ok(Complex64::new(*re, *im)),
                _ => Err(DataFormatError::RaggedRow {
                    path: path.to_path_buf(),
                    line,
                    expected: 2,
                    found: fields.len(),
                }),
            }
        })
        .collect()
}

fn distinct(labels: &[BasisLabel]) -> Vec<BasisLabel> {
    let mut out: Vec<BasisLabel> = Vec::new();
    for l in labels {
        if !out.contains(l) {
            out.push(l.clone());
        }
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_full_dataset() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "samples.txt", "0 1\n1 1\n\n# comment\n0 0\n");
        let bases   = write(&dir, "bases.txt", "Z Z\nXZ\nz z\n");
        let set     = write(&dir, "set.txt", "ZZ\nXZ\n");
        let target  = write(&dir, "psi.txt", "0.5 0.0\n0.5 0.0\n0.5 0.0\n0.0 0.5\n");

        let ds = load(&samples, Some(target.as_path()), Some(bases.as_path()), Some(set.as_path())).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.num_visible(), 2);
        assert_eq!(ds.basis_set().len(), 2);
        assert_eq!(ds.target().unwrap().amplitudes()[3], Complex64::new(0.0, 0.5));
    }

    #[test]
    fn test_numpy_style_samples() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0.000000e+00 1.000000e+00\n1.0 0.0\n");
        let ds      = DatasetLoader::new(&samples).load().unwrap();
        assert_eq!(ds.samples(), &[vec![0, 1], vec![1, 0]]);
        assert!(ds.basis_of(0).is_computational());
    }

    #[test]
    fn test_ragged_samples_report_line() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n1\n");
        let err     = DatasetLoader::new(&samples).load().unwrap_err();
        assert!(matches!(err, DataFormatError::RaggedRow { line: 2, expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_non_binary_sample() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 2\n");
        let err     = DatasetLoader::new(&samples).load().unwrap_err();
        assert!(matches!(err, DataFormatError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_misaligned_labels() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n1 1\n");
        let bases   = write(&dir, "b.txt", "ZZ\n");
        let err     = DatasetLoader::new(&samples).with_bases(&bases).load().unwrap_err();
        assert!(matches!(err, DataFormatError::CountMismatch { samples: 2, labels: 1 }));
    }

    #[test]
    fn test_label_missing_from_basis_set() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n1 1\n");
        let bases   = write(&dir, "b.txt", "ZZ\nYZ\n");
        let set     = write(&dir, "set.txt", "ZZ\nXZ\n");
        let err     = DatasetLoader::new(&samples)
            .with_bases(&bases)
            .with_basis_set(&set)
            .load()
            .unwrap_err();
        assert!(matches!(err, DataFormatError::UnknownBasis { row: 2, .. }));
    }

    #[test]
    fn test_basis_set_derived_from_labels() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n1 1\n0 0\n");
        let bases   = write(&dir, "b.txt", "XZ\nZZ\nXZ\n");
        let ds      = DatasetLoader::new(&samples).with_bases(&bases).load().unwrap();
        let names: Vec<String> = ds.basis_set().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["XZ", "ZZ"]);
    }

    #[test]
    fn test_target_wrong_length() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n");
        let target  = write(&dir, "psi.txt", "1.0\n0.0\n0.0\n");
        let err     = DatasetLoader::new(&samples).with_target(&target).load().unwrap_err();
        assert!(matches!(err, DataFormatError::TargetLength { expected: 4, found: 3, .. }));
    }

    #[test]
    fn test_target_with_nan_rejected() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n");
        let target  = write(&dir, "psi.txt", "0.5 0.0\nNaN 0.0\n0.5 0.0\n0.5 0.0\n");
        let err     = DatasetLoader::new(&samples).with_target(&target).load().unwrap_err();
        assert!(matches!(err, DataFormatError::NonFiniteAmplitude { index: 1 }));
    }

    #[test]
    fn test_all_zero_target_rejected() {
        let dir     = tempfile::tempdir().unwrap();
        let samples = write(&dir, "s.txt", "0 1\n");
        let target  = write(&dir, "psi.txt", "0 0\n0 0\n0 0\n0 0\n");
        let err     = DatasetLoader::new(&samples).with_target(&target).load().unwrap_err();
        assert!(matches!(err, DataFormatError::ZeroNormTarget));
    }

    #[test]
    fn test_missing_file() {
        let err = DatasetLoader::new("/definitely/not/here.txt").load().unwrap_err();
        assert!(matches!(err, DataFormatError::Io { .. }));
    }
}
