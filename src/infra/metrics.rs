// ============================================================
// Layer 6 — Metric Records and Sinks
// ============================================================
// A MetricRecord is what the evaluator produces at one epoch:
// every registered metric, in registration order, either with
// its value or marked as errored.
//
// Sinks decide where records go:
//   ReportSink   — "Epoch: 10\tfidelity = 0.981234\t..." lines
//                  on any io::Write (stdout in the CLI)
//   TracingSink  — one tracing event per record
//   CsvSink      — metrics.csv, one row per record
//
// Example CSV output:
//   epoch,fidelity,kl_divergence
//   10,0.912345,0.054321
//   20,0.953210,
//
// An errored metric leaves its CSV cell empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

// ─── MetricRecord ─────────────────────────────────────────────────────────────

/// Result of one metric at one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricOutcome {
    Value(f64),
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name:    String,
    pub outcome: MetricOutcome,
}

/// All metrics computed at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// 1-based epoch after which the metrics were computed
    pub epoch:   usize,
    pub entries: Vec<MetricEntry>,
}

impl MetricRecord {
    pub fn new(epoch: usize) -> Self {
        Self { epoch, entries: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: MetricOutcome) {
        self.entries.push(MetricEntry { name: name.into(), outcome });
    }

    /// Value of `name`, or `None` if absent or errored.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.name == name).and_then(|e| match e.outcome {
            MetricOutcome::Value(v)   => Some(v),
            MetricOutcome::Errored(_) => None,
        })
    }

    pub fn is_errored(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name == name && matches!(e.outcome, MetricOutcome::Errored(_)))
    }

    /// `Epoch: <i>\t<name> = <value>\t...`
    pub fn report_line(&self) -> String {
        let mut line = format!("Epoch: {}", self.epoch);
        for e in &self.entries {
            match &e.outcome {
                MetricOutcome::Value(v)   => line.push_str(&format!("\t{} = {:.6}", e.name, v)),
                MetricOutcome::Errored(_) => line.push_str(&format!("\t{} = error", e.name)),
            }
        }
        line
    }
}

// ─── Sinks ────────────────────────────────────────────────────────────────────

/// Destination for evaluator reports.
pub trait MetricSink {
    fn emit(&mut self, record: &MetricRecord) -> Result<()>;

    fn name(&self) -> &'static str {
        "MetricSink"
    }
}

/// Writes one report line per record.
pub struct ReportSink<W: Write> {
    out: W,
}

impl<W: Write> ReportSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ReportSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> MetricSink for ReportSink<W> {
    fn emit(&mut self, record: &MetricRecord) -> Result<()> {
        writeln!(self.out, "{}", record.report_line())?;
        self.out.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReportSink"
    }
}

/// Emits each record as a tracing event.
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn emit(&mut self, record: &MetricRecord) -> Result<()> {
        tracing::info!(epoch = record.epoch, "{}", record.report_line());
        for e in &record.entries {
            if let MetricOutcome::Errored(msg) = &e.outcome {
                tracing::warn!(epoch = record.epoch, metric = %e.name, "metric errored: {}", msg);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TracingSink"
    }
}

/// Appends records to `<dir>/metrics.csv`.
/// The header is written from the first record's metric names.
pub struct CsvSink {
    csv_path: PathBuf,
    columns:  Option<Vec<String>>,
}

impl CsvSink {
    /// Create the directory and start a fresh `metrics.csv`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;

        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        Ok(Self { csv_path, columns: None })
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

impl MetricSink for CsvSink {
    fn emit(&mut self, record: &MetricRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        if self.columns.is_none() {
            let names: Vec<String> = record.entries.iter().map(|e| e.name.clone()).collect();
            writeln!(f, "epoch,{}", names.join(","))?;
            self.columns = Some(names);
        }

        let mut row = record.epoch.to_string();
        for col in self.columns.iter().flatten() {
            row.push(',');
            if let Some(v) = record.get(col) {
                row.push_str(&format!("{v:.6}"));
            }
        }
        writeln!(f, "{row}")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CsvSink"
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> MetricRecord {
        let mut r = MetricRecord::new(epoch);
        r.push("fidelity", MetricOutcome::Value(0.5));
        r.push("kl_divergence", MetricOutcome::Errored("boom".into()));
        r
    }

    #[test]
    fn test_report_line_format() {
        assert_eq!(record(10).report_line(), "Epoch: 10\tfidelity = 0.500000\tkl_divergence = error");
    }

    #[test]
    fn test_get_skips_errored() {
        let r = record(1);
        assert_eq!(r.get("fidelity"), Some(0.5));
        assert_eq!(r.get("kl_divergence"), None);
        assert!(r.is_errored("kl_divergence"));
        assert!(!r.is_errored("fidelity"));
    }

    #[test]
    fn test_report_sink_writes_lines() {
        let mut sink = ReportSink::new(Vec::new());
        sink.emit(&record(10)).unwrap();
        sink.emit(&record(20)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Epoch: 20\t"));
    }

    #[test]
    fn test_csv_sink_header_and_rows() {
        let dir      = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path()).unwrap();
        sink.emit(&record(10)).unwrap();
        sink.emit(&record(20)).unwrap();

        let text = fs::read_to_string(sink.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["epoch,fidelity,kl_divergence", "10,0.500000,", "20,0.500000,"]);
    }
}
