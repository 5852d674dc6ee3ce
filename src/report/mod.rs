//! Run reports: progress lines, the end-of-run summary, and the JSON
//! report consumed by later runs for trend comparison.

pub mod compare;

pub use compare::{compare, DatasetDelta};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::BuildInfo;
use crate::error::LoadError;
use crate::registry::DatasetDescriptor;
use crate::runner::result::tail;
use crate::runner::{ExecutionRecord, RunStatus};

/// Bytes of loader output echoed for a failed dataset.
const FAILURE_TAIL_BYTES: usize = 2000;

/// Counts over all records of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub config_errors: usize,
    pub not_run: usize,
    pub total_elapsed_secs: f64,
    pub total_size_bytes: u64,
}

impl RunSummary {
    pub fn from_records(records: &[ExecutionRecord]) -> Self {
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };
        for r in records {
            match r.status {
                RunStatus::Passed => summary.passed += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Pending | RunStatus::Running => summary.not_run += 1,
            }
            if let Some(reason) = &r.failure {
                if reason.is_timeout() {
                    summary.timed_out += 1;
                }
                if reason.is_configuration() {
                    summary.config_errors += 1;
                }
            }
            summary.total_elapsed_secs += r.elapsed_secs();
            summary.total_size_bytes += r.size_bytes.unwrap_or(0);
        }
        summary
    }
}

/// Everything one harness run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_root: PathBuf,
    /// Absent when no dataset resolved and the build was skipped.
    pub build: Option<BuildInfo>,
    pub summary: RunSummary,
    /// One record per registry entry, in registry order.
    pub records: Vec<ExecutionRecord>,
}

impl HarnessReport {
    pub fn new(
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        data_root: PathBuf,
        build: Option<BuildInfo>,
        records: Vec<ExecutionRecord>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: Utc::now(),
            data_root,
            build,
            summary: RunSummary::from_records(&records),
            records,
        }
    }

    /// True when every dataset passed.
    pub fn is_success(&self) -> bool {
        self.records.iter().all(ExecutionRecord::is_passed)
    }

    /// Records that did not pass, in registry order.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter().filter(|r| !r.is_passed())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), LoadError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| LoadError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads a report written by an earlier run.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Format a byte count for human display.
pub fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Line printed when a dataset starts.
pub fn started_line(dataset: &DatasetDescriptor) -> String {
    format!("{} ...", dataset)
}

/// Line printed when a dataset finishes.
pub fn finished_line(record: &ExecutionRecord) -> String {
    match (&record.status, &record.failure) {
        (RunStatus::Passed, _) => format!(
            "... {} {:.1}s {}",
            record.dataset,
            record.elapsed_secs(),
            human_size(record.size_bytes.unwrap_or(0))
        ),
        (_, Some(reason)) if reason.is_configuration() => {
            format!("... {} SKIPPED ({})", record.dataset, reason)
        }
        (_, Some(reason)) => format!(
            "... {} FAILED ({}) after {:.1}s",
            record.dataset,
            reason,
            record.elapsed_secs()
        ),
        (status, None) => format!("... {} {}", record.dataset, status),
    }
}

/// Summary block printed after all datasets.
pub fn summary_text(report: &HarnessReport) -> String {
    let s = &report.summary;
    let mut out = String::new();
    out.push_str("\n=== CLDF Regression Results ===\n");
    out.push_str(&format!("Datasets:       {}\n", s.total));
    out.push_str(&format!("Passed:         {}\n", s.passed));
    out.push_str(&format!("Failed:         {}\n", s.failed));
    if s.timed_out > 0 {
        out.push_str(&format!("  timed out:    {}\n", s.timed_out));
    }
    if s.config_errors > 0 {
        out.push_str(&format!("  config errors:{}\n", s.config_errors));
    }
    if s.not_run > 0 {
        out.push_str(&format!("Not run:        {}\n", s.not_run));
    }
    out.push_str(&format!("Total time:     {:.1}s\n", s.total_elapsed_secs));
    out.push_str(&format!("Total size:     {}\n", human_size(s.total_size_bytes)));
    if let Some(build) = &report.build {
        let rev = build.revision.as_deref().unwrap_or("unknown");
        let digest = build.sha256.get(..12).unwrap_or(&build.sha256);
        out.push_str(&format!("Loader:         {} (sha256 {})\n", rev, digest));
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        out.push_str("\nFailures:\n");
        for r in failures {
            match &r.failure {
                Some(reason) => out.push_str(&format!("  {} [{}]\n", r.dataset, reason)),
                None => out.push_str(&format!("  {} [{}]\n", r.dataset, r.status)),
            }
        }
    }
    out
}

/// Prints progress for an interactive run.
///
/// Quiet reporters print nothing, for `--json` output.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    pub fn dataset_started(&self, dataset: &DatasetDescriptor) {
        if !self.quiet {
            println!("{}", started_line(dataset));
        }
    }

    pub fn dataset_finished(&self, record: &ExecutionRecord) {
        if self.quiet {
            return;
        }
        println!("{}", finished_line(record));
        if record.is_failed() && !record.output.trim().is_empty() {
            for line in tail(record.output.trim_end(), FAILURE_TAIL_BYTES).lines() {
                println!("    | {}", line);
            }
        }
    }

    pub fn summary(&self, report: &HarnessReport) {
        if !self.quiet {
            print!("{}", summary_text(report));
        }
    }
}
