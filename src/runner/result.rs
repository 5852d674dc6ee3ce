//! Execution records: the per-dataset outcome of one harness run.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one dataset within a run.
///
/// `Pending → Running → {Passed, Failed}`. Configuration failures go
/// straight from `Pending` to `Failed` since nothing is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not started yet (or never started, after a fail-fast abort).
    Pending,
    /// Loader process launched.
    Running,
    /// Loader succeeded and its output verified.
    Passed,
    /// Terminal failure; see the record's failure reason.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Passed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Passed => write!(f, "passed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a dataset failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The dataset could not be resolved under the data root.
    Configuration { message: String },
    /// The loader could not be launched.
    Spawn { message: String },
    /// The loader exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    NonZeroExit { code: Option<i32> },
    /// Exit code 0, but the output did not satisfy the success check.
    MarkerMissing { expected: String },
    /// The loader exceeded the per-dataset time limit and was killed.
    Timeout { limit_secs: f64 },
    /// The loader reported success but wrote no readable destination.
    MissingArtifact { path: PathBuf, message: String },
}

impl FailureReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, FailureReason::Configuration { .. })
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Configuration { message } => write!(f, "configuration: {}", message),
            FailureReason::Spawn { message } => write!(f, "failed to launch loader: {}", message),
            FailureReason::NonZeroExit { code: Some(code) } => write!(f, "exit code {}", code),
            FailureReason::NonZeroExit { code: None } => write!(f, "terminated by signal"),
            FailureReason::MarkerMissing { expected } => {
                write!(f, "success marker missing (expected {})", expected)
            }
            FailureReason::Timeout { limit_secs } => write!(f, "timed out after {:.0}s", limit_secs),
            FailureReason::MissingArtifact { path, message } => {
                write!(f, "no database at {}: {}", path.display(), message)
            }
        }
    }
}

/// Outcome of verifying one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed { size_bytes: u64 },
    Failed(FailureReason),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }
}

/// Result of loading one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Registry identifier of the dataset.
    pub dataset: String,
    /// Current state.
    pub status: RunStatus,
    /// Failure reason when `status` is `Failed`.
    pub failure: Option<FailureReason>,
    /// Resolved metadata file that was passed to the loader.
    pub metadata_path: Option<PathBuf>,
    /// Database path the loader was asked to write.
    pub destination: Option<PathBuf>,
    /// Exit code, `None` if not run, killed or signalled.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr of the loader (tail, if truncated).
    pub output: String,
    /// Wall-clock time from launch to exit.
    pub elapsed: Duration,
    /// Launch timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Exit timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Size of the produced database, on success.
    pub size_bytes: Option<u64>,
}

impl ExecutionRecord {
    /// Creates a record for a dataset that has not started.
    pub fn pending(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            status: RunStatus::Pending,
            failure: None,
            metadata_path: None,
            destination: None,
            exit_code: None,
            output: String::new(),
            elapsed: Duration::ZERO,
            started_at: None,
            finished_at: None,
            size_bytes: None,
        }
    }

    fn transition(&mut self, next: RunStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal transition {} -> {} for {}",
            self.status,
            next,
            self.dataset
        );
        self.status = next;
    }

    /// Marks the record running.
    pub fn start(&mut self, metadata_path: PathBuf, destination: PathBuf) {
        self.transition(RunStatus::Running);
        self.metadata_path = Some(metadata_path);
        self.destination = Some(destination);
        self.started_at = Some(Utc::now());
    }

    /// Marks the record failed.
    pub fn fail(&mut self, reason: FailureReason) {
        self.transition(RunStatus::Failed);
        self.failure = Some(reason);
    }

    /// Applies a verification verdict to a running record.
    ///
    /// Records that already failed keep their original reason.
    pub fn apply(&mut self, verdict: Verdict) {
        if self.status.is_terminal() {
            return;
        }
        match verdict {
            Verdict::Passed { size_bytes } => {
                self.transition(RunStatus::Passed);
                self.size_bytes = Some(size_bytes);
            }
            Verdict::Failed(reason) => self.fail(reason),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Keeps at most `max_bytes` of the output, preferring the tail where
    /// loaders print their errors.
    pub fn truncate_output(&mut self, max_bytes: usize) {
        self.output = tail(&self.output, max_bytes);
    }
}

/// Last `max` bytes of `s`, on a char boundary.
pub(crate) fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) && start < s.len() {
        start += 1;
    }
    format!("[truncated] ...{}", &s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Passed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Passed));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Running));
        assert!(!RunStatus::Passed.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn test_record_lifecycle_pass() {
        let mut record = ExecutionRecord::pending("A/metadata.json");
        assert_eq!(record.status, RunStatus::Pending);

        record.start(PathBuf::from("/data/A/metadata.json"), PathBuf::from("/ws/A.sqlite"));
        assert_eq!(record.status, RunStatus::Running);
        assert!(record.started_at.is_some());

        record.apply(Verdict::Passed { size_bytes: 4096 });
        assert!(record.is_passed());
        assert_eq!(record.size_bytes, Some(4096));
        assert!(record.failure.is_none());
    }

    #[test]
    fn test_apply_keeps_earlier_failure() {
        let mut record = ExecutionRecord::pending("A/metadata.json");
        record.start(PathBuf::from("m"), PathBuf::from("d"));
        record.fail(FailureReason::Timeout { limit_secs: 5.0 });

        record.apply(Verdict::Failed(FailureReason::NonZeroExit { code: None }));
        assert_eq!(record.failure, Some(FailureReason::Timeout { limit_secs: 5.0 }));
    }

    #[test]
    fn test_configuration_failure_from_pending() {
        let mut record = ExecutionRecord::pending("B/metadata.json");
        record.fail(FailureReason::Configuration {
            message: "missing".to_string(),
        });
        assert!(record.is_failed());
        assert!(record.failure.as_ref().unwrap().is_configuration());
        assert!(record.started_at.is_none());
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::NonZeroExit { code: Some(1) }.to_string(), "exit code 1");
        assert_eq!(
            FailureReason::NonZeroExit { code: None }.to_string(),
            "terminated by signal"
        );
        assert_eq!(
            FailureReason::Timeout { limit_secs: 30.0 }.to_string(),
            "timed out after 30s"
        );
    }

    #[test]
    fn test_failure_reason_serialization() {
        let json = serde_json::to_string(&FailureReason::NonZeroExit { code: Some(2) }).unwrap();
        assert_eq!(json, r#"{"kind":"non_zero_exit","code":2}"#);
    }

    #[test]
    fn test_tail_truncation() {
        assert_eq!(tail("short", 10), "short");
        let t = tail("0123456789error: bad schema", 17);
        assert!(t.ends_with("error: bad schema"));
        assert!(t.starts_with("[truncated]"));
        let u = tail("héllo wörld", 4);
        assert!(u.ends_with("rld"));
    }
}
