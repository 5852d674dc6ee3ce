//! Verification of loader runs.
//!
//! A run passes only if the loader exited with code 0 and its captured
//! output satisfies the configured [`OutputCheck`]. The check is the only
//! place that knows what "success" looks like in the loader's output, so a
//! structured signal can replace the marker token later without touching
//! the runner or the reporter.

use std::fs;
use std::io;
use std::path::Path;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use super::result::{ExecutionRecord, FailureReason, RunStatus, Verdict};

/// Token the loader prints after a completed load.
pub const DEFAULT_MARKER: &str = "Loaded";

/// Decides whether captured loader output signals success.
pub trait OutputCheck: Send + Sync + std::fmt::Debug {
    /// Returns true if `output` signals a completed load.
    fn accepts(&self, output: &str) -> bool;

    /// Human-readable description of what is expected.
    fn describe(&self) -> String;
}

/// Substring match on a literal marker token.
#[derive(Debug, Clone)]
pub struct MarkerCheck {
    marker: String,
}

impl MarkerCheck {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for MarkerCheck {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl OutputCheck for MarkerCheck {
    fn accepts(&self, output: &str) -> bool {
        output.contains(&self.marker)
    }

    fn describe(&self) -> String {
        format!("'{}'", self.marker)
    }
}

/// Regular-expression match anywhere in the output.
#[derive(Debug, Clone)]
pub struct PatternCheck {
    pattern: Regex,
}

impl PatternCheck {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl OutputCheck for PatternCheck {
    fn accepts(&self, output: &str) -> bool {
        self.pattern.is_match(output)
    }

    fn describe(&self) -> String {
        format!("/{}/", self.pattern.as_str())
    }
}

/// Turns execution records into verdicts.
#[derive(Debug)]
pub struct Verifier {
    check: Box<dyn OutputCheck>,
}

impl Verifier {
    pub fn new(check: Box<dyn OutputCheck>) -> Self {
        Self { check }
    }

    /// Verifier using a literal marker token.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self::new(Box::new(MarkerCheck::new(marker)))
    }

    pub fn check(&self) -> &dyn OutputCheck {
        self.check.as_ref()
    }

    /// Verifies a finished execution.
    ///
    /// Records that already failed (launch error, timeout) keep their
    /// reason. A passing run also gets the size of its database measured.
    pub fn verify(&self, record: &ExecutionRecord) -> Verdict {
        if let Some(reason) = &record.failure {
            return Verdict::Failed(reason.clone());
        }
        if record.status != RunStatus::Running {
            return Verdict::Failed(FailureReason::Spawn {
                message: format!("loader never ran (status {})", record.status),
            });
        }

        if record.exit_code != Some(0) {
            return Verdict::Failed(FailureReason::NonZeroExit {
                code: record.exit_code,
            });
        }

        if !self.check.accepts(&record.output) {
            return Verdict::Failed(FailureReason::MarkerMissing {
                expected: self.check.describe(),
            });
        }

        let Some(destination) = &record.destination else {
            return Verdict::Failed(FailureReason::MissingArtifact {
                path: Default::default(),
                message: "no destination recorded".to_string(),
            });
        };
        match artifact_size(destination) {
            Ok(size_bytes) => {
                debug!(dataset = %record.dataset, size_bytes, "Verified");
                Verdict::Passed { size_bytes }
            }
            Err(e) => Verdict::Failed(FailureReason::MissingArtifact {
                path: destination.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Box::new(MarkerCheck::default()))
    }
}

/// Size in bytes of a database file, or the total of all files below a
/// database directory.
pub fn artifact_size(path: &Path) -> io::Result<u64> {
    let meta = fs::metadata(path)?;
    if meta.is_file() {
        return Ok(meta.len());
    }

    let mut total = 0u64;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            total = total.saturating_add(entry.metadata().map_err(io::Error::from)?.len());
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn finished(exit_code: Option<i32>, output: &str, destination: PathBuf) -> ExecutionRecord {
        let mut record = ExecutionRecord::pending("A/metadata.json");
        record.start(PathBuf::from("A/metadata.json"), destination);
        record.exit_code = exit_code;
        record.output = output.to_string();
        record
    }

    #[test]
    fn test_exit_code_and_marker_combinations() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("a.sqlite");
        fs::write(&db, vec![0u8; 120]).unwrap();
        let verifier = Verifier::default();

        let ok = finished(Some(0), "...Loaded 120 rows...", db.clone());
        assert_eq!(verifier.verify(&ok), Verdict::Passed { size_bytes: 120 });

        let no_marker = finished(Some(0), "done", db.clone());
        assert!(matches!(
            verifier.verify(&no_marker),
            Verdict::Failed(FailureReason::MarkerMissing { .. })
        ));

        let bad_exit = finished(Some(1), "Loaded 3 rows, then crashed", db.clone());
        assert_eq!(
            verifier.verify(&bad_exit),
            Verdict::Failed(FailureReason::NonZeroExit { code: Some(1) })
        );

        let both_bad = finished(Some(1), "error: bad schema", db);
        assert_eq!(
            verifier.verify(&both_bad),
            Verdict::Failed(FailureReason::NonZeroExit { code: Some(1) })
        );
    }

    #[test]
    fn test_missing_destination_fails() {
        let dir = TempDir::new().unwrap();
        let record = finished(Some(0), "Loaded", dir.path().join("never-written.sqlite"));
        assert!(matches!(
            Verifier::default().verify(&record),
            Verdict::Failed(FailureReason::MissingArtifact { .. })
        ));
    }

    #[test]
    fn test_existing_failure_is_preserved() {
        let mut record = ExecutionRecord::pending("A/metadata.json");
        record.start(PathBuf::from("m"), PathBuf::from("d"));
        record.fail(FailureReason::Timeout { limit_secs: 1.0 });
        assert_eq!(
            Verifier::default().verify(&record),
            Verdict::Failed(FailureReason::Timeout { limit_secs: 1.0 })
        );
    }

    #[test]
    fn test_pattern_check() {
        let check = PatternCheck::new(r"Loaded \d+ rows").unwrap();
        assert!(check.accepts("Loaded 120 rows into db"));
        assert!(!check.accepts("Loaded dataset"));
        assert_eq!(check.describe(), r"/Loaded \d+ rows/");
        assert!(PatternCheck::new("(unclosed").is_err());
    }

    #[test]
    fn test_artifact_size_of_directory() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        fs::create_dir_all(db.join("nested")).unwrap();
        fs::write(db.join("a"), vec![1u8; 10]).unwrap();
        fs::write(db.join("nested/b"), vec![1u8; 32]).unwrap();
        assert_eq!(artifact_size(&db).unwrap(), 42);
    }

    #[test]
    fn test_artifact_size_missing() {
        assert!(artifact_size(Path::new("/no/such/db.sqlite")).is_err());
    }
}
