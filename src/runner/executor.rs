//! Loader executor: runs one dataset through the staged loader.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::RunnerConfig;
use super::result::{ExecutionRecord, FailureReason};
use crate::registry::DatasetDescriptor;
use crate::workspace::Workspace;

/// Runs the loader's import subcommand, one dataset at a time.
pub struct ExecutionRunner {
    config: RunnerConfig,
}

impl ExecutionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// File stem for the dataset at `position` in the registry.
    ///
    /// The position prefix keeps stems distinct even when two identifiers
    /// share a slug.
    pub fn file_stem(position: usize, dataset: &DatasetDescriptor) -> String {
        format!("{:02}-{}", position, dataset.slug())
    }

    /// Database path for `dataset` inside the workspace.
    pub fn destination(
        &self,
        workspace: &Workspace,
        position: usize,
        dataset: &DatasetDescriptor,
    ) -> PathBuf {
        workspace.file(&format!(
            "{}.{}",
            Self::file_stem(position, dataset),
            self.config.db_extension
        ))
    }

    /// Log file receiving the loader's combined stdout and stderr.
    pub fn log_path(
        &self,
        workspace: &Workspace,
        position: usize,
        dataset: &DatasetDescriptor,
    ) -> PathBuf {
        workspace.file(&format!("{}.log", Self::file_stem(position, dataset)))
    }

    /// Arguments passed to the loader:
    /// `<subcommand> <metadata> <destination> <force flag>`.
    pub fn args(&self, metadata: &Path, destination: &Path) -> Vec<String> {
        let mut args = vec![
            self.config.subcommand.clone(),
            metadata.to_string_lossy().into_owned(),
            destination.to_string_lossy().into_owned(),
        ];
        if !self.config.force_flag.is_empty() {
            args.push(self.config.force_flag.clone());
        }
        args
    }

    /// Runs the loader on `dataset` and returns its record.
    ///
    /// The record is left `Running` when the loader exited on its own, ready
    /// for verification; launch errors and timeouts mark it `Failed`.
    /// Never aborts the harness.
    pub async fn run(
        &self,
        workspace: &Workspace,
        position: usize,
        dataset: &DatasetDescriptor,
        metadata: &Path,
    ) -> ExecutionRecord {
        let mut record = ExecutionRecord::pending(dataset.id());
        let destination = self.destination(workspace, position, dataset);
        let log_path = self.log_path(workspace, position, dataset);
        let args = self.args(metadata, &destination);

        record.start(metadata.to_path_buf(), destination);
        debug!(
            dataset = %dataset,
            "Running {} {}",
            workspace.artifact().display(),
            args.join(" ")
        );

        let (stdout, stderr) = match combined_log(&log_path) {
            Ok(pair) => pair,
            Err(e) => {
                record.fail(FailureReason::Spawn {
                    message: format!("cannot create log {}: {}", log_path.display(), e),
                });
                return record;
            }
        };

        let start = Instant::now();
        let spawned = Command::new(workspace.artifact())
            .args(&args)
            .current_dir(workspace.root())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                record.elapsed = start.elapsed();
                record.finished_at = Some(Utc::now());
                record.fail(FailureReason::Spawn {
                    message: e.to_string(),
                });
                return record;
            }
        };

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        let mut timed_out = false;
        match waited {
            Ok(Ok(status)) => {
                record.exit_code = status.code();
            }
            Ok(Err(e)) => {
                record.elapsed = start.elapsed();
                record.finished_at = Some(Utc::now());
                record.fail(FailureReason::Spawn {
                    message: format!("wait failed: {}", e),
                });
                return record;
            }
            Err(_) => {
                timed_out = true;
                if let Err(e) = child.kill().await {
                    warn!(dataset = %dataset, "Failed to kill timed-out loader: {}", e);
                }
            }
        }
        record.elapsed = start.elapsed();
        record.finished_at = Some(Utc::now());

        record.output = match tokio::fs::read(&log_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(dataset = %dataset, "Failed to read loader output: {}", e);
                String::new()
            }
        };

        if timed_out {
            warn!(
                dataset = %dataset,
                "Loader killed after {:?} timeout",
                self.config.timeout
            );
            record.fail(FailureReason::Timeout {
                limit_secs: self.config.timeout.as_secs_f64(),
            });
        } else {
            info!(
                dataset = %dataset,
                exit_code = ?record.exit_code,
                "Loader finished in {:.1}s",
                record.elapsed_secs()
            );
        }

        record
    }
}

/// Opens `path` once and returns two handles to it, so stdout and stderr
/// interleave in write order.
fn combined_log(path: &Path) -> std::io::Result<(Stdio, Stdio)> {
    let file = File::create(path)?;
    let other = file.try_clone()?;
    Ok((Stdio::from(file), Stdio::from(other)))
}
