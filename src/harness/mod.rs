//! Regression harness driver.
//!
//! Runs one full regression pass:
//!
//! ```text
//! Registry → resolve → Builder → with_workspace { for each dataset: run → verify → report }
//! ```
//!
//! Datasets are processed strictly one at a time, in registry order, so
//! timings are not skewed by contention. A dataset failure is recorded and
//! the loop continues; only build and workspace errors abort the run.

pub mod config;

pub use config::HarnessConfig;

use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::build::{BuildInfo, Builder};
use crate::error::{ConfigError, HarnessError};
use crate::registry::DatasetDescriptor;
use crate::report::{HarnessReport, Reporter};
use crate::runner::{ExecutionRecord, ExecutionRunner, FailureReason, Verifier};
use crate::workspace::{with_workspace, Workspace};

/// Drives build, workspace and per-dataset execution for one run.
pub struct Harness {
    config: HarnessConfig,
    runner: ExecutionRunner,
    verifier: Verifier,
    reporter: Reporter,
}

impl Harness {
    /// Creates a harness with the default marker check and a printing reporter.
    pub fn new(config: HarnessConfig) -> Self {
        let runner = ExecutionRunner::new(config.runner.clone());
        Self {
            config,
            runner,
            verifier: Verifier::default(),
            reporter: Reporter::new(),
        }
    }

    /// Replaces the success check.
    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the progress reporter.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs the whole registry.
    ///
    /// Returns one record per registry entry, in order. An empty registry,
    /// a build failure or a workspace failure returns an error and no records.
    pub async fn run(&self) -> Result<HarnessReport, HarnessError> {
        let run_id = format!("run-{}", Uuid::new_v4());
        let started_at = Utc::now();
        let registry = &self.config.registry;
        if registry.is_empty() {
            error!("Registry has no datasets, nothing to verify");
            return Err(HarnessError::EmptyRegistry);
        }
        info!(
            run_id = %run_id,
            datasets = registry.len(),
            data_root = %self.config.data_root.display(),
            "Starting regression run"
        );

        let resolved = registry.resolve(&self.config.data_root);
        if !resolved.iter().any(|(_, r)| r.is_ok()) {
            warn!("No dataset resolved under the data root; skipping build");
            let records = resolved
                .into_iter()
                .map(|(ds, res)| {
                    self.reporter.dataset_started(&ds);
                    let record = self.unresolved(&ds, res.err());
                    self.reporter.dataset_finished(&record);
                    record
                })
                .collect();
            return Ok(self.finish(run_id, started_at, None, records));
        }

        let build = Builder::new(self.config.build.clone())
            .build()
            .await
            .map_err(|e| {
                error!("Build failed, no dataset will run: {}", e);
                e
            })?;

        let records = with_workspace(&build.artifact, &self.config.workspace, |ws| {
            self.run_datasets(ws, resolved)
        })
        .await?;

        Ok(self.finish(run_id, started_at, Some(build), records))
    }

    async fn run_datasets(
        &self,
        workspace: Workspace,
        resolved: Vec<(DatasetDescriptor, Result<PathBuf, ConfigError>)>,
    ) -> Vec<ExecutionRecord> {
        let mut records = Vec::with_capacity(resolved.len());
        let mut aborted = false;

        for (position, (dataset, resolution)) in resolved.into_iter().enumerate() {
            if aborted {
                records.push(ExecutionRecord::pending(dataset.id()));
                continue;
            }

            self.reporter.dataset_started(&dataset);
            let mut record = match resolution {
                Ok(metadata) => {
                    let mut record = self
                        .runner
                        .run(&workspace, position, &dataset, &metadata)
                        .await;
                    record.apply(self.verifier.verify(&record));
                    record
                }
                Err(e) => self.unresolved(&dataset, Some(e)),
            };
            record.truncate_output(self.runner.config().max_output_bytes);
            self.reporter.dataset_finished(&record);

            if record.is_failed() {
                warn!(dataset = %dataset, failure = ?record.failure, "Dataset failed");
                if self.config.fail_fast {
                    warn!("Fail-fast set, skipping remaining datasets");
                    aborted = true;
                }
            }
            records.push(record);
        }

        records
    }

    fn unresolved(&self, dataset: &DatasetDescriptor, err: Option<ConfigError>) -> ExecutionRecord {
        let mut record = ExecutionRecord::pending(dataset.id());
        let message = err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "dataset not resolved".to_string());
        record.fail(FailureReason::Configuration { message });
        record
    }

    fn finish(
        &self,
        run_id: String,
        started_at: chrono::DateTime<Utc>,
        build: Option<BuildInfo>,
        records: Vec<ExecutionRecord>,
    ) -> HarnessReport {
        let report = HarnessReport::new(
            run_id,
            started_at,
            self.config.data_root.clone(),
            build,
            records,
        );
        info!(
            run_id = %report.run_id,
            passed = report.summary.passed,
            failed = report.summary.failed,
            "Regression run finished"
        );
        self.reporter.summary(&report);
        report
    }
}
