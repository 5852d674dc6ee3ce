//! Configuration for a full regression run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::build::BuildConfig;
use crate::registry::DatasetRegistry;
use crate::runner::RunnerConfig;
use crate::workspace::WorkspaceConfig;

/// Environment variable naming the reference-data root.
pub const DATA_ROOT_ENV: &str = "CLDF_DATA_ROOT";

/// Everything a [`Harness`](super::Harness) needs, injected as one value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Root under which registry identifiers resolve.
    pub data_root: PathBuf,
    /// Datasets to run, in order.
    pub registry: DatasetRegistry,
    /// How to build the loader.
    pub build: BuildConfig,
    /// How to invoke the loader per dataset.
    pub runner: RunnerConfig,
    /// Where and how to create the run workspace.
    pub workspace: WorkspaceConfig,
    /// Stop after the first failed dataset; the rest stay pending.
    pub fail_fast: bool,
}

impl HarnessConfig {
    /// Creates a configuration with the built-in registry and defaults.
    pub fn new(data_root: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            registry: DatasetRegistry::default(),
            build: BuildConfig::new(source_dir),
            runner: RunnerConfig::default(),
            workspace: WorkspaceConfig::default(),
            fail_fast: false,
        }
    }

    /// Sets the registry.
    pub fn with_registry(mut self, registry: DatasetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the build configuration.
    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    /// Sets the runner configuration.
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Sets the workspace configuration.
    pub fn with_workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    /// Enables or disables fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Default reference-data root: `$CLDF_DATA_ROOT`, else `$HOME/projects`.
pub fn default_data_root() -> PathBuf {
    if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("projects")
}
