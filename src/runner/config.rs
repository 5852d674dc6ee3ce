//! Configuration for loader invocations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Subcommand of the loader that imports a dataset.
pub const DEFAULT_SUBCOMMAND: &str = "load";

/// Flag that lets the loader overwrite an existing destination.
pub const DEFAULT_FORCE_FLAG: &str = "-f";

/// Configuration for running the loader against one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Loader subcommand, e.g. `load`.
    pub subcommand: String,
    /// Force-overwrite flag appended after the destination.
    pub force_flag: String,
    /// Per-dataset time limit; the loader is killed when exceeded.
    pub timeout: Duration,
    /// Extension of the destination database file.
    pub db_extension: String,
    /// Captured output kept on the record, in bytes (tail is kept).
    pub max_output_bytes: usize,
}

impl RunnerConfig {
    /// Creates a runner configuration with defaults.
    pub fn new() -> Self {
        Self {
            subcommand: DEFAULT_SUBCOMMAND.to_string(),
            force_flag: DEFAULT_FORCE_FLAG.to_string(),
            timeout: Duration::from_secs(3600), // 1 hour default
            db_extension: "sqlite".to_string(),
            max_output_bytes: 64 * 1024,
        }
    }

    /// Sets the loader subcommand.
    pub fn with_subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = subcommand.into();
        self
    }

    /// Sets the force-overwrite flag.
    pub fn with_force_flag(mut self, flag: impl Into<String>) -> Self {
        self.force_flag = flag.into();
        self
    }

    /// Sets the per-dataset timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the destination file extension.
    pub fn with_db_extension(mut self, ext: impl Into<String>) -> Self {
        self.db_extension = ext.into();
        self
    }

    /// Sets how much captured output is kept per record.
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
