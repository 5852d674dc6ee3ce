//! Error types for cldf-regress operations.
//!
//! Defines error types for each harness stage:
//! - Registry resolution (per dataset, recoverable)
//! - Building the loader from source (fatal)
//! - Workspace creation, staging and cleanup (fatal)
//!
//! Dataset execution failures are not errors; they are recorded as
//! [`FailureReason`](crate::runner::FailureReason) values on the record.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while resolving a registry entry against the data root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Reference data root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("Metadata file for '{dataset}' not found at {}", .path.display())]
    MissingMetadata { dataset: String, path: PathBuf },

    #[error("Invalid dataset identifier '{0}': must be a relative path inside the data root")]
    InvalidIdentifier(String),
}

/// Errors that can occur while building the loader.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build command is empty")]
    EmptyCommand,

    #[error("Failed to launch build command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build failed with exit code {code:?}:\n{diagnostic}")]
    Failed { code: Option<i32>, diagnostic: String },

    #[error("Build timed out after {0:?}")]
    Timeout(Duration),

    #[error("Build succeeded but artifact is missing at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while managing the run workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create workspace directory: {0}")]
    Create(#[source] std::io::Error),

    #[error("Failed to stage artifact {} into workspace: {source}", .artifact.display())]
    Stage {
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove workspace {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reading or writing registry files and run reports.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Registry file lists no datasets")]
    EmptyRegistry,
}

/// Fatal errors that abort a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Registry has no datasets")]
    EmptyRegistry,
}
