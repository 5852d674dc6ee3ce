//! Ephemeral run workspaces.
//!
//! A workspace is a uniquely named temporary directory owned by one harness
//! run. It holds a staged copy of the loader and every per-dataset output.
//! The directory is removed when the run ends, whichever way it ends:
//! normal return, error value, panic, or the run future being dropped
//! (e.g. on Ctrl-C). Only `keep` opts out.
//!
//! # Example
//!
//! ```ignore
//! use cldf_regress::workspace::{with_workspace, WorkspaceConfig};
//!
//! let records = with_workspace(&artifact, &WorkspaceConfig::default(), |ws| async move {
//!     runner.run(&ws, 0, &dataset, &metadata).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::WorkspaceError;

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "cldf-regress-";

/// Workspace creation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory name prefix; a random suffix is always appended.
    pub prefix: String,
    /// Parent directory. Defaults to the system temp dir.
    pub parent: Option<PathBuf>,
    /// Leave the directory in place after the run (debugging).
    pub keep: bool,
}

impl WorkspaceConfig {
    /// Creates workspaces under `parent` instead of the system temp dir.
    pub fn with_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Keeps the workspace after the run.
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            prefix: WORKSPACE_PREFIX.to_string(),
            parent: None,
            keep: false,
        }
    }
}

/// Paths of an active workspace, handed to the continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    artifact: PathBuf,
}

impl Workspace {
    /// The workspace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The staged loader executable inside the workspace.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Creates a workspace, stages `artifact` into it, runs `f`, then removes
/// the workspace.
///
/// The continuation's own result is returned untouched; only workspace
/// failures surface as errors.
pub async fn with_workspace<F, Fut, T>(
    artifact: &Path,
    config: &WorkspaceConfig,
    f: F,
) -> Result<T, WorkspaceError>
where
    F: FnOnce(Workspace) -> Fut,
    Fut: Future<Output = T>,
{
    let mut builder = tempfile::Builder::new();
    builder.prefix(&config.prefix);
    let dir = match &config.parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(WorkspaceError::Create)?;
    debug!(workspace = %dir.path().display(), "Created workspace");

    let workspace = stage(dir.path(), artifact).await?;
    let result = f(workspace).await;

    let path = dir.path().to_path_buf();
    if config.keep {
        let kept = dir.keep();
        info!(workspace = %kept.display(), "Keeping workspace");
    } else {
        dir.close()
            .map_err(|source| WorkspaceError::Cleanup { path: path.clone(), source })?;
        debug!(workspace = %path.display(), "Removed workspace");
    }

    Ok(result)
}

/// Copies the artifact into `root`, keeping its file name and permissions.
async fn stage(root: &Path, artifact: &Path) -> Result<Workspace, WorkspaceError> {
    let stage_err = |source| WorkspaceError::Stage {
        artifact: artifact.to_path_buf(),
        source,
    };

    let name = artifact.file_name().ok_or_else(|| {
        stage_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "artifact path has no file name",
        ))
    })?;
    let staged = root.join(name);
    tokio::fs::copy(artifact, &staged).await.map_err(stage_err)?;

    if !staged.is_file() {
        return Err(stage_err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "staged artifact missing after copy",
        )));
    }

    debug!(artifact = %staged.display(), "Staged artifact");
    Ok(Workspace {
        root: root.to_path_buf(),
        artifact: staged,
    })
}
