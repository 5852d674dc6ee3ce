//! Build orchestration for the loader under test.
//!
//! Compiles the loader's source tree with the configured toolchain command
//! and locates the resulting executable. A failed build aborts the whole run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::BuildError;

/// Default toolchain invocation, run inside the source directory.
pub const DEFAULT_BUILD_COMMAND: &str = "go build .";

/// Default artifact location, relative to the source directory.
pub const DEFAULT_ARTIFACT: &str = "gocldf";

/// Configuration for building the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Root of the loader's source tree.
    pub source_dir: PathBuf,
    /// Program and arguments, whitespace separated.
    pub command: String,
    /// Artifact path, relative to `source_dir` unless absolute.
    pub artifact: PathBuf,
    /// Optional upper bound on build time.
    pub timeout: Option<Duration>,
}

impl BuildConfig {
    /// Creates a build configuration with defaults for the given source tree.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            command: DEFAULT_BUILD_COMMAND.to_string(),
            artifact: PathBuf::from(DEFAULT_ARTIFACT),
            timeout: None,
        }
    }

    /// Sets the build command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the artifact path.
    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = artifact.into();
        self
    }

    /// Sets the build timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Absolute (or source-relative) location of the built artifact.
    pub fn artifact_path(&self) -> PathBuf {
        if self.artifact.is_absolute() {
            self.artifact.clone()
        } else {
            self.source_dir.join(&self.artifact)
        }
    }

    fn argv(&self) -> Result<(String, Vec<String>), BuildError> {
        let mut parts = self.command.split_whitespace().map(String::from);
        let program = parts.next().ok_or(BuildError::EmptyCommand)?;
        Ok((program, parts.collect()))
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Identity of a built artifact, recorded alongside measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Location of the artifact in the source tree.
    pub artifact: PathBuf,
    /// Hex-encoded SHA-256 of the artifact bytes.
    pub sha256: String,
    /// `git rev-parse HEAD` of the source tree, when it is a git checkout.
    pub revision: Option<String>,
    /// Wall-clock build time in seconds.
    pub build_secs: f64,
}

/// Runs the build and locates the artifact.
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Compiles the loader and returns the artifact location and identity.
    pub async fn build(&self) -> Result<BuildInfo, BuildError> {
        let (program, args) = self.config.argv()?;
        info!(
            source_dir = %self.config.source_dir.display(),
            command = %self.config.command,
            "Building loader"
        );

        let start = Instant::now();
        let child = Command::new(&program)
            .args(&args)
            .current_dir(&self.config.source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                command: self.config.command.clone(),
                source,
            })?;

        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| BuildError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };
        let build_secs = start.elapsed().as_secs_f64();

        if !output.status.success() {
            return Err(BuildError::Failed {
                code: output.status.code(),
                diagnostic: build_diagnostic(&output.stderr, &output.stdout),
            });
        }

        let artifact = self.config.artifact_path();
        if !artifact.is_file() {
            return Err(BuildError::ArtifactMissing(artifact));
        }

        let sha256 = file_sha256(&artifact).await?;
        let revision = git_revision(&self.config.source_dir).await;
        let short = sha256.get(..12).unwrap_or(&sha256);
        info!(
            artifact = %artifact.display(),
            sha256 = %short,
            "Build finished in {:.1}s",
            build_secs
        );

        Ok(BuildInfo {
            artifact,
            sha256,
            revision,
            build_secs,
        })
    }
}

/// Toolchain output for a failed build: stderr, then stdout under its own
/// header when there is any.
fn build_diagnostic(stderr: &[u8], stdout: &[u8]) -> String {
    let mut diagnostic = String::from_utf8_lossy(stderr).trim_end().to_string();
    let stdout = String::from_utf8_lossy(stdout);
    let stdout = stdout.trim_end();
    if !stdout.trim().is_empty() {
        if !diagnostic.is_empty() {
            diagnostic.push('\n');
        }
        diagnostic.push_str("--- stdout ---\n");
        diagnostic.push_str(stdout);
    }
    diagnostic
}

async fn file_sha256(path: &Path) -> Result<String, BuildError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

async fn git_revision(source_dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(source_dir)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(o) if o.status.success() => {
            let rev = String::from_utf8_lossy(&o.stdout).trim().to_string();
            (!rev.is_empty()).then_some(rev)
        }
        Ok(_) => {
            debug!(source_dir = %source_dir.display(), "Source tree is not a git checkout");
            None
        }
        Err(e) => {
            warn!("git unavailable, revision not recorded: {}", e);
            None
        }
    }
}
