//! cldf-regress: regression and performance harness for CLDF dataset loaders.
//!
//! This library builds a loader from source, runs it against a registry of
//! reference datasets inside an isolated workspace, verifies every load, and
//! reports timing and database size per dataset.

// Core modules
pub mod build;
pub mod cli;
pub mod error;
pub mod harness;
pub mod registry;
pub mod report;
pub mod runner;
pub mod workspace;

// Re-export commonly used error types
pub use error::{BuildError, ConfigError, HarnessError, LoadError, WorkspaceError};
