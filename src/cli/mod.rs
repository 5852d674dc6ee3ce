//! Command-line interface for cldf-regress.
//!
//! Provides the `run` command for a full regression pass and `list` for
//! inspecting the dataset registry.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
