//! Loader runner for regression runs.
//!
//! This module runs the staged loader against one dataset and turns the
//! result into a verified [`ExecutionRecord`].
//!
//! # Architecture
//!
//! ```text
//! Dataset → ExecutionRunner → loader process → combined log → Verifier → Verdict
//! ```
//!
//! The runner:
//! 1. Builds the invocation `<loader> load <metadata> <destination> -f`
//! 2. Launches the loader inside the run workspace
//! 3. Captures combined stdout/stderr and wall-clock time
//! 4. Kills the loader if it exceeds the per-dataset timeout
//!
//! # Example
//!
//! ```ignore
//! use cldf_regress::runner::{ExecutionRunner, RunnerConfig, Verifier};
//!
//! let runner = ExecutionRunner::new(RunnerConfig::new().with_timeout(Duration::from_secs(600)));
//! let mut record = runner.run(&workspace, 0, &dataset, &metadata).await;
//! record.apply(Verifier::default().verify(&record));
//!
//! println!("{} {:.1}s", record.dataset, record.elapsed_secs());
//! ```

pub mod config;
pub mod executor;
pub mod result;
pub mod verifier;

pub use config::RunnerConfig;
pub use executor::ExecutionRunner;
pub use result::{ExecutionRecord, FailureReason, RunStatus, Verdict};
pub use verifier::{artifact_size, MarkerCheck, OutputCheck, PatternCheck, Verifier, DEFAULT_MARKER};
