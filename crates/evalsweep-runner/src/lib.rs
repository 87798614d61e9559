//! evalsweep runner - sequential evaluation sweeps
//!
//! Provides the sweep driver that:
//! - Rewrites the settings file for each grid point
//! - Runs the evaluation program under a per-run timeout
//! - Scores each run from its newest result artifact
//! - Writes the ranked report and applies the winner

pub mod command;
pub mod config;
pub mod executor;
pub mod fakes;
pub mod sweep;

// Re-export key types
pub use command::{default_eval_argv, EvalCommand, DEFAULT_TIMEOUT_SECS};
pub use config::{SweepConfig, DEFAULT_RESULTS_GLOB};
pub use executor::{EvalExecutor, ExecOutcome, ProcessExecutor};
pub use sweep::{execute_sweep, SweepController, SweepResult, SweepSummary};
