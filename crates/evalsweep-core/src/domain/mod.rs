//! Domain types for the sweep: grid tuples and per-run outcomes.

pub mod outcome;
pub mod tuple;

pub use outcome::{RunMetrics, RunRecord, TrialFailure, TrialOutcome, TrialStatus};
pub use tuple::{default_grid, grid_digest, ParameterTuple};
