//! Structured lifecycle events for a sweep.
//!
//! - `SweepSpan` tags every log line of a sweep with its `sweep_id`
//! - `emit_*` functions log the key lifecycle points at `info!`/`warn!`

use std::path::Path;

use tracing::{info, warn};

use crate::domain::{ParameterTuple, RunMetrics, TrialFailure};

/// RAII guard that enters a sweep-scoped tracing span.
///
/// ```ignore
/// let _span = SweepSpan::enter("6f1c...");
/// // every event below carries sweep_id = "6f1c..."
/// ```
pub struct SweepSpan {
    _span: tracing::span::EnteredSpan,
}

impl SweepSpan {
    pub fn enter(sweep_id: &str) -> Self {
        Self {
            _span: sweep_span(sweep_id).entered(),
        }
    }
}

/// The span behind [`SweepSpan`], for instrumenting futures that cross
/// `.await` points.
pub fn sweep_span(sweep_id: &str) -> tracing::Span {
    tracing::info_span!("evalsweep.sweep", sweep_id = %sweep_id)
}

pub fn emit_sweep_started(sweep_id: &str, grid_len: usize, timeout_secs: u64) {
    info!(
        event = "sweep.started",
        sweep_id = %sweep_id,
        grid_len = grid_len,
        timeout_secs = timeout_secs,
    );
}

pub fn emit_trial_started(index: usize, tuple: &ParameterTuple) {
    info!(
        event = "trial.started",
        index = index,
        facts = tuple.facts_limit,
        entities = tuple.entities_limit,
        episodes = tuple.episodes_limit,
    );
}

pub fn emit_trial_scored(
    index: usize,
    tuple: &ParameterTuple,
    metrics: &RunMetrics,
    duration_ms: u64,
) {
    info!(
        event = "trial.scored",
        index = index,
        facts = tuple.facts_limit,
        entities = tuple.entities_limit,
        episodes = tuple.episodes_limit,
        hard_accuracy = metrics.hard_accuracy,
        completeness = metrics.completeness,
        overall_accuracy = metrics.overall_accuracy,
        duration_ms = duration_ms,
    );
}

/// Failed trials are warnings: the sweep goes on without them.
pub fn emit_trial_failed(index: usize, tuple: &ParameterTuple, failure: &TrialFailure) {
    warn!(
        event = "trial.failed",
        index = index,
        facts = tuple.facts_limit,
        entities = tuple.entities_limit,
        episodes = tuple.episodes_limit,
        kind = failure.kind.as_str(),
        reason = %failure.reason,
    );
}

pub fn emit_sweep_finished(sweep_id: &str, succeeded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "sweep.finished",
        sweep_id = %sweep_id,
        succeeded = succeeded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

pub fn emit_report_written(path: &Path, entries: usize) {
    info!(event = "report.written", path = %path.display(), entries = entries);
}

pub fn emit_settings_applied(path: &Path, tuple: &ParameterTuple, hard_accuracy: f64) {
    info!(
        event = "settings.applied",
        path = %path.display(),
        facts = tuple.facts_limit,
        entities = tuple.entities_limit,
        episodes = tuple.episodes_limit,
        hard_accuracy = hard_accuracy,
    );
}
