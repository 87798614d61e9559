//! Sweep orchestration: patch, execute, locate, score, once per grid point.

use evalsweep_core::obs::{
    emit_report_written, emit_sweep_finished, emit_sweep_started, emit_trial_failed,
    emit_trial_scored, emit_trial_started,
};
use evalsweep_core::{
    apply_best, rank, read_metrics, sweep_span, write_report_json, Annotation, ParameterTuple,
    ResultLocator, RunRecord, SettingsTarget, SweepError, SweepReport, SweepSpan, TrialFailure,
    TrialOutcome, TrialStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::command::EvalCommand;
use crate::config::SweepConfig;
use crate::executor::{EvalExecutor, ExecOutcome};

/// Captured evaluation output kept in debug logs.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Result of running every grid point once.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub sweep_id: Uuid,

    /// One outcome per grid point, in grid order.
    pub outcomes: Vec<TrialOutcome>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl SweepResult {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_scored()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_scored()).count()
    }

    /// Scored runs, best hard accuracy first.
    pub fn ranking(&self) -> Vec<RunRecord> {
        rank(&self.outcomes)
    }
}

/// Drives the grid through the evaluation program, strictly one run at a
/// time.
pub struct SweepController {
    executor: Arc<dyn EvalExecutor>,
    command: EvalCommand,
    locator: ResultLocator,
}

impl SweepController {
    pub fn new(
        executor: Arc<dyn EvalExecutor>,
        command: EvalCommand,
        locator: ResultLocator,
    ) -> Self {
        Self {
            executor,
            command,
            locator,
        }
    }

    pub fn command(&self) -> &EvalCommand {
        &self.command
    }

    /// Run every tuple of `grid` in order.
    ///
    /// A failing tuple is recorded as [`TrialStatus::Failed`] and the loop
    /// moves on; nothing here aborts the sweep. After return the settings
    /// file holds the last attempted tuple.
    pub async fn run(&self, grid: &[ParameterTuple], target: &mut SettingsTarget) -> SweepResult {
        let sweep_id = Uuid::new_v4();
        let id = sweep_id.to_string();
        self.run_grid(sweep_id, grid, target)
            .instrument(sweep_span(&id))
            .await
    }

    async fn run_grid(
        &self,
        sweep_id: Uuid,
        grid: &[ParameterTuple],
        target: &mut SettingsTarget,
    ) -> SweepResult {
        let start = Instant::now();
        let id = sweep_id.to_string();
        emit_sweep_started(&id, grid.len(), self.command.timeout_secs);

        let mut outcomes = Vec::with_capacity(grid.len());
        for (index, tuple) in grid.iter().copied().enumerate() {
            emit_trial_started(index, &tuple);
            let trial_start = Instant::now();

            let status = match self.run_trial(tuple, target).await {
                Ok(record) => {
                    let duration_ms = trial_start.elapsed().as_millis() as u64;
                    emit_trial_scored(index, &tuple, &record.metrics(), duration_ms);
                    TrialStatus::Scored(record)
                }
                Err(e) => {
                    let failure = TrialFailure::from(&e);
                    emit_trial_failed(index, &tuple, &failure);
                    TrialStatus::Failed(failure)
                }
            };

            outcomes.push(TrialOutcome {
                index,
                tuple,
                duration_ms: trial_start.elapsed().as_millis() as u64,
                status,
            });
        }

        let result = SweepResult {
            sweep_id,
            outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        emit_sweep_finished(
            &id,
            result.succeeded_count(),
            result.failed_count(),
            result.duration_ms,
        );
        result
    }

    async fn run_trial(
        &self,
        tuple: ParameterTuple,
        target: &mut SettingsTarget,
    ) -> Result<RunRecord, SweepError> {
        target.apply(tuple, Annotation::Trial)?;

        // Only an artifact this run wrote may score it.
        let before = self.locator.snapshot();
        let outcome = self.executor.execute(&self.command).await;
        if let ExecOutcome::Completed {
            exit_code,
            stdout,
            stderr,
            duration_ms,
            ..
        } = &outcome
        {
            debug!(
                exit_code = ?exit_code,
                duration_ms = duration_ms,
                stdout = %tail(stdout),
                stderr = %tail(stderr),
                "Evaluation finished"
            );
        }
        outcome.ensure_success(&self.command)?;

        let artifact = self
            .locator
            .latest_since(&before)
            .ok_or_else(|| SweepError::ArtifactNotFound {
                pattern: self.locator.pattern().to_string(),
            })?;
        let metrics = read_metrics(&artifact)?;
        Ok(RunRecord::new(tuple, metrics, artifact))
    }
}

/// Everything a finished sweep produced.
#[derive(Debug)]
pub struct SweepSummary {
    pub report: SweepReport,
    pub report_path: PathBuf,

    /// Tuple committed to the settings file, if any run scored.
    pub applied: Option<ParameterTuple>,

    /// Why committing the best tuple failed. The report is still valid.
    pub apply_error: Option<String>,

    pub duration_ms: u64,
}

/// Run the configured sweep end to end: every grid point, the report, and
/// the best configuration written back.
///
/// Only configuration errors and a report that cannot be written are
/// returned as `Err`; per-run failures live in the report.
pub async fn execute_sweep(
    config: &SweepConfig,
    executor: Arc<dyn EvalExecutor>,
) -> Result<SweepSummary, SweepError> {
    config.validate()?;
    let locator = config.locator()?;
    let mut target = config.settings_target();
    let controller = SweepController::new(executor, config.eval_command(), locator);

    info!(
        command = %controller.command().display(),
        settings = ?target.path(),
        grid_len = config.grid.len(),
        "Starting evaluation sweep"
    );

    let result = controller.run(&config.grid, &mut target).await;
    let _span = SweepSpan::enter(&result.sweep_id.to_string());

    let report = SweepReport::new(
        result.sweep_id,
        config.grid_digest(),
        config.command.clone(),
        &result.outcomes,
    );
    let report_path = write_report_json(&config.report_path(), &report)?;
    emit_report_written(&report_path, report.ranking.len());

    let (applied, apply_error) = match apply_best(&report.ranking, &mut target) {
        Ok(applied) => (applied, None),
        Err(e) => {
            warn!(path = ?target.path(), error = %e, "Failed to apply best configuration");
            (None, Some(e.to_string()))
        }
    };

    Ok(SweepSummary {
        report,
        report_path,
        applied,
        apply_error,
        duration_ms: result.duration_ms,
    })
}

fn tail(output: &str) -> &str {
    match output.char_indices().rev().nth(OUTPUT_TAIL_CHARS - 1) {
        Some((at, _)) => &output[at..],
        None => output,
    }
}
