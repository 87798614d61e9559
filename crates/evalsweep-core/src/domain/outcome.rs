//! Per-run outcomes collected by the sweep.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::tuple::ParameterTuple;
use crate::error::{FailureKind, SweepError};

/// The three scalar metrics extracted from a result artifact (percentages).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    pub hard_accuracy: f64,
    pub completeness: f64,
    pub overall_accuracy: f64,
}

/// A scored run, as listed in the ranking of a sweep report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub facts: u32,
    pub entities: u32,
    pub episodes: u32,
    pub hard_accuracy: f64,
    pub completeness: f64,
    pub overall_accuracy: f64,
    pub results_file: PathBuf,
}

impl RunRecord {
    pub fn new(tuple: ParameterTuple, metrics: RunMetrics, results_file: PathBuf) -> Self {
        Self {
            facts: tuple.facts_limit,
            entities: tuple.entities_limit,
            episodes: tuple.episodes_limit,
            hard_accuracy: metrics.hard_accuracy,
            completeness: metrics.completeness,
            overall_accuracy: metrics.overall_accuracy,
            results_file,
        }
    }

    pub fn tuple(&self) -> ParameterTuple {
        ParameterTuple::new(self.facts, self.entities, self.episodes)
    }

    pub fn metrics(&self) -> RunMetrics {
        RunMetrics {
            hard_accuracy: self.hard_accuracy,
            completeness: self.completeness,
            overall_accuracy: self.overall_accuracy,
        }
    }
}

/// Why a run produced no score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrialFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl From<&SweepError> for TrialFailure {
    fn from(err: &SweepError) -> Self {
        Self {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

impl From<SweepError> for TrialFailure {
    fn from(err: SweepError) -> Self {
        Self::from(&err)
    }
}

/// Scored or failed.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialStatus {
    Scored(RunRecord),
    Failed(TrialFailure),
}

/// Outcome of one grid point, tagged with the tuple that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    /// Position in the grid (0-based).
    pub index: usize,
    pub tuple: ParameterTuple,
    pub duration_ms: u64,
    pub status: TrialStatus,
}

impl TrialOutcome {
    pub fn scored(&self) -> Option<&RunRecord> {
        match &self.status {
            TrialStatus::Scored(record) => Some(record),
            TrialStatus::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TrialFailure> {
        match &self.status {
            TrialStatus::Scored(_) => None,
            TrialStatus::Failed(failure) => Some(failure),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.scored().is_some()
    }
}
