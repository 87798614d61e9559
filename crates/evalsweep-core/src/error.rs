//! Error taxonomy for evalsweep.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors produced while patching settings, running an evaluation,
/// reading its artifact, or persisting the sweep report.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("settings file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("setting {name} not found in {path:?}")]
    MissingSetting { name: String, path: PathBuf },

    #[error("setting {name} assigned {count} times in {path:?} (expected exactly one)")]
    DuplicateSetting {
        name: String,
        count: usize,
        path: PathBuf,
    },

    #[error("failed to launch {command}: {cause}")]
    ProcessLaunch { command: String, cause: String },

    #[error("evaluation timed out after {limit_secs}s")]
    ProcessTimeout { limit_secs: u64 },

    #[error("evaluation exited with code {code:?}")]
    NonZeroExit { code: Option<i32> },

    #[error("no result artifact matches {pattern}")]
    ArtifactNotFound { pattern: String },

    #[error("result artifact {path:?}: {reason}")]
    ArtifactParse { path: PathBuf, reason: String },

    #[error("report {path:?}: {source}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {path:?} is not a valid sweep report: {reason}")]
    ReportParse { path: PathBuf, reason: String },

    #[error("invalid sweep configuration: {0}")]
    InvalidConfig(String),
}

impl SweepError {
    /// Classify this error for the per-run failure record.
    pub fn kind(&self) -> FailureKind {
        match self {
            SweepError::ConfigIo { .. }
            | SweepError::MissingSetting { .. }
            | SweepError::DuplicateSetting { .. } => FailureKind::ConfigIo,
            SweepError::ProcessLaunch { .. } => FailureKind::ProcessLaunch,
            SweepError::ProcessTimeout { .. } => FailureKind::ProcessTimeout,
            SweepError::NonZeroExit { .. } => FailureKind::NonZeroExit,
            SweepError::ArtifactNotFound { .. } => FailureKind::ArtifactNotFound,
            SweepError::ArtifactParse { .. } => FailureKind::ArtifactParse,
            SweepError::ReportIo { .. }
            | SweepError::ReportParse { .. }
            | SweepError::InvalidConfig(_) => FailureKind::Other,
        }
    }
}

/// Serializable classification of a failed run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigIo,
    ProcessLaunch,
    ProcessTimeout,
    NonZeroExit,
    ArtifactNotFound,
    ArtifactParse,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConfigIo => "config_io",
            FailureKind::ProcessLaunch => "process_launch",
            FailureKind::ProcessTimeout => "process_timeout",
            FailureKind::NonZeroExit => "non_zero_exit",
            FailureKind::ArtifactNotFound => "artifact_not_found",
            FailureKind::ArtifactParse => "artifact_parse",
            FailureKind::Other => "other",
        }
    }
}

/// Result type for evalsweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
