//! evalsweep core library
//!
//! Building blocks of an evaluation-parameter sweep:
//! - `settings`: rewrite the three limit assignments of the evaluation program
//! - `locator` / `artifact`: find the newest result artifact and extract metrics
//! - `ranking` / `reporting`: order scored runs and persist the sweep report
//! - `apply`: commit the winner back to the settings file

pub mod apply;
pub mod artifact;
pub mod domain;
pub mod error;
pub mod locator;
pub mod obs;
pub mod ranking;
pub mod reporting;
pub mod settings;
pub mod telemetry;

pub use apply::apply_best;
pub use artifact::{extract_metrics, read_metrics};
pub use domain::{
    default_grid, grid_digest, ParameterTuple, RunMetrics, RunRecord, TrialFailure, TrialOutcome,
    TrialStatus,
};
pub use error::{FailureKind, Result, SweepError};
pub use locator::{ArtifactSnapshot, ResultLocator};
pub use obs::{sweep_span, SweepSpan};
pub use ranking::rank;
pub use reporting::{
    read_report_json, render_best_summary, render_ranking_table, write_report_json, FailedRun,
    SweepReport,
};
pub use settings::{Annotation, SettingNames, SettingsFile, SettingsTarget};
pub use telemetry::{default_directives, init_tracing};

/// evalsweep version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
