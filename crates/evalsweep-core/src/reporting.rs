use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::{RunRecord, TrialOutcome, TrialStatus};
use crate::error::{FailureKind, Result, SweepError};
use crate::ranking::rank;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Prefix of every report file name.
pub const REPORT_FILE_PREFIX: &str = "optimization_results_";

/// A grid point that produced no score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedRun {
    pub facts: u32,
    pub entities: u32,
    pub episodes: u32,
    pub kind: FailureKind,
    pub reason: String,
}

/// Persisted result of a whole sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepReport {
    pub schema_version: String,
    pub sweep_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub grid_digest: String,
    pub command: Vec<String>,
    pub total_runs: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Scored runs, best first.
    pub ranking: Vec<RunRecord>,
    /// Failed runs, in grid order.
    pub failures: Vec<FailedRun>,
}

impl SweepReport {
    pub fn new(
        sweep_id: Uuid,
        grid_digest: String,
        command: Vec<String>,
        outcomes: &[TrialOutcome],
    ) -> Self {
        let ranking = rank(outcomes);
        let failures: Vec<FailedRun> = outcomes
            .iter()
            .filter_map(|o| match &o.status {
                TrialStatus::Failed(f) => Some(FailedRun {
                    facts: o.tuple.facts_limit,
                    entities: o.tuple.entities_limit,
                    episodes: o.tuple.episodes_limit,
                    kind: f.kind,
                    reason: f.reason.clone(),
                }),
                TrialStatus::Scored(_) => None,
            })
            .collect();

        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            sweep_id,
            generated_at: Utc::now(),
            grid_digest,
            command,
            total_runs: outcomes.len(),
            succeeded: ranking.len(),
            failed: failures.len(),
            ranking,
            failures,
        }
    }

    pub fn best(&self) -> Option<&RunRecord> {
        self.ranking.first()
    }
}

/// `optimization_results_<YYYYmmddTHHMMSS>.json`
pub fn report_file_name(generated_at: &DateTime<Utc>) -> String {
    format!(
        "{}{}.json",
        REPORT_FILE_PREFIX,
        generated_at.format("%Y%m%dT%H%M%S")
    )
}

/// Write the report as pretty JSON into `dir` and return its path.
///
/// Never overwrites: when the timestamped name is taken a `_<n>` suffix is
/// appended.
pub fn write_report_json(dir: &Path, report: &SweepReport) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(report).map_err(|e| SweepError::ReportIo {
        path: dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    std::fs::create_dir_all(dir).map_err(|source| SweepError::ReportIo {
        path: dir.to_path_buf(),
        source,
    })?;

    let base = report_file_name(&report.generated_at);
    let stem = base.trim_end_matches(".json");
    for attempt in 0..1000u32 {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{}_{}.json", stem, attempt)
        };
        let path = dir.join(name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(SweepError::ReportIo { path, source }),
        };
        file.write_all(content.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|source| SweepError::ReportIo {
                path: path.clone(),
                source,
            })?;
        return Ok(path);
    }

    Err(SweepError::ReportIo {
        path: dir.join(base),
        source: std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free report file name",
        ),
    })
}

/// Load a previously written report.
pub fn read_report_json(path: &Path) -> Result<SweepReport> {
    let raw = std::fs::read_to_string(path).map_err(|source| SweepError::ReportIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| SweepError::ReportParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Render the ranked table printed at the end of a sweep.
pub fn render_ranking_table(ranking: &[RunRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<6}{:<8}{:<10}{:<10}{:<10}{:<12}{}\n",
        "Rank", "Facts", "Entities", "Episodes", "Hard %", "Complete %", "Overall %"
    ));
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for (i, r) in ranking.iter().enumerate() {
        out.push_str(&format!(
            "{:<6}{:<8}{:<10}{:<10}{:<10.2}{:<12.2}{:.2}\n",
            i + 1,
            r.facts,
            r.entities,
            r.episodes,
            r.hard_accuracy,
            r.completeness,
            r.overall_accuracy
        ));
    }
    out
}

/// Render the best configuration block.
pub fn render_best_summary(best: &RunRecord) -> String {
    format!(
        "FACTS_LIMIT = {}\nENTITIES_LIMIT = {}\nEPISODES_LIMIT = {}\nHard Category Accuracy: {:.2}%\nContext Completeness: {:.2}%\n",
        best.facts, best.entities, best.episodes, best.hard_accuracy, best.completeness
    )
}
