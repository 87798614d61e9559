//! Metric extraction from the evaluation program's result artifact.
//!
//! The artifact is untrusted input. Anything short of three finite numbers at
//! the expected paths is reported as an error value, never a panic.

use std::path::Path;

use serde_json::Value;

use crate::domain::RunMetrics;
use crate::error::{Result, SweepError};

/// JSON pointer to the hard-category accuracy rate.
pub const HARD_ACCURACY_POINTER: &str = "/category_scores/hard/accuracy/accuracy_rate";
/// JSON pointer to the hard-category completeness rate.
pub const HARD_COMPLETENESS_POINTER: &str = "/category_scores/hard/completeness/complete_rate";
/// JSON pointer to the aggregate accuracy rate.
pub const OVERALL_ACCURACY_POINTER: &str = "/aggregate_scores/accuracy/accuracy_rate";

/// Read and parse an artifact file.
pub fn read_metrics(path: &Path) -> Result<RunMetrics> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SweepError::ArtifactNotFound {
                pattern: path.display().to_string(),
            }
        } else {
            SweepError::ArtifactParse {
                path: path.to_path_buf(),
                reason: format!("read failed: {}", e),
            }
        }
    })?;

    let doc: Value = serde_json::from_str(&raw).map_err(|e| SweepError::ArtifactParse {
        path: path.to_path_buf(),
        reason: format!("invalid JSON: {}", e),
    })?;

    extract_metrics(&doc).map_err(|reason| SweepError::ArtifactParse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Pull the three metrics out of an already parsed artifact.
pub fn extract_metrics(doc: &Value) -> std::result::Result<RunMetrics, String> {
    Ok(RunMetrics {
        hard_accuracy: number_at(doc, HARD_ACCURACY_POINTER)?,
        completeness: number_at(doc, HARD_COMPLETENESS_POINTER)?,
        overall_accuracy: number_at(doc, OVERALL_ACCURACY_POINTER)?,
    })
}

fn number_at(doc: &Value, pointer: &str) -> std::result::Result<f64, String> {
    let value = doc
        .pointer(pointer)
        .ok_or_else(|| format!("missing field {}", pointer))?;
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(format!("field {} is not a finite number: {}", pointer, value)),
    }
}
