//! Commit the winning grid point to the settings file.

use tracing::info;

use crate::domain::{ParameterTuple, RunRecord};
use crate::error::Result;
use crate::settings::{Annotation, SettingsTarget};

/// Apply the first (best) entry of `ranking` as the resident configuration.
///
/// Returns the applied tuple, or `None` without touching the file when the
/// ranking is empty.
pub fn apply_best(
    ranking: &[RunRecord],
    target: &mut SettingsTarget,
) -> Result<Option<ParameterTuple>> {
    let Some(best) = ranking.first() else {
        info!(path = ?target.path(), "No successful run; settings left unchanged");
        return Ok(None);
    };

    let tuple = best.tuple();
    target.apply(tuple, Annotation::Optimum)?;
    crate::obs::emit_settings_applied(target.path(), &tuple, best.hard_accuracy);
    Ok(Some(tuple))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunMetrics;
    use crate::settings::SettingNames;
    use std::fs;
    use std::path::PathBuf;

    const SETTINGS: &str = "FACTS_LIMIT = 20\nENTITIES_LIMIT = 10\nEPISODES_LIMIT = 3\nprint('hi')\n";

    fn record(t: ParameterTuple, hard: f64) -> RunRecord {
        RunRecord::new(
            t,
            RunMetrics {
                hard_accuracy: hard,
                completeness: 1.0,
                overall_accuracy: 1.0,
            },
            PathBuf::from("r.json"),
        )
    }

    #[test]
    fn test_apply_best_writes_optimum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zep_evaluate.py");
        fs::write(&path, SETTINGS).expect("write");
        let mut target = SettingsTarget::new(&path, SettingNames::default(), true);

        let ranking = vec![
            record(ParameterTuple::new(50, 5, 0), 90.0),
            record(ParameterTuple::new(25, 15, 5), 70.0),
        ];
        let applied = apply_best(&ranking, &mut target).expect("apply best");
        assert_eq!(applied, Some(ParameterTuple::new(50, 5, 0)));

        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(
            text,
            "FACTS_LIMIT = 50  # OPTIMIZED - Best from grid search\n\
             ENTITIES_LIMIT = 5  # OPTIMIZED - Best from grid search\n\
             EPISODES_LIMIT = 0  # OPTIMIZED - Best from grid search\n\
             print('hi')\n"
        );
    }

    #[test]
    fn test_apply_best_empty_ranking_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zep_evaluate.py");
        fs::write(&path, SETTINGS).expect("write");
        let before = fs::metadata(&path).expect("meta").modified().expect("mtime");
        let mut target = SettingsTarget::new(&path, SettingNames::default(), true);

        let applied = apply_best(&[], &mut target).expect("apply best");
        assert!(applied.is_none());
        assert_eq!(fs::read_to_string(&path).expect("read"), SETTINGS);
        let after = fs::metadata(&path).expect("meta").modified().expect("mtime");
        assert_eq!(before, after);
    }
}
