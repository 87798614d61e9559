//! Sweep configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no file)
//! sweeps the built-in grid against `zep_evaluate.py` in the current
//! directory. Relative paths resolve against `workdir`.

use anyhow::Context;
use evalsweep_core::{
    default_grid, grid_digest, ParameterTuple, ResultLocator, SettingNames, SettingsTarget,
    SweepError,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::command::{default_eval_argv, EvalCommand, DEFAULT_TIMEOUT_SECS};

/// Result pattern used when none is configured.
pub const DEFAULT_RESULTS_GLOB: &str = "runs/*/evaluation_results_*.json";

/// Complete description of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Directory of the evaluation program; the command runs here.
    pub workdir: PathBuf,

    /// Settings file rewritten before each run.
    pub settings_file: PathBuf,

    /// Evaluation command (first element is the executable).
    pub command: Vec<String>,

    /// Per-run timeout in seconds; 0 disables the limit.
    pub timeout_secs: u64,

    /// Glob locating result artifacts, relative to `workdir`.
    pub results_glob: String,

    /// Where the sweep report is written.
    pub report_dir: PathBuf,

    /// Fail a run when a setting is missing or assigned twice.
    pub strict_settings: bool,

    /// Ordered grid of (facts, entities, episodes) tuples.
    pub grid: Vec<ParameterTuple>,

    /// Names of the assignments rewritten in the settings file.
    pub settings: SettingNames,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            settings_file: PathBuf::from("zep_evaluate.py"),
            command: default_eval_argv(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            results_glob: DEFAULT_RESULTS_GLOB.to_string(),
            report_dir: PathBuf::from("."),
            strict_settings: true,
            grid: default_grid(),
            settings: SettingNames::default(),
        }
    }
}

impl SweepConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("parse sweep configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read sweep configuration {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("load {:?}", path))
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.grid.is_empty() {
            return Err(SweepError::InvalidConfig("grid must not be empty".to_string()));
        }
        if self.command.first().map_or(true, |exe| exe.trim().is_empty()) {
            return Err(SweepError::InvalidConfig(
                "command must name an executable".to_string(),
            ));
        }
        if self.results_glob.trim().is_empty() {
            return Err(SweepError::InvalidConfig(
                "results_glob must not be empty".to_string(),
            ));
        }
        self.settings.validate()
    }

    pub fn settings_path(&self) -> PathBuf {
        self.workdir.join(&self.settings_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.workdir.join(&self.report_dir)
    }

    pub fn eval_command(&self) -> EvalCommand {
        EvalCommand::new(self.command.clone(), &self.workdir, self.timeout_secs)
    }

    /// The single writer of the settings file for this sweep.
    pub fn settings_target(&self) -> SettingsTarget {
        SettingsTarget::new(
            self.settings_path(),
            self.settings.clone(),
            self.strict_settings,
        )
    }

    pub fn locator(&self) -> Result<ResultLocator, SweepError> {
        ResultLocator::new(&self.workdir, &self.results_glob)
    }

    pub fn grid_digest(&self) -> String {
        grid_digest(&self.grid)
    }

    /// Upper bound on sweep wall-clock time, if runs are time-limited.
    pub fn worst_case_secs(&self) -> Option<u64> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(self.timeout_secs.saturating_mul(self.grid.len() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SweepConfig::from_toml_str("").expect("parse empty");
        assert_eq!(config, SweepConfig::default());
        assert_eq!(config.grid.len(), 8);
        assert_eq!(config.command, vec!["uv", "run", "zep_evaluate.py"]);
        assert_eq!(config.results_glob, "runs/*/evaluation_results_*.json");
        assert_eq!(config.worst_case_secs(), Some(8 * 600));
    }

    #[test]
    fn test_full_toml() {
        let raw = r#"
workdir = "/srv/eval"
settings_file = "settings.py"
command = ["python3", "evaluate.py", "--quiet"]
timeout_secs = 120
results_glob = "out/**/result_*.json"
report_dir = "reports"
strict_settings = false
grid = [[25, 15, 5], [50, 5, 0]]

[settings]
facts = "MAX_FACTS"
entities = "MAX_ENTITIES"
episodes = "MAX_EPISODES"
"#;
        let config = SweepConfig::from_toml_str(raw).expect("parse full");
        assert_eq!(config.settings_path(), PathBuf::from("/srv/eval/settings.py"));
        assert_eq!(config.report_path(), PathBuf::from("/srv/eval/reports"));
        assert_eq!(
            config.grid,
            vec![ParameterTuple::new(25, 15, 5), ParameterTuple::new(50, 5, 0)]
        );
        assert_eq!(config.settings.facts, "MAX_FACTS");
        assert!(!config.strict_settings);

        let cmd = config.eval_command();
        assert_eq!(cmd.display(), "python3 evaluate.py --quiet");
        assert_eq!(cmd.workdir, PathBuf::from("/srv/eval"));
        assert_eq!(cmd.timeout_secs, 120);
    }

    #[test]
    fn test_partial_settings_table_keeps_other_defaults() {
        let raw = "[settings]\nfacts = \"TOP_K_FACTS\"\n";
        let config = SweepConfig::from_toml_str(raw).expect("parse partial");
        assert_eq!(config.settings.facts, "TOP_K_FACTS");
        assert_eq!(config.settings.entities, "ENTITIES_LIMIT");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(SweepConfig::from_toml_str("grid = []").is_err());
        assert!(SweepConfig::from_toml_str("command = []").is_err());
        assert!(SweepConfig::from_toml_str("grid = [[1, 2]]").is_err());
        assert!(SweepConfig::from_toml_str("unknown_key = 1").is_err());
        assert!(SweepConfig::from_toml_str(
            "[settings]\nfacts = \"SAME\"\nentities = \"SAME\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_no_timeout_has_no_worst_case() {
        let config = SweepConfig {
            timeout_secs: 0,
            ..SweepConfig::default()
        };
        assert_eq!(config.worst_case_secs(), None);
    }

    #[test]
    fn test_grid_digest_tracks_grid() {
        let a = SweepConfig::default();
        let b = SweepConfig {
            grid: vec![ParameterTuple::new(1, 2, 3)],
            ..SweepConfig::default()
        };
        assert_ne!(a.grid_digest(), b.grid_digest());
    }
}
