//! In-process stand-in for the evaluation program (testing only).
//!
//! `ScriptedExecutor` reads the tuple currently written to the settings file,
//! looks up a scripted behavior for it and, like the real program, drops a
//! result artifact under `runs/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use evalsweep_core::{ParameterTuple, SettingNames, SettingsFile};
use serde_json::json;

use crate::command::EvalCommand;
use crate::executor::{EvalExecutor, ExecOutcome};

/// What the fake evaluation does for one tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialBehavior {
    /// Exit 0 and write a well-formed artifact with these percentages.
    Score {
        hard: f64,
        completeness: f64,
        overall: f64,
    },
    /// Report a timeout at the command's limit.
    Timeout,
    /// Exit with this code, writing nothing.
    ExitCode(i32),
    /// Exit 0 without writing an artifact.
    NoArtifact,
    /// Exit 0 and write an artifact missing the hard-category block.
    Malformed,
    /// Fail to start.
    LaunchFailure,
}

impl TrialBehavior {
    pub fn score(hard: f64, completeness: f64, overall: f64) -> Self {
        TrialBehavior::Score {
            hard,
            completeness,
            overall,
        }
    }
}

#[derive(Debug, Default)]
struct Calls {
    seen: Vec<ParameterTuple>,
    artifacts: usize,
}

/// Scripted [`EvalExecutor`] keyed by the tuple found in the settings file.
#[derive(Debug)]
pub struct ScriptedExecutor {
    workdir: PathBuf,
    settings_file: PathBuf,
    names: SettingNames,
    behaviors: HashMap<ParameterTuple, TrialBehavior>,
    fallback: TrialBehavior,
    calls: Mutex<Calls>,
}

impl ScriptedExecutor {
    /// Settings are read from `<workdir>/zep_evaluate.py`; artifacts go to
    /// `<workdir>/runs/<seq>/evaluation_results_<seq>.json`.
    pub fn new(workdir: impl Into<PathBuf>, names: SettingNames) -> Self {
        Self {
            workdir: workdir.into(),
            settings_file: PathBuf::from("zep_evaluate.py"),
            names,
            behaviors: HashMap::new(),
            fallback: TrialBehavior::score(50.0, 50.0, 50.0),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn with_settings_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.settings_file = file.into();
        self
    }

    pub fn with(mut self, tuple: ParameterTuple, behavior: TrialBehavior) -> Self {
        self.behaviors.insert(tuple, behavior);
        self
    }

    /// Behavior for tuples without a scripted entry.
    pub fn with_fallback(mut self, behavior: TrialBehavior) -> Self {
        self.fallback = behavior;
        self
    }

    /// Tuples the fake was invoked with, in call order.
    pub fn seen(&self) -> Vec<ParameterTuple> {
        self.lock().seen.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_tuple(&self) -> Result<ParameterTuple, String> {
        let path = self.workdir.join(&self.settings_file);
        let text = std::fs::read_to_string(&path).map_err(|e| format!("{:?}: {}", path, e))?;
        SettingsFile::parse(&text, &self.names)
            .map_err(|e| e.to_string())?
            .current()
            .ok_or_else(|| format!("{:?}: settings incomplete", path))
    }

    fn write_artifact(&self, body: &serde_json::Value) -> Result<(), String> {
        let seq = {
            let mut calls = self.lock();
            calls.artifacts += 1;
            calls.artifacts
        };
        let dir = self.workdir.join("runs").join(format!("{:04}", seq));
        std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        write_json(&dir.join(format!("evaluation_results_{:04}.json", seq)), body)
    }
}

#[async_trait]
impl EvalExecutor for ScriptedExecutor {
    async fn execute(&self, command: &EvalCommand) -> ExecOutcome {
        let tuple = match self.current_tuple() {
            Ok(tuple) => tuple,
            Err(reason) => return exited(1, reason),
        };
        self.lock().seen.push(tuple);

        let behavior = self.behaviors.get(&tuple).unwrap_or(&self.fallback).clone();
        match behavior {
            TrialBehavior::Score {
                hard,
                completeness,
                overall,
            } => match self.write_artifact(&artifact_body(hard, completeness, overall)) {
                Ok(()) => exited(0, String::new()),
                Err(reason) => exited(1, reason),
            },
            TrialBehavior::Timeout => ExecOutcome::TimedOut {
                limit_secs: command.timeout_secs,
                duration_ms: command.timeout_secs.saturating_mul(1000),
            },
            TrialBehavior::ExitCode(code) => exited(code, format!("scripted exit {}", code)),
            TrialBehavior::NoArtifact => exited(0, String::new()),
            TrialBehavior::Malformed => {
                let body = json!({ "aggregate_scores": { "accuracy": { "accuracy_rate": 1.0 } } });
                match self.write_artifact(&body) {
                    Ok(()) => exited(0, String::new()),
                    Err(reason) => exited(1, reason),
                }
            }
            TrialBehavior::LaunchFailure => ExecOutcome::LaunchFailed {
                cause: "scripted launch failure".to_string(),
            },
        }
    }
}

/// Artifact shaped like the evaluation program's output.
pub fn artifact_body(hard: f64, completeness: f64, overall: f64) -> serde_json::Value {
    json!({
        "category_scores": {
            "hard": {
                "accuracy": { "accuracy_rate": hard },
                "completeness": { "complete_rate": completeness }
            }
        },
        "aggregate_scores": {
            "accuracy": { "accuracy_rate": overall }
        }
    })
}

fn write_json(path: &Path, body: &serde_json::Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(body).map_err(|e| e.to_string())?;
    std::fs::write(path, raw).map_err(|e| e.to_string())
}

fn exited(code: i32, stderr: String) -> ExecOutcome {
    ExecOutcome::Completed {
        exit_code: Some(code),
        success: code == 0,
        stdout: String::new(),
        stderr,
        duration_ms: 1,
    }
}
