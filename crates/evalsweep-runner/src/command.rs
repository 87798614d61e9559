//! Evaluation command definition.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command used when none is configured.
pub fn default_eval_argv() -> Vec<String> {
    vec![
        "uv".to_string(),
        "run".to_string(),
        "zep_evaluate.py".to_string(),
    ]
}

/// Per-run wall-clock limit used when none is configured (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// The external evaluation program, invoked once per grid point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalCommand {
    /// Command to execute (first element is the executable).
    pub argv: Vec<String>,

    /// Working directory of the child process.
    pub workdir: PathBuf,

    /// Timeout in seconds; 0 disables the limit.
    pub timeout_secs: u64,
}

impl EvalCommand {
    pub fn new(argv: Vec<String>, workdir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            argv,
            workdir: workdir.into(),
            timeout_secs,
        }
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

impl Default for EvalCommand {
    fn default() -> Self {
        Self::new(default_eval_argv(), ".", DEFAULT_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cmd = EvalCommand::default();
        assert_eq!(cmd.argv[0], "uv");
        assert_eq!(cmd.display(), "uv run zep_evaluate.py");
        assert_eq!(cmd.timeout_secs, 600);
        assert_eq!(cmd.workdir, PathBuf::from("."));
    }

    #[test]
    fn test_custom_command() {
        let cmd = EvalCommand::new(
            vec!["python3".to_string(), "eval.py".to_string()],
            "/tmp/eval",
            30,
        );
        assert_eq!(cmd.display(), "python3 eval.py");
        assert_eq!(cmd.workdir, PathBuf::from("/tmp/eval"));
        assert_eq!(cmd.timeout_secs, 30);
    }
}
