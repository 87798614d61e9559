//! Evaluation process execution under a wall-clock timeout.

use async_trait::async_trait;
use evalsweep_core::SweepError;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::command::EvalCommand;

/// How one evaluation process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The process exited on its own.
    Completed {
        /// Exit code (`None` when killed by a signal).
        exit_code: Option<i32>,
        success: bool,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    },

    /// The limit elapsed; the child was killed and its output discarded.
    TimedOut { limit_secs: u64, duration_ms: u64 },

    /// The process could not be started.
    LaunchFailed { cause: String },
}

impl ExecOutcome {
    /// Whether the process exited with status 0.
    pub fn passed(&self) -> bool {
        matches!(self, ExecOutcome::Completed { success: true, .. })
    }

    /// Map anything but a clean exit onto the sweep error taxonomy.
    pub fn ensure_success(&self, command: &EvalCommand) -> Result<(), SweepError> {
        match self {
            ExecOutcome::Completed { success: true, .. } => Ok(()),
            ExecOutcome::Completed { exit_code, .. } => {
                Err(SweepError::NonZeroExit { code: *exit_code })
            }
            ExecOutcome::TimedOut { limit_secs, .. } => Err(SweepError::ProcessTimeout {
                limit_secs: *limit_secs,
            }),
            ExecOutcome::LaunchFailed { cause } => Err(SweepError::ProcessLaunch {
                command: command.display(),
                cause: cause.clone(),
            }),
        }
    }
}

/// Runs the evaluation program. Implemented by [`ProcessExecutor`] and by
/// the in-process fakes used in tests.
#[async_trait]
pub trait EvalExecutor: Send + Sync {
    async fn execute(&self, command: &EvalCommand) -> ExecOutcome;
}

/// Executes the evaluation as a real child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Spawn the command, wait for it or the timeout, and classify the result.
    pub async fn run(command: &EvalCommand) -> ExecOutcome {
        let start = Instant::now();

        let Some((exe, args)) = command.argv.split_first() else {
            return ExecOutcome::LaunchFailed {
                cause: "empty command".to_string(),
            };
        };

        let mut child = match Command::new(exe)
            .args(args)
            .current_dir(&command.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ExecOutcome::LaunchFailed {
                    cause: e.to_string(),
                }
            }
        };

        let mut stdout = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let mut stderr = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        // Output is part of the run: a grandchild holding the pipes open
        // keeps the run alive until the same deadline as the child.
        let finished = async {
            let status = child.wait().await?;
            let out = collect(stdout.as_mut()).await;
            let err = collect(stderr.as_mut()).await;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let finished = if command.timeout_secs > 0 {
            let limit = Duration::from_secs(command.timeout_secs);
            let raced = tokio::time::timeout(limit, finished).await;
            match raced {
                Ok(finished) => finished,
                Err(_) => {
                    // The child may already have exited with its pipes still held.
                    if let Ok(None) = child.try_wait() {
                        if let Err(e) = child.kill().await {
                            warn!(
                                command = %command.display(),
                                error = %e,
                                "Failed to kill timed-out evaluation"
                            );
                        }
                    }
                    abort(stdout);
                    abort(stderr);
                    return ExecOutcome::TimedOut {
                        limit_secs: command.timeout_secs,
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                }
            }
        } else {
            finished.await
        };

        match finished {
            Ok((status, stdout, stderr)) => ExecOutcome::Completed {
                exit_code: status.code(),
                success: status.success(),
                stdout,
                stderr,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => {
                abort(stdout);
                abort(stderr);
                ExecOutcome::LaunchFailed {
                    cause: format!("wait failed: {}", e),
                }
            }
        }
    }
}

#[async_trait]
impl EvalExecutor for ProcessExecutor {
    async fn execute(&self, command: &EvalCommand) -> ExecOutcome {
        Self::run(command).await
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(mut pipe: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        warn!(error = %e, "Failed to read evaluation output");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(handle: Option<&mut JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort(handle: Option<JoinHandle<String>>) {
    if let Some(handle) = handle {
        handle.abort();
    }
}
