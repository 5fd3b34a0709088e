//! Command executors.

use std::fs;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::command::{CommandOutput, ToolCommand};
use crate::runner::{JobError, JobResult};

/// Runs tool commands. Shared by all workers of a batch.
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion.
    ///
    /// A non-zero exit is an error carrying the captured stderr.
    fn execute(&self, command: &ToolCommand) -> JobResult<CommandOutput>;
}

/// Spawns real processes with captured output.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill processes still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait(&self, child: &mut Child, line: &str) -> JobResult<Option<ExitStatus>> {
        let Some(limit) = self.timeout else {
            return child
                .wait()
                .map(Some)
                .map_err(|e| JobError::io(format!("waiting for `{}`", line), e));
        };

        let deadline = Instant::now() + limit;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!("Killing `{}` after {}s", line, limit.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(JobError::io(format!("waiting for `{}`", line), e)),
            }
        }
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, command: &ToolCommand) -> JobResult<CommandOutput> {
        let line = command.command_line();

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = command.cwd() {
            cmd.current_dir(dir);
        }

        tracing::debug!("Running: {}", line);

        let mut child = cmd.spawn().map_err(|source| JobError::Spawn {
            command: line.clone(),
            source,
        })?;

        // Drain both pipes concurrently so a chatty tool never blocks on a full pipe
        let stdout_reader = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_reader = child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf);
                buf
            })
        });

        let status = self.wait(&mut child, &line);

        let stdout = stdout_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        // Log is written whatever the outcome
        if let Some(log) = command.log_path() {
            let mut combined = stdout.clone();
            combined.extend_from_slice(&stderr);
            if let Err(e) = fs::write(&log, combined) {
                tracing::warn!("Failed to write {}: {}", log.display(), e);
            }
        }

        let Some(status) = status? else {
            return Err(JobError::TimedOut {
                command: line,
                secs: self.timeout.map_or(0, |t| t.as_secs()),
            });
        };

        if !status.success() {
            return Err(JobError::command_failed(
                line,
                status.code(),
                String::from_utf8_lossy(&stderr).trim().to_string(),
            ));
        }

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Pretends to run commands. Each call only sleeps briefly so progress
/// output stays readable.
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    delay: Duration,
}

impl DryRunExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl CommandExecutor for DryRunExecutor {
    fn execute(&self, command: &ToolCommand) -> JobResult<CommandOutput> {
        tracing::trace!("Dry run: {}", command.command_line());
        thread::sleep(self.delay);
        Ok(CommandOutput::default())
    }
}
