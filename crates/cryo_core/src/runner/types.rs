//! Job, outcome and summary types for the worker pool.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Identifier of the pool thread running a job, assigned at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker #{}", self.0)
    }
}

/// Error from a single job.
///
/// `AlreadyExists` is not a failure: the job is counted as skipped.
#[derive(Error, Debug)]
pub enum JobError {
    /// The output exists and overwrite was not requested.
    #[error("Output already exists: {0}")]
    AlreadyExists(PathBuf),

    /// An input produced by an earlier step (or by Warp) is missing.
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    /// The external tool exited with a non-zero status.
    #[error("`{}` failed with exit code {}: {}", .command, display_code(.exit_code), .stderr)]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The external tool ran past its wall-clock limit and was killed.
    #[error("`{command}` timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },

    /// The external tool could not be started.
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Filesystem error around the tool run.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A GPU step ran without a GPU pool.
    #[error("No GPU pool available for this job")]
    NoGpu,

    /// The job panicked.
    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Create a command failed error.
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Command line of the failing tool, if the error came from one.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { command, .. }
            | Self::TimedOut { command, .. }
            | Self::Spawn { command, .. } => Some(command),
            _ => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string())
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Body of a job. Receives the id of the worker running it.
pub type JobFn<'a> = Box<dyn FnOnce(WorkerId) -> JobResult<()> + Send + 'a>;

/// A named unit of work.
pub struct Job<'a> {
    name: String,
    run: JobFn<'a>,
}

impl<'a> Job<'a> {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(WorkerId) -> JobResult<()> + Send + 'a,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into name and body.
    pub(crate) fn into_parts(self) -> (String, JobFn<'a>) {
        (self.name, self.run)
    }
}

impl fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// Kind of a terminal outcome, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Skipped,
    Failed,
}

/// Terminal outcome of a job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed,
    /// Output existed and was left alone.
    Skipped(PathBuf),
    Failed(JobError),
}

impl JobOutcome {
    /// Classify a job result.
    pub fn from_result(result: JobResult<()>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(JobError::AlreadyExists(path)) => Self::Skipped(path),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed => JobStatus::Completed,
            Self::Skipped(_) => JobStatus::Skipped,
            Self::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Outcome of one job, with the worker that ran it.
#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub worker: WorkerId,
    pub outcome: JobOutcome,
}

/// Aggregated result of a batch.
#[derive(Debug)]
pub struct BatchSummary {
    pub label: String,
    /// Per-job reports, in completion order.
    pub reports: Vec<JobReport>,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Number of jobs in the batch.
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn completed_count(&self) -> usize {
        self.count(JobStatus::Completed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(JobStatus::Skipped)
    }

    pub fn failed_count(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    /// Reports of failed jobs.
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Failed(_)))
    }

    /// True when nothing was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.skipped_count() == 0 && self.failed_count() == 0
    }

    /// Log skips and failures, echoing failing command lines and stderr.
    pub fn log(&self) {
        let skipped = self.skipped_count();
        if skipped > 0 {
            tracing::warn!(
                "{}: {} files already exist and were not overwritten",
                self.label,
                skipped
            );
        }

        let failed = self.failed_count();
        if failed > 0 {
            tracing::error!("{}: {} jobs have failed:", self.label, failed);
            for report in self.failures() {
                if let JobOutcome::Failed(err) = &report.outcome {
                    match err {
                        JobError::CommandFailed {
                            command, stderr, ..
                        } => {
                            tracing::error!("[{}] `{}` failed with:\n{}", report.name, command, stderr.trim_end())
                        }
                        other => tracing::error!("[{}] {}", report.name, other),
                    }
                }
            }
        }

        tracing::info!(
            "{}: {} completed, {} skipped, {} failed in {:.1}s",
            self.label,
            self.completed_count(),
            skipped,
            failed,
            self.elapsed.as_secs_f64()
        );
    }

    fn count(&self, status: JobStatus) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.status() == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_is_classified_as_skip() {
        let outcome = JobOutcome::from_result(Err(JobError::AlreadyExists("/out/a.st".into())));
        assert_eq!(outcome.status(), JobStatus::Skipped);

        let outcome = JobOutcome::from_result(Err(JobError::MissingInput("/out/a.st".into())));
        assert_eq!(outcome.status(), JobStatus::Failed);

        assert_eq!(JobOutcome::from_result(Ok(())).status(), JobStatus::Completed);
    }

    #[test]
    fn command_failed_displays_context() {
        let err = JobError::command_failed("AreTomo -InMrc a.st", Some(2), "CUDA error");
        let msg = err.to_string();
        assert!(msg.contains("AreTomo -InMrc a.st"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("CUDA error"));
        assert_eq!(err.command(), Some("AreTomo -InMrc a.st"));
    }

    #[test]
    fn summary_counts_outcomes() {
        let report = |name: &str, outcome| JobReport {
            name: name.to_string(),
            worker: WorkerId(0),
            outcome,
        };
        let summary = BatchSummary {
            label: "Fixing".to_string(),
            reports: vec![
                report("a", JobOutcome::Completed),
                report("b", JobOutcome::Skipped("/out/b".into())),
                report("c", JobOutcome::Failed(JobError::NoGpu)),
            ],
            elapsed: Duration::from_millis(5),
        };

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.completed_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failures().next().map(|r| r.name.as_str()), Some("c"));
        assert!(!summary.is_clean());
    }
}
