//! Bounded worker pool for independent batch jobs.
//!
//! A batch is a list of [`Job`]s, each wrapping one external tool run for
//! one tilt series. The pool runs them on a fixed number of OS threads and
//! never lets a single failure stop the batch:
//!
//! ```text
//! pending ──dispatch──> running ──┬──> completed
//!                                 ├──> skipped   (output already exists)
//!                                 └──> failed    (tool error, missing input, panic)
//! ```
//!
//! Every terminal state advances the progress sink exactly once, and the
//! batch returns a [`BatchSummary`] only after all jobs are terminal.

mod pool;
mod progress;
mod types;

pub use pool::{default_workers, WorkerPool};
pub use progress::{LogProgress, NullProgress, ProgressSink, RecordedTask, RecordingProgress, TaskId};
pub use types::{
    BatchSummary, Job, JobError, JobFn, JobOutcome, JobReport, JobResult, JobStatus, WorkerId,
};
