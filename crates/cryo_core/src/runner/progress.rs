//! Progress reporting surface.
//!
//! Components register a labelled task with a known amount of work and
//! advance it one unit at a time. The terminal front end renders bars;
//! the library ships a silent sink, a log-based sink and a recording sink.

use parking_lot::Mutex;

use super::types::WorkerId;

/// Handle of a registered task.
pub type TaskId = usize;

/// Receiver of progress ticks. Implementations must be thread-safe since
/// workers report concurrently.
pub trait ProgressSink: Send + Sync {
    /// Register `total` units of work under `label`.
    fn register(&self, label: &str, total: usize) -> TaskId;

    /// Advance a task by one unit.
    fn advance(&self, task: TaskId);

    /// A worker picked up an item of the task.
    fn worker_started(&self, _task: TaskId, _worker: WorkerId, _item: &str) {}

    /// A worker finished its item.
    fn worker_finished(&self, _task: TaskId, _worker: WorkerId) {}

    /// No more work will be reported for the task.
    fn finish(&self, _task: TaskId) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn register(&self, _label: &str, _total: usize) -> TaskId {
        0
    }

    fn advance(&self, _task: TaskId) {}
}

struct LogTask {
    label: String,
    total: usize,
    done: usize,
    last_logged: u32,
}

/// Sink that logs progress through `tracing` at fixed percentage steps.
///
/// Used when stderr is not a terminal.
pub struct LogProgress {
    step: u32,
    tasks: Mutex<Vec<LogTask>>,
}

impl LogProgress {
    /// Log every `step` percent (clamped to 1..=100).
    pub fn new(step: u32) -> Self {
        Self {
            step: step.clamp(1, 100),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl ProgressSink for LogProgress {
    fn register(&self, label: &str, total: usize) -> TaskId {
        let mut tasks = self.tasks.lock();
        tracing::info!("{}: {} jobs", label, total);
        tasks.push(LogTask {
            label: label.to_string(),
            total,
            done: 0,
            last_logged: 0,
        });
        tasks.len() - 1
    }

    fn advance(&self, task: TaskId) {
        let mut tasks = self.tasks.lock();
        let Some(entry) = tasks.get_mut(task) else {
            return;
        };
        entry.done += 1;

        let percent = if entry.total == 0 {
            100
        } else {
            (entry.done * 100 / entry.total) as u32
        };

        // Only log at step intervals (e.g. 20%, 40%, ...) and at completion
        let current_step = (percent / self.step) * self.step;
        if current_step > entry.last_logged || (percent == 100 && entry.last_logged < 100) {
            entry.last_logged = if percent == 100 { 100 } else { current_step };
            tracing::info!(
                "{}: {}/{} ({}%)",
                entry.label,
                entry.done,
                entry.total,
                percent
            );
        }
    }
}

/// Snapshot of a task seen by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTask {
    pub label: String,
    pub total: usize,
    pub advanced: usize,
    pub finished: bool,
}

/// Sink that records every task, for inspection after a run.
#[derive(Default)]
pub struct RecordingProgress {
    tasks: Mutex<Vec<RecordedTask>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tasks registered so far, in registration order.
    pub fn tasks(&self) -> Vec<RecordedTask> {
        self.tasks.lock().clone()
    }

    /// Labels of all registered tasks.
    pub fn labels(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|t| t.label.clone()).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn register(&self, label: &str, total: usize) -> TaskId {
        let mut tasks = self.tasks.lock();
        tasks.push(RecordedTask {
            label: label.to_string(),
            total,
            advanced: 0,
            finished: false,
        });
        tasks.len() - 1
    }

    fn advance(&self, task: TaskId) {
        if let Some(entry) = self.tasks.lock().get_mut(task) {
            entry.advanced += 1;
        }
    }

    fn finish(&self, task: TaskId) {
        if let Some(entry) = self.tasks.lock().get_mut(task) {
            entry.finished = true;
        }
    }
}
