//! Fixed-size thread pool running one batch at a time.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use super::progress::ProgressSink;
use super::types::{BatchSummary, Job, JobError, JobOutcome, JobReport, WorkerId};

/// Default worker count for CPU-bound steps: `min(32, cores + 4)`.
pub fn default_workers() -> usize {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    (cores + 4).min(32)
}

/// Sent by a worker when a job reaches its terminal state.
struct Finished {
    index: usize,
    worker: WorkerId,
    outcome: JobOutcome,
}

/// Runs batches of independent jobs on a bounded number of threads.
///
/// Jobs are dispatched in submission order but may complete in any order.
/// Errors and panics are captured per job; the batch always runs to the end.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Maximum number of concurrently running jobs.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all jobs and block until every one reached a terminal state.
    ///
    /// Registers `jobs.len()` units under `label` and advances the sink once
    /// per finished job.
    pub fn run<'a>(
        &self,
        label: &str,
        jobs: Vec<Job<'a>>,
        progress: &dyn ProgressSink,
    ) -> BatchSummary {
        let started = Instant::now();
        let total = jobs.len();
        let task = progress.register(label, total);

        let mut reports = Vec::with_capacity(total);

        let names: Vec<String> = jobs.iter().map(|job| job.name().to_string()).collect();
        let queue = Mutex::new(jobs.into_iter().enumerate().collect::<VecDeque<_>>());
        let thread_count = self.workers.min(total);

        tracing::debug!("{}: {} jobs on {} workers", label, total, thread_count);

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<Finished>();

            for id in 0..thread_count {
                let tx = tx.clone();
                let queue = &queue;
                let worker = WorkerId(id);

                scope.spawn(move || loop {
                    let next = queue.lock().pop_front();
                    let Some((index, job)) = next else {
                        break;
                    };

                    let (name, run) = job.into_parts();
                    progress.worker_started(task, worker, &name);

                    let result = panic::catch_unwind(AssertUnwindSafe(|| run(worker)))
                        .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&*payload))));

                    progress.worker_finished(task, worker);
                    let _ = tx.send(Finished {
                        index,
                        worker,
                        outcome: JobOutcome::from_result(result),
                    });
                });
            }

            // Only worker clones remain; the loop ends when all workers exit
            drop(tx);

            for Finished {
                index,
                worker,
                outcome,
            } in rx
            {
                if let JobOutcome::Failed(err) = &outcome {
                    tracing::debug!("{}: '{}' failed: {}", label, names[index], err);
                }
                reports.push(JobReport {
                    name: names[index].clone(),
                    worker,
                    outcome,
                });
                progress.advance(task);
            }
        });
        progress.finish(task);

        BatchSummary {
            label: label.to_string(),
            reports,
            elapsed: started.elapsed(),
        }
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
