//! Pipeline runner that executes steps in sequence.

use super::errors::PipelineResult;
use super::plan::StepPlan;
use super::step::PipelineStep;
use super::types::{PipelineOptions, ProcessingStep, StepContext};
use crate::gpu::{detect_gpus, GpuPool};
use crate::logging::MessagePrefix;
use crate::metadata::TiltSeriesJob;
use crate::runner::{BatchSummary, ProgressSink, WorkerPool};
use crate::tools::CommandExecutor;

/// Pipeline that runs a sequence of steps.
///
/// Steps never overlap: every batch of a step finishes before the next
/// batch starts. Job failures are collected, not propagated; only setup
/// errors (missing tool, no GPU, unwritable directory) abort the run.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run the steps enabled in `plan` over all jobs.
    ///
    /// The GPU pool is built once, before the first step, if any enabled
    /// step needs it. GPU steps run one job per device; CPU steps use the
    /// configured worker count.
    pub fn run(
        &self,
        plan: &StepPlan,
        jobs: &[TiltSeriesJob],
        options: &PipelineOptions,
        executor: &dyn CommandExecutor,
        progress: &dyn ProgressSink,
    ) -> PipelineResult<PipelineRunResult> {
        let enabled: Vec<&dyn PipelineStep> = self
            .steps
            .iter()
            .map(|s| &**s)
            .filter(|s| plan.is_enabled(s.step()))
            .collect();

        // Every tool is looked up before the first batch starts
        for step in &enabled {
            step.check_tool(&options.run)?;
        }

        let gpus = if enabled.iter().any(|s| s.requires_gpu()) {
            let ids = match &options.gpus {
                Some(ids) => ids.clone(),
                None => detect_gpus()?,
            };
            let pool = GpuPool::new(ids)?;
            tracing::info!(
                "Running GPU steps in parallel on {} GPUs ({:?})",
                pool.capacity(),
                pool.ids()
            );
            Some(pool)
        } else {
            None
        };

        let ctx = StepContext {
            jobs,
            executor,
            gpus: gpus.as_ref(),
            run: &options.run,
        };

        let mut result = PipelineRunResult::default();

        for step in enabled {
            tracing::info!("{}", MessagePrefix::Phase.format(step.description()));
            step.validate_input(&ctx)?;

            let workers = match (&gpus, step.requires_gpu()) {
                (Some(pool), true) => pool.capacity(),
                _ => options.run.workers,
            };
            let pool = WorkerPool::new(workers);

            for batch in step.batches(&ctx) {
                tracing::debug!("{}", MessagePrefix::Section.format(&batch.label));
                let summary = pool.run(&batch.label, batch.jobs, progress);
                summary.log();
                result.summaries.push(summary);
            }
            result.steps_run.push(step.step());
        }

        Ok(result)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineRunResult {
    /// Steps that ran, in order.
    pub steps_run: Vec<ProcessingStep>,
    /// One summary per batch, in order.
    pub summaries: Vec<BatchSummary>,
}

impl PipelineRunResult {
    pub fn total_skipped(&self) -> usize {
        self.summaries.iter().map(BatchSummary::skipped_count).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.summaries.iter().map(BatchSummary::failed_count).sum()
    }

    /// True when no job failed. Skips are not failures.
    pub fn succeeded(&self) -> bool {
        self.total_failed() == 0
    }

    /// Batch labels in execution order.
    pub fn batch_labels(&self) -> Vec<&str> {
        self.summaries.iter().map(|s| s.label.as_str()).collect()
    }
}
