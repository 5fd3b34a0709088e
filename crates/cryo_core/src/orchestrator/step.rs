//! Pipeline step trait definition.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use super::errors::{PipelineError, PipelineResult};
use super::types::{ProcessingStep, RunOptions, StepContext};
use crate::runner::Job;
use crate::tools::which;

/// One labelled set of jobs handed to the worker pool.
pub struct Batch<'a> {
    pub label: String,
    pub jobs: Vec<Job<'a>>,
}

impl<'a> Batch<'a> {
    pub fn new(label: impl Into<String>, jobs: Vec<Job<'a>>) -> Self {
        Self {
            label: label.into(),
            jobs,
        }
    }
}

/// Trait for pipeline steps.
///
/// The pipeline calls `check_tool` on every enabled step before any work
/// starts. Each step then gets one `validate_input` call, and each batch
/// from `batches` runs to completion before moving on. Jobs report their
/// own failures; only `check_tool` and `validate_input` can stop the run.
pub trait PipelineStep: Send + Sync {
    fn step(&self) -> ProcessingStep;

    /// Step name (for logging and error context).
    fn name(&self) -> &str {
        self.step().as_str()
    }

    /// Human-readable description of what this step does.
    fn description(&self) -> &str;

    /// Command that must be on PATH.
    fn tool(&self) -> &str;

    /// Whether each job needs a GPU lease.
    fn requires_gpu(&self) -> bool {
        false
    }

    /// Directories the step writes into.
    fn output_dirs(&self, ctx: &StepContext<'_>) -> Vec<PathBuf> {
        let dirs: BTreeSet<PathBuf> = ctx
            .jobs
            .iter()
            .flat_map(|job| self.step().outputs(job))
            .filter_map(|output| output.parent())
            .map(PathBuf::from)
            .collect();
        dirs.into_iter().collect()
    }

    /// Check that the tool can be found. Skipped in dry runs.
    fn check_tool(&self, run: &RunOptions) -> PipelineResult<()> {
        if run.dry_run || which(self.tool()).is_some() {
            Ok(())
        } else {
            Err(PipelineError::tool_not_found(self.step(), self.tool()))
        }
    }

    /// Prepare output directories. Dry runs write nothing.
    fn validate_input(&self, ctx: &StepContext<'_>) -> PipelineResult<()> {
        if ctx.run.dry_run {
            return Ok(());
        }

        for dir in self.output_dirs(ctx) {
            fs::create_dir_all(&dir).map_err(|e| {
                PipelineError::setup_failed(
                    self.step(),
                    format!("cannot create {}: {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }

    /// One job per tilt series, grouped into batches run in order.
    fn batches<'a>(&'a self, ctx: &'a StepContext<'a>) -> Vec<Batch<'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::DryRunExecutor;

    struct MockStep {
        tool: &'static str,
    }

    impl PipelineStep for MockStep {
        fn step(&self) -> ProcessingStep {
            ProcessingStep::Fix
        }

        fn description(&self) -> &str {
            "Mocking"
        }

        fn tool(&self) -> &str {
            self.tool
        }

        fn batches<'a>(&'a self, ctx: &'a StepContext<'a>) -> Vec<Batch<'a>> {
            let jobs = ctx
                .jobs
                .iter()
                .map(|job| Job::new(&job.name, |_| Ok(())))
                .collect();
            vec![Batch::new("Mocking", jobs)]
        }
    }

    #[test]
    fn step_trait_object_works() {
        let step: Box<dyn PipelineStep> = Box::new(MockStep { tool: "sh" });
        assert_eq!(step.name(), "fix");
        assert!(!step.requires_gpu());
    }

    #[test]
    fn missing_tool_fails_unless_dry_run() {
        let step = MockStep {
            tool: "definitely-not-a-real-tool-4242",
        };
        let mut run = RunOptions::default();
        assert!(matches!(
            step.check_tool(&run),
            Err(PipelineError::ToolNotFound { .. })
        ));

        run.dry_run = true;
        assert!(step.check_tool(&run).is_ok());
        assert!(MockStep { tool: "sh" }.check_tool(&RunOptions::default()).is_ok());
    }

    #[test]
    fn dry_run_creates_no_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = crate::metadata::test_support::sample_job("TS_01.mrc");
        job.paths.fix = dir.path().join("out").join("TS_01.mrc_fix.st");
        let jobs = [job];
        let executor = DryRunExecutor::default();
        let mut run = RunOptions {
            dry_run: true,
            ..Default::default()
        };

        let step = MockStep { tool: "sh" };
        let ctx = StepContext {
            jobs: &jobs,
            executor: &executor,
            gpus: None,
            run: &run,
        };
        step.validate_input(&ctx).unwrap();
        assert!(!dir.path().join("out").exists());

        run.dry_run = false;
        let ctx = StepContext {
            jobs: &jobs,
            executor: &executor,
            gpus: None,
            run: &run,
        };
        step.validate_input(&ctx).unwrap();
        assert!(dir.path().join("out").is_dir());
    }
}
