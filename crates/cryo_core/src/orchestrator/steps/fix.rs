//! Fix step - removes hot pixels and X-rays with ccderaser.

use super::{ensure_inputs, ensure_output_free, run_command};
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::Job;
use crate::tools::ccderaser::{fix_command, FixOptions};

/// Writes `<name>_fix.st` from the Warp stack. CPU only.
pub struct FixStep {
    options: FixOptions,
}

impl FixStep {
    pub fn new(options: FixOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for FixStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::Fix
    }

    fn description(&self) -> &str {
        "Fixing with ccderaser"
    }

    fn tool(&self) -> &str {
        &self.options.command
    }

    fn batches<'a>(&'a self, ctx: &'a StepContext<'a>) -> Vec<Batch<'a>> {
        let jobs = ctx
            .jobs
            .iter()
            .map(|ts| {
                Job::new(&ts.name, move |_| {
                    ensure_output_free(ctx, &ts.paths.fix)?;
                    ensure_inputs(ctx, &[ts.paths.stack.as_path()])?;
                    run_command(ctx, &fix_command(ts, &self.options))
                })
            })
            .collect();

        vec![Batch::new("Fixing", jobs)]
    }
}
