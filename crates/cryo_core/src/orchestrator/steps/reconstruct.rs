//! Reconstruct step - AreTomo weighted back-projection.

use super::{ensure_inputs, ensure_output_free, run_command};
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::Job;
use crate::tools::aretomo::{reconstruct_command, AretomoOptions, ReconTarget};

pub struct ReconstructStep {
    options: AretomoOptions,
}

impl ReconstructStep {
    pub fn new(options: AretomoOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for ReconstructStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::Reconstruct
    }

    fn description(&self) -> &str {
        "Reconstructing with AreTomo"
    }

    fn tool(&self) -> &str {
        &self.options.command
    }

    fn requires_gpu(&self) -> bool {
        true
    }

    fn batches<'a>(&'a self, ctx: &'a StepContext<'a>) -> Vec<Batch<'a>> {
        let jobs = ctx
            .jobs
            .iter()
            .map(|ts| {
                Job::new(&ts.name, move |_| {
                    ensure_output_free(ctx, &ts.paths.recon)?;
                    ensure_inputs(ctx, &[ts.paths.fix.as_path(), ts.paths.aln.as_path()])?;

                    let gpu = ctx.acquire_gpu()?;
                    let command = reconstruct_command(ts, ReconTarget::Full, &self.options, gpu.id());
                    run_command(ctx, &command)
                })
            })
            .collect();

        vec![Batch::new("Reconstructing", jobs)]
    }
}
