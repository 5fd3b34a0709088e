//! Reconstruct-halves step - even and odd tomograms for denoiser training.

use super::{ensure_inputs, ensure_output_free, run_command};
use crate::metadata::Half;
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::Job;
use crate::tools::aretomo::{reconstruct_command, AretomoOptions, ReconTarget};

/// Reuses the full-stack alignment for both halves.
pub struct ReconstructHalvesStep {
    options: AretomoOptions,
}

impl ReconstructHalvesStep {
    pub fn new(options: AretomoOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for ReconstructHalvesStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::ReconstructHalves
    }

    fn description(&self) -> &str {
        "Reconstructing half tomograms for denoising"
    }

    fn tool(&self) -> &str {
        &self.options.command
    }

    fn requires_gpu(&self) -> bool {
        true
    }

    fn batches<'a>(&'a self, ctx: &'a StepContext<'a>) -> Vec<Batch<'a>> {
        Half::BOTH
            .into_iter()
            .map(|half| {
                let jobs = ctx
                    .jobs
                    .iter()
                    .map(|ts| {
                        Job::new(&ts.name, move |_| {
                            ensure_output_free(ctx, ts.paths.half_recon(half))?;
                            ensure_inputs(ctx, &[ts.paths.half_stack(half), ts.paths.aln.as_path()])?;

                            let gpu = ctx.acquire_gpu()?;
                            let command = reconstruct_command(
                                ts,
                                ReconTarget::Half(half),
                                &self.options,
                                gpu.id(),
                            );
                            run_command(ctx, &command)
                        })
                    })
                    .collect();
                Batch::new(format!("Reconstructing {half} halves"), jobs)
            })
            .collect()
    }
}
