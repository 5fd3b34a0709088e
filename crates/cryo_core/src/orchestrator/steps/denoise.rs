//! Denoise step - topaz denoise3d with a pretrained model.

use super::{ensure_inputs, ensure_output_free, run_command};
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::{Job, JobError};
use crate::tools::topaz::{denoise_command, out_of_memory_hint, DenoiseOptions};

pub struct DenoiseStep {
    options: DenoiseOptions,
}

impl DenoiseStep {
    pub fn new(options: DenoiseOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for DenoiseStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::Denoise
    }

    fn description(&self) -> &str {
        "Denoising tomograms"
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
                    ensure_output_free(ctx, &ts.paths.denoised)?;
                    ensure_inputs(ctx, &[ts.paths.recon.as_path()])?;

                    let gpu = ctx.acquire_gpu()?;
                    let command = denoise_command(ts, &self.options, gpu.id());
                    run_command(ctx, &command).map_err(|err| match err {
                        JobError::CommandFailed {
                            command,
                            exit_code,
                            stderr,
                        } => {
                            let stderr = match out_of_memory_hint(&stderr) {
                                Some(hint) => format!("{stderr}\n{hint}"),
                                None => stderr,
                            };
                            JobError::CommandFailed {
                                command,
                                exit_code,
                                stderr,
                            }
                        }
                        other => other,
                    })
                })
            })
            .collect();

        vec![Batch::new("Denoising", jobs)]
    }
}
