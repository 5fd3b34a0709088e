//! Stack-halves step - assembles even and odd frame averages with newstack.

use super::{echo, ensure_inputs, ensure_output_free};
use crate::metadata::Half;
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::Job;
use crate::tools::newstack::{short_command_line, stack_command, StackOptions};

/// One batch per half; unselected tilts were already dropped from the
/// frame lists during extraction.
pub struct StackHalvesStep {
    options: StackOptions,
}

impl StackHalvesStep {
    pub fn new(options: StackOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for StackHalvesStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::StackHalves
    }

    fn description(&self) -> &str {
        "Preparing half stacks for denoising"
    }

    fn tool(&self) -> &str {
        &self.options.command
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
                            ensure_output_free(ctx, ts.paths.half_stack(half))?;
                            let frames: Vec<_> =
                                ts.half_frames(half).iter().map(|p| p.as_path()).collect();
                            ensure_inputs(ctx, &frames)?;

                            // Full frame lists are long; echo a short form
                            echo(ctx, &short_command_line(ts, half, &self.options));
                            ctx.executor.execute(&stack_command(ts, half, &self.options))?;
                            Ok(())
                        })
                    })
                    .collect();
                Batch::new(format!("Stacking {half} halves"), jobs)
            })
            .collect()
    }
}
