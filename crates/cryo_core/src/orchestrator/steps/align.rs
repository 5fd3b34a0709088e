//! Align step - AreTomo tilt-series alignment.
//!
//! Besides the `.aln` file, AreTomo writes IMOD transforms under
//! `<stripped>_Imod/`. The `.xf` is moved next to the outputs under the
//! full series name, which is where Warp expects it on import.

use std::fs;
use std::path::Path;

use super::{echo, ensure_inputs, ensure_output_free, run_command};
use crate::orchestrator::step::{Batch, PipelineStep};
use crate::orchestrator::types::{ProcessingStep, StepContext};
use crate::runner::{Job, JobError, JobResult};
use crate::tools::aretomo::{align_command, AretomoOptions};

pub struct AlignStep {
    options: AretomoOptions,
}

impl AlignStep {
    pub fn new(options: AretomoOptions) -> Self {
        Self { options }
    }
}

impl PipelineStep for AlignStep {
    fn step(&self) -> ProcessingStep {
        ProcessingStep::Align
    }

    fn description(&self) -> &str {
        "Aligning with AreTomo"
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
                    let paths = &ts.paths;
                    ensure_output_free(ctx, &paths.aligned)?;
                    ensure_inputs(ctx, &[paths.fix.as_path(), paths.rawtlt.as_path()])?;

                    let gpu = ctx.acquire_gpu()?;
                    run_command(ctx, &align_command(ts, &self.options, gpu.id()))?;
                    drop(gpu);

                    echo(
                        ctx,
                        &format!("mv {} {}", paths.xf.display(), paths.imported_xf.display()),
                    );
                    if ctx.run.dry_run {
                        return Ok(());
                    }
                    move_file(&paths.xf, &paths.imported_xf)
                })
            })
            .collect();

        vec![Batch::new("Aligning", jobs)]
    }
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> JobResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let operation = || format!("moving {} to {}", from.display(), to.display());
    fs::copy(from, to).map_err(|e| JobError::io(operation(), e))?;
    fs::remove_file(from).map_err(|e| JobError::io(operation(), e))
}
