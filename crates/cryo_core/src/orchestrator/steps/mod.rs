//! Pipeline step implementations.
//!
//! Each step turns every tilt series into one tool run per output file.
//! The job flow is the same everywhere:
//!
//! 1. Skip if the output exists (unless overwriting)
//! 2. Fail if an input from an earlier step is missing
//! 3. Lease a GPU when the tool needs one
//! 4. Run the tool

mod align;
mod denoise;
mod fix;
mod reconstruct;
mod reconstruct_halves;
mod stack_halves;

use std::path::Path;

pub use align::AlignStep;
pub use denoise::DenoiseStep;
pub use fix::FixStep;
pub use reconstruct::ReconstructStep;
pub use reconstruct_halves::ReconstructHalvesStep;
pub use stack_halves::StackHalvesStep;

use super::types::StepContext;
use crate::logging::MessagePrefix;
use crate::runner::{JobError, JobResult};
use crate::tools::ToolCommand;

/// Existing outputs are skipped unless overwrite was requested.
fn ensure_output_free(ctx: &StepContext<'_>, output: &Path) -> JobResult<()> {
    if !ctx.run.overwrite && output.exists() {
        return Err(JobError::AlreadyExists(output.to_path_buf()));
    }
    Ok(())
}

/// Earlier steps do not write anything in a dry run, so inputs are only
/// checked for real runs.
fn ensure_inputs(ctx: &StepContext<'_>, inputs: &[&Path]) -> JobResult<()> {
    if ctx.run.dry_run {
        return Ok(());
    }
    match inputs.iter().find(|p| !p.exists()) {
        Some(missing) => Err(JobError::MissingInput(missing.to_path_buf())),
        None => Ok(()),
    }
}

fn echo(ctx: &StepContext<'_>, line: &str) {
    if ctx.run.verbose {
        tracing::info!("{}", MessagePrefix::Command.format(line));
    }
}

fn run_command(ctx: &StepContext<'_>, command: &ToolCommand) -> JobResult<()> {
    echo(ctx, &command.command_line());
    ctx.executor.execute(command)?;
    Ok(())
}
