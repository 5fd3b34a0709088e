//! Which steps a run executes.

use super::errors::{PipelineError, PipelineResult};
use super::types::{ProcessingStep, StartFrom};
use crate::metadata::TiltSeriesJob;

/// Enabled flag for every step, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    entries: Vec<(ProcessingStep, bool)>,
}

impl StepPlan {
    /// Enable `start..=stop`. Half steps stay off unless training.
    pub fn new(start: ProcessingStep, stop: ProcessingStep, train: bool) -> PipelineResult<Self> {
        if start > stop {
            return Err(PipelineError::InvalidStepRange { start, stop });
        }

        let entries = ProcessingStep::ALL
            .into_iter()
            .map(|step| {
                let in_range = start <= step && step <= stop;
                (step, in_range && (train || !step.is_training_only()))
            })
            .collect();
        Ok(Self { entries })
    }

    /// Resolve `StartFrom::Auto` against what is already on disk.
    ///
    /// Auto starts at the first step (up to `stop`) for which some series
    /// lacks an output. If every output exists the run is pointless and
    /// an error is returned.
    pub fn resolve(
        start: StartFrom,
        stop: ProcessingStep,
        train: bool,
        jobs: &[TiltSeriesJob],
    ) -> PipelineResult<Self> {
        let start = match start {
            StartFrom::Step(step) => step,
            StartFrom::Auto => first_incomplete(stop, train, jobs)?,
        };
        Self::new(start, stop, train)
    }

    pub fn is_enabled(&self, step: ProcessingStep) -> bool {
        self.entries.iter().any(|(s, on)| *s == step && *on)
    }

    /// Enabled steps in execution order.
    pub fn enabled_steps(&self) -> impl Iterator<Item = ProcessingStep> + '_ {
        self.entries.iter().filter(|(_, on)| *on).map(|(s, _)| *s)
    }

    /// Every step with its flag, for the run overview.
    pub fn entries(&self) -> &[(ProcessingStep, bool)] {
        &self.entries
    }
}

fn first_incomplete(
    stop: ProcessingStep,
    train: bool,
    jobs: &[TiltSeriesJob],
) -> PipelineResult<ProcessingStep> {
    if jobs.is_empty() {
        return Ok(ProcessingStep::Fix);
    }

    let step = ProcessingStep::ALL
        .into_iter()
        .filter(|step| *step <= stop && (train || !step.is_training_only()))
        .find(|step| {
            jobs.iter()
                .any(|job| step.outputs(job).iter().any(|p| !p.exists()))
        })
        .ok_or(PipelineError::NothingToDo { stop })?;

    tracing::info!("Resuming from step '{}'", step);
    Ok(step)
}
