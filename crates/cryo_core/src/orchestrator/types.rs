//! Pipeline types: step identifiers, run options and the per-run context.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Settings;
use crate::gpu::{GpuLease, GpuPool};
use crate::metadata::{Half, TiltSeriesJob};
use crate::runner::{default_workers, JobError, JobResult};
use crate::tools::aretomo::AretomoOptions;
use crate::tools::ccderaser::FixOptions;
use crate::tools::newstack::StackOptions;
use crate::tools::topaz::DenoiseOptions;
use crate::tools::CommandExecutor;

/// Processing steps in execution order.
///
/// Each step reads the files the previous one wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessingStep {
    Fix,
    Align,
    Reconstruct,
    StackHalves,
    ReconstructHalves,
    Denoise,
}

impl ProcessingStep {
    pub const ALL: [ProcessingStep; 6] = [
        Self::Fix,
        Self::Align,
        Self::Reconstruct,
        Self::StackHalves,
        Self::ReconstructHalves,
        Self::Denoise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fix => "fix",
            Self::Align => "align",
            Self::Reconstruct => "reconstruct",
            Self::StackHalves => "stack_halves",
            Self::ReconstructHalves => "reconstruct_halves",
            Self::Denoise => "denoise",
        }
    }

    /// Steps that only make sense when training a denoiser.
    pub fn is_training_only(&self) -> bool {
        matches!(self, Self::StackHalves | Self::ReconstructHalves)
    }

    /// Files a series must have once this step has run.
    pub fn outputs<'a>(&self, job: &'a TiltSeriesJob) -> Vec<&'a Path> {
        let paths = &job.paths;
        match self {
            Self::Fix => vec![paths.fix.as_path()],
            Self::Align => vec![paths.aln.as_path()],
            Self::Reconstruct => vec![paths.recon.as_path()],
            Self::StackHalves => Half::BOTH.iter().map(|h| paths.half_stack(*h)).collect(),
            Self::ReconstructHalves => Half::BOTH.iter().map(|h| paths.half_recon(*h)).collect(),
            Self::Denoise => vec![paths.denoised.as_path()],
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStep {
    type Err = String;

    /// Accepts `stack_halves` and `stack-halves`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown step '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// First step to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
    Step(ProcessingStep),
    /// Resume at the first step with missing outputs.
    Auto,
}

impl Default for StartFrom {
    fn default() -> Self {
        Self::Step(ProcessingStep::Fix)
    }
}

impl FromStr for StartFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Step)
        }
    }
}

impl fmt::Display for StartFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => step.fmt(f),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Options common to every step.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Rerun jobs whose output already exists.
    pub overwrite: bool,
    /// Simulate tool runs; no files are written.
    pub dry_run: bool,
    /// Echo every command line.
    pub verbose: bool,
    /// Worker threads for CPU steps.
    pub workers: usize,
    /// Per-process wall-clock limit.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            dry_run: false,
            verbose: false,
            workers: default_workers(),
            timeout: None,
        }
    }
}

/// Everything the standard pipeline needs besides the job list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    pub fix: FixOptions,
    pub aretomo: AretomoOptions,
    pub stack: StackOptions,
    pub denoise: DenoiseOptions,
    pub run: RunOptions,
    /// Fixed GPU ids. `None` queries the host.
    pub gpus: Option<Vec<u32>>,
}

impl PipelineOptions {
    /// Options from file settings, before command-line overrides.
    pub fn from_settings(settings: &Settings) -> Self {
        let tools = &settings.tools;
        let aretomo = &settings.aretomo;

        Self {
            fix: FixOptions {
                command: tools.ccderaser.clone(),
            },
            aretomo: AretomoOptions {
                command: tools.aretomo.clone(),
                binning: aretomo.binning,
                thickness: aretomo.thickness,
                recon_thickness_factor: aretomo.recon_thickness_factor,
                patches: aretomo.patches,
                tilt_axis: aretomo.tilt_axis,
                tilt_correction: aretomo.tilt_correction,
            },
            stack: StackOptions {
                command: tools.newstack.clone(),
            },
            denoise: DenoiseOptions {
                command: tools.topaz.clone(),
                model: settings.denoise.model.clone(),
                patch_size: settings.denoise.patch_size,
            },
            run: RunOptions {
                workers: settings.run.workers.unwrap_or_else(default_workers),
                timeout: settings.run.timeout_secs.map(Duration::from_secs),
                ..Default::default()
            },
            gpus: settings.run.gpus.clone(),
        }
    }
}

/// Shared state handed to every step of a run.
pub struct StepContext<'a> {
    pub jobs: &'a [TiltSeriesJob],
    pub executor: &'a dyn CommandExecutor,
    pub gpus: Option<&'a GpuPool>,
    pub run: &'a RunOptions,
}

impl<'a> StepContext<'a> {
    /// Block until a GPU is free.
    pub fn acquire_gpu(&self) -> JobResult<GpuLease<'a>> {
        self.gpus.map(GpuPool::acquire).ok_or(JobError::NoGpu)
    }
}
