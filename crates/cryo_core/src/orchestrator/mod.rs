//! Step pipeline for batch tilt-series processing.
//!
//! A run walks the enabled steps in order. Each step turns every tilt
//! series into one job per output and hands the batch to the worker pool;
//! the next step starts only after the whole batch is terminal.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Fix                (ccderaser, CPU)
//!     ├── Step: Align              (AreTomo, GPU)
//!     ├── Step: Reconstruct        (AreTomo, GPU)
//!     ├── Step: StackHalves        (newstack, CPU, training only)
//!     ├── Step: ReconstructHalves  (AreTomo, GPU, training only)
//!     └── Step: Denoise            (topaz, GPU)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let plan = StepPlan::new(ProcessingStep::Fix, ProcessingStep::Denoise, false)?;
//! let result = create_standard_pipeline(&options)
//!     .run(&plan, &report.jobs, &options, &SystemExecutor::new(), &progress)?;
//! println!("{} failed", result.total_failed());
//! ```

mod errors;
mod pipeline;
mod plan;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use plan::StepPlan;
pub use step::{Batch, PipelineStep};
pub use steps::{
    AlignStep, DenoiseStep, FixStep, ReconstructHalvesStep, ReconstructStep, StackHalvesStep,
};
pub use types::{PipelineOptions, ProcessingStep, RunOptions, StartFrom, StepContext};

/// Create a standard pipeline with all steps in processing order.
///
/// Each step gets its own copy of the options it needs.
pub fn create_standard_pipeline(options: &PipelineOptions) -> Pipeline {
    Pipeline::new()
        .with_step(FixStep::new(options.fix.clone()))
        .with_step(AlignStep::new(options.aretomo.clone()))
        .with_step(ReconstructStep::new(options.aretomo.clone()))
        .with_step(StackHalvesStep::new(options.stack.clone()))
        .with_step(ReconstructHalvesStep::new(options.aretomo.clone()))
        .with_step(DenoiseStep::new(options.denoise.clone()))
}
