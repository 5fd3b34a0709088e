//! Error types for the step pipeline.
//!
//! Only configuration problems are errors at this level. Anything that
//! goes wrong inside a single job is a [`JobError`](crate::runner::JobError)
//! and ends up in the batch summary instead.

use thiserror::Error;

use super::types::ProcessingStep;
use crate::gpu::GpuError;
use crate::metadata::MetadataError;

/// Fatal error raised before or between batches.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// `--start-from` comes after `--stop-at`.
    #[error("Cannot start from '{start}' and stop at '{stop}': start comes after stop")]
    InvalidStepRange {
        start: ProcessingStep,
        stop: ProcessingStep,
    },

    /// Automatic resume found every output already present.
    #[error("All outputs up to '{stop}' already exist; nothing to do (use --overwrite to rerun)")]
    NothingToDo { stop: ProcessingStep },

    /// A step's executable is not on PATH.
    #[error("{tool} is not available on the system (needed by step '{step}')")]
    ToolNotFound { step: ProcessingStep, tool: String },

    /// Output directories could not be prepared.
    #[error("Step '{step}' setup failed: {message}")]
    SetupFailed {
        step: ProcessingStep,
        message: String,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("You need at least one GPU: {0}")]
    Gpu(#[from] GpuError),
}

impl PipelineError {
    /// Create a tool not found error.
    pub fn tool_not_found(step: ProcessingStep, tool: impl Into<String>) -> Self {
        Self::ToolNotFound {
            step,
            tool: tool.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(step: ProcessingStep, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            step,
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
