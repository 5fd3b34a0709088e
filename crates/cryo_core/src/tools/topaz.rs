//! Topaz 3D denoising.

use std::path::Path;

use super::ToolCommand;
use crate::metadata::TiltSeriesJob;

/// Options for the denoise step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenoiseOptions {
    pub command: String,
    /// Pretrained model name.
    pub model: String,
    /// Patch size; smaller values need less GPU memory.
    pub patch_size: u32,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            command: "topaz".to_string(),
            model: "unet-3d-10a".to_string(),
            patch_size: 32,
        }
    }
}

/// `topaz denoise3d --model M --patch-size N -d <gpu> -o <dir> <recon>`
pub fn denoise_command(job: &TiltSeriesJob, options: &DenoiseOptions, gpu: u32) -> ToolCommand {
    let output_dir = job
        .paths
        .denoised
        .parent()
        .unwrap_or_else(|| Path::new("."));

    ToolCommand::new(&options.command)
        .arg("denoise3d")
        .args(["--model", options.model.as_str()])
        .arg("--patch-size")
        .arg(options.patch_size.to_string())
        .arg("-d")
        .arg(gpu.to_string())
        .arg("-o")
        .arg(output_dir)
        .arg(&job.paths.recon)
        .log_to(job.paths.denoised.with_extension("log"))
}

/// Hint appended to failures caused by running out of GPU memory.
pub fn out_of_memory_hint(stderr: &str) -> Option<&'static str> {
    stderr
        .contains("CUDA out of memory")
        .then_some("Not enough GPU memory. Try a lower --topaz-patch-size")
}
