//! AreTomo alignment and reconstruction.
//!
//! AreTomo resolves some of its paths against the working directory, so
//! every run uses the output's parent directory as `cwd` and passes all
//! paths relative to it. Output is captured into `<output>.aretomolog`
//! since AreTomo's own `-LogFile` is unreliable.

use std::path::{Component, Path, PathBuf};

use super::ToolCommand;
use crate::metadata::{Half, TiltSeriesJob};

/// AreTomo settings shared by every alignment and reconstruction run.
#[derive(Debug, Clone, PartialEq)]
pub struct AretomoOptions {
    pub command: String,
    /// Output binning relative to the input stack.
    pub binning: u32,
    /// Unbinned sample thickness used for alignment.
    pub thickness: u32,
    /// Reconstruction thickness as a multiple of `thickness`.
    pub recon_thickness_factor: f64,
    /// NxN local alignment patches.
    pub patches: Option<u32>,
    pub tilt_axis: Option<f64>,
    pub tilt_correction: bool,
}

impl Default for AretomoOptions {
    fn default() -> Self {
        Self {
            command: "AreTomo".to_string(),
            binning: 4,
            thickness: 1200,
            recon_thickness_factor: 1.3,
            patches: None,
            tilt_axis: None,
            tilt_correction: true,
        }
    }
}

impl AretomoOptions {
    /// Volume height of reconstructions.
    pub fn recon_thickness(&self) -> u32 {
        (f64::from(self.thickness) * self.recon_thickness_factor).round() as u32
    }
}

/// Which volume a reconstruction produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconTarget {
    Full,
    Half(Half),
}

/// Align the defect-corrected stack, writing `<name>_aligned.st`, the
/// `.aln` file and IMOD transforms.
pub fn align_command(job: &TiltSeriesJob, options: &AretomoOptions, gpu: u32) -> ToolCommand {
    let paths = &job.paths;
    let output = &paths.aligned;
    let cwd = working_dir(output);

    let mut cmd = ToolCommand::new(&options.command)
        .flag_path("InMrc", &relative_path(&paths.fix, &cwd))
        .flag_path("OutMrc", &relative_path(output, &cwd))
        .flag("OutBin", options.binning)
        .flag("Gpu", gpu)
        .flag("DarkTol", 0)
        .flag_path("AngFile", &relative_path(&paths.rawtlt, &cwd))
        .flag("AlignZ", options.thickness)
        .flag("TiltCor", u8::from(options.tilt_correction))
        .flag("VolZ", 0)
        .flag_pair("TiltAxis", options.tilt_axis.unwrap_or(0.0), 1)
        .flag("OutImod", 2);

    if let Some(roi) = &paths.roi {
        cmd = cmd.flag_path("RoiFile", &relative_path(roi, &cwd));
    }
    if let Some(patches) = options.patches {
        cmd = cmd.flag_pair("Patch", patches, patches);
    }

    let log = relative_path(&output.with_extension("aretomolog"), &cwd);
    cmd.current_dir(cwd).log_to(log)
}

/// Weighted back-projection of a full or half stack using the alignment
/// from [`align_command`].
pub fn reconstruct_command(
    job: &TiltSeriesJob,
    target: ReconTarget,
    options: &AretomoOptions,
    gpu: u32,
) -> ToolCommand {
    let paths = &job.paths;
    let (input, output) = match target {
        ReconTarget::Full => (paths.fix.as_path(), paths.recon.as_path()),
        ReconTarget::Half(half) => (paths.half_stack(half), paths.half_recon(half)),
    };
    let cwd = working_dir(output);
    let acq = &job.acquisition;

    let log = relative_path(&output.with_extension("aretomolog"), &cwd);
    ToolCommand::new(&options.command)
        .flag_path("InMrc", &relative_path(input, &cwd))
        .flag_path("OutMrc", &relative_path(output, &cwd))
        .flag("OutBin", options.binning)
        .flag("Gpu", gpu)
        .flag("DarkTol", 0)
        .flag_path("AlnFile", &relative_path(&paths.aln, &cwd))
        .flag("VolZ", options.recon_thickness())
        .flag("PixSize", acq.pixel_size)
        .flag("Kv", acq.voltage_kv)
        .flag("ImgDose", acq.dose)
        .flag("Cs", acq.cs)
        .flag("Defoc", acq.defocus)
        .flag("FlipVol", 1)
        .flag("WBP", 1)
        .current_dir(cwd)
        .log_to(log)
}

fn working_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Express `path` relative to `base`, walking up with `..` where needed.
///
/// When only one side is absolute, the other is resolved against the
/// current directory first.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() != base.is_absolute() {
        let Ok(current) = std::env::current_dir() else {
            return path.to_path_buf();
        };
        return relative_path(&current.join(path), &current.join(base));
    }

    let path_parts: Vec<Component> = path.components().filter(|c| *c != Component::CurDir).collect();
    let base_parts: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part);
    }

    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}
