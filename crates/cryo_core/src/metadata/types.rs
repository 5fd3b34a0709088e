//! Tilt-series job descriptors and metadata errors.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors raised while reading sidecar metadata.
///
/// All of these abort extraction; a missing stack is not an error but an
/// "unprocessed" classification in [`ExtractionReport`].
#[derive(Error, Debug)]
pub enum MetadataError {
    /// A required directory does not exist.
    #[error("{what} directory not found: {path}")]
    MissingDirectory { what: String, path: PathBuf },

    /// No mdoc files matched the selection.
    #[error("Could not find any mdoc files in {0}")]
    NoSidecars(PathBuf),

    /// An explicitly requested series has no mdoc.
    #[error("No mdoc found for requested tilt series '{name}': {path}")]
    MissingSidecar { name: String, path: PathBuf },

    /// A sidecar could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A sidecar has invalid structure.
    #[error("Malformed {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// A required parameter is missing from a sidecar.
    #[error("Parameter '{name}' missing from {path}")]
    MissingParameter { path: PathBuf, name: String },

    /// A half-average frame needed for training is missing.
    #[error("Half-average frame not found: {0}")]
    MissingFrame(PathBuf),
}

impl MetadataError {
    /// Create an I/O error with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-file error.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a missing-parameter error.
    pub fn missing_parameter(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::MissingParameter {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Create a missing-directory error.
    pub fn missing_directory(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory {
            what: what.into(),
            path: path.into(),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// One of the two half-frame sets (even/odd frame averages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Even,
    Odd,
}

impl Half {
    /// Both halves, in processing order.
    pub const BOTH: [Half; 2] = [Half::Even, Half::Odd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Half::Even => "even",
            Half::Odd => "odd",
        }
    }
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acquisition parameters required by AreTomo reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcquisitionParams {
    /// Exposure dose per tilt (e/Å²).
    pub dose: f64,
    /// Effective pixel size of the Warp stack (`pixel_spacing * 2^bin`, Å).
    pub pixel_size: f64,
    /// Spherical aberration (mm).
    pub cs: f64,
    /// Acceleration voltage (kV).
    pub voltage_kv: u32,
    /// Defocus in Å (Warp stores µm).
    pub defocus: f64,
}

/// Every file a tilt series reads or produces across the pipeline.
///
/// All paths derive from the series name, the Warp directory and the
/// output directory, so two series never share an output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiltSeriesPaths {
    /// Source mdoc.
    pub mdoc: PathBuf,
    /// Warp-exported stack: `imod/<name>/<name>.st`.
    pub stack: PathBuf,
    /// Raw tilt angles next to the stack.
    pub rawtlt: PathBuf,
    /// Defect-corrected stack.
    pub fix: PathBuf,
    /// Aligned stack written by AreTomo during alignment.
    pub aligned: PathBuf,
    /// AreTomo alignment file.
    pub aln: PathBuf,
    /// IMOD transforms written by AreTomo (`-OutImod`).
    pub xf: PathBuf,
    /// IMOD tilt angles written by AreTomo.
    pub tlt: PathBuf,
    /// Transforms moved next to the outputs under the full series name.
    pub imported_xf: PathBuf,
    /// Full reconstruction.
    pub recon: PathBuf,
    /// Denoised reconstruction.
    pub denoised: PathBuf,
    pub stack_even: PathBuf,
    pub stack_odd: PathBuf,
    pub recon_even: PathBuf,
    pub recon_odd: PathBuf,
    /// Optional AreTomo region-of-interest file.
    pub roi: Option<PathBuf>,
}

impl TiltSeriesPaths {
    /// Compute all paths for a series.
    ///
    /// AreTomo strips every extension from its input when naming side
    /// outputs, so alignment files use the name up to the first dot.
    pub fn new(name: &str, warp_dir: &Path, output_dir: &Path, mdoc: PathBuf) -> Self {
        let stack = warp_dir.join("imod").join(name).join(format!("{name}.st"));
        let stripped = name.split('.').next().unwrap_or(name);
        let imod_dir = output_dir.join(format!("{stripped}_Imod"));

        Self {
            mdoc,
            rawtlt: stack.with_extension("rawtlt"),
            stack,
            fix: output_dir.join(format!("{name}_fix.st")),
            aligned: output_dir.join(format!("{name}_aligned.st")),
            aln: output_dir.join(format!("{stripped}.aln")),
            xf: imod_dir.join(format!("{stripped}.xf")),
            tlt: imod_dir.join(format!("{stripped}.tlt")),
            imported_xf: output_dir.join(format!("{name}.xf")),
            recon: output_dir.join(format!("{name}.mrc")),
            denoised: output_dir.join("denoised").join(format!("{name}.mrc")),
            stack_even: output_dir.join(format!("{name}_even.st")),
            stack_odd: output_dir.join(format!("{name}_odd.st")),
            recon_even: output_dir.join("even").join(format!("{name}.mrc")),
            recon_odd: output_dir.join("odd").join(format!("{name}.mrc")),
            roi: None,
        }
    }

    /// Half stack assembled from even or odd frames.
    pub fn half_stack(&self, half: Half) -> &Path {
        match half {
            Half::Even => &self.stack_even,
            Half::Odd => &self.stack_odd,
        }
    }

    /// Half reconstruction.
    pub fn half_recon(&self, half: Half) -> &Path {
        match half {
            Half::Even => &self.recon_even,
            Half::Odd => &self.recon_odd,
        }
    }
}

/// One tilt series ready for processing.
#[derive(Debug, Clone, Serialize)]
pub struct TiltSeriesJob {
    /// Series name, e.g. `TS_01.mrc`.
    pub name: String,
    pub paths: TiltSeriesPaths,
    /// Tilt indices unselected manually in Warp, ascending.
    pub skipped_tilts: Vec<usize>,
    /// Even half-average frames of the kept tilts, in tilt order.
    pub frames_even: Vec<PathBuf>,
    /// Odd half-average frames of the kept tilts, in tilt order.
    pub frames_odd: Vec<PathBuf>,
    pub acquisition: AcquisitionParams,
}

impl TiltSeriesJob {
    /// Frames making up one half stack.
    pub fn half_frames(&self, half: Half) -> &[PathBuf] {
        match half {
            Half::Even => &self.frames_even,
            Half::Odd => &self.frames_odd,
        }
    }
}

/// Outcome of metadata extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Series ready for processing, in mdoc order.
    pub jobs: Vec<TiltSeriesJob>,
    /// Series excluded on request.
    pub excluded: Vec<String>,
    /// Series not yet preprocessed (no stack, or every tilt unselected).
    pub unprocessed: Vec<String>,
}
