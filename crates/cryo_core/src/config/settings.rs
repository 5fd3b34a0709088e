//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Every field has a default so a partial file is always valid.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// External tool commands.
    #[serde(default)]
    pub tools: ToolSettings,

    /// AreTomo alignment and reconstruction defaults.
    #[serde(default)]
    pub aretomo: AretomoSettings,

    /// Denoising defaults.
    #[serde(default)]
    pub denoise: DenoiseSettings,

    /// Scheduling options.
    #[serde(default)]
    pub run: RunSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Commands used to invoke the external tools.
///
/// Each value is looked up on `PATH` unless it is an explicit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ccderaser")]
    pub ccderaser: String,

    #[serde(default = "default_aretomo")]
    pub aretomo: String,

    #[serde(default = "default_newstack")]
    pub newstack: String,

    #[serde(default = "default_topaz")]
    pub topaz: String,
}

fn default_ccderaser() -> String {
    "ccderaser".to_string()
}

fn default_aretomo() -> String {
    "AreTomo".to_string()
}

fn default_newstack() -> String {
    "newstack".to_string()
}

fn default_topaz() -> String {
    "topaz".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ccderaser: default_ccderaser(),
            aretomo: default_aretomo(),
            newstack: default_newstack(),
            topaz: default_topaz(),
        }
    }
}

/// AreTomo defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AretomoSettings {
    /// Output binning relative to the Warp stack.
    #[serde(default = "default_binning")]
    pub binning: u32,

    /// Unbinned sample thickness used for alignment (pixels).
    #[serde(default = "default_thickness")]
    pub thickness: u32,

    /// Reconstruction thickness as a multiple of the sample thickness.
    #[serde(default = "default_recon_factor")]
    pub recon_thickness_factor: f64,

    /// Local alignment patches per side (NxN). Unset disables local alignment.
    #[serde(default)]
    pub patches: Option<u32>,

    /// Starting tilt axis angle.
    #[serde(default)]
    pub tilt_axis: Option<f64>,

    /// Correct the tilt angle offset during alignment.
    #[serde(default = "default_true")]
    pub tilt_correction: bool,
}

fn default_binning() -> u32 {
    4
}

fn default_thickness() -> u32 {
    1200
}

fn default_recon_factor() -> f64 {
    1.3
}

fn default_true() -> bool {
    true
}

impl Default for AretomoSettings {
    fn default() -> Self {
        Self {
            binning: default_binning(),
            thickness: default_thickness(),
            recon_thickness_factor: default_recon_factor(),
            patches: None,
            tilt_axis: None,
            tilt_correction: true,
        }
    }
}

/// Topaz denoising defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseSettings {
    /// Pretrained model name passed to `topaz denoise3d --model`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Patch size; lower it when the GPU runs out of memory.
    #[serde(default = "default_patch_size")]
    pub patch_size: u32,
}

fn default_model() -> String {
    "unet-3d-10a".to_string()
}

fn default_patch_size() -> u32 {
    32
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            patch_size: default_patch_size(),
        }
    }
}

/// Scheduling options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSettings {
    /// Worker threads for CPU-bound steps. Unset uses `min(32, cores + 4)`.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Fixed GPU ids. Unset queries the host.
    #[serde(default)]
    pub gpus: Option<Vec<u32>>,

    /// Kill external processes running longer than this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Folder for rolling log files. Empty disables file logging.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Log batch progress every N percent in non-interactive mode.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            logs_folder: default_logs_folder(),
            progress_step: default_progress_step(),
        }
    }
}

/// Identifies a settings section (TOML table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Tools,
    Aretomo,
    Denoise,
    Run,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Tools,
        ConfigSection::Aretomo,
        ConfigSection::Denoise,
        ConfigSection::Run,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Tools => "tools",
            ConfigSection::Aretomo => "aretomo",
            ConfigSection::Denoise => "denoise",
            ConfigSection::Run => "run",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Tools => "External tool commands",
            ConfigSection::Aretomo => "AreTomo alignment and reconstruction",
            ConfigSection::Denoise => "Topaz denoising",
            ConfigSection::Run => "Scheduling",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}
