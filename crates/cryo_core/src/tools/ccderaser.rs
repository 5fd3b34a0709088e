//! IMOD `ccderaser` defect removal.

use super::ToolCommand;
use crate::metadata::TiltSeriesJob;

/// Options for the fix step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOptions {
    pub command: String,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            command: "ccderaser".to_string(),
        }
    }
}

/// Automatic peak finding with etomo's default thresholds.
const ERASER_DEFAULTS: &[&str] = &[
    "-find", "-peak", "8.0", "-diff", "6.0", "-big", "19.", "-giant", "12.", "-large", "8.",
    "-grow", "4.", "-edge", "4",
];

/// `ccderaser -input <stack> -output <fix> ...`
pub fn fix_command(job: &TiltSeriesJob, options: &FixOptions) -> ToolCommand {
    ToolCommand::new(&options.command)
        .arg("-input")
        .arg(&job.paths.stack)
        .arg("-output")
        .arg(&job.paths.fix)
        .args(ERASER_DEFAULTS)
}
