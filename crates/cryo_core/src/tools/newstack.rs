//! IMOD `newstack` for half-frame stacks.

use super::ToolCommand;
use crate::metadata::{Half, TiltSeriesJob};

/// Options for the stack-halves step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOptions {
    pub command: String,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            command: "newstack".to_string(),
        }
    }
}

/// `newstack <frames...> <half stack>`
pub fn stack_command(job: &TiltSeriesJob, half: Half, options: &StackOptions) -> ToolCommand {
    ToolCommand::new(&options.command)
        .args(job.half_frames(half))
        .arg(job.paths.half_stack(half))
}

/// Abbreviated form for verbose output: first and last frame only.
pub fn short_command_line(job: &TiltSeriesJob, half: Half, options: &StackOptions) -> String {
    let frames = job.half_frames(half);
    let output = job.paths.half_stack(half).display();
    match (frames.first(), frames.last()) {
        (Some(first), Some(last)) if frames.len() > 2 => format!(
            "{} {} [...] {} {}",
            options.command,
            first.display(),
            last.display(),
            output
        ),
        _ => stack_command(job, half, options).command_line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_support::sample_job;

    #[test]
    fn lists_frames_then_output() {
        let job = sample_job("TS_01.mrc");
        let cmd = stack_command(&job, Half::Odd, &StackOptions::default());

        let args: Vec<String> = cmd
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args.len(), job.frames_odd.len() + 1);
        assert_eq!(args.last().map(String::as_str), Some("/out/TS_01.mrc_odd.st"));
        assert!(args[0].ends_with("average/odd/tilt_000.mrc"));
    }

    #[test]
    fn short_line_elides_middle_frames() {
        let job = sample_job("TS_01.mrc");
        let line = short_command_line(&job, Half::Even, &StackOptions::default());
        assert!(line.contains("[...]"));
        assert!(line.ends_with("/out/TS_01.mrc_even.st"));
    }
}
