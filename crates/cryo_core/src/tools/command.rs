//! Command line builder for external tools.

use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// A fully specified external tool run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            log_file: None,
        }
    }

    /// Append a raw argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several raw arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Append `-Name value`.
    pub fn flag(self, name: &str, value: impl Display) -> Self {
        self.arg(format!("-{name}")).arg(value.to_string())
    }

    /// Append `-Name <path>`.
    pub fn flag_path(self, name: &str, path: &Path) -> Self {
        self.arg(format!("-{name}")).arg(path)
    }

    /// Append `-Name a b` for tools taking two values per option.
    pub fn flag_pair(self, name: &str, first: impl Display, second: impl Display) -> Self {
        self.arg(format!("-{name}"))
            .arg(first.to_string())
            .arg(second.to_string())
    }

    /// Run the tool from this directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Save combined stdout and stderr to this file (relative to the
    /// working directory when relative).
    pub fn log_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Log destination resolved against the working directory.
    pub fn log_path(&self) -> Option<PathBuf> {
        let log = self.log_file.as_ref()?;
        Some(match &self.cwd {
            Some(dir) if log.is_relative() => dir.join(log),
            _ => log.clone(),
        })
    }

    /// Shell-like rendering for logs and verbose output.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured result of a successful run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}
