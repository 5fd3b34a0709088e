//! External tool invocation.
//!
//! Each tool module builds a [`ToolCommand`] from a tilt series and its
//! step options; a [`CommandExecutor`] runs it. Keeping construction and
//! execution apart lets dry runs and tests swap the executor.

pub mod aretomo;
pub mod ccderaser;
mod command;
mod executor;
pub mod newstack;
pub mod topaz;

use std::env;
use std::path::{Path, PathBuf};

pub use command::{CommandOutput, ToolCommand};
pub use executor::{CommandExecutor, DryRunExecutor, SystemExecutor};

/// Locate an executable the way a shell would.
///
/// Values containing a path separator are checked as given; bare names are
/// searched on `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
