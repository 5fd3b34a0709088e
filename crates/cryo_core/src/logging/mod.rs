//! Logging infrastructure for batch processing.
//!
//! This module provides:
//! - Global `tracing` subscriber setup (stderr, optional rolling file)
//! - Consistent message prefixes for command echo and phase markers
//!
//! # Example
//!
//! ```no_run
//! use cryo_core::logging::{init_tracing, LogLevel, MessagePrefix};
//!
//! init_tracing(LogLevel::Info);
//! tracing::info!("{}", MessagePrefix::Phase.format("Aligning"));
//! tracing::info!("{}", MessagePrefix::Command.format("AreTomo -InMrc ts.st ..."));
//! ```

mod types;

pub use types::{LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Initialize tracing with an additional daily-rolling log file.
///
/// The returned guard must be kept alive for the duration of the program,
/// dropping it flushes and closes the file writer.
pub fn init_tracing_with_file(default_level: LogLevel, log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::daily(log_dir, "cryo.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Info), "info");
        assert_eq!(level_to_filter_str(LogLevel::Error), "error");
    }
}
