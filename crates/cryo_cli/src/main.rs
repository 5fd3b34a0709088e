//! `cryo` command-line entry point.
//!
//! Loads settings, sets up logging, then hands over to the command tree.

use std::path::Path;
use std::process::ExitCode;

use cryo_core::logging::{init_tracing, init_tracing_with_file};

mod commands;
mod progress;
mod registry;

use registry::{build_cli, dispatch, COMMANDS};

fn main() -> ExitCode {
    let matches = build_cli(COMMANDS).get_matches();

    // Config comes first since it names the log folder. `config` commands
    // manage the file themselves, so it may not exist yet.
    let explicit = commands::config::config_path(&matches)
        .filter(|_| matches.subcommand_name() != Some("config"));
    let settings = match commands::config::load_settings(explicit) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let level = settings.logging.level;
    let _log_guard = if settings.logging.logs_folder.is_empty() {
        init_tracing(level);
        None
    } else {
        match init_tracing_with_file(level, Path::new(&settings.logging.logs_folder)) {
            Ok(guard) => Some(guard),
            Err(e) => {
                init_tracing(level);
                tracing::warn!("File logging disabled: {}", e);
                None
            }
        }
    };

    tracing::debug!("cryo {}", cryo_core::version());

    match dispatch(COMMANDS, &matches, &settings) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
