//! `cryo config init`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgMatches, Command};
use cryo_core::config::{ConfigManager, Settings};

/// Default settings file, relative to the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".config").join("cryo.toml")
}

/// Settings file chosen with the global `--config` option.
pub fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches.get_one::<PathBuf>("config").cloned()
}

/// Load settings for a run.
///
/// An explicit path must exist. The default file is optional and
/// missing keys fall back to defaults.
pub fn load_settings(explicit: Option<PathBuf>) -> anyhow::Result<Settings> {
    let required = explicit.is_some();
    let path = explicit.unwrap_or_else(default_config_path);

    if !required && !path.exists() {
        return Ok(Settings::default());
    }

    let mut manager = ConfigManager::new(&path);
    manager.load()?;
    Ok(manager.into_settings())
}

pub fn args(cmd: Command) -> Command {
    cmd
}

pub fn run(matches: &ArgMatches, _settings: &Settings) -> anyhow::Result<ExitCode> {
    let path = config_path(matches).unwrap_or_else(default_config_path);
    let existed = path.exists();

    let mut manager = ConfigManager::new(&path);
    manager.load_or_create()?;

    if existed {
        println!("Settings file already exists: {}", manager.path().display());
    } else {
        println!("Wrote default settings to {}", manager.path().display());
    }
    Ok(ExitCode::SUCCESS)
}
