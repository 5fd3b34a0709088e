//! Configuration management for batch processing.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Defaults for every missing key
//!
//! # Example
//!
//! ```no_run
//! use cryo_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new(".config/cryo.toml");
//! config.load_or_create().unwrap();
//!
//! println!("AreTomo command: {}", config.settings().tools.aretomo);
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AretomoSettings, ConfigSection, DenoiseSettings, LoggingSettings, RunSettings, Settings,
    ToolSettings,
};
