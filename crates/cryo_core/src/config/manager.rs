//! Config manager for loading and saving settings.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Missing keys are filled with defaults on load
//! - Generated files carry a comment per section

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the settings file.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Changes are only in memory until `save()` is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Consume the manager and return the settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load config from file, creating it with defaults if it doesn't exist.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            self.load()
        } else {
            self.settings = Settings::default();
            self.save()
        }
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Generate config content with a comment above each section.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();

        output.push_str("# Cryo batch processing configuration\n");
        output.push_str("# Command-line flags take precedence over these values.\n\n");

        for section in ConfigSection::ALL {
            let body = match section {
                ConfigSection::Tools => toml::to_string_pretty(&self.settings.tools)?,
                ConfigSection::Aretomo => toml::to_string_pretty(&self.settings.aretomo)?,
                ConfigSection::Denoise => toml::to_string_pretty(&self.settings.denoise)?,
                ConfigSection::Run => toml::to_string_pretty(&self.settings.run)?,
                ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            };

            output.push_str(&format!("# {}\n", section.description()));
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in body.lines() {
                output.push_str(line);
                output.push('\n');
            }
            output.push('\n');
        }

        Ok(output)
    }

    /// Write content to config file atomically.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Same directory so the rename stays on one filesystem
        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("cryo.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[tools]"));
        assert!(content.contains("[aretomo]"));
        assert!(content.contains("[logging]"));
    }

    #[test]
    fn generated_file_loads_back() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cryo.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.settings_mut().aretomo.binning = 8;
        manager.settings_mut().run.gpus = Some(vec![1, 3]);
        manager.save().unwrap();

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().aretomo.binning, 8);
        assert_eq!(reloaded.settings().run.gpus, Some(vec![1, 3]));
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cryo.toml");

        fs::write(&config_path, "[tools]\naretomo = \"AreTomo2\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().tools.aretomo, "AreTomo2");
        assert_eq!(manager.settings().tools.ccderaser, "ccderaser");
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("cryo.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }
}
