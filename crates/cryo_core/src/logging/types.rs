//! Logging types.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// Shell command: `$ command`
    Command,
    /// Phase marker: `=== Phase ===`
    Phase,
    /// Section marker: `--- Section ---`
    Section,
}

impl MessagePrefix {
    /// Format a message with this prefix.
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Section => format!("--- {} ---", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Command.format("ls"), "$ ls");
        assert_eq!(MessagePrefix::Phase.format("Fixing"), "=== Fixing ===");
        assert_eq!(
            MessagePrefix::Section.format("Stacking even halves"),
            "--- Stacking even halves ---"
        );
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn level_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }
        let parsed: Wrapper = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Debug);
    }
}
