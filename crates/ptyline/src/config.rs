//! Configuration management for ptyline.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/ptyline/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{DEFAULT_COLS, DEFAULT_FILE, DEFAULT_NAME, DEFAULT_ROWS, READ_BUFFER_SIZE};

/// Upper bound for `read_loop.buffer_size`.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("cols and rows must be greater than 0, got {cols}x{rows}")]
    InvalidDimensions { cols: u16, rows: u16 },

    #[error("poll_interval_ms must be between 1 and 1000, got {0}")]
    InvalidPollInterval(u64),

    #[error("buffer_size must be between 1 and {MAX_BUFFER_SIZE}, got {0}")]
    InvalidBufferSize(usize),

    #[error("default_file must not be empty")]
    EmptyDefaultFile,

    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Defaults for new sessions.
    pub session: SessionConfig,

    /// Read loop tuning.
    pub read_loop: ReadLoopConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Defaults applied when a session is spawned without explicit options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Program to run when none is given.
    pub default_file: String,

    /// Terminal type exported as `TERM`.
    pub term_name: String,

    pub cols: u16,
    pub rows: u16,
}

/// Read loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadLoopConfig {
    /// Pause after an empty read, in milliseconds.
    pub poll_interval_ms: u64,

    /// Bytes requested per backend read.
    pub buffer_size: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_file: DEFAULT_FILE.to_string(),
            term_name: DEFAULT_NAME.to_string(),
            cols: DEFAULT_COLS as u16,
            rows: DEFAULT_ROWS as u16,
        }
    }
}

impl Default for ReadLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 8,
            buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ptyline")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported variables:
    /// - PTYLINE_LOG_LEVEL: Override log level
    /// - PTYLINE_SHELL: Override the default program
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PTYLINE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!(level = %level, "Overriding log level from environment");
                self.logging.level = level;
            }
        }

        if let Ok(shell) = std::env::var("PTYLINE_SHELL") {
            if !shell.is_empty() {
                tracing::info!(shell = %shell, "Overriding default file from environment");
                self.session.default_file = shell;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let SessionConfig { cols, rows, .. } = self.session;
        if cols == 0 || rows == 0 {
            return Err(ConfigError::InvalidDimensions { cols, rows });
        }

        if self.session.default_file.is_empty() {
            return Err(ConfigError::EmptyDefaultFile);
        }

        let interval = self.read_loop.poll_interval_ms;
        if !(1..=1000).contains(&interval) {
            return Err(ConfigError::InvalidPollInterval(interval));
        }

        let size = self.read_loop.buffer_size;
        if size == 0 || size > MAX_BUFFER_SIZE {
            return Err(ConfigError::InvalidBufferSize(size));
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// A missing file yields the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.session.default_file, "sh");
        assert_eq!(config.session.term_name, "xterm");
        assert_eq!((config.session.cols, config.session.rows), (80, 24));
        assert_eq!(config.read_loop.poll_interval_ms, 8);
        assert_eq!(config.read_loop.buffer_size, 4096);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[session]
default_file = "/bin/bash"
cols = 132

[logging]
level = "debug"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.session.default_file, "/bin/bash");
        assert_eq!(config.session.cols, 132);
        assert_eq!(config.session.rows, 24);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.read_loop, ReadLoopConfig::default());
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let err = Config::from_toml("[session\ncols = 1").unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let toml = r#"
[read_loop]
buffer_size = "large"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_from_toml_dimension_out_of_range() {
        let toml = r#"
[session]
cols = 70000
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut original = Config::default();
        original.session.term_name = "xterm-256color".to_string();
        original.read_loop.poll_interval_ms = 16;
        original.logging.level = "warn".to_string();

        let loaded = Config::from_toml(&original.to_toml().unwrap()).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_missing_file() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.session.rows = 50;
        original.save(&config_path).unwrap();

        assert!(config_path.exists());
        assert_eq!(Config::load(&config_path).unwrap(), original);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = Config::load(&config_path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("ptyline/config.toml"));
    }

    #[test]
    fn test_validate_dimensions() {
        let mut config = Config::default();
        config.session.rows = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDimensions { cols: 80, rows: 0 })
        );
    }

    #[test]
    fn test_validate_poll_interval() {
        let mut config = Config::default();
        config.read_loop.poll_interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval(0)));

        config.read_loop.poll_interval_ms = 1000;
        assert!(config.validate().is_ok());

        config.read_loop.poll_interval_ms = 1001;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval(1001)));
    }

    #[test]
    fn test_validate_buffer_size() {
        let mut config = Config::default();
        config.read_loop.buffer_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBufferSize(0)));

        config.read_loop.buffer_size = MAX_BUFFER_SIZE + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBufferSize(_))
        ));
    }

    #[test]
    fn test_validate_default_file() {
        let mut config = Config::default();
        config.session.default_file.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyDefaultFile));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );
    }

    #[test]
    #[serial]
    fn test_env_override_log_level() {
        std::env::set_var("PTYLINE_LOG_LEVEL", "trace");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.logging.level, "trace");

        std::env::remove_var("PTYLINE_LOG_LEVEL");
    }

    #[test]
    #[serial]
    fn test_env_override_shell() {
        std::env::set_var("PTYLINE_SHELL", "/bin/zsh");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.session.default_file, "/bin/zsh");

        std::env::remove_var("PTYLINE_SHELL");
    }

    #[test]
    #[serial]
    fn test_env_override_empty_does_not_override() {
        std::env::set_var("PTYLINE_LOG_LEVEL", "");
        std::env::remove_var("PTYLINE_SHELL");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config, Config::default());

        std::env::remove_var("PTYLINE_LOG_LEVEL");
    }
}
