//! Configuration management for the tasktracker launcher
//!
//! Configuration is stored in TOML format.
//!
//! # Configuration File Locations
//!
//! - Linux: `~/.config/tasktracker/updater.toml`
//! - macOS: `~/Library/Application Support/io.highercomve.tasktracker/updater.toml`
//! - Windows: `%APPDATA%\highercomve\tasktracker\config\updater.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tasktracker_updater::{UpdateConfig, UpdateError};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Refused to overwrite an existing file
    #[error("Config file {0:?} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    /// No home directory to derive the default location from
    #[error("Could not determine the default config location")]
    NoDefaultPath,
}

/// Launcher configuration
///
/// # Example TOML
///
/// ```toml
/// [logging]
/// level = "info"
/// # directory = "/var/log/tasktracker"
///
/// [updater]
/// enabled = true
/// owner = "highercomve"
/// repo = "tasktracker"
/// api_base_url = "https://api.github.com"
/// version_scheme = "dotted"  # "dotted" | "semver"
///
/// [updater.network]
/// timeout_seconds = 30
/// connect_timeout_seconds = 10
/// max_retries = 3
/// retry_backoff_ms = 500
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Self-update configuration
    #[serde(default)]
    pub updater: UpdateConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files (unset = stderr only)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    /// Get default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "highercomve", "tasktracker")
            .map(|dirs| dirs.config_dir().join("updater.toml"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write the default configuration to `custom_path` (or the default
    /// location). An existing file is only replaced when `force` is set.
    pub fn write_default(custom_path: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let path = match custom_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoDefaultPath)?,
        };
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path));
        }
        Self::default().save(&path)?;
        Ok(path)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        self.updater.validate().map_err(|e| match e {
            UpdateError::Config(msg) => ConfigError::ValidationError(msg),
            other => ConfigError::ValidationError(other.to_string()),
        })
    }
}
