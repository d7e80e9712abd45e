//! Configuration structures for the update system.
//!
//! Defines which release host project is polled, how versions are ordered,
//! and how patient the network layer is.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UpdateError;
use crate::version::VersionScheme;

/// Upper bound accepted for `network.max_retries`.
const MAX_RETRIES_LIMIT: u32 = 10;

/// Main update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Whether the start-up update check runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Owner of the release host project
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Release host project name
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Root of the release API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Executable name used for asset matching and extraction
    /// (defaults to the running executable's file name)
    #[serde(default)]
    pub executable_name: Option<String>,

    /// How release tags are compared with the running version
    #[serde(default)]
    pub version_scheme: VersionScheme,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            owner: default_owner(),
            repo: default_repo(),
            api_base_url: default_api_base_url(),
            executable_name: None,
            version_scheme: VersionScheme::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl UpdateConfig {
    /// Check the values that cannot be expressed in the type.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(UpdateError::Config(
                "owner and repo must not be empty".to_string(),
            ));
        }
        url::Url::parse(&self.api_base_url).map_err(|e| {
            UpdateError::Config(format!("invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;
        if self.network.max_retries > MAX_RETRIES_LIMIT {
            return Err(UpdateError::Config(format!(
                "network.max_retries must be at most {}",
                MAX_RETRIES_LIMIT
            )));
        }
        Ok(())
    }
}

/// Network configuration for metadata requests and downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Read timeout in seconds (longest silence while receiving a response)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Maximum retry attempts after the first request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds, doubled per attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_owner() -> String {
    "highercomve".to_string()
}

fn default_repo() -> String {
    "tasktracker".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("tasktracker-updater/{}", env!("CARGO_PKG_VERSION"))
}
