//! Configuration for the scrape child and its exporters.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netscrape_common::LoggingConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] netscrape_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Root configuration for `netscrape-scrape`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Cisco NX-OS switch exporter.
    #[serde(default)]
    pub cisco: CiscoConfig,
}

/// Cisco exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiscoConfig {
    /// Switches polled when no `--target` is given.
    #[serde(default = "default_targets")]
    pub default_targets: Vec<String>,

    /// Remote login user.
    #[serde(default = "default_user")]
    pub user: String,

    /// Attempts per command before the device counts as unreachable.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Time budget for one attempt, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Maximum number of devices polled at the same time.
    #[serde(default = "default_max_concurrent_devices")]
    pub max_concurrent_devices: usize,

    /// `-o` options passed to ssh.
    #[serde(default = "default_ssh_options")]
    pub ssh_options: Vec<String>,
}

fn default_targets() -> Vec<String> {
    [
        "core-sw01",
        "core-sw02",
        "rack-sw01",
        "rack-sw02",
        "rack-sw03",
        "rack-sw04",
        "rack-sw05",
        "rack-sw06",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_retries() -> u32 {
    2
}

fn default_command_timeout() -> u64 {
    15
}

fn default_max_concurrent_devices() -> usize {
    32
}

fn default_ssh_options() -> Vec<String> {
    vec![
        "BatchMode=yes".to_string(),
        "StrictHostKeyChecking=no".to_string(),
    ]
}

impl Default for CiscoConfig {
    fn default() -> Self {
        Self {
            default_targets: default_targets(),
            user: default_user(),
            retries: default_retries(),
            command_timeout_secs: default_command_timeout(),
            max_concurrent_devices: default_max_concurrent_devices(),
            ssh_options: default_ssh_options(),
        }
    }
}

impl CiscoConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retries == 0 {
            return Err(ConfigError::Validation(
                "cisco.retries must be > 0".to_string(),
            ));
        }

        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "cisco.command_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.max_concurrent_devices == 0 {
            return Err(ConfigError::Validation(
                "cisco.max_concurrent_devices must be > 0".to_string(),
            ));
        }

        if self.user.is_empty() {
            return Err(ConfigError::Validation(
                "cisco.user must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl ScrapeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ScrapeConfig = netscrape_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ScrapeConfig = netscrape_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cisco.validate()
    }
}
