//! Configuration for the scrape server.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netscrape_common::LoggingConfig;
use netscrape_poller::{CiscoConfig, ScrapeConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] netscrape_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-request scrape settings.
    #[serde(default)]
    pub scrape: ScrapeSettings,

    /// Cisco exporter settings, used by in-process scrapes.
    #[serde(default)]
    pub cisco: CiscoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port to listen on (default: 80).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind (default: "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Runtime worker threads (default: 2).
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_port() -> u16 {
    80
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_workers() -> usize {
    2
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            workers: default_workers(),
        }
    }
}

impl HttpConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid bind address: {}", self.bind)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// How a scrape is isolated from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// Cancellable task inside the server process.
    #[default]
    Task,
    /// Child `netscrape-scrape` process with a file handoff.
    Process,
}

/// Scrape execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    /// Wall-clock budget for one scrape (default: 59).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub isolation: Isolation,

    /// Scrape binary used in process mode.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Config file handed to the scrape binary with `--config`.
    #[serde(default)]
    pub config: Option<String>,
}

fn default_timeout() -> u64 {
    59
}

fn default_binary() -> String {
    "netscrape-scrape".to_string()
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            isolation: Isolation::default(),
            binary: default_binary(),
            config: None,
        }
    }
}

impl ScrapeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ServerConfig = netscrape_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = netscrape_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for scrapes run inside the server.
    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            logging: self.logging.clone(),
            cisco: self.cisco.clone(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.workers == 0 {
            return Err(ConfigError::Validation(
                "http.workers must be > 0".to_string(),
            ));
        }

        self.http.listen_addr()?;

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.scrape.isolation == Isolation::Process && self.scrape.binary.is_empty() {
            return Err(ConfigError::Validation(
                "scrape.binary is required in process isolation".to_string(),
            ));
        }

        self.cisco
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}
