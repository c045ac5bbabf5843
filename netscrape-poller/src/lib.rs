//! Scrape side of netscrape.
//!
//! - [`shell`] / [`runner`] - remote command execution with retries and timeouts
//! - [`poller`] - concurrent fan-out of a command set to many devices
//! - [`cisco`] - NX-OS payload extraction and the cisco exporter
//! - [`exporter`] - the exporter trait and catalog used by `netscrape-scrape`

pub mod cisco;
pub mod config;
pub mod dummy;
pub mod error;
pub mod exporter;
pub mod poller;
pub mod runner;
pub mod shell;

#[cfg(test)]
mod testing;

pub use config::{CiscoConfig, ConfigError, ScrapeConfig};
pub use error::{AttemptFailure, CommandError, EXIT_FAILURE, EXIT_USAGE, ScrapeError};
pub use exporter::{Exporter, ExporterCatalog};
pub use poller::{CommandResult, CommandSpec, DeviceReport, PayloadShape, Poller};
pub use runner::CommandRunner;
pub use shell::{RemoteShell, ShellOutput, SshShell};
