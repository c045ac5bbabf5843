//! Error types for polling and scraping.

use std::time::Duration;

use thiserror::Error;

use netscrape_common::RegistryError;

/// Why a single attempt to run a command failed.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// The remote shell could not be started.
    #[error("failed to start remote shell: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command did not complete within its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The command completed with a non-zero exit status.
    #[error("exit status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },
}

/// Errors raised by the command runner.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Every attempt failed; the device is considered unreachable.
    #[error("{device}: `{command}` failed after {attempts} attempts: {last}")]
    Exhausted {
        device: String,
        command: String,
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },

    /// The command succeeded but its output is not a JSON document.
    #[error("{device}: `{command}` returned invalid JSON: {source}")]
    Decode {
        device: String,
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// The polling task for the device died before settling.
    #[error("{device}: polling task aborted: {reason}")]
    Aborted { device: String, reason: String },
}

impl CommandError {
    /// The device the failing command was sent to.
    pub fn device(&self) -> &str {
        match self {
            Self::Exhausted { device, .. }
            | Self::Decode { device, .. }
            | Self::Aborted { device, .. } => device,
        }
    }
}

/// Errors that end a scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Unknown exporter or unusable arguments.
    #[error("{0}")]
    Usage(String),

    /// No target produced any data.
    #[error("all {} targets failed: {}", .0.len(), join_errors(.0))]
    AllTargetsFailed(Vec<CommandError>),

    /// A sample did not match its metric definition.
    #[error("metric registry misuse: {0}")]
    Registry(#[from] RegistryError),

    /// The exposition text could not be written out.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit code for usage errors (unknown exporter, bad arguments).
pub const EXIT_USAGE: u8 = 255;

/// Exit code for runtime failures.
pub const EXIT_FAILURE: u8 = 1;

impl ScrapeError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Process exit code that reports this error to the orchestrator.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

fn join_errors(errors: &[CommandError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ScrapeError::usage("unknown exporter").exit_code(), 255);
        assert_eq!(ScrapeError::AllTargetsFailed(Vec::new()).exit_code(), 1);
        assert_eq!(
            ScrapeError::Registry(RegistryError::UnknownMetric("x".into())).exit_code(),
            1
        );
    }

    #[test]
    fn test_exhausted_message() {
        let err = CommandError::Exhausted {
            device: "rack-sw01".into(),
            command: "show interface | json".into(),
            attempts: 2,
            last: AttemptFailure::Timeout(Duration::from_secs(15)),
        };

        assert_eq!(err.device(), "rack-sw01");
        assert_eq!(
            err.to_string(),
            "rack-sw01: `show interface | json` failed after 2 attempts: timed out after 15s"
        );
    }
}
