//! Single-command execution with bounded retries and a hard timeout.

use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{AttemptFailure, CommandError};
use crate::shell::RemoteShell;

/// Default number of attempts per command.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default time budget for one attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs commands on devices through a [`RemoteShell`].
///
/// A command is attempted up to `retries` times in total. The first
/// successful attempt wins; when every attempt fails the runner returns
/// [`CommandError::Exhausted`] and never any partial output.
#[derive(Debug)]
pub struct CommandRunner<S> {
    shell: S,
    retries: u32,
    timeout: Duration,
}

impl<S: RemoteShell> CommandRunner<S> {
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the total number of attempts (at least one).
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Set the time budget for a single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Run `command` on `device` and return its standard output.
    pub async fn run(&self, device: &str, command: &str) -> Result<String, CommandError> {
        let mut attempt = 1;

        loop {
            match self.attempt(device, command).await {
                Ok(stdout) => return Ok(stdout),
                Err(last) if attempt >= self.retries => {
                    warn!(
                        device = %device,
                        command = %command,
                        attempts = attempt,
                        error = %last,
                        "Command failed after all attempts"
                    );
                    return Err(CommandError::Exhausted {
                        device: device.to_string(),
                        command: command.to_string(),
                        attempts: attempt,
                        last,
                    });
                }
                Err(e) => {
                    debug!(
                        device = %device,
                        command = %command,
                        attempt,
                        error = %e,
                        "Command attempt failed, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Run `command` and decode its output as a JSON document.
    pub async fn run_json(&self, device: &str, command: &str) -> Result<Value, CommandError> {
        let stdout = self.run(device, command).await?;

        serde_json::from_str(&stdout).map_err(|source| CommandError::Decode {
            device: device.to_string(),
            command: command.to_string(),
            source,
        })
    }

    async fn attempt(&self, device: &str, command: &str) -> Result<String, AttemptFailure> {
        let output = timeout(self.timeout, self.shell.execute(device, command))
            .await
            .map_err(|_| AttemptFailure::Timeout(self.timeout))??;

        if !output.success() {
            return Err(AttemptFailure::ExitStatus {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
