//! Remote command execution channel.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::CiscoConfig;

/// Captured result of one remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Exit code; `None` if the channel was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A channel able to run one command on one device.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the remote command.
#[async_trait]
pub trait RemoteShell: Send + Sync + 'static {
    async fn execute(&self, device: &str, command: &str) -> std::io::Result<ShellOutput>;
}

/// Runs commands through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
    options: Vec<String>,
}

impl SshShell {
    pub fn new(user: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            user: user.into(),
            options,
        }
    }

    pub fn from_config(config: &CiscoConfig) -> Self {
        Self::new(config.user.clone(), config.ssh_options.clone())
    }

    /// Arguments passed to `ssh` for one invocation.
    fn arguments(&self, device: &str, command: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() * 2 + 3);
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("-n".to_string());
        args.push(format!("{}@{}", self.user, device));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn execute(&self, device: &str, command: &str) -> std::io::Result<ShellOutput> {
        let output = Command::new("ssh")
            .args(self.arguments(device, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ShellOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
