//! Concurrent fan-out of a fixed command set to many devices.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::runner::CommandRunner;
use crate::shell::RemoteShell;

/// Default cap on devices polled at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 32;

/// Which payload layout a command produces. Used by the extractor to pick
/// its parser, and ordered the way payloads must be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadShape {
    SystemResources,
    BgpSummary,
    Interfaces,
    InterfaceCounters,
}

/// One command sent to every device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Short name used in labels (e.g. "interfaces").
    pub name: String,
    /// Command text sent over the remote shell.
    pub command: String,
    pub shape: PayloadShape,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, shape: PayloadShape) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            shape,
        }
    }
}

/// Decoded output of one command on one device.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub device: String,
    pub name: String,
    pub shape: PayloadShape,
    pub payload: Value,
    pub elapsed: Duration,
}

/// Outcome of polling one device: every command's result, or the failure
/// that stopped it.
#[derive(Debug)]
pub struct DeviceReport {
    pub device: String,
    pub outcome: Result<Vec<CommandResult>, CommandError>,
}

impl DeviceReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Polls devices concurrently. Commands run in order on each device;
/// a failing device never affects the others.
pub struct Poller<S> {
    runner: Arc<CommandRunner<S>>,
    commands: Arc<[CommandSpec]>,
    max_concurrent: usize,
}

impl<S: RemoteShell> Poller<S> {
    pub fn new(runner: CommandRunner<S>, commands: Vec<CommandSpec>) -> Self {
        Self {
            runner: Arc::new(runner),
            commands: commands.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Cap the number of devices polled at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn runner(&self) -> &CommandRunner<S> {
        &self.runner
    }

    /// Poll every device and wait until all of them settle.
    ///
    /// Reports are returned in the order of `devices`. Dropping the returned
    /// future aborts every device still being polled.
    pub async fn poll_all(&self, devices: &[String]) -> Vec<DeviceReport> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let started = Instant::now();

        let handles: Vec<_> = devices
            .iter()
            .map(|device| {
                let runner = self.runner.clone();
                let commands = self.commands.clone();
                let permits = permits.clone();
                let device = device.clone();

                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    poll_device(&runner, &commands, &device).await
                })
            })
            .collect();
        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        let mut reports = Vec::with_capacity(devices.len());
        for (device, handle) in devices.iter().zip(handles) {
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(CommandError::Aborted {
                    device: device.clone(),
                    reason: e.to_string(),
                })
            });

            if let Err(e) = &outcome {
                warn!(device = %device, error = %e, "Device poll failed");
            }

            reports.push(DeviceReport {
                device: device.clone(),
                outcome,
            });
        }

        info!(
            devices = devices.len(),
            failed = reports.iter().filter(|r| !r.is_ok()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Polling finished"
        );

        reports
    }
}

/// Aborts device tasks still running when a poll is cancelled.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn poll_device<S: RemoteShell>(
    runner: &CommandRunner<S>,
    commands: &[CommandSpec],
    device: &str,
) -> Result<Vec<CommandResult>, CommandError> {
    let mut results = Vec::with_capacity(commands.len());

    for spec in commands {
        let started = Instant::now();
        let payload = runner.run_json(device, &spec.command).await?;
        let elapsed = started.elapsed();

        debug!(
            device = %device,
            command = %spec.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "Command completed"
        );

        results.push(CommandResult {
            device: device.to_string(),
            name: spec.name.clone(),
            shape: spec.shape,
            payload,
            elapsed,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedShell, Step};

    fn commands() -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("first", "show first", PayloadShape::SystemResources),
            CommandSpec::new("second", "show second", PayloadShape::Interfaces),
        ]
    }

    #[tokio::test]
    async fn test_poll_all_collects_every_command() {
        let shell = ScriptedShell::new()
            .reply("sw01", "show first", r#"{"a": 1}"#)
            .reply("sw01", "show second", r#"{"b": 2}"#);
        let poller = Poller::new(CommandRunner::new(shell), commands());

        let reports = poller.poll_all(&["sw01".to_string()]).await;

        assert_eq!(reports.len(), 1);
        let results = reports[0].outcome.as_ref().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "first");
        assert_eq!(results[0].payload["a"], 1);
        assert_eq!(results[1].shape, PayloadShape::Interfaces);
        assert_eq!(results[1].device, "sw01");
    }

    #[tokio::test]
    async fn test_failed_device_is_isolated() {
        let shell = ScriptedShell::new()
            .steps("bad", "show first", vec![Step::exit(255, "unreachable")])
            .reply("good", "show first", "{}")
            .reply("good", "show second", "{}");
        let poller = Poller::new(CommandRunner::new(shell), commands());

        let reports = poller
            .poll_all(&["bad".to_string(), "good".to_string()])
            .await;

        assert_eq!(reports[0].device, "bad");
        assert!(matches!(
            reports[0].outcome,
            Err(CommandError::Exhausted { .. })
        ));
        assert_eq!(reports[1].device, "good");
        assert_eq!(reports[1].outcome.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_stops_at_first_failing_command() {
        let shell = ScriptedShell::new()
            .steps("sw01", "show first", vec![Step::exit(1, "denied")])
            .reply("sw01", "show second", "{}");
        let poller = Poller::new(CommandRunner::new(shell).with_retries(1), commands());

        let reports = poller.poll_all(&["sw01".to_string()]).await;

        assert!(!reports[0].is_ok());
        assert_eq!(poller.runner().shell().call_count("sw01"), 1);
    }

    #[tokio::test]
    async fn test_concurrency_cap_still_polls_everything() {
        let mut shell = ScriptedShell::new();
        let devices: Vec<String> = (0..5).map(|i| format!("sw{i:02}")).collect();
        for device in &devices {
            shell = shell
                .reply(device, "show first", "{}")
                .reply(device, "show second", "{}");
        }
        let poller = Poller::new(CommandRunner::new(shell), commands()).with_max_concurrent(2);

        let reports = poller.poll_all(&devices).await;

        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(DeviceReport::is_ok));
        let names: Vec<_> = reports.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(names, vec!["sw00", "sw01", "sw02", "sw03", "sw04"]);
    }
}
