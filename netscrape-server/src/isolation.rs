//! Bounded, killable execution of one scrape.
//!
//! Two strategies share the [`ScrapeRunner`] seam:
//!
//! - [`TaskRunner`] runs the exporter as a tokio task inside the server and
//!   aborts it at the deadline. The exposition text comes back in memory.
//! - [`ProcessRunner`] launches the `netscrape-scrape` binary, kills it at the
//!   deadline and reads its output back from a request-scoped temporary file
//!   that is removed when the request finishes.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use netscrape_poller::ExporterCatalog;

use crate::config::{Isolation, ServerConfig};
use crate::outcome::ScrapeOutcome;

/// Runs one scrape to completion or until its deadline.
#[async_trait]
pub trait ScrapeRunner: Send + Sync {
    async fn run(&self, exporter: &str, args: &[String]) -> ScrapeOutcome;
}

pub type SharedRunner = Arc<dyn ScrapeRunner>;

/// Build the runner selected by `config.scrape.isolation`.
pub fn from_config(config: &ServerConfig) -> SharedRunner {
    let deadline = config.scrape.timeout();

    match config.scrape.isolation {
        Isolation::Task => Arc::new(TaskRunner::new(
            ExporterCatalog::builtin(&config.scrape_config()),
            deadline,
        )),
        Isolation::Process => {
            let mut runner = ProcessRunner::new(&config.scrape.binary, deadline);
            if let Some(path) = &config.scrape.config {
                runner = runner.with_config(path);
            }
            Arc::new(runner)
        }
    }
}

/// In-process scrapes on the server runtime.
pub struct TaskRunner {
    catalog: ExporterCatalog,
    deadline: Duration,
}

impl TaskRunner {
    pub fn new(catalog: ExporterCatalog, deadline: Duration) -> Self {
        Self { catalog, deadline }
    }
}

#[async_trait]
impl ScrapeRunner for TaskRunner {
    async fn run(&self, exporter: &str, args: &[String]) -> ScrapeOutcome {
        let catalog = self.catalog.clone();
        let name = exporter.to_string();
        let args = args.to_vec();

        let handle = tokio::spawn(async move { catalog.run(&name, &args).await });
        let abort = handle.abort_handle();

        match timeout(self.deadline, handle).await {
            Ok(Ok(result)) => ScrapeOutcome::from_result(result),
            Ok(Err(e)) => {
                warn!(exporter, error = %e, "Scrape task failed");
                ScrapeOutcome::crashed(format!("Scrape task failed: {}", e))
            }
            Err(_) => {
                abort.abort();
                warn!(exporter, deadline = ?self.deadline, "Scrape timed out");
                ScrapeOutcome::timed_out()
            }
        }
    }
}

/// Scrapes in a child `netscrape-scrape` process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
    config: Option<PathBuf>,
    deadline: Duration,
}

impl ProcessRunner {
    pub fn new(binary: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            binary: binary.into(),
            config: None,
            deadline,
        }
    }

    /// Config file passed to the child with `--config`.
    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    fn command(&self, exporter: &str, output: &TempPath, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(format!("--exporter={}", exporter))
            .arg("--output-filename")
            .arg(output.as_os_str());
        if let Some(config) = &self.config {
            command.arg("--config").arg(config);
        }
        command
            .arg("--")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ScrapeRunner for ProcessRunner {
    async fn run(&self, exporter: &str, args: &[String]) -> ScrapeOutcome {
        let output = match tempfile::Builder::new().prefix(".metrics_").tempfile() {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                warn!(error = %e, "Failed to create scrape output file");
                return ScrapeOutcome::crashed(format!("Failed to create output file: {}", e));
            }
        };

        let child = match self.command(exporter, &output, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = ?self.binary, error = %e, "Failed to spawn scrape process");
                return ScrapeOutcome::crashed(format!("Failed to spawn {:?}: {}", self.binary, e));
            }
        };
        info!(exporter, pid = child.id(), "Scrape process started");

        // Dropping the future on timeout drops the child, which kills it.
        let mut outcome = match timeout(self.deadline, child.wait_with_output()).await {
            Ok(Ok(finished)) => ScrapeOutcome {
                returncode: finished.status.code(),
                stdout: String::from_utf8_lossy(&finished.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&finished.stderr).into_owned(),
                ..ScrapeOutcome::default()
            },
            Ok(Err(e)) => ScrapeOutcome::crashed(format!("Failed to wait for scrape: {}", e)),
            Err(_) => {
                warn!(exporter, deadline = ?self.deadline, "Scrape process killed");
                ScrapeOutcome::timed_out()
            }
        };

        outcome.metrics_filename = Some(output.display().to_string());
        match tokio::fs::read_to_string(&output).await {
            Ok(metrics) => outcome.metrics = metrics,
            Err(e) => debug!(file = %output.display(), error = %e, "No scrape output"),
        }

        if let Err(e) = output.close() {
            debug!(error = %e, "Failed to remove scrape output file");
        }

        outcome
    }
}
