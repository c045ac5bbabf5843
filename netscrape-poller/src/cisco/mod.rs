//! Cisco NX-OS switch exporter.
//!
//! Polls every target over the remote shell, extracts each reachable
//! device's payloads and renders the combined registry.

pub mod extract;
pub mod metrics;
pub mod symbols;

use async_trait::async_trait;
use clap::Parser;
use tracing::{info, warn};

use netscrape_common::Registry;

use crate::config::CiscoConfig;
use crate::error::ScrapeError;
use crate::exporter::Exporter;
use crate::poller::{CommandSpec, PayloadShape, Poller};
use crate::runner::CommandRunner;
use crate::shell::{RemoteShell, SshShell};

pub use extract::{Extractor, FieldGap, extract_device};

/// Commands sent to every switch, in polling order.
pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new(
            "system_resources",
            "show system resources | json",
            PayloadShape::SystemResources,
        ),
        CommandSpec::new("interfaces", "show interface | json", PayloadShape::Interfaces),
        CommandSpec::new(
            "interface_counters",
            "show interface counters detailed | json",
            PayloadShape::InterfaceCounters,
        ),
        CommandSpec::new(
            "bgp_summary",
            "show bgp all summary | json",
            PayloadShape::BgpSummary,
        ),
    ]
}

/// Arguments accepted by the cisco exporter.
#[derive(Parser, Debug)]
#[command(name = "cisco", no_binary_name = true)]
#[command(about = "Collects metrics from Cisco switches")]
struct CiscoArgs {
    /// Specify target, otherwise all configured switches.
    #[arg(long, value_name = "TARGET")]
    target: Option<String>,
}

pub struct CiscoExporter<S: RemoteShell = SshShell> {
    poller: Poller<S>,
    default_targets: Vec<String>,
}

impl CiscoExporter<SshShell> {
    pub fn from_config(config: &CiscoConfig) -> Self {
        Self::with_shell(SshShell::from_config(config), config)
    }
}

impl<S: RemoteShell> CiscoExporter<S> {
    pub fn with_shell(shell: S, config: &CiscoConfig) -> Self {
        let runner = CommandRunner::new(shell)
            .with_retries(config.retries)
            .with_timeout(config.command_timeout());
        let poller =
            Poller::new(runner, commands()).with_max_concurrent(config.max_concurrent_devices);

        Self {
            poller,
            default_targets: config.default_targets.clone(),
        }
    }

    /// Devices selected by `args`.
    pub fn targets(&self, args: &[String]) -> Result<Vec<String>, ScrapeError> {
        let parsed =
            CiscoArgs::try_parse_from(args).map_err(|e| ScrapeError::usage(e.to_string()))?;

        Ok(match parsed.target {
            Some(target) => vec![target],
            None => self.default_targets.clone(),
        })
    }

    /// Poll `targets` and extract every reachable device.
    ///
    /// Unreachable devices are skipped; the scrape only fails when none
    /// of them answered.
    pub async fn collect(&self, targets: &[String]) -> Result<Registry, ScrapeError> {
        let mut registry = metrics::registry()?;
        let reports = self.poller.poll_all(targets).await;

        let mut failures = Vec::new();
        for report in reports {
            match report.outcome {
                Ok(results) => extract_device(&mut registry, &report.device, &results)?,
                Err(e) => failures.push(e),
            }
        }

        if !targets.is_empty() && failures.len() == targets.len() {
            return Err(ScrapeError::AllTargetsFailed(failures));
        }
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                targets = targets.len(),
                "Some targets were skipped"
            );
        }

        info!(series = registry.series_count(), "Cisco scrape complete");
        Ok(registry)
    }
}

#[async_trait]
impl<S: RemoteShell> Exporter for CiscoExporter<S> {
    fn name(&self) -> &'static str {
        "cisco"
    }

    async fn scrape(&self, args: &[String]) -> Result<String, ScrapeError> {
        let targets = self.targets(args)?;
        let registry = self.collect(&targets).await?;
        Ok(registry.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedShell, Step};

    fn config(targets: &[&str]) -> CiscoConfig {
        CiscoConfig {
            default_targets: targets.iter().map(|t| t.to_string()).collect(),
            retries: 1,
            ..CiscoConfig::default()
        }
    }

    fn healthy(shell: ScriptedShell, device: &str) -> ScriptedShell {
        shell
            .reply(
                device,
                "show system resources | json",
                r#"{"memory_usage_used": "1024"}"#,
            )
            .reply(
                device,
                "show interface | json",
                r#"{"TABLE_interface": {"ROW_interface": {"interface": "Ethernet1/1", "state": "up", "eth_bw": 1000}}}"#,
            )
            .reply(device, "show interface counters detailed | json", "{}")
            .reply(device, "show bgp all summary | json", "{}")
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_targets_default_and_override() {
        let exporter = CiscoExporter::with_shell(ScriptedShell::new(), &config(&["a", "b"]));

        assert_eq!(exporter.targets(&[]).unwrap(), vec!["a", "b"]);
        assert_eq!(
            exporter.targets(&args(&["--target", "rack-sw01"])).unwrap(),
            vec!["rack-sw01"]
        );
    }

    #[test]
    fn test_unknown_argument_is_usage_error() {
        let exporter = CiscoExporter::with_shell(ScriptedShell::new(), &config(&["a"]));

        let err = exporter.targets(&args(&["--bogus", "1"])).unwrap_err();
        assert_eq!(err.exit_code(), 255);
    }

    #[tokio::test]
    async fn test_scrape_renders_reachable_devices() {
        let shell = healthy(ScriptedShell::new(), "sw01")
            .steps("sw02", "show system resources | json", vec![Step::exit(255, "no route")]);
        let exporter = CiscoExporter::with_shell(shell, &config(&["sw01", "sw02"]));

        let text = exporter.scrape(&[]).await.unwrap();

        assert!(text.contains("cisco_memory_usage_used{instance=\"sw01\"} 1024\n"));
        assert!(text.contains(
            "cisco_eth_bw{instance=\"sw01\",interface=\"Ethernet1/1\",hwaddr=\"unknown\",description=\"unknown\"} 1000\n"
        ));
        assert!(!text.contains("sw02"));
    }

    #[tokio::test]
    async fn test_all_targets_failing_fails_the_scrape() {
        let shell = ScriptedShell::new();
        let exporter = CiscoExporter::with_shell(shell, &config(&["sw01", "sw02"]));

        let err = exporter.scrape(&[]).await.unwrap_err();

        match err {
            ScrapeError::AllTargetsFailed(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
