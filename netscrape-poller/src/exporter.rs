//! Exporter extension point and the catalog of built-in exporters.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::cisco::CiscoExporter;
use crate::config::ScrapeConfig;
use crate::dummy::DummyExporter;
use crate::error::ScrapeError;

/// A named source of metrics.
///
/// `scrape` receives the arguments not consumed by the scrape command line
/// and returns exposition text. Argument problems must be reported as
/// [`ScrapeError::Usage`].
#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scrape(&self, args: &[String]) -> Result<String, ScrapeError>;
}

/// Exporters keyed by name.
#[derive(Clone, Default)]
pub struct ExporterCatalog {
    exporters: BTreeMap<&'static str, Arc<dyn Exporter>>,
}

impl ExporterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in exporter, configured from `config`.
    pub fn builtin(config: &ScrapeConfig) -> Self {
        Self::new()
            .with(Arc::new(CiscoExporter::from_config(&config.cisco)))
            .with(Arc::new(DummyExporter))
    }

    /// Register an exporter, replacing any with the same name.
    pub fn with(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporters.insert(exporter.name(), exporter);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Exporter>> {
        self.exporters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.exporters.keys().copied().collect()
    }

    /// Run the exporter called `name`.
    pub async fn run(&self, name: &str, args: &[String]) -> Result<String, ScrapeError> {
        let exporter = self.get(name).ok_or_else(|| {
            ScrapeError::usage(format!(
                "unknown exporter '{}', available: {}",
                name,
                self.names().join(", ")
            ))
        })?;

        info!(exporter = name, args = ?args, "Running exporter");
        exporter.scrape(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Exporter for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn scrape(&self, _args: &[String]) -> Result<String, ScrapeError> {
            Ok(format!("{}_up 1\n", self.0))
        }
    }

    #[test]
    fn test_builtin_names() {
        let catalog = ExporterCatalog::builtin(&ScrapeConfig::default());
        assert_eq!(catalog.names(), vec!["cisco", "dummy"]);
    }

    #[tokio::test]
    async fn test_run_dispatches_by_name() {
        let catalog = ExporterCatalog::new()
            .with(Arc::new(Fixed("alpha")))
            .with(Arc::new(Fixed("beta")));

        assert_eq!(catalog.run("beta", &[]).await.unwrap(), "beta_up 1\n");
    }

    #[tokio::test]
    async fn test_unknown_exporter_is_usage_error() {
        let catalog = ExporterCatalog::new().with(Arc::new(Fixed("alpha")));

        let err = catalog.run("nope", &[]).await.unwrap_err();

        assert_eq!(err.exit_code(), 255);
        assert_eq!(err.to_string(), "unknown exporter 'nope', available: alpha");
    }
}
