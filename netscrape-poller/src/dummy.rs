//! Trivial exporter used to exercise the scrape pipeline end to end.

use async_trait::async_trait;

use netscrape_common::{MetricDefinition, Registry};

use crate::error::ScrapeError;
use crate::exporter::Exporter;

#[derive(Debug, Default)]
pub struct DummyExporter;

impl DummyExporter {
    pub fn registry() -> Result<Registry, ScrapeError> {
        let mut registry = Registry::with_definitions([
            MetricDefinition::gauge("dummy_gauge", "A dummy metric, means nothing.", &[]),
            MetricDefinition::counter(
                "dummy_counter",
                "A dummy metric, means nothing.",
                &["dummy_label"],
            ),
        ])?;

        registry.observe("dummy_counter", &["dummy_label_value"], 1.0)?;

        Ok(registry)
    }
}

#[async_trait]
impl Exporter for DummyExporter {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn scrape(&self, args: &[String]) -> Result<String, ScrapeError> {
        if let Some(arg) = args.first() {
            return Err(ScrapeError::usage(format!(
                "dummy exporter takes no arguments, got '{}'",
                arg
            )));
        }

        Ok(Self::registry()?.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_exposition() {
        let text = DummyExporter.scrape(&[]).await.unwrap();

        assert_eq!(
            text,
            "# HELP dummy_gauge A dummy metric, means nothing.\n\
             # TYPE dummy_gauge gauge\n\
             dummy_gauge 0\n\
             # HELP dummy_counter A dummy metric, means nothing.\n\
             # TYPE dummy_counter counter\n\
             dummy_counter{dummy_label=\"dummy_label_value\"} 1\n"
        );
    }

    #[tokio::test]
    async fn test_dummy_rejects_arguments() {
        let err = DummyExporter
            .scrape(&["--target".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 255);
    }
}
