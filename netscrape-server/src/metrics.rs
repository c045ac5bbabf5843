//! The server's own metrics.
//!
//! A single aggregator task owns the registry. Request handlers send events
//! over a channel and renders are requests on the same channel, so every
//! event enqueued before a render is reflected in it and no update is lost.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use netscrape_common::{MetricDefinition, Registry, RegistryError};

pub const REQUESTS: &str = "server_requests_total";
pub const EXPORTER_REQUESTS: &str = "server_exporter_requests_total";
pub const EXPORTER_SECONDS: &str = "server_exporter_seconds_total";
pub const UPTIME: &str = "server_uptime_seconds_total";

/// Path prefix of exporter scrapes.
pub const EXPORTER_PATH_PREFIX: &str = "/metrics/";

const CHANNEL_CAPACITY: usize = 1000;

/// Something the aggregator counts.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A response was sent.
    Request { status: u16 },
    /// An exporter scrape finished.
    Exporter {
        path: String,
        status: u16,
        elapsed: Duration,
    },
}

impl Event {
    /// Events for one response: always a request count, plus exporter
    /// accounting for exporter paths answered with 200 or a 5xx.
    pub fn for_response(path: &str, status: u16, elapsed: Duration) -> Vec<Event> {
        let mut events = vec![Event::Request { status }];

        if path.starts_with(EXPORTER_PATH_PREFIX) && (status == 200 || status >= 500) {
            events.push(Event::Exporter {
                path: path.to_string(),
                status,
                elapsed,
            });
        }

        events
    }
}

#[derive(Debug, Error)]
#[error("metrics aggregator has stopped")]
pub struct AggregatorStopped;

enum Message {
    Event(Event),
    Render(oneshot::Sender<String>),
}

/// Handle to the aggregator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ServerMetrics {
    tx: mpsc::Sender<Message>,
}

impl ServerMetrics {
    /// Start the aggregator on the current runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn() -> Result<Self, RegistryError> {
        let aggregator = Aggregator::new()?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(aggregator.run(rx));
        Ok(Self { tx })
    }

    pub async fn record(&self, event: Event) {
        if self.tx.send(Message::Event(event)).await.is_err() {
            warn!("Metrics aggregator stopped, event dropped");
        }
    }

    /// Exposition text of the server metrics.
    pub async fn render(&self) -> Result<String, AggregatorStopped> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Message::Render(reply))
            .await
            .map_err(|_| AggregatorStopped)?;
        response.await.map_err(|_| AggregatorStopped)
    }
}

struct Aggregator {
    registry: Registry,
    started: Instant,
    uptime_reported: f64,
}

impl Aggregator {
    fn new() -> Result<Self, RegistryError> {
        let registry = Registry::with_definitions([
            MetricDefinition::counter(REQUESTS, "Total requests made to the server", &["status"]),
            MetricDefinition::counter(
                EXPORTER_REQUESTS,
                "Total requests made to exporters",
                &["path", "status"],
            ),
            MetricDefinition::counter(
                EXPORTER_SECONDS,
                "Total time spent handling exporters",
                &["path"],
            ),
            MetricDefinition::counter(UPTIME, "Server uptime, in seconds", &[]),
        ])?;

        Ok(Self {
            registry,
            started: Instant::now(),
            uptime_reported: 0.0,
        })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Event(event) => {
                    if let Err(e) = self.apply(&event) {
                        warn!(error = %e, event = ?event, "Failed to record server metric");
                    }
                }
                Message::Render(reply) => {
                    let text = self.render();
                    let _ = reply.send(text);
                }
            }
        }

        debug!("Metrics aggregator stopped");
    }

    fn apply(&mut self, event: &Event) -> Result<(), RegistryError> {
        match event {
            Event::Request { status } => {
                self.registry
                    .observe(REQUESTS, &[status.to_string()], 1.0)?;
            }
            Event::Exporter {
                path,
                status,
                elapsed,
            } => {
                self.registry.observe(
                    EXPORTER_REQUESTS,
                    &[path.clone(), status.to_string()],
                    1.0,
                )?;
                self.registry
                    .observe(EXPORTER_SECONDS, &[path.as_str()], elapsed.as_secs_f64())?;
            }
        }
        Ok(())
    }

    fn render(&mut self) -> String {
        let uptime = self.started.elapsed().as_secs_f64();
        let delta = uptime - self.uptime_reported;
        let no_labels: [&str; 0] = [];
        if self.registry.observe(UPTIME, &no_labels, delta).is_ok() {
            self.uptime_reported = uptime;
        }

        self.registry.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_accounting_rules() {
        let elapsed = Duration::from_millis(1500);

        assert_eq!(Event::for_response("/metrics", 200, elapsed).len(), 1);
        assert_eq!(Event::for_response("/metrics/cisco", 200, elapsed).len(), 2);
        assert_eq!(Event::for_response("/metrics/cisco", 404, elapsed).len(), 1);
        assert_eq!(Event::for_response("/metrics/cisco", 500, elapsed).len(), 2);
    }

    #[tokio::test]
    async fn test_render_reflects_every_prior_event() {
        let metrics = ServerMetrics::spawn().unwrap();

        for _ in 0..3 {
            metrics.record(Event::Request { status: 200 }).await;
        }
        metrics.record(Event::Request { status: 404 }).await;
        for event in Event::for_response("/metrics/cisco", 200, Duration::from_millis(250)) {
            metrics.record(event).await;
        }

        let text = metrics.render().await.unwrap();

        assert!(text.contains("server_requests_total{status=\"200\"} 4\n"));
        assert!(text.contains("server_requests_total{status=\"404\"} 1\n"));
        assert!(text.contains(
            "server_exporter_requests_total{path=\"/metrics/cisco\",status=\"200\"} 1\n"
        ));
        assert!(text.contains("server_exporter_seconds_total{path=\"/metrics/cisco\"} 0.25\n"));
        assert!(text.contains("# TYPE server_uptime_seconds_total counter\n"));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let metrics = ServerMetrics::spawn().unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        metrics.record(Event::Request { status: 200 }).await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let text = metrics.render().await.unwrap();
        assert!(text.contains("server_requests_total{status=\"200\"} 1000\n"));
    }

    #[tokio::test]
    async fn test_uptime_grows() {
        let metrics = ServerMetrics::spawn().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let text = metrics.render().await.unwrap();

        let line = text
            .lines()
            .find(|l| l.starts_with("server_uptime_seconds_total "))
            .unwrap();
        let value: f64 = line.rsplit(' ').next().unwrap().parse().unwrap();
        assert!(value >= 0.02);
    }
}
