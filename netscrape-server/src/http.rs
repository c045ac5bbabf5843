//! HTTP routes of the scrape server.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::args::ScrapeRequest;
use crate::isolation::SharedRunner;
use crate::metrics::{Event, ServerMetrics};

/// Content type of exposition text.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    metrics: ServerMetrics,
    runner: SharedRunner,
}

impl AppState {
    pub fn new(metrics: ServerMetrics, runner: SharedRunner) -> Self {
        Self { metrics, runner }
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(server_metrics_handler))
        .route("/metrics/:exporter", get(exporter_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Counts every response in the server metrics.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    for event in Event::for_response(&path, status, started.elapsed()) {
        state.metrics.record(event).await;
    }

    response
}

/// Handler for the /metrics endpoint: the server's own counters.
async fn server_metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render().await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Cannot render server metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for /metrics/:exporter: one bounded scrape.
async fn exporter_handler(
    State(state): State<AppState>,
    Path(exporter): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let request = ScrapeRequest::from_query(&query);
    info!(exporter = %exporter, args = ?request.args, debug = request.debug, "Scrape requested");

    let outcome = state.runner.run(&exporter, &request.args).await;
    let status = outcome.status();
    info!(exporter = %exporter, status = status.as_u16(), "Scrape finished");

    if request.debug {
        (status, Json(outcome)).into_response()
    } else {
        (status, [(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], outcome.into_body()).into_response()
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server.
pub struct HttpServer {
    state: AppState,
    listen_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(state: AppState, listen_addr: SocketAddr) -> Self {
        Self { state, listen_addr }
    }

    /// Bind the listen address and serve until the shutdown signal.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        serve(listener, self.state, shutdown).await
    }
}

/// Serve on an already bound listener until the shutdown signal.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            loop {
                if shutdown.changed().await.is_err() {
                    break;
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    info!("HTTP server stopped");
    Ok(())
}
