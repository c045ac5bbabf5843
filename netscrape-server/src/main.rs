//! Scrape server for netscrape exporters.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use netscrape_common::init_tracing;
use netscrape_server::{AppState, HttpServer, ServerConfig, ServerMetrics, isolation};

/// Scrape server for netscrape exporters.
#[derive(Parser, Debug)]
#[command(name = "netscrape-server")]
#[command(about = "Serve exporter scrapes over HTTP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP port (overrides config).
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Bind address (overrides config).
    #[arg(long)]
    bind: Option<String>,

    /// Runtime worker threads (overrides config).
    #[arg(long, env = "WORKERS")]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ServerConfig::load_from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        ServerConfig::default()
    };

    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(bind) = args.bind {
        config.http.bind = bind;
    }
    if let Some(workers) = args.workers {
        config.http.workers = workers;
    }
    config.validate()?;

    init_tracing(&config.logging.with_level_override(args.log_level.as_deref()))
        .context("Failed to initialize tracing")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.http.workers)
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let listen_addr = config.http.listen_addr()?;

    info!(
        addr = %listen_addr,
        workers = config.http.workers,
        isolation = ?config.scrape.isolation,
        timeout_secs = config.scrape.timeout_secs,
        "Starting netscrape-server"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = ServerMetrics::spawn().context("Failed to create server metrics")?;
    let state = AppState::new(metrics, isolation::from_config(&config));
    let server = HttpServer::new(state, listen_addr);

    let mut http_task = tokio::spawn(async move { server.run(shutdown_rx).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Err(_) => warn!("HTTP server did not stop in time"),
        _ => {}
    }

    info!("Server stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
