use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use netscrape_common::init_tracing;
use netscrape_poller::{EXIT_FAILURE, EXIT_USAGE, ExporterCatalog, ScrapeConfig, ScrapeError};

/// Run one exporter and write its metrics as exposition text.
#[derive(Parser, Debug)]
#[command(name = "netscrape-scrape", version)]
#[command(about = "Run one exporter and write its metrics to a file", long_about = None)]
struct Args {
    /// Exporter to run (e.g. "cisco").
    #[arg(long)]
    exporter: String,

    /// File receiving the exposition text on success.
    #[arg(long)]
    output_filename: PathBuf,

    /// Path to the configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Arguments passed through to the exporter.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    exporter_args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage errors go to stdout, where the server reads 404 bodies.
            print!("{}", e);
            return ExitCode::from(parse_failure_code(&e));
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ScrapeError>() {
            Some(usage @ ScrapeError::Usage(_)) => {
                println!("{}", usage);
                ExitCode::from(EXIT_USAGE)
            }
            Some(scrape) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(scrape.exit_code())
            }
            None => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ScrapeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ScrapeConfig::default(),
    };

    init_tracing(&config.logging.with_level_override(args.log_level.as_deref()))
        .context("Failed to initialize tracing")?;

    tracing::debug!(
        exporter = %args.exporter,
        output = ?args.output_filename,
        "Starting netscrape-scrape"
    );

    let catalog = ExporterCatalog::builtin(&config);
    let text = catalog.run(&args.exporter, &args.exporter_args).await?;

    write_output(&args.output_filename, &text)
        .await
        .with_context(|| format!("Failed to write {:?}", args.output_filename))?;

    tracing::info!(output = ?args.output_filename, "Metrics written");

    Ok(())
}

/// Exit code for a rejected command line; help and version exit cleanly.
fn parse_failure_code(e: &clap::Error) -> u8 {
    if e.use_stderr() { EXIT_USAGE } else { 0 }
}

async fn write_output(path: &Path, text: &str) -> Result<(), ScrapeError> {
    tokio::fs::write(path, text).await?;
    Ok(())
}
