//! Wiki-Ipsum main entry point
//!
//! This is the command-line interface for the Wiki-Ipsum placeholder text
//! generator. Generated text goes to stdout, diagnostics to stderr.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wiki_ipsum::config::{finalize, load_config, parse_size, Config};
use wiki_ipsum::{Coordinator, StopHandle};

/// Wiki-Ipsum: placeholder text from random Wikipedia summaries
///
/// Fetches random page summaries in parallel, at most at the given rate, and
/// prints their text one per line until the requested length is reached or
/// the process is interrupted.
#[derive(Parser, Debug)]
#[command(name = "wiki-ipsum")]
#[command(version)]
#[command(about = "Placeholder text from random Wikipedia summaries", long_about = None)]
#[command(after_help = "Example:\n  wiki-ipsum --user-agent admin@example.com --lang en --length \"1.5 Kb\"")]
struct Cli {
    /// User-Agent sent to Wikipedia; include a way to contact you
    #[arg(long, value_name = "AGENT")]
    user_agent: Option<String>,

    /// Wikipedia language code, e.g. "en"
    #[arg(long, value_name = "CODE")]
    lang: Option<String>,

    /// Stop after this much text, e.g. "500", "100 bytes", "1.5 Kb", "2 MB"; "" or "0" means unbounded (default)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    length: Option<usize>,

    /// Maximum requests per second, at most 200 (default: 200)
    #[arg(long, value_name = "REQ_PER_SEC", allow_negative_numbers = true)]
    rate: Option<f64>,

    /// Maximum number of requests in flight (default: unbounded)
    #[arg(long, value_name = "N")]
    max_in_flight: Option<usize>,

    /// Path to TOML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also report throttling, timeouts and cancelled requests
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    setup_logging(config.pipeline.verbose);

    tracing::debug!(endpoint = %config.api.endpoint(), "Configuration loaded");

    let coordinator = Coordinator::from_config(&config)?;
    spawn_signal_listener(coordinator.stop_handle());

    coordinator
        .run(tokio::io::stdout())
        .await
        .context("Run failed")?;

    Ok(())
}

/// Merges the optional config file with command-line flags
///
/// Flags win over file values. A missing user agent or language is reported
/// as a usage error and exits the process.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(user_agent) = &cli.user_agent {
        config.api.user_agent = user_agent.clone();
    }
    if let Some(lang) = &cli.lang {
        config.api.lang = lang.clone();
    }
    if let Some(length) = cli.length {
        config.pipeline.target_length = length;
    }
    if let Some(rate) = cli.rate {
        config.pipeline.rate = rate;
    }
    if let Some(max_in_flight) = cli.max_in_flight {
        config.pipeline.max_in_flight = max_in_flight;
    }
    if cli.verbose {
        config.pipeline.verbose = true;
    }

    if config.api.user_agent.trim().is_empty() {
        missing_argument("--user-agent is required, e.g. --user-agent admin@example.com");
    }
    if config.api.lang.is_empty() {
        missing_argument("--lang is required, e.g. --lang en");
    }

    finalize(config).context("Invalid configuration")
}

fn missing_argument(message: &str) -> ! {
    Cli::command()
        .error(clap::error::ErrorKind::MissingRequiredArgument, message)
        .exit()
}

/// Sets up the tracing subscriber on stderr
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn setup_logging(verbose: bool) {
    let default_filter = if verbose {
        "wiki_ipsum=debug"
    } else {
        "wiki_ipsum=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Stops the run on the first SIGINT or SIGTERM
fn spawn_signal_listener(stop: StopHandle) {
    tokio::spawn(async move {
        wait_for_signal().await;
        stop.stop();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, stopping"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C, stopping");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, stopping"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}
