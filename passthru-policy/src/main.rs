//! passthru-policyd - Main entry point
//!
//! Hosts the passthrough policy behind a line-oriented JSON protocol on
//! stdin/stdout and logs every policy event.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use passthru_common::config::LoggingConfig;
use passthru_common::{EventBus, PassthroughEvent};
use passthru_policy::command::{dispatch, parse_command, Response};
use passthru_policy::config::{Config, ConfigOverrides};
use passthru_policy::PassthroughPolicy;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for passthru-policyd
#[derive(Parser, Debug)]
#[command(name = "passthru-policyd")]
#[command(about = "Digital audio passthrough negotiation policy")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PASSTHRU_CONFIG")]
    config: Option<PathBuf>,

    /// Persistent settings file (overrides the config file)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level (overrides the config file; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            settings_path: args.settings,
            log_level: args.log_level,
        },
    )
    .context("Failed to load configuration")?;

    init_tracing(&config.toml.logging)?;
    info!("Starting passthru-policyd");

    let settings = config
        .open_settings()
        .context("Failed to open settings store")?;
    let backend = Arc::new(config.build_backend());
    let events = EventBus::new(config.toml.event_capacity);

    let policy = PassthroughPolicy::new(
        settings,
        backend,
        config.toml.keys.clone(),
        events.clone(),
    );

    let event_logger = tokio::spawn(log_events(events.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_command(&line) {
            Ok(command) => dispatch(&policy, command),
            Err(e) => {
                warn!("Ignoring command {:?}: {}", line, e);
                Response::Error {
                    message: e.to_string(),
                }
            }
        };

        let mut out = serde_json::to_string(&response).context("Failed to encode response")?;
        out.push('\n');
        stdout
            .write_all(out.as_bytes())
            .await
            .context("Failed to write response")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    info!("Input closed, shutting down");

    // Closing every sender lets the logger drain what is buffered and stop
    drop(policy);
    drop(events);
    match event_logger.await {
        Ok(logged) => info!("Event logger stopped after {} events", logged),
        Err(e) => warn!("Event logger task failed: {}", e),
    }
    Ok(())
}

/// Initialize tracing from the logging config
///
/// RUST_LOG takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "passthru_common={0},passthru_policy={0},passthru_policyd={0}",
            logging.level
        )
        .into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = logging
        .file
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

/// Log every policy event until the bus closes
///
/// Returns the number of events logged.
async fn log_events(mut rx: broadcast::Receiver<PassthroughEvent>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    info!(event = event.event_type(), "{}", json);
                    logged += 1;
                }
                Err(e) => error!("Failed to encode event {}: {}", event.event_type(), e),
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
