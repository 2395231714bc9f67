//! Main entry point for the Debate Room service
//!
//! Runs the matchmaking scheduler and debate sessions with in-memory
//! collaborators. Events addressed to participants are written to the log.

use anyhow::{Context, Result};
use clap::Parser;
use debate_room::config::AppConfig;
use debate_room::service::{Collaborators, DebateService, HealthCheck};
use debate_room::storage::InMemoryParticipantDirectory;
use debate_room::transport::LoggingTransport;
use debate_room::types::ParticipantProfile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Debate Room - rating-based matchmaking and timed debate sessions
#[derive(Parser)]
#[command(
    name = "debate-room",
    version,
    about = "Matchmaking and session service for one-on-one timed debates",
    long_about = "Debate Room queues participants by rating, widens the accepted rating gap \
                 the longer they wait, and runs each matched pair through preparation and \
                 alternating timed turns while persisting the transcript."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Participant profiles to seed the in-memory directory with
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "JSON array of participant profiles (id, display_name, rating)"
    )]
    participants: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Require the readiness handshake before preparation
    #[arg(long, help = "Require both participants to signal readiness")]
    require_readiness: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to listen for Ctrl+C") };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        sigterm.recv().await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received SIGINT (Ctrl+C) signal");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM signal");
        },
    }
    Ok(())
}

/// Log a health summary every status interval until cancelled
async fn status_task(service: Arc<DebateService>, stop: CancellationToken) {
    let mut interval = tokio::time::interval(service.config().status_interval());

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }

        let health = HealthCheck::check(&service).await;
        info!(
            "Health check: {} - {} queued, {} active sessions, {} matches created",
            health.status,
            health.stats.queue_size,
            health.stats.active_sessions,
            health.stats.matches_created
        );
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Debate Room Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Rating range: {} (+{} every {}s, max {})",
        config.matchmaking.base_range,
        config.matchmaking.expansion_step,
        config.matchmaking.expansion_interval_seconds,
        config.matchmaking.max_range
    );
    info!(
        "   Readiness handshake: {}",
        config.session.require_readiness
    );
    info!(
        "   Preparation: {}s, turns: {} x {}s",
        config.session.preparation_seconds, config.session.max_turns, config.session.turn_seconds
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if args.require_readiness {
        config.session.require_readiness = true;
    }

    debate_room::config::validate_config(&config)?;
    Ok(config)
}

/// Read participant profiles from a JSON file
fn load_participants(path: &Path) -> Result<Vec<ParticipantProfile>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read participants file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse participants file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    let profiles = match &args.participants {
        Some(path) => load_participants(path)?,
        None => {
            warn!("No participants file given, the directory starts empty");
            Vec::new()
        }
    };
    info!("Loaded {} participant profiles", profiles.len());

    let participants = Arc::new(InMemoryParticipantDirectory::with_profiles(profiles));
    let collaborators = Collaborators::in_memory(participants, Arc::new(LoggingTransport));

    info!("Initializing service components...");
    let mut service = match DebateService::new(config.clone(), collaborators) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = service.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let service = Arc::new(service);
    let stop_status = CancellationToken::new();
    let status_handle = tokio::spawn(status_task(service.clone(), stop_status.clone()));

    info!("✅ Debate Room Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    if let Err(e) = wait_for_shutdown_signal().await {
        error!("Signal handling failed: {}", e);
    }

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    stop_status.cancel();
    if let Err(e) = status_handle.await {
        warn!("Status task ended abnormally: {}", e);
    }

    // The status task is gone, so this is the last reference
    match Arc::try_unwrap(service) {
        Ok(mut service) => {
            if let Err(e) = service.shutdown().await {
                error!("Shutdown failed: {}", e);
            }
        }
        Err(_) => warn!("Service still shared at shutdown, skipping graceful stop"),
    }

    info!("🛑 Debate Room Service stopped");
    Ok(())
}
