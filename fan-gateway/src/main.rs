//! fan-gateway - serves the fanpost HTTP API
//!
//! An external scheduler calls `GET /dispatch` with the cron secret on a
//! fixed interval; users publish, schedule and verify with their API token.

use anyhow::Context;
use clap::Parser;
use libfanpost::platforms::HttpAdapters;
use libfanpost::scheduling::window_too_narrow;
use libfanpost::{logging, Config, Database, FanpostError, Publisher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use fan_gateway::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "fan-gateway")]
#[command(version)]
#[command(about = "Serve the fanpost HTTP API")]
#[command(long_about = "\
fan-gateway - serves the fanpost HTTP API

ROUTES:
    GET  /dispatch   Run one dispatch tick (Bearer <cron secret>)
    POST /publish    Publish a post now (Bearer <API token>)
    POST /schedule   Schedule a post (Bearer <API token>)
    GET  /verify     Check platform connections
    GET  /health     Liveness

CONFIGURATION:
    Configuration file: ~/.config/fanpost/config.toml (or FANPOST_CONFIG)

    [server]
    bind = \"127.0.0.1:8080\"
    cron_secret = \"...\"     # or FANPOST_CRON_SECRET

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Config file (overrides FANPOST_CONFIG and the default location)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides server.bind)
    #[arg(short, long, value_name = "ADDR", env = "FANPOST_BIND")]
    bind: Option<String>,

    /// Interval of the external trigger, checked against dispatch.lookback
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    trigger_interval: Option<Duration>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<FanpostError>()
            .map(FanpostError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let settings = config.dispatch.settings()?;

    if let Some(interval) = cli.trigger_interval {
        if window_too_narrow(settings.lookback, interval) {
            warn!(
                lookback = %humantime::format_duration(settings.lookback),
                trigger_interval = %humantime::format_duration(interval),
                "Lookback window is not wider than the trigger interval; posts may be missed"
            );
        }
    }

    let cron_secret = config.cron_secret();
    if cron_secret.is_none() {
        warn!("No cron secret configured; /dispatch will reject every request");
    }

    let db = Database::new(&config.database_path()).await?;
    let adapters = HttpAdapters::new(config.endpoints.clone())?;
    let publisher = Publisher::new(db, Arc::new(adapters), settings);
    let state = Arc::new(AppState::new(publisher, cron_secret));

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, "fan-gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("fan-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, stopping gracefully"),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await
        }
    }
}
