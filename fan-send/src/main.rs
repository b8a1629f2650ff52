//! fan-send - publishes scheduled posts when they come due
//!
//! Runs one dispatch tick and exits (`--once`, for an external cron), or
//! polls on an interval until SIGINT/SIGTERM.

use anyhow::Context;
use clap::Parser;
use libfanpost::platforms::HttpAdapters;
use libfanpost::scheduling::window_too_narrow;
use libfanpost::{logging, Config, Database, FanpostError, Publisher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fan-send")]
#[command(version)]
#[command(about = "Publish scheduled posts when they come due")]
#[command(long_about = "\
fan-send - publishes scheduled posts when they come due

DESCRIPTION:
    Each tick releases stale publishing claims, selects the scheduled posts
    whose time falls inside the lookback window, and publishes each one to
    every platform it targets. The post's status is rolled up from the
    per-platform results.

USAGE:
    # One tick, JSON report on stdout (for cron)
    fan-send --once

    # Poll every 30 seconds
    fan-send --poll-interval 30s

CONFIGURATION:
    Configuration file: ~/.config/fanpost/config.toml (or FANPOST_CONFIG)

    [dispatch]
    lookback = \"5m\"        # must be wider than the poll interval
    call_timeout = \"20s\"
    max_attempts = 3
    lease_ttl = \"10m\"
    poll_interval = \"60s\"

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Config file (overrides FANPOST_CONFIG and the default location)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// How often to run a tick, e.g. "30s" (overrides dispatch.poll_interval)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once, print the tick report and exit
    #[arg(long)]
    once: bool,
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

    let db = Database::new(&config.database_path()).await?;
    let adapters = HttpAdapters::new(config.endpoints.clone())?;
    let publisher = Publisher::new(db, Arc::new(adapters), settings);

    if cli.once {
        let report = publisher.run_tick(chrono::Utc::now().timestamp()).await?;
        let json = serde_json::to_string_pretty(&report).context("Failed to encode tick report")?;
        println!("{}", json);
        return Ok(());
    }

    let poll_interval = cli.poll_interval.unwrap_or(settings.poll_interval);
    if window_too_narrow(settings.lookback, poll_interval) {
        warn!(
            lookback = %humantime::format_duration(settings.lookback),
            poll_interval = %humantime::format_duration(poll_interval),
            "Lookback window is not wider than the poll interval; posts may be missed"
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!(
        poll_interval = %humantime::format_duration(poll_interval),
        "fan-send starting"
    );
    run_loop(&publisher, poll_interval, shutdown).await;
    info!("fan-send stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

async fn run_loop(publisher: &Publisher, poll_interval: Duration, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping poll loop");
            break;
        }

        match publisher.run_tick(chrono::Utc::now().timestamp()).await {
            Ok(report) if report.processed > 0 => {
                info!(processed = report.processed, "Tick processed posts")
            }
            Ok(_) => {}
            Err(e) => error!("Error processing due posts: {}", e),
        }

        // Sleep until the next tick, checking for shutdown every second
        let mut remaining = poll_interval;
        while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
            let step = remaining.min(Duration::from_secs(1));
            sleep(step).await;
            remaining -= step;
        }
    }
}
