//! idle-manager demo daemon.
//!
//! Reads activity event names from stdin (one per line) and logs every
//! idle/active transition. The lines `hidden` and `visible` flip the
//! visibility flag instead of naming an event.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use idle_manager::{ActivitySender, IdleConfig, IdleManager, IdleState, callback, channel};

/// Idle/active watcher driven by activity events on stdin.
#[derive(Parser, Debug)]
#[command(name = "idle-manager")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inactivity window in milliseconds (overrides config).
    #[arg(long)]
    time_to_idle_ms: Option<u64>,

    /// Event name to ignore (repeatable, appended to config).
    #[arg(long = "ignore")]
    ignored_events: Vec<String>,

    /// State to start in: active or idle.
    #[arg(long, value_parser = parse_state)]
    initial_state: Option<IdleState>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_state(value: &str) -> Result<IdleState, String> {
    match value {
        "active" => Ok(IdleState::Active),
        "idle" => Ok(IdleState::Idle),
        other => Err(format!("unknown state '{other}', expected active or idle")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("idle-manager v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config =
        IdleConfig::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(ms) = args.time_to_idle_ms {
        config.time_to_idle_ms = ms;
    }
    config
        .ignored_events
        .extend(args.ignored_events.iter().map(|name| name.as_str().into()));
    if let Some(state) = args.initial_state {
        config.initial_state = state;
    }

    info!(
        "Watching for inactivity ({}ms window, starting {})",
        config.time_to_idle_ms, config.initial_state
    );

    let (sender, source) = channel();
    let manager = IdleManager::spawn(&config, source);

    manager.on(IdleState::Active, callback(|| info!("user is active")));
    manager.on(IdleState::Idle, callback(|| info!("user is idle")));

    let mut reader = tokio::spawn(read_stdin(sender));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
        _ = &mut reader => info!("stdin closed, shutting down"),
    }

    manager.off();
    Ok(())
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("idle_manager={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Forward stdin lines as activity events until EOF.
async fn read_stdin(sender: ActivitySender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "" => {}
            "hidden" => sender.set_hidden(true),
            "visible" => sender.set_hidden(false),
            name => sender.emit(name),
        }
    }
}
