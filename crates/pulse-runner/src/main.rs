//! # pulse-runner
//!
//! Host process for one realtime dashboard session.
//!
//! Loads a JSON configuration file, opens the realtime channel for the
//! configured role, and logs every status change and inbound event together
//! with the data sets a dashboard would re-fetch. Runs until Ctrl+C or until
//! the server reports the account as blocked.
//!
//! # Usage
//!
//! ```bash
//! pulse-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pulse_core::ws::{CLOSE_NORMAL, WsConnector};
use pulse_core::{InboundEvent, RealtimeChannel};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Realtime dashboard update runner.
#[derive(Parser)]
#[command(name = "pulse-runner", about = "Realtime dashboard update runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Bearer token, overriding `realtime.token` in the config.
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = pulse_core::config::load_config(&cli.config, cli.token)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.or_else(|| config.log_path());
    pulse_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!("pulse-runner starting: config={}, role={}", cli.config.display(), config.realtime.role);

    let url = config.realtime.endpoint()?;
    let credential = config.realtime.credential()?;
    let logout_reason = credential.logout_reason();

    // 3. Spawn the channel and wire callbacks
    let channel = RealtimeChannel::spawn(url, config.realtime.reconnect, Arc::new(WsConnector));
    let blocked = Arc::new(Notify::new());

    channel.on_status_change(|state, message| {
        info!("status: {state}: {message}");
    });

    let blocked_tx = Arc::clone(&blocked);
    channel.on_event(move |event: &InboundEvent| {
        log_event(event);
        if event.kind().ends_session() {
            warn!("account blocked by admin: ending session");
            blocked_tx.notify_one();
        }
    });

    channel.connect(credential);
    info!("connecting: press Ctrl+C to stop");

    // 4. Wait for shutdown
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("ctrl-c handler failed: {e}");
            }
            info!("shutdown signal received");
        }
        _ = blocked.notified() => {}
    }

    // 5. Close the session
    channel.close(CLOSE_NORMAL, logout_reason);
    channel.shutdown().await;

    info!("session closed: goodbye");
    Ok(())
}

fn log_event(event: &InboundEvent) {
    let refreshes = event.kind().refreshes();
    let discriminator = event.discriminator().unwrap_or("<none>");
    if refreshes.is_empty() {
        info!("event {discriminator}: {}", event.summary());
    } else {
        let targets: Vec<String> = refreshes.iter().map(ToString::to_string).collect();
        info!("event {discriminator}: {}: refresh [{}]", event.summary(), targets.join(", "));
    }
}
