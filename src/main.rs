use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use trackhub::config::{load_config, HubConfig};
use trackhub::hub::{run_stats_reporter, TrackingHub};
use trackhub::mocap::{MocapClient, ReplayClient};
use trackhub::outlet::{NatsOutletFactory, OutletFactory};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackhub=info".into()),
        )
        .init();

    info!("Trackhub starting...");

    let config = read_config()?;

    // Pub/sub sink; without it the hub runs in degraded mode
    let outlets = if config.nats.enabled {
        match NatsOutletFactory::connect(config.nats.clone()).await {
            Ok(factory) => Some(factory),
            Err(e) => {
                warn!(error = %e, "NATS unavailable, continuing without a pub/sub sink");
                None
            }
        }
    } else {
        info!("NATS disabled in config");
        None
    };

    let client: Option<Box<dyn MocapClient>> = match &config.mocap.replay_file {
        Some(path) => Some(Box::new(ReplayClient::new(
            path,
            config.mocap.replay_rate_hz,
            config.mocap.loop_playback,
        ))),
        None => {
            warn!(
                server = %config.mocap.server_address,
                "No motion-capture client configured, waiting for frames on the frame port"
            );
            None
        }
    };

    let report_interval = config.stats.report_interval_seconds;
    let hub = Arc::new(TrackingHub::new(config));
    hub.start(outlets.as_ref().map(|f| f as &dyn OutletFactory), client)?;

    let reporter = tokio::spawn(run_stats_reporter(Arc::clone(&hub), report_interval));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    hub.stop().await;
    reporter.abort();

    info!("Trackhub stopped");
    Ok(())
}

/// `TRACKHUB_CONFIG`, else the first argument, else `trackhub.toml` if present
fn read_config() -> Result<HubConfig> {
    let explicit = std::env::var("TRACKHUB_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .map(PathBuf::from);

    match explicit {
        Some(path) => {
            let config = load_config(&path)?;
            info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        None => {
            let default_path = PathBuf::from("trackhub.toml");
            if default_path.exists() {
                let config = load_config(&default_path)?;
                info!(path = %default_path.display(), "Loaded config");
                Ok(config)
            } else {
                info!("No config file found, using defaults");
                Ok(HubConfig::default())
            }
        }
    }
}
