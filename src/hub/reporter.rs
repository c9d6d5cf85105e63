use crate::hub::TrackingHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Periodically log hub stats and connection status
///
/// Runs until the hub stops. An interval of 0 disables the reporter.
pub async fn run_stats_reporter(hub: Arc<TrackingHub>, interval_seconds: u64) {
    if interval_seconds == 0 {
        return;
    }

    let mut ticker = interval(Duration::from_secs(interval_seconds));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !hub.is_running() {
            break;
        }

        let stats = hub.stats();
        let status = hub.connection_status();

        info!(
            fps = %format!("{:.1}", stats.fps),
            total_frames = stats.total_frames,
            entities = stats.cached_entity_count,
            aliases = stats.cached_alias_count,
            last_frame_age_ms = ?stats.last_frame_age_ms,
            marker_queue = stats.marker_queue_len,
            markers_published = stats.markers_published,
            markers_dropped = stats.markers_dropped,
            "Hub stats"
        );

        if !status.ingestion_live {
            warn!(
                server = %hub.config().mocap.server_address,
                "No motion-capture frames received recently"
            );
        }
        if status.degraded {
            warn!("Running in degraded mode, markers are logged but not published");
        }
    }
}
