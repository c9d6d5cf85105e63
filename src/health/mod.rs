// Connection status and run statistics, derived on demand from counters

use crate::entity::EntityCache;
use crate::ingest::FrameStats;
use crate::marker::MarkerPublisher;
use serde::{Deserialize, Serialize};

/// Health thresholds
#[derive(Clone, Debug, Deserialize)]
pub struct HealthConfig {
    /// Ingestion is live if the last frame arrived within this window
    #[serde(default = "default_liveness_window_ms")]
    pub liveness_window_ms: i64,
    /// Before the first frame, ingestion counts as live for this long after start
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: i64,
    /// Receipt window used for the frame rate
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: i64,
}

fn default_liveness_window_ms() -> i64 {
    3000
}

fn default_startup_grace_ms() -> i64 {
    10_000
}

fn default_rate_window_ms() -> i64 {
    5000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            liveness_window_ms: default_liveness_window_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            rate_window_ms: default_rate_window_ms(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Frames are arriving (or the client only just started)
    pub ingestion_live: bool,
    /// The marker sink exists and is usable
    pub publish_live: bool,
    pub degraded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HubStats {
    pub fps: f64,
    pub total_frames: u64,
    /// Distinct physical entities
    pub cached_entity_count: usize,
    /// Every name the cache answers to
    pub cached_alias_count: usize,
    pub last_frame_age_ms: Option<i64>,
    pub marker_queue_len: usize,
    pub marker_worker_running: bool,
    pub markers_dropped: u64,
    pub markers_published: u64,
}

pub struct HealthMonitor {
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Last frame within the liveness window, or no frame yet but started
    /// within the grace period.
    pub fn ingestion_live(&self, frames: &FrameStats, now_ms: i64) -> bool {
        if let Some(last) = frames.last_receipt_ms() {
            if now_ms - last < self.config.liveness_window_ms {
                return true;
            }
        }

        if frames.total_frames() == 0 {
            if let Some(started) = frames.started_at_ms() {
                return now_ms - started < self.config.startup_grace_ms;
            }
        }

        false
    }

    pub fn connection_status(
        &self,
        frames: &FrameStats,
        markers: &MarkerPublisher,
        now_ms: i64,
    ) -> ConnectionStatus {
        let degraded = markers.is_degraded();
        ConnectionStatus {
            ingestion_live: self.ingestion_live(frames, now_ms),
            publish_live: !degraded && markers.has_outlet(),
            degraded,
        }
    }

    pub fn frame_rate(&self, frames: &FrameStats, now_ms: i64) -> f64 {
        frames.frame_rate(now_ms, self.config.rate_window_ms)
    }

    pub fn stats(
        &self,
        frames: &FrameStats,
        cache: &EntityCache,
        markers: &MarkerPublisher,
        now_ms: i64,
    ) -> HubStats {
        HubStats {
            fps: self.frame_rate(frames, now_ms),
            total_frames: frames.total_frames(),
            cached_entity_count: cache.len(),
            cached_alias_count: cache.alias_count(),
            last_frame_age_ms: frames.last_receipt_ms().map(|last| now_ms - last),
            marker_queue_len: markers.queue_len(),
            marker_worker_running: markers.is_running(),
            markers_dropped: markers.dropped(),
            markers_published: markers.published(),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
