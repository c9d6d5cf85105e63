// Tracking hub: lifecycle and queries over the tracking components

mod reporter;

pub use reporter::run_stats_reporter;

use crate::broadcast::PositionBroadcaster;
use crate::config::HubConfig;
use crate::entity::{EntityCache, Quat, TrackedEntityState, Vec3};
use crate::health::{ConnectionStatus, HealthMonitor, HubStats};
use crate::ingest::{FrameIngestor, FramePort, FrameStats};
use crate::marker::MarkerPublisher;
use crate::mocap::MocapClient;
use crate::outlet::OutletFactory;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};


/// Position answer for `cached_position`
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PositionReading {
    pub position: Vec3,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
}

impl From<&TrackedEntityState> for PositionReading {
    fn from(state: &TrackedEntityState) -> Self {
        Self {
            position: state.position,
            timestamp: state.timestamp,
            valid: state.valid,
        }
    }
}

/// Position plus orientation for `cached_rigid_body`
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RigidBodyReading {
    pub position: Vec3,
    pub rotation: Quat,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
}

/// Coordinates frame ingestion, the entity cache, marker publishing and
/// position broadcasting.
///
/// Construct one per process and share it via `Arc`.
pub struct TrackingHub {
    config: HubConfig,
    cache: Arc<EntityCache>,
    frames: FrameStats,
    ingestor: Arc<FrameIngestor>,
    broadcaster: Arc<PositionBroadcaster>,
    markers: MarkerPublisher,
    health: HealthMonitor,
    client: Mutex<Option<Box<dyn MocapClient>>>,
    running: AtomicBool,
}

impl TrackingHub {
    pub fn new(config: HubConfig) -> Self {
        let cache = Arc::new(EntityCache::new());
        let frames = FrameStats::new(config.ingest.frame_window_capacity);
        let broadcaster = Arc::new(PositionBroadcaster::new(config.broadcast.enabled));
        let ingestor = Arc::new(FrameIngestor::new(
            Arc::clone(&cache),
            frames.clone(),
            Some(Arc::clone(&broadcaster)),
            config.ingest.log_every_n_frames,
        ));
        let markers = MarkerPublisher::new(config.markers.clone());
        let health = HealthMonitor::new(config.health.clone());

        Self {
            config,
            cache,
            frames,
            ingestor,
            broadcaster,
            markers,
            health,
            client: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Bring up marker publishing, position broadcasting and (optionally)
    /// the motion-capture client. Must be called within a tokio runtime.
    ///
    /// A missing or failing outlet factory puts the hub in degraded mode; a
    /// failing client leaves ingestion reported as not live. Neither is an
    /// error here.
    pub fn start(
        &self,
        outlets: Option<&dyn OutletFactory>,
        client: Option<Box<dyn MocapClient>>,
    ) -> Result<()> {
        tokio::runtime::Handle::try_current()
            .context("TrackingHub::start requires a tokio runtime")?;

        if self.running.swap(true, Ordering::SeqCst) {
            bail!("Tracking hub already started");
        }

        info!(
            server = %self.config.mocap.server_address,
            client = %self.config.mocap.client_address,
            multicast = self.config.mocap.use_multicast,
            "Starting tracking hub"
        );

        self.markers.initialize(outlets);
        self.markers.start();

        if self.broadcaster.is_enabled() {
            match outlets {
                Some(factory) => {
                    if !self.broadcaster.initialize(factory, &self.config.broadcast.subject_ids) {
                        warn!("Some position outlets could not be created, continuing");
                    }
                }
                None => warn!("No pub/sub sink available, position broadcast inactive"),
            }
        }

        let streaming = match client {
            Some(mut client) => {
                let started = match client.start_streaming(self.ingestor.port()) {
                    Ok(()) => {
                        info!("Motion-capture client streaming");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "Motion-capture client failed to start");
                        false
                    }
                };
                *self.client.lock() = Some(client);
                started
            }
            // Frames are fed through `frame_port()` by the caller
            None => true,
        };

        if streaming {
            self.frames.mark_started(Utc::now().timestamp_millis());
        }

        info!(
            degraded = self.markers.is_degraded(),
            position_outlets = self.broadcaster.channel_count(),
            streaming = streaming,
            "Tracking hub started"
        );
        Ok(())
    }

    /// Drain markers (bounded wait), stop the client and close outlets
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping tracking hub");
        self.markers.stop().await;

        let client = self.client.lock().take();
        if let Some(mut client) = client {
            client.shutdown();
        }

        self.broadcaster.clear();
        self.log_run_summary();
        self.frames.mark_stopped();
    }

    fn log_run_summary(&self) {
        let Some(started) = self.frames.started_at_ms() else {
            return;
        };
        let duration_ms = Utc::now().timestamp_millis() - started;
        let total = self.frames.total_frames();
        let avg_fps = if duration_ms > 0 {
            total as f64 * 1000.0 / duration_ms as f64
        } else {
            0.0
        };

        info!(
            duration_s = %format!("{:.1}", duration_ms as f64 / 1000.0),
            total_frames = total,
            avg_fps = %format!("{:.1}", avg_fps),
            entities = self.cache.len(),
            markers_published = self.markers.published(),
            markers_dropped = self.markers.dropped(),
            "Tracking hub run summary"
        );
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest valid position under any alias of `name`
    pub fn cached_position(&self, name: &str) -> Option<PositionReading> {
        self.cache
            .get(name)
            .filter(|state| state.valid)
            .map(|state| PositionReading::from(&state))
    }

    /// Latest valid pose of an entity that carries orientation
    pub fn cached_rigid_body(&self, name: &str) -> Option<RigidBodyReading> {
        let state = self.cache.get(name).filter(|state| state.valid)?;
        let rotation = state.rotation?;
        Some(RigidBodyReading {
            position: state.position,
            rotation,
            timestamp: state.timestamp,
            valid: state.valid,
        })
    }

    /// Some valid body position, falling back to rigid bodies
    pub fn any_position(&self) -> Option<PositionReading> {
        self.cache.first_valid().map(|state| PositionReading::from(&state))
    }

    /// Non-blocking; false when the queue is full or the hub is stopped
    pub fn enqueue_marker(&self, code: i32) -> bool {
        self.markers.enqueue(code)
    }

    pub fn enqueue_marker_with_description(
        &self,
        code: i32,
        description: impl Into<String>,
    ) -> bool {
        self.markers.enqueue_with_description(code, description)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_status_at(Utc::now().timestamp_millis())
    }

    pub fn connection_status_at(&self, now_ms: i64) -> ConnectionStatus {
        self.health.connection_status(&self.frames, &self.markers, now_ms)
    }

    pub fn stats(&self) -> HubStats {
        self.stats_at(Utc::now().timestamp_millis())
    }

    pub fn stats_at(&self, now_ms: i64) -> HubStats {
        self.health.stats(&self.frames, &self.cache, &self.markers, now_ms)
    }

    /// Inbound port for an externally driven motion-capture client
    pub fn frame_port(&self) -> FramePort {
        self.ingestor.port()
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn broadcaster(&self) -> &PositionBroadcaster {
        &self.broadcaster
    }

    pub fn markers(&self) -> &MarkerPublisher {
        &self.markers
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}
