// Frame ingestion: decoded frames -> entity cache (+ position broadcast)

mod stats;

pub use stats::FrameStats;

use crate::broadcast::PositionBroadcaster;
use crate::entity::{EntityCache, EntitySource, EntityUpdate, Quat, Vec3};
use crate::frame::{
    resolve_marker_set, resolve_skeleton, FrameSample, ResolvedGroup, RigidBodySample, SkipReason,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};


/// Frames between summary log lines
const SUMMARY_EVERY_N_FRAMES: u64 = 100;

/// Outcome of one frame, mostly useful for tests and debug logging
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSummary {
    pub frame_count: u64,
    /// Groups written to the cache
    pub updated: usize,
    /// Groups skipped (catch-all, empty, malformed)
    pub skipped: usize,
    /// Position samples handed to the broadcaster
    pub broadcast: usize,
}

/// Extracts entity positions from frames and writes them to the cache.
///
/// Runs on the motion-capture client's delivery thread: no blocking, no
/// errors returned. A bad group is logged and skipped without affecting the
/// rest of the frame.
pub struct FrameIngestor {
    cache: Arc<EntityCache>,

    stats: FrameStats,

    /// Present only when position broadcasting is enabled
    broadcaster: Option<Arc<PositionBroadcaster>>,

    log_every_n_frames: u64,
}

impl FrameIngestor {
    pub fn new(
        cache: Arc<EntityCache>,
        stats: FrameStats,
        broadcaster: Option<Arc<PositionBroadcaster>>,
        log_every_n_frames: u64,
    ) -> Self {
        let broadcaster = broadcaster.filter(|b| b.is_enabled());
        Self {
            cache,
            stats,
            broadcaster,
            log_every_n_frames: log_every_n_frames.max(1),
        }
    }

    /// Inbound port handed to the motion-capture client
    pub fn port(self: &Arc<Self>) -> FramePort {
        FramePort {
            ingestor: Arc::clone(self),
        }
    }

    pub fn handle_frame(&self, frame: &FrameSample) -> FrameSummary {
        self.handle_frame_at(frame, Utc::now())
    }

    /// Process one frame received at `now`
    pub fn handle_frame_at(&self, frame: &FrameSample, now: DateTime<Utc>) -> FrameSummary {
        let frame_count = self.stats.record_frame(now.timestamp_millis());
        let verbose = self.is_verbose_frame(frame_count);

        let mut summary = FrameSummary {
            frame_count,
            ..FrameSummary::default()
        };

        for group in &frame.marker_sets {
            let resolved = resolve_marker_set(group, now);
            self.apply(resolved, verbose, &mut summary);
        }

        if verbose && !frame.skeletons.is_empty() {
            debug!(skeletons = frame.skeletons.len(), "Skeletons in frame");
        }
        for skeleton in &frame.skeletons {
            let resolved = resolve_skeleton(skeleton, now);
            self.apply(resolved, verbose, &mut summary);
        }

        if frame_count % SUMMARY_EVERY_N_FRAMES == 0 {
            self.log_summary(frame_count, now);
        }

        summary
    }

    /// First frame and every Nth after it get per-entity debug lines
    fn is_verbose_frame(&self, frame_count: u64) -> bool {
        frame_count.saturating_sub(1) % self.log_every_n_frames == 0
    }

    fn apply(
        &self,
        resolved: Result<ResolvedGroup, SkipReason>,
        verbose: bool,
        summary: &mut FrameSummary,
    ) {
        let group = match resolved {
            Ok(group) => group,
            Err(reason) => {
                summary.skipped += 1;
                if reason.is_routine() {
                    debug!(reason = %reason, "Group skipped");
                } else {
                    warn!(reason = %reason, "Group skipped");
                }
                return;
            }
        };

        let position = group.update.position;
        let source = group.update.source;
        self.cache.upsert_aliases(&group.name, &group.aliases, group.update);
        summary.updated += 1;

        // Position streams carry marker-set centroids only
        if source == EntitySource::MarkerSet {
            if let Some(broadcaster) = &self.broadcaster {
                if broadcaster.has_channel(&group.name)
                    && broadcaster.publish(&group.name, position)
                {
                    summary.broadcast += 1;
                }
            }
        }

        if verbose {
            debug!(
                entity = %group.name,
                x = position.x,
                y = position.y,
                z = position.z,
                contributors = group.contributors,
                aliases = ?group.aliases,
                "Entity position updated"
            );
        }
    }

    pub fn handle_rigid_body(&self, sample: &RigidBodySample) {
        self.handle_rigid_body_at(sample, Utc::now())
    }

    /// Per-body callback: cache `RigidBody_<id>` with its orientation
    pub fn handle_rigid_body_at(&self, sample: &RigidBodySample, now: DateTime<Utc>) {
        let [x, y, z] = sample.position;
        let [qx, qy, qz, qw] = sample.rotation;
        let update = EntityUpdate::rigid_body(
            sample.id,
            Vec3::new(x, y, z),
            Quat::new(qx, qy, qz, qw),
            now,
        );
        let name = sample.entity_name();
        self.cache.upsert_aliases(&name, &[], update);
    }

    fn log_summary(&self, frame_count: u64, now: DateTime<Utc>) {
        let fps = match self.stats.started_at_ms() {
            Some(start) if now.timestamp_millis() > start => {
                frame_count as f64 * 1000.0 / (now.timestamp_millis() - start) as f64
            }
            _ => 0.0,
        };
        info!(
            frames = frame_count,
            fps = %format!("{:.1}", fps),
            cached = ?self.cache.names(),
            "Ingestion progress"
        );
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }
}

/// Handle through which a motion-capture client delivers data.
///
/// Cheap to clone; calls run synchronously on the caller's thread.
#[derive(Clone)]
pub struct FramePort {
    ingestor: Arc<FrameIngestor>,
}

impl FramePort {
    /// Full-frame callback
    pub fn deliver_frame(&self, frame: &FrameSample) {
        self.ingestor.handle_frame(frame);
    }

    /// Per-body callback `(id, position, rotation)`
    pub fn deliver_rigid_body(&self, id: i32, position: [f64; 3], rotation: [f64; 4]) {
        self.ingestor.handle_rigid_body(&RigidBodySample {
            id,
            position,
            rotation,
        });
    }
}
