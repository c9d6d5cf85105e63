// Per-subject position streams fed by frame ingestion

use crate::entity::Vec3;
use crate::outlet::{Outlet, OutletFactory, Sample, StreamInfo};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Re-broadcasts cached positions as one 3-channel stream per subject.
///
/// Broadcasting is a side channel: publish failures are logged and counted,
/// never propagated, and caching never depends on it.
pub struct PositionBroadcaster {
    enabled: bool,

    /// Entity name ("Sub001") -> position outlet
    outlets: DashMap<String, Arc<dyn Outlet>>,

    failures: AtomicU64,
}

impl PositionBroadcaster {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            outlets: DashMap::new(),
            failures: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create one outlet per subject id ("001" -> `Sub001_Position`).
    ///
    /// A failure for one subject is logged and the rest are still created.
    /// Returns true only if every requested outlet exists afterwards.
    pub fn initialize(&self, factory: &dyn OutletFactory, subject_ids: &[String]) -> bool {
        if !self.enabled {
            info!("Position broadcast disabled, skipping outlet creation");
            return true;
        }

        let mut all_created = true;
        for subject_id in subject_ids {
            let info = StreamInfo::subject_position(subject_id);
            let stream = info.name.clone();
            match factory.create_outlet(info) {
                Ok(outlet) => {
                    self.outlets.insert(format!("Sub{}", subject_id), outlet);
                    info!(stream = %stream, "Position outlet created");
                }
                Err(e) => {
                    all_created = false;
                    error!(stream = %stream, error = %e, "Position outlet creation failed");
                }
            }
        }

        info!(
            outlets = self.outlets.len(),
            requested = subject_ids.len(),
            "Position broadcast initialized"
        );
        all_created
    }

    pub fn has_channel(&self, subject: &str) -> bool {
        self.outlets.contains_key(subject)
    }

    /// Push one position sample for `subject` ("Sub001").
    ///
    /// Fire-and-forget: returns whether the sample was handed to the outlet.
    pub fn publish(&self, subject: &str, position: Vec3) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(outlet) = self.outlets.get(subject).map(|o| Arc::clone(o.value())) else {
            return false;
        };

        let sample = Sample::Float32(vec![
            position.x as f32,
            position.y as f32,
            position.z as f32,
        ]);
        match outlet.push(sample) {
            Ok(()) => true,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(subject = %subject, error = %e, "Position push failed");
                false
            }
        }
    }

    pub fn publish_xyz(&self, subject: &str, x: f64, y: f64, z: f64) -> bool {
        self.publish(subject, Vec3::new(x, y, z))
    }

    pub fn channel_count(&self) -> usize {
        self.outlets.len()
    }

    /// Failed pushes since start
    pub fn publish_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Drop every outlet
    pub fn clear(&self) {
        let count = self.outlets.len();
        self.outlets.clear();
        if count > 0 {
            info!(outlets = count, "Position outlets closed");
        }
    }
}
