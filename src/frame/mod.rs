// Decoded motion-capture frame model and per-group position extraction

mod extract;

pub use extract::{
    resolve_marker_set, resolve_skeleton, select_root_joint, ResolvedGroup, SkipReason,
};

use serde::{Deserialize, Serialize};


/// One decoded frame as handed over by the motion-capture client.
///
/// Positions are kept as raw coordinate lists because the client delivers
/// untyped data; entries with fewer than 3 coordinates are skipped during
/// extraction rather than rejected at decode time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameSample {
    /// Frame number reported by the capture server
    #[serde(default)]
    pub frame_number: Option<u64>,

    #[serde(default)]
    pub marker_sets: Vec<MarkerSetGroup>,

    #[serde(default)]
    pub skeletons: Vec<SkeletonGroup>,
}

/// Named group of individually tracked markers (e.g. "Sub001")
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarkerSetGroup {
    #[serde(default)]
    pub name: Option<String>,

    /// Raw marker positions; `None` for dropped entries
    #[serde(default)]
    pub positions: Vec<Option<Vec<f64>>>,
}

/// Skeleton with its joint list
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SkeletonGroup {
    /// Missing ids skip only this skeleton, not the frame
    #[serde(default)]
    pub id: Option<i32>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub joints: Vec<Joint>,
}

/// Skeleton segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Joint {
    #[serde(default)]
    pub id: i32,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub position: Vec<f64>,

    #[serde(default)]
    pub rotation: Option<Vec<f64>>,

    #[serde(default = "default_tracked")]
    pub tracked: bool,
}

fn default_tracked() -> bool {
    true
}

/// Lightweight per-body callback payload
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBodySample {
    pub id: i32,
    pub position: [f64; 3],
    pub rotation: [f64; 4],
}

impl RigidBodySample {
    /// Cache key for a rigid body id
    pub fn entity_name(&self) -> String {
        format!("RigidBody_{}", self.id)
    }
}
