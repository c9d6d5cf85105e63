// Entity cache: latest known state of every tracked body

mod alias;
mod cache;

pub use alias::{derive_aliases, skeleton_alias};
pub use cache::EntityCache;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Position in the capture volume (meters, right-handed, Y up)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build from a raw coordinate list; `None` when fewer than 3 values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y, z, ..] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }
}

/// Orientation quaternion as delivered by the capture system
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub qw: f64,
}

impl Quat {
    pub fn new(qx: f64, qy: f64, qz: f64, qw: f64) -> Self {
        Self { qx, qy, qz, qw }
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [qx, qy, qz, qw, ..] => Some(Self::new(*qx, *qy, *qz, *qw)),
            _ => None,
        }
    }
}

/// Which part of a frame produced the cached sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    MarkerSet,
    Skeleton,
    RigidBody,
}

/// Latest observed state of one physical entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntityState {
    /// Canonical name (first name the entity was observed under)
    pub name: String,

    pub position: Vec3,

    pub rotation: Option<Quat>,

    /// Receipt time of the frame that produced this sample
    pub timestamp: DateTime<Utc>,

    pub valid: bool,

    pub source: EntitySource,

    /// Skeleton id or rigid body id reported by the capture system
    pub source_id: Option<i32>,
}

impl TrackedEntityState {
    /// Time elapsed since this sample was captured
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// True when the sample is valid and younger than `max_age`
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.valid && self.age(now) < max_age
    }
}

/// One write to the cache. Every field of the record is replaced at once.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityUpdate {
    pub position: Vec3,
    pub rotation: Option<Quat>,
    pub timestamp: DateTime<Utc>,
    pub source: EntitySource,
    pub source_id: Option<i32>,
}

impl EntityUpdate {
    pub fn marker_set(position: Vec3, timestamp: DateTime<Utc>) -> Self {
        Self {
            position,
            rotation: None,
            timestamp,
            source: EntitySource::MarkerSet,
            source_id: None,
        }
    }

    pub fn skeleton(
        skeleton_id: i32,
        position: Vec3,
        rotation: Option<Quat>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            position,
            rotation,
            timestamp,
            source: EntitySource::Skeleton,
            source_id: Some(skeleton_id),
        }
    }

    pub fn rigid_body(
        rigid_body_id: i32,
        position: Vec3,
        rotation: Quat,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            position,
            rotation: Some(rotation),
            timestamp,
            source: EntitySource::RigidBody,
            source_id: Some(rigid_body_id),
        }
    }

    pub(crate) fn into_state(self, name: String) -> TrackedEntityState {
        TrackedEntityState {
            name,
            position: self.position,
            rotation: self.rotation,
            timestamp: self.timestamp,
            valid: true,
            source: self.source,
            source_id: self.source_id,
        }
    }
}
