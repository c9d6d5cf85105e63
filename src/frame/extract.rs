use crate::entity::{derive_aliases, skeleton_alias, EntityUpdate, Quat, Vec3};
use crate::frame::{Joint, MarkerSetGroup, SkeletonGroup};
use chrono::{DateTime, Utc};
use std::fmt;

/// SDK aggregate group containing every labeled marker
const CATCH_ALL_GROUP: &str = "all";

/// A group whose representative position could be computed
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGroup {
    /// Canonical entity name
    pub name: String,

    /// Every key the sample is cached under (includes `name`)
    pub aliases: Vec<String>,

    pub update: EntityUpdate,

    /// Markers (marker sets) or joints (skeletons) that contributed
    pub contributors: usize,
}

/// Why a group produced no cache update for this frame
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// The SDK's "all" aggregate
    CatchAllGroup,
    MissingName,
    /// Skeleton without an id
    MissingSkeletonId { name: Option<String> },
    /// Every marker position was null or had fewer than 3 coordinates
    NoValidMarkers { name: String },
    NoJoints { skeleton_id: i32 },
    /// Selected root joint had fewer than 3 coordinates
    MalformedJoint { skeleton_id: i32, joint: String },
}

impl SkipReason {
    /// Expected every frame, not worth a warning
    pub fn is_routine(&self) -> bool {
        matches!(self, SkipReason::CatchAllGroup | SkipReason::NoValidMarkers { .. })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CatchAllGroup => write!(f, "catch-all marker group"),
            SkipReason::MissingName => write!(f, "marker set has no name"),
            SkipReason::MissingSkeletonId { name } => write!(
                f,
                "skeleton '{}' has no id",
                name.as_deref().unwrap_or("<unnamed>")
            ),
            SkipReason::NoValidMarkers { name } => {
                write!(f, "marker set '{}' has no valid marker positions", name)
            }
            SkipReason::NoJoints { skeleton_id } => {
                write!(f, "skeleton {} has no joints", skeleton_id)
            }
            SkipReason::MalformedJoint { skeleton_id, joint } => write!(
                f,
                "skeleton {} root joint '{}' has fewer than 3 coordinates",
                skeleton_id, joint
            ),
        }
    }
}

/// Centroid of a marker set's valid positions.
///
/// Occluded markers are simply left out, so a sparse set's centroid can
/// drift from the true body center.
pub fn resolve_marker_set(
    group: &MarkerSetGroup,
    timestamp: DateTime<Utc>,
) -> Result<ResolvedGroup, SkipReason> {
    let name = match group.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(SkipReason::MissingName),
    };

    if name.eq_ignore_ascii_case(CATCH_ALL_GROUP) {
        return Err(SkipReason::CatchAllGroup);
    }

    let valid: Vec<Vec3> = group
        .positions
        .iter()
        .filter_map(|pos| pos.as_deref().and_then(Vec3::from_slice))
        .collect();

    if valid.is_empty() {
        return Err(SkipReason::NoValidMarkers {
            name: name.to_string(),
        });
    }

    let count = valid.len() as f64;
    let sum = valid.iter().fold(Vec3::default(), |acc, p| {
        Vec3::new(acc.x + p.x, acc.y + p.y, acc.z + p.z)
    });
    let centroid = Vec3::new(sum.x / count, sum.y / count, sum.z / count);

    Ok(ResolvedGroup {
        name: name.to_string(),
        aliases: derive_aliases(name),
        update: EntityUpdate::marker_set(centroid, timestamp),
        contributors: valid.len(),
    })
}

/// Root position of a skeleton, cached under its model name (plus derived
/// aliases) and `Skeleton_<id>`.
pub fn resolve_skeleton(
    skeleton: &SkeletonGroup,
    timestamp: DateTime<Utc>,
) -> Result<ResolvedGroup, SkipReason> {
    let skeleton_id = skeleton.id.ok_or_else(|| SkipReason::MissingSkeletonId {
        name: skeleton.name.clone(),
    })?;

    let joint = select_root_joint(&skeleton.joints).ok_or(SkipReason::NoJoints { skeleton_id })?;

    let position = Vec3::from_slice(&joint.position).ok_or_else(|| SkipReason::MalformedJoint {
        skeleton_id,
        joint: joint.name.clone(),
    })?;
    let rotation = joint.rotation.as_deref().and_then(Quat::from_slice);

    let id_alias = skeleton_alias(skeleton_id);
    let model_name = skeleton
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let (name, mut aliases) = match model_name {
        Some(model_name) => (model_name.to_string(), derive_aliases(model_name)),
        None => (id_alias.clone(), Vec::new()),
    };
    if !aliases.contains(&id_alias) {
        aliases.push(id_alias);
    }

    Ok(ResolvedGroup {
        name,
        aliases,
        update: EntityUpdate::skeleton(skeleton_id, position, rotation, timestamp),
        contributors: skeleton.joints.len(),
    })
}

/// Pelvis/root joint by name, else the joint with id 0, else the first joint
pub fn select_root_joint(joints: &[Joint]) -> Option<&Joint> {
    joints
        .iter()
        .find(|joint| {
            let name = joint.name.to_lowercase();
            name.contains("pelvis") || name.contains("root")
        })
        .or_else(|| joints.iter().find(|joint| joint.id == 0))
        .or_else(|| joints.first())
}
