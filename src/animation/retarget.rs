use glam::{Quat, Vec3};
use thiserror::Error;

use super::clip::{AnimationClip, Track, TrackData};
use crate::avatar::{HumanBone, Humanoid, VrmVersion};
use crate::loaders::mocap::{MocapAnimation, MocapAsset, MocapProperty};

/// Mixamo rig bone name to VRM human bone
pub const MIXAMO_VRM_RIG_MAP: &[(&str, HumanBone)] = &[
    ("mixamorigHips", HumanBone::Hips),
    ("mixamorigSpine", HumanBone::Spine),
    ("mixamorigSpine1", HumanBone::Chest),
    ("mixamorigSpine2", HumanBone::UpperChest),
    ("mixamorigNeck", HumanBone::Neck),
    ("mixamorigHead", HumanBone::Head),
    ("mixamorigLeftShoulder", HumanBone::LeftShoulder),
    ("mixamorigLeftArm", HumanBone::LeftUpperArm),
    ("mixamorigLeftForeArm", HumanBone::LeftLowerArm),
    ("mixamorigLeftHand", HumanBone::LeftHand),
    ("mixamorigLeftHandThumb1", HumanBone::LeftThumbMetacarpal),
    ("mixamorigLeftHandThumb2", HumanBone::LeftThumbProximal),
    ("mixamorigLeftHandThumb3", HumanBone::LeftThumbDistal),
    ("mixamorigLeftHandIndex1", HumanBone::LeftIndexProximal),
    ("mixamorigLeftHandIndex2", HumanBone::LeftIndexIntermediate),
    ("mixamorigLeftHandIndex3", HumanBone::LeftIndexDistal),
    ("mixamorigLeftHandMiddle1", HumanBone::LeftMiddleProximal),
    ("mixamorigLeftHandMiddle2", HumanBone::LeftMiddleIntermediate),
    ("mixamorigLeftHandMiddle3", HumanBone::LeftMiddleDistal),
    ("mixamorigLeftHandRing1", HumanBone::LeftRingProximal),
    ("mixamorigLeftHandRing2", HumanBone::LeftRingIntermediate),
    ("mixamorigLeftHandRing3", HumanBone::LeftRingDistal),
    ("mixamorigLeftHandPinky1", HumanBone::LeftLittleProximal),
    ("mixamorigLeftHandPinky2", HumanBone::LeftLittleIntermediate),
    ("mixamorigLeftHandPinky3", HumanBone::LeftLittleDistal),
    ("mixamorigRightShoulder", HumanBone::RightShoulder),
    ("mixamorigRightArm", HumanBone::RightUpperArm),
    ("mixamorigRightForeArm", HumanBone::RightLowerArm),
    ("mixamorigRightHand", HumanBone::RightHand),
    ("mixamorigRightHandThumb1", HumanBone::RightThumbMetacarpal),
    ("mixamorigRightHandThumb2", HumanBone::RightThumbProximal),
    ("mixamorigRightHandThumb3", HumanBone::RightThumbDistal),
    ("mixamorigRightHandIndex1", HumanBone::RightIndexProximal),
    ("mixamorigRightHandIndex2", HumanBone::RightIndexIntermediate),
    ("mixamorigRightHandIndex3", HumanBone::RightIndexDistal),
    ("mixamorigRightHandMiddle1", HumanBone::RightMiddleProximal),
    ("mixamorigRightHandMiddle2", HumanBone::RightMiddleIntermediate),
    ("mixamorigRightHandMiddle3", HumanBone::RightMiddleDistal),
    ("mixamorigRightHandRing1", HumanBone::RightRingProximal),
    ("mixamorigRightHandRing2", HumanBone::RightRingIntermediate),
    ("mixamorigRightHandRing3", HumanBone::RightRingDistal),
    ("mixamorigRightHandPinky1", HumanBone::RightLittleProximal),
    ("mixamorigRightHandPinky2", HumanBone::RightLittleIntermediate),
    ("mixamorigRightHandPinky3", HumanBone::RightLittleDistal),
    ("mixamorigLeftUpLeg", HumanBone::LeftUpperLeg),
    ("mixamorigLeftLeg", HumanBone::LeftLowerLeg),
    ("mixamorigLeftFoot", HumanBone::LeftFoot),
    ("mixamorigLeftToeBase", HumanBone::LeftToes),
    ("mixamorigRightUpLeg", HumanBone::RightUpperLeg),
    ("mixamorigRightLeg", HumanBone::RightLowerLeg),
    ("mixamorigRightFoot", HumanBone::RightFoot),
    ("mixamorigRightToeBase", HumanBone::RightToes),
];

const MIXAMO_HIPS: &str = "mixamorigHips";

#[derive(Debug, Error, PartialEq)]
pub enum RetargetError {
    #[error("motion file contains no animation")]
    NoAnimation,
    #[error("motion rig has no mixamorigHips node")]
    MissingSourceHips,
    #[error("motion rig hips sit at height zero, cannot scale hips motion")]
    ZeroHipsHeight,
}

/// `mixamorig:Hips` (glTF exports keep the FBX namespace) becomes `mixamorigHips`
pub fn normalize_mixamo_name(name: &str) -> String {
    match name.strip_prefix("mixamorig:") {
        Some(rest) => format!("mixamorig{}", rest),
        None => name.to_string(),
    }
}

pub fn mixamo_to_vrm(name: &str) -> Option<HumanBone> {
    let name = normalize_mixamo_name(name);
    MIXAMO_VRM_RIG_MAP
        .iter()
        .find(|(mixamo, _)| *mixamo == name)
        .map(|(_, bone)| *bone)
}

/// Convert a Mixamo clip into the humanoid bone namespace of one avatar
pub fn retarget_clip(
    mocap: &MocapAsset,
    animation: &MocapAnimation,
    humanoid: &Humanoid,
    version: VrmVersion,
) -> Result<AnimationClip, RetargetError> {
    let source = &mocap.skeleton;
    let source_hips = source
        .nodes()
        .iter()
        .position(|n| normalize_mixamo_name(&n.name) == MIXAMO_HIPS)
        .ok_or(RetargetError::MissingSourceHips)?;

    let motion_hips_height = source.node(source_hips).rest.translation.y;
    if motion_hips_height.abs() <= f32::EPSILON {
        return Err(RetargetError::ZeroHipsHeight);
    }
    let hips_position_scale = humanoid.hips_height() / motion_hips_height;
    let flip = version == VrmVersion::V0;

    let mut tracks = Vec::new();
    for channel in &animation.channels {
        let source_name = &source.node(channel.node).name;
        let Some(bone) = mixamo_to_vrm(source_name) else {
            log::debug!("Dropping track for unmapped bone {}", source_name);
            continue;
        };
        if !humanoid.has(bone) {
            log::debug!("Dropping track for {}: avatar has no {} bone", source_name, bone);
            continue;
        }

        match &channel.property {
            MocapProperty::Rotation(keys) => {
                let rest_rotation_inverse = source.rest_world_rotation(channel.node).inverse();
                let parent_rest_world = source
                    .parent(channel.node)
                    .map(|p| source.rest_world_rotation(p))
                    .unwrap_or(Quat::IDENTITY);
                let keys = keys.map(|q| {
                    let q = parent_rest_world * q * rest_rotation_inverse;
                    if flip {
                        Quat::from_xyzw(-q.x, q.y, -q.z, q.w)
                    } else {
                        q
                    }
                });
                tracks.push(Track {
                    bone,
                    data: TrackData::Rotation(keys),
                });
            }
            MocapProperty::Translation(keys) if bone == HumanBone::Hips => {
                let keys = keys.map(|v| {
                    let v = if flip { Vec3::new(-v.x, v.y, -v.z) } else { v };
                    v * hips_position_scale
                });
                tracks.push(Track {
                    bone,
                    data: TrackData::Translation(keys),
                });
            }
            MocapProperty::Translation(_) => {
                log::debug!("Dropping translation track on non-hips bone {}", bone);
            }
            MocapProperty::Scale(_) => {
                log::debug!("Dropping scale track on {}", bone);
            }
        }
    }

    log::info!(
        "Retargeted {:?}: {} of {} tracks kept, hips scale {:.4}",
        animation.name,
        tracks.len(),
        animation.channels.len(),
        hips_position_scale
    );

    Ok(AnimationClip::new(
        animation.name.clone(),
        animation.duration,
        tracks,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_map_has_unique_entries() {
        assert_eq!(MIXAMO_VRM_RIG_MAP.len(), 52);
        for (i, (name, bone)) in MIXAMO_VRM_RIG_MAP.iter().enumerate() {
            for (other_name, other_bone) in &MIXAMO_VRM_RIG_MAP[i + 1..] {
                assert_ne!(name, other_name);
                assert_ne!(bone, other_bone);
            }
        }
    }

    #[test]
    fn test_prefixed_names_resolve() {
        assert_eq!(normalize_mixamo_name("mixamorig:Hips"), "mixamorigHips");
        assert_eq!(normalize_mixamo_name("mixamorigHips"), "mixamorigHips");
        assert_eq!(mixamo_to_vrm("mixamorig:LeftHandPinky2"), Some(HumanBone::LeftLittleIntermediate));
        assert_eq!(mixamo_to_vrm("mixamorigRightToeBase"), Some(HumanBone::RightToes));
        assert_eq!(mixamo_to_vrm("mixamorig:HeadTop_End"), None);
    }
}
