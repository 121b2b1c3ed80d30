use glam::{Mat4, Quat, Vec3};
use thiserror::Error;

use super::skeleton::Skeleton;
use crate::animation::NormalizedPose;

macro_rules! human_bones {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// VRM humanoid bone, named as in the 1.0 schema
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum HumanBone {
            $($variant),*
        }

        impl HumanBone {
            pub const ALL: &'static [HumanBone] = &[$(HumanBone::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(HumanBone::$variant => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(HumanBone::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

human_bones! {
    Hips => "hips",
    Spine => "spine",
    Chest => "chest",
    UpperChest => "upperChest",
    Neck => "neck",
    Head => "head",
    LeftEye => "leftEye",
    RightEye => "rightEye",
    Jaw => "jaw",
    LeftUpperLeg => "leftUpperLeg",
    LeftLowerLeg => "leftLowerLeg",
    LeftFoot => "leftFoot",
    LeftToes => "leftToes",
    RightUpperLeg => "rightUpperLeg",
    RightLowerLeg => "rightLowerLeg",
    RightFoot => "rightFoot",
    RightToes => "rightToes",
    LeftShoulder => "leftShoulder",
    LeftUpperArm => "leftUpperArm",
    LeftLowerArm => "leftLowerArm",
    LeftHand => "leftHand",
    RightShoulder => "rightShoulder",
    RightUpperArm => "rightUpperArm",
    RightLowerArm => "rightLowerArm",
    RightHand => "rightHand",
    LeftThumbMetacarpal => "leftThumbMetacarpal",
    LeftThumbProximal => "leftThumbProximal",
    LeftThumbDistal => "leftThumbDistal",
    LeftIndexProximal => "leftIndexProximal",
    LeftIndexIntermediate => "leftIndexIntermediate",
    LeftIndexDistal => "leftIndexDistal",
    LeftMiddleProximal => "leftMiddleProximal",
    LeftMiddleIntermediate => "leftMiddleIntermediate",
    LeftMiddleDistal => "leftMiddleDistal",
    LeftRingProximal => "leftRingProximal",
    LeftRingIntermediate => "leftRingIntermediate",
    LeftRingDistal => "leftRingDistal",
    LeftLittleProximal => "leftLittleProximal",
    LeftLittleIntermediate => "leftLittleIntermediate",
    LeftLittleDistal => "leftLittleDistal",
    RightThumbMetacarpal => "rightThumbMetacarpal",
    RightThumbProximal => "rightThumbProximal",
    RightThumbDistal => "rightThumbDistal",
    RightIndexProximal => "rightIndexProximal",
    RightIndexIntermediate => "rightIndexIntermediate",
    RightIndexDistal => "rightIndexDistal",
    RightMiddleProximal => "rightMiddleProximal",
    RightMiddleIntermediate => "rightMiddleIntermediate",
    RightMiddleDistal => "rightMiddleDistal",
    RightRingProximal => "rightRingProximal",
    RightRingIntermediate => "rightRingIntermediate",
    RightRingDistal => "rightRingDistal",
    RightLittleProximal => "rightLittleProximal",
    RightLittleIntermediate => "rightLittleIntermediate",
    RightLittleDistal => "rightLittleDistal",
}

impl HumanBone {
    pub const COUNT: usize = 55;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve a 0.x bone name. The 0.x thumb chain starts one joint later,
    /// so its names shift by one against the 1.0 set.
    pub fn from_vrm0_name(name: &str) -> Option<Self> {
        match name {
            "leftThumbProximal" => Some(HumanBone::LeftThumbMetacarpal),
            "leftThumbIntermediate" => Some(HumanBone::LeftThumbProximal),
            "rightThumbProximal" => Some(HumanBone::RightThumbMetacarpal),
            "rightThumbIntermediate" => Some(HumanBone::RightThumbProximal),
            other => Self::from_name(other),
        }
    }
}

impl std::fmt::Display for HumanBone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum HumanoidError {
    #[error("humanoid has no hips bone")]
    MissingHips,
    #[error("bone {bone} points at node {node}, but the model has {count} nodes")]
    InvalidNode {
        bone: HumanBone,
        node: usize,
        count: usize,
    },
}

/// Bone map plus the rest data needed to drive raw bones from a normalised pose
#[derive(Debug, Clone)]
pub struct Humanoid {
    bones: [Option<usize>; HumanBone::COUNT],
    parent_world_rotations: [Quat; HumanBone::COUNT],
    rest_local_rotations: [Quat; HumanBone::COUNT],
    hips_rest_position: Vec3,
    hips_parent_inverse: Mat4,
}

impl Humanoid {
    pub fn new(
        map: impl IntoIterator<Item = (HumanBone, usize)>,
        skeleton: &Skeleton,
    ) -> Result<Self, HumanoidError> {
        let mut bones = [None; HumanBone::COUNT];
        for (bone, node) in map {
            if node >= skeleton.len() {
                return Err(HumanoidError::InvalidNode {
                    bone,
                    node,
                    count: skeleton.len(),
                });
            }
            bones[bone.index()] = Some(node);
        }
        let hips = bones[HumanBone::Hips.index()].ok_or(HumanoidError::MissingHips)?;

        let mut parent_world_rotations = [Quat::IDENTITY; HumanBone::COUNT];
        let mut rest_local_rotations = [Quat::IDENTITY; HumanBone::COUNT];
        for (i, node) in bones.iter().enumerate() {
            if let Some(node) = *node {
                parent_world_rotations[i] = skeleton
                    .parent(node)
                    .map(|p| skeleton.rest_world_rotation(p))
                    .unwrap_or(Quat::IDENTITY);
                rest_local_rotations[i] = skeleton.node(node).rest.rotation;
            }
        }

        let hips_rest_position = skeleton.rest_world(hips).w_axis.truncate();
        let hips_parent_inverse = skeleton
            .parent(hips)
            .map(|p| skeleton.rest_world(p).inverse())
            .unwrap_or(Mat4::IDENTITY);

        Ok(Self {
            bones,
            parent_world_rotations,
            rest_local_rotations,
            hips_rest_position,
            hips_parent_inverse,
        })
    }

    pub fn node(&self, bone: HumanBone) -> Option<usize> {
        self.bones[bone.index()]
    }

    pub fn has(&self, bone: HumanBone) -> bool {
        self.bones[bone.index()].is_some()
    }

    pub fn hips(&self) -> usize {
        // Construction guarantees a hips entry
        self.bones[HumanBone::Hips.index()].unwrap_or(0)
    }

    pub fn bones(&self) -> impl Iterator<Item = (HumanBone, usize)> + '_ {
        HumanBone::ALL
            .iter()
            .filter_map(|&b| self.node(b).map(|n| (b, n)))
    }

    /// Model-space hips position in the rest pose
    pub fn hips_rest_position(&self) -> Vec3 {
        self.hips_rest_position
    }

    /// Vertical distance from the model origin to the hips at rest
    pub fn hips_height(&self) -> f32 {
        self.hips_rest_position.y.abs()
    }

    pub fn parent_world_rotation(&self, bone: HumanBone) -> Quat {
        self.parent_world_rotations[bone.index()]
    }

    pub fn rest_pose(&self) -> NormalizedPose {
        NormalizedPose::rest(self.hips_rest_position)
    }

    /// Write a normalised pose into the raw bones' local transforms.
    /// World matrices are left stale; callers update them afterwards.
    pub fn apply(&self, pose: &NormalizedPose, skeleton: &mut Skeleton) {
        for (bone, node) in self.bones() {
            let parent_world = self.parent_world_rotations[bone.index()];
            let rest_local = self.rest_local_rotations[bone.index()];
            let q = pose.rotation(bone);
            skeleton.local_mut(node).rotation =
                (parent_world.inverse() * q * parent_world * rest_local).normalize();
        }

        let hips = self.hips();
        skeleton.local_mut(hips).translation = self
            .hips_parent_inverse
            .transform_point3(pose.hips_position());
    }
}
