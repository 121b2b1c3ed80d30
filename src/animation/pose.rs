use glam::{Quat, Vec3};

use crate::avatar::HumanBone;

/// Per-bone rotations in the normalised rig, plus the model-space hips position.
/// Bones never written stay at identity, which is the rest pose.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPose {
    rotations: [Quat; HumanBone::COUNT],
    hips_position: Vec3,
}

impl NormalizedPose {
    pub fn rest(hips_position: Vec3) -> Self {
        Self {
            rotations: [Quat::IDENTITY; HumanBone::COUNT],
            hips_position,
        }
    }

    pub fn rotation(&self, bone: HumanBone) -> Quat {
        self.rotations[bone.index()]
    }

    pub fn set_rotation(&mut self, bone: HumanBone, rotation: Quat) {
        self.rotations[bone.index()] = rotation;
    }

    pub fn hips_position(&self) -> Vec3 {
        self.hips_position
    }

    pub fn set_hips_position(&mut self, position: Vec3) {
        self.hips_position = position;
    }
}
