pub mod humanoid;
pub mod look_at;
pub mod skeleton;
pub mod spring_bone;

use glam::{Mat4, Quat, Vec3};

use crate::animation::NormalizedPose;

pub use humanoid::{HumanBone, Humanoid, HumanoidError};
pub use look_at::{LookAt, LookAtSettings, LookAtType, RangeMap};
pub use skeleton::{Node, Skeleton, Skin, Transform};
pub use spring_bone::{
    Collider, ColliderShape, SpringBoneSetup, SpringBoneSystem, SpringJointDesc, SpringSettings,
};

/// VRM schema generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VrmVersion {
    /// `VRM` extension, model faces -Z
    V0,
    /// `VRMC_vrm` extension, model faces +Z
    V1,
}

impl std::fmt::Display for VrmVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VrmVersion::V0 => f.write_str("0.x"),
            VrmVersion::V1 => f.write_str("1.0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VrmMeta {
    pub version: VrmVersion,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Posable avatar: raw skeleton driven through the normalised humanoid rig
#[derive(Debug, Clone)]
pub struct Avatar {
    meta: VrmMeta,
    skeleton: Skeleton,
    skins: Vec<Skin>,
    humanoid: Humanoid,
    springs: SpringBoneSystem,
    look_at: LookAt,
}

impl Avatar {
    pub fn new(
        meta: VrmMeta,
        skeleton: Skeleton,
        skins: Vec<Skin>,
        humanoid: Humanoid,
        springs: &SpringBoneSetup,
        look_at: LookAtSettings,
    ) -> Self {
        let springs = SpringBoneSystem::new(springs, &skeleton);
        let look_at = LookAt::new(look_at, meta.version);
        Self {
            meta,
            skeleton,
            skins,
            humanoid,
            springs,
            look_at,
        }
    }

    pub fn meta(&self) -> &VrmMeta {
        &self.meta
    }

    pub fn version(&self) -> VrmVersion {
        self.meta.version
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    pub fn humanoid(&self) -> &Humanoid {
        &self.humanoid
    }

    pub fn look_at(&self) -> &LookAt {
        &self.look_at
    }

    pub fn spring_joint_count(&self) -> usize {
        self.springs.joint_count()
    }

    /// Extra yaw so both schema versions face their direction of travel
    pub fn facing_offset(&self) -> f32 {
        match self.meta.version {
            VrmVersion::V0 => 0.0,
            VrmVersion::V1 => std::f32::consts::PI,
        }
    }

    /// World placement for a movement position and yaw
    pub fn root_transform(&self, position: Vec3, yaw: f32) -> Mat4 {
        Mat4::from_rotation_translation(
            Quat::from_rotation_y(yaw + self.facing_offset()),
            position,
        )
    }

    /// One frame of the humanoid update: look-at, normalised to raw
    /// transfer, world matrices, spring bones
    pub fn update(
        &mut self,
        dt: f32,
        root: Mat4,
        look_target: Option<Vec3>,
        pose: &mut NormalizedPose,
    ) {
        if let Some(target) = look_target {
            self.look_at
                .update(&self.skeleton, &self.humanoid, root, target, pose);
        }
        self.humanoid.apply(pose, &mut self.skeleton);
        self.skeleton.update_world();
        self.springs.update(dt, &mut self.skeleton, root);
    }

    /// Skinning palette for one mesh instance
    pub fn palette(
        &self,
        node: usize,
        skin: Option<usize>,
        root: Mat4,
        out: &mut Vec<[[f32; 4]; 4]>,
    ) {
        match skin.and_then(|s| self.skins.get(s)) {
            Some(skin) => self.skeleton.joint_palette(skin, root, out),
            None => self.skeleton.node_palette(node, root, out),
        }
    }

    /// Back to the bind pose with spring tails re-seeded
    pub fn reset_pose(&mut self) {
        self.skeleton.reset_to_rest();
        self.springs.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar(version: VrmVersion) -> Avatar {
        let skeleton = Skeleton::new(vec![
            Node::new("hips", None, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            Node::new("spine", Some(0), Transform::from_translation(Vec3::new(0.0, 0.2, 0.0))),
        ]);
        let humanoid =
            Humanoid::new([(HumanBone::Hips, 0), (HumanBone::Spine, 1)], &skeleton).unwrap();
        Avatar::new(
            VrmMeta {
                version,
                title: None,
                author: None,
            },
            skeleton,
            Vec::new(),
            humanoid,
            &SpringBoneSetup::default(),
            LookAtSettings::default(),
        )
    }

    #[test]
    fn test_facing_offset_per_version() {
        assert_eq!(avatar(VrmVersion::V0).facing_offset(), 0.0);
        assert_eq!(avatar(VrmVersion::V1).facing_offset(), std::f32::consts::PI);
    }

    #[test]
    fn test_both_versions_face_travel_direction() {
        // yaw for moving along -Z, as the movement controller computes it
        let yaw = 0.0f32.atan2(-1.0) + std::f32::consts::PI;
        let v0 = avatar(VrmVersion::V0).root_transform(Vec3::ZERO, yaw);
        let v1 = avatar(VrmVersion::V1).root_transform(Vec3::ZERO, yaw);
        let v0_front = v0.transform_vector3(Vec3::NEG_Z);
        let v1_front = v1.transform_vector3(Vec3::Z);
        assert!((v0_front - Vec3::NEG_Z).length() < 1e-5, "{:?}", v0_front);
        assert!((v1_front - Vec3::NEG_Z).length() < 1e-5, "{:?}", v1_front);
    }

    #[test]
    fn test_update_applies_pose() {
        let mut avatar = avatar(VrmVersion::V1);
        let mut pose = avatar.humanoid().rest_pose();
        pose.set_rotation(HumanBone::Hips, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        pose.set_hips_position(Vec3::new(0.0, 0.5, 0.0));
        avatar.update(1.0 / 60.0, Mat4::IDENTITY, None, &mut pose);

        let spine = avatar.skeleton().world_position(1);
        assert!((spine - Vec3::new(-0.2, 0.5, 0.0)).length() < 1e-5, "{:?}", spine);

        avatar.reset_pose();
        assert!((avatar.skeleton().world_position(1) - Vec3::new(0.0, 1.2, 0.0)).length() < 1e-6);
    }
}
