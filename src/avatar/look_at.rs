use glam::{EulerRot, Mat4, Quat, Vec3};

use super::humanoid::{HumanBone, Humanoid};
use super::skeleton::Skeleton;
use super::VrmVersion;
use crate::animation::NormalizedPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookAtType {
    Bone,
    /// Driven by blink/look expressions, which this viewer does not evaluate
    Expression,
}

/// Maps an input angle (degrees) onto an eye rotation (degrees)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMap {
    pub input_max_value: f32,
    pub output_scale: f32,
}

impl RangeMap {
    pub fn map(&self, src: f32) -> f32 {
        if self.input_max_value <= 0.0 {
            return 0.0;
        }
        self.output_scale * (src / self.input_max_value).clamp(0.0, 1.0)
    }
}

impl Default for RangeMap {
    fn default() -> Self {
        Self {
            input_max_value: 90.0,
            output_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtSettings {
    pub kind: LookAtType,
    /// Eye position relative to the head bone
    pub offset_from_head: Vec3,
    pub horizontal_inner: RangeMap,
    pub horizontal_outer: RangeMap,
    pub vertical_down: RangeMap,
    pub vertical_up: RangeMap,
}

impl Default for LookAtSettings {
    fn default() -> Self {
        Self {
            kind: LookAtType::Bone,
            offset_from_head: Vec3::new(0.0, 0.06, 0.0),
            horizontal_inner: RangeMap::default(),
            horizontal_outer: RangeMap::default(),
            vertical_down: RangeMap::default(),
            vertical_up: RangeMap::default(),
        }
    }
}

/// Points the eye bones at a world-space target
#[derive(Debug, Clone)]
pub struct LookAt {
    settings: LookAtSettings,
    version: VrmVersion,
    yaw: f32,
    pitch: f32,
}

impl LookAt {
    pub fn new(settings: LookAtSettings, version: VrmVersion) -> Self {
        Self {
            settings,
            version,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn settings(&self) -> &LookAtSettings {
        &self.settings
    }

    /// Last computed (yaw, pitch) in degrees. Positive yaw turns toward the
    /// model's left, positive pitch looks down.
    pub fn yaw_pitch(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    /// Yaw and pitch, in degrees, of `target` seen from the eyes of the
    /// current pose, measured in the head's rest frame
    pub fn compute_yaw_pitch(
        &self,
        skeleton: &Skeleton,
        humanoid: &Humanoid,
        root: Mat4,
        target: Vec3,
    ) -> Option<(f32, f32)> {
        let head = humanoid.node(HumanBone::Head)?;
        let head_world = root * skeleton.world(head);
        let origin = head_world.transform_point3(self.settings.offset_from_head);

        let (_, head_rotation, _) = head_world.to_scale_rotation_translation();
        let rest_rotation = skeleton.rest_world_rotation(head);
        let frame = head_rotation * rest_rotation.inverse();
        let dir = (frame.inverse() * (target - origin)).normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        // 0.x models face -Z, 1.0 models face +Z
        let (x, z) = match self.version {
            VrmVersion::V0 => (-dir.x, -dir.z),
            VrmVersion::V1 => (dir.x, dir.z),
        };
        let yaw = x.atan2(z).to_degrees();
        let pitch = -dir.y.atan2((x * x + z * z).sqrt()).to_degrees();
        Some((yaw, pitch))
    }

    /// Eye rotations (left, right) in the normalised rig
    pub fn eye_rotations(&self, yaw: f32, pitch: f32) -> (Quat, Quat) {
        let s = &self.settings;
        let mut x = if pitch < 0.0 {
            -s.vertical_down.map(-pitch)
        } else {
            s.vertical_up.map(pitch)
        };
        if self.version == VrmVersion::V0 {
            x = -x;
        }
        let left_y = if yaw < 0.0 {
            -s.horizontal_inner.map(-yaw)
        } else {
            s.horizontal_outer.map(yaw)
        };
        let right_y = if yaw < 0.0 {
            -s.horizontal_outer.map(-yaw)
        } else {
            s.horizontal_inner.map(yaw)
        };
        let rotation =
            |y: f32| Quat::from_euler(EulerRot::YXZ, y.to_radians(), x.to_radians(), 0.0);
        (rotation(left_y), rotation(right_y))
    }

    /// Track `target` and write the eye rotations into `pose`
    pub fn update(
        &mut self,
        skeleton: &Skeleton,
        humanoid: &Humanoid,
        root: Mat4,
        target: Vec3,
        pose: &mut NormalizedPose,
    ) {
        if self.settings.kind != LookAtType::Bone {
            return;
        }
        if let Some((yaw, pitch)) = self.compute_yaw_pitch(skeleton, humanoid, root, target) {
            self.yaw = yaw;
            self.pitch = pitch;
        }
        let (left, right) = self.eye_rotations(self.yaw, self.pitch);
        if humanoid.has(HumanBone::LeftEye) {
            pose.set_rotation(HumanBone::LeftEye, left);
        }
        if humanoid.has(HumanBone::RightEye) {
            pose.set_rotation(HumanBone::RightEye, right);
        }
    }
}
