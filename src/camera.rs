use glam::{Mat4, Vec3};

use crate::config::CameraConfig;
use crate::math::damp_toward;

/// Orbit angle and height of the follow camera around the avatar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub angle: f32,
    pub height: f32,
}

impl CameraRig {
    pub fn new(height: f32) -> Self {
        Self { angle: 0.0, height }
    }

    pub fn rotate(&mut self, delta: f32) {
        self.angle += delta;
    }

    pub fn raise(&mut self, delta: f32, min: f32, max: f32) {
        self.height = (self.height + delta).clamp(min, max);
    }

    /// Camera offset from the avatar
    pub fn offset(&self, distance: f32) -> Vec3 {
        Vec3::new(
            self.angle.sin() * distance,
            self.height,
            self.angle.cos() * distance,
        )
    }
}

/// Perspective camera that eases behind a moving subject
#[derive(Debug, Clone)]
pub struct FollowCamera {
    pub rig: CameraRig,
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl FollowCamera {
    /// Starts at the origin, looking down -Z until the first follow
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            rig: CameraRig::new(config.initial_height),
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            fov_y: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
            aspect: aspect.max(1e-3),
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Viewing direction, -Z while position and target coincide
    pub fn forward(&self) -> Vec3 {
        let dir = (self.target - self.position).normalize_or_zero();
        if dir == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            dir
        }
    }

    /// Viewing direction projected onto the ground plane
    pub fn flat_forward(&self) -> Vec3 {
        let f = self.forward();
        let flat = Vec3::new(f.x, 0.0, f.z).normalize_or_zero();
        if flat == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            flat
        }
    }

    /// Ease toward the rig offset around `subject` and look at it
    pub fn follow(&mut self, subject: Vec3, distance: f32, smoothing: f32) {
        let desired = subject + self.rig.offset(distance);
        self.position = damp_toward(self.position, desired, smoothing);
        self.target = subject;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), self.up())
    }

    fn up(&self) -> Vec3 {
        // Straight up or down views need another up vector
        if self.forward().cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAMERA_CONFIG;

    #[test]
    fn test_rig_offset_at_zero_angle_is_behind_on_z() {
        let rig = CameraRig::new(3.0);
        assert_eq!(rig.offset(8.0), Vec3::new(0.0, 3.0, 8.0));
    }

    #[test]
    fn test_rig_height_clamps() {
        let mut rig = CameraRig::new(9.95);
        rig.raise(0.1, 1.0, 10.0);
        rig.raise(0.1, 1.0, 10.0);
        assert_eq!(rig.height, 10.0);
        let mut rig = CameraRig::new(1.05);
        rig.raise(-0.1, 1.0, 10.0);
        assert_eq!(rig.height, 1.0);
    }

    #[test]
    fn test_forward_falls_back_to_negative_z() {
        let camera = FollowCamera::new(&CAMERA_CONFIG, 1.0);
        assert_eq!(camera.forward(), Vec3::NEG_Z);
        assert_eq!(camera.flat_forward(), Vec3::NEG_Z);
    }

    #[test]
    fn test_follow_eases_and_looks_at_subject() {
        let mut camera = FollowCamera::new(&CAMERA_CONFIG, 1.0);
        camera.follow(Vec3::ZERO, 8.0, 0.05);
        assert!((camera.position - Vec3::new(0.0, 0.15, 0.4)).length() < 1e-6);
        assert_eq!(camera.target, Vec3::ZERO);
        let f = camera.flat_forward();
        assert!((f - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_view_proj_puts_target_in_front() {
        let mut camera = FollowCamera::new(&CAMERA_CONFIG, 16.0 / 9.0);
        camera.position = Vec3::new(0.0, 3.0, 8.0);
        camera.target = Vec3::ZERO;
        let clip = camera.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
