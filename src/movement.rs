use glam::Vec3;

use crate::camera::FollowCamera;
use crate::config::{CameraConfig, MovementConfig};
use crate::core::{Button, Controller};
use crate::math::shortest_angle_delta;

/// Avatar placement driven by the keyboard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    pub position: Vec3,
    /// Yaw in radians; the only rotation axis used
    pub yaw: f32,
    /// Displacement applied during the last tick
    pub velocity: Vec3,
}

impl MovementState {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: std::f32::consts::PI,
            velocity: Vec3::ZERO,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn is_moving(&self) -> bool {
        self.velocity.length_squared() > 0.0
    }
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

/// Camera-relative WASD locomotion plus arrow-key camera orbit
#[derive(Debug, Clone)]
pub struct MovementController {
    movement: MovementConfig,
    camera: CameraConfig,
    state: MovementState,
}

impl MovementController {
    pub fn new(movement: MovementConfig, camera: CameraConfig, start: Vec3) -> Self {
        Self {
            movement,
            camera,
            state: MovementState::new(start),
        }
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// Put the avatar back at `position`, keeping the camera rig
    pub fn teleport(&mut self, position: Vec3) {
        self.state = MovementState::new(position);
    }

    /// Direction of travel for the held keys, relative to the camera.
    /// Zero when no movement key is held or opposite keys cancel.
    pub fn input_direction(input: &impl Controller, camera: &FollowCamera) -> Vec3 {
        let forward = camera.flat_forward();
        let left = Vec3::Y.cross(forward).normalize_or_zero();

        let mut direction = Vec3::ZERO;
        if input.is_down(Button::KeyW) {
            direction += forward;
        }
        if input.is_down(Button::KeyS) {
            direction -= forward;
        }
        if input.is_down(Button::KeyA) {
            direction += left;
        }
        if input.is_down(Button::KeyD) {
            direction -= left;
        }
        direction
    }

    /// One fixed simulation step
    pub fn tick(&mut self, input: &impl Controller, camera: &mut FollowCamera) {
        let mut direction = Self::input_direction(input, camera);

        if direction.length_squared() > 1e-12 {
            direction = direction.normalize() * self.movement.speed;
            let target_yaw = direction.x.atan2(direction.z) + std::f32::consts::PI;
            let diff = shortest_angle_delta(self.state.yaw, target_yaw);
            self.state.yaw += diff * self.movement.rotation_speed;
        } else {
            direction = Vec3::ZERO;
        }

        let cfg = &self.camera;
        if input.is_down(Button::ArrowRight) {
            camera.rig.rotate(-cfg.rotation_speed);
        }
        if input.is_down(Button::ArrowLeft) {
            camera.rig.rotate(cfg.rotation_speed);
        }
        if input.is_down(Button::ArrowUp) {
            camera.rig.raise(cfg.height_speed, cfg.min_height, cfg.max_height);
        }
        if input.is_down(Button::ArrowDown) {
            camera.rig.raise(-cfg.height_speed, cfg.min_height, cfg.max_height);
        }

        self.state.position += direction;
        self.state.velocity = direction;

        camera.follow(self.state.position, cfg.distance, cfg.smoothing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAMERA_CONFIG, MOVEMENT_CONFIG};
    use crate::core::HeldButtons;

    fn setup() -> (MovementController, FollowCamera) {
        (
            MovementController::new(MOVEMENT_CONFIG, CAMERA_CONFIG, Vec3::ZERO),
            FollowCamera::new(&CAMERA_CONFIG, 1.0),
        )
    }

    #[test]
    fn test_starts_facing_camera_and_idle() {
        let (controller, _) = setup();
        assert_eq!(controller.state().yaw, std::f32::consts::PI);
        assert!(!controller.state().is_moving());
    }

    #[test]
    fn test_no_keys_keeps_position() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::none(), &mut camera);
        assert_eq!(controller.state().position, Vec3::ZERO);
        assert_eq!(controller.state().speed(), 0.0);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_forward_moves_away_from_camera() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::new(&[Button::KeyW]), &mut camera);
        let p = controller.state().position;
        assert!((p - Vec3::new(0.0, 0.0, -0.1)).length() < 1e-6);
        assert!((controller.state().speed() - 0.1).abs() < 1e-6);
        assert_eq!(camera.target, p);
    }

    #[test]
    fn test_strafe_right_turns_gradually() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::new(&[Button::KeyD]), &mut camera);
        let state = controller.state();
        assert!(state.position.x > 0.099);
        // Target yaw is 3pi/2, a quarter turn away; one tick covers a tenth
        let expected = std::f32::consts::PI + std::f32::consts::FRAC_PI_2 * 0.1;
        assert!((state.yaw - expected).abs() < 1e-5);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::new(&[Button::KeyW, Button::KeyA]), &mut camera);
        assert!((controller.state().speed() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::new(&[Button::KeyW, Button::KeyS]), &mut camera);
        assert!(!controller.state().is_moving());
        assert_eq!(controller.state().yaw, std::f32::consts::PI);
    }

    #[test]
    fn test_arrows_orbit_and_raise_camera() {
        let (mut controller, mut camera) = setup();
        controller.tick(
            &HeldButtons::new(&[Button::ArrowLeft, Button::ArrowUp]),
            &mut camera,
        );
        assert!((camera.rig.angle - 0.02).abs() < 1e-6);
        assert!((camera.rig.height - 3.1).abs() < 1e-6);

        for _ in 0..200 {
            controller.tick(&HeldButtons::new(&[Button::ArrowUp]), &mut camera);
        }
        assert_eq!(camera.rig.height, 10.0);
    }

    #[test]
    fn test_teleport_resets_state() {
        let (mut controller, mut camera) = setup();
        controller.tick(&HeldButtons::new(&[Button::KeyW]), &mut camera);
        controller.teleport(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(controller.state().position, Vec3::new(1.0, 0.0, 1.0));
        assert!(!controller.state().is_moving());
    }
}
