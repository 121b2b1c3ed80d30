use std::f32::consts::PI;

use glam::Vec3;
use vrm_viewer::camera::FollowCamera;
use vrm_viewer::config::{CAMERA_CONFIG, MOVEMENT_CONFIG};
use vrm_viewer::core::{Button, HeldButtons};
use vrm_viewer::math::shortest_angle_delta;
use vrm_viewer::movement::MovementController;

fn setup() -> (MovementController, FollowCamera) {
    (
        MovementController::new(MOVEMENT_CONFIG, CAMERA_CONFIG, Vec3::ZERO),
        FollowCamera::new(&CAMERA_CONFIG, 16.0 / 9.0),
    )
}

fn run(
    controller: &mut MovementController,
    camera: &mut FollowCamera,
    keys: &[Button],
    ticks: usize,
) {
    let input = HeldButtons::new(keys);
    for _ in 0..ticks {
        controller.tick(&input, camera);
    }
}

#[test]
fn test_camera_settles_behind_idle_avatar() {
    let (mut controller, mut camera) = setup();
    run(&mut controller, &mut camera, &[], 300);

    assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 3.0, 8.0), 1e-3));
    assert_eq!(camera.target, Vec3::ZERO);
    assert!(!controller.state().is_moving());
    assert_eq!(controller.state().yaw, PI);
}

#[test]
fn test_walking_away_turns_avatar_around() {
    let (mut controller, mut camera) = setup();
    run(&mut controller, &mut camera, &[], 300);
    run(&mut controller, &mut camera, &[Button::KeyW], 200);

    let state = controller.state();
    assert!(shortest_angle_delta(state.yaw, 0.0).abs() < 1e-3, "yaw {}", state.yaw);
    assert!((state.speed() - MOVEMENT_CONFIG.speed).abs() < 1e-5);
    assert!(state.position.z < -19.0);
    assert!(state.position.x.abs() < 1e-3);
}

#[test]
fn test_movement_is_relative_to_orbited_camera() {
    let (mut controller, mut camera) = setup();
    // Quarter orbit to the left puts the camera on +X
    let ticks = (PI / 2.0 / CAMERA_CONFIG.rotation_speed).round() as usize;
    run(&mut controller, &mut camera, &[Button::ArrowLeft], ticks);
    run(&mut controller, &mut camera, &[], 400);
    assert!(camera.position.x > 7.9);

    let before = controller.state().position;
    run(&mut controller, &mut camera, &[Button::KeyW], 1);
    let step = controller.state().position - before;
    assert!(step.abs_diff_eq(Vec3::new(-0.1, 0.0, 0.0), 2e-3), "step {:?}", step);
}

#[test]
fn test_height_stays_within_limits() {
    let (mut controller, mut camera) = setup();
    run(&mut controller, &mut camera, &[Button::ArrowDown], 100);
    assert_eq!(camera.rig.height, CAMERA_CONFIG.min_height);
    run(&mut controller, &mut camera, &[Button::ArrowUp], 200);
    assert_eq!(camera.rig.height, CAMERA_CONFIG.max_height);
    run(&mut controller, &mut camera, &[Button::ArrowUp, Button::ArrowDown], 10);
    assert!(camera.rig.height <= CAMERA_CONFIG.max_height);
    assert!(camera.rig.height >= CAMERA_CONFIG.max_height - CAMERA_CONFIG.height_speed - 1e-5);
}

#[test]
fn test_releasing_keys_stops_immediately() {
    let (mut controller, mut camera) = setup();
    run(&mut controller, &mut camera, &[Button::KeyA], 10);
    assert!(controller.state().is_moving());
    let stopped_at = controller.state().position;
    run(&mut controller, &mut camera, &[], 1);
    assert!(!controller.state().is_moving());
    assert_eq!(controller.state().position, stopped_at);
}
