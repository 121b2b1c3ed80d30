use std::sync::Arc;

use glam::{Quat, Vec3};
use vrm_viewer::animation::{
    AnimationClip, AnimationMixer, BlendController, Keyframes, Track, TrackData, BLEND_RATE,
};
use vrm_viewer::avatar::HumanBone;

const REST_HIPS: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Clip that holds `bone` at a fixed rotation and hips at `hips`
fn held(name: &str, angle: f32, hips: Vec3) -> Arc<AnimationClip> {
    let q = Quat::from_rotation_x(angle);
    Arc::new(AnimationClip::from_tracks(
        name,
        vec![
            Track {
                bone: HumanBone::Spine,
                data: TrackData::Rotation(Keyframes::new(vec![0.0, 1.0], vec![q, q])),
            },
            Track {
                bone: HumanBone::Hips,
                data: TrackData::Translation(Keyframes::new(vec![0.0, 1.0], vec![hips, hips])),
            },
        ],
    ))
}

fn setup() -> (AnimationMixer, BlendController) {
    let mut mixer = AnimationMixer::new(REST_HIPS);
    let idle = mixer.clip_action(held("idle", 0.0, REST_HIPS));
    let run = mixer.clip_action(held("run", 1.0, Vec3::new(0.0, 0.8, 0.0)));
    let blend = BlendController::new(&mut mixer, idle, run, BLEND_RATE);
    (mixer, blend)
}

#[test]
fn test_starts_fully_idle() {
    let (mut mixer, blend) = setup();
    assert_eq!(blend.transition(), 0.0);
    assert_eq!(mixer.action(blend.idle()).weight, 1.0);
    assert_eq!(mixer.action(blend.run()).weight, 0.0);

    let pose = mixer.evaluate();
    assert!(pose.rotation(HumanBone::Spine).abs_diff_eq(Quat::IDENTITY, 1e-6));
    assert!(pose.hips_position().abs_diff_eq(REST_HIPS, 1e-6));
}

#[test]
fn test_transition_follows_lerp_per_tick() {
    let (mut mixer, mut blend) = setup();
    blend.update(&mut mixer, true);
    assert!((blend.transition() - 0.1).abs() < 1e-6);
    blend.update(&mut mixer, true);
    assert!((blend.transition() - 0.19).abs() < 1e-6);
    blend.update(&mut mixer, false);
    assert!((blend.transition() - 0.171).abs() < 1e-6);

    let idle = mixer.action(blend.idle()).weight;
    let run = mixer.action(blend.run()).weight;
    assert!((idle + run - 1.0).abs() < 1e-6);
}

#[test]
fn test_running_pose_converges_to_run_clip() {
    let (mut mixer, mut blend) = setup();
    for _ in 0..200 {
        blend.update(&mut mixer, true);
        mixer.update(1.0 / 60.0);
    }
    assert!(blend.transition() > 0.999);

    let pose = mixer.evaluate();
    let spine = pose.rotation(HumanBone::Spine);
    assert!(spine.abs_diff_eq(Quat::from_rotation_x(1.0), 1e-3), "spine {:?}", spine);
    assert!(pose.hips_position().abs_diff_eq(Vec3::new(0.0, 0.8, 0.0), 1e-3));
}

#[test]
fn test_half_blend_is_between_clips() {
    let (mut mixer, blend) = setup();
    mixer.set_weight(blend.idle(), 0.5);
    mixer.set_weight(blend.run(), 0.5);

    let pose = mixer.evaluate();
    let angle = pose.rotation(HumanBone::Spine).angle_between(Quat::IDENTITY);
    assert!((angle - 0.5).abs() < 1e-4, "angle {}", angle);
    assert!((pose.hips_position().y - 0.9).abs() < 1e-5);
}

#[test]
fn test_actions_loop_over_clip_duration() {
    let (mut mixer, blend) = setup();
    mixer.update(2.5);
    let time = mixer.action(blend.run()).time;
    assert!((time - 0.5).abs() < 1e-5, "time {}", time);
}

#[test]
fn test_stopped_action_no_longer_contributes() {
    let (mut mixer, blend) = setup();
    mixer.set_weight(blend.idle(), 0.0);
    mixer.set_weight(blend.run(), 1.0);
    mixer.stop(blend.run());

    let pose = mixer.evaluate();
    assert!(pose.rotation(HumanBone::Spine).abs_diff_eq(Quat::IDENTITY, 1e-6));
    assert_eq!(mixer.action(blend.run()).time, 0.0);
}
