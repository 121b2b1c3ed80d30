use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use vrm_viewer::animation::{retarget_clip, Keyframes, RetargetError, TrackData};
use vrm_viewer::avatar::{HumanBone, Humanoid, Node, Skeleton, Transform, VrmVersion};
use vrm_viewer::loaders::{MocapAnimation, MocapAsset, MocapChannel, MocapProperty};

/// Mixamo-style rig in centimetres: hips turned a quarter about Y, then spine,
/// then an end bone with no VRM counterpart
fn mixamo_rig(hips_height: f32) -> Skeleton {
    Skeleton::new(vec![
        Node::new(
            "mixamorig:Hips",
            None,
            Transform::from_trs(
                Vec3::new(0.0, hips_height, 0.0),
                Quat::from_rotation_y(FRAC_PI_2),
                Vec3::ONE,
            ),
        ),
        Node::new(
            "mixamorig:Spine",
            Some(0),
            Transform::from_translation(Vec3::new(0.0, 10.0, 0.0)),
        ),
        Node::new(
            "mixamorig:HeadTop_End",
            Some(1),
            Transform::from_translation(Vec3::new(0.0, 10.0, 0.0)),
        ),
        Node::new(
            "mixamorig:LeftHand",
            Some(1),
            Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        ),
    ])
}

fn vrm_humanoid() -> Humanoid {
    let skeleton = Skeleton::new(vec![
        Node::new("J_Bip_C_Hips", None, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
        Node::new("J_Bip_C_Spine", Some(0), Transform::from_translation(Vec3::new(0.0, 0.1, 0.0))),
    ]);
    Humanoid::new([(HumanBone::Hips, 0), (HumanBone::Spine, 1)], &skeleton).unwrap()
}

fn rotation(node: usize, q: Quat) -> MocapChannel {
    MocapChannel {
        node,
        property: MocapProperty::Rotation(Keyframes::new(vec![0.0, 1.0], vec![q, q])),
    }
}

fn translation(node: usize, v: Vec3) -> MocapChannel {
    MocapChannel {
        node,
        property: MocapProperty::Translation(Keyframes::new(vec![0.0, 1.0], vec![v, v])),
    }
}

fn take(channels: Vec<MocapChannel>) -> MocapAnimation {
    MocapAnimation {
        name: "mixamo.com".into(),
        duration: 1.0,
        channels,
    }
}

fn rotation_of(clip: &vrm_viewer::animation::AnimationClip, bone: HumanBone) -> Quat {
    clip.tracks
        .iter()
        .find_map(|t| match &t.data {
            TrackData::Rotation(keys) if t.bone == bone => keys.sample(0.5),
            _ => None,
        })
        .unwrap()
}

fn hips_position(clip: &vrm_viewer::animation::AnimationClip) -> Vec3 {
    clip.tracks
        .iter()
        .find_map(|t| match &t.data {
            TrackData::Translation(keys) => keys.sample(0.5),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_rest_pose_keys_become_identity() {
    let rig = mixamo_rig(100.0);
    let hips_rest = rig.node(0).rest.rotation;
    let mocap = MocapAsset::new(rig, Vec::new());
    let animation = take(vec![rotation(0, hips_rest), rotation(1, Quat::IDENTITY)]);

    let clip = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V1).unwrap();
    assert_eq!(clip.tracks.len(), 2);
    assert!(rotation_of(&clip, HumanBone::Hips).abs_diff_eq(Quat::IDENTITY, 1e-5));
    assert!(rotation_of(&clip, HumanBone::Spine).abs_diff_eq(Quat::IDENTITY, 1e-5));
}

#[test]
fn test_child_rotation_is_expressed_in_model_space() {
    let mocap = MocapAsset::new(mixamo_rig(100.0), Vec::new());
    let animation = take(vec![rotation(1, Quat::from_rotation_x(0.5))]);

    let clip = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V1).unwrap();
    // The hips' quarter turn about Y carries the spine's local X axis onto -Z
    let expected = Quat::from_axis_angle(Vec3::NEG_Z, 0.5);
    let got = rotation_of(&clip, HumanBone::Spine);
    assert!(got.abs_diff_eq(expected, 1e-5), "got {:?}", got);
}

#[test]
fn test_hips_translation_scaled_to_avatar() {
    let mocap = MocapAsset::new(mixamo_rig(100.0), Vec::new());
    let animation = take(vec![translation(0, Vec3::new(10.0, 100.0, 20.0))]);

    let v1 = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V1).unwrap();
    assert!(hips_position(&v1).abs_diff_eq(Vec3::new(0.1, 1.0, 0.2), 1e-5));

    let v0 = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V0).unwrap();
    assert!(hips_position(&v0).abs_diff_eq(Vec3::new(-0.1, 1.0, -0.2), 1e-5));
}

#[test]
fn test_vrm0_flips_rotation_x_and_z() {
    let rig = Skeleton::new(vec![Node::new(
        "mixamorigHips",
        None,
        Transform::from_translation(Vec3::new(0.0, 100.0, 0.0)),
    )]);
    let mocap = MocapAsset::new(rig, Vec::new());
    let animation = take(vec![rotation(0, Quat::from_rotation_x(0.5))]);

    let clip = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V0).unwrap();
    let got = rotation_of(&clip, HumanBone::Hips);
    assert!(got.abs_diff_eq(Quat::from_rotation_x(-0.5), 1e-5), "got {:?}", got);
}

#[test]
fn test_unmapped_and_missing_bones_are_dropped() {
    let mocap = MocapAsset::new(mixamo_rig(100.0), Vec::new());
    let animation = take(vec![
        rotation(2, Quat::from_rotation_z(0.3)),
        rotation(3, Quat::from_rotation_z(0.3)),
        translation(1, Vec3::ONE),
        rotation(1, Quat::IDENTITY),
    ]);

    let clip = retarget_clip(&mocap, &animation, &vrm_humanoid(), VrmVersion::V1).unwrap();
    assert_eq!(clip.tracks.len(), 1);
    assert_eq!(clip.tracks[0].bone, HumanBone::Spine);
    assert_eq!(clip.duration, 1.0);
    assert_eq!(clip.name, "mixamo.com");
}

#[test]
fn test_rig_without_hips_is_rejected() {
    let rig = Skeleton::new(vec![Node::new("Root", None, Transform::default())]);
    let mocap = MocapAsset::new(rig, Vec::new());
    let result = retarget_clip(&mocap, &take(Vec::new()), &vrm_humanoid(), VrmVersion::V1);
    assert_eq!(result.unwrap_err(), RetargetError::MissingSourceHips);
}

#[test]
fn test_grounded_hips_are_rejected() {
    let mocap = MocapAsset::new(mixamo_rig(0.0), Vec::new());
    let result = retarget_clip(&mocap, &take(Vec::new()), &vrm_humanoid(), VrmVersion::V1);
    assert_eq!(result.unwrap_err(), RetargetError::ZeroHipsHeight);
}
