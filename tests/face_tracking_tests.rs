use std::f32::consts::PI;
use std::io::Cursor;

use vrm_viewer::face_tracking::{
    FaceMeshOptions, FacePose, FaceTracker, JsonLinesSource, Landmark, LandmarkFrame,
    LEFT_EYE_LANDMARK, NOSE_LANDMARK, RIGHT_EYE_LANDMARK,
};

/// A full-size mesh with every landmark centred, then the three used ones moved
fn face(nose: Landmark, left: Landmark, right: Landmark) -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.5); 478];
    landmarks[NOSE_LANDMARK] = nose;
    landmarks[LEFT_EYE_LANDMARK] = left;
    landmarks[RIGHT_EYE_LANDMARK] = right;
    landmarks
}

fn line(frame: &LandmarkFrame) -> String {
    serde_json::to_string(frame).unwrap()
}

fn tracker(lines: &[String]) -> FaceTracker {
    let text = lines.join("\n");
    FaceTracker::new(
        FaceMeshOptions::default(),
        Box::new(JsonLinesSource::from_reader("test", Cursor::new(text))),
    )
}

#[test]
fn test_default_options() {
    let options = FaceMeshOptions::default();
    assert_eq!(options.max_num_faces, 1);
    assert!(options.refine_landmarks);
    assert_eq!(options.min_detection_confidence, 0.5);
    assert_eq!(options.min_tracking_confidence, 0.5);
}

#[test]
fn test_pose_from_landmarks() {
    let landmarks = face(
        Landmark::new(0.75, 0.25, 0.5),
        Landmark::new(0.4, 0.45, 0.0),
        Landmark::new(0.6, 0.4, 0.0),
    );
    let pose = FacePose::from_landmarks(&landmarks).unwrap();

    assert!((pose.head_rotation.x - (-0.5 * PI)).abs() < 1e-5);
    assert!((pose.head_rotation.y - 0.5 * PI).abs() < 1e-5);
    assert!(pose.head_rotation.z.abs() < 1e-5);
    assert!((pose.eye_rotation.x - 0.1).abs() < 1e-5);
    assert!((pose.eye_rotation.y - (-0.4)).abs() < 1e-5);
}

#[test]
fn test_sparse_face_has_no_pose() {
    let landmarks = vec![Landmark::default(); 100];
    assert!(FacePose::from_landmarks(&landmarks).is_none());
}

#[test]
fn test_replay_tracks_then_loses_face() {
    let centred = Landmark::new(0.5, 0.5, 0.5);
    let mut tracked = LandmarkFrame {
        faces: vec![face(Landmark::new(0.6, 0.5, 0.5), centred, centred)],
        ..LandmarkFrame::default()
    };
    tracked.blend_shapes.insert("eyeBlinkLeft".into(), 0.8);
    let empty = LandmarkFrame::default();

    let mut tracker = tracker(&[line(&tracked), String::new(), line(&empty)]);
    assert!(!tracker.state().is_tracking);

    tracker.update();
    let state = tracker.state().clone();
    assert!(state.is_tracking);
    assert!((state.head_rotation[1] - 0.2 * PI).abs() < 1e-5);
    assert_eq!(state.blend_shapes.get("eyeBlinkLeft"), Some(&0.8));

    // Blank line skipped, then a frame with no faces
    tracker.update();
    assert!(!tracker.state().is_tracking);
    assert_eq!(tracker.state().head_rotation, state.head_rotation);
    assert_eq!(tracker.frames(), 2);

    tracker.update();
    assert!(tracker.is_finished());
    assert!(!tracker.state().is_tracking);
}

#[test]
fn test_malformed_lines_are_skipped() {
    let centred = Landmark::new(0.5, 0.5, 0.5);
    let frame = LandmarkFrame {
        faces: vec![face(centred, centred, centred)],
        ..LandmarkFrame::default()
    };
    let mut tracker = tracker(&["{not json".to_string(), line(&frame)]);

    tracker.update();
    assert!(tracker.state().is_tracking);
    assert_eq!(tracker.frames(), 1);
    assert!(tracker.pose().is_some());
}

#[test]
fn test_landmark_z_is_optional() {
    let frame: LandmarkFrame = serde_json::from_str(r#"{"faces": [[{"x": 0.1, "y": 0.2}]]}"#).unwrap();
    assert_eq!(frame.faces[0][0], Landmark::new(0.1, 0.2, 0.0));
    assert!(frame.blend_shapes.is_empty());
}
