//! Face landmark tracking fed from a recorded landmark stream.
//!
//! Frames carry face-mesh landmarks in normalised image coordinates. The
//! tracker derives a head rotation and an eye rotation from three of them
//! and keeps a [`FaceTrackingState`] for display.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub const NOSE_LANDMARK: usize = 5;
pub const LEFT_EYE_LANDMARK: usize = 33;
pub const RIGHT_EYE_LANDMARK: usize = 263;

/// Detector settings, recorded alongside the stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMeshOptions {
    pub max_num_faces: u32,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for FaceMeshOptions {
    fn default() -> Self {
        Self {
            max_num_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One detector result: zero or more faces, optionally with blend shape scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub faces: Vec<Vec<Landmark>>,
    #[serde(default)]
    pub blend_shapes: BTreeMap<String, f32>,
}

/// Head and eye rotation derived from one face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePose {
    /// Euler angles in radians (x pitch, y yaw, z roll)
    pub head_rotation: Vec3,
    /// Eye euler angles in radians (x, y)
    pub eye_rotation: Vec2,
}

impl FacePose {
    /// `None` when the face has too few landmarks to contain the eyes
    pub fn from_landmarks(landmarks: &[Landmark]) -> Option<Self> {
        let nose = landmarks.get(NOSE_LANDMARK)?;
        let left = landmarks.get(LEFT_EYE_LANDMARK)?;
        let right = landmarks.get(RIGHT_EYE_LANDMARK)?;

        let direction = Vec3::new(
            (nose.x - 0.5) * 2.0,
            (nose.y - 0.5) * 2.0,
            (nose.z - 0.5) * 2.0,
        );
        let head_rotation = Vec3::new(direction.y, direction.x, direction.z) * std::f32::consts::PI;
        let eye_rotation = Vec2::new((left.y - right.y) * 2.0, (left.x - right.x) * 2.0);

        Some(Self {
            head_rotation,
            eye_rotation,
        })
    }
}

/// Supplies landmark frames to the tracker
pub trait LandmarkSource {
    /// Next frame, or `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>>;

    fn name(&self) -> &str;
}

/// Replays a file with one JSON [`LandmarkFrame`] per line
pub struct JsonLinesSource<R> {
    name: String,
    reader: R,
    line: String,
    line_number: usize,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(format!("Failed to open landmark file: {:?}", path))?;
        Ok(Self::from_reader(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn from_reader(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            line: String::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .context(format!("Failed to read {}", self.name))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<LandmarkFrame>(text) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    log::warn!("{}:{}: skipping bad frame: {}", self.name, self.line_number, e);
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// What the HUD shows about tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceTrackingState {
    pub is_tracking: bool,
    pub blend_shapes: BTreeMap<String, f32>,
    pub head_rotation: [f32; 3],
}

pub struct FaceTracker {
    options: FaceMeshOptions,
    source: Box<dyn LandmarkSource + Send>,
    state: FaceTrackingState,
    pose: Option<FacePose>,
    frames: u64,
    finished: bool,
}

impl FaceTracker {
    pub fn new(options: FaceMeshOptions, source: Box<dyn LandmarkSource + Send>) -> Self {
        log::info!(
            "Face tracking from {} (max faces {}, refined {}, confidence {:.2}/{:.2})",
            source.name(),
            options.max_num_faces,
            options.refine_landmarks,
            options.min_detection_confidence,
            options.min_tracking_confidence
        );
        Self {
            options,
            source,
            state: FaceTrackingState::default(),
            pose: None,
            frames: 0,
            finished: false,
        }
    }

    pub fn from_file(options: FaceMeshOptions, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(options, Box::new(JsonLinesSource::open(path)?)))
    }

    pub fn state(&self) -> &FaceTrackingState {
        &self.state
    }

    pub fn pose(&self) -> Option<&FacePose> {
        self.pose.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume one frame from the source. A frame without a usable face
    /// clears `is_tracking` but keeps the last head rotation.
    pub fn update(&mut self) {
        if self.finished {
            return;
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Landmark stream ended after {} frames", self.frames);
                self.finish();
                return;
            }
            Err(e) => {
                log::error!("Face tracking stopped: {:#}", e);
                self.finish();
                return;
            }
        };
        self.frames += 1;

        let max_faces = self.options.max_num_faces.max(1) as usize;
        let pose = frame
            .faces
            .iter()
            .take(max_faces)
            .find_map(|face| FacePose::from_landmarks(face));

        match pose {
            Some(pose) => {
                self.state.is_tracking = true;
                self.state.head_rotation = pose.head_rotation.to_array();
                self.state.blend_shapes = frame.blend_shapes;
                self.pose = Some(pose);
            }
            None => {
                self.state.is_tracking = false;
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.state.is_tracking = false;
    }
}
