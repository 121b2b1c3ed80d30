use glam::{Quat, Vec3};

use super::NormalizedPose;
use crate::avatar::HumanBone;

/// Values that can be blended between two keyframes
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

/// Linear keyframe track. Times are ascending seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    times: Vec<f32>,
    values: Vec<T>,
}

impl<T: Interpolate> Keyframes<T> {
    /// Pairs times with values, truncating to the shorter of the two
    pub fn new(mut times: Vec<f32>, mut values: Vec<T>) -> Self {
        let len = times.len().min(values.len());
        times.truncate(len);
        values.truncate(len);
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn map<U: Interpolate>(&self, f: impl FnMut(T) -> U) -> Keyframes<U> {
        Keyframes {
            times: self.times.clone(),
            values: self.values.iter().copied().map(f).collect(),
        }
    }

    /// Value at `time`, clamped to the first and last keys
    pub fn sample(&self, time: f32) -> Option<T> {
        let first = *self.values.first()?;
        if self.times.len() == 1 || time <= self.times[0] {
            return Some(first);
        }
        let next = self.times.partition_point(|&t| t <= time);
        if next == 0 {
            return Some(first);
        }
        if next >= self.times.len() {
            return self.values.last().copied();
        }
        let (t0, t1) = (self.times[next - 1], self.times[next]);
        let span = t1 - t0;
        let alpha = if span > f32::EPSILON {
            (time - t0) / span
        } else {
            0.0
        };
        Some(T::interpolate(self.values[next - 1], self.values[next], alpha))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackData {
    Rotation(Keyframes<Quat>),
    /// Model-space hips position
    Translation(Keyframes<Vec3>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub bone: HumanBone,
    pub data: TrackData,
}

impl Track {
    pub fn end_time(&self) -> f32 {
        match &self.data {
            TrackData::Rotation(k) => k.end_time(),
            TrackData::Translation(k) => k.end_time(),
        }
    }
}

/// Animation in the humanoid bone namespace. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// Clip whose duration is the last keyframe time
    pub fn from_tracks(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks.iter().map(Track::end_time).fold(0.0, f32::max);
        Self::new(name, duration, tracks)
    }

    pub fn sample_into(&self, time: f32, pose: &mut NormalizedPose) {
        for track in &self.tracks {
            match &track.data {
                TrackData::Rotation(keys) => {
                    if let Some(q) = keys.sample(time) {
                        pose.set_rotation(track.bone, q);
                    }
                }
                TrackData::Translation(keys) => {
                    if track.bone == HumanBone::Hips {
                        if let Some(v) = keys.sample(time) {
                            pose.set_hips_position(v);
                        }
                    }
                }
            }
        }
    }
}
