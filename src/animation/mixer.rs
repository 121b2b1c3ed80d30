use std::sync::Arc;

use glam::{Quat, Vec3};

use super::clip::{AnimationClip, TrackData};
use super::NormalizedPose;
use crate::avatar::HumanBone;

/// Handle to an action owned by a mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

/// Playback state of one clip
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,
    pub time: f32,
    pub weight: f32,
    pub time_scale: f32,
    pub looping: bool,
    pub playing: bool,
}

impl AnimationAction {
    fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            weight: 1.0,
            time_scale: 1.0,
            looping: true,
            playing: false,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let duration = self.clip.duration;
        self.time += dt * self.time_scale;
        if duration <= 0.0 {
            self.time = 0.0;
        } else if self.looping {
            self.time = self.time.rem_euclid(duration);
        } else {
            self.time = self.time.clamp(0.0, duration);
        }
    }
}

/// Weighted sum of samples for one property
#[derive(Debug, Clone, Copy)]
struct Accum<T> {
    value: T,
    weight: f32,
}

/// Plays any number of actions and blends them into one normalised pose
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
    rest_hips: Vec3,
    rotations: Vec<Accum<Quat>>,
    hips: Accum<Vec3>,
}

impl AnimationMixer {
    /// `rest_hips` is the model-space hips position the pose falls back to
    pub fn new(rest_hips: Vec3) -> Self {
        Self {
            actions: Vec::new(),
            rest_hips,
            rotations: vec![
                Accum {
                    value: Quat::IDENTITY,
                    weight: 0.0,
                };
                HumanBone::COUNT
            ],
            hips: Accum {
                value: rest_hips,
                weight: 0.0,
            },
        }
    }

    pub fn clip_action(&mut self, clip: Arc<AnimationClip>) -> ActionId {
        self.actions.push(AnimationAction::new(clip));
        ActionId(self.actions.len() - 1)
    }

    pub fn action(&self, id: ActionId) -> &AnimationAction {
        &self.actions[id.0]
    }

    pub fn action_mut(&mut self, id: ActionId) -> &mut AnimationAction {
        &mut self.actions[id.0]
    }

    pub fn play(&mut self, id: ActionId) {
        self.actions[id.0].playing = true;
    }

    pub fn stop(&mut self, id: ActionId) {
        let action = &mut self.actions[id.0];
        action.playing = false;
        action.time = 0.0;
    }

    pub fn set_weight(&mut self, id: ActionId, weight: f32) {
        self.actions[id.0].set_weight(weight);
    }

    pub fn update(&mut self, dt: f32) {
        for action in self.actions.iter_mut() {
            action.advance(dt);
        }
    }

    /// Blend every playing action. Properties whose total weight is below
    /// one are pulled back toward the rest pose by the remainder.
    pub fn evaluate(&mut self) -> NormalizedPose {
        for accum in self.rotations.iter_mut() {
            *accum = Accum {
                value: Quat::IDENTITY,
                weight: 0.0,
            };
        }
        self.hips = Accum {
            value: self.rest_hips,
            weight: 0.0,
        };

        for action in self.actions.iter().filter(|a| a.playing && a.weight > 0.0) {
            let w = action.weight;
            for track in &action.clip.tracks {
                match &track.data {
                    TrackData::Rotation(keys) => {
                        if let Some(q) = keys.sample(action.time) {
                            let accum = &mut self.rotations[track.bone.index()];
                            accumulate(accum, q, w, Quat::slerp);
                        }
                    }
                    TrackData::Translation(keys) if track.bone == HumanBone::Hips => {
                        if let Some(v) = keys.sample(action.time) {
                            accumulate(&mut self.hips, v, w, Vec3::lerp);
                        }
                    }
                    TrackData::Translation(_) => {}
                }
            }
        }

        let mut pose = NormalizedPose::rest(self.rest_hips);
        for (bone, accum) in HumanBone::ALL.iter().zip(self.rotations.iter()) {
            if accum.weight > 0.0 {
                let q = if accum.weight < 1.0 {
                    accum.value.slerp(Quat::IDENTITY, 1.0 - accum.weight)
                } else {
                    accum.value
                };
                pose.set_rotation(*bone, q);
            }
        }
        if self.hips.weight > 0.0 {
            let v = if self.hips.weight < 1.0 {
                self.hips.value.lerp(self.rest_hips, 1.0 - self.hips.weight)
            } else {
                self.hips.value
            };
            pose.set_hips_position(v);
        }
        pose
    }
}

fn accumulate<T: Copy>(accum: &mut Accum<T>, value: T, weight: f32, mix: fn(T, T, f32) -> T) {
    if accum.weight == 0.0 {
        accum.value = value;
        accum.weight = weight;
    } else {
        accum.weight += weight;
        accum.value = mix(accum.value, value, weight / accum.weight);
    }
}
