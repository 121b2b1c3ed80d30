use std::path::Path;

use anyhow::{Context, Result};
use glam::{Quat, Vec3};

use super::scene_graph::skeleton_from_document;
use crate::animation::{Keyframes, RetargetError};
use crate::avatar::Skeleton;

/// Name Mixamo gives the take when exporting a clip
pub const MIXAMO_CLIP_NAME: &str = "mixamo.com";

#[derive(Debug, Clone, PartialEq)]
pub enum MocapProperty {
    Rotation(Keyframes<Quat>),
    Translation(Keyframes<Vec3>),
    Scale(Keyframes<Vec3>),
}

/// Keyframes for one property of one source node
#[derive(Debug, Clone, PartialEq)]
pub struct MocapChannel {
    pub node: usize,
    pub property: MocapProperty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MocapAnimation {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<MocapChannel>,
}

/// Source rig and animations of a motion-capture file
#[derive(Debug, Clone)]
pub struct MocapAsset {
    pub skeleton: Skeleton,
    pub animations: Vec<MocapAnimation>,
}

impl MocapAsset {
    pub fn new(skeleton: Skeleton, animations: Vec<MocapAnimation>) -> Self {
        Self {
            skeleton,
            animations,
        }
    }

    /// The animation called `name`, falling back to the first one
    pub fn clip(&self, name: &str) -> Result<&MocapAnimation, RetargetError> {
        self.animations
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.animations.first())
            .ok_or(RetargetError::NoAnimation)
    }
}

/// Load a glTF/GLB export of a motion-capture clip
pub fn load_mocap(path: impl AsRef<Path>) -> Result<MocapAsset> {
    let path = path.as_ref();
    log::info!("Loading motion clip: {:?}", path);

    let bytes = std::fs::read(path).context(format!("Failed to read motion file: {:?}", path))?;
    load_mocap_from_slice(&bytes, path.parent())
        .context(format!("Failed to load motion file: {:?}", path))
}

/// Parse a motion clip held in memory. `base` resolves external buffer URIs.
pub fn load_mocap_from_slice(bytes: &[u8], base: Option<&Path>) -> Result<MocapAsset> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).context("Invalid glTF")?;
    let buffers =
        gltf::import_buffers(&document, base, blob).context("Failed to load glTF buffers")?;

    let skeleton = skeleton_from_document(&document);
    let animations: Vec<MocapAnimation> = document
        .animations()
        .map(|animation| read_animation(&animation, &buffers))
        .collect();

    log::info!(
        "Motion clip loaded: {} nodes, {} animation(s)",
        skeleton.len(),
        animations.len()
    );
    for animation in &animations {
        log::debug!(
            "  {:?}: {:.2}s, {} channels",
            animation.name,
            animation.duration,
            animation.channels.len()
        );
    }

    Ok(MocapAsset::new(skeleton, animations))
}

fn read_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> MocapAnimation {
    let mut channels = Vec::new();
    let mut duration = 0.0f32;

    for (index, channel) in animation.channels().enumerate() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| b.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        if !is_ascending(&times) {
            log::warn!(
                "Skipping channel {} of {:?}: key times are not finite and ascending",
                index,
                animation.name().unwrap_or("<unnamed>")
            );
            continue;
        }
        duration = times.iter().copied().fold(duration, f32::max);

        let cubic = channel.sampler().interpolation() == gltf::animation::Interpolation::CubicSpline;
        let node = channel.target().node().index();

        let property = match reader.read_outputs() {
            Some(gltf::animation::util::ReadOutputs::Rotations(rotations)) => {
                let values = spline_values(rotations.into_f32().map(Quat::from_array).collect(), cubic);
                MocapProperty::Rotation(Keyframes::new(times, values))
            }
            Some(gltf::animation::util::ReadOutputs::Translations(translations)) => {
                let values = spline_values(translations.map(Vec3::from).collect(), cubic);
                MocapProperty::Translation(Keyframes::new(times, values))
            }
            Some(gltf::animation::util::ReadOutputs::Scales(scales)) => {
                let values = spline_values(scales.map(Vec3::from).collect(), cubic);
                MocapProperty::Scale(Keyframes::new(times, values))
            }
            Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) | None => continue,
        };
        channels.push(MocapChannel { node, property });
    }

    MocapAnimation {
        name: animation
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("animation_{}", animation.index())),
        duration,
        channels,
    }
}

fn is_ascending(times: &[f32]) -> bool {
    times.iter().all(|t| t.is_finite()) && times.windows(2).all(|w| w[0] <= w[1])
}

/// Cubic-spline samplers store (in-tangent, value, out-tangent) triples;
/// keep the values and play them back linearly.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}
