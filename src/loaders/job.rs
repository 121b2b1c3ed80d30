use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use super::mocap::{load_mocap, MIXAMO_CLIP_NAME};
use super::vrm::{load_vrm, AvatarAsset};
use crate::animation::{retarget_clip, AnimationClip};
use crate::avatar::Humanoid;
use crate::avatar::VrmVersion;

/// Files that make up one character
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub model: PathBuf,
    pub idle_clip: PathBuf,
    pub run_clip: PathBuf,
}

impl LoadRequest {
    /// Same clips, different model
    pub fn with_model(&self, model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

/// A loaded avatar with both clips retargeted onto it
#[derive(Debug, Clone)]
pub struct LoadedCharacter {
    pub asset: AvatarAsset,
    pub idle: AnimationClip,
    pub run: AnimationClip,
}

/// Load the model and retarget both clips. A clip that fails to load is
/// replaced by an empty one so the avatar still appears in its rest pose.
pub fn load_character(request: &LoadRequest) -> Result<LoadedCharacter> {
    let asset = load_vrm(&request.model)?;
    let version = asset.meta.version;

    let idle = clip_or_rest("idle", &request.idle_clip, &asset.humanoid, version);
    let run = clip_or_rest("run", &request.run_clip, &asset.humanoid, version);

    Ok(LoadedCharacter { asset, idle, run })
}

fn clip_or_rest(label: &str, path: &Path, humanoid: &Humanoid, version: VrmVersion) -> AnimationClip {
    match load_clip(path, humanoid, version) {
        Ok(clip) => clip,
        Err(e) => {
            log::error!("Could not load {} clip: {:#}", label, e);
            AnimationClip::new(label, 0.0, Vec::new())
        }
    }
}

pub fn load_clip(path: &Path, humanoid: &Humanoid, version: VrmVersion) -> Result<AnimationClip> {
    let mocap = load_mocap(path)?;
    let animation = mocap
        .clip(MIXAMO_CLIP_NAME)
        .context(format!("No usable animation in {:?}", path))?;
    let clip = retarget_clip(&mocap, animation, humanoid, version)
        .context(format!("Failed to retarget {:?}", path))?;
    Ok(clip)
}

/// Character load running on a worker thread
pub struct LoadJob {
    request: LoadRequest,
    receiver: Receiver<Result<LoadedCharacter>>,
    started: Instant,
}

impl LoadJob {
    pub fn spawn(request: LoadRequest) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker_request = request.clone();
        thread::Builder::new()
            .name("character-loader".into())
            .spawn(move || {
                let result = load_character(&worker_request);
                // The viewer may have exited and dropped the receiver
                sender.send(result).ok();
            })
            .context("Failed to spawn loader thread")?;

        Ok(Self {
            request,
            receiver,
            started: Instant::now(),
        })
    }

    pub fn request(&self) -> &LoadRequest {
        &self.request
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// `Some` once the worker has finished, `None` while it is still running
    pub fn poll(&mut self) -> Option<Result<LoadedCharacter>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                log::info!(
                    "Loading {:?} took {:.2}s",
                    self.request.model,
                    self.elapsed_secs()
                );
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(anyhow!("Loader thread exited without a result")))
            }
        }
    }
}
