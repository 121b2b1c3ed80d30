use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use glam::{Mat4, Vec3};

use crate::animation::{AnimationMixer, BlendController, NormalizedPose};
use crate::avatar::Avatar;
use crate::camera::FollowCamera;
use crate::config::ViewerConfig;
use crate::core::{Accumulator, Controller};
use crate::face_tracking::FaceTracker;
use crate::hud::{AvatarSummary, HudInfo};
use crate::loaders::{is_model_path, AvatarAsset, LoadJob, LoadRequest, LoadedCharacter};
use crate::movement::{MovementController, MovementState};

/// Most fixed steps simulated for one frame
const MAX_TICKS_PER_FRAME: u8 = 8;

/// The mounted avatar with its animation state
pub struct Character {
    pub avatar: Avatar,
    pub mixer: AnimationMixer,
    pub blend: BlendController,
    pub pose: NormalizedPose,
    pub summary: AvatarSummary,
}

impl Character {
    pub fn new(loaded: LoadedCharacter, blend_rate: f32) -> Self {
        let asset = &loaded.asset;
        let avatar = asset.to_avatar();
        let humanoid = avatar.humanoid();

        let mut mixer = AnimationMixer::new(humanoid.hips_rest_position());
        let idle = mixer.clip_action(Arc::new(loaded.idle));
        let run = mixer.clip_action(Arc::new(loaded.run));
        let blend = BlendController::new(&mut mixer, idle, run, blend_rate);

        let summary = AvatarSummary {
            title: asset
                .meta
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string()),
            version: asset.meta.version.to_string(),
            vertices: asset.vertex_count(),
            triangles: asset.triangle_count(),
            bones: humanoid.bones().count(),
            spring_joints: avatar.spring_joint_count(),
        };

        Self {
            pose: humanoid.rest_pose(),
            avatar,
            mixer,
            blend,
            summary,
        }
    }

    /// Per-tick animation step
    fn tick(&mut self, dt: f32, moving: bool) {
        self.blend.update(&mut self.mixer, moving);
        self.mixer.update(dt);
    }

    /// Evaluate the blended clips and run the avatar's own update
    fn pose(&mut self, dt: f32, root: Mat4, look_target: Vec3) {
        let mut pose = self.mixer.evaluate();
        self.avatar.update(dt, root, Some(look_target), &mut pose);
        self.pose = pose;
    }
}

/// Application state between window events: camera, movement, the mounted
/// character, background loads and the optional face tracker
pub struct Viewer {
    config: ViewerConfig,
    request: LoadRequest,
    camera: FollowCamera,
    movement: MovementController,
    accumulator: Accumulator,
    character: Option<Character>,
    job: Option<LoadJob>,
    face: Option<FaceTracker>,
    last_error: Option<String>,
}

impl Viewer {
    pub fn new(config: ViewerConfig, request: LoadRequest, aspect: f32) -> Self {
        let camera = FollowCamera::new(&config.camera, aspect);
        let movement = MovementController::new(config.movement, config.camera, Vec3::ZERO);
        let accumulator = Accumulator::new(config.tick_rate, MAX_TICKS_PER_FRAME);
        Self {
            config,
            request,
            camera,
            movement,
            accumulator,
            character: None,
            job: None,
            face: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &FollowCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut FollowCamera {
        &mut self.camera
    }

    pub fn movement(&self) -> &MovementState {
        self.movement.state()
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn face_tracker(&self) -> Option<&FaceTracker> {
        self.face.as_ref()
    }

    pub fn set_face_tracker(&mut self, tracker: FaceTracker) {
        self.face = Some(tracker);
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start loading the configured model and clips
    pub fn start_loading(&mut self) -> Result<()> {
        self.spawn(self.request.clone())
    }

    /// Load another model with the configured clips, as for a dropped file
    pub fn request_model(&mut self, path: &Path) -> Result<()> {
        if !is_model_path(path) {
            bail!("{:?} is not a .vrm, .glb or .gltf file", path);
        }
        self.spawn(self.request.with_model(path))
    }

    fn spawn(&mut self, request: LoadRequest) -> Result<()> {
        if let Some(previous) = &self.job {
            log::warn!(
                "Abandoning load of {:?} for {:?}",
                previous.request().model,
                request.model
            );
        }
        self.job = Some(LoadJob::spawn(request)?);
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.job.is_some()
    }

    /// Model path and elapsed seconds of the running load
    pub fn loading_status(&self) -> Option<(String, f32)> {
        self.job.as_ref().map(|job| {
            (
                job.request().model.display().to_string(),
                job.elapsed_secs(),
            )
        })
    }

    /// Check the background load. Returns the asset of a newly mounted
    /// character so the caller can upload it; a failed load keeps the
    /// current character.
    pub fn poll_loading(&mut self) -> Option<AvatarAsset> {
        let result = self.job.as_mut()?.poll()?;
        self.job = None;
        match result {
            Ok(loaded) => {
                self.last_error = None;
                Some(self.install(loaded))
            }
            Err(e) => {
                log::error!("Failed to load avatar: {:#}", e);
                self.last_error = Some(format!("{:#}", e));
                None
            }
        }
    }

    /// Mount a loaded character, replacing the current one
    pub fn install(&mut self, loaded: LoadedCharacter) -> AvatarAsset {
        let asset = loaded.asset.clone();
        let character = Character::new(loaded, self.config.blend.rate);
        log::info!(
            "Mounted {} (VRM {}, {} spring joints)",
            character.summary.title,
            character.summary.version,
            character.summary.spring_joints
        );
        self.character = Some(character);
        asset
    }

    /// Advance the fixed-step simulation by a frame's worth of time, then
    /// pose the avatar for drawing
    pub fn update(&mut self, delta: f32, input: &impl Controller) {
        for step in self.accumulator.tick(delta) {
            self.movement.tick(input, &mut self.camera);
            let moving = self.movement.state().is_moving();
            if let Some(character) = self.character.as_mut() {
                character.tick(step, moving);
            }
        }

        if let Some(character) = self.character.as_mut() {
            let state = self.movement.state();
            let root = character.avatar.root_transform(state.position, state.yaw);
            character.pose(delta, root, self.camera.position);
        }

        if let Some(face) = self.face.as_mut() {
            face.update();
        }
    }

    /// World placement of the mounted avatar
    pub fn root_transform(&self) -> Option<Mat4> {
        let state = self.movement.state();
        self.character
            .as_ref()
            .map(|c| c.avatar.root_transform(state.position, state.yaw))
    }

    pub fn hud_info(&self, fps: f32, adapter: &str) -> HudInfo {
        HudInfo {
            fps,
            adapter: adapter.to_string(),
            avatar: self.character.as_ref().map(|c| c.summary.clone()),
            loading: self.loading_status(),
            last_error: self.last_error.clone(),
            movement: Some(*self.movement.state()),
            run_weight: self
                .character
                .as_ref()
                .map(|c| c.blend.transition())
                .unwrap_or(0.0),
            camera_angle: self.camera.rig.angle,
            camera_height: self.camera.rig.height,
            face: self.face.as_ref().map(|f| f.state().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationClip;
    use crate::avatar::{
        HumanBone, Humanoid, LookAtSettings, Node, Skeleton, SpringBoneSetup, Transform, VrmMeta,
        VrmVersion,
    };
    use crate::core::{Button, HeldButtons};
    use crate::math::AABB;

    fn loaded() -> LoadedCharacter {
        let skeleton = Skeleton::new(vec![
            Node::new("hips", None, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            Node::new("spine", Some(0), Transform::from_translation(Vec3::new(0.0, 0.2, 0.0))),
        ]);
        let humanoid =
            Humanoid::new([(HumanBone::Hips, 0), (HumanBone::Spine, 1)], &skeleton).unwrap();
        LoadedCharacter {
            asset: AvatarAsset {
                meta: VrmMeta {
                    version: VrmVersion::V1,
                    title: Some("Test".into()),
                    author: None,
                },
                skeleton,
                humanoid,
                skins: Vec::new(),
                meshes: Vec::new(),
                materials: Vec::new(),
                textures: Vec::new(),
                springs: SpringBoneSetup::default(),
                look_at: LookAtSettings::default(),
                bounds: AABB::empty(),
            },
            idle: AnimationClip::new("idle", 0.0, Vec::new()),
            run: AnimationClip::new("run", 0.0, Vec::new()),
        }
    }

    fn viewer() -> Viewer {
        Viewer::new(
            ViewerConfig::default(),
            LoadRequest {
                model: "model.vrm".into(),
                idle_clip: "idle.glb".into(),
                run_clip: "run.glb".into(),
            },
            1.0,
        )
    }

    #[test]
    fn test_install_mounts_character() {
        let mut viewer = viewer();
        let asset = viewer.install(loaded());
        assert_eq!(asset.meta.title.as_deref(), Some("Test"));
        let character = viewer.character().unwrap();
        assert_eq!(character.summary.bones, 2);
        assert_eq!(character.summary.version, "1.0");
        assert_eq!(character.blend.transition(), 0.0);
    }

    #[test]
    fn test_holding_forward_blends_toward_run() {
        let mut viewer = viewer();
        viewer.install(loaded());
        let input = HeldButtons::new(&[Button::KeyW]);
        for _ in 0..30 {
            viewer.update(1.0 / 60.0, &input);
        }
        let character = viewer.character().unwrap();
        assert!(character.blend.transition() > 0.9);
        assert!(viewer.movement().position.z < -2.0);
        assert!(viewer.root_transform().is_some());
    }

    #[test]
    fn test_update_without_character_still_moves_camera() {
        let mut viewer = viewer();
        viewer.update(1.0 / 60.0 + 1e-4, &HeldButtons::none());
        assert!(viewer.camera().position.length() > 0.0);
        assert!(viewer.root_transform().is_none());
    }

    #[test]
    fn test_dropped_non_model_is_rejected() {
        let mut viewer = viewer();
        assert!(viewer.request_model(Path::new("notes.txt")).is_err());
        assert!(!viewer.is_loading());
    }

    #[test]
    fn test_hud_info_reflects_state() {
        let mut viewer = viewer();
        viewer.install(loaded());
        let info = viewer.hud_info(60.0, "test adapter");
        assert_eq!(info.avatar.map(|a| a.title), Some("Test".to_string()));
        assert!(info.loading.is_none());
        assert_eq!(info.camera_height, 3.0);
    }
}
