use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::face_tracking::FaceMeshOptions;

/// Follow-camera tuning. Rates are per simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Horizontal distance from the avatar
    pub distance: f32,
    pub initial_height: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub height_speed: f32,
    pub rotation_speed: f32,
    pub smoothing: f32,
}

pub const CAMERA_CONFIG: CameraConfig = CameraConfig {
    fov_degrees: 50.0,
    near: 0.1,
    far: 1000.0,
    distance: 8.0,
    initial_height: 3.0,
    min_height: 1.0,
    max_height: 10.0,
    height_speed: 0.1,
    rotation_speed: 0.02,
    smoothing: 0.05,
};

impl Default for CameraConfig {
    fn default() -> Self {
        CAMERA_CONFIG
    }
}

/// Avatar locomotion, per simulation tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub speed: f32,
    pub rotation_speed: f32,
}

pub const MOVEMENT_CONFIG: MovementConfig = MovementConfig {
    speed: 0.1,
    rotation_speed: 0.1,
};

impl Default for MovementConfig {
    fn default() -> Self {
        MOVEMENT_CONFIG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub rate: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            rate: crate::animation::BLEND_RATE,
        }
    }
}

/// Lighting, sky and terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: String,
    pub fog_near: f32,
    pub fog_far: f32,
    pub ambient_intensity: f32,
    pub light_position: [f32; 3],
    pub light_intensity: f32,
    pub shadow_map_size: u32,
    /// Horizon tint standing in for a sunset environment map
    pub environment_tint: String,
    pub environment_intensity: f32,
    pub terrain_size: f32,
    pub terrain_segments: u32,
    pub terrain_color: String,
    /// Random height variation amplitude; 0 keeps the ground flat
    pub terrain_roughness: f32,
    pub terrain_material_roughness: f32,
    pub terrain_metalness: f32,
    pub terrain_seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: "#87ceeb".into(),
            fog_near: 5.0,
            fog_far: 50.0,
            ambient_intensity: 0.5,
            light_position: [5.0, 5.0, 5.0],
            light_intensity: 1.0,
            shadow_map_size: 1024,
            environment_tint: "#ffb070".into(),
            environment_intensity: 0.35,
            terrain_size: 100.0,
            terrain_segments: 100,
            terrain_color: "#4a4a4a".into(),
            terrain_roughness: 0.0,
            terrain_material_roughness: 0.8,
            terrain_metalness: 0.2,
            terrain_seed: 0x5eed,
        }
    }
}

/// Everything tunable about the viewer, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Simulation ticks per second; the per-tick rates assume 60
    pub tick_rate: f32,
    pub camera: CameraConfig,
    pub movement: MovementConfig,
    pub blend: BlendConfig,
    pub scene: SceneConfig,
    pub face_mesh: FaceMeshOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            camera: CameraConfig::default(),
            movement: MovementConfig::default(),
            blend: BlendConfig::default(),
            scene: SceneConfig::default(),
            face_mesh: FaceMeshOptions::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&text)
            .context(format!("Failed to parse config file: {:?}", path))?;
        log::info!("Loaded config from {:?}", path);
        Ok(config.sanitized())
    }

    /// Clamp values that would break the simulation or the renderer
    pub fn sanitized(mut self) -> Self {
        if !(self.tick_rate > 0.0) {
            log::warn!("tick_rate {} is invalid, using 60", self.tick_rate);
            self.tick_rate = 60.0;
        }
        let camera = &mut self.camera;
        if camera.min_height > camera.max_height {
            std::mem::swap(&mut camera.min_height, &mut camera.max_height);
        }
        camera.initial_height = camera.initial_height.clamp(camera.min_height, camera.max_height);
        camera.smoothing = camera.smoothing.clamp(0.0, 1.0);
        camera.near = camera.near.max(1e-3);
        camera.far = camera.far.max(camera.near + 1.0);
        self.blend.rate = self.blend.rate.clamp(0.0, 1.0);
        self.scene.terrain_segments = self.scene.terrain_segments.clamp(1, 1024);
        self.scene.shadow_map_size = self.scene.shadow_map_size.clamp(256, 8192);
        if !(self.scene.terrain_size.is_finite() && self.scene.terrain_size > 0.0) {
            log::warn!("terrain_size {} is invalid, using 100", self.scene.terrain_size);
            self.scene.terrain_size = 100.0;
        }
        self.scene.terrain_roughness =
            clamp_roughness(self.scene.terrain_roughness, self.scene.terrain_size);
        self
    }
}

/// Height noise amplitude limited to half the ground extent; non-finite values mean flat
pub fn clamp_roughness(roughness: f32, terrain_size: f32) -> f32 {
    if !roughness.is_finite() {
        log::warn!("terrain_roughness {} is not finite, using a flat ground", roughness);
        return 0.0;
    }
    let limit = if terrain_size.is_finite() { terrain_size.abs() * 0.5 } else { 0.0 };
    roughness.clamp(0.0, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_scene_constants() {
        let config = ViewerConfig::default();
        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.camera.fov_degrees, 50.0);
        assert_eq!(config.camera.distance, 8.0);
        assert_eq!(config.camera.initial_height, 3.0);
        assert_eq!(config.movement.speed, 0.1);
        assert_eq!(config.blend.rate, 0.1);
        assert_eq!(config.scene.fog_far, 50.0);
        assert_eq!(config.scene.terrain_roughness, 0.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "camera": { "distance": 12 }, "scene": { "terrain_roughness": 1 } }"#)
                .unwrap();
        assert_eq!(config.camera.distance, 12.0);
        assert_eq!(config.camera.fov_degrees, 50.0);
        assert_eq!(config.scene.terrain_roughness, 1.0);
        assert_eq!(config.scene.background, "#87ceeb");
    }

    #[test]
    fn test_sanitize_fixes_inverted_heights() {
        let mut config = ViewerConfig::default();
        config.camera.min_height = 10.0;
        config.camera.max_height = 1.0;
        config.tick_rate = 0.0;
        let config = config.sanitized();
        assert_eq!(config.camera.min_height, 1.0);
        assert_eq!(config.camera.max_height, 10.0);
        assert_eq!(config.tick_rate, 60.0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ViewerConfig::load("no/such/config.json").is_err());
    }
}
