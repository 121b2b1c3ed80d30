// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::ViewerConfig;
use crate::loaders::LoadRequest;

#[derive(Parser, Debug, Clone)]
#[command(name = "vrm-viewer")]
#[command(about = "VRM avatar viewer with retargeted Mixamo animation", long_about = None)]
pub struct Cli {
    /// Avatar file (.vrm, .glb or .gltf)
    #[arg(long, default_value = "assets/avatar.vrm")]
    pub model: PathBuf,

    /// Mixamo idle clip exported as glTF/GLB
    #[arg(long = "idle-clip", default_value = "assets/idle.glb")]
    pub idle_clip: PathBuf,

    /// Mixamo run clip exported as glTF/GLB
    #[arg(long = "run-clip", default_value = "assets/run.glb")]
    pub run_clip: PathBuf,

    /// JSON file with tuning values; missing fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Replay face landmarks from a JSON-lines file
    #[arg(long = "face-landmarks")]
    pub face_landmarks: Option<PathBuf>,

    /// Random terrain height range, overrides the config file
    #[arg(long = "terrain-roughness")]
    pub terrain_roughness: Option<f32>,

    /// Start with the HUD hidden
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn load_request(&self) -> LoadRequest {
        LoadRequest {
            model: self.model.clone(),
            idle_clip: self.idle_clip.clone(),
            run_clip: self.run_clip.clone(),
        }
    }

    /// Config file (or defaults) with command-line overrides applied
    pub fn viewer_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(roughness) = self.terrain_roughness {
            config.scene.terrain_roughness = roughness;
        }
        Ok(config.sanitized())
    }
}
