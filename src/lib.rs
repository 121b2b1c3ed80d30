pub mod animation;
pub mod avatar;
pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod face_tracking;
pub mod gpu_model;
pub mod hud;
pub mod loaders;
pub mod math;
pub mod movement;
pub mod renderer;
pub mod scene;
pub mod types;
pub mod viewer;

pub use avatar::{Avatar, HumanBone, Humanoid, VrmVersion};
pub use config::ViewerConfig;
pub use viewer::Viewer;
