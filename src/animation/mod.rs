pub mod blend;
pub mod clip;
pub mod mixer;
pub mod pose;
pub mod retarget;

pub use blend::{BlendController, BLEND_RATE};
pub use clip::{AnimationClip, Interpolate, Keyframes, Track, TrackData};
pub use mixer::{ActionId, AnimationAction, AnimationMixer};
pub use pose::NormalizedPose;
pub use retarget::{mixamo_to_vrm, normalize_mixamo_name, retarget_clip, RetargetError, MIXAMO_VRM_RIG_MAP};
