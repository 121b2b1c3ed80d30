pub mod job;
pub mod mocap;
mod scene_graph;
pub mod vrm;
pub mod vrm_schema;

pub use job::{load_character, LoadJob, LoadRequest, LoadedCharacter};
pub use mocap::{load_mocap, load_mocap_from_slice, MocapAnimation, MocapAsset, MocapChannel, MocapProperty, MIXAMO_CLIP_NAME};
pub use vrm::{
    load_vrm, load_vrm_from_slice, AlphaMode, AvatarAsset, Material, MeshInstance, MeshPrimitive,
    TextureData, VrmError,
};

/// Extensions accepted for avatar files, including drag and drop
pub const MODEL_EXTENSIONS: &[&str] = &["vrm", "glb", "gltf"];

pub fn is_model_path(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MODEL_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_model_extensions() {
        assert!(is_model_path(Path::new("avatar.vrm")));
        assert!(is_model_path(Path::new("dir/Avatar.GLB")));
        assert!(is_model_path(Path::new("scene.gltf")));
        assert!(!is_model_path(Path::new("notes.txt")));
        assert!(!is_model_path(Path::new("vrm")));
    }
}
