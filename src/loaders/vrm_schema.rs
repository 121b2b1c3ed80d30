//! Serde model of the VRM extensions. Only the fields the viewer reads are
//! declared; everything else in the JSON is ignored.

use std::collections::HashMap;

use glam::Vec3;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoot {
    #[serde(default)]
    pub extensions: RootExtensions,
    #[serde(default)]
    pub materials: Vec<RawMaterial>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RootExtensions {
    #[serde(rename = "VRM")]
    pub vrm0: Option<Vrm0>,
    #[serde(rename = "VRMC_vrm")]
    pub vrm1: Option<Vrm1>,
    #[serde(rename = "VRMC_springBone")]
    pub spring_bone1: Option<SpringBone1>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawMaterial {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub extensions: MaterialExtensions,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialExtensions {
    #[serde(rename = "KHR_materials_unlit")]
    pub unlit: Option<serde_json::Value>,
    #[serde(rename = "VRMC_materials_mtoon")]
    pub mtoon: Option<serde_json::Value>,
}

/// `{x, y, z}` object used by 0.x
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Vec3Obj {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vec3Obj {
    /// 0.x stores vectors with Z mirrored against glTF
    pub fn to_gltf(self) -> Vec3 {
        Vec3::new(self.x, self.y, -self.z)
    }
}

// ---- VRM 0.x ----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0 {
    #[serde(default)]
    pub meta: Vrm0Meta,
    #[serde(default)]
    pub humanoid: Vrm0Humanoid,
    #[serde(default)]
    pub first_person: Option<Vrm0FirstPerson>,
    #[serde(default)]
    pub secondary_animation: Option<Vrm0SecondaryAnimation>,
    #[serde(default)]
    pub material_properties: Vec<Vrm0MaterialProperty>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Vrm0Meta {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0Humanoid {
    #[serde(default)]
    pub human_bones: Vec<Vrm0HumanBone>,
}

#[derive(Debug, Deserialize)]
pub struct Vrm0HumanBone {
    pub bone: String,
    pub node: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0FirstPerson {
    pub first_person_bone: Option<i64>,
    pub first_person_bone_offset: Option<Vec3Obj>,
    pub look_at_type_name: Option<String>,
    pub look_at_horizontal_inner: Option<Vrm0DegreeMap>,
    pub look_at_horizontal_outer: Option<Vrm0DegreeMap>,
    pub look_at_vertical_down: Option<Vrm0DegreeMap>,
    pub look_at_vertical_up: Option<Vrm0DegreeMap>,
}

/// 0.x range map; the curve is ignored and treated as linear
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0DegreeMap {
    #[serde(default = "default_input_max")]
    pub x_range: f32,
    #[serde(default = "default_output_scale")]
    pub y_range: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0SecondaryAnimation {
    #[serde(default)]
    pub bone_groups: Vec<Vrm0BoneGroup>,
    #[serde(default)]
    pub collider_groups: Vec<Vrm0ColliderGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm0BoneGroup {
    /// Misspelled in the 0.x schema
    #[serde(default = "default_stiffness", alias = "stiffness")]
    pub stiffiness: f32,
    #[serde(default)]
    pub gravity_power: f32,
    #[serde(default)]
    pub gravity_dir: Option<Vec3Obj>,
    #[serde(default = "default_drag")]
    pub drag_force: f32,
    #[serde(default)]
    pub hit_radius: f32,
    #[serde(default)]
    pub bones: Vec<i64>,
    #[serde(default)]
    pub collider_groups: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Vrm0ColliderGroup {
    pub node: i64,
    #[serde(default)]
    pub colliders: Vec<Vrm0Collider>,
}

#[derive(Debug, Deserialize)]
pub struct Vrm0Collider {
    #[serde(default)]
    pub offset: Vec3Obj,
    #[serde(default)]
    pub radius: f32,
}

#[derive(Debug, Default, Deserialize)]
pub struct Vrm0MaterialProperty {
    pub name: Option<String>,
    pub shader: Option<String>,
}

// ---- VRM 1.0 ----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm1 {
    #[serde(default)]
    pub spec_version: Option<String>,
    #[serde(default)]
    pub meta: Vrm1Meta,
    #[serde(default)]
    pub humanoid: Vrm1Humanoid,
    #[serde(default)]
    pub look_at: Option<Vrm1LookAt>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Vrm1Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm1Humanoid {
    #[serde(default)]
    pub human_bones: HashMap<String, Vrm1HumanBone>,
}

#[derive(Debug, Deserialize)]
pub struct Vrm1HumanBone {
    pub node: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm1LookAt {
    pub offset_from_head_bone: Option<[f32; 3]>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub range_map_horizontal_inner: Option<Vrm1RangeMap>,
    pub range_map_horizontal_outer: Option<Vrm1RangeMap>,
    pub range_map_vertical_down: Option<Vrm1RangeMap>,
    pub range_map_vertical_up: Option<Vrm1RangeMap>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm1RangeMap {
    #[serde(default = "default_input_max")]
    pub input_max_value: f32,
    #[serde(default = "default_output_scale")]
    pub output_scale: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringBone1 {
    #[serde(default)]
    pub colliders: Vec<Spring1Collider>,
    #[serde(default)]
    pub collider_groups: Vec<Spring1ColliderGroup>,
    #[serde(default)]
    pub springs: Vec<Spring1Spring>,
}

#[derive(Debug, Deserialize)]
pub struct Spring1Collider {
    pub node: i64,
    pub shape: Spring1Shape,
}

#[derive(Debug, Deserialize)]
pub struct Spring1Shape {
    pub sphere: Option<Spring1Sphere>,
    pub capsule: Option<Spring1Capsule>,
}

#[derive(Debug, Deserialize)]
pub struct Spring1Sphere {
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub radius: f32,
}

#[derive(Debug, Deserialize)]
pub struct Spring1Capsule {
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub tail: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub struct Spring1ColliderGroup {
    #[serde(default)]
    pub colliders: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spring1Spring {
    #[serde(default)]
    pub joints: Vec<Spring1Joint>,
    #[serde(default)]
    pub collider_groups: Vec<i64>,
    pub center: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spring1Joint {
    pub node: i64,
    #[serde(default)]
    pub hit_radius: f32,
    #[serde(default = "default_stiffness")]
    pub stiffness: f32,
    #[serde(default)]
    pub gravity_power: f32,
    #[serde(default = "default_gravity_dir")]
    pub gravity_dir: [f32; 3],
    #[serde(default = "default_drag")]
    pub drag_force: f32,
}

fn default_input_max() -> f32 {
    90.0
}

fn default_output_scale() -> f32 {
    10.0
}

fn default_stiffness() -> f32 {
    1.0
}

fn default_drag() -> f32 {
    0.5
}

fn default_gravity_dir() -> [f32; 3] {
    [0.0, -1.0, 0.0]
}

/// Valid node index, or `None` for the schema's -1 / out-of-range sentinels
pub fn node_index(raw: i64, node_count: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&n| n < node_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_vrm0_extension() {
        let json = r#"{
            "extensions": { "VRM": {
                "meta": { "title": "Girl", "author": "pixiv" },
                "humanoid": { "humanBones": [
                    { "bone": "hips", "node": 2 },
                    { "bone": "leftThumbProximal", "node": 9 }
                ] },
                "firstPerson": {
                    "firstPersonBone": 5,
                    "firstPersonBoneOffset": { "x": 0, "y": 0.06, "z": 0.02 },
                    "lookAtTypeName": "Bone",
                    "lookAtHorizontalOuter": { "curve": [0, 0, 0, 1], "xRange": 90, "yRange": 12 }
                },
                "secondaryAnimation": {
                    "boneGroups": [ { "stiffiness": 0.8, "gravityPower": 0.1,
                        "gravityDir": { "x": 0, "y": -1, "z": 0 }, "dragForce": 0.3,
                        "center": -1, "hitRadius": 0.02, "bones": [7], "colliderGroups": [0] } ],
                    "colliderGroups": [ { "node": 5, "colliders": [ { "offset": { "x": 0, "y": 0.1, "z": 0.5 }, "radius": 0.1 } ] } ]
                }
            } }
        }"#;
        let root: RawRoot = serde_json::from_str(json).unwrap();
        let vrm = root.extensions.vrm0.unwrap();
        assert_eq!(vrm.meta.title.as_deref(), Some("Girl"));
        assert_eq!(vrm.humanoid.human_bones.len(), 2);

        let fp = vrm.first_person.unwrap();
        assert_eq!(fp.look_at_type_name.as_deref(), Some("Bone"));
        assert_eq!(fp.look_at_horizontal_outer.unwrap().y_range, 12.0);
        assert!(fp.look_at_vertical_up.is_none());
        assert_eq!(fp.first_person_bone_offset.unwrap().to_gltf(), Vec3::new(0.0, 0.06, -0.02));

        let sa = vrm.secondary_animation.unwrap();
        assert_eq!(sa.bone_groups[0].stiffiness, 0.8);
        assert_eq!(sa.collider_groups[0].colliders[0].offset.to_gltf().z, -0.5);
    }

    #[test]
    fn test_parses_vrm1_extensions() {
        let json = r#"{
            "extensions": {
                "VRMC_vrm": {
                    "specVersion": "1.0",
                    "meta": { "name": "Avatar", "authors": ["a", "b"] },
                    "humanoid": { "humanBones": { "hips": { "node": 1 }, "head": { "node": 4 } } },
                    "lookAt": { "offsetFromHeadBone": [0, 0.05, 0], "type": "bone",
                        "rangeMapHorizontalInner": { "inputMaxValue": 60, "outputScale": 8 } }
                },
                "VRMC_springBone": {
                    "colliders": [ { "node": 4, "shape": { "capsule": { "offset": [0,0,0], "radius": 0.1, "tail": [0,0.2,0] } } } ],
                    "colliderGroups": [ { "colliders": [0] } ],
                    "springs": [ { "joints": [ { "node": 5 }, { "node": 6, "stiffness": 2 } ], "colliderGroups": [0] } ]
                }
            },
            "materials": [ { "name": "skin", "extensions": { "KHR_materials_unlit": {} } }, { "name": "cloth" } ]
        }"#;
        let root: RawRoot = serde_json::from_str(json).unwrap();
        let vrm = root.extensions.vrm1.unwrap();
        assert_eq!(vrm.humanoid.human_bones["head"].node, 4);
        let look_at = vrm.look_at.unwrap();
        assert_eq!(look_at.range_map_horizontal_inner.unwrap().input_max_value, 60.0);
        assert!(look_at.range_map_vertical_up.is_none());

        let springs = root.extensions.spring_bone1.unwrap();
        assert!(springs.colliders[0].shape.capsule.is_some());
        assert_eq!(springs.springs[0].joints[0].stiffness, 1.0);
        assert_eq!(springs.springs[0].joints[0].drag_force, 0.5);
        assert_eq!(springs.springs[0].joints[1].stiffness, 2.0);

        assert!(root.materials[0].extensions.unlit.is_some());
        assert!(root.materials[1].extensions.unlit.is_none());
    }

    #[test]
    fn test_node_index_rejects_sentinels() {
        assert_eq!(node_index(-1, 10), None);
        assert_eq!(node_index(10, 10), None);
        assert_eq!(node_index(3, 10), Some(3));
    }
}
