use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use thiserror::Error;

use super::scene_graph::{scene_roots, skeleton_from_document};
use super::vrm_schema::{node_index, RawRoot, SpringBone1, Vrm0, Vrm0DegreeMap, Vrm1, Vrm1RangeMap};
use crate::avatar::{
    Avatar, Collider, ColliderShape, HumanBone, Humanoid, HumanoidError, LookAtSettings,
    LookAtType, RangeMap, Skeleton, Skin, SpringBoneSetup, SpringJointDesc, SpringSettings,
    VrmMeta, VrmVersion,
};
use crate::math::{vertex_normals, AABB};
use crate::types::SkinnedVertex;

#[derive(Debug, Error)]
pub enum VrmError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not a valid glTF file: {0}")]
    InvalidGltf(#[from] gltf::Error),
    #[error("malformed VRM extension: {0}")]
    InvalidExtension(#[from] serde_json::Error),
    #[error("file has neither a VRM nor a VRMC_vrm extension")]
    MissingExtension,
    #[error(transparent)]
    Humanoid(#[from] HumanoidError),
}

/// RGBA8 pixels of one glTF image
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    /// Index into `AvatarAsset::textures`
    pub base_color_texture: Option<usize>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub unlit: bool,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            metallic: 0.0,
            roughness: 1.0,
            unlit: false,
            double_sided: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshPrimitive {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

/// A mesh placed on a node, skinned when `skin` is set
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub name: Option<String>,
    pub node: usize,
    pub skin: Option<usize>,
    pub primitives: Vec<MeshPrimitive>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// Everything read from a VRM file, before any GPU upload
#[derive(Debug, Clone)]
pub struct AvatarAsset {
    pub meta: VrmMeta,
    pub skeleton: Skeleton,
    pub humanoid: Humanoid,
    pub skins: Vec<Skin>,
    pub meshes: Vec<MeshInstance>,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureData>,
    pub springs: SpringBoneSetup,
    pub look_at: LookAtSettings,
    pub bounds: AABB,
}

impl AvatarAsset {
    pub fn vertex_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| m.primitives.iter())
            .map(|p| p.vertices.len())
            .sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| m.primitives.iter())
            .map(|p| p.indices.len() / 3)
            .sum()
    }

    /// Runtime avatar posed through this asset's rig
    pub fn to_avatar(&self) -> Avatar {
        Avatar::new(
            self.meta.clone(),
            self.skeleton.clone(),
            self.skins.clone(),
            self.humanoid.clone(),
            &self.springs,
            self.look_at,
        )
    }
}

/// Load a `.vrm` (or VRM-carrying `.glb`/`.gltf`) file
pub fn load_vrm(path: impl AsRef<Path>) -> Result<AvatarAsset> {
    let path = path.as_ref();
    log::info!("Loading VRM file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|source| VrmError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_vrm_from_slice(&bytes, path.parent())
        .context(format!("Failed to load VRM file: {:?}", path))
}

/// Parse a VRM held in memory. `base` resolves external buffer and image URIs.
pub fn load_vrm_from_slice(bytes: &[u8], base: Option<&Path>) -> Result<AvatarAsset> {
    let json = json_chunk(bytes)?;
    let raw: RawRoot = serde_json::from_slice(&json).map_err(VrmError::from)?;

    let gltf::Gltf { document, blob } = match gltf::Gltf::from_slice(bytes) {
        Ok(gltf) => gltf,
        Err(e) => {
            log::warn!("glTF validation failed ({}), loading without validation", e);
            gltf::Gltf::from_slice_without_validation(bytes).map_err(VrmError::from)?
        }
    };
    let buffers = gltf::import_buffers(&document, base, blob)
        .map_err(VrmError::from)
        .context("Failed to load glTF buffers")?;
    let images = gltf::import_images(&document, base, &buffers)
        .map_err(VrmError::from)
        .context("Failed to decode glTF images")?;

    let skeleton = skeleton_from_document(&document);
    let node_count = skeleton.len();

    let RawRoot {
        extensions,
        materials: raw_materials,
    } = raw;

    let (meta, bone_map, look_at, springs, unlit_shaders) =
        match (extensions.vrm1, extensions.vrm0) {
            (Some(vrm1), _) => {
                let springs = extensions
                    .spring_bone1
                    .map(|s| springs_from_vrm1(&s, node_count))
                    .unwrap_or_default();
                let (meta, bones, look_at) = read_vrm1(vrm1, node_count);
                (meta, bones, look_at, springs, Vec::new())
            }
            (None, Some(vrm0)) => {
                let springs = springs_from_vrm0(&vrm0, &skeleton);
                let unlit = vrm0
                    .material_properties
                    .iter()
                    .map(|p| {
                        p.shader
                            .as_deref()
                            .map(|s| s.contains("Unlit"))
                            .unwrap_or(false)
                    })
                    .collect();
                let (meta, bones, look_at) = read_vrm0(vrm0, node_count);
                (meta, bones, look_at, springs, unlit)
            }
            (None, None) => return Err(VrmError::MissingExtension.into()),
        };

    let humanoid = Humanoid::new(bone_map, &skeleton).map_err(VrmError::from)?;

    let textures = images.iter().map(to_rgba8).collect::<Vec<_>>();
    let materials = document
        .materials()
        .enumerate()
        .map(|(i, m)| {
            let unlit = raw_materials
                .get(i)
                .map(|r| r.extensions.unlit.is_some())
                .unwrap_or(false)
                || unlit_shaders.get(i).copied().unwrap_or(false);
            read_material(&m, unlit)
        })
        .collect::<Vec<_>>();

    let skins = document
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let inverse_bind = skin
                .reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()))
                .read_inverse_bind_matrices()
                .map(|it| it.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);
            Skin {
                joints,
                inverse_bind,
            }
        })
        .collect::<Vec<_>>();

    let mut meshes = Vec::new();
    let mut visited = vec![false; document.nodes().count()];
    let mut stack: Vec<gltf::Node> = scene_roots(&document)
        .into_iter()
        .filter_map(|i| document.nodes().nth(i))
        .collect();
    while let Some(node) = stack.pop() {
        if std::mem::replace(&mut visited[node.index()], true) {
            continue;
        }
        if let Some(mesh) = node.mesh() {
            meshes.push(read_mesh(&node, &mesh, &buffers)?);
        }
        stack.extend(node.children());
    }

    let bounds = compute_bounds(&meshes, &skeleton, &skins);

    let asset = AvatarAsset {
        meta,
        skeleton,
        humanoid,
        skins,
        meshes,
        materials,
        textures,
        springs,
        look_at,
        bounds,
    };

    log::info!(
        "VRM {} loaded: {:?} by {:?}",
        asset.meta.version,
        asset.meta.title.as_deref().unwrap_or("untitled"),
        asset.meta.author.as_deref().unwrap_or("unknown")
    );
    log::info!(
        "  {} nodes, {} meshes, {} vertices, {} triangles, {} materials, {} textures",
        asset.skeleton.len(),
        asset.meshes.len(),
        asset.vertex_count(),
        asset.triangle_count(),
        asset.materials.len(),
        asset.textures.len()
    );
    log::info!(
        "  {} humanoid bones, {} spring joints, height {:.2}",
        asset.humanoid.bones().count(),
        asset.springs.joints.len(),
        asset.bounds.size().y
    );

    Ok(asset)
}

fn json_chunk(bytes: &[u8]) -> Result<Cow<'_, [u8]>, VrmError> {
    if bytes.starts_with(b"glTF") {
        Ok(gltf::Glb::from_slice(bytes)?.json)
    } else {
        Ok(Cow::Borrowed(bytes))
    }
}

fn read_vrm1(vrm: Vrm1, node_count: usize) -> (VrmMeta, Vec<(HumanBone, usize)>, LookAtSettings) {
    let meta = VrmMeta {
        version: VrmVersion::V1,
        title: vrm.meta.name,
        author: if vrm.meta.authors.is_empty() {
            None
        } else {
            Some(vrm.meta.authors.join(", "))
        },
    };

    let mut bones = Vec::new();
    for (name, bone) in &vrm.humanoid.human_bones {
        match (HumanBone::from_name(name), node_index(bone.node, node_count)) {
            (Some(b), Some(n)) => bones.push((b, n)),
            (None, _) => log::debug!("Ignoring unknown human bone {:?}", name),
            (_, None) => log::warn!("Human bone {} points at invalid node {}", name, bone.node),
        }
    }

    let mut look_at = LookAtSettings::default();
    if let Some(schema) = vrm.look_at {
        if let Some(offset) = schema.offset_from_head_bone {
            look_at.offset_from_head = Vec3::from(offset);
        }
        look_at.kind = match schema.kind.as_deref() {
            Some("expression") => LookAtType::Expression,
            _ => LookAtType::Bone,
        };
        let map = |m: Option<Vrm1RangeMap>| {
            m.map(|m| RangeMap {
                input_max_value: m.input_max_value,
                output_scale: m.output_scale,
            })
            .unwrap_or_default()
        };
        look_at.horizontal_inner = map(schema.range_map_horizontal_inner);
        look_at.horizontal_outer = map(schema.range_map_horizontal_outer);
        look_at.vertical_down = map(schema.range_map_vertical_down);
        look_at.vertical_up = map(schema.range_map_vertical_up);
    }

    (meta, bones, look_at)
}

fn read_vrm0(vrm: Vrm0, node_count: usize) -> (VrmMeta, Vec<(HumanBone, usize)>, LookAtSettings) {
    let meta = VrmMeta {
        version: VrmVersion::V0,
        title: vrm.meta.title,
        author: vrm.meta.author,
    };

    let mut bones = Vec::new();
    for bone in &vrm.humanoid.human_bones {
        let node = bone.node.and_then(|n| node_index(n, node_count));
        match (HumanBone::from_vrm0_name(&bone.bone), node) {
            (Some(b), Some(n)) => bones.push((b, n)),
            (None, _) => log::debug!("Ignoring unknown human bone {:?}", bone.bone),
            (_, None) => log::warn!("Human bone {} has no valid node", bone.bone),
        }
    }

    let mut look_at = LookAtSettings::default();
    if let Some(fp) = vrm.first_person {
        if let Some(offset) = fp.first_person_bone_offset {
            look_at.offset_from_head = offset.to_gltf();
        }
        look_at.kind = match fp.look_at_type_name.as_deref() {
            Some("BlendShape") => LookAtType::Expression,
            _ => LookAtType::Bone,
        };
        let map = |m: Option<Vrm0DegreeMap>| {
            m.map(|m| RangeMap {
                input_max_value: m.x_range,
                output_scale: m.y_range,
            })
            .unwrap_or_default()
        };
        look_at.horizontal_inner = map(fp.look_at_horizontal_inner);
        look_at.horizontal_outer = map(fp.look_at_horizontal_outer);
        look_at.vertical_down = map(fp.look_at_vertical_down);
        look_at.vertical_up = map(fp.look_at_vertical_up);
    }

    (meta, bones, look_at)
}

/// 0.x bone groups list chain roots; every node below a root is a joint
fn springs_from_vrm0(vrm: &Vrm0, skeleton: &Skeleton) -> SpringBoneSetup {
    let mut setup = SpringBoneSetup::default();
    let Some(secondary) = &vrm.secondary_animation else {
        return setup;
    };
    let node_count = skeleton.len();

    for group in &secondary.collider_groups {
        let mut indices = Vec::new();
        if let Some(node) = node_index(group.node, node_count) {
            for c in &group.colliders {
                indices.push(setup.colliders.len());
                setup.colliders.push(Collider {
                    node,
                    shape: ColliderShape::Sphere {
                        offset: c.offset.to_gltf(),
                        radius: c.radius,
                    },
                });
            }
        }
        setup.collider_groups.push(indices);
    }

    for group in &secondary.bone_groups {
        let settings = SpringSettings {
            stiffness: group.stiffiness,
            gravity_power: group.gravity_power,
            gravity_dir: group
                .gravity_dir
                .map(|d| d.to_gltf().normalize_or_zero())
                .unwrap_or(Vec3::NEG_Y),
            drag_force: group.drag_force,
            hit_radius: group.hit_radius,
        };
        let collider_groups: Vec<usize> = group
            .collider_groups
            .iter()
            .filter_map(|&g| node_index(g, setup.collider_groups.len()))
            .collect();

        for &root in &group.bones {
            let Some(root) = node_index(root, node_count) else {
                continue;
            };
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                let children = &skeleton.node(node).children;
                setup.joints.push(SpringJointDesc {
                    node,
                    tail: children.first().copied(),
                    settings,
                    collider_groups: collider_groups.clone(),
                });
                stack.extend(children.iter().rev().copied());
            }
        }
    }

    setup
}

/// 1.0 springs list joints in chain order; the last joint only marks the tail
fn springs_from_vrm1(schema: &SpringBone1, node_count: usize) -> SpringBoneSetup {
    let mut setup = SpringBoneSetup::default();

    let mut collider_slots = Vec::with_capacity(schema.colliders.len());
    for c in &schema.colliders {
        let node = node_index(c.node, node_count);
        let shape = if let Some(sphere) = &c.shape.sphere {
            Some(ColliderShape::Sphere {
                offset: Vec3::from(sphere.offset),
                radius: sphere.radius,
            })
        } else {
            c.shape.capsule.as_ref().map(|capsule| ColliderShape::Capsule {
                offset: Vec3::from(capsule.offset),
                tail: Vec3::from(capsule.tail),
                radius: capsule.radius,
            })
        };
        match (node, shape) {
            (Some(node), Some(shape)) => {
                collider_slots.push(Some(setup.colliders.len()));
                setup.colliders.push(Collider { node, shape });
            }
            _ => collider_slots.push(None),
        }
    }

    for group in &schema.collider_groups {
        setup.collider_groups.push(
            group
                .colliders
                .iter()
                .filter_map(|&c| node_index(c, collider_slots.len()))
                .filter_map(|c| collider_slots[c])
                .collect(),
        );
    }

    for spring in &schema.springs {
        let collider_groups: Vec<usize> = spring
            .collider_groups
            .iter()
            .filter_map(|&g| node_index(g, setup.collider_groups.len()))
            .collect();
        for pair in spring.joints.windows(2) {
            let (joint, next) = (&pair[0], &pair[1]);
            let Some(node) = node_index(joint.node, node_count) else {
                continue;
            };
            setup.joints.push(SpringJointDesc {
                node,
                tail: node_index(next.node, node_count),
                settings: SpringSettings {
                    stiffness: joint.stiffness,
                    gravity_power: joint.gravity_power,
                    gravity_dir: Vec3::from(joint.gravity_dir).normalize_or_zero(),
                    drag_force: joint.drag_force,
                    hit_radius: joint.hit_radius,
                },
                collider_groups: collider_groups.clone(),
            });
        }
    }

    setup
}

fn read_material(material: &gltf::Material, unlit: bool) -> Material {
    let pbr = material.pbr_metallic_roughness();
    Material {
        name: material.name().map(str::to_owned),
        base_color: pbr.base_color_factor(),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| info.texture().source().index()),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        unlit,
        double_sided: material.double_sided(),
    }
}

fn to_rgba8(image: &gltf::image::Data) -> TextureData {
    let pixels = &image.pixels;
    let data = match image.format {
        gltf::image::Format::R8G8B8A8 => pixels.clone(),
        gltf::image::Format::R8G8B8 => pixels
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        gltf::image::Format::R8G8 => pixels
            .chunks_exact(2)
            .flat_map(|c| [c[0], c[1], 0, 255])
            .collect(),
        gltf::image::Format::R8 => pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        other => {
            log::warn!("Unsupported texture format {:?}, using white", other);
            vec![255; (image.width * image.height * 4) as usize]
        }
    };
    TextureData {
        width: image.width,
        height: image.height,
        data,
    }
}

fn read_mesh(
    node: &gltf::Node,
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
) -> Result<MeshInstance> {
    let skinned = node.skin().is_some();
    let mut primitives = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::debug!("Skipping {:?} primitive in mesh {:?}", primitive.mode(), mesh.name());
            continue;
        }
        let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .context("Mesh primitive has no positions")?
            .map(Vec3::from)
            .collect();
        let count = positions.len();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..count as u32).collect(),
        };
        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals.map(Vec3::from).collect(),
            None => vertex_normals(&positions, &indices),
        };
        let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
            Some(uvs) => uvs.into_f32().collect(),
            None => vec![[0.0, 0.0]; count],
        };
        let joints: Option<Vec<[u16; 4]>> = if skinned {
            reader.read_joints(0).map(|j| j.into_u16().collect())
        } else {
            None
        };
        let weights: Option<Vec<[f32; 4]>> = if skinned {
            reader.read_weights(0).map(|w| w.into_f32().collect())
        } else {
            None
        };

        let vertices = (0..count)
            .map(|i| {
                let mut vertex = SkinnedVertex::rigid(
                    positions[i],
                    normals.get(i).copied().unwrap_or(Vec3::Y),
                    uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                );
                if let (Some(j), Some(w)) = (&joints, &weights) {
                    if let (Some(j), Some(w)) = (j.get(i), w.get(i)) {
                        vertex.joints = j.map(u32::from);
                        vertex.weights = normalize_weights(*w);
                    }
                }
                vertex
            })
            .collect();

        primitives.push(MeshPrimitive {
            vertices,
            indices,
            material: primitive.material().index(),
        });
    }

    Ok(MeshInstance {
        name: mesh.name().map(str::to_owned),
        node: node.index(),
        skin: node.skin().map(|s| s.index()),
        primitives,
        cast_shadow: true,
        receive_shadow: true,
    })
}

fn normalize_weights(w: [f32; 4]) -> [f32; 4] {
    let sum: f32 = w.iter().sum();
    if sum > f32::EPSILON {
        w.map(|x| x / sum)
    } else {
        [1.0, 0.0, 0.0, 0.0]
    }
}

/// Bind-pose bounds of every vertex in model space
fn compute_bounds(meshes: &[MeshInstance], skeleton: &Skeleton, skins: &[Skin]) -> AABB {
    let mut bounds = AABB::empty();
    let mut palette = Vec::new();
    for mesh in meshes {
        match mesh.skin.and_then(|s| skins.get(s)) {
            Some(skin) => skeleton.joint_palette(skin, Mat4::IDENTITY, &mut palette),
            None => skeleton.node_palette(mesh.node, Mat4::IDENTITY, &mut palette),
        }
        let matrices: Vec<Mat4> = palette.iter().map(Mat4::from_cols_array_2d).collect();
        for v in mesh.primitives.iter().flat_map(|p| p.vertices.iter()) {
            let p = Vec3::from(v.position);
            let mut skinned = Vec3::ZERO;
            for k in 0..4 {
                if v.weights[k] > 0.0 {
                    let m = matrices.get(v.joints[k] as usize).copied().unwrap_or(Mat4::IDENTITY);
                    skinned += m.transform_point3(p) * v.weights[k];
                }
            }
            bounds.extend(skinned);
        }
    }
    bounds
}
