use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::FollowCamera;
use crate::config::{clamp_roughness, SceneConfig};
use crate::loaders::{Material, MeshPrimitive, TextureData};
use crate::math::{hex_to_linear, vertex_normals, AABB};
use crate::types::{GlobalUniform, SkinnedVertex};

/// Half width of the orthographic shadow frustum around the avatar
pub const SHADOW_EXTENT: f32 = 12.0;
const SHADOW_DEPTH: f32 = 80.0;
const SHADOW_BIAS: f32 = 0.002;
const GROUND_TEXTURE_SIZE: u32 = 256;
/// Ground texture repeats per terrain side
const GROUND_UV_REPEAT: f32 = 25.0;

/// Scene colours and lights resolved from the config, in linear space
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    pub background: [f32; 3],
    pub sky_zenith: [f32; 3],
    pub sky_horizon: [f32; 3],
    pub ground_color: [f32; 3],
    pub fog_near: f32,
    pub fog_far: f32,
    pub ambient: f32,
    /// Strength of the sky/ground hemisphere term
    pub environment: f32,
    /// Offset of the directional light from the point it shines at
    pub light_offset: Vec3,
    pub light_intensity: f32,
    pub shadow_map_size: u32,
}

impl SceneSettings {
    pub fn from_config(config: &SceneConfig) -> Self {
        let background = hex_to_linear(&config.background);
        let tint = hex_to_linear(&config.environment_tint);
        let t = config.environment_intensity.clamp(0.0, 1.0);
        let mix = |a: [f32; 3], b: [f32; 3], t: f32| {
            [
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]
        };

        let mut light_offset = Vec3::from_array(config.light_position);
        if light_offset.length_squared() < 1e-8 {
            log::warn!("light position is at the origin, lighting from above");
            light_offset = Vec3::Y * 5.0;
        }

        Self {
            background,
            sky_zenith: mix(background, [0.05, 0.15, 0.45], 0.5),
            sky_horizon: mix(background, tint, t),
            ground_color: hex_to_linear(&config.terrain_color),
            fog_near: config.fog_near,
            fog_far: config.fog_far.max(config.fog_near + 1e-3),
            ambient: config.ambient_intensity,
            environment: config.environment_intensity.max(0.0),
            light_offset,
            light_intensity: config.light_intensity,
            shadow_map_size: config.shadow_map_size,
        }
    }

    /// Unit vector pointing from the scene toward the light
    pub fn light_direction(&self) -> Vec3 {
        self.light_offset.normalize()
    }

    /// Orthographic light projection centred on `focus`
    pub fn light_view_proj(&self, focus: Vec3) -> Mat4 {
        let dir = self.light_direction();
        let eye = focus + dir * (SHADOW_DEPTH * 0.5);
        let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, focus, up);
        let proj = Mat4::orthographic_rh(
            -SHADOW_EXTENT,
            SHADOW_EXTENT,
            -SHADOW_EXTENT,
            SHADOW_EXTENT,
            0.1,
            SHADOW_DEPTH,
        );
        proj * view
    }

    pub fn globals(&self, camera: &FollowCamera, focus: Vec3) -> GlobalUniform {
        let view_proj = camera.view_proj();
        GlobalUniform {
            view_proj: GlobalUniform::mat(view_proj),
            inv_view_proj: GlobalUniform::mat(view_proj.inverse()),
            light_view_proj: GlobalUniform::mat(self.light_view_proj(focus)),
            camera_position: GlobalUniform::vec(camera.position, 1.0),
            light_direction: GlobalUniform::vec(self.light_direction(), self.light_intensity),
            light_color: [1.0, 1.0, 1.0, 1.0],
            ambient: GlobalUniform::rgb([self.ambient; 3], self.environment),
            sky_zenith: GlobalUniform::rgb(self.sky_zenith, 1.0),
            sky_horizon: GlobalUniform::rgb(self.sky_horizon, 1.0),
            ground_color: GlobalUniform::rgb(self.ground_color, 1.0),
            fog: [self.fog_near, self.fog_far, 1.0, SHADOW_BIAS],
            fog_color: GlobalUniform::rgb(self.background, 1.0),
        }
    }
}

/// Static mesh with its own material, uploaded like an avatar primitive
#[derive(Debug, Clone)]
pub struct StaticMesh {
    pub primitive: MeshPrimitive,
    pub material: Material,
    pub texture: Option<TextureData>,
    /// Texture coordinate multiplier
    pub uv_scale: f32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub bounds: AABB,
}

/// Ground plane in XZ centred on the origin, with optional seeded height noise
pub fn build_terrain(config: &SceneConfig) -> StaticMesh {
    let segments = config.terrain_segments.max(1);
    let size = config.terrain_size;
    let half = size * 0.5;
    let stride = segments + 1;
    let roughness = clamp_roughness(config.terrain_roughness, size);
    let mut rng = StdRng::seed_from_u64(config.terrain_seed);

    let mut positions = Vec::with_capacity((stride * stride) as usize);
    let mut uvs = Vec::with_capacity(positions.capacity());
    for row in 0..stride {
        for col in 0..stride {
            let u = col as f32 / segments as f32;
            let v = row as f32 / segments as f32;
            let height = if roughness > 0.0 {
                rng.gen_range(-roughness..=roughness)
            } else {
                0.0
            };
            positions.push(Vec3::new(-half + u * size, height, -half + v * size));
            uvs.push([u, v]);
        }
    }

    let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
    for row in 0..segments {
        for col in 0..segments {
            let a = row * stride + col;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            // Counter-clockwise seen from above
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    let normals = vertex_normals(&positions, &indices);
    let vertices = positions
        .iter()
        .zip(&normals)
        .zip(&uvs)
        .map(|((&p, &n), &uv)| SkinnedVertex::rigid(p, n, uv))
        .collect();

    let [r, g, b] = hex_to_linear(&config.terrain_color);
    let material = Material {
        name: Some("terrain".into()),
        base_color: [r, g, b, 1.0],
        base_color_texture: Some(0),
        metallic: config.terrain_metalness,
        roughness: config.terrain_material_roughness,
        ..Material::default()
    };

    log::debug!(
        "terrain: {} vertices, {} triangles, roughness {}",
        positions.len(),
        indices.len() / 3,
        roughness
    );

    StaticMesh {
        bounds: AABB::from_points(positions.iter().copied()),
        primitive: MeshPrimitive {
            vertices,
            indices,
            material: Some(0),
        },
        material,
        texture: Some(ground_texture(GROUND_TEXTURE_SIZE, config.terrain_seed)),
        uv_scale: GROUND_UV_REPEAT,
        cast_shadow: false,
        receive_shadow: true,
    }
}

/// Light grain with faint tile seams, tinted by the terrain material colour
pub fn ground_texture(size: u32, seed: u64) -> TextureData {
    let size = size.max(1);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    let tile = (size / 4).max(1);
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let grain: f32 = rng.gen_range(0.82..=1.0);
            let seam = if x % tile == 0 || y % tile == 0 { 0.9 } else { 1.0 };
            let value = (grain * seam * 255.0).round() as u8;
            data.extend_from_slice(&[value, value, value, 255]);
        }
    }
    TextureData {
        width: size,
        height: size,
        data,
    }
}

/// GPU-side resources that must be released explicitly
pub trait Dispose {
    fn dispose(&mut self);
}

/// Holds the single mounted avatar. The previous occupant is always
/// disposed before it is dropped.
#[derive(Debug)]
pub struct AvatarSlot<T: Dispose> {
    current: Option<T>,
    generation: u64,
}

impl<T: Dispose> Default for AvatarSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Dispose> AvatarSlot<T> {
    pub fn new() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.current.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }

    /// Number of avatars mounted so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mount `avatar`, disposing whatever was there
    pub fn mount(&mut self, avatar: T) {
        self.replace(avatar);
    }

    /// Mount `avatar`; returns true if an avatar was replaced
    pub fn replace(&mut self, avatar: T) -> bool {
        let replaced = self.release();
        self.current = Some(avatar);
        self.generation += 1;
        replaced
    }

    /// Unmount the avatar. It is disposed before being handed back.
    pub fn take(&mut self) -> Option<T> {
        let mut avatar = self.current.take()?;
        avatar.dispose();
        Some(avatar)
    }

    fn release(&mut self) -> bool {
        match self.current.take() {
            Some(mut old) => {
                old.dispose();
                drop(old);
                true
            }
            None => false,
        }
    }
}

impl<T: Dispose> Drop for AvatarSlot<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SceneConfig, CAMERA_CONFIG};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_flat_terrain_by_default() {
        let config = SceneConfig {
            terrain_segments: 4,
            ..SceneConfig::default()
        };
        let terrain = build_terrain(&config);
        assert_eq!(terrain.primitive.vertices.len(), 25);
        assert_eq!(terrain.primitive.indices.len(), 4 * 4 * 6);
        assert!(terrain.primitive.vertices.iter().all(|v| v.position[1] == 0.0));
        assert!(terrain
            .primitive
            .vertices
            .iter()
            .all(|v| (v.normal[1] - 1.0).abs() < 1e-6));
        assert_eq!(terrain.bounds.min, Vec3::new(-50.0, 0.0, -50.0));
        assert_eq!(terrain.bounds.max, Vec3::new(50.0, 0.0, 50.0));
        assert!(terrain.receive_shadow && !terrain.cast_shadow);
    }

    #[test]
    fn test_rough_terrain_is_seeded_and_bounded() {
        let config = SceneConfig {
            terrain_segments: 8,
            terrain_roughness: 1.0,
            ..SceneConfig::default()
        };
        let a = build_terrain(&config);
        let b = build_terrain(&config);
        assert_eq!(a.primitive.vertices, b.primitive.vertices);
        assert!(a
            .primitive
            .vertices
            .iter()
            .all(|v| v.position[1] >= -1.0 && v.position[1] <= 1.0));
        assert!(a.primitive.vertices.iter().any(|v| v.position[1] != 0.0));
        // Normals still point up-ish on a gentle surface
        assert!(a.primitive.vertices.iter().all(|v| v.normal[1] > 0.0));
    }

    #[test]
    fn test_ground_texture_size() {
        let texture = ground_texture(16, 1);
        assert_eq!(texture.data.len(), 16 * 16 * 4);
        assert!(texture.data.chunks(4).all(|p| p[3] == 255 && p[0] > 150));
    }

    #[test]
    fn test_light_projection_contains_focus() {
        let settings = SceneSettings::from_config(&SceneConfig::default());
        let focus = Vec3::new(3.0, 0.0, -4.0);
        let clip = settings.light_view_proj(focus) * focus.extend(1.0);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_globals_use_background_for_fog() {
        let settings = SceneSettings::from_config(&SceneConfig::default());
        let camera = FollowCamera::new(&CAMERA_CONFIG, 1.0);
        let globals = settings.globals(&camera, Vec3::ZERO);
        assert_eq!(&globals.fog_color[..3], &settings.background[..]);
        assert_eq!(globals.fog[0], 5.0);
        assert_eq!(globals.fog[1], 50.0);
        assert_eq!(globals.ambient[0], 0.5);
    }

    struct Tracked {
        id: u32,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Dispose for Tracked {
        fn dispose(&mut self) {
            self.log.borrow_mut().push(format!("dispose {}", self.id));
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.borrow_mut().push(format!("drop {}", self.id));
        }
    }

    #[test]
    fn test_slot_disposes_before_drop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = AvatarSlot::new();
        assert!(!slot.replace(Tracked { id: 1, log: log.clone() }));
        assert!(slot.replace(Tracked { id: 2, log: log.clone() }));
        assert_eq!(*log.borrow(), vec!["dispose 1", "drop 1"]);
        assert_eq!(slot.get().map(|t| t.id), Some(2));
        assert_eq!(slot.generation(), 2);

        drop(slot);
        assert_eq!(*log.borrow(), vec!["dispose 1", "drop 1", "dispose 2", "drop 2"]);
    }

    #[test]
    fn test_take_disposes_and_empties() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = AvatarSlot::new();
        slot.mount(Tracked { id: 7, log: log.clone() });
        let taken = slot.take().unwrap();
        assert_eq!(taken.id, 7);
        assert!(!slot.is_mounted());
        assert_eq!(*log.borrow(), vec!["dispose 7"]);
        assert!(slot.take().is_none());
    }
}
