use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::avatar::Avatar;
use crate::core::GpuContext;
use crate::loaders::{AlphaMode, AvatarAsset, Material, MeshPrimitive, TextureData};
use crate::scene::{Dispose, StaticMesh};
use crate::types::{MaterialUniform, SkinnedVertex};

const MATRIX_SIZE: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;

/// Bind group layouts every uploaded model is built against
pub struct ModelLayouts<'a> {
    pub material: &'a wgpu::BindGroupLayout,
    pub palette: &'a wgpu::BindGroupLayout,
    /// Bound when a material has no texture of its own
    pub fallback_texture: &'a wgpu::TextureView,
}

pub struct GpuPrimitive {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material: usize,
    blended: bool,
}

pub struct GpuMesh {
    node: usize,
    skin: Option<usize>,
    palette_buffer: wgpu::Buffer,
    palette_bind_group: wgpu::BindGroup,
    palette_capacity: usize,
    primitives: Vec<GpuPrimitive>,
    cast_shadow: bool,
}

struct GpuMaterial {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU copy of a model: geometry, textures, material and palette buffers.
/// Resources are destroyed by [`Dispose::dispose`], not left to the allocator.
pub struct GpuModel {
    label: String,
    gpu: GpuContext,
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
    textures: Vec<wgpu::Texture>,
    disposed: bool,
}

/// Uploaded avatar, owned by the avatar slot
pub type GpuAvatar = GpuModel;

impl GpuModel {
    pub fn upload_avatar(gpu: &GpuContext, layouts: &ModelLayouts, asset: &AvatarAsset) -> Self {
        let label = asset
            .meta
            .title
            .clone()
            .unwrap_or_else(|| "avatar".to_string());

        let textures: Vec<wgpu::Texture> = asset
            .textures
            .iter()
            .enumerate()
            .map(|(i, t)| create_texture(gpu, &format!("{} texture {}", label, i), t))
            .collect();

        let mut receives = vec![false; asset.materials.len() + 1];
        for mesh in &asset.meshes {
            for primitive in &mesh.primitives {
                let slot = primitive.material.unwrap_or(asset.materials.len());
                if let Some(r) = receives.get_mut(slot) {
                    *r |= mesh.receive_shadow;
                }
            }
        }

        // The extra material at the end stands in for primitives without one
        let default_material = Material::default();
        let materials = asset
            .materials
            .iter()
            .chain(std::iter::once(&default_material))
            .enumerate()
            .map(|(i, m)| {
                let view = m
                    .base_color_texture
                    .and_then(|t| textures.get(t))
                    .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
                create_material(gpu, layouts, m, view.as_ref(), 1.0, receives[i])
            })
            .collect::<Vec<_>>();
        let fallback_material = materials.len() - 1;

        let meshes = asset
            .meshes
            .iter()
            .map(|mesh| {
                let palette_len = mesh
                    .skin
                    .and_then(|s| asset.skins.get(s))
                    .map(|s| s.joints.len())
                    .unwrap_or(1);
                let primitives = mesh
                    .primitives
                    .iter()
                    .filter_map(|p| {
                        let material = p
                            .material
                            .filter(|&m| m < asset.materials.len())
                            .unwrap_or(fallback_material);
                        let blended = asset
                            .materials
                            .get(material)
                            .map(|m| m.alpha_mode == AlphaMode::Blend)
                            .unwrap_or(false);
                        create_primitive(gpu, &label, p, material, blended)
                    })
                    .collect();
                create_mesh(
                    gpu,
                    layouts,
                    &label,
                    mesh.node,
                    mesh.skin,
                    palette_len,
                    primitives,
                    mesh.cast_shadow,
                )
            })
            .collect();

        let model = Self {
            label,
            gpu: gpu.clone(),
            meshes,
            materials,
            textures,
            disposed: false,
        };
        log::info!(
            "Uploaded {}: {} meshes, {} materials, {} textures",
            model.label,
            model.meshes.len(),
            model.materials.len(),
            model.textures.len()
        );
        model
    }

    /// Upload geometry that never moves; its palette is set once here
    pub fn upload_static(gpu: &GpuContext, layouts: &ModelLayouts, mesh: &StaticMesh) -> Self {
        let label = mesh
            .material
            .name
            .clone()
            .unwrap_or_else(|| "static mesh".to_string());

        let textures: Vec<wgpu::Texture> = mesh
            .texture
            .iter()
            .map(|t| create_texture(gpu, &format!("{} texture", label), t))
            .collect();
        let view = textures
            .first()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
        let materials = vec![create_material(
            gpu,
            layouts,
            &mesh.material,
            view.as_ref(),
            mesh.uv_scale,
            mesh.receive_shadow,
        )];

        let blended = mesh.material.alpha_mode == AlphaMode::Blend;
        let primitives = create_primitive(gpu, &label, &mesh.primitive, 0, blended)
            .into_iter()
            .collect();
        let gpu_mesh = create_mesh(gpu, layouts, &label, 0, None, 1, primitives, mesh.cast_shadow);
        gpu.queue().write_buffer(
            &gpu_mesh.palette_buffer,
            0,
            bytemuck::cast_slice(&[Mat4::IDENTITY.to_cols_array_2d()]),
        );

        Self {
            label,
            gpu: gpu.clone(),
            meshes: vec![gpu_mesh],
            materials,
            textures,
            disposed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Recompute and upload every mesh palette from the avatar's pose
    pub fn update_palettes(
        &self,
        avatar: &Avatar,
        root: Mat4,
        scratch: &mut Vec<[[f32; 4]; 4]>,
    ) {
        if self.disposed {
            return;
        }
        for mesh in &self.meshes {
            avatar.palette(mesh.node, mesh.skin, root, scratch);
            if scratch.is_empty() {
                scratch.push(root.to_cols_array_2d());
            }
            scratch.truncate(mesh.palette_capacity);
            self.gpu
                .queue()
                .write_buffer(&mesh.palette_buffer, 0, bytemuck::cast_slice(scratch));
        }
    }

    /// Depth-only draw calls, bind group 1 = palette
    pub fn draw_shadow(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.disposed {
            return;
        }
        for mesh in self.meshes.iter().filter(|m| m.cast_shadow) {
            pass.set_bind_group(1, &mesh.palette_bind_group, &[]);
            for primitive in &mesh.primitives {
                primitive.draw(pass);
            }
        }
    }

    /// Shaded draw calls for either the opaque or the blended primitives.
    /// Bind group 1 = material, 2 = palette.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, blended: bool) {
        if self.disposed {
            return;
        }
        for mesh in &self.meshes {
            let mut bound = false;
            for primitive in mesh.primitives.iter().filter(|p| p.blended == blended) {
                let Some(material) = self.materials.get(primitive.material) else {
                    continue;
                };
                if !bound {
                    pass.set_bind_group(2, &mesh.palette_bind_group, &[]);
                    bound = true;
                }
                pass.set_bind_group(1, &material.bind_group, &[]);
                primitive.draw(pass);
            }
        }
    }
}

impl GpuPrimitive {
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

impl Dispose for GpuModel {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        // Frames in flight may still read these buffers
        self.gpu.wait_idle();

        for mesh in self.meshes.drain(..) {
            mesh.palette_buffer.destroy();
            for primitive in mesh.primitives {
                primitive.vertex_buffer.destroy();
                primitive.index_buffer.destroy();
            }
        }
        for material in self.materials.drain(..) {
            material.buffer.destroy();
        }
        for texture in self.textures.drain(..) {
            texture.destroy();
        }
        self.disposed = true;
        log::info!("Released GPU resources of {}", self.label);
    }
}

fn create_texture(gpu: &GpuContext, label: &str, data: &TextureData) -> wgpu::Texture {
    gpu.device().create_texture_with_data(
        gpu.queue(),
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: data.width.max(1),
                height: data.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.data,
    )
}

fn create_material(
    gpu: &GpuContext,
    layouts: &ModelLayouts,
    material: &Material,
    texture: Option<&wgpu::TextureView>,
    uv_scale: f32,
    receive_shadow: bool,
) -> GpuMaterial {
    let cutoff = match material.alpha_mode {
        AlphaMode::Mask => material.alpha_cutoff.max(1e-3),
        AlphaMode::Opaque | AlphaMode::Blend => 0.0,
    };
    let uniform = MaterialUniform {
        base_color: material.base_color,
        params: [
            cutoff,
            if material.unlit { 1.0 } else { 0.0 },
            material.roughness,
            if receive_shadow { 1.0 } else { 0.0 },
        ],
        extra: [material.metallic, uv_scale, 0.0, 0.0],
    };

    let buffer = gpu
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: material.name.as_deref(),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

    let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bind_group"),
        layout: layouts.material,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(
                    texture.unwrap_or(layouts.fallback_texture),
                ),
            },
        ],
    });

    GpuMaterial { buffer, bind_group }
}

fn create_primitive(
    gpu: &GpuContext,
    label: &str,
    primitive: &MeshPrimitive,
    material: usize,
    blended: bool,
) -> Option<GpuPrimitive> {
    if primitive.indices.is_empty() || primitive.vertices.is_empty() {
        return None;
    }
    let vertex_buffer = gpu
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} vertices", label)),
            contents: bytemuck::cast_slice::<SkinnedVertex, u8>(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
    let index_buffer = gpu
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} indices", label)),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
    Some(GpuPrimitive {
        vertex_buffer,
        index_buffer,
        index_count: primitive.indices.len() as u32,
        material,
        blended,
    })
}

#[allow(clippy::too_many_arguments)]
fn create_mesh(
    gpu: &GpuContext,
    layouts: &ModelLayouts,
    label: &str,
    node: usize,
    skin: Option<usize>,
    palette_len: usize,
    primitives: Vec<GpuPrimitive>,
    cast_shadow: bool,
) -> GpuMesh {
    let palette_capacity = palette_len.max(1);
    let palette_buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{} palette", label)),
        size: palette_capacity as u64 * MATRIX_SIZE,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let palette_bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("palette_bind_group"),
        layout: layouts.palette,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: palette_buffer.as_entire_binding(),
        }],
    });

    GpuMesh {
        node,
        skin,
        palette_buffer,
        palette_bind_group,
        palette_capacity,
        primitives,
        cast_shadow,
    }
}
