use glam::{Mat4, Vec3, Vec4};

/// Mesh vertex shared by the avatar and the terrain.
/// Static geometry binds joint 0 with full weight against a one-entry palette.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl SkinnedVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Uint32x4,
        4 => Float32x4,
    ];

    /// Vertex rigidly attached to palette entry 0
    pub fn rigid(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv,
            joints: [0; 4],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SkinnedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-frame scene uniforms, shared by the sky, mesh and fog shading
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// xyz: direction towards the light, w: intensity
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    /// rgb premultiplied by intensity
    pub ambient: [f32; 4],
    pub sky_zenith: [f32; 4],
    pub sky_horizon: [f32; 4],
    pub ground_color: [f32; 4],
    /// x: near, y: far, z: enabled, w: shadow bias
    pub fog: [f32; 4],
    pub fog_color: [f32; 4],
}

impl GlobalUniform {
    pub fn mat(m: Mat4) -> [[f32; 4]; 4] {
        m.to_cols_array_2d()
    }

    pub fn vec(v: Vec3, w: f32) -> [f32; 4] {
        Vec4::new(v.x, v.y, v.z, w).to_array()
    }

    pub fn rgb(c: [f32; 3], w: f32) -> [f32; 4] {
        [c[0], c[1], c[2], w]
    }
}

/// Material constants for one primitive
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    /// x: alpha cutoff (0 = off), y: unlit, z: roughness, w: receive shadow
    pub params: [f32; 4],
    /// x: metallic, y: uv scale, zw: unused
    pub extra: [f32; 4],
}

/// Light-space matrix for the depth-only shadow pass
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub light_view_proj: [[f32; 4]; 4],
}
