mod aabb;
mod angle;
mod color;
mod normals;

pub use aabb::AABB;
pub use angle::{damp_toward, lerp, shortest_angle_delta};
pub use color::{hex_to_linear, hex_to_srgb, srgb_to_linear};
pub use normals::vertex_normals;
