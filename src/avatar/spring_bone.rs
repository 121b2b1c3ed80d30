use glam::{Mat4, Quat, Vec3};

use super::skeleton::Skeleton;

/// Tail length given to chain ends that have no child node
pub const VIRTUAL_TAIL_LENGTH: f32 = 0.07;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { offset: Vec3, radius: f32 },
    Capsule { offset: Vec3, tail: Vec3, radius: f32 },
}

/// Collision shape attached to a node, offsets in the node's local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub node: usize,
    pub shape: ColliderShape,
}

impl Collider {
    /// Signed distance between a sphere at `point` and the collider surface,
    /// with the unit push direction. Negative means overlap.
    fn collide(&self, world: Mat4, point: Vec3, point_radius: f32) -> (f32, Vec3) {
        let (delta, radius) = match self.shape {
            ColliderShape::Sphere { offset, radius } => {
                (point - world.transform_point3(offset), radius)
            }
            ColliderShape::Capsule {
                offset,
                tail,
                radius,
            } => {
                let head = world.transform_point3(offset);
                let tail = world.transform_point3(tail);
                let axis = tail - head;
                let mut delta = point - head;
                let dot = delta.dot(axis);
                if dot > 0.0 {
                    let len_sq = axis.length_squared();
                    if len_sq <= dot {
                        delta -= axis;
                    } else {
                        delta -= axis * (dot / len_sq);
                    }
                }
                (delta, radius)
            }
        };
        let distance = delta.length() - point_radius - radius;
        (distance, delta.normalize_or_zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringSettings {
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: Vec3,
    pub drag_force: f32,
    pub hit_radius: f32,
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: Vec3::NEG_Y,
            drag_force: 0.5,
            hit_radius: 0.0,
        }
    }
}

/// One simulated bone as described by the file
#[derive(Debug, Clone, PartialEq)]
pub struct SpringJointDesc {
    pub node: usize,
    /// Child node used as the tail; `None` gets a virtual tail
    pub tail: Option<usize>,
    pub settings: SpringSettings,
    pub collider_groups: Vec<usize>,
}

/// Spring-bone data read from a VRM file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpringBoneSetup {
    pub colliders: Vec<Collider>,
    /// Each group lists indices into `colliders`
    pub collider_groups: Vec<Vec<usize>>,
    pub joints: Vec<SpringJointDesc>,
}

impl SpringBoneSetup {
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

#[derive(Debug, Clone)]
struct SpringJoint {
    node: usize,
    settings: SpringSettings,
    colliders: Vec<usize>,
    initial_local: Mat4,
    initial_local_rotation: Quat,
    local_tail: Vec3,
    bone_axis: Vec3,
    current_tail: Vec3,
    prev_tail: Vec3,
}

/// Verlet spring-bone solver running in world space
#[derive(Debug, Clone)]
pub struct SpringBoneSystem {
    joints: Vec<SpringJoint>,
    colliders: Vec<Collider>,
    initialized: bool,
}

impl SpringBoneSystem {
    pub fn new(setup: &SpringBoneSetup, skeleton: &Skeleton) -> Self {
        let mut joints: Vec<SpringJoint> = Vec::with_capacity(setup.joints.len());
        let colliders: Vec<Collider> = setup
            .colliders
            .iter()
            .filter(|c| c.node < skeleton.len())
            .copied()
            .collect();

        for desc in &setup.joints {
            if desc.node >= skeleton.len() || joints.iter().any(|j| j.node == desc.node) {
                continue;
            }
            let rest = skeleton.node(desc.node).rest;
            let local_tail = match desc.tail.filter(|&t| t < skeleton.len()) {
                Some(tail) => skeleton.node(tail).rest.translation,
                None => {
                    let dir = rest.translation.normalize_or_zero();
                    let dir = if dir == Vec3::ZERO { Vec3::Y } else { dir };
                    dir * VIRTUAL_TAIL_LENGTH
                }
            };

            let mut group_colliders = Vec::new();
            for &g in &desc.collider_groups {
                if let Some(group) = setup.collider_groups.get(g) {
                    group_colliders.extend(
                        group
                            .iter()
                            .filter_map(|&c| setup.colliders.get(c))
                            .filter_map(|c| colliders.iter().position(|k| k == c)),
                    );
                }
            }
            group_colliders.sort_unstable();
            group_colliders.dedup();

            joints.push(SpringJoint {
                node: desc.node,
                settings: desc.settings,
                colliders: group_colliders,
                initial_local: rest.matrix(),
                initial_local_rotation: rest.rotation,
                local_tail,
                bone_axis: local_tail.normalize_or_zero(),
                current_tail: Vec3::ZERO,
                prev_tail: Vec3::ZERO,
            });
        }

        // Parents must settle before their children read them
        let rank: Vec<usize> = {
            let mut rank = vec![usize::MAX; skeleton.len()];
            for (k, &i) in skeleton.order().iter().enumerate() {
                rank[i] = k;
            }
            rank
        };
        joints.sort_by_key(|j| rank[j.node]);

        if !joints.is_empty() {
            log::debug!(
                "Spring bones: {} joints, {} colliders",
                joints.len(),
                colliders.len()
            );
        }

        Self {
            joints,
            colliders,
            initialized: false,
        }
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// World-space tail of every joint, in solve order
    pub fn tails(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.joints.iter().map(|j| j.current_tail)
    }

    /// Place every tail at its rest position on the next update
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    fn place_tails(&mut self, skeleton: &Skeleton, root: Mat4) {
        for joint in self.joints.iter_mut() {
            let tail = (root * skeleton.world(joint.node)).transform_point3(joint.local_tail);
            joint.current_tail = tail;
            joint.prev_tail = tail;
        }
        self.initialized = true;
    }

    /// Advance the simulation by `dt` seconds.
    /// `root` places the model in the world; world matrices must be current.
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton, root: Mat4) {
        if self.joints.is_empty() {
            return;
        }
        if !self.initialized {
            self.place_tails(skeleton, root);
        }

        for joint in self.joints.iter_mut() {
            let parent_world = root
                * skeleton
                    .parent(joint.node)
                    .map(|p| skeleton.world(p))
                    .unwrap_or(Mat4::IDENTITY);
            let bone_world = parent_world * skeleton.local(joint.node).matrix();
            let position = bone_world.w_axis.truncate();
            let length = (bone_world.transform_point3(joint.local_tail) - position).length();

            let initial_world = parent_world * joint.initial_local;
            let rest_dir = (initial_world.transform_point3(joint.bone_axis) - position).normalize_or_zero();

            let s = &joint.settings;
            let inertia = (joint.current_tail - joint.prev_tail) * (1.0 - s.drag_force);
            let stiffness = rest_dir * s.stiffness * dt;
            let external = s.gravity_dir * s.gravity_power * dt;

            let mut next = joint.current_tail + inertia + stiffness + external;
            next = position + (next - position).normalize_or_zero() * length;

            for &c in &joint.colliders {
                let collider = &self.colliders[c];
                let world = root * skeleton.world(collider.node);
                let (distance, dir) = collider.collide(world, next, s.hit_radius);
                if distance < 0.0 {
                    next += dir * -distance;
                    next = position + (next - position).normalize_or_zero() * length;
                }
            }

            joint.prev_tail = joint.current_tail;
            joint.current_tail = next;

            let to = initial_world.inverse().transform_point3(next).normalize_or_zero();
            let rotation = if to == Vec3::ZERO || joint.bone_axis == Vec3::ZERO {
                joint.initial_local_rotation
            } else {
                joint.initial_local_rotation * Quat::from_rotation_arc(joint.bone_axis, to)
            };
            skeleton.local_mut(joint.node).rotation = rotation.normalize();
            skeleton.update_node(joint.node);
        }

        skeleton.update_world();
    }
}
