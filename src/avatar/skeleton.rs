use glam::{Mat4, Quat, Vec3};

/// Local translation / rotation / scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub rest: Transform,
    pub local: Transform,
}

impl Node {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            rest,
            local: rest,
        }
    }
}

/// Joint list of one glTF skin
#[derive(Debug, Clone, Default)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<Mat4>,
}

/// Node arena with cached model-space matrices
#[derive(Debug, Clone)]
pub struct Skeleton {
    nodes: Vec<Node>,
    order: Vec<usize>,
    world: Vec<Mat4>,
}

impl Skeleton {
    /// Build the arena from nodes whose `parent` links are set.
    /// Children lists are derived here; any passed in are replaced.
    pub fn new(mut nodes: Vec<Node>) -> Self {
        for node in nodes.iter_mut() {
            node.children.clear();
        }
        for i in 0..nodes.len() {
            if let Some(p) = nodes[i].parent {
                if p < nodes.len() && p != i {
                    nodes[p].children.push(i);
                } else {
                    log::warn!("Node {} has invalid parent {}, treating as root", i, p);
                    nodes[i].parent = None;
                }
            }
        }

        // Depth-first from every root so parents always precede children
        let mut order = Vec::with_capacity(nodes.len());
        let mut visited = vec![false; nodes.len()];
        let roots: Vec<usize> = (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect();
        for root in roots {
            visit_subtree(&nodes, root, &mut visited, &mut order);
        }

        // Whatever is left hangs off a parent cycle; cut it at the first unvisited node
        while let Some(i) = visited.iter().position(|v| !v) {
            if let Some(p) = nodes[i].parent.take() {
                log::warn!("Node {} is part of a parent cycle, detaching it from {}", i, p);
                nodes[p].children.retain(|&c| c != i);
            }
            visit_subtree(&nodes, i, &mut visited, &mut order);
        }

        let mut skeleton = Self {
            world: vec![Mat4::IDENTITY; nodes.len()],
            nodes,
            order,
        };
        skeleton.update_world();
        skeleton
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    pub fn local(&self, index: usize) -> &Transform {
        &self.nodes[index].local
    }

    pub fn local_mut(&mut self, index: usize) -> &mut Transform {
        &mut self.nodes[index].local
    }

    /// Model-space matrix as of the last update
    pub fn world(&self, index: usize) -> Mat4 {
        self.world[index]
    }

    pub fn world_position(&self, index: usize) -> Vec3 {
        self.world[index].w_axis.truncate()
    }

    pub fn world_rotation(&self, index: usize) -> Quat {
        let (_, rotation, _) = self.world[index].to_scale_rotation_translation();
        rotation
    }

    fn parent_world(&self, index: usize) -> Mat4 {
        self.nodes[index]
            .parent
            .map(|p| self.world[p])
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn update_world(&mut self) {
        for k in 0..self.order.len() {
            let i = self.order[k];
            self.world[i] = self.parent_world(i) * self.nodes[i].local.matrix();
        }
    }

    /// Recompute only `index`, leaving descendants stale
    pub fn update_node(&mut self, index: usize) {
        self.world[index] = self.parent_world(index) * self.nodes[index].local.matrix();
    }

    /// Recompute `index` and its descendants, trusting the cached parent matrix
    pub fn update_subtree(&mut self, index: usize) {
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            self.world[i] = self.parent_world(i) * self.nodes[i].local.matrix();
            stack.extend(self.nodes[i].children.iter().copied());
        }
    }

    pub fn reset_to_rest(&mut self) {
        for node in self.nodes.iter_mut() {
            node.local = node.rest;
        }
        self.update_world();
    }

    /// Model-space matrix of the rest pose, independent of the current pose
    pub fn rest_world(&self, index: usize) -> Mat4 {
        let mut matrix = self.nodes[index].rest.matrix();
        let mut current = self.nodes[index].parent;
        while let Some(p) = current {
            matrix = self.nodes[p].rest.matrix() * matrix;
            current = self.nodes[p].parent;
        }
        matrix
    }

    pub fn rest_world_rotation(&self, index: usize) -> Quat {
        let (_, rotation, _) = self.rest_world(index).to_scale_rotation_translation();
        rotation
    }

    /// Skinning matrices `root * world(joint) * inverse_bind`, ready for upload
    pub fn joint_palette(&self, skin: &Skin, root: Mat4, out: &mut Vec<[[f32; 4]; 4]>) {
        out.clear();
        for (k, &joint) in skin.joints.iter().enumerate() {
            let ibm = skin.inverse_bind.get(k).copied().unwrap_or(Mat4::IDENTITY);
            out.push((root * self.world[joint] * ibm).to_cols_array_2d());
        }
    }

    /// One-entry palette for geometry rigidly attached to `node`
    pub fn node_palette(&self, node: usize, root: Mat4, out: &mut Vec<[[f32; 4]; 4]>) {
        out.clear();
        out.push((root * self.world[node]).to_cols_array_2d());
    }
}

fn visit_subtree(nodes: &[Node], root: usize, visited: &mut [bool], order: &mut Vec<usize>) {
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut visited[i], true) {
            continue;
        }
        order.push(i);
        stack.extend(nodes[i].children.iter().rev().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Skeleton {
        // root -> a -> b, each offset by one unit on Y
        Skeleton::new(vec![
            Node::new("root", None, Transform::IDENTITY),
            Node::new("a", Some(0), Transform::from_translation(Vec3::Y)),
            Node::new("b", Some(1), Transform::from_translation(Vec3::Y)),
        ])
    }

    #[test]
    fn test_order_puts_parents_first() {
        let skeleton = Skeleton::new(vec![
            Node::new("child", Some(1), Transform::IDENTITY),
            Node::new("parent", None, Transform::IDENTITY),
        ]);
        assert_eq!(skeleton.order(), &[1, 0]);
        assert_eq!(skeleton.node(1).children, vec![0]);
    }

    #[test]
    fn test_parent_cycle_is_cut() {
        let skeleton = Skeleton::new(vec![
            Node::new("a", Some(1), Transform::IDENTITY),
            Node::new("b", Some(0), Transform::from_translation(Vec3::Y)),
            Node::new("c", Some(1), Transform::from_translation(Vec3::Y)),
        ]);
        assert_eq!(skeleton.order(), &[0, 1, 2]);
        assert_eq!(skeleton.node(0).parent, None);
        assert!(skeleton.node(1).children.contains(&2));
        assert!(skeleton.node(1).children.iter().all(|&c| c != 0));
        assert!((skeleton.world_position(2) - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_world_accumulates_parents() {
        let skeleton = chain();
        assert!((skeleton.world_position(2) - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_update_subtree_moves_descendants() {
        let mut skeleton = chain();
        skeleton.local_mut(1).rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        skeleton.update_subtree(1);
        // b is now one unit along -X from a
        let b = skeleton.world_position(2);
        assert!((b - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-5, "{:?}", b);
    }

    #[test]
    fn test_rest_world_ignores_current_pose() {
        let mut skeleton = chain();
        skeleton.local_mut(0).translation = Vec3::new(5.0, 0.0, 0.0);
        skeleton.update_world();
        let rest = skeleton.rest_world(2).w_axis.truncate();
        assert!((rest - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);

        skeleton.reset_to_rest();
        assert!((skeleton.world_position(2) - rest).length() < 1e-6);
    }

    #[test]
    fn test_bind_pose_palette_is_root() {
        let skeleton = chain();
        let skin = Skin {
            joints: vec![1, 2],
            inverse_bind: vec![skeleton.world(1).inverse(), skeleton.world(2).inverse()],
        };
        let root = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let mut palette = Vec::new();
        skeleton.joint_palette(&skin, root, &mut palette);
        assert_eq!(palette.len(), 2);
        for m in palette {
            let m = Mat4::from_cols_array_2d(&m);
            assert!(m.abs_diff_eq(root, 1e-5));
        }
    }

    #[test]
    fn test_invalid_parent_becomes_root() {
        let skeleton = Skeleton::new(vec![Node::new("lonely", Some(7), Transform::IDENTITY)]);
        assert_eq!(skeleton.parent(0), None);
        assert_eq!(skeleton.order(), &[0]);
    }
}
