use glam::{Quat, Vec3};

use crate::avatar::{Node, Skeleton, Transform};

/// Node arena for a glTF document, rest pose taken from the node transforms
pub fn skeleton_from_document(document: &gltf::Document) -> Skeleton {
    let count = document.nodes().count();
    let mut parents = vec![None; count];
    for node in document.nodes() {
        for child in node.children() {
            parents[child.index()] = Some(node.index());
        }
    }

    let nodes = document
        .nodes()
        .map(|node| {
            let (t, r, s) = node.transform().decomposed();
            let name = node
                .name()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("node_{}", node.index()));
            Node::new(
                name,
                parents[node.index()],
                Transform::from_trs(Vec3::from(t), Quat::from_array(r).normalize(), Vec3::from(s)),
            )
        })
        .collect();

    Skeleton::new(nodes)
}

/// Nodes of the default scene (or every root when no scene is marked default)
pub fn scene_roots(document: &gltf::Document) -> Vec<usize> {
    document
        .default_scene()
        .or_else(|| document.scenes().next())
        .map(|scene| scene.nodes().map(|n| n.index()).collect())
        .unwrap_or_default()
}
