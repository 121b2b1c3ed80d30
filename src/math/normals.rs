use glam::Vec3;

/// Area-weighted vertex normals accumulated from triangle faces.
/// Vertices not referenced by any face get +Y.
pub fn vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        // Cross product length is twice the area, so large faces weigh more
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO {
                Vec3::Y
            } else {
                n
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_clockwise_triangle_faces_up() {
        let positions = [Vec3::ZERO, Vec3::Z, Vec3::X];
        let normals = vertex_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert!((n - Vec3::Y).length() < 1e-6, "{:?}", n);
        }
    }

    #[test]
    fn test_shared_vertex_averages() {
        // Two faces meeting at a right angle along the X axis
        let positions = [
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::Y,
        ];
        let normals = vertex_normals(&positions, &[0, 1, 2, 0, 1, 3]);
        let expected = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert!((normals[0] - expected).length() < 1e-5, "{:?}", normals[0]);
    }

    #[test]
    fn test_unreferenced_vertex_defaults_up() {
        let normals = vertex_normals(&[Vec3::ZERO, Vec3::X], &[]);
        assert_eq!(normals, vec![Vec3::Y, Vec3::Y]);
    }
}
