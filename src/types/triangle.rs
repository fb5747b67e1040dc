use glam::Vec3;

use crate::accelerators::aabb::AABB;

use super::Vertex;

/// A triangle of a mesh.
///
/// Corners are indices into the owning mesh's vertex list, the centroid is
/// computed once when the triangle is assembled.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    pub corners: [u32; 3],
    pub centroid: Vec3,
}

impl Triangle {
    /// `positions` must be the vertices `corners` refer to, in the same order.
    pub fn new(corners: [u32; 3], positions: [Vertex; 3]) -> Self {
        let [a, b, c] = positions;

        Self {
            corners,
            centroid: (a + b + c) / 3.0,
        }
    }

    pub fn positions(&self, vertices: &[Vertex]) -> [Vertex; 3] {
        self.corners.map(|corner| vertices[corner as usize])
    }

    pub fn aabb(&self, vertices: &[Vertex]) -> AABB {
        AABB::from_points(self.positions(vertices))
    }
}
