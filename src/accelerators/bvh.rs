use std::ops::Range;

use glam::Vec3;
use log::{debug, trace};

use super::aabb::AABB;
use crate::scene::Mesh;

/// A node of the flattened hierarchy.
///
/// `left_child` is overloaded: for a leaf (`primitive_count > 0`) it is the
/// first entry of the triangle index array covered by the leaf, for an
/// internal node it is the pool index of the left child. The right child always
/// lives at `left_child + 1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BvhNode {
    pub bounds: AABB,
    pub left_child: u32,
    pub primitive_count: u32,
}

impl BvhNode {
    pub const ZERO: BvhNode = BvhNode {
        bounds: AABB {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        },
        left_child: 0,
        primitive_count: 0,
    };

    pub fn is_leaf(&self) -> bool {
        self.primitive_count != 0
    }

    /// Pool indices of both children, `None` for leaves.
    pub fn children(&self) -> Option<(usize, usize)> {
        if self.is_leaf() {
            None
        } else {
            let left = self.left_child as usize;
            Some((left, left + 1))
        }
    }

    /// Range of the triangle index array covered by this node; empty for
    /// internal nodes.
    pub fn primitives(&self) -> Range<usize> {
        let start = self.left_child as usize;
        if self.is_leaf() {
            start..start + self.primitive_count as usize
        } else {
            start..start
        }
    }
}

/// A finished hierarchy over one mesh, ready to be serialized.
#[derive(Clone, Debug, PartialEq)]
pub struct Bvh {
    bounds: AABB,
    nodes: Vec<BvhNode>,
    nodes_used: usize,
    triangle_indices: Vec<u32>,
}

impl Bvh {
    pub fn build(mesh: &Mesh) -> Self {
        BvhBuilder::new(mesh).build()
    }

    /// Bounds of every vertex of the source mesh.
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// The used prefix of the node pool, root first.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes[..self.nodes_used]
    }

    pub fn node(&self, id: usize) -> Option<&BvhNode> {
        self.nodes().get(id)
    }

    pub fn nodes_used(&self) -> usize {
        self.nodes_used
    }

    /// Size of the preallocated pool, `2N - 1` for `N` triangles.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes().iter().filter(|node| node.is_leaf()).count()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        if self.nodes_used == 0 {
            return 0;
        }

        let mut depth = 0;
        let mut stack = vec![(0, 1)];

        while let Some((id, level)) = stack.pop() {
            depth = depth.max(level);

            if let Some((left, right)) = self.nodes[id].children() {
                stack.push((left, level + 1));
                stack.push((right, level + 1));
            }
        }

        depth
    }
}

pub struct BvhBuilder<'a> {
    mesh: &'a Mesh,
    nodes: Vec<BvhNode>,
    nodes_used: usize,
    triangle_indices: Vec<u32>,
}

impl<'a> BvhBuilder<'a> {
    pub fn new(mesh: &'a Mesh) -> Self {
        let count = mesh.triangles.len();

        Self {
            mesh,
            nodes: vec![BvhNode::ZERO; (2 * count).saturating_sub(1)],
            nodes_used: 0,
            triangle_indices: (0..count as u32).collect(),
        }
    }

    pub fn build(mut self) -> Bvh {
        if !self.triangle_indices.is_empty() {
            self.nodes[0] = BvhNode {
                left_child: 0,
                primitive_count: self.triangle_indices.len() as u32,
                ..BvhNode::ZERO
            };
            self.nodes_used = 1;

            // Left is pushed last so its whole subtree is allocated before the
            // right sibling's, matching a depth-first recursive build.
            let mut stack = vec![0];
            while let Some(node_idx) = stack.pop() {
                if let Some(left_idx) = self.subdivide(node_idx) {
                    stack.push(left_idx + 1);
                    stack.push(left_idx);
                }
            }
        }

        debug!(
            "Built BVH over {} triangles using {} of {} nodes",
            self.triangle_indices.len(),
            self.nodes_used,
            self.nodes.len()
        );

        Bvh {
            bounds: self.mesh.bounds,
            nodes: self.nodes,
            nodes_used: self.nodes_used,
            triangle_indices: self.triangle_indices,
        }
    }

    fn update_bounds(&mut self, node_idx: usize) {
        let mesh = self.mesh;
        let node = &mut self.nodes[node_idx];

        node.bounds = AABB::EMPTY;
        for &tri in &self.triangle_indices[node.primitives()] {
            node.bounds
                .grow_bb_mut(&mesh.triangles[tri as usize].aabb(&mesh.vertices));
        }
    }

    /// Returns the pool index of the new left child when the node was split.
    fn subdivide(&mut self, node_idx: usize) -> Option<usize> {
        trace!("Splitting node {}", node_idx);

        self.update_bounds(node_idx);

        let node = self.nodes[node_idx];
        if node.primitive_count < 2 {
            return None;
        }

        let axis = node.bounds.largest_axis();
        let split_pos = node.bounds.min[axis] + node.bounds.extent()[axis] / 2.0;

        let range = node.primitives();
        let left_count = self.partition(range.clone(), axis, split_pos);

        if left_count == 0 || left_count == range.len() {
            debug!(
                "Node {} keeps {} triangles: no split along axis {} at {}",
                node_idx,
                range.len(),
                axis,
                split_pos
            );
            return None;
        }

        let left_idx = self.nodes_used;
        self.nodes_used += 2;

        self.nodes[left_idx] = BvhNode {
            left_child: range.start as u32,
            primitive_count: left_count as u32,
            ..BvhNode::ZERO
        };
        self.nodes[left_idx + 1] = BvhNode {
            left_child: (range.start + left_count) as u32,
            primitive_count: (range.len() - left_count) as u32,
            ..BvhNode::ZERO
        };

        let node = &mut self.nodes[node_idx];
        node.left_child = left_idx as u32;
        node.primitive_count = 0;

        Some(left_idx)
    }

    /// Moves every triangle whose centroid lies below `split_pos` to the front
    /// of `range`, returning how many there are.
    fn partition(&mut self, range: Range<usize>, axis: usize, split_pos: f32) -> usize {
        let triangles = &self.mesh.triangles[..];
        let indices = &mut self.triangle_indices[range];

        let mut left = 0;
        let mut right = indices.len();
        while left < right {
            if triangles[indices[left] as usize].centroid[axis] < split_pos {
                left += 1;
            } else {
                right -= 1;
                indices.swap(left, right);
            }
        }

        left
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::types::Vertex;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [Vertex; 3] {
        [Vec3::from(a), Vec3::from(b), Vec3::from(c)]
    }

    fn unit_tri_at(x: f32) -> [Vertex; 3] {
        tri([x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0])
    }

    fn assert_well_formed(mesh: &Mesh, bvh: &Bvh) {
        let n = mesh.triangles.len();

        let mut sorted = bvh.triangle_indices().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..n as u32).collect::<Vec<_>>());

        assert!(bvh.nodes_used() <= (2 * n).saturating_sub(1));

        let leaf_sum: usize = bvh
            .nodes()
            .iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.primitive_count as usize)
            .sum();
        assert_eq!(leaf_sum, n);

        for node in bvh.nodes() {
            match node.children() {
                Some((left, right)) => {
                    assert!(right < bvh.nodes_used());
                    assert!(node.bounds.contains(&bvh.nodes()[left].bounds));
                    assert!(node.bounds.contains(&bvh.nodes()[right].bounds));
                }
                None => {
                    for &tri in &bvh.triangle_indices()[node.primitives()] {
                        let aabb = mesh.triangles[tri as usize].aabb(&mesh.vertices);
                        assert!(node.bounds.contains(&aabb));
                    }
                }
            }
        }
    }

    #[test]
    fn single_triangle_is_a_single_leaf() {
        let mesh = Mesh::from_triangle_soup(&[unit_tri_at(0.0)]);
        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 1);
        assert_eq!(bvh.capacity(), 1);
        assert_eq!(bvh.triangle_indices(), &[0]);

        let root = bvh.nodes()[0];
        assert_eq!(root.left_child, 0);
        assert_eq!(root.primitive_count, 1);
        assert_eq!(root.bounds, AABB::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn separated_triangles_split_into_two_leaves() {
        let mesh = Mesh::from_triangle_soup(&[unit_tri_at(0.0), unit_tri_at(10.0)]);
        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 3);
        assert_eq!(bvh.depth(), 2);

        let root = bvh.nodes()[0];
        assert!(!root.is_leaf());
        assert_eq!(root.children(), Some((1, 2)));

        let left = bvh.nodes()[1];
        let right = bvh.nodes()[2];
        assert_eq!((left.left_child, left.primitive_count), (0, 1));
        assert_eq!((right.left_child, right.primitive_count), (1, 1));
        assert_eq!(bvh.triangle_indices(), &[0, 1]);

        assert_eq!(left.bounds.max.x, 1.0);
        assert_eq!(right.bounds.min.x, 10.0);
    }

    #[test]
    fn node_bounds_are_union_of_triangle_boxes() {
        let mesh = Mesh::from_triangle_soup(&[
            unit_tri_at(0.0),
            unit_tri_at(4.0),
            [Vec3::new(7.0, -2.0, 1.0), Vec3::new(8.0, 3.0, -1.0), Vec3::new(9.0, 0.0, 0.5)],
        ]);
        let bvh = Bvh::build(&mesh);

        for node in bvh.nodes() {
            let expected = bvh.triangle_indices()[node.primitives()]
                .iter()
                .map(|&tri| mesh.triangles[tri as usize].aabb(&mesh.vertices))
                .fold(AABB::EMPTY, |acc, aabb| AABB::combine(&acc, &aabb));
            if node.is_leaf() {
                assert_eq!(node.bounds, expected);
            }
        }
        assert_eq!(
            bvh.nodes()[0].bounds,
            AABB::new(Vec3::new(0.0, -2.0, -1.0), Vec3::new(9.0, 3.0, 1.0))
        );
    }

    #[test]
    fn partition_reorders_indices_in_place() {
        let mesh = Mesh::from_triangle_soup(&[unit_tri_at(10.0), unit_tri_at(0.0)]);
        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 3);
        assert_eq!(bvh.triangle_indices(), &[1, 0]);
        assert_eq!(bvh.nodes()[1].bounds.min.x, 0.0);
        assert_eq!(bvh.nodes()[2].bounds.min.x, 10.0);
    }

    #[test]
    fn coincident_centroids_stay_in_one_leaf() {
        let soup = [
            tri([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 3.0, 0.0]),
            tri([0.0, -1.0, 0.0], [0.0, 1.0, 3.0], [0.0, 3.0, -3.0]),
            tri([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 3.0, 0.0]),
            tri([1.0, 1.0, 1.0], [-1.0, 1.0, -1.0], [0.0, 1.0, 0.0]),
        ];
        let mesh = Mesh::from_triangle_soup(&soup);
        for triangle in &mesh.triangles {
            assert_eq!(triangle.centroid, Vec3::new(0.0, 1.0, 0.0));
        }

        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 1);
        assert_eq!(bvh.nodes()[0].primitive_count, 4);
        assert_eq!(bvh.nodes()[0].left_child, 0);
        assert_well_formed(&mesh, &bvh);
    }

    #[test]
    fn empty_mesh_has_no_nodes() {
        let mesh = Mesh::default();
        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 0);
        assert_eq!(bvh.capacity(), 0);
        assert!(bvh.nodes().is_empty());
        assert!(bvh.triangle_indices().is_empty());
        assert_eq!(bvh.depth(), 0);
    }

    #[test]
    fn row_of_triangles_splits_down_to_single_leaves() {
        let soup: Vec<_> = (0..8).map(|i| unit_tri_at(i as f32 * 4.0)).collect();
        let mesh = Mesh::from_triangle_soup(&soup);
        let bvh = Bvh::build(&mesh);

        assert_eq!(bvh.nodes_used(), 15);
        assert_eq!(bvh.leaf_count(), 8);
        assert_eq!(bvh.depth(), 4);
        assert!(bvh.nodes().iter().filter(|n| n.is_leaf()).all(|n| n.primitive_count == 1));
        assert_well_formed(&mesh, &bvh);
    }

    #[test]
    fn left_subtree_is_allocated_before_right() {
        let soup: Vec<_> = (0..4).map(|i| unit_tri_at(i as f32 * 4.0)).collect();
        let mesh = Mesh::from_triangle_soup(&soup);
        let bvh = Bvh::build(&mesh);

        // root -> (1, 2); node 1 -> (3, 4); node 2 -> (5, 6)
        assert_eq!(bvh.nodes()[0].children(), Some((1, 2)));
        assert_eq!(bvh.nodes()[1].children(), Some((3, 4)));
        assert_eq!(bvh.nodes()[2].children(), Some((5, 6)));
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let soup: Vec<_> = (0..32)
            .map(|i| {
                let f = i as f32;
                tri(
                    [f * 0.7, (f * 1.3) % 5.0, (f * 2.9) % 7.0],
                    [f * 0.7 + 1.0, (f * 1.3) % 5.0, 0.5],
                    [f * 0.1, 2.0, (f * 0.3) % 3.0],
                )
            })
            .collect();
        let mesh = Mesh::from_triangle_soup(&soup);

        let first = Bvh::build(&mesh);
        let second = Bvh::build(&mesh);

        assert_eq!(first, second);
        assert_well_formed(&mesh, &first);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn random_soups_build_well_formed_trees(
            raw in prop::collection::vec(prop::array::uniform9(-100.0f32..100.0), 1..96)
        ) {
            let soup: Vec<_> = raw
                .iter()
                .map(|c| tri([c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7], c[8]]))
                .collect();
            let mesh = Mesh::from_triangle_soup(&soup);
            let bvh = Bvh::build(&mesh);

            assert_well_formed(&mesh, &bvh);
            prop_assert!(bvh.nodes()[0].bounds.min.cmpge(mesh.bounds.min).all());
            prop_assert!(bvh.nodes()[0].bounds.max.cmple(mesh.bounds.max).all());
        }
    }
}
