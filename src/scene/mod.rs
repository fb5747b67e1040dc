use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::info;

use crate::accelerators::aabb::AABB;
use crate::accelerators::bvh::Bvh;
use crate::error::BlasError;
use crate::types::{Triangle, Vertex};

pub mod blas;
pub mod loader;
pub mod manifest;

pub use manifest::{Job, Manifest};

/// File extension of serialized hierarchies.
pub const BLAS_EXTENSION: &str = "blas";

/// Triangle mesh as read from a mesh description.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    /// Bounds of every vertex, including ones no triangle references.
    pub bounds: AABB,
}

impl Mesh {
    /// Builds a mesh with three fresh vertices per triangle.
    pub fn from_triangle_soup(soup: &[[Vertex; 3]]) -> Self {
        let mut mesh = Mesh::default();

        for positions in soup {
            let first = mesh.vertices.len() as u32;
            for &position in positions {
                mesh.push_vertex(position);
            }
            mesh.push_triangle([first, first + 1, first + 2]);
        }

        mesh
    }

    pub fn push_vertex(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
        self.bounds.grow(vertex);
    }

    /// Corners must already be valid indices into `vertices`.
    pub fn push_triangle(&mut self, corners: [u32; 3]) {
        let positions = corners.map(|corner| self.vertices[corner as usize]);
        self.triangles.push(Triangle::new(corners, positions));
    }
}

#[derive(Clone, Debug)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub vertices: usize,
    pub triangles: usize,
    pub nodes_used: usize,
    pub leaves: usize,
    pub depth: usize,
    pub build_time: Duration,
}

/// Loads the mesh at `input`, builds its hierarchy and writes it to `output`.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<ConversionReport, BlasError> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mesh = loader::load_obj(input)?;
    info!(
        "Loaded {}: {} vertices, {} triangles",
        input.display(),
        mesh.vertices.len(),
        mesh.triangles.len()
    );

    let start = Instant::now();
    let bvh = Bvh::build(&mesh);
    let build_time = start.elapsed();
    info!(
        "BVH built in {:.4}s: {} nodes, depth {}",
        build_time.as_secs_f32(),
        bvh.nodes_used(),
        bvh.depth()
    );

    blas::save(&bvh, output)?;
    info!("Saved {}", output.display());

    Ok(ConversionReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        vertices: mesh.vertices.len(),
        triangles: mesh.triangles.len(),
        nodes_used: bvh.nodes_used(),
        leaves: bvh.leaf_count(),
        depth: bvh.depth(),
        build_time,
    })
}
