//! Converts triangle meshes into flattened bounding volume hierarchies
//! (`.blas` files) for a GPU ray tracer.

pub mod accelerators;
pub mod error;
pub mod scene;
pub mod types;

pub use accelerators::{AABB, Bvh, BvhBuilder, BvhNode};
pub use error::{BlasError, Location, ParseError, RecordKind};
pub use scene::{ConversionReport, Job, Manifest, Mesh, convert};
pub use types::{Triangle, Vertex};
