use glam::Vec3;

pub mod triangle;

pub use triangle::Triangle;

/// A mesh vertex position.
pub type Vertex = Vec3;
