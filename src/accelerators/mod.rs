pub mod aabb;
pub mod bvh;

pub use aabb::AABB;
pub use bvh::{Bvh, BvhBuilder, BvhNode};
