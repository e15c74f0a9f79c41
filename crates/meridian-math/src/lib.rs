//! Bounding volumes, view frustum, arena ids, and small numeric helpers for the
//! Meridian volume pipeline.

mod aabb;
mod frustum;
mod ids;

pub use aabb::Aabb;
pub use frustum::{Frustum, Plane};
pub use ids::{EntityId, GroupId, IdAllocator};

/// Round `value` to the nearest multiple of `nearest`.
///
/// LOD math rounds distances and radii to hundredths so that tiny camera
/// jitter does not flip detail levels back and forth.
pub fn round_to(value: f32, nearest: f32) -> f32 {
    if nearest <= 0.0 {
        return value;
    }
    (value / nearest).round() * nearest
}
