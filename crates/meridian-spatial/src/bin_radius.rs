//! Effective octree radius ("bin radius") of an entity.
//!
//! The bin radius is what the octree uses to decide node depth. It is not the
//! geometric radius: static objects are inflated so large static scenery sits
//! high in the tree, distant objects are inflated by the distance factors, and
//! animating or alpha-blended objects are shrunk so they do not force huge
//! nodes.

use glam::Vec3;
use meridian_config::OctreeConfig;

/// How an entity's bin radius is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinShape {
    /// Alpha-blended geometry, wrapped by the smallest axis of its scale.
    AlphaWrap { scale: Vec3 },
    /// Geometry rebuilt every frame (animating, rigged); shrink-wrapped to
    /// its current extents.
    Animating { half_extents: Vec3 },
    /// Non-moving scenery.
    Static,
    /// Attached to an avatar.
    Attachment,
    /// Everything else.
    Dynamic,
}

/// Compute the bin radius for an entity of geometric `radius` seen from
/// `distance`, clamped to the configured range.
pub fn bin_radius(config: &OctreeConfig, shape: BinShape, radius: f32, distance: f32) -> f32 {
    let distance = if distance.is_finite() { distance.max(0.0) } else { 0.0 };
    let scaled = |r: f32, factor: [f32; 2]| r * (1.0 + distance * factor[1]) + distance * factor[0];

    let r = match shape {
        BinShape::AlphaWrap { scale } => {
            scaled(scale.min_element() * 0.5, config.alpha_distance_factor)
        }
        BinShape::Animating { half_extents } => half_extents.length(),
        BinShape::Static => {
            let szf = config.static_object_size_factor as f32;
            let r = radius.max(szf);
            let r = if r > 0.0 { r.powf(1.0 + szf / r) } else { r };
            scaled(r, config.distance_factor)
        }
        BinShape::Attachment => {
            (radius.floor() as i32).max(1) as f32 * config.attachment_size_factor as f32
        }
        BinShape::Dynamic => scaled(radius, config.distance_factor),
    };

    if r.is_nan() {
        return config.bin_radius_min;
    }
    r.clamp(config.bin_radius_min, config.bin_radius_max)
}
