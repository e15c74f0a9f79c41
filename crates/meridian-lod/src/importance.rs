//! Screen-space importance estimates used to prioritise texture fetches.

/// Approximate on-screen area, in pixels, of a sphere of `radius` at
/// `distance`, for a vertical field of view `fov_y` (radians) and a viewport
/// `viewport_height` pixels tall.
pub fn projected_pixel_area(radius: f32, distance: f32, fov_y: f32, viewport_height: f32) -> f32 {
    if !(radius > 0.0) || !(viewport_height > 0.0) || !(fov_y > 0.0) {
        return 0.0;
    }
    let distance = distance.max(radius).max(f32::EPSILON);
    let pixels_per_unit = viewport_height / (2.0 * (fov_y * 0.5).tan() * distance);
    let projected = radius * pixels_per_unit;
    std::f32::consts::PI * projected * projected
}

/// Virtual size of one face: the entity's projected area weighted by the
/// face's share of the entity's surface (`0.0..=1.0`).
pub fn texture_virtual_size(entity_pixel_area: f32, face_share: f32) -> f32 {
    entity_pixel_area * face_share.clamp(0.0, 1.0)
}
