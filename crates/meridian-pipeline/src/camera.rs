use glam::{Mat4, Vec3};
use meridian_math::Frustum;

/// The view one frame is rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub frustum: Frustum,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub viewport_height: f32,
}

impl Camera {
    const NEAR: f32 = 0.1;
    const FAR: f32 = 1024.0;

    /// Perspective camera at `position` looking at `target`, Z up.
    pub fn look_at(position: Vec3, target: Vec3, fov_y: f32, aspect: f32, viewport_height: f32) -> Self {
        let forward = (target - position).normalize_or_zero();
        let up = if forward.cross(Vec3::Z).length_squared() < 1e-6 {
            Vec3::Y
        } else {
            Vec3::Z
        };
        let view = Mat4::look_at_rh(position, target, up);
        let projection = Mat4::perspective_rh(fov_y, aspect, Self::NEAR, Self::FAR);
        Self {
            position,
            frustum: Frustum::from_view_projection(&(projection * view)),
            fov_y,
            viewport_height,
        }
    }

    /// Camera that culls nothing. Distances are still measured from
    /// `position`.
    pub fn unculled(position: Vec3) -> Self {
        Self {
            position,
            frustum: Frustum::everything(),
            fov_y: std::f32::consts::FRAC_PI_3,
            viewport_height: 1080.0,
        }
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }
}
