//! Culling frustum in agent space.

use glam::{Mat4, Vec3, Vec4};

use crate::Aabb;

/// Half-space `normal . p + d >= 0`, normal pointing into the frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_row(row: Vec4) -> Self {
        let normal = row.truncate();
        let len = normal.length();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: row.w / len,
            }
        } else {
            Self { normal, d: row.w }
        }
    }

    /// Signed distance of `p`; negative is outside.
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// Corner of `aabb` farthest along the normal.
    fn positive_corner(&self, aabb: &Aabb) -> Vec3 {
        Vec3::select(self.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min)
    }
}

/// Six planes: left, right, bottom, top, near, far.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Planes of a view-projection matrix with `[0, 1]` clip depth, as built
    /// by `Mat4::perspective_rh`.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let [x, y, z, w] = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];
        Self {
            planes: [w + x, w - x, w + y, w - y, z, w - z].map(Plane::from_row),
        }
    }

    /// Accepts every box.
    pub fn everything() -> Self {
        Self {
            planes: [Plane {
                normal: Vec3::ZERO,
                d: 1.0,
            }; 6],
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// False only when `aabb` lies entirely behind one plane. Boxes near a
    /// frustum corner may pass without being visible.
    pub fn is_visible(&self, aabb: &Aabb) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance(plane.positive_corner(aabb)) >= 0.0)
    }
}
