//! Geometry generation for primitive and sculpted shapes.
//!
//! All shapes live in the unit cube centred on the origin; the entity
//! transform supplies scale.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Vec2, Vec3};

use crate::{VolumeError, VolumeFace};

/// Tessellation multiplier per detail level.
const DETAIL_SCALES: [f32; 4] = [1.0, 1.5, 2.5, 4.0];

/// Circumference segments of curved shapes at detail scale 1.
const BASE_SEGMENTS: f32 = 8.0;

pub fn detail_scale(detail: u8) -> f32 {
    DETAIL_SCALES[(detail as usize).min(DETAIL_SCALES.len() - 1)]
}

fn curved_segments(detail: u8) -> u16 {
    (BASE_SEGMENTS * detail_scale(detail)).round() as u16
}

/// Grid of `cols` x `rows` quads. `at(s, t)` maps grid coordinates in
/// `0..=1` to position and normal; increasing `s` then `t` must wind
/// counter-clockwise seen from outside.
fn grid_face(cols: u16, rows: u16, at: impl Fn(f32, f32) -> (Vec3, Vec3)) -> VolumeFace {
    let mut positions = Vec::with_capacity((cols as usize + 1) * (rows as usize + 1));
    let mut normals = Vec::with_capacity(positions.capacity());
    let mut uvs = Vec::with_capacity(positions.capacity());
    for j in 0..=rows {
        for i in 0..=cols {
            let (s, t) = (i as f32 / cols as f32, j as f32 / rows as f32);
            let (p, n) = at(s, t);
            positions.push(p);
            normals.push(n);
            uvs.push(Vec2::new(s, t));
        }
    }
    let row = cols + 1;
    let mut indices = Vec::with_capacity(cols as usize * rows as usize * 6);
    for j in 0..rows {
        for i in 0..cols {
            let a = j * row + i;
            let (b, c, d) = (a + 1, a + row + 1, a + row);
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    VolumeFace::new(positions, normals, uvs, indices)
}

/// Six faces, one per side, each subdivided by the detail level.
pub fn generate_box(detail: u8) -> Vec<VolumeFace> {
    let n = detail_scale(detail).round() as u16;
    // (outward normal, u, v) with u x v = normal.
    let sides = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    sides
        .into_iter()
        .map(|(normal, u, v)| {
            grid_face(n, n, |s, t| {
                (normal * 0.5 + u * (s - 0.5) + v * (t - 0.5), normal)
            })
        })
        .collect()
}

/// Side wall plus top and bottom caps, axis along Z.
pub fn generate_cylinder(detail: u8) -> Vec<VolumeFace> {
    let segments = curved_segments(detail);
    let side = grid_face(segments, 1, |s, t| {
        let (sin, cos) = (s * TAU).sin_cos();
        let n = Vec3::new(cos, sin, 0.0);
        (Vec3::new(0.5 * cos, 0.5 * sin, t - 0.5), n)
    });
    vec![side, cap(segments, 0.5), cap(segments, -0.5)]
}

fn cap(segments: u16, z: f32) -> VolumeFace {
    let normal = if z > 0.0 { Vec3::Z } else { Vec3::NEG_Z };
    let mut positions = vec![Vec3::new(0.0, 0.0, z)];
    let mut uvs = vec![Vec2::splat(0.5)];
    for k in 0..segments {
        let (sin, cos) = (k as f32 / segments as f32 * TAU).sin_cos();
        positions.push(Vec3::new(0.5 * cos, 0.5 * sin, z));
        uvs.push(Vec2::new(0.5 + 0.5 * cos, 0.5 + 0.5 * sin));
    }
    let mut indices = Vec::with_capacity(segments as usize * 3);
    for k in 0..segments {
        let a = 1 + k;
        let b = 1 + (k + 1) % segments;
        if z > 0.0 {
            indices.extend_from_slice(&[0, a, b]);
        } else {
            indices.extend_from_slice(&[0, b, a]);
        }
    }
    let count = positions.len();
    VolumeFace::new(positions, vec![normal; count], uvs, indices)
}

/// Single face UV sphere.
pub fn generate_sphere(detail: u8) -> Vec<VolumeFace> {
    let segments = curved_segments(detail);
    let rings = (segments / 2).max(2);
    let face = grid_face(segments, rings, |s, t| {
        let (sin_lon, cos_lon) = (s * TAU).sin_cos();
        let (sin_lat, cos_lat) = (t * 2.0 * FRAC_PI_2 - FRAC_PI_2).sin_cos();
        let n = Vec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
        (n * 0.5, n)
    });
    vec![face]
}

/// RGB texels of a sculpt map, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SculptMap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[u8; 3]>,
}

impl SculptMap {
    pub fn new(width: u32, height: u32, texels: Vec<[u8; 3]>) -> Result<Self, VolumeError> {
        if width < 2 || height < 2 {
            return Err(VolumeError::InvalidSculptMap(format!(
                "{width}x{height} is smaller than 2x2"
            )));
        }
        if texels.len() != width as usize * height as usize {
            return Err(VolumeError::InvalidSculptMap(format!(
                "{} texels for a {width}x{height} map",
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    fn sample(&self, s: f32, t: f32) -> Vec3 {
        let x = ((s * (self.width - 1) as f32).round() as u32).min(self.width - 1);
        let y = ((t * (self.height - 1) as f32).round() as u32).min(self.height - 1);
        let [r, g, b] = self.texels[(y * self.width + x) as usize];
        Vec3::new(r as f32, g as f32, b as f32) / 255.0 - Vec3::splat(0.5)
    }
}

/// One face sampled from the sculpt map at a resolution set by the detail
/// level, never finer than the map itself.
pub fn generate_sculpt(map: &SculptMap, detail: u8) -> Vec<VolumeFace> {
    let res = curved_segments(detail);
    let cols = res.min((map.width - 1).min(u16::MAX as u32) as u16).max(1);
    let rows = res.min((map.height - 1).min(u16::MAX as u32) as u16).max(1);
    let mut face = grid_face(cols, rows, |s, t| (map.sample(s, t), Vec3::Z));
    face.compute_normals();
    vec![face]
}
