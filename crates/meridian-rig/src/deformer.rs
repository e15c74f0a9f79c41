//! Per-entity deformed copy of a rigged volume.

use glam::{Mat3, Mat4, Vec3};
use meridian_math::Aabb;
use meridian_volume::{SegmentHit, Volume, VolumeFace};

use crate::{SkeletonPose, SkinError, SkinInfo, build_palette, skin_matrix};

/// Result of a successful [`RiggedDeformer::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinOutcome {
    /// Face buffers were reused.
    Updated,
    /// Face buffers were reallocated to match the source first.
    Reallocated,
    /// Already deformed this frame; nothing done.
    AlreadyCurrent,
}

/// Skinned faces owned by one entity.
#[derive(Debug, Default, Clone)]
pub struct RiggedVolume {
    faces: Vec<VolumeFace>,
    bounds: Aabb,
    source_detail: Option<u8>,
    last_frame: Option<u64>,
}

impl RiggedVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faces(&self) -> &[VolumeFace] {
        &self.faces
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Detail level of the source volume last deformed.
    pub fn source_detail(&self) -> Option<u8> {
        self.source_detail
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// True if face and per-face vertex/index counts equal the source's.
    pub fn matches(&self, source: &Volume) -> bool {
        self.faces.len() == source.face_count()
            && self.faces.iter().zip(source.faces()).all(|(dst, src)| {
                dst.vertex_count() == src.vertex_count() && dst.index_count() == src.index_count()
            })
    }

    /// Closest face hit by the segment, in the deformed space.
    pub fn line_segment_intersect(&self, start: Vec3, end: Vec3) -> Option<(usize, SegmentHit)> {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.line_segment_intersect(start, end).map(|h| (i, h)))
            .min_by(|a, b| a.1.t.total_cmp(&b.1.t))
    }

    fn reallocate_from(&mut self, source: &Volume) {
        self.faces = source
            .faces()
            .iter()
            .map(|src| {
                let mut face = VolumeFace::default();
                face.reallocate(src.vertex_count(), src.index_count());
                face.indices.copy_from_slice(&src.indices);
                face.uvs.copy_from_slice(&src.uvs);
                face
            })
            .collect();
    }
}

/// Applies skeleton poses to rigged volumes.
#[derive(Debug, Clone)]
pub struct RiggedDeformer {
    max_joints: usize,
}

impl RiggedDeformer {
    pub fn new(max_joints: usize) -> Self {
        Self {
            max_joints: max_joints.max(1),
        }
    }

    pub fn max_joints(&self) -> usize {
        self.max_joints
    }

    /// Deform `source` by `pose` into `rigged`.
    ///
    /// Runs at most once per `frame`. Every face is skinned into scratch
    /// buffers before `rigged` is touched, so on any error it still holds
    /// last frame's result. The per-face triangle trees are dropped and rebuilt on the
    /// next pick.
    pub fn update(
        &self,
        rigged: &mut RiggedVolume,
        skin: &SkinInfo,
        pose: &SkeletonPose,
        source: &Volume,
        frame: u64,
    ) -> Result<SkinOutcome, SkinError> {
        if rigged.last_frame == Some(frame) && rigged.source_detail == Some(source.detail()) {
            return Ok(SkinOutcome::AlreadyCurrent);
        }
        for (i, face) in source.faces().iter().enumerate() {
            if let Some(weights) = &face.weights
                && weights.len() != face.vertex_count()
            {
                return Err(SkinError::WeightMismatch {
                    face: i,
                    vertices: face.vertex_count(),
                    weights: weights.len(),
                });
            }
        }
        let palette = build_palette(skin, pose, self.max_joints)?;

        let bind_shape = skin.bind_shape;
        let bind_normal = Mat3::from_mat4(bind_shape);
        let mut skinned = Vec::with_capacity(source.face_count());
        for (i, src) in source.faces().iter().enumerate() {
            let (positions, normals): (Vec<Vec3>, Vec<Vec3>) = match &src.weights {
                Some(weights) => weights
                    .iter()
                    .enumerate()
                    .map(|(v, influence)| {
                        let m: Mat4 = skin_matrix(&palette, influence);
                        let pos = m.transform_point3(bind_shape.transform_point3(src.positions[v]));
                        let normal = Mat3::from_mat4(m) * (bind_normal * src.normals[v]);
                        (pos, normal.normalize_or_zero())
                    })
                    .unzip(),
                None => (src.positions.clone(), src.normals.clone()),
            };
            if positions.iter().any(|p| !p.is_finite()) {
                return Err(SkinError::NonFinite(i));
            }
            skinned.push((positions, normals));
        }

        let outcome = if rigged.matches(source) {
            SkinOutcome::Updated
        } else {
            log::debug!(
                "reallocating rigged faces: {} -> {} faces",
                rigged.faces.len(),
                source.face_count()
            );
            rigged.reallocate_from(source);
            SkinOutcome::Reallocated
        };

        let mut bounds = Aabb::EMPTY;
        for (dst, (positions, normals)) in rigged.faces.iter_mut().zip(skinned) {
            dst.positions.copy_from_slice(&positions);
            dst.normals.copy_from_slice(&normals);
            dst.update_extents();
            dst.invalidate_tree();
            if !dst.is_empty() {
                bounds = bounds.union(&dst.extents);
            }
        }

        rigged.bounds = bounds;
        rigged.source_detail = Some(source.detail());
        rigged.last_frame = Some(frame);
        Ok(outcome)
    }
}
