//! Draw descriptors emitted per render pass.

use std::fmt;

use glam::{Mat4, Vec4};
use meridian_math::{Aabb, GroupId};
use meridian_volume::{MaterialId, TextureId};

use crate::{BatchFace, FaceKey, FaceSlot};

/// Buffer within a group's geometry. Indices restart at zero on every
/// rebuild, so rebuilding unchanged input yields the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId {
    pub group: GroupId,
    pub index: u32,
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/vb{}", self.group, self.index)
    }
}

/// One contiguous index range of one buffer, drawn with a single state.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInfo {
    pub buffer: BufferId,
    /// First vertex used.
    pub start: u32,
    /// Last vertex used (inclusive).
    pub end: u32,
    /// First index.
    pub offset: u32,
    pub count: u32,
    pub texture: TextureId,
    /// Textures addressed by the per-vertex texture index. Holds only
    /// `texture` when the buffer is not texture-batched.
    pub textures: Vec<TextureId>,
    pub texture_matrix: Option<Mat4>,
    /// `None` for geometry already in group space.
    pub model_matrix: Option<Mat4>,
    pub fullbright: bool,
    pub bump: u8,
    pub shiny: u8,
    pub material: Option<MaterialId>,
    pub shader_mask: u8,
    pub normal_map: Option<TextureId>,
    pub specular_map: Option<TextureId>,
    pub specular_color: Vec4,
    pub environment_intensity: f32,
    pub alpha_cutoff: f32,
    pub extents: Aabb,
    pub virtual_size: f32,
    /// Camera distance of the farthest face.
    pub distance: f32,
    pub faces: Vec<FaceKey>,
}

impl DrawInfo {
    pub(crate) fn for_face(
        buffer: BufferId,
        slot: &FaceSlot,
        face: &BatchFace,
        textures: &[TextureId],
    ) -> Self {
        let entry = &face.entry;
        let material = entry.material.as_ref();
        let textures = if textures.len() > 1 {
            textures.to_vec()
        } else {
            vec![entry.texture]
        };
        Self {
            buffer,
            start: slot.vertex_offset,
            end: slot.vertex_offset + slot.vertex_count - 1,
            offset: slot.index_offset,
            count: slot.index_count,
            texture: entry.texture,
            textures,
            texture_matrix: entry.texture_matrix,
            model_matrix: face.model_matrix,
            fullbright: entry.fullbright || face.hud,
            bump: entry.bump,
            shiny: entry.shiny,
            material: material.map(|m| m.id),
            shader_mask: material.map_or(0, |m| m.shader_mask()),
            normal_map: material.and_then(|m| m.normal_map),
            specular_map: material.and_then(|m| m.specular_map),
            specular_color: material.map_or(Vec4::ONE, |m| m.specular_color),
            environment_intensity: material.map_or(0.0, |m| m.environment_intensity),
            alpha_cutoff: material.map_or(0.0, |m| m.alpha_cutoff),
            extents: slot.extents,
            virtual_size: face.virtual_size,
            distance: face.distance,
            faces: vec![face.key],
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn triangle_count(&self) -> u32 {
        self.count / 3
    }

    /// Draws through a per-vertex texture index.
    pub fn is_texture_batched(&self) -> bool {
        self.textures.len() > 1
    }

    /// Extend this draw over the adjacent range of `next`.
    pub(crate) fn absorb(&mut self, next: DrawInfo) {
        self.end = next.end;
        self.count += next.count;
        self.extents = self.extents.union(&next.extents);
        self.virtual_size = self.virtual_size.max(next.virtual_size);
        self.distance = self.distance.max(next.distance);
        self.faces.extend(next.faces);
    }
}
