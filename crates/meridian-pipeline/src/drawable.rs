//! Per-entity render state.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use meridian_lod::LodState;
use meridian_math::{Aabb, EntityId};
use meridian_rig::RiggedVolume;
use meridian_spatial::BinShape;
use meridian_volume::{TextureEntry, TextureId, Volume, VolumeFace, VolumeKey, VolumeParams};

use crate::SkeletonId;

/// How an entity's transform is expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    /// Positions are baked into the group's buffers.
    #[default]
    Static,
    /// Drawn with its own model matrix so moves do not touch vertex data.
    Dynamic,
}

/// Everything needed to create an entity.
#[derive(Debug, Clone)]
pub struct EntityDesc {
    /// Owning scene object, for the host's bookkeeping.
    pub object: u64,
    pub params: VolumeParams,
    pub transform: Mat4,
    /// Per-face surface parameters; faces past the end reuse the last entry.
    pub faces: Vec<TextureEntry>,
    pub motion: Motion,
    pub skeleton: Option<SkeletonId>,
    pub attachment: bool,
    pub hud: bool,
}

impl EntityDesc {
    pub fn new(object: u64, params: VolumeParams, transform: Mat4) -> Self {
        Self {
            object,
            params,
            transform,
            faces: Vec::new(),
            motion: Motion::Static,
            skeleton: None,
            attachment: false,
            hud: false,
        }
    }

    /// Use `entry` on every face.
    pub fn with_texture(mut self, entry: TextureEntry) -> Self {
        self.faces = vec![entry];
        self
    }

    pub fn with_faces(mut self, faces: Vec<TextureEntry>) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    /// Skin against `skeleton` when the mesh carries a skin binding.
    pub fn rigged(mut self, skeleton: SkeletonId) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    pub fn attachment(mut self) -> Self {
        self.attachment = true;
        self
    }

    pub fn hud(mut self) -> Self {
        self.hud = true;
        self
    }
}

#[derive(Debug)]
pub struct Drawable {
    pub(crate) id: EntityId,
    pub(crate) object: u64,
    pub(crate) params: VolumeParams,
    pub(crate) transform: Mat4,
    pub(crate) faces: Vec<TextureEntry>,
    pub(crate) motion: Motion,
    pub(crate) skeleton: Option<SkeletonId>,
    pub(crate) attachment: bool,
    pub(crate) hud: bool,
    pub(crate) volume: Option<Arc<Volume>>,
    /// Arena key of `volume`; `None` for private placeholders.
    pub(crate) volume_key: Option<VolumeKey>,
    pub(crate) lod: LodState,
    pub(crate) rigged: Option<RiggedVolume>,
    /// `rigged` holds this frame's deformation and is what gets drawn.
    pub(crate) skin_active: bool,
    /// Frame at which a missing asset is asked for again.
    pub(crate) retry_at: Option<u64>,
}

impl Drawable {
    pub(crate) fn new(id: EntityId, desc: EntityDesc) -> Self {
        Self {
            id,
            object: desc.object,
            params: desc.params,
            transform: desc.transform,
            faces: desc.faces,
            motion: desc.motion,
            skeleton: desc.skeleton,
            attachment: desc.attachment,
            hud: desc.hud,
            volume: None,
            volume_key: None,
            lod: LodState::default(),
            rigged: None,
            skin_active: false,
            retry_at: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn params(&self) -> &VolumeParams {
        &self.params
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn skeleton(&self) -> Option<SkeletonId> {
        self.skeleton
    }

    pub fn volume(&self) -> Option<&Arc<Volume>> {
        self.volume.as_ref()
    }

    pub fn lod(&self) -> LodState {
        self.lod
    }

    pub fn rigged_volume(&self) -> Option<&RiggedVolume> {
        self.rigged.as_ref()
    }

    /// True while the skinned copy, not the source volume, is drawn.
    pub fn is_skinned(&self) -> bool {
        self.skin_active
    }

    /// True while a stand-in for a missing asset is drawn.
    pub fn shows_placeholder(&self) -> bool {
        self.volume.as_ref().is_some_and(|v| v.is_placeholder())
    }

    /// Surface parameters of face `index`.
    pub fn entry(&self, index: usize) -> TextureEntry {
        self.faces
            .get(index)
            .or(self.faces.last())
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_entry(&mut self, index: usize, entry: TextureEntry) {
        if index >= self.faces.len() {
            let fill = self.faces.last().cloned().unwrap_or_default();
            self.faces.resize(index + 1, fill);
        }
        self.faces[index] = entry;
    }

    /// True if any face samples `texture`, directly or through its material.
    pub(crate) fn uses_texture(&self, texture: TextureId) -> bool {
        self.faces.iter().any(|e| {
            e.texture == texture
                || e.material.as_ref().is_some_and(|m| {
                    m.normal_map == Some(texture) || m.specular_map == Some(texture)
                })
        }) || self.params.sculpt_map() == Some(texture)
    }

    /// Faces to draw, the transform to bake into their positions, and the
    /// model matrix to draw them with.
    pub(crate) fn render_faces(&self) -> (&[VolumeFace], Mat4, Option<Mat4>) {
        if self.skin_active
            && let Some(rigged) = &self.rigged
        {
            // Skinned positions are already in world space.
            return (rigged.faces(), Mat4::IDENTITY, None);
        }
        let faces = self.volume.as_ref().map(|v| v.faces()).unwrap_or(&[]);
        match self.motion {
            Motion::Static => (faces, self.transform, None),
            Motion::Dynamic => (faces, Mat4::IDENTITY, Some(self.transform)),
        }
    }

    /// World-space bounds of what is drawn. Before any volume exists the
    /// unit cube stands in.
    pub fn world_bounds(&self) -> Aabb {
        if self.skin_active
            && let Some(rigged) = &self.rigged
        {
            return rigged.bounds();
        }
        let local = self
            .volume
            .as_ref()
            .map(|v| v.bounds())
            .unwrap_or_else(|| Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)));
        local.transformed(&self.transform)
    }

    pub(crate) fn bin_shape(&self, bounds: &Aabb) -> BinShape {
        if self.skin_active {
            return BinShape::Animating {
                half_extents: bounds.extents(),
            };
        }
        if self.attachment {
            return BinShape::Attachment;
        }
        if !self.faces.is_empty() && self.faces.iter().all(TextureEntry::has_blend_tint) {
            let (scale, _, _) = self.transform.to_scale_rotation_translation();
            return BinShape::AlphaWrap { scale: scale.abs() };
        }
        match self.motion {
            Motion::Static => BinShape::Static,
            Motion::Dynamic => BinShape::Dynamic,
        }
    }

    /// Map a hit on the source volume from local to world space.
    pub(crate) fn to_world(&self, point: Vec3, normal: Vec3) -> (Vec3, Vec3) {
        let normal_matrix = self.transform.inverse().transpose();
        (
            self.transform.transform_point3(point),
            normal_matrix.transform_vector3(normal).normalize_or_zero(),
        )
    }
}
