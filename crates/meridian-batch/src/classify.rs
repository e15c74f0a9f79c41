//! Sorting faces into geometry buckets and render passes.

use meridian_volume::DiffuseAlphaMode;

use crate::{BatchFace, RenderPassKind, VertexFormatMask};

/// Geometry bucket. Each bucket is laid out in its own buffers with one
/// vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaceBucket {
    Simple,
    Fullbright,
    Bump,
    MaterialNormal,
    MaterialSpecular,
    MaterialNormalSpecular,
    Alpha,
}

impl FaceBucket {
    pub const ALL: [FaceBucket; 7] = [
        Self::Simple,
        Self::Fullbright,
        Self::Bump,
        Self::MaterialNormal,
        Self::MaterialSpecular,
        Self::MaterialNormalSpecular,
        Self::Alpha,
    ];

    /// Faces in this bucket may share a buffer across textures.
    pub fn allows_texture_batching(self) -> bool {
        matches!(self, Self::Simple | Self::Fullbright | Self::Alpha)
    }

    pub fn is_distance_sorted(self) -> bool {
        self == Self::Alpha
    }

    pub fn vertex_mask(self, texture_batching: bool) -> VertexFormatMask {
        use VertexFormatMask as M;
        let base = M::POSITION | M::TEXCOORD0 | M::COLOR;
        let mask = match self {
            Self::Simple | Self::Alpha => base | M::NORMAL | M::EMISSIVE,
            Self::Fullbright => base | M::EMISSIVE,
            Self::Bump => base | M::NORMAL | M::TEXCOORD1,
            Self::MaterialNormal => base | M::NORMAL | M::TANGENT | M::TEXCOORD1,
            Self::MaterialSpecular => base | M::NORMAL | M::TEXCOORD2,
            Self::MaterialNormalSpecular => {
                base | M::NORMAL | M::TANGENT | M::TEXCOORD1 | M::TEXCOORD2
            }
        };
        if texture_batching && self.allows_texture_batching() {
            mask | M::TEXTURE_INDEX
        } else {
            mask
        }
    }
}

/// Bucket and passes of one face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub bucket: FaceBucket,
    pub passes: Vec<RenderPassKind>,
}

/// Returns `None` for faces that draw nothing.
pub fn classify(face: &BatchFace, render_invisible: bool) -> Option<Classification> {
    let entry = &face.entry;
    if entry.is_invisible() {
        return render_invisible.then(|| Classification {
            bucket: FaceBucket::Alpha,
            passes: vec![RenderPassKind::Alpha],
        });
    }

    let fullbright = entry.fullbright || face.hud;
    let blended = match &entry.material {
        Some(material) => {
            material.alpha_mode == DiffuseAlphaMode::Blend || entry.has_blend_tint()
        }
        None => entry.has_blend_tint(),
    };
    if blended {
        return Some(Classification {
            bucket: FaceBucket::Alpha,
            passes: vec![RenderPassKind::Alpha],
        });
    }

    let mut passes = Vec::with_capacity(3);
    let bucket = if let Some(material) = &entry.material {
        passes.push(RenderPassKind::Material(material.shader_mask()));
        match (material.normal_map.is_some(), material.specular_map.is_some()) {
            (true, true) => FaceBucket::MaterialNormalSpecular,
            (true, false) => FaceBucket::MaterialNormal,
            (false, true) => FaceBucket::MaterialSpecular,
            (false, false) if fullbright => FaceBucket::Fullbright,
            (false, false) => FaceBucket::Simple,
        }
    } else {
        let shiny = entry.shiny > 0;
        passes.push(match (fullbright, face.texture_has_alpha, shiny) {
            (true, true, _) => RenderPassKind::FullbrightAlphaMask,
            (false, true, _) => RenderPassKind::AlphaMask,
            (true, false, true) => RenderPassKind::FullbrightShiny,
            (true, false, false) => RenderPassKind::Fullbright,
            (false, false, true) => RenderPassKind::Shiny,
            (false, false, false) => RenderPassKind::Simple,
        });
        if entry.bump > 0 {
            passes.push(RenderPassKind::Bump);
            FaceBucket::Bump
        } else if fullbright {
            FaceBucket::Fullbright
        } else {
            FaceBucket::Simple
        }
    };
    if entry.glow > 0.0 {
        passes.push(RenderPassKind::Glow);
    }
    Some(Classification { bucket, passes })
}
