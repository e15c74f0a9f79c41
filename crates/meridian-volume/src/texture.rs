//! Per-face surface description: texture, colour, and optional material.

use glam::{Mat4, Vec4};

/// Texture asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

impl TextureId {
    /// Built-in texture substituted for anything missing.
    pub const PLACEHOLDER: TextureId = TextureId(u64::MAX);

    pub fn is_placeholder(&self) -> bool {
        *self == Self::PLACEHOLDER
    }
}

/// Material asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u64);

/// How a material treats the diffuse texture's alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiffuseAlphaMode {
    #[default]
    None,
    Blend,
    Mask,
    Emissive,
}

impl DiffuseAlphaMode {
    fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Blend => 1,
            Self::Mask => 2,
            Self::Emissive => 3,
        }
    }
}

/// Normal/specular material layered on a face.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    pub normal_map: Option<TextureId>,
    pub specular_map: Option<TextureId>,
    pub specular_color: Vec4,
    pub environment_intensity: f32,
    pub alpha_mode: DiffuseAlphaMode,
    /// Alpha below this is discarded in mask mode (0..=1).
    pub alpha_cutoff: f32,
}

impl Material {
    pub const SPECULAR_BIT: u8 = 0x4;
    pub const NORMAL_BIT: u8 = 0x8;

    pub fn new(id: MaterialId) -> Self {
        Self {
            id,
            normal_map: None,
            specular_map: None,
            specular_color: Vec4::ONE,
            environment_intensity: 0.0,
            alpha_mode: DiffuseAlphaMode::None,
            alpha_cutoff: 0.5,
        }
    }

    /// Shader variant index: alpha mode in the low two bits, then specular
    /// and normal map presence.
    pub fn shader_mask(&self) -> u8 {
        let mut mask = self.alpha_mode.bits();
        if self.specular_map.is_some() {
            mask |= Self::SPECULAR_BIT;
        }
        if self.normal_map.is_some() {
            mask |= Self::NORMAL_BIT;
        }
        mask
    }
}

/// Surface parameters of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureEntry {
    pub texture: TextureId,
    /// Linear RGBA tint; alpha below 1 makes the face blended.
    pub color: Vec4,
    pub glow: f32,
    /// Legacy bump map index (0 = none).
    pub bump: u8,
    /// Legacy shininess (0 = none).
    pub shiny: u8,
    pub fullbright: bool,
    /// Texture coordinates are animated every frame.
    pub animated: bool,
    pub texture_matrix: Option<Mat4>,
    pub material: Option<Material>,
}

impl TextureEntry {
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture,
            color: Vec4::ONE,
            glow: 0.0,
            bump: 0,
            shiny: 0,
            fullbright: false,
            animated: false,
            texture_matrix: None,
            material: None,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn alpha(&self) -> f32 {
        self.color.w
    }

    /// Tint alone makes the face blended.
    pub fn has_blend_tint(&self) -> bool {
        self.color.w < 0.999
    }

    pub fn is_invisible(&self) -> bool {
        self.color.w <= 0.0
    }
}

impl Default for TextureEntry {
    fn default() -> Self {
        Self::new(TextureId::PLACEHOLDER)
    }
}
