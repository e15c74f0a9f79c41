//! Render passes and the per-pass merge and shader rules.

use crate::DrawInfo;

/// Render pass a face registers into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderPassKind {
    Simple,
    Fullbright,
    Bump,
    Shiny,
    FullbrightShiny,
    Glow,
    AlphaMask,
    FullbrightAlphaMask,
    /// Material faces, keyed by shader mask.
    Material(u8),
    /// Blended faces, drawn back to front.
    Alpha,
}

impl RenderPassKind {
    const SLOTS: usize = 10;

    fn slot(self) -> usize {
        match self {
            Self::Simple => 0,
            Self::Fullbright => 1,
            Self::Bump => 2,
            Self::Shiny => 3,
            Self::FullbrightShiny => 4,
            Self::Glow => 5,
            Self::AlphaMask => 6,
            Self::FullbrightAlphaMask => 7,
            Self::Material(_) => 8,
            Self::Alpha => 9,
        }
    }

    pub fn is_alpha(self) -> bool {
        self == Self::Alpha
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Simple,
    Fullbright,
    Bump,
    Shiny,
    FullbrightShiny,
    Glow,
    AlphaMask,
    FullbrightAlphaMask,
    Material,
    Alpha,
    FullbrightAlpha,
}

/// Shader chosen for one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVariant {
    pub program: ShaderProgram,
    pub material_mask: u8,
    pub texture_channels: u8,
}

/// Rules of one pass family.
#[derive(Debug, Clone, Copy)]
pub struct PassSpec {
    /// Draws are ordered far to near instead of by state.
    pub distance_sorted: bool,
    /// Whether `next` may be folded into `prev`.
    pub can_merge: fn(&DrawInfo, &DrawInfo) -> bool,
    pub shader: fn(RenderPassKind, &DrawInfo) -> ShaderVariant,
}

/// Contiguous range in one buffer with identical render state.
pub fn merge_compatible(prev: &DrawInfo, next: &DrawInfo) -> bool {
    prev.buffer == next.buffer
        && prev.end + 1 == next.start
        && prev.offset + prev.count == next.offset
        && (prev.texture == next.texture
            || (prev.is_texture_batched() && prev.textures == next.textures))
        && prev.material == next.material
        && prev.shader_mask == next.shader_mask
        && prev.fullbright == next.fullbright
        && prev.bump == next.bump
        && (prev.material.is_none() || prev.shiny == next.shiny)
        && prev.texture_matrix == next.texture_matrix
        && prev.model_matrix == next.model_matrix
}

/// [`merge_compatible`], restricted to faces of the same entity.
pub fn alpha_merge_compatible(prev: &DrawInfo, next: &DrawInfo) -> bool {
    let same_entity = match (prev.faces.first(), next.faces.first()) {
        (Some(a), Some(b)) => a.entity == b.entity,
        _ => false,
    };
    same_entity && merge_compatible(prev, next)
}

pub fn select_shader(kind: RenderPassKind, draw: &DrawInfo) -> ShaderVariant {
    let program = match kind {
        RenderPassKind::Simple => ShaderProgram::Simple,
        RenderPassKind::Fullbright => ShaderProgram::Fullbright,
        RenderPassKind::Bump => ShaderProgram::Bump,
        RenderPassKind::Shiny => ShaderProgram::Shiny,
        RenderPassKind::FullbrightShiny => ShaderProgram::FullbrightShiny,
        RenderPassKind::Glow => ShaderProgram::Glow,
        RenderPassKind::AlphaMask => ShaderProgram::AlphaMask,
        RenderPassKind::FullbrightAlphaMask => ShaderProgram::FullbrightAlphaMask,
        RenderPassKind::Material(_) => ShaderProgram::Material,
        RenderPassKind::Alpha if draw.material.is_some() => ShaderProgram::Material,
        RenderPassKind::Alpha if draw.fullbright => ShaderProgram::FullbrightAlpha,
        RenderPassKind::Alpha => ShaderProgram::Alpha,
    };
    ShaderVariant {
        program,
        material_mask: draw.shader_mask,
        texture_channels: draw.textures.len().clamp(1, u8::MAX as usize) as u8,
    }
}

const OPAQUE: PassSpec = PassSpec {
    distance_sorted: false,
    can_merge: merge_compatible,
    shader: select_shader,
};

const BLENDED: PassSpec = PassSpec {
    distance_sorted: true,
    can_merge: alpha_merge_compatible,
    shader: select_shader,
};

/// Pass kind to merge predicate and shader selection.
#[derive(Debug, Clone)]
pub struct PassRegistry {
    specs: [PassSpec; RenderPassKind::SLOTS],
}

impl PassRegistry {
    pub fn new() -> Self {
        let mut specs = [OPAQUE; RenderPassKind::SLOTS];
        specs[RenderPassKind::Alpha.slot()] = BLENDED;
        Self { specs }
    }

    /// Replace the rules of `kind`'s family. Every material mask shares one entry.
    pub fn register(&mut self, kind: RenderPassKind, spec: PassSpec) {
        self.specs[kind.slot()] = spec;
    }

    pub fn spec(&self, kind: RenderPassKind) -> &PassSpec {
        &self.specs[kind.slot()]
    }

    pub fn can_merge(&self, kind: RenderPassKind, prev: &DrawInfo, next: &DrawInfo) -> bool {
        (self.spec(kind).can_merge)(prev, next)
    }

    pub fn shader(&self, kind: RenderPassKind, draw: &DrawInfo) -> ShaderVariant {
        (self.spec(kind).shader)(kind, draw)
    }

    pub fn is_distance_sorted(&self, kind: RenderPassKind) -> bool {
        self.spec(kind).distance_sorted
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
