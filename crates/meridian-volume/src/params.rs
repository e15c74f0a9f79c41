use crate::TextureId;

/// Mesh asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u64);

/// Geometric source of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Box,
    Cylinder,
    Sphere,
    /// Externally streamed multi-LOD mesh.
    Mesh(MeshId),
    /// Surface read from the RGB texels of a sculpt map texture.
    Sculpt(TextureId),
}

/// Content key of a volume. Entities with equal params share geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeParams {
    pub shape: Shape,
}

impl VolumeParams {
    pub fn new(shape: Shape) -> Self {
        Self { shape }
    }

    pub fn mesh(&self) -> Option<MeshId> {
        match self.shape {
            Shape::Mesh(id) => Some(id),
            _ => None,
        }
    }

    pub fn sculpt_map(&self) -> Option<TextureId> {
        match self.shape {
            Shape::Sculpt(id) => Some(id),
            _ => None,
        }
    }

    /// Generated locally at every detail level without waiting on assets.
    pub fn is_primitive(&self) -> bool {
        matches!(self.shape, Shape::Box | Shape::Cylinder | Shape::Sphere)
    }
}

/// Arena key: params plus detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeKey {
    pub params: VolumeParams,
    pub detail: u8,
}

impl VolumeKey {
    pub fn new(params: VolumeParams, detail: u8) -> Self {
        Self { params, detail }
    }
}
