//! Batcher input: one renderable face and its geometry source.

use glam::{Mat4, Vec2, Vec3};
use meridian_math::EntityId;
use meridian_volume::TextureEntry;

/// Stable identity of a face across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceKey {
    pub entity: EntityId,
    pub face: u16,
}

impl FaceKey {
    pub fn new(entity: EntityId, face: u16) -> Self {
        Self { entity, face }
    }
}

/// Everything the batcher needs to place one face, except vertex data.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFace {
    pub key: FaceKey,
    /// Surface with unresolved textures already replaced by the placeholder.
    pub entry: TextureEntry,
    /// The diffuse texture carries an alpha channel.
    pub texture_has_alpha: bool,
    /// `None` for static geometry baked into group space.
    pub model_matrix: Option<Mat4>,
    /// Camera distance of the face center.
    pub distance: f32,
    pub virtual_size: f32,
    pub vertex_count: u32,
    pub index_count: u32,
    /// Screen-space overlay geometry; always fullbright.
    pub hud: bool,
}

impl BatchFace {
    pub fn new(key: FaceKey, entry: TextureEntry, vertex_count: u32, index_count: u32) -> Self {
        Self {
            key,
            entry,
            texture_has_alpha: false,
            model_matrix: None,
            distance: 0.0,
            virtual_size: 0.0,
            vertex_count,
            index_count,
            hud: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0 || self.index_count == 0
    }

    /// Face may share a buffer with faces using other textures.
    pub fn is_texture_batchable(&self) -> bool {
        self.entry.bump == 0
            && self.entry.material.is_none()
            && !self.entry.animated
            && self.entry.texture_matrix.is_none()
    }
}

/// Borrowed vertex data of one face.
#[derive(Debug, Clone, Copy)]
pub struct FaceGeometry<'a> {
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub uvs: &'a [Vec2],
    pub indices: &'a [u16],
    /// Applied to positions and normals on copy.
    pub transform: Mat4,
}

impl FaceGeometry<'_> {
    /// Reason the data cannot be copied, if any.
    pub fn defect(&self) -> Option<String> {
        let n = self.positions.len();
        if self.normals.len() != n || self.uvs.len() != n {
            return Some(format!(
                "attribute lengths differ: {n} positions, {} normals, {} uvs",
                self.normals.len(),
                self.uvs.len()
            ));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Some(format!("index {bad} out of range for {n} vertices"));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Some("non-finite position".to_owned());
        }
        None
    }
}

/// Resolves a face key to its current vertex data.
pub trait GeometrySource {
    fn face_geometry(&self, key: FaceKey) -> Option<FaceGeometry<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_volume::{Material, MaterialId, TextureId};

    #[test]
    fn test_batchable_rules() {
        let key = FaceKey::new(EntityId(1), 0);
        let mut face = BatchFace::new(key, TextureEntry::new(TextureId(1)), 4, 6);
        assert!(face.is_texture_batchable());
        face.entry.bump = 1;
        assert!(!face.is_texture_batchable());
        face.entry.bump = 0;
        face.entry.material = Some(Material::new(MaterialId(2)));
        assert!(!face.is_texture_batchable());
    }

    #[test]
    fn test_defect_detection() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = [Vec3::Z; 3];
        let uvs = [Vec2::ZERO; 3];
        let mut geom = FaceGeometry {
            positions: &positions,
            normals: &normals,
            uvs: &uvs,
            indices: &[0, 1, 2],
            transform: Mat4::IDENTITY,
        };
        assert!(geom.defect().is_none());
        geom.indices = &[0, 1, 3];
        assert!(geom.defect().is_some());
        geom.indices = &[0, 1, 2];
        geom.uvs = &uvs[..2];
        assert!(geom.defect().is_some());
    }
}
