use std::sync::OnceLock;

use glam::{Vec2, Vec3};
use meridian_math::Aabb;

use crate::{SegmentHit, TriangleTree, VolumeError};

/// Up to four joint influences of one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointWeights {
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

impl JointWeights {
    /// Full weight on a single joint.
    pub fn single(joint: u16) -> Self {
        Self {
            joints: [joint, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// One material-homogeneous patch of a volume.
#[derive(Debug, Default)]
pub struct VolumeFace {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    /// Skin weights, one per vertex, for rigged meshes.
    pub weights: Option<Vec<JointWeights>>,
    pub extents: Aabb,
    tree: OnceLock<TriangleTree>,
}

impl Clone for VolumeFace {
    fn clone(&self) -> Self {
        Self {
            positions: self.positions.clone(),
            normals: self.normals.clone(),
            uvs: self.uvs.clone(),
            indices: self.indices.clone(),
            weights: self.weights.clone(),
            extents: self.extents,
            tree: OnceLock::new(),
        }
    }
}

impl PartialEq for VolumeFace {
    fn eq(&self, other: &Self) -> bool {
        self.positions == other.positions
            && self.normals == other.normals
            && self.uvs == other.uvs
            && self.indices == other.indices
            && self.weights == other.weights
    }
}

impl VolumeFace {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, uvs: Vec<Vec2>, indices: Vec<u16>) -> Self {
        let extents = Aabb::from_points(positions.iter());
        Self {
            positions,
            normals,
            uvs,
            indices,
            weights: None,
            extents,
            tree: OnceLock::new(),
        }
    }

    pub fn with_weights(mut self, weights: Vec<JointWeights>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Resize every attribute array to the given counts, zero-filled.
    pub fn reallocate(&mut self, vertices: usize, indices: usize) {
        self.positions = vec![Vec3::ZERO; vertices];
        self.normals = vec![Vec3::ZERO; vertices];
        self.uvs = vec![Vec2::ZERO; vertices];
        self.indices = vec![0; indices];
        self.weights = None;
        self.extents = Aabb::EMPTY;
        self.tree = OnceLock::new();
    }

    pub fn update_extents(&mut self) {
        self.extents = Aabb::from_points(self.positions.iter());
    }

    /// Drop the triangle tree; it is rebuilt on the next query.
    pub fn invalidate_tree(&mut self) {
        self.tree = OnceLock::new();
    }

    pub fn has_tree(&self) -> bool {
        self.tree.get().is_some()
    }

    pub fn triangle_tree(&self) -> &TriangleTree {
        self.tree
            .get_or_init(|| TriangleTree::build(&self.positions, &self.indices))
    }

    pub fn line_segment_intersect(&self, start: Vec3, end: Vec3) -> Option<SegmentHit> {
        if self.is_empty() {
            return None;
        }
        self.triangle_tree()
            .intersect_segment(&self.positions, &self.indices, start, end)
    }

    /// Check attribute lengths, index ranges, and finiteness.
    pub fn validate(&self, face: usize) -> Result<(), VolumeError> {
        let corrupt = |reason: String| VolumeError::CorruptFace { face, reason };
        let n = self.positions.len();
        if n > u16::MAX as usize + 1 {
            return Err(VolumeError::TooManyVertices { face, vertices: n });
        }
        if self.normals.len() != n || self.uvs.len() != n {
            return Err(corrupt(format!(
                "{n} positions but {} normals and {} uvs",
                self.normals.len(),
                self.uvs.len()
            )));
        }
        if let Some(weights) = &self.weights
            && weights.len() != n
        {
            return Err(corrupt(format!("{n} positions but {} weights", weights.len())));
        }
        if self.indices.len() % 3 != 0 {
            return Err(corrupt(format!("{} indices is not a triangle list", self.indices.len())));
        }
        if let Some(bad) = self.indices.iter().find(|i| **i as usize >= n) {
            return Err(corrupt(format!("index {bad} out of range for {n} vertices")));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(corrupt("non-finite position".to_string()));
        }
        Ok(())
    }

    /// Smooth normals from triangle cross products.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }
            let n = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Z))
            .collect();
    }
}
