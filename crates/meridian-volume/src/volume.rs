use glam::Vec3;
use meridian_math::Aabb;

use crate::generate::{SculptMap, generate_box, generate_cylinder, generate_sculpt, generate_sphere};
use crate::{SegmentHit, Shape, VolumeError, VolumeFace, VolumeParams};

/// Faces of one detail level of a streamed mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshLodData {
    pub faces: Vec<VolumeFace>,
}

/// Geometry of one volume at one detail level.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    params: VolumeParams,
    detail: u8,
    faces: Vec<VolumeFace>,
    bounds: Aabb,
    placeholder: bool,
}

impl Volume {
    /// Validate `faces` and wrap them.
    pub fn from_faces(params: VolumeParams, detail: u8, faces: Vec<VolumeFace>) -> Result<Self, VolumeError> {
        for (i, face) in faces.iter().enumerate() {
            face.validate(i)?;
        }
        let bounds = faces
            .iter()
            .filter(|f| !f.is_empty())
            .fold(Aabb::EMPTY, |acc, f| acc.union(&f.extents));
        Ok(Self {
            params,
            detail,
            faces,
            bounds,
            placeholder: false,
        })
    }

    /// Build geometry that needs no streamed asset. Meshes always need one;
    /// sculpts need `sculpt_map`, falling back to a placeholder without it.
    pub fn generate(
        params: VolumeParams,
        detail: u8,
        sculpt_map: Option<&SculptMap>,
    ) -> Result<Self, VolumeError> {
        let faces = match params.shape {
            Shape::Box => generate_box(detail),
            Shape::Cylinder => generate_cylinder(detail),
            Shape::Sphere => generate_sphere(detail),
            Shape::Sculpt(_) => match sculpt_map {
                Some(map) => generate_sculpt(map, detail),
                None => return Ok(Self::placeholder(params, detail)),
            },
            Shape::Mesh(mesh) => return Err(VolumeError::MissingMeshLod { mesh, lod: detail }),
        };
        Self::from_faces(params, detail, faces)
    }

    /// Wrap streamed mesh faces.
    pub fn from_mesh(params: VolumeParams, detail: u8, data: &MeshLodData) -> Result<Self, VolumeError> {
        Self::from_faces(params, detail, data.faces.clone())
    }

    /// Stand-in for geometry that is not resident: a sphere for sculpts, a
    /// box otherwise. Always at the lowest detail.
    pub fn placeholder(params: VolumeParams, detail: u8) -> Self {
        let faces = match params.shape {
            Shape::Sculpt(_) => generate_sphere(0),
            _ => generate_box(0),
        };
        let bounds = faces.iter().fold(Aabb::EMPTY, |acc, f| acc.union(&f.extents));
        Self {
            params,
            detail,
            faces,
            bounds,
            placeholder: true,
        }
    }

    pub fn params(&self) -> &VolumeParams {
        &self.params
    }

    pub fn detail(&self) -> u8 {
        self.detail
    }

    pub fn faces(&self) -> &[VolumeFace] {
        &self.faces
    }

    pub fn faces_mut(&mut self) -> &mut Vec<VolumeFace> {
        &mut self.faces
    }

    pub fn face(&self, index: usize) -> Option<&VolumeFace> {
        self.faces.get(index)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.faces.iter().map(VolumeFace::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(VolumeFace::triangle_count).sum()
    }

    /// Local-space bounds of all non-empty faces.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn recompute_bounds(&mut self) {
        self.bounds = self
            .faces
            .iter()
            .filter(|f| !f.is_empty())
            .fold(Aabb::EMPTY, |acc, f| acc.union(&f.extents));
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Closest face hit by the local-space segment `start..end`.
    pub fn line_segment_intersect(&self, start: Vec3, end: Vec3) -> Option<(usize, SegmentHit)> {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.line_segment_intersect(start, end).map(|h| (i, h)))
            .min_by(|a, b| a.1.t.total_cmp(&b.1.t))
    }
}
