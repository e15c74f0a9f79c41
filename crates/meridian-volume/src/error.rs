use crate::MeshId;

/// Errors raised while building or validating volume geometry.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VolumeError {
    #[error("mesh {mesh:?} has no resident data for lod {lod}")]
    MissingMeshLod { mesh: MeshId, lod: u8 },

    #[error("invalid sculpt map: {0}")]
    InvalidSculptMap(String),

    #[error("face {face} is corrupt: {reason}")]
    CorruptFace { face: usize, reason: String },

    #[error("face {face} has {vertices} vertices, more than 16-bit indices can address")]
    TooManyVertices { face: usize, vertices: usize },
}
