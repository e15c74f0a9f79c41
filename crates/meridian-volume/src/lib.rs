//! Volume geometry: parameters, faces, primitive and sculpt generation, and
//! the shared volume arena.

mod error;
mod face;
mod generate;
mod manager;
mod params;
mod texture;
mod triangle_tree;
mod volume;

pub use error::VolumeError;
pub use face::{JointWeights, VolumeFace};
pub use generate::{
    SculptMap, detail_scale, generate_box, generate_cylinder, generate_sculpt, generate_sphere,
};
pub use manager::VolumeManager;
pub use params::{MeshId, Shape, VolumeKey, VolumeParams};
pub use texture::{DiffuseAlphaMode, Material, MaterialId, TextureEntry, TextureId};
pub use triangle_tree::{SegmentHit, TriangleTree};
pub use volume::{MeshLodData, Volume};
