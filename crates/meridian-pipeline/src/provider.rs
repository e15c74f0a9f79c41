//! Asset and skeleton providers the pipeline pulls from, and the stream
//! events they push back.
//!
//! Providers are read-mostly and called from the frame thread only. Anything
//! they learn asynchronously (a mesh LOD finished streaming, a texture failed)
//! is reported through [`StreamEvent`]s on the channel returned by
//! [`crate::Pipeline::event_sender`], which may be fed from any thread.

use std::sync::Arc;

use meridian_rig::{SkeletonPose, SkinInfo};
use meridian_volume::{MeshId, MeshLodData, SculptMap, TextureId, VolumeParams};

/// Skeleton identifier owned by the avatar system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkeletonId(pub u64);

impl std::fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skeleton#{}", self.0)
    }
}

/// Decoded texture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// The texture's own alpha channel is not fully opaque.
    pub has_alpha: bool,
}

impl TextureInfo {
    pub fn new(width: u32, height: u32, has_alpha: bool) -> Self {
        Self {
            width,
            height,
            has_alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureStatus {
    Ready(TextureInfo),
    /// Still being fetched or decoded; render the placeholder meanwhile.
    Pending,
    /// The fetch failed; render the placeholder and retry later.
    Missing,
}

pub trait TextureProvider {
    fn texture(&self, id: TextureId) -> TextureStatus;

    /// Bytes the texture occupies once decoded at full size.
    fn estimate_decode_cost(&self, id: TextureId) -> u64;

    /// Largest on-screen size of any face using `id` this frame. Drives
    /// fetch priority and discard.
    fn report_virtual_size(&self, id: TextureId, virtual_size: f32);

    /// Decoded RGB texels of a sculpt map, if resident.
    fn sculpt_map(&self, id: TextureId) -> Option<SculptMap>;
}

pub trait MeshProvider {
    /// Request `lod` of the mesh behind `params`. Returns the best level
    /// resident right now; completion is announced with
    /// [`StreamEvent::MeshLodResident`].
    fn load_mesh(&self, params: &VolumeParams, lod: u8) -> Option<u8>;

    fn mesh_lod(&self, mesh: MeshId, lod: u8) -> Option<Arc<MeshLodData>>;

    fn triangle_count(&self, mesh: MeshId, lod: u8) -> Option<usize>;

    /// Skin binding; `None` for meshes that are not rigged.
    fn skin_info(&self, mesh: MeshId) -> Option<Arc<SkinInfo>>;
}

pub trait SkeletonProvider {
    /// Joint world transforms sampled for this frame.
    fn joint_world_transforms(&self, skeleton: SkeletonId) -> Option<SkeletonPose>;
}

/// Asynchronous notifications from asset streaming and animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    MeshLodResident { mesh: MeshId, lod: u8 },
    TextureReady(TextureId),
    TextureFailed(TextureId),
    SkeletonMoved(SkeletonId),
}

/// The providers one frame reads from.
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub textures: &'a dyn TextureProvider,
    pub meshes: &'a dyn MeshProvider,
    pub skeletons: &'a dyn SkeletonProvider,
}

impl<'a> Providers<'a> {
    pub fn new(
        textures: &'a dyn TextureProvider,
        meshes: &'a dyn MeshProvider,
        skeletons: &'a dyn SkeletonProvider,
    ) -> Self {
        Self {
            textures,
            meshes,
            skeletons,
        }
    }

    /// Whether `lod` of the geometry behind `params` can be built right now.
    pub fn is_resident(&self, params: &VolumeParams, lod: u8) -> bool {
        match params.mesh() {
            Some(mesh) => self.meshes.mesh_lod(mesh, lod).is_some(),
            None => true,
        }
    }
}
