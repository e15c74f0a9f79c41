//! In-memory providers for tools, tests, and the demo.

use std::cell::RefCell;
use std::sync::Arc;

use meridian_lod::nearest_available;
use meridian_rig::{SkeletonPose, SkinInfo};
use meridian_volume::{MeshId, MeshLodData, SculptMap, TextureId, VolumeParams};
use rustc_hash::FxHashMap;

use crate::{
    MeshProvider, SkeletonId, SkeletonProvider, TextureInfo, TextureProvider, TextureStatus,
};

/// Textures with a fixed status each. Unknown ids are [`TextureStatus::Missing`].
#[derive(Debug, Default)]
pub struct MemoryTextures {
    textures: FxHashMap<TextureId, TextureStatus>,
    sculpt_maps: FxHashMap<TextureId, SculptMap>,
    reported: RefCell<FxHashMap<TextureId, f32>>,
}

impl MemoryTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TextureId, info: TextureInfo) {
        self.textures.insert(id, TextureStatus::Ready(info));
    }

    pub fn set_status(&mut self, id: TextureId, status: TextureStatus) {
        self.textures.insert(id, status);
    }

    pub fn insert_sculpt_map(&mut self, id: TextureId, map: SculptMap) {
        self.sculpt_maps.insert(id, map);
    }

    /// Last virtual size reported for `id`.
    pub fn reported_size(&self, id: TextureId) -> Option<f32> {
        self.reported.borrow().get(&id).copied()
    }
}

impl TextureProvider for MemoryTextures {
    fn texture(&self, id: TextureId) -> TextureStatus {
        self.textures.get(&id).copied().unwrap_or(TextureStatus::Missing)
    }

    fn estimate_decode_cost(&self, id: TextureId) -> u64 {
        match self.texture(id) {
            TextureStatus::Ready(info) => u64::from(info.width) * u64::from(info.height) * 4,
            _ => 0,
        }
    }

    fn report_virtual_size(&self, id: TextureId, virtual_size: f32) {
        self.reported.borrow_mut().insert(id, virtual_size);
    }

    fn sculpt_map(&self, id: TextureId) -> Option<SculptMap> {
        self.sculpt_maps.get(&id).cloned()
    }
}

/// Mesh LODs and skins held in memory. Requests for missing levels are
/// recorded so callers can "stream" them in later.
#[derive(Debug, Default)]
pub struct MemoryMeshes {
    lods: FxHashMap<(MeshId, u8), Arc<MeshLodData>>,
    skins: FxHashMap<MeshId, Arc<SkinInfo>>,
    requests: RefCell<Vec<(MeshId, u8)>>,
}

impl MemoryMeshes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lod(&mut self, mesh: MeshId, lod: u8, data: MeshLodData) {
        self.lods.insert((mesh, lod), Arc::new(data));
    }

    pub fn insert_skin(&mut self, mesh: MeshId, skin: SkinInfo) {
        self.skins.insert(mesh, Arc::new(skin));
    }

    /// Distinct `(mesh, lod)` pairs requested but not resident, in request order.
    pub fn requests(&self) -> Vec<(MeshId, u8)> {
        self.requests.borrow().clone()
    }
}

impl MeshProvider for MemoryMeshes {
    fn load_mesh(&self, params: &VolumeParams, lod: u8) -> Option<u8> {
        let mesh = params.mesh()?;
        if !self.lods.contains_key(&(mesh, lod)) {
            let mut requests = self.requests.borrow_mut();
            if !requests.contains(&(mesh, lod)) {
                requests.push((mesh, lod));
            }
        }
        nearest_available(lod, |l| self.lods.contains_key(&(mesh, l)))
    }

    fn mesh_lod(&self, mesh: MeshId, lod: u8) -> Option<Arc<MeshLodData>> {
        self.lods.get(&(mesh, lod)).cloned()
    }

    fn triangle_count(&self, mesh: MeshId, lod: u8) -> Option<usize> {
        self.lods
            .get(&(mesh, lod))
            .map(|data| data.faces.iter().map(|f| f.triangle_count()).sum())
    }

    fn skin_info(&self, mesh: MeshId) -> Option<Arc<SkinInfo>> {
        self.skins.get(&mesh).cloned()
    }
}

#[derive(Debug, Default)]
pub struct MemorySkeletons {
    poses: FxHashMap<SkeletonId, SkeletonPose>,
}

impl MemorySkeletons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pose(&mut self, skeleton: SkeletonId, pose: SkeletonPose) {
        self.poses.insert(skeleton, pose);
    }

    pub fn remove(&mut self, skeleton: SkeletonId) {
        self.poses.remove(&skeleton);
    }
}

impl SkeletonProvider for MemorySkeletons {
    fn joint_world_transforms(&self, skeleton: SkeletonId) -> Option<SkeletonPose> {
        self.poses.get(&skeleton).cloned()
    }
}
