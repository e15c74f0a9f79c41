//! The pipeline: entity bookkeeping and the mutators the scene calls between
//! frames. The per-frame phases live in `frame.rs`.

use crossbeam_channel::{Receiver, Sender};
use glam::{Mat4, Vec3};
use meridian_batch::{FaceBatcher, GroupGeometry, PassRegistry};
use meridian_config::Config;
use meridian_lod::LodSelector;
use meridian_math::{EntityId, GroupId, IdAllocator};
use meridian_rig::{RiggedDeformer, SkeletonPose};
use meridian_spatial::Octree;
use meridian_volume::{SegmentHit, TextureEntry, VolumeManager, VolumeParams};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    Drawable, EntityDesc, FrameStats, Lane, PipelineError, RebuildQueue, RenderContext,
    RenderLists, SkeletonId, StreamEvent, dirty::DirtyQueues,
};

/// Batched geometry of one spatial group.
#[derive(Debug)]
pub(crate) struct GroupState {
    pub geometry: GroupGeometry,
    pub rebuilds: u64,
    pub last_rebuilt: u64,
}

/// CPU-side volume render pipeline.
///
/// Owns every entity's render state, the octree, the shared volume arena, and
/// the per-group batched buffers. Scene code mutates entities between frames;
/// [`Pipeline::update`] then runs the frame phases in order and returns the
/// draw lists.
pub struct Pipeline {
    pub(crate) ctx: RenderContext,
    pub(crate) octree: Octree,
    pub(crate) selector: LodSelector,
    pub(crate) volumes: VolumeManager,
    pub(crate) deformer: RiggedDeformer,
    pub(crate) batcher: FaceBatcher,
    ids: IdAllocator,
    pub(crate) drawables: FxHashMap<EntityId, Drawable>,
    pub(crate) groups: FxHashMap<GroupId, GroupState>,
    pub(crate) dirty: DirtyQueues,
    pub(crate) rebuilds: RebuildQueue,
    events_tx: Sender<StreamEvent>,
    pub(crate) events: Receiver<StreamEvent>,
    pub(crate) visible: Vec<GroupId>,
    pub(crate) visible_set: FxHashSet<GroupId>,
    /// Poses sampled this frame.
    pub(crate) poses: FxHashMap<SkeletonId, Option<SkeletonPose>>,
    pub(crate) skin_failures: u32,
    pub(crate) lists: RenderLists,
    pub(crate) stats: FrameStats,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let (events_tx, events) = crossbeam_channel::unbounded();
        log::info!(
            "pipeline: octree capacity {}, {} MiB buffer arena, texture batching {}",
            config.octree.max_capacity,
            config.batch.arena_budget_bytes / (1024 * 1024),
            config.batch.texture_batching,
        );
        Self {
            octree: Octree::new(&config.octree),
            selector: LodSelector::new(config.lod.clone()),
            volumes: VolumeManager::new(),
            deformer: RiggedDeformer::new(config.skin.max_joints),
            batcher: FaceBatcher::new(config.batch.clone()),
            ctx: RenderContext::new(config),
            ids: IdAllocator::new(),
            drawables: FxHashMap::default(),
            groups: FxHashMap::default(),
            dirty: DirtyQueues::default(),
            rebuilds: RebuildQueue::new(),
            events_tx,
            events,
            visible: Vec::new(),
            visible_set: FxHashSet::default(),
            poses: FxHashMap::default(),
            skin_failures: 0,
            lists: RenderLists::default(),
            stats: FrameStats::default(),
        }
    }

    /// Pipeline with custom per-pass merge and shader rules.
    pub fn with_registry(config: Config, registry: PassRegistry) -> Self {
        let mut pipeline = Self::new(config);
        pipeline.batcher = FaceBatcher::new(pipeline.ctx.config().batch.clone()).with_registry(registry);
        pipeline
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        self.ctx.config()
    }

    /// Sender for asset and animation notifications. Clone freely; events
    /// are applied at the start of the next frame.
    pub fn event_sender(&self) -> Sender<StreamEvent> {
        self.events_tx.clone()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Draw lists produced by the last [`Pipeline::update`].
    pub fn render_lists(&self) -> &RenderLists {
        &self.lists
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    pub fn volumes(&self) -> &VolumeManager {
        &self.volumes
    }

    pub fn batcher(&self) -> &FaceBatcher {
        &self.batcher
    }

    pub fn drawable(&self, id: EntityId) -> Option<&Drawable> {
        self.drawables.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.drawables.len()
    }

    /// Groups found visible by the last cull, in id order.
    pub fn visible_groups(&self) -> &[GroupId] {
        &self.visible
    }

    pub fn group_geometry(&self, group: GroupId) -> Option<&GroupGeometry> {
        self.groups.get(&group).map(|s| &s.geometry)
    }

    /// Full rebuilds of `group` since it was created.
    pub fn group_rebuilds(&self, group: GroupId) -> u64 {
        self.groups.get(&group).map_or(0, |s| s.rebuilds)
    }

    /// Frame of the last full rebuild of `group`.
    pub fn group_last_rebuilt(&self, group: GroupId) -> Option<u64> {
        self.groups.get(&group).map(|s| s.last_rebuilt)
    }

    /// Entity rebuilds waiting in either lane.
    pub fn rebuild_backlog(&self) -> usize {
        self.rebuilds.len()
    }

    fn drawable_mut(&mut self, id: EntityId) -> Result<&mut Drawable, PipelineError> {
        self.drawables
            .get_mut(&id)
            .ok_or(PipelineError::UnknownEntity(id))
    }

    /// Lane for a rebuild of `id`: priority while its group is on screen.
    pub(crate) fn lane_for(&self, id: EntityId) -> Lane {
        match self.octree.group_of(id) {
            Some(group) if self.visible_set.contains(&group) => Lane::Priority,
            _ => Lane::Normal,
        }
    }

    /// Register a new entity. It is placed in the octree and gets geometry
    /// during the next frame, and draws from the frame after.
    pub fn create_entity(&mut self, desc: EntityDesc) -> EntityId {
        let id = self.ids.next_entity();
        self.drawables.insert(id, Drawable::new(id, desc));
        self.dirty.create.insert(id);
        log::trace!("created {id}");
        id
    }

    /// Delete an entity now. Its group is rebuilt without it before the next
    /// draw lists are produced.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), PipelineError> {
        let drawable = self
            .drawables
            .remove(&id)
            .ok_or(PipelineError::UnknownEntity(id))?;
        if let Some(key) = drawable.volume_key {
            self.volumes.release(&key);
        }
        if self.octree.contains(id)
            && let Some(group) = self.octree.remove(id)?
        {
            self.dirty.groups.insert(group);
        }
        self.dirty.forget(id);
        self.rebuilds.remove(id);
        self.ctx.forget(id);
        log::trace!("removed {id}");
        Ok(())
    }

    /// Move an entity. Static entities have their baked vertices rewritten in
    /// place; dynamic ones only get a new model matrix.
    pub fn set_transform(&mut self, id: EntityId, transform: Mat4) -> Result<(), PipelineError> {
        let drawable = self.drawable_mut(id)?;
        if drawable.transform == transform {
            return Ok(());
        }
        drawable.transform = transform;
        if self.octree.contains(id) {
            self.dirty.position.insert(id);
        }
        Ok(())
    }

    /// Replace the surface of one face. A tint change rewrites vertex colours
    /// in place; a texture or material change rebuilds the group.
    pub fn set_texture_entry(
        &mut self,
        id: EntityId,
        face: usize,
        entry: TextureEntry,
    ) -> Result<(), PipelineError> {
        let drawable = self.drawable_mut(id)?;
        let old = drawable.entry(face);
        if old == entry {
            return Ok(());
        }
        let same_source = old.texture == entry.texture && old.material == entry.material;
        drawable.set_entry(face, entry);
        if !self.octree.contains(id) {
            return Ok(());
        }
        if same_source {
            self.dirty.mesh.insert(id);
        } else {
            self.dirty.texture.insert(id);
        }
        Ok(())
    }

    /// Switch an entity to different geometry. The old volume is released and
    /// the new one acquired on the next rebuild, so other holders of either
    /// are unaffected.
    pub fn set_volume_params(&mut self, id: EntityId, params: VolumeParams) -> Result<(), PipelineError> {
        let drawable = self.drawable_mut(id)?;
        if drawable.params == params {
            return Ok(());
        }
        drawable.params = params;
        if self.octree.contains(id) {
            let lane = self.lane_for(id);
            self.rebuilds.push(id, lane, 0.0);
            self.dirty.lod.insert(id);
        }
        Ok(())
    }

    /// Bind or unbind a skeleton.
    pub fn attach_skeleton(&mut self, id: EntityId, skeleton: Option<SkeletonId>) -> Result<(), PipelineError> {
        let drawable = self.drawable_mut(id)?;
        drawable.skeleton = skeleton;
        if skeleton.is_some() {
            self.dirty.rigged.insert(id);
            return Ok(());
        }
        drawable.rigged = None;
        let was_skinned = std::mem::replace(&mut drawable.skin_active, false);
        if was_skinned && let Some(group) = self.octree.group_of(id) {
            self.dirty.groups.insert(group);
            self.dirty.position.insert(id);
        }
        Ok(())
    }

    /// Re-skin every entity bound to `skeleton` on the next frame.
    pub fn notify_skeleton_moved(&mut self, skeleton: SkeletonId) {
        for drawable in self.drawables.values() {
            if drawable.skeleton == Some(skeleton) {
                self.dirty.rigged.insert(drawable.id);
            }
        }
    }

    /// Move the world origin by `offset`. Every transform, the octree, and
    /// all baked geometry follow.
    pub fn shift_origin(&mut self, offset: Vec3) {
        let shift = Mat4::from_translation(offset);
        self.octree.notify_shifted(offset);
        for drawable in self.drawables.values_mut() {
            drawable.transform = shift * drawable.transform;
            if drawable.skin_active {
                self.dirty.rigged.insert(drawable.id);
            }
        }
        self.dirty.groups.extend(self.groups.keys().copied());
        log::debug!("origin shifted by {offset}");
    }

    /// Closest face of `id` hit by the world-space segment, for picking.
    pub fn line_segment_intersect(&self, id: EntityId, start: Vec3, end: Vec3) -> Option<(usize, SegmentHit)> {
        let drawable = self.drawables.get(&id)?;
        if drawable.skin_active
            && let Some(rigged) = &drawable.rigged
        {
            return rigged.line_segment_intersect(start, end);
        }
        let volume = drawable.volume.as_ref()?;
        let inverse = drawable.transform.inverse();
        let (face, mut hit) =
            volume.line_segment_intersect(inverse.transform_point3(start), inverse.transform_point3(end))?;
        (hit.point, hit.normal) = drawable.to_world(hit.point, hit.normal);
        Some((face, hit))
    }
}
