//! Frame phases, run in order by [`Pipeline::update`]:
//! cull, LOD update, creation, geometry rebuild, draw info generation.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use meridian_batch::{BatchError, BatchFace, FaceKey, classify};
use meridian_lod::LodChange;
use meridian_math::{Aabb, EntityId, GroupId};
use meridian_rig::{RiggedVolume, SkeletonPose, SkinOutcome};
use meridian_spatial::{BinShape, InsertOutcome, MoveOutcome, bin_radius};
use meridian_volume::{TextureId, Volume, VolumeParams};
use rustc_hash::FxHashMap;

use crate::assets::{
    DrawableGeometry, acquire_volume, face_metrics, resolve_entry, textures_of,
};
use crate::orchestrator::GroupState;
use crate::{
    Camera, DegradedReason, DirtySet, Feature, FrameStats, Issue, Lane, Motion, Pipeline,
    Providers, RenderLists, SkeletonId, StreamEvent,
};

impl Pipeline {
    /// Run one frame and return the draw lists for what is visible from
    /// `camera`.
    pub fn update(&mut self, camera: &Camera, providers: &Providers<'_>) -> &RenderLists {
        let frame = self.ctx.advance_frame();
        self.stats = FrameStats {
            frame,
            ..FrameStats::default()
        };
        self.poses.clear();
        let batching = self.ctx.is_enabled(Feature::TextureBatching);
        if self.batcher.texture_batching() != batching {
            self.batcher.set_texture_batching(batching);
        }

        self.drain_events();
        self.cull(camera);
        self.update_lods(camera, providers);
        self.create_drawables(camera, providers);
        self.rebuild_dirty_geometry(camera, providers);
        self.generate_draw_info(camera, providers);

        log::debug!("{}", self.stats);
        &self.lists
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                StreamEvent::MeshLodResident { mesh, lod } => {
                    log::trace!("mesh {mesh:?} lod {lod} resident");
                    let waiting: Vec<(EntityId, bool)> = self
                        .drawables
                        .values()
                        .filter(|d| d.params.mesh() == Some(mesh))
                        .filter(|d| d.lod.awaiting_upgrade || d.shows_placeholder())
                        .map(|d| (d.id, d.shows_placeholder()))
                        .collect();
                    for (id, placeholder) in waiting {
                        self.dirty.lod.insert(id);
                        if placeholder {
                            let lane = self.lane_for(id);
                            self.rebuilds.push(id, lane, 0.0);
                        }
                    }
                }
                StreamEvent::TextureReady(texture) | StreamEvent::TextureFailed(texture) => {
                    let users: Vec<(EntityId, bool)> = self
                        .drawables
                        .values()
                        .filter(|d| d.uses_texture(texture))
                        .map(|d| (d.id, d.params.sculpt_map() == Some(texture)))
                        .collect();
                    for (id, sculpt) in users {
                        self.dirty.texture.insert(id);
                        if sculpt {
                            let lane = self.lane_for(id);
                            self.rebuilds.push(id, lane, 0.0);
                        }
                    }
                }
                StreamEvent::SkeletonMoved(skeleton) => self.notify_skeleton_moved(skeleton),
            }
        }
    }

    /// Apply partition moves, drop pruned groups, and find the visible set.
    fn cull(&mut self, camera: &Camera) {
        let moves = self.octree.process_partition_moves();
        self.stats.partition_moves = moves.len();
        for m in moves {
            self.dirty.groups.extend(m.from.into_iter().chain(m.to));
        }
        for group in self.octree.take_removed_groups() {
            self.dirty.groups.remove(&group);
            if self.groups.remove(&group).is_some() {
                let freed = self.batcher.release_group(group);
                log::trace!("{group} pruned, {freed} bytes released");
            }
        }

        let visible = self.octree.query_visible(&camera.frustum);
        for group in &visible {
            if self.visible_set.contains(group) {
                continue;
            }
            if let Some(node) = self.octree.group(*group) {
                for entity in node.members() {
                    self.rebuilds.promote(*entity);
                }
            }
        }
        self.stats.visible_groups = visible.len();
        self.stats.visible_entities = visible
            .iter()
            .filter_map(|g| self.octree.group(*g))
            .map(|g| g.members().len())
            .sum();
        self.visible_set = visible.iter().copied().collect();
        self.visible = visible;
    }

    fn update_lods(&mut self, camera: &Camera, providers: &Providers<'_>) {
        let mut candidates = DirtySet::new();
        for group in &self.visible {
            if let Some(node) = self.octree.group(*group) {
                candidates.extend(node.members().iter().copied());
            }
        }
        candidates.extend(self.dirty.lod.take());

        let hysteresis = self.selector.config().bin_radius_hysteresis;
        for id in candidates.take() {
            if !self.octree.contains(id) {
                continue;
            }
            let Some((distance, radius)) = self.lod_inputs(id, camera, providers) else {
                continue;
            };
            let Some(drawable) = self.drawables.get_mut(&id) else {
                continue;
            };
            let params = drawable.params;
            let change = self
                .selector
                .update(&mut drawable.lod, distance, radius, |l| providers.is_resident(&params, l));
            if drawable.lod.awaiting_upgrade {
                request_level(id, &params, drawable.lod.desired, providers);
            }

            let mut moved = None;
            match change {
                LodChange::Changed { from, to } => {
                    log::trace!("{id}: lod {from} -> {to}");
                    self.stats.lod_changes += 1;
                    self.rebuilds.push(id, Lane::Priority, 0.0);
                }
                LodChange::Unavailable => {}
                LodChange::Unchanged => {
                    let bounds = drawable.world_bounds();
                    let r = bin_radius(
                        &self.ctx.config().octree,
                        drawable.bin_shape(&bounds),
                        bounds.radius(),
                        distance,
                    );
                    if let Some(current) = self.octree.entity_bin_radius(id)
                        && (r - current).abs() > hysteresis * current.max(f32::EPSILON)
                    {
                        moved = Some((bounds, r));
                    }
                }
            }
            if let Some((bounds, r)) = moved {
                self.reposition(id, bounds, r);
            }
        }
    }

    /// Camera distance and radius driving LOD. Entities bound to a skeleton
    /// use the skeleton's root and bin radius.
    fn lod_inputs(&mut self, id: EntityId, camera: &Camera, providers: &Providers<'_>) -> Option<(f32, f32)> {
        let drawable = self.drawables.get(&id)?;
        let skeleton = drawable.skeleton;
        let bounds = drawable.world_bounds();
        if let Some(skeleton) = skeleton
            && let Some(pose) = self.sample_pose(skeleton, providers)
        {
            return Some((camera.distance_to(pose.root_position), pose.bin_radius));
        }
        Some((camera.distance_to(bounds.center()), bounds.radius()))
    }

    fn sample_pose(&mut self, skeleton: SkeletonId, providers: &Providers<'_>) -> Option<SkeletonPose> {
        self.poses
            .entry(skeleton)
            .or_insert_with(|| providers.skeletons.joint_world_transforms(skeleton))
            .clone()
    }

    /// Insert newly created entities into the octree and queue their first
    /// geometry build.
    fn create_drawables(&mut self, camera: &Camera, providers: &Providers<'_>) {
        for id in self.dirty.create.take() {
            let Some((distance, radius)) = self.lod_inputs(id, camera, providers) else {
                continue;
            };
            let Some(drawable) = self.drawables.get_mut(&id) else {
                continue;
            };
            let params = drawable.params;
            let desired = self.selector.select_lod(distance, radius);
            self.selector
                .apply(&mut drawable.lod, desired, |l| providers.is_resident(&params, l));
            if drawable.lod.awaiting_upgrade {
                request_level(id, &params, desired, providers);
            }

            let bounds = drawable.world_bounds();
            let r = bin_radius(
                &self.ctx.config().octree,
                drawable.bin_shape(&bounds),
                bounds.radius(),
                camera.distance_to(bounds.center()),
            );
            let rigged = drawable.skeleton.is_some();
            match self.octree.insert(id, bounds, r) {
                Ok(InsertOutcome::Placed(group)) => {
                    self.dirty.groups.insert(group);
                }
                Ok(InsertOutcome::Quarantined) => {
                    if self.ctx.first_report(id, Issue::DegenerateBounds) {
                        log::warn!("{id}: degenerate bounds, not drawn until moved");
                    }
                }
                Err(err) => {
                    log::warn!("{id} not placed: {err}");
                    continue;
                }
            }
            self.rebuilds.push(id, Lane::Priority, 0.0);
            if rigged {
                self.dirty.rigged.insert(id);
            }
            self.stats.created += 1;
        }
    }

    fn rebuild_dirty_geometry(&mut self, camera: &Camera, providers: &Providers<'_>) {
        let frame = self.ctx.frame();
        let mut retries: Vec<EntityId> = self
            .drawables
            .values_mut()
            .filter(|d| d.retry_at.is_some_and(|at| at <= frame))
            .map(|d| {
                d.retry_at = None;
                d.id
            })
            .collect();
        retries.sort_unstable();
        for id in retries {
            log::trace!("{id}: retrying missing assets");
            let lane = self.lane_for(id);
            self.rebuilds.push(id, lane, 0.0);
            self.dirty.texture.insert(id);
        }
        for id in self.dirty.texture.take() {
            if let Some(group) = self.octree.group_of(id) {
                self.dirty.groups.insert(group);
            }
        }

        let batch = self
            .rebuilds
            .take_batch(self.ctx.config().frame.max_rebuilds_per_frame);
        self.stats.deferred_rebuilds = self.rebuilds.normal_len();
        for id in batch {
            self.rebuild_entity(id, camera, providers);
        }
        for id in self.dirty.position.take() {
            self.refresh_position(id, camera);
        }
        self.skin_rigged(camera, providers);
    }

    /// Rebuild an entity's volume at its current LOD, falling back to a
    /// private placeholder when the asset is not available.
    fn rebuild_entity(&mut self, id: EntityId, camera: &Camera, providers: &Providers<'_>) {
        if !self.octree.contains(id) {
            return;
        }
        let frame = self.ctx.frame();
        let retry = u64::from(self.ctx.config().frame.asset_retry_frames);
        let Some(drawable) = self.drawables.get_mut(&id) else {
            return;
        };
        let params = drawable.params;
        let level = drawable.lod.level;
        match acquire_volume(&mut self.volumes, params, level, providers) {
            Ok((key, volume)) => {
                // Acquire precedes release: an unchanged key must never
                // reach zero references.
                if let Some(old) = drawable.volume_key.replace(key) {
                    self.volumes.release(&old);
                }
                drawable.volume = Some(volume);
            }
            Err(problem) => {
                if let Some(old) = drawable.volume_key.take() {
                    self.volumes.release(&old);
                }
                drawable.volume = Some(Arc::new(Volume::placeholder(params, level)));
                drawable.retry_at = Some(frame + retry);
                self.stats.placeholders += 1;
                if self.ctx.first_report(id, problem.issue()) {
                    log::warn!("{id}: {problem}; drawing a placeholder");
                }
            }
        }

        let bounds = drawable.world_bounds();
        let r = bin_radius(
            &self.ctx.config().octree,
            drawable.bin_shape(&bounds),
            bounds.radius(),
            camera.distance_to(bounds.center()),
        );
        let rigged = drawable.skeleton.is_some();
        self.stats.rebuilt_entities += 1;
        self.reposition(id, bounds, r);
        if let Some(group) = self.octree.group_of(id) {
            self.dirty.groups.insert(group);
        }
        if rigged {
            self.dirty.rigged.insert(id);
        }
    }

    /// Record new bounds with the octree. The caller decides what to do
    /// with the geometry.
    fn reposition(&mut self, id: EntityId, bounds: Aabb, bin_radius: f32) {
        let before = self.octree.group_of(id);
        match self.octree.notify_moved(id, bounds, bin_radius) {
            Ok(MoveOutcome::InPlace(_) | MoveOutcome::Queued(_)) => {}
            Ok(MoveOutcome::Restored(group)) => {
                self.ctx.resolved(id, Issue::DegenerateBounds);
                self.dirty.groups.insert(group);
            }
            Ok(MoveOutcome::Quarantined) => {
                if let Some(group) = before {
                    self.dirty.groups.insert(group);
                }
                if self.ctx.first_report(id, Issue::DegenerateBounds) {
                    log::warn!("{id}: degenerate bounds, not drawn until moved");
                }
            }
            Err(err) => log::warn!("{id}: {err}"),
        }
    }

    fn refresh_position(&mut self, id: EntityId, camera: &Camera) {
        if !self.octree.contains(id) {
            return;
        }
        let Some(drawable) = self.drawables.get(&id) else {
            return;
        };
        let bounds = drawable.world_bounds();
        let r = bin_radius(
            &self.ctx.config().octree,
            drawable.bin_shape(&bounds),
            bounds.radius(),
            camera.distance_to(bounds.center()),
        );
        let skinned = drawable.skin_active;
        let motion = drawable.motion;
        self.reposition(id, bounds, r);
        if skinned {
            // Skinned vertices follow the skeleton, not the transform.
            return;
        }
        match motion {
            Motion::Static => {
                self.dirty.mesh.insert(id);
            }
            Motion::Dynamic => {
                if let Some(group) = self.octree.group_of(id) {
                    self.dirty.groups.insert(group);
                }
            }
        }
    }

    /// Deform visible rigged entities whose skeleton moved. Failures fall
    /// back to static geometry for the frame; too many disable skinning.
    fn skin_rigged(&mut self, camera: &Camera, providers: &Providers<'_>) {
        let queued = self.dirty.rigged.take();
        if !self.ctx.is_enabled(Feature::Skinning) {
            for id in queued {
                self.drop_skin(id, camera);
            }
            return;
        }
        let frame = self.ctx.frame();
        let mut carry = Vec::new();
        for id in queued {
            let in_view = match self.octree.group_of(id) {
                Some(group) => self.visible_set.contains(&group),
                None if !self.octree.contains(id) => continue,
                // Quarantined: the unskinned bounds say nothing about where
                // the skinned mesh ends up.
                None => self.skeleton_in_view(id, camera, providers),
            };
            if !in_view {
                carry.push(id);
                continue;
            }
            let Some(drawable) = self.drawables.get(&id) else {
                continue;
            };
            let (Some(skeleton), Some(mesh), Some(volume)) =
                (drawable.skeleton, drawable.params.mesh(), drawable.volume.clone())
            else {
                continue;
            };
            if volume.is_placeholder() {
                self.drop_skin(id, camera);
                continue;
            }
            let Some(skin) = providers.meshes.skin_info(mesh) else {
                continue;
            };
            let Some(pose) = self.sample_pose(skeleton, providers) else {
                self.drop_skin(id, camera);
                continue;
            };

            let Some(drawable) = self.drawables.get_mut(&id) else {
                continue;
            };
            let rigged = drawable.rigged.get_or_insert_with(RiggedVolume::new);
            match self.deformer.update(rigged, &skin, &pose, &volume, frame) {
                Ok(SkinOutcome::AlreadyCurrent) => {}
                Ok(outcome) => {
                    let bounds = rigged.bounds();
                    let was_skinned = std::mem::replace(&mut drawable.skin_active, true);
                    let r = bin_radius(
                        &self.ctx.config().octree,
                        BinShape::Animating {
                            half_extents: bounds.extents(),
                        },
                        bounds.radius(),
                        0.0,
                    );
                    self.stats.skinned += 1;
                    self.reposition(id, bounds, r);
                    if outcome != SkinOutcome::Reallocated && was_skinned {
                        self.dirty.mesh.insert(id);
                    } else if let Some(group) = self.octree.group_of(id) {
                        self.dirty.groups.insert(group);
                    }
                }
                Err(err) => {
                    self.skin_failures += 1;
                    self.stats.skin_failures += 1;
                    if self.ctx.first_report(id, Issue::Skinning) {
                        log::warn!("{id}: skinning failed: {err}; drawing static geometry");
                    }
                    self.drop_skin(id, camera);
                    if self.skin_failures >= self.ctx.config().skin.max_failures_before_disable
                        && self.ctx.degrade(DegradedReason::SkinningFailures)
                    {
                        let mut skinned: Vec<EntityId> = self
                            .drawables
                            .values()
                            .filter(|d| d.skin_active)
                            .map(|d| d.id)
                            .collect();
                        skinned.sort_unstable();
                        for id in skinned {
                            self.drop_skin(id, camera);
                        }
                        break;
                    }
                }
            }
        }
        self.dirty.rigged.extend(carry);
    }

    /// Whether the skeleton driving `id` is in view. An unsampled skeleton
    /// counts as visible so the skin step can fall back to static geometry.
    fn skeleton_in_view(&mut self, id: EntityId, camera: &Camera, providers: &Providers<'_>) -> bool {
        let Some(skeleton) = self.drawables.get(&id).and_then(|d| d.skeleton) else {
            return false;
        };
        let Some(pose) = self.sample_pose(skeleton, providers) else {
            return true;
        };
        let reach = Aabb::from_center_half_extents(pose.root_position, Vec3::splat(pose.bin_radius.max(0.5)));
        camera.frustum.is_visible(&reach)
    }

    /// Stop drawing the skinned copy of `id` and fall back to its source
    /// volume.
    fn drop_skin(&mut self, id: EntityId, camera: &Camera) {
        let Some(drawable) = self.drawables.get_mut(&id) else {
            return;
        };
        if !std::mem::replace(&mut drawable.skin_active, false) {
            return;
        }
        let bounds = drawable.world_bounds();
        let r = bin_radius(
            &self.ctx.config().octree,
            drawable.bin_shape(&bounds),
            bounds.radius(),
            camera.distance_to(bounds.center()),
        );
        self.reposition(id, bounds, r);
        if let Some(group) = self.octree.group_of(id) {
            self.dirty.groups.insert(group);
        }
    }

    /// Rebuild dirty visible groups, patch partially dirty ones, report
    /// texture importance, and assemble the draw lists.
    fn generate_draw_info(&mut self, camera: &Camera, providers: &Providers<'_>) {
        let mut full = Vec::new();
        for group in self.dirty.groups.take() {
            if self.octree.group(group).is_none() {
                if self.groups.remove(&group).is_some() {
                    self.batcher.release_group(group);
                }
                continue;
            }
            if self.visible_set.contains(&group) {
                full.push(group);
            } else {
                self.dirty.groups.insert(group);
            }
        }
        full.sort_unstable();

        let mut partial: BTreeMap<GroupId, Vec<EntityId>> = BTreeMap::new();
        for id in self.dirty.mesh.take() {
            let Some(group) = self.octree.group_of(id) else {
                continue;
            };
            if full.binary_search(&group).is_ok() {
                continue;
            }
            if self.visible_set.contains(&group) {
                partial.entry(group).or_default().push(id);
            } else {
                self.dirty.mesh.insert(id);
            }
        }

        for group in full {
            self.rebuild_group(group, camera, providers);
        }
        for (group, entities) in partial {
            self.update_group_mesh(group, &entities, camera, providers);
        }
        self.report_texture_sizes(camera, providers);
        self.assemble_lists(camera);
    }

    /// Batch faces of `entities` for this frame's camera, with unavailable
    /// textures replaced by the placeholder.
    fn collect_faces(&mut self, entities: &[EntityId], camera: &Camera, providers: &Providers<'_>) -> Vec<BatchFace> {
        let frame = self.ctx.frame();
        let retry = u64::from(self.ctx.config().frame.asset_retry_frames);
        let mut faces = Vec::new();
        let mut missing = Vec::new();
        for id in entities {
            let Some(drawable) = self.drawables.get(id) else {
                continue;
            };
            let (volume_faces, _, model) = drawable.render_faces();
            let metrics = face_metrics(drawable, camera);
            let mut any_missing = false;
            for (index, (face, metric)) in volume_faces.iter().zip(metrics).enumerate() {
                let Ok(face_index) = u16::try_from(index) else {
                    break;
                };
                let mut entry = drawable.entry(index);
                let requested = entry.texture;
                let texture = resolve_entry(providers, &mut entry);
                if texture.missing {
                    any_missing = true;
                    if self.ctx.first_report(*id, Issue::MissingTexture) {
                        log::warn!("{id}: texture {requested:?} unavailable; using placeholder");
                    }
                }
                let mut batch_face = BatchFace::new(
                    FaceKey::new(*id, face_index),
                    entry,
                    face.vertex_count() as u32,
                    face.index_count() as u32,
                );
                batch_face.texture_has_alpha = texture.has_alpha;
                batch_face.model_matrix = model;
                batch_face.distance = metric.distance;
                batch_face.virtual_size = metric.virtual_size;
                batch_face.hud = drawable.hud;
                faces.push(batch_face);
            }
            if any_missing {
                missing.push(*id);
            }
        }
        for id in missing {
            if let Some(drawable) = self.drawables.get_mut(&id) {
                drawable.retry_at.get_or_insert(frame + retry);
            }
        }
        faces
    }

    fn rebuild_group(&mut self, group: GroupId, camera: &Camera, providers: &Providers<'_>) {
        let Some(members) = self.octree.group(group).map(|g| g.members().to_vec()) else {
            return;
        };
        let faces = self.collect_faces(&members, camera, providers);
        let source = DrawableGeometry {
            drawables: &self.drawables,
        };
        let result = match self.batcher.rebuild_geom(group, &faces, &source) {
            Err(BatchError::BufferOverflow { bytes, limit, .. }) => {
                log::warn!("{group}: {bytes} bytes of geometry over the {limit} byte limit; drawing unbatched");
                self.stats.unbatched_fallbacks += 1;
                self.batcher.rebuild_unbatched(group, &faces, &source)
            }
            other => other,
        };
        match result {
            Ok(geometry) => {
                for entity in geometry.excluded() {
                    if self.ctx.first_report(*entity, Issue::CorruptGeometry) {
                        log::warn!("{entity}: corrupt geometry, left out of {group}");
                    }
                }
                let rebuilds = self.groups.get(&group).map_or(0, |s| s.rebuilds) + 1;
                self.groups.insert(
                    group,
                    GroupState {
                        geometry,
                        rebuilds,
                        last_rebuilt: self.ctx.frame(),
                    },
                );
                self.stats.rebuilt_groups += 1;
            }
            Err(err @ BatchError::AllocationFailed { .. }) => {
                log::warn!("{err}");
                if self.ctx.degrade(DegradedReason::ArenaExhausted) {
                    self.batcher.set_texture_batching(false);
                }
                self.dirty.groups.insert(group);
            }
            Err(err) => log::warn!("{group}: rebuild failed: {err}"),
        }
    }

    /// Rewrite vertex data of `entities` in place, escalating to a full
    /// rebuild when counts or render state changed.
    fn update_group_mesh(
        &mut self,
        group: GroupId,
        entities: &[EntityId],
        camera: &Camera,
        providers: &Providers<'_>,
    ) {
        if !self.groups.contains_key(&group) {
            self.rebuild_group(group, camera, providers);
            return;
        }
        let mut faces = self.collect_faces(entities, camera, providers);
        let render_invisible = self.ctx.config().batch.render_invisible;
        let source = DrawableGeometry {
            drawables: &self.drawables,
        };
        let Some(state) = self.groups.get_mut(&group) else {
            return;
        };
        faces.retain(|f| state.geometry.slot(f.key).is_some() || classify(f, render_invisible).is_some());
        match self.batcher.rebuild_mesh(&mut state.geometry, &faces, &source) {
            Ok(count) => self.stats.partial_updates += count,
            Err(err) => {
                if err.needs_full_rebuild() {
                    log::trace!("{group}: {err}; full rebuild");
                } else {
                    log::warn!("{group}: partial update failed: {err}");
                }
                self.rebuild_group(group, camera, providers);
            }
        }
    }

    /// Report the largest on-screen size of every texture sampled by a
    /// visible face.
    fn report_texture_sizes(&mut self, camera: &Camera, providers: &Providers<'_>) {
        let mut sizes: FxHashMap<TextureId, f32> = FxHashMap::default();
        for group in &self.visible {
            let Some(node) = self.octree.group(*group) else {
                continue;
            };
            for id in node.members() {
                let Some(drawable) = self.drawables.get(id) else {
                    continue;
                };
                for (index, metric) in face_metrics(drawable, camera).into_iter().enumerate() {
                    let entry = drawable.entry(index);
                    for texture in textures_of(&entry) {
                        let size = sizes.entry(texture).or_insert(0.0);
                        *size = size.max(metric.virtual_size);
                    }
                }
            }
        }
        let mut bytes = 0;
        for (texture, size) in sizes {
            providers.textures.report_virtual_size(texture, size);
            bytes += providers.textures.estimate_decode_cost(texture);
        }
        self.stats.texture_bytes = bytes;
    }

    fn assemble_lists(&mut self, camera: &Camera) {
        let mut lists = RenderLists::default();
        for group in &self.visible {
            let Some(state) = self.groups.get(group) else {
                continue;
            };
            for (kind, draws) in state.geometry.passes() {
                if kind.is_alpha() {
                    lists.alpha.extend(draws.iter().map(|draw| {
                        let mut draw = draw.clone();
                        draw.distance = camera.distance_to(draw.extents.center());
                        draw
                    }));
                } else {
                    lists.passes.entry(kind).or_default().extend_from_slice(draws);
                }
            }
        }
        lists.alpha.sort_by(|a, b| {
            b.distance
                .total_cmp(&a.distance)
                .then_with(|| a.faces.first().cmp(&b.faces.first()))
        });
        self.stats.draws = lists.passes.iter().map(|(k, v)| (*k, v.len())).collect();
        self.stats.alpha_draws = lists.alpha.len();
        self.lists = lists;
    }
}

fn request_level(id: EntityId, params: &VolumeParams, lod: u8, providers: &Providers<'_>) {
    if let Some(resident) = providers.meshes.load_mesh(params, lod) {
        log::trace!("{id}: requested lod {lod}, drawing {resident} meanwhile");
    }
}
