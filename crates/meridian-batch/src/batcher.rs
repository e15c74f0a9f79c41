//! Group geometry assembly: bucket faces, pack them into shared vertex
//! buffers, and emit merged draws per render pass.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use glam::{Mat3, Vec3, Vec4};
use meridian_config::BatchConfig;
use meridian_math::{Aabb, EntityId, GroupId};
use meridian_volume::TextureId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    BatchError, BatchFace, BatchVertex, BufferArena, BufferId, Classification, DrawInfo,
    FaceBucket, FaceGeometry, FaceKey, GeometrySource, PassRegistry, RenderPassKind,
    VertexFormatMask, classify,
};

/// Hard ceiling of 16-bit indexed draws.
const INDEX_RANGE_MAX: u32 = 65535;

/// Texture slots addressable by a batched shader.
const MAX_TEXTURE_SLOTS: u32 = 16;

/// One merged vertex/index buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryBuffer {
    id: BufferId,
    bucket: FaceBucket,
    mask: VertexFormatMask,
    vertices: Vec<BatchVertex>,
    indices: Vec<u16>,
    textures: Vec<TextureId>,
}

impl GeometryBuffer {
    fn new(id: BufferId, bucket: FaceBucket, mask: VertexFormatMask, textures: Vec<TextureId>) -> Self {
        Self {
            id,
            bucket,
            mask,
            vertices: Vec::new(),
            indices: Vec::new(),
            textures,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn bucket(&self) -> FaceBucket {
        self.bucket
    }

    pub fn mask(&self) -> VertexFormatMask {
        self.mask
    }

    pub fn vertices(&self) -> &[BatchVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Batched texture list; empty when the buffer holds a single texture.
    pub fn textures(&self) -> &[TextureId] {
        &self.textures
    }

    /// Upload size in the buffer's packed format.
    pub fn bytes(&self) -> u64 {
        self.vertices.len() as u64 * self.mask.vertex_size() + self.indices.len() as u64 * 2
    }

    /// Vertex bytes ready for upload.
    pub fn packed_vertices(&self) -> Vec<u8> {
        self.mask.pack(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Where a face's geometry lives in its group's buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSlot {
    /// Index into [`GroupGeometry::buffers`].
    pub buffer: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub texture_index: u32,
    pub texture: TextureId,
    pub classification: Classification,
    /// Face bounds in the space of its draw (before any model matrix).
    pub local_extents: Aabb,
    /// Face bounds in group space.
    pub extents: Aabb,
}

/// Buffers and per-pass draws of one spatial group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupGeometry {
    group: GroupId,
    buffers: Vec<GeometryBuffer>,
    draw_map: BTreeMap<RenderPassKind, Vec<DrawInfo>>,
    slots: FxHashMap<FaceKey, FaceSlot>,
    excluded: Vec<EntityId>,
    skipped_faces: usize,
    unbatched: bool,
    reserved_bytes: u64,
}

impl GroupGeometry {
    pub fn empty(group: GroupId) -> Self {
        Self {
            group,
            buffers: Vec::new(),
            draw_map: BTreeMap::new(),
            slots: FxHashMap::default(),
            excluded: Vec::new(),
            skipped_faces: 0,
            unbatched: false,
            reserved_bytes: 0,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn buffers(&self) -> &[GeometryBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, id: BufferId) -> Option<&GeometryBuffer> {
        if id.group != self.group {
            return None;
        }
        self.buffers.get(id.index as usize)
    }

    /// Draws of one pass, in registration order.
    pub fn draws(&self, kind: RenderPassKind) -> &[DrawInfo] {
        self.draw_map.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Every pass with at least one draw.
    pub fn passes(&self) -> impl Iterator<Item = (RenderPassKind, &[DrawInfo])> {
        self.draw_map.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn draw_count(&self) -> usize {
        self.draw_map.values().map(Vec::len).sum()
    }

    pub fn slot(&self, key: FaceKey) -> Option<&FaceSlot> {
        self.slots.get(&key)
    }

    pub fn face_count(&self) -> usize {
        self.slots.len()
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.slots.keys().any(|k| k.entity == entity)
    }

    /// Entities dropped because their geometry could not be copied.
    pub fn excluded(&self) -> &[EntityId] {
        &self.excluded
    }

    /// Faces with nothing to draw (empty or invisible).
    pub fn skipped_faces(&self) -> usize {
        self.skipped_faces
    }

    /// Built one buffer per entity after the merged layout overflowed.
    pub fn is_unbatched(&self) -> bool {
        self.unbatched
    }

    /// Bytes held in the buffer arena.
    pub fn reserved_bytes(&self) -> u64 {
        self.reserved_bytes
    }

    pub fn vertex_bytes(&self) -> u64 {
        self.buffers.iter().map(GeometryBuffer::bytes).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.buffers.iter().map(|b| b.indices.len() / 3).sum()
    }
}

/// A face that passed validation, with its resolved geometry.
struct Prepared<'a> {
    face: &'a BatchFace,
    class: Classification,
    geometry: FaceGeometry<'a>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Layout {
    Merged,
    PerEntity,
}

/// Builds [`GroupGeometry`] from batch faces.
#[derive(Debug)]
pub struct FaceBatcher {
    config: BatchConfig,
    registry: PassRegistry,
    arena: BufferArena,
    texture_batching: bool,
}

impl FaceBatcher {
    pub fn new(config: BatchConfig) -> Self {
        let arena = BufferArena::new(config.arena_budget_bytes);
        let texture_batching = config.texture_batching;
        Self {
            config,
            registry: PassRegistry::new(),
            arena,
            texture_batching,
        }
    }

    pub fn with_registry(mut self, registry: PassRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// Turn texture batching off (or back on) for subsequent rebuilds.
    pub fn set_texture_batching(&mut self, enabled: bool) {
        if self.texture_batching != enabled {
            log::info!("texture batching {}", if enabled { "enabled" } else { "disabled" });
        }
        self.texture_batching = enabled;
    }

    /// Textures one batched buffer may address. One slot stays reserved.
    pub fn texture_channels(&self) -> usize {
        self.config.max_texture_index.min(MAX_TEXTURE_SLOTS).saturating_sub(1) as usize
    }

    pub fn texture_batching(&self) -> bool {
        self.texture_batching && self.texture_channels() > 1
    }

    /// Vertices one buffer of format `mask` may hold.
    pub fn max_vertices(&self, mask: VertexFormatMask) -> u32 {
        let size = mask.vertex_size().max(1);
        let by_vbo = self.config.max_vbo_size_kb as u64 * 1024 / size;
        let by_node = self.config.max_node_size_kb as u64 * 1024 / size;
        by_vbo.min(by_node).min(self.index_limit() as u64).max(1) as u32
    }

    /// Largest vertex count one indexed draw may address.
    fn index_limit(&self) -> u32 {
        self.config.index_range_limit.min(INDEX_RANGE_MAX)
    }

    /// Full rebuild of a group's merged buffers and draws.
    ///
    /// Faces are bucketed, sorted (alpha far to near, opaque by state), and
    /// packed greedily into buffers. Returns [`BatchError::BufferOverflow`]
    /// when the group exceeds `max_group_bytes`; callers then fall back to
    /// [`FaceBatcher::rebuild_unbatched`].
    pub fn rebuild_geom(
        &mut self,
        group: GroupId,
        faces: &[BatchFace],
        source: &dyn GeometrySource,
    ) -> Result<GroupGeometry, BatchError> {
        let batching = self.texture_batching();
        let (prepared, excluded, skipped) = self.prepare(faces, source);

        let bytes: u64 = prepared.iter().map(|p| face_bytes(p, batching)).sum();
        if bytes > self.config.max_group_bytes {
            return Err(BatchError::BufferOverflow {
                group,
                bytes,
                limit: self.config.max_group_bytes,
            });
        }

        let mut geom = self.assemble(group, &prepared, batching, Layout::Merged);
        geom.excluded = excluded;
        geom.skipped_faces = skipped;
        geom.reserved_bytes = self
            .arena
            .reserve(group, geom.buffers.iter().map(GeometryBuffer::bytes))?;
        log::trace!(
            "{group}: {} faces in {} buffers, {} draws",
            geom.face_count(),
            geom.buffers.len(),
            geom.draw_count()
        );
        Ok(geom)
    }

    /// Rebuild without cross-entity merging or texture batching: every
    /// entity gets its own buffers and every face its own draw.
    pub fn rebuild_unbatched(
        &mut self,
        group: GroupId,
        faces: &[BatchFace],
        source: &dyn GeometrySource,
    ) -> Result<GroupGeometry, BatchError> {
        let (prepared, excluded, skipped) = self.prepare(faces, source);
        let mut geom = self.assemble(group, &prepared, false, Layout::PerEntity);
        geom.excluded = excluded;
        geom.skipped_faces = skipped;
        geom.unbatched = true;
        geom.reserved_bytes = self
            .arena
            .reserve(group, geom.buffers.iter().map(GeometryBuffer::bytes))?;
        log::debug!("{group}: unbatched rebuild, {} buffers", geom.buffers.len());
        Ok(geom)
    }

    /// Rewrite vertex data of `faces` in place. Counts and render state must
    /// match their slots; otherwise an error asks for a full rebuild
    /// (see [`BatchError::needs_full_rebuild`]). Returns the number of faces
    /// rewritten.
    pub fn rebuild_mesh(
        &self,
        geom: &mut GroupGeometry,
        faces: &[BatchFace],
        source: &dyn GeometrySource,
    ) -> Result<usize, BatchError> {
        let mut touched = FxHashSet::default();
        for face in faces {
            let key = face.key;
            let slot = geom.slots.get(&key).ok_or(BatchError::MissingSlot(key))?;
            if slot.vertex_count != face.vertex_count || slot.index_count != face.index_count {
                return Err(BatchError::CountChanged(key));
            }
            let class = classify(face, self.config.render_invisible);
            if class.as_ref() != Some(&slot.classification) || slot.texture != face.entry.texture {
                return Err(BatchError::StateChanged(key));
            }
            let geometry = resolve(face, source)?;

            let buffer = &mut geom.buffers[slot.buffer as usize];
            let vertices = slot.vertex_offset as usize..(slot.vertex_offset + slot.vertex_count) as usize;
            let indices = slot.index_offset as usize..(slot.index_offset + slot.index_count) as usize;
            fill_vertices(&mut buffer.vertices[vertices], face, &geometry, slot.texture_index);
            for (dst, src) in buffer.indices[indices].iter_mut().zip(geometry.indices) {
                *dst = (slot.vertex_offset + *src as u32) as u16;
            }

            let local = vertex_bounds(
                &buffer.vertices[slot.vertex_offset as usize..(slot.vertex_offset + slot.vertex_count) as usize],
            );
            let extents = group_space(local, face);
            if let Some(slot) = geom.slots.get_mut(&key) {
                slot.local_extents = local;
                slot.extents = extents;
            }
            touched.insert(key);
        }

        if !touched.is_empty() {
            let slots = &geom.slots;
            for draw in geom.draw_map.values_mut().flatten() {
                if draw.faces.iter().any(|k| touched.contains(k)) {
                    draw.extents = draw
                        .faces
                        .iter()
                        .filter_map(|k| slots.get(k))
                        .fold(Aabb::EMPTY, |acc, s| acc.union(&s.extents));
                }
            }
        }
        Ok(touched.len())
    }

    /// Return a group's arena bytes, e.g. when the group is destroyed.
    pub fn release_group(&mut self, group: GroupId) -> u64 {
        self.arena.release(group)
    }

    /// Validate faces and resolve their geometry. Entities with any unusable
    /// face are excluded entirely.
    fn prepare<'a>(
        &self,
        faces: &'a [BatchFace],
        source: &'a dyn GeometrySource,
    ) -> (Vec<Prepared<'a>>, Vec<EntityId>, usize) {
        let mut prepared = Vec::with_capacity(faces.len());
        let mut excluded: Vec<EntityId> = Vec::new();
        let mut skipped = 0;

        for face in faces {
            if face.is_empty() {
                skipped += 1;
                continue;
            }
            let Some(class) = classify(face, self.config.render_invisible) else {
                skipped += 1;
                continue;
            };
            let result = resolve(face, source).and_then(|geometry| {
                if face.vertex_count > self.index_limit() {
                    Err(BatchError::CorruptGeometry {
                        entity: face.key.entity,
                        reason: format!("face {} has {} vertices", face.key.face, face.vertex_count),
                    })
                } else {
                    Ok(geometry)
                }
            });
            match result {
                Ok(geometry) => prepared.push(Prepared { face, class, geometry }),
                Err(err) => {
                    if !excluded.contains(&face.key.entity) {
                        log::debug!("excluding {}: {err}", face.key.entity);
                        excluded.push(face.key.entity);
                    }
                }
            }
        }

        if !excluded.is_empty() {
            prepared.retain(|p| !excluded.contains(&p.face.key.entity));
        }
        (prepared, excluded, skipped)
    }

    fn assemble(
        &self,
        group: GroupId,
        prepared: &[Prepared<'_>],
        batching: bool,
        layout: Layout,
    ) -> GroupGeometry {
        let mut geom = GroupGeometry::empty(group);
        let channels = self.texture_channels();

        for bucket in FaceBucket::ALL {
            let mut order: Vec<usize> = (0..prepared.len())
                .filter(|&i| prepared[i].class.bucket == bucket)
                .collect();
            if order.is_empty() {
                continue;
            }
            order.sort_by(|&a, &b| {
                let (a, b) = (prepared[a].face, prepared[b].face);
                let by_layout = match layout {
                    Layout::PerEntity => a.key.entity.cmp(&b.key.entity),
                    Layout::Merged => Ordering::Equal,
                };
                by_layout.then_with(|| {
                    if bucket.is_distance_sorted() {
                        compare_far_to_near(a, b)
                    } else {
                        compare_state(a, b)
                    }
                })
            });

            let mask = bucket.vertex_mask(batching);
            let max_vertices = self.max_vertices(mask);
            let bucket_batches = batching && bucket.allows_texture_batching();

            let mut i = 0;
            while i < order.len() {
                let first = prepared[order[i]].face;
                let batch_run = bucket_batches && first.is_texture_batchable();
                let mut textures = Vec::new();
                if batch_run {
                    textures.push(first.entry.texture);
                }

                let mut vertices = 0u32;
                let mut end = i;
                while end < order.len() {
                    let face = prepared[order[end]].face;
                    if end > i {
                        if vertices + face.vertex_count > max_vertices {
                            break;
                        }
                        if layout == Layout::PerEntity && face.key.entity != first.key.entity {
                            break;
                        }
                        if face.entry.texture != first.entry.texture
                            && !textures.contains(&face.entry.texture)
                        {
                            if !batch_run || !face.is_texture_batchable() || textures.len() >= channels {
                                break;
                            }
                            textures.push(face.entry.texture);
                        }
                    }
                    vertices += face.vertex_count;
                    end += 1;
                }

                if textures.len() < 2 {
                    textures.clear();
                }
                let id = BufferId {
                    group,
                    index: geom.buffers.len() as u32,
                };
                let mut buffer = GeometryBuffer::new(id, bucket, mask, textures);
                buffer.vertices.reserve(vertices as usize);
                for &p in &order[i..end] {
                    let slot = append_face(&mut buffer, &prepared[p]);
                    geom.slots.insert(prepared[p].face.key, slot);
                }
                geom.buffers.push(buffer);
                i = end;
            }

            for &p in &order {
                let face = prepared[p].face;
                let Some(slot) = geom.slots.get(&face.key) else {
                    continue;
                };
                let buffer = &geom.buffers[slot.buffer as usize];
                for &kind in &prepared[p].class.passes {
                    let draw = DrawInfo::for_face(buffer.id, slot, face, &buffer.textures);
                    let draws = geom.draw_map.entry(kind).or_default();
                    match draws.last_mut() {
                        Some(prev) if layout == Layout::Merged && self.registry.can_merge(kind, prev, &draw) => {
                            prev.absorb(draw)
                        }
                        _ => draws.push(draw),
                    }
                }
            }
        }
        geom
    }
}

fn resolve<'a>(face: &BatchFace, source: &'a dyn GeometrySource) -> Result<FaceGeometry<'a>, BatchError> {
    let corrupt = |reason: String| BatchError::CorruptGeometry {
        entity: face.key.entity,
        reason,
    };
    let geometry = source
        .face_geometry(face.key)
        .ok_or_else(|| corrupt(format!("face {} has no geometry", face.key.face)))?;
    if let Some(reason) = geometry.defect() {
        return Err(corrupt(reason));
    }
    if geometry.positions.len() != face.vertex_count as usize
        || geometry.indices.len() != face.index_count as usize
    {
        return Err(corrupt(format!(
            "face {} declares {}/{} vertices/indices, source has {}/{}",
            face.key.face,
            face.vertex_count,
            face.index_count,
            geometry.positions.len(),
            geometry.indices.len()
        )));
    }
    Ok(geometry)
}

fn face_bytes(p: &Prepared<'_>, batching: bool) -> u64 {
    let size = p.class.bucket.vertex_mask(batching).vertex_size();
    p.face.vertex_count as u64 * size + p.face.index_count as u64 * 2
}

/// Blended faces: farthest first, ties by face key.
fn compare_far_to_near(a: &BatchFace, b: &BatchFace) -> Ordering {
    b.distance.total_cmp(&a.distance).then_with(|| a.key.cmp(&b.key))
}

/// Opaque faces: grouped by the state that breaks batches.
fn compare_state(a: &BatchFace, b: &BatchFace) -> Ordering {
    b.is_texture_batchable()
        .cmp(&a.is_texture_batchable())
        .then(a.entry.bump.cmp(&b.entry.bump))
        .then((a.entry.fullbright || a.hud).cmp(&(b.entry.fullbright || b.hud)))
        .then_with(|| {
            let ma = a.entry.material.as_ref().map(|m| m.id);
            let mb = b.entry.material.as_ref().map(|m| m.id);
            ma.cmp(&mb)
        })
        .then(a.entry.texture.cmp(&b.entry.texture))
        .then(a.key.cmp(&b.key))
}

fn append_face(buffer: &mut GeometryBuffer, p: &Prepared<'_>) -> FaceSlot {
    let face = p.face;
    let geometry = &p.geometry;
    let vertex_offset = buffer.vertices.len() as u32;
    let index_offset = buffer.indices.len() as u32;
    let texture_index = buffer
        .textures
        .iter()
        .position(|t| *t == face.entry.texture)
        .unwrap_or(0) as u32;

    buffer
        .vertices
        .resize(buffer.vertices.len() + geometry.positions.len(), BatchVertex::default());
    fill_vertices(
        &mut buffer.vertices[vertex_offset as usize..],
        face,
        geometry,
        texture_index,
    );
    buffer
        .indices
        .extend(geometry.indices.iter().map(|&i| (vertex_offset + i as u32) as u16));

    let local = vertex_bounds(&buffer.vertices[vertex_offset as usize..]);
    FaceSlot {
        buffer: buffer.id.index,
        vertex_offset,
        vertex_count: geometry.positions.len() as u32,
        index_offset,
        index_count: geometry.indices.len() as u32,
        texture_index,
        texture: face.entry.texture,
        classification: p.class.clone(),
        local_extents: local,
        extents: group_space(local, face),
    }
}

fn vertex_bounds(vertices: &[BatchVertex]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for v in vertices {
        bounds.include_point(Vec3::from(v.position));
    }
    bounds
}

fn group_space(local: Aabb, face: &BatchFace) -> Aabb {
    match &face.model_matrix {
        Some(m) => local.transformed(m),
        None => local,
    }
}

fn fill_vertices(out: &mut [BatchVertex], face: &BatchFace, geometry: &FaceGeometry<'_>, texture_index: u32) {
    let transform = geometry.transform;
    let linear = Mat3::from_mat4(transform);
    let normal_matrix = if linear.determinant().abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        linear
    };
    let color = unorm4(face.entry.color);
    let glow = (face.entry.glow.clamp(0.0, 1.0) * 255.0).round() as u8;

    for (i, v) in out.iter_mut().enumerate().take(geometry.positions.len()) {
        let normal = (normal_matrix * geometry.normals[i]).normalize_or(Vec3::Z);
        let uv = geometry.uvs[i].to_array();
        *v = BatchVertex {
            position: transform.transform_point3(geometry.positions[i]).to_array(),
            normal: normal.to_array(),
            uv0: uv,
            uv1: uv,
            uv2: uv,
            color,
            emissive: [0, 0, 0, glow],
            tangent: normal.any_orthonormal_vector().extend(1.0).to_array(),
            texture_index,
        };
    }
}

fn unorm4(c: Vec4) -> [u8; 4] {
    let c = (c.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use meridian_volume::{TextureEntry, VolumeFace, generate_box};

    /// Every entity owns the same unit-box faces, offset along X.
    struct Boxes {
        faces: Vec<VolumeFace>,
        broken: Option<EntityId>,
    }

    impl Boxes {
        fn new() -> Self {
            Self {
                faces: generate_box(0),
                broken: None,
            }
        }
    }

    impl GeometrySource for Boxes {
        fn face_geometry(&self, key: FaceKey) -> Option<FaceGeometry<'_>> {
            if self.broken == Some(key.entity) && key.face == 2 {
                return None;
            }
            let face = self.faces.get(key.face as usize)?;
            Some(FaceGeometry {
                positions: &face.positions,
                normals: &face.normals,
                uvs: &face.uvs,
                indices: &face.indices,
                transform: Mat4::from_translation(Vec3::X * key.entity.value() as f32 * 3.0),
            })
        }
    }

    fn box_faces(source: &Boxes, entity: u64, entry: TextureEntry) -> Vec<BatchFace> {
        source
            .faces
            .iter()
            .enumerate()
            .map(|(i, f)| {
                BatchFace::new(
                    FaceKey::new(EntityId(entity), i as u16),
                    entry.clone(),
                    f.vertex_count() as u32,
                    f.index_count() as u32,
                )
            })
            .collect()
    }

    fn batcher() -> FaceBatcher {
        FaceBatcher::new(BatchConfig::default())
    }

    #[test]
    fn test_shared_texture_collapses_to_one_draw() {
        let source = Boxes::new();
        let faces: Vec<BatchFace> = (1..=100)
            .flat_map(|e| box_faces(&source, e, TextureEntry::new(TextureId(7))))
            .collect();
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert_eq!(geom.buffers().len(), 1);
        let draws = geom.draws(RenderPassKind::Simple);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].faces.len(), 600);
        assert_eq!(draws[0].count as usize, geom.buffers()[0].indices().len());
    }

    #[test]
    fn test_draws_partition_buffer_ranges() {
        let source = Boxes::new();
        let mut faces = Vec::new();
        for e in 1..=20 {
            let mut entry = TextureEntry::new(TextureId(e % 3));
            entry.fullbright = e % 4 == 0;
            entry.animated = e % 5 == 0;
            faces.extend(box_faces(&source, e, entry));
        }
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        let mut covered: FxHashMap<BufferId, Vec<(u32, u32)>> = FxHashMap::default();
        for (kind, draws) in geom.passes() {
            if kind == RenderPassKind::Glow {
                continue;
            }
            for d in draws {
                covered.entry(d.buffer).or_default().push((d.offset, d.offset + d.count));
                let buffer = geom.buffer(d.buffer).unwrap();
                for idx in &buffer.indices()[d.offset as usize..(d.offset + d.count) as usize] {
                    assert!((*idx as u32) >= d.start && (*idx as u32) <= d.end);
                }
            }
        }
        for (id, mut ranges) in covered {
            ranges.sort();
            for pair in ranges.windows(2) {
                assert!(pair[0].1 <= pair[1].0, "overlapping draws in {id}");
            }
        }
    }

    #[test]
    fn test_max_vertices_splits_buffers() {
        let source = Boxes::new();
        let config = BatchConfig {
            max_vbo_size_kb: 1,
            ..BatchConfig::default()
        };
        let mut batcher = FaceBatcher::new(config);
        let mask = FaceBucket::Simple.vertex_mask(batcher.texture_batching());
        let cap = batcher.max_vertices(mask);
        let faces: Vec<BatchFace> = (1..=10)
            .flat_map(|e| box_faces(&source, e, TextureEntry::new(TextureId(1))))
            .collect();
        let geom = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert!(geom.buffers().len() > 1);
        for buffer in geom.buffers() {
            assert!(buffer.vertices().len() as u32 <= cap);
        }
        for d in geom.draws(RenderPassKind::Simple) {
            assert!(d.vertex_count() <= cap);
        }
    }

    #[test]
    fn test_texture_channels_limit_batches() {
        let source = Boxes::new();
        let config = BatchConfig {
            max_texture_index: 4,
            ..BatchConfig::default()
        };
        let mut batcher = FaceBatcher::new(config);
        assert_eq!(batcher.texture_channels(), 3);
        let faces: Vec<BatchFace> = (1..=6)
            .flat_map(|e| box_faces(&source, e, TextureEntry::new(TextureId(e))))
            .collect();
        let geom = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert_eq!(geom.buffers().len(), 2);
        for buffer in geom.buffers() {
            assert_eq!(buffer.textures().len(), 3);
        }
        let draws = geom.draws(RenderPassKind::Simple);
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(DrawInfo::is_texture_batched));
    }

    #[test]
    fn test_disabled_batching_splits_by_texture() {
        let source = Boxes::new();
        let mut batcher = batcher();
        batcher.set_texture_batching(false);
        let faces: Vec<BatchFace> = (1..=3)
            .flat_map(|e| box_faces(&source, e, TextureEntry::new(TextureId(e))))
            .collect();
        let geom = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert_eq!(geom.buffers().len(), 3);
        assert_eq!(geom.draws(RenderPassKind::Simple).len(), 3);
        assert!(!geom.buffers()[0].mask().contains(VertexFormatMask::TEXTURE_INDEX));
    }

    #[test]
    fn test_alpha_faces_far_to_near_per_entity() {
        let source = Boxes::new();
        let tint = Vec4::new(1.0, 1.0, 1.0, 0.5);
        let mut faces = Vec::new();
        for (e, distance) in [(1u64, 10.0f32), (2, 30.0), (3, 20.0)] {
            for mut f in box_faces(&source, e, TextureEntry::new(TextureId(1)).with_color(tint)) {
                f.distance = distance;
                faces.push(f);
            }
        }
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        let draws = geom.draws(RenderPassKind::Alpha);
        let entities: Vec<u64> = draws.iter().map(|d| d.faces[0].entity.value()).collect();
        assert_eq!(entities, vec![2, 3, 1]);
        for d in draws {
            assert!(d.faces.iter().all(|k| k.entity == d.faces[0].entity));
        }
        assert!(geom.draws(RenderPassKind::Simple).is_empty());
    }

    #[test]
    fn test_model_matrix_blocks_cross_entity_merge() {
        let source = Boxes::new();
        let mut faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        for mut f in box_faces(&source, 2, TextureEntry::new(TextureId(1))) {
            f.model_matrix = Some(Mat4::from_translation(Vec3::Y));
            faces.push(f);
        }
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        let draws = geom.draws(RenderPassKind::Simple);
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].model_matrix, Some(Mat4::from_translation(Vec3::Y)));
        assert!(draws[1].extents.min.y >= 0.5);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let source = Boxes::new();
        let mut faces = Vec::new();
        for e in 1..=8 {
            let mut entry = TextureEntry::new(TextureId(e % 3));
            entry.glow = if e % 2 == 0 { 0.5 } else { 0.0 };
            faces.extend(box_faces(&source, e, entry));
        }
        let mut batcher = batcher();
        let a = batcher.rebuild_geom(GroupId(4), &faces, &source).unwrap();
        let b = batcher.rebuild_geom(GroupId(4), &faces, &source).unwrap();
        assert_eq!(a, b);
        assert_eq!(batcher.arena().group_bytes(GroupId(4)), a.reserved_bytes());
    }

    #[test]
    fn test_empty_and_invisible_faces_skipped() {
        let source = Boxes::new();
        let mut faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        faces[0].vertex_count = 0;
        faces[1].entry.color.w = 0.0;
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert_eq!(geom.skipped_faces(), 2);
        assert_eq!(geom.face_count(), 4);
    }

    #[test]
    fn test_missing_geometry_excludes_entity() {
        let mut source = Boxes::new();
        source.broken = Some(EntityId(2));
        let mut faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        faces.extend(box_faces(&source, 2, TextureEntry::new(TextureId(1))));
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        assert_eq!(geom.excluded(), &[EntityId(2)]);
        assert!(!geom.contains_entity(EntityId(2)));
        assert!(geom.contains_entity(EntityId(1)));
    }

    #[test]
    fn test_group_byte_limit_falls_back_to_unbatched() {
        let source = Boxes::new();
        let config = BatchConfig {
            max_group_bytes: 1024,
            ..BatchConfig::default()
        };
        let mut batcher = FaceBatcher::new(config);
        let mut faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        faces.extend(box_faces(&source, 2, TextureEntry::new(TextureId(1))));
        let err = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap_err();
        assert!(matches!(err, BatchError::BufferOverflow { .. }));

        let geom = batcher.rebuild_unbatched(GroupId(1), &faces, &source).unwrap();
        assert!(geom.is_unbatched());
        assert_eq!(geom.buffers().len(), 2);
        assert_eq!(geom.draws(RenderPassKind::Simple).len(), 12);
    }

    #[test]
    fn test_arena_exhaustion_reports_allocation_failure() {
        let source = Boxes::new();
        let config = BatchConfig {
            arena_budget_bytes: 1024,
            ..BatchConfig::default()
        };
        let mut batcher = FaceBatcher::new(config);
        let faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        let err = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap_err();
        assert!(matches!(err, BatchError::AllocationFailed { .. }));
    }

    #[test]
    fn test_partial_rebuild_rewrites_in_place() {
        let source = Boxes::new();
        let faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        let mut batcher = batcher();
        let mut geom = batcher.rebuild_geom(GroupId(1), &faces, &source).unwrap();

        let mut recolored = faces[3].clone();
        recolored.entry.color = Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(batcher.rebuild_mesh(&mut geom, &[recolored], &source).unwrap(), 1);
        let slot = geom.slot(faces[3].key).unwrap().clone();
        let v = geom.buffers()[slot.buffer as usize].vertices()[slot.vertex_offset as usize];
        assert_eq!(v.color, [255, 0, 0, 255]);

        let mut blended = faces[3].clone();
        blended.entry.color.w = 0.2;
        let err = batcher.rebuild_mesh(&mut geom, &[blended], &source).unwrap_err();
        assert!(err.needs_full_rebuild());

        let mut grown = faces[3].clone();
        grown.vertex_count += 1;
        let err = batcher.rebuild_mesh(&mut geom, &[grown], &source).unwrap_err();
        assert_eq!(err, BatchError::CountChanged(faces[3].key));
    }

    #[test]
    fn test_vertices_carry_transform_and_texture_index() {
        let source = Boxes::new();
        let mut faces = box_faces(&source, 1, TextureEntry::new(TextureId(1)));
        faces.extend(box_faces(&source, 2, TextureEntry::new(TextureId(2))));
        let geom = batcher().rebuild_geom(GroupId(1), &faces, &source).unwrap();
        let slot = geom.slot(FaceKey::new(EntityId(2), 0)).unwrap();
        assert_eq!(slot.texture_index, 1);
        let buffer = &geom.buffers()[slot.buffer as usize];
        let v = buffer.vertices()[slot.vertex_offset as usize];
        assert_eq!(v.texture_index, 1);
        assert!(v.position[0] >= 5.0);
        assert!(slot.extents.min.x >= 5.0);
        assert_eq!(
            buffer.packed_vertices().len() as u64,
            buffer.vertices().len() as u64 * buffer.mask().vertex_size()
        );
    }
}
