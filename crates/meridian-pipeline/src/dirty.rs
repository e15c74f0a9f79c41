//! Dirty queues: ordered, deduplicated sets drained once per phase.

use std::hash::Hash;

use meridian_math::{EntityId, GroupId};
use rustc_hash::FxHashSet;

/// Insertion-ordered set. A phase drains it with [`DirtySet::take`] and
/// works on the snapshot, so anything re-marked while it runs waits for the
/// next frame.
#[derive(Debug, Clone)]
pub struct DirtySet<T> {
    order: Vec<T>,
    members: FxHashSet<T>,
}

impl<T> Default for DirtySet<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            members: FxHashSet::default(),
        }
    }
}

impl<T: Copy + Eq + Hash> DirtySet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `item` was already queued.
    pub fn insert(&mut self, item: T) -> bool {
        if self.members.insert(item) {
            self.order.push(item);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, item: &T) -> bool {
        if self.members.remove(item) {
            self.order.retain(|i| i != item);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }

    pub fn take(&mut self) -> Vec<T> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.insert(item);
        }
    }
}

/// Per-frame work queues other than entity rebuilds.
#[derive(Debug, Default)]
pub(crate) struct DirtyQueues {
    /// Created but not yet inserted into the octree.
    pub create: DirtySet<EntityId>,
    /// Re-evaluate LOD even when not visible (e.g. a level just streamed in).
    pub lod: DirtySet<EntityId>,
    /// Transform changed; bounds and baked positions are stale.
    pub position: DirtySet<EntityId>,
    /// Skeleton moved or rig binding changed.
    pub rigged: DirtySet<EntityId>,
    /// A texture id behind one of the entity's faces changed status.
    pub texture: DirtySet<EntityId>,
    /// Vertex data changed with counts and render state intact.
    pub mesh: DirtySet<EntityId>,
    /// Buffers and draws must be rebuilt from scratch.
    pub groups: DirtySet<GroupId>,
}

impl DirtyQueues {
    pub fn forget(&mut self, entity: EntityId) {
        self.create.remove(&entity);
        self.lod.remove(&entity);
        self.position.remove(&entity);
        self.rigged.remove(&entity);
        self.texture.remove(&entity);
        self.mesh.remove(&entity);
    }
}
