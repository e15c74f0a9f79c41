//! Entity rebuild queue with an unbounded priority lane and an
//! importance-ordered normal lane.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use meridian_math::EntityId;
use rustc_hash::FxHashMap;

use crate::DirtySet;

/// Which lane a rebuild request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Processed in full every frame (visible, newly created, LOD changed).
    Priority,
    /// Processed most important first, up to the per-frame budget.
    Normal,
}

#[derive(Clone, Debug)]
struct QueuedRebuild {
    entity: EntityId,
    importance: f32,
    /// Generation counter to handle stale entries after re-queueing.
    generation: u64,
}

impl PartialEq for QueuedRebuild {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRebuild {}

impl PartialOrd for QueuedRebuild {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRebuild {
    // Higher importance first; equal importance in queue order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.importance
            .total_cmp(&other.importance)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

#[derive(Debug, Default)]
pub struct RebuildQueue {
    priority: DirtySet<EntityId>,
    heap: BinaryHeap<QueuedRebuild>,
    /// Current generation of each entity in the normal lane.
    generations: FxHashMap<EntityId, u64>,
    next_generation: u64,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `entity`. A priority request supersedes a normal one; a normal
    /// request for an entity already in the priority lane is dropped, and a
    /// repeated normal request updates the importance.
    pub fn push(&mut self, entity: EntityId, lane: Lane, importance: f32) {
        match lane {
            Lane::Priority => {
                self.generations.remove(&entity);
                self.priority.insert(entity);
            }
            Lane::Normal => {
                if self.priority.contains(&entity) {
                    return;
                }
                let generation = self.next_generation;
                self.next_generation += 1;
                self.generations.insert(entity, generation);
                self.heap.push(QueuedRebuild {
                    entity,
                    importance: if importance.is_nan() { 0.0 } else { importance },
                    generation,
                });
            }
        }
    }

    /// Move a normal-lane entry to the priority lane. Returns false if the
    /// entity was not waiting in the normal lane.
    pub fn promote(&mut self, entity: EntityId) -> bool {
        if self.generations.remove(&entity).is_some() {
            self.priority.insert(entity);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, entity: EntityId) {
        self.priority.remove(&entity);
        self.generations.remove(&entity);
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.priority.contains(&entity) || self.generations.contains_key(&entity)
    }

    /// Drain the whole priority lane, then up to `normal_budget` normal
    /// entries. The rest of the normal lane carries over.
    pub fn take_batch(&mut self, normal_budget: usize) -> Vec<EntityId> {
        let mut batch = self.priority.take();
        let mut taken = 0;
        while taken < normal_budget
            && let Some(entity) = self.pop_normal()
        {
            batch.push(entity);
            taken += 1;
        }
        if self.heap.len() > self.generations.len().saturating_mul(2).max(64) {
            self.compact();
        }
        batch
    }

    fn pop_normal(&mut self) -> Option<EntityId> {
        while let Some(entry) = self.heap.pop() {
            if let Some(&current) = self.generations.get(&entry.entity)
                && current == entry.generation
            {
                self.generations.remove(&entry.entity);
                return Some(entry.entity);
            }
            // Stale entry, skip it
        }
        None
    }

    fn compact(&mut self) {
        let generations = &self.generations;
        self.heap
            .retain(|e| generations.get(&e.entity) == Some(&e.generation));
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    pub fn normal_len(&self) -> usize {
        self.generations.len()
    }

    pub fn len(&self) -> usize {
        self.priority_len() + self.normal_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
