use glam::Vec3;
use meridian_config::OctreeConfig;
use meridian_math::{Aabb, EntityId, Frustum, GroupId, IdAllocator};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::SpatialError;

/// Upper bound on consecutive root doublings for one insertion.
const MAX_ROOT_GROWTH: u32 = 24;

/// One octree node. Owns the entities placed directly in it.
#[derive(Debug, Clone)]
pub struct SpatialGroup {
    id: GroupId,
    center: Vec3,
    half_size: f32,
    parent: Option<GroupId>,
    children: [Option<GroupId>; 8],
    members: Vec<EntityId>,
    /// Union of member bounds.
    object_bounds: Aabb,
    /// Union of `object_bounds` over this node and all descendants.
    bounds: Aabb,
}

impl SpatialGroup {
    fn new(id: GroupId, center: Vec3, half_size: f32, parent: Option<GroupId>) -> Self {
        Self {
            id,
            center,
            half_size,
            parent,
            children: [None; 8],
            members: Vec::new(),
            object_bounds: Aabb::EMPTY,
            bounds: Aabb::EMPTY,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn object_bounds(&self) -> Aabb {
        self.object_bounds
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn children(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// The node's cube (not the loose bounds).
    pub fn cube(&self) -> Aabb {
        Aabb::from_center_half_extents(self.center, Vec3::splat(self.half_size))
    }

    /// True if an entity centered at `center` with `bin_radius` may live here.
    pub fn fits(&self, center: Vec3, bin_radius: f32) -> bool {
        bin_radius <= self.half_size && self.cube().contains_point(center)
    }

    fn octant_of(&self, p: Vec3) -> usize {
        (p.x >= self.center.x) as usize
            | ((p.y >= self.center.y) as usize) << 1
            | ((p.z >= self.center.z) as usize) << 2
    }

    fn child_center(&self, octant: usize) -> Vec3 {
        let q = self.half_size * 0.5;
        let pick = |bit: usize| if octant & bit != 0 { q } else { -q };
        self.center + Vec3::new(pick(1), pick(2), pick(4))
    }
}

#[derive(Debug, Clone, Copy)]
struct Element {
    bounds: Aabb,
    bin_radius: f32,
    /// `None` while quarantined for degenerate bounds.
    group: Option<GroupId>,
}

/// Result of [`Octree::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Placed(GroupId),
    /// Bounds were degenerate; the entity is tracked but not in any group.
    Quarantined,
}

/// Result of [`Octree::notify_moved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Still fits its group; bounds were updated in place.
    InPlace(GroupId),
    /// No longer fits; a partition move is pending.
    Queued(GroupId),
    /// Was quarantined and has been placed now that its bounds are valid.
    Restored(GroupId),
    Quarantined,
}

/// One applied partition move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionMove {
    pub entity: EntityId,
    pub from: Option<GroupId>,
    pub to: Option<GroupId>,
}

/// Loose octree of entities keyed by [`EntityId`].
///
/// Nodes live in an arena keyed by [`GroupId`]; parent/child links are ids,
/// never references.
pub struct Octree {
    max_capacity: usize,
    min_node_size: f32,
    /// Half size of the root before any growth; grown roots collapse back
    /// toward it.
    initial_half: f32,
    root: GroupId,
    groups: FxHashMap<GroupId, SpatialGroup>,
    elements: FxHashMap<EntityId, Element>,
    pending_moves: Vec<EntityId>,
    pending_set: FxHashSet<EntityId>,
    removed_groups: Vec<GroupId>,
    bounds_dirty: bool,
    ids: IdAllocator,
}

impl Octree {
    pub fn new(config: &OctreeConfig) -> Self {
        let mut ids = IdAllocator::new();
        let root = ids.next_group();
        let initial_half = config.initial_size.max(config.min_node_size);
        let mut groups = FxHashMap::default();
        groups.insert(root, SpatialGroup::new(root, Vec3::ZERO, initial_half, None));
        Self {
            max_capacity: config.max_capacity.max(1),
            min_node_size: config.min_node_size,
            initial_half,
            root,
            groups,
            elements: FxHashMap::default(),
            pending_moves: Vec::new(),
            pending_set: FxHashSet::default(),
            removed_groups: Vec::new(),
            bounds_dirty: false,
            ids,
        }
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    pub fn group(&self, id: GroupId) -> Option<&SpatialGroup> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &SpatialGroup> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of tracked entities, quarantined ones included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.elements.contains_key(&entity)
    }

    pub fn group_of(&self, entity: EntityId) -> Option<GroupId> {
        self.elements.get(&entity).and_then(|e| e.group)
    }

    pub fn entity_bounds(&self, entity: EntityId) -> Option<Aabb> {
        self.elements.get(&entity).map(|e| e.bounds)
    }

    pub fn entity_bin_radius(&self, entity: EntityId) -> Option<f32> {
        self.elements.get(&entity).map(|e| e.bin_radius)
    }

    pub fn is_quarantined(&self, entity: EntityId) -> bool {
        self.elements.get(&entity).is_some_and(|e| e.group.is_none())
    }

    pub fn pending_move_count(&self) -> usize {
        self.pending_moves.len()
    }

    /// Groups pruned since the last call. Owners of per-group state drop it.
    pub fn take_removed_groups(&mut self) -> Vec<GroupId> {
        std::mem::take(&mut self.removed_groups)
    }

    /// Insert an entity into the smallest existing node that fits it,
    /// creating a child only when the current node is at capacity.
    pub fn insert(
        &mut self,
        entity: EntityId,
        bounds: Aabb,
        bin_radius: f32,
    ) -> Result<InsertOutcome, SpatialError> {
        if self.elements.contains_key(&entity) {
            return Err(SpatialError::DuplicateEntity(entity));
        }
        let mut element = Element {
            bounds,
            bin_radius,
            group: None,
        };
        if bounds.is_degenerate() || !bin_radius.is_finite() {
            log::warn!("{entity} has degenerate bounds; excluded from the octree");
            self.elements.insert(entity, element);
            return Ok(InsertOutcome::Quarantined);
        }
        let group = match self.place(entity, &bounds, bin_radius) {
            Ok(group) => group,
            Err(err) => {
                log::warn!("{entity} could not be placed: {err}");
                self.elements.insert(entity, element);
                return Ok(InsertOutcome::Quarantined);
            }
        };
        element.group = Some(group);
        self.elements.insert(entity, element);
        Ok(InsertOutcome::Placed(group))
    }

    /// Remove an entity. Returns the group it was in, if any.
    pub fn remove(&mut self, entity: EntityId) -> Result<Option<GroupId>, SpatialError> {
        let element = self
            .elements
            .remove(&entity)
            .ok_or(SpatialError::UnknownEntity(entity))?;
        if self.pending_set.remove(&entity) {
            self.pending_moves.retain(|e| *e != entity);
        }
        if let Some(group) = element.group {
            self.detach(entity, group);
        }
        Ok(element.group)
    }

    /// Record new bounds for an entity.
    ///
    /// The entity never changes group here; if it no longer fits, a partition
    /// move is queued and its current group's bounds are widened to contain it
    /// until the move is processed.
    pub fn notify_moved(
        &mut self,
        entity: EntityId,
        bounds: Aabb,
        bin_radius: f32,
    ) -> Result<MoveOutcome, SpatialError> {
        let element = self
            .elements
            .get_mut(&entity)
            .ok_or(SpatialError::UnknownEntity(entity))?;
        element.bounds = bounds;
        element.bin_radius = bin_radius;
        let current = element.group;

        if bounds.is_degenerate() || !bin_radius.is_finite() {
            element.group = None;
            if let Some(group) = current {
                log::warn!("{entity} bounds became degenerate; excluded from {group}");
                self.detach(entity, group);
            }
            if self.pending_set.remove(&entity) {
                self.pending_moves.retain(|e| *e != entity);
            }
            return Ok(MoveOutcome::Quarantined);
        }

        let Some(group_id) = current else {
            return match self.place(entity, &bounds, bin_radius) {
                Ok(group) => {
                    if let Some(element) = self.elements.get_mut(&entity) {
                        element.group = Some(group);
                    }
                    log::debug!("{entity} restored into {group}");
                    Ok(MoveOutcome::Restored(group))
                }
                Err(_) => Ok(MoveOutcome::Quarantined),
            };
        };

        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(SpatialError::MissingGroup(group_id))?;
        group.object_bounds = group.object_bounds.union(&bounds);
        self.bounds_dirty = true;

        if group.fits(bounds.center(), bin_radius) {
            Ok(MoveOutcome::InPlace(group_id))
        } else {
            if self.pending_set.insert(entity) {
                self.pending_moves.push(entity);
            }
            Ok(MoveOutcome::Queued(group_id))
        }
    }

    /// Apply every queued partition move, in queue order.
    pub fn process_partition_moves(&mut self) -> Vec<PartitionMove> {
        let pending = std::mem::take(&mut self.pending_moves);
        self.pending_set.clear();
        let mut applied = Vec::with_capacity(pending.len());

        for entity in pending {
            let Some(element) = self.elements.get(&entity).copied() else {
                continue;
            };
            let Some(from) = element.group else {
                continue;
            };
            // A later move may have brought it back inside its group.
            if self
                .groups
                .get(&from)
                .is_some_and(|g| g.fits(element.bounds.center(), element.bin_radius))
            {
                continue;
            }
            self.detach(entity, from);
            let to = match self.place(entity, &element.bounds, element.bin_radius) {
                Ok(group) => Some(group),
                Err(err) => {
                    log::warn!("{entity} could not be re-placed: {err}");
                    None
                }
            };
            if let Some(element) = self.elements.get_mut(&entity) {
                element.group = to;
            }
            applied.push(PartitionMove {
                entity,
                from: Some(from),
                to,
            });
        }

        if !applied.is_empty() {
            log::debug!("applied {} partition moves", applied.len());
        }
        applied
    }

    /// Translate the whole tree, e.g. after a region crossing.
    pub fn notify_shifted(&mut self, offset: Vec3) {
        for group in self.groups.values_mut() {
            group.center += offset;
            if !group.object_bounds.is_empty() {
                group.object_bounds = group.object_bounds.translated(offset);
            }
            if !group.bounds.is_empty() {
                group.bounds = group.bounds.translated(offset);
            }
        }
        for element in self.elements.values_mut() {
            if element.bounds.is_finite() {
                element.bounds = element.bounds.translated(offset);
            }
        }
    }

    /// Recompute node bounds from member bounds, shrinking any bounds that
    /// were widened by moves.
    pub fn update_bounds(&mut self) {
        if !self.bounds_dirty {
            return;
        }
        // Parents are created before children and ids are monotonic, except
        // for grown roots. Sorting by depth handles both.
        let mut order: Vec<(u32, GroupId)> = self
            .groups
            .keys()
            .map(|id| (self.depth(*id), *id))
            .collect();
        order.sort_unstable_by(|a, b| b.cmp(a));

        for (_, id) in order {
            let Some(group) = self.groups.get(&id) else {
                continue;
            };
            let object_bounds = group
                .members
                .iter()
                .filter_map(|e| self.elements.get(e))
                .fold(Aabb::EMPTY, |acc, e| acc.union(&e.bounds));
            let bounds = group
                .children()
                .filter_map(|c| self.groups.get(&c))
                .fold(object_bounds, |acc, c| acc.union(&c.bounds));
            if let Some(group) = self.groups.get_mut(&id) {
                group.object_bounds = object_bounds;
                group.bounds = bounds;
            }
        }
        self.bounds_dirty = false;
    }

    /// Groups with members whose bounds intersect the frustum, sorted by id.
    pub fn query_visible(&mut self, frustum: &Frustum) -> Vec<GroupId> {
        self.query_visible_with(frustum, |_, _| false)
    }

    /// Like [`Octree::query_visible`], dropping groups `occluded` reports as
    /// hidden.
    pub fn query_visible_with(
        &mut self,
        frustum: &Frustum,
        mut occluded: impl FnMut(GroupId, &Aabb) -> bool,
    ) -> Vec<GroupId> {
        self.update_bounds();
        let mut visible = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(group) = self.groups.get(&id) else {
                continue;
            };
            if group.bounds.is_empty() || !frustum.is_visible(&group.bounds) {
                continue;
            }
            if !group.members.is_empty()
                && frustum.is_visible(&group.object_bounds)
                && !occluded(id, &group.object_bounds)
            {
                visible.push(id);
            }
            stack.extend(group.children());
        }
        visible.sort_unstable();
        visible
    }

    /// Verify that every placed entity is a member of exactly one group and
    /// that the group's object bounds contain it.
    pub fn check_invariants(&self) -> Result<(), SpatialError> {
        let mut seen: FxHashMap<EntityId, GroupId> = FxHashMap::default();
        for group in self.groups.values() {
            for entity in &group.members {
                if let Some(other) = seen.insert(*entity, group.id) {
                    return Err(SpatialError::Invariant(format!(
                        "{entity} is a member of both {other} and {}",
                        group.id
                    )));
                }
            }
        }
        for (entity, element) in &self.elements {
            match (element.group, seen.get(entity)) {
                (Some(expected), Some(actual)) if expected == *actual => {
                    let group = self
                        .groups
                        .get(&expected)
                        .ok_or(SpatialError::MissingGroup(expected))?;
                    if !group.object_bounds.contains(&element.bounds) {
                        return Err(SpatialError::Invariant(format!(
                            "{expected} bounds do not contain {entity}"
                        )));
                    }
                }
                (None, None) => {}
                (expected, actual) => {
                    return Err(SpatialError::Invariant(format!(
                        "{entity} recorded in {expected:?} but found in {actual:?}"
                    )));
                }
            }
        }
        if seen.len() != self.elements.values().filter(|e| e.group.is_some()).count() {
            return Err(SpatialError::Invariant(
                "group membership lists reference unknown entities".to_string(),
            ));
        }
        Ok(())
    }

    // --- internals ---

    fn depth(&self, mut id: GroupId) -> u32 {
        let mut depth = 0;
        while let Some(parent) = self.groups.get(&id).and_then(|g| g.parent) {
            depth += 1;
            id = parent;
        }
        depth
    }

    fn place(
        &mut self,
        entity: EntityId,
        bounds: &Aabb,
        bin_radius: f32,
    ) -> Result<GroupId, SpatialError> {
        let center = bounds.center();
        self.ensure_root_contains(entity, center, bin_radius)?;

        let mut current = self.root;
        loop {
            let group = self
                .groups
                .get(&current)
                .ok_or(SpatialError::MissingGroup(current))?;
            let child_half = group.half_size * 0.5;
            if bin_radius > child_half || child_half < self.min_node_size {
                break;
            }
            let octant = group.octant_of(center);
            if let Some(child) = group.children[octant] {
                current = child;
                continue;
            }
            if group.members.len() < self.max_capacity {
                break;
            }
            current = self.create_child(current, octant)?;
        }

        let group = self
            .groups
            .get_mut(&current)
            .ok_or(SpatialError::MissingGroup(current))?;
        group.members.push(entity);
        group.object_bounds = group.object_bounds.union(bounds);
        self.bounds_dirty = true;
        Ok(current)
    }

    /// Grow the root toward `center` until an entity there fits. The
    /// growth is planned first, so an entity out of reach leaves the tree
    /// untouched.
    fn ensure_root_contains(
        &mut self,
        entity: EntityId,
        center: Vec3,
        bin_radius: f32,
    ) -> Result<(), SpatialError> {
        let root = self
            .groups
            .get(&self.root)
            .ok_or(SpatialError::MissingGroup(self.root))?;
        let mut steps = Vec::new();
        let mut plan = SpatialGroup::new(self.root, root.center, root.half_size, None);
        while !plan.fits(center, bin_radius) {
            if steps.len() >= MAX_ROOT_GROWTH as usize {
                return Err(SpatialError::OutOfRange(entity));
            }
            let sign = Vec3::select((center - plan.center).cmpge(Vec3::ZERO), Vec3::ONE, Vec3::NEG_ONE);
            plan.center += sign * plan.half_size;
            plan.half_size *= 2.0;
            steps.push((plan.center, plan.half_size));
        }

        for (new_center, new_half) in steps {
            let old_root = self.root;
            let old_center = self
                .groups
                .get(&old_root)
                .map(|g| g.center)
                .ok_or(SpatialError::MissingGroup(old_root))?;
            let new_root = self.ids.next_group();
            let mut group = SpatialGroup::new(new_root, new_center, new_half, None);
            group.children[group.octant_of(old_center)] = Some(old_root);
            if let Some(old) = self.groups.get_mut(&old_root) {
                old.parent = Some(new_root);
            }
            self.groups.insert(new_root, group);
            self.root = new_root;
            self.bounds_dirty = true;
            log::debug!("octree root grew to half size {new_half}");
        }
        Ok(())
    }

    fn create_child(&mut self, parent: GroupId, octant: usize) -> Result<GroupId, SpatialError> {
        let id = self.ids.next_group();
        let group = self
            .groups
            .get_mut(&parent)
            .ok_or(SpatialError::MissingGroup(parent))?;
        let child = SpatialGroup::new(
            id,
            group.child_center(octant),
            group.half_size * 0.5,
            Some(parent),
        );
        group.children[octant] = Some(id);
        self.groups.insert(id, child);
        Ok(id)
    }

    fn detach(&mut self, entity: EntityId, group_id: GroupId) {
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.members.retain(|e| *e != entity);
        }
        self.bounds_dirty = true;
        self.prune(group_id);
    }

    /// Remove empty leaves, walking toward the root, then undo root growth
    /// that no longer holds anything.
    fn prune(&mut self, mut id: GroupId) {
        while id != self.root {
            let Some(group) = self.groups.get(&id) else {
                break;
            };
            if !group.members.is_empty() || !group.is_leaf() {
                break;
            }
            let parent = group.parent;
            self.groups.remove(&id);
            self.removed_groups.push(id);
            let Some(parent) = parent else {
                break;
            };
            if let Some(p) = self.groups.get_mut(&parent) {
                for slot in p.children.iter_mut() {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
            id = parent;
        }
        self.collapse_root();
    }

    /// Hand the root role down while a grown root is empty and has a single
    /// child.
    fn collapse_root(&mut self) {
        loop {
            let Some(root) = self.groups.get(&self.root) else {
                return;
            };
            if root.half_size <= self.initial_half || !root.members.is_empty() {
                return;
            }
            let child = {
                let mut children = root.children();
                let (Some(child), None) = (children.next(), children.next()) else {
                    return;
                };
                child
            };
            let old = self.root;
            self.groups.remove(&old);
            self.removed_groups.push(old);
            if let Some(group) = self.groups.get_mut(&child) {
                group.parent = None;
            }
            self.root = child;
            self.bounds_dirty = true;
            log::debug!("octree root collapsed into {child}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn small_config() -> OctreeConfig {
        OctreeConfig {
            max_capacity: 2,
            min_node_size: 1.0,
            initial_size: 64.0,
            ..Default::default()
        }
    }

    fn cube_at(p: Vec3, half: f32) -> Aabb {
        Aabb::from_center_half_extents(p, Vec3::splat(half))
    }

    fn id(n: u64) -> EntityId {
        EntityId::new(n)
    }

    #[test]
    fn test_insert_places_in_root_until_full() {
        let mut tree = Octree::new(&small_config());
        let root = tree.root();
        assert_eq!(
            tree.insert(id(1), cube_at(Vec3::splat(5.0), 0.5), 0.5),
            Ok(InsertOutcome::Placed(root))
        );
        assert_eq!(
            tree.insert(id(2), cube_at(Vec3::splat(-5.0), 0.5), 0.5),
            Ok(InsertOutcome::Placed(root))
        );
        let third = tree.insert(id(3), cube_at(Vec3::splat(6.0), 0.5), 0.5).unwrap();
        let InsertOutcome::Placed(group) = third else {
            panic!("expected placement");
        };
        assert_ne!(group, root);
        assert_eq!(tree.group(group).unwrap().parent(), Some(root));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_large_bin_radius_stays_high() {
        let mut tree = Octree::new(&small_config());
        for n in 0..4 {
            tree.insert(id(n), cube_at(Vec3::splat(1.0 + n as f32), 0.5), 0.5)
                .unwrap();
        }
        let outcome = tree.insert(id(10), cube_at(Vec3::splat(2.0), 40.0), 40.0);
        assert_eq!(outcome, Ok(InsertOutcome::Placed(tree.root())));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::ZERO, 1.0), 1.0).unwrap();
        assert_eq!(
            tree.insert(id(1), cube_at(Vec3::ZERO, 1.0), 1.0),
            Err(SpatialError::DuplicateEntity(id(1)))
        );
    }

    #[test]
    fn test_degenerate_bounds_quarantined_then_restored() {
        let mut tree = Octree::new(&small_config());
        let nan = Aabb {
            min: Vec3::splat(f32::NAN),
            max: Vec3::ONE,
        };
        assert_eq!(tree.insert(id(1), nan, 1.0), Ok(InsertOutcome::Quarantined));
        assert!(tree.is_quarantined(id(1)));
        assert_eq!(tree.group_of(id(1)), None);
        tree.check_invariants().unwrap();

        let point = Aabb::new(Vec3::ONE, Vec3::ONE);
        assert_eq!(tree.notify_moved(id(1), point, 1.0), Ok(MoveOutcome::Quarantined));

        let outcome = tree.notify_moved(id(1), cube_at(Vec3::ONE, 1.0), 1.0).unwrap();
        assert!(matches!(outcome, MoveOutcome::Restored(_)));
        assert!(!tree.is_quarantined(id(1)));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_inside_group_updates_in_place() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::splat(2.0), 0.5), 0.5).unwrap();
        let outcome = tree.notify_moved(id(1), cube_at(Vec3::splat(3.0), 0.5), 0.5);
        assert_eq!(outcome, Ok(MoveOutcome::InPlace(tree.root())));
        assert_eq!(tree.pending_move_count(), 0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_out_of_group_is_deferred() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::splat(5.0), 0.5), 0.5).unwrap();
        tree.insert(id(2), cube_at(Vec3::splat(-5.0), 0.5), 0.5).unwrap();
        let InsertOutcome::Placed(child) =
            tree.insert(id(3), cube_at(Vec3::splat(6.0), 0.5), 0.5).unwrap()
        else {
            panic!("expected placement");
        };

        // Leaves the +++ octant.
        let target = cube_at(Vec3::new(-20.0, 6.0, 6.0), 0.5);
        assert_eq!(tree.notify_moved(id(3), target, 0.5), Ok(MoveOutcome::Queued(child)));
        // Still in the old group, which now contains the new bounds.
        assert_eq!(tree.group_of(id(3)), Some(child));
        tree.check_invariants().unwrap();

        let moves = tree.process_partition_moves();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].from, Some(child));
        assert_ne!(moves[0].to, Some(child));
        assert!(tree.take_removed_groups().contains(&child));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_repeated_moves_queue_once() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::ZERO, 0.5), 0.5).unwrap();
        for step in 0..5 {
            let far = cube_at(Vec3::splat(100.0 + step as f32), 0.5);
            tree.notify_moved(id(1), far, 0.5).unwrap();
        }
        assert_eq!(tree.pending_move_count(), 1);
        let moves = tree.process_partition_moves();
        assert_eq!(moves.len(), 1);
        assert!(tree.group(tree.root()).unwrap().fits(Vec3::splat(104.0), 0.5));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_root_grows_toward_outlier() {
        let mut tree = Octree::new(&small_config());
        let old_root = tree.root();
        tree.insert(id(1), cube_at(Vec3::new(500.0, 0.0, 0.0), 1.0), 1.0)
            .unwrap();
        assert_ne!(tree.root(), old_root);
        let root = tree.group(tree.root()).unwrap();
        assert!(root.cube().contains_point(Vec3::new(500.0, 0.0, 0.0)));
        assert!(tree.group(old_root).unwrap().parent().is_some());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_unreachable_entity_leaves_tree_untouched() {
        let mut tree = Octree::new(&small_config());
        let root = tree.root();
        for n in 0..6 {
            let far = Vec3::splat(1e12 + n as f32 * 1e11);
            let outcome = tree.insert(id(n), cube_at(far, 1e6), 1.0).unwrap();
            assert_eq!(outcome, InsertOutcome::Quarantined);
        }
        assert_eq!(tree.group_count(), 1);
        assert_eq!(tree.root(), root);
        assert_eq!(tree.group(root).unwrap().half_size(), 64.0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_grown_root_collapses_after_outlier_leaves() {
        let mut tree = Octree::new(&small_config());
        let root = tree.root();
        tree.insert(id(1), cube_at(Vec3::ZERO, 1.0), 1.0).unwrap();
        tree.insert(id(2), cube_at(Vec3::new(500.0, 0.0, 0.0), 1.0), 1.0)
            .unwrap();
        assert_ne!(tree.root(), root);
        assert!(tree.group_count() > 1);

        tree.remove(id(2)).unwrap();
        assert_eq!(tree.root(), root);
        assert_eq!(tree.group_count(), 1);
        assert_eq!(tree.group(root).unwrap().parent(), None);
        assert_eq!(tree.group_of(id(1)), Some(root));
        assert_eq!(tree.take_removed_groups().len(), 3);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_prunes_empty_children() {
        let mut tree = Octree::new(&small_config());
        for n in 0..6 {
            let p = Vec3::splat(4.0 + n as f32);
            tree.insert(id(n), cube_at(p, 0.25), 0.25).unwrap();
        }
        assert!(tree.group_count() > 1);
        for n in 0..6 {
            tree.remove(id(n)).unwrap();
        }
        assert_eq!(tree.group_count(), 1);
        assert!(tree.is_empty());
        assert_eq!(tree.remove(id(0)), Err(SpatialError::UnknownEntity(id(0))));
    }

    #[test]
    fn test_update_bounds_shrinks_after_move() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::ZERO, 1.0), 1.0).unwrap();
        tree.notify_moved(id(1), cube_at(Vec3::splat(2.0), 1.0), 1.0)
            .unwrap();
        tree.update_bounds();
        let root = tree.group(tree.root()).unwrap();
        assert_eq!(root.object_bounds(), cube_at(Vec3::splat(2.0), 1.0));
    }

    #[test]
    fn test_query_visible_culls_groups_behind_camera() {
        let mut tree = Octree::new(&OctreeConfig {
            max_capacity: 1,
            ..small_config()
        });
        tree.insert(id(1), cube_at(Vec3::new(0.0, 0.0, -20.0), 1.0), 1.0)
            .unwrap();
        tree.insert(id(2), cube_at(Vec3::new(0.0, 0.0, 20.0), 1.0), 1.0)
            .unwrap();
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 500.0);
        let frustum = Frustum::from_view_projection(&(proj * view));

        let visible = tree.query_visible(&frustum);
        assert_eq!(visible.len(), 1);
        assert_eq!(Some(visible[0]), tree.group_of(id(1)));

        let all = tree.query_visible(&Frustum::everything());
        assert_eq!(all.len(), 2);

        let none = tree.query_visible_with(&Frustum::everything(), |_, _| true);
        assert!(none.is_empty());
    }

    #[test]
    fn test_shift_translates_everything() {
        let mut tree = Octree::new(&small_config());
        tree.insert(id(1), cube_at(Vec3::splat(3.0), 1.0), 1.0).unwrap();
        tree.notify_shifted(Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(
            tree.entity_bounds(id(1)),
            Some(cube_at(Vec3::new(13.0, 3.0, 3.0), 1.0))
        );
        assert_eq!(tree.group(tree.root()).unwrap().center(), Vec3::new(10.0, 0.0, 0.0));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_partition_invariant_after_mixed_operations() {
        let mut tree = Octree::new(&small_config());
        let mut seed = 7u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((seed >> 8) % 200) as f32 - 100.0
        };
        for n in 0..40 {
            let p = Vec3::new(next(), next(), next());
            tree.insert(id(n), cube_at(p, 0.5), 0.5).unwrap();
        }
        for n in (0..40).step_by(3) {
            tree.remove(id(n)).unwrap();
        }
        for n in (1..40).step_by(3) {
            let p = Vec3::new(next(), next(), next());
            tree.notify_moved(id(n), cube_at(p, 0.5), 0.5).unwrap();
        }
        tree.check_invariants().unwrap();
        tree.process_partition_moves();
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 40 - 14);
    }
}
