//! Arena identifiers shared by the pipeline crates.
//!
//! Ids are allocated monotonically and never reused, so a stale id simply
//! fails to resolve instead of aliasing a newer object.

use std::fmt;

/// Identifier of a renderable entity (drawable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identifier of a spatial group (octree node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

impl GroupId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Monotonic id source.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.bump())
    }

    pub fn next_group(&mut self) -> GroupId {
        GroupId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        // Zero is never handed out.
        self.next = self.next.max(1);
        let id = self.next;
        self.next += 1;
        id
    }
}
