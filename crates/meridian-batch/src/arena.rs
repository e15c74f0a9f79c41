//! Byte accounting for merged group buffers.
//!
//! Buffer sizes are rounded up to power-of-two size classes so a rebuild that
//! grows a group slightly reuses the same class. The arena only tracks bytes;
//! device allocation belongs to the renderer.

use meridian_math::GroupId;
use rustc_hash::FxHashMap;

use crate::BatchError;

/// Smallest size class: 4 KB.
const MIN_CLASS: u64 = 4096;

/// Tracks bytes reserved per group against a global budget.
#[derive(Debug)]
pub struct BufferArena {
    budget: u64,
    in_use: u64,
    peak: u64,
    groups: FxHashMap<GroupId, u64>,
    failures: u64,
}

impl BufferArena {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            in_use: 0,
            peak: 0,
            groups: FxHashMap::default(),
            failures: 0,
        }
    }

    /// Size class holding `bytes`.
    pub fn class_size(bytes: u64) -> u64 {
        bytes.max(MIN_CLASS).next_power_of_two()
    }

    /// Replace `group`'s reservation with buffers of the given byte sizes.
    /// On failure the previous reservation is kept.
    pub fn reserve(&mut self, group: GroupId, buffers: impl IntoIterator<Item = u64>) -> Result<u64, BatchError> {
        let requested: u64 = buffers.into_iter().map(Self::class_size).sum();
        let current = self.groups.get(&group).copied().unwrap_or(0);
        let others = self.in_use - current;
        if others + requested > self.budget {
            self.failures += 1;
            return Err(BatchError::AllocationFailed {
                group,
                requested,
                available: self.budget.saturating_sub(others),
            });
        }
        self.in_use = others + requested;
        self.peak = self.peak.max(self.in_use);
        self.groups.insert(group, requested);
        Ok(requested)
    }

    /// Drop `group`'s reservation, returning the freed bytes.
    pub fn release(&mut self, group: GroupId) -> u64 {
        let freed = self.groups.remove(&group).unwrap_or(0);
        self.in_use -= freed;
        freed
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn in_use(&self) -> u64 {
        self.in_use
    }

    pub fn available(&self) -> u64 {
        self.budget.saturating_sub(self.in_use)
    }

    pub fn peak(&self) -> u64 {
        self.peak
    }

    pub fn group_bytes(&self, group: GroupId) -> u64 {
        self.groups.get(&group).copied().unwrap_or(0)
    }

    /// Number of rejected reservations so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }
}
