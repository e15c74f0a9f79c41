//! Arena of shared volumes.
//!
//! Entities with identical [`VolumeParams`] at the same detail level share
//! one immutable [`Volume`]. A parameter change is a release of the old key
//! followed by an acquire of the new one.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{Volume, VolumeError, VolumeKey};

#[derive(Debug)]
struct SharedVolume {
    volume: Arc<Volume>,
    refs: u32,
}

/// Reference-counted store of published volumes.
#[derive(Debug, Default)]
pub struct VolumeManager {
    entries: FxHashMap<VolumeKey, SharedVolume>,
}

impl VolumeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the volume for `key`, building it on first use.
    ///
    /// A failed build leaves the arena unchanged.
    pub fn acquire(
        &mut self,
        key: VolumeKey,
        build: impl FnOnce() -> Result<Volume, VolumeError>,
    ) -> Result<Arc<Volume>, VolumeError> {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refs += 1;
            return Ok(Arc::clone(&entry.volume));
        }
        let volume = Arc::new(build()?);
        self.entries.insert(
            key,
            SharedVolume {
                volume: Arc::clone(&volume),
                refs: 1,
            },
        );
        log::trace!("published volume {key:?}");
        Ok(volume)
    }

    /// Drop one reference. Returns true when the volume was freed.
    pub fn release(&mut self, key: &VolumeKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            log::warn!("release of unknown volume {key:?}");
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.entries.remove(key);
            return true;
        }
        false
    }

    /// Publish new geometry under an existing key (e.g. a placeholder being
    /// replaced by the real asset). Existing holders keep their old `Arc`
    /// until they fetch again.
    pub fn republish(&mut self, key: &VolumeKey, volume: Volume) -> Option<Arc<Volume>> {
        let entry = self.entries.get_mut(key)?;
        entry.volume = Arc::new(volume);
        Some(Arc::clone(&entry.volume))
    }

    pub fn get(&self, key: &VolumeKey) -> Option<Arc<Volume>> {
        self.entries.get(key).map(|e| Arc::clone(&e.volume))
    }

    pub fn ref_count(&self, key: &VolumeKey) -> u32 {
        self.entries.get(key).map_or(0, |e| e.refs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
