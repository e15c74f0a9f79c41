//! What one frame hands to the renderer, and what it cost.

use std::collections::BTreeMap;
use std::fmt;

use meridian_batch::{DrawInfo, RenderPassKind};
use meridian_math::EntityId;

/// Draw lists for the visible groups.
///
/// Opaque passes keep group order then buffer order; the alpha list spans all
/// groups and is sorted farthest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderLists {
    pub(crate) passes: BTreeMap<RenderPassKind, Vec<DrawInfo>>,
    pub(crate) alpha: Vec<DrawInfo>,
}

impl RenderLists {
    /// Draws of an opaque pass. [`RenderPassKind::Alpha`] returns the sorted
    /// alpha list.
    pub fn pass(&self, kind: RenderPassKind) -> &[DrawInfo] {
        if kind.is_alpha() {
            return &self.alpha;
        }
        self.passes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Opaque passes in pass order.
    pub fn opaque(&self) -> impl Iterator<Item = (RenderPassKind, &[DrawInfo])> {
        self.passes.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn alpha(&self) -> &[DrawInfo] {
        &self.alpha
    }

    pub fn draw_count(&self) -> usize {
        self.passes.values().map(Vec::len).sum::<usize>() + self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draw_count() == 0
    }

    /// True if any draw covers a face of `entity`.
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.passes
            .values()
            .flatten()
            .chain(&self.alpha)
            .any(|d| d.faces.iter().any(|f| f.entity == entity))
    }
}

/// Counters for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub visible_groups: usize,
    pub visible_entities: usize,
    pub partition_moves: usize,
    pub lod_changes: usize,
    pub created: usize,
    pub rebuilt_entities: usize,
    /// Normal-lane rebuilds carried over to the next frame.
    pub deferred_rebuilds: usize,
    pub placeholders: usize,
    pub skinned: usize,
    pub skin_failures: usize,
    pub rebuilt_groups: usize,
    pub partial_updates: usize,
    pub unbatched_fallbacks: usize,
    pub draws: BTreeMap<RenderPassKind, usize>,
    pub alpha_draws: usize,
    /// Decoded size of every texture sampled by a visible face.
    pub texture_bytes: u64,
}

impl FrameStats {
    pub fn total_draws(&self) -> usize {
        self.draws.values().sum::<usize>() + self.alpha_draws
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}: {} groups / {} entities visible, {} draws ({} alpha), \
             {} lod changes, {} entity rebuilds ({} deferred), {} group rebuilds, \
             {} partial, {} skinned, {} placeholders, {:.1} MiB textures",
            self.frame,
            self.visible_groups,
            self.visible_entities,
            self.total_draws(),
            self.alpha_draws,
            self.lod_changes,
            self.rebuilt_entities,
            self.deferred_rebuilds,
            self.rebuilt_groups,
            self.partial_updates,
            self.skinned,
            self.placeholders,
            self.texture_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}
