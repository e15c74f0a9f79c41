//! Per-pipeline render state passed explicitly through every phase.

use meridian_config::Config;
use meridian_math::EntityId;
use rustc_hash::FxHashSet;

/// Optional pipeline feature that can be switched off at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    TextureBatching,
    Skinning,
}

/// Why the renderer gave up a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradedReason {
    /// The buffer arena could not satisfy a group rebuild.
    ArenaExhausted,
    /// Skinning failed more often than `skin.max_failures_before_disable`.
    SkinningFailures,
}

impl DegradedReason {
    pub fn feature(self) -> Feature {
        match self {
            Self::ArenaExhausted => Feature::TextureBatching,
            Self::SkinningFailures => Feature::Skinning,
        }
    }
}

/// Recoverable problem reported at most once per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Issue {
    MissingTexture,
    MissingMesh,
    MissingSculptMap,
    CorruptGeometry,
    Skinning,
    DegenerateBounds,
}

/// Configuration, feature switches, degraded state, and the log-once set.
#[derive(Debug)]
pub struct RenderContext {
    config: Config,
    frame: u64,
    texture_batching: bool,
    skinning: bool,
    degraded: Vec<DegradedReason>,
    reported: FxHashSet<(EntityId, Issue)>,
}

impl RenderContext {
    pub fn new(config: Config) -> Self {
        Self {
            texture_batching: config.batch.texture_batching,
            skinning: config.skin.enabled,
            config,
            frame: 0,
            degraded: Vec::new(),
            reported: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of the frame in progress (or last finished). Starts at 1.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::TextureBatching => self.texture_batching,
            Feature::Skinning => self.skinning,
        }
    }

    pub fn set_enabled(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::TextureBatching => self.texture_batching = enabled,
            Feature::Skinning => self.skinning = enabled,
        }
    }

    /// Raise a degraded signal and switch off the offending feature.
    /// Returns false if the signal was already raised.
    pub fn degrade(&mut self, reason: DegradedReason) -> bool {
        if self.degraded.contains(&reason) {
            return false;
        }
        let feature = reason.feature();
        log::error!("renderer degraded ({reason:?}); disabling {feature:?}");
        self.set_enabled(feature, false);
        self.degraded.push(reason);
        true
    }

    pub fn degraded(&self) -> &[DegradedReason] {
        &self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// True the first time `issue` is reported for `entity`.
    pub fn first_report(&mut self, entity: EntityId, issue: Issue) -> bool {
        self.reported.insert((entity, issue))
    }

    /// Allow `issue` to be reported again once it was resolved.
    pub(crate) fn resolved(&mut self, entity: EntityId, issue: Issue) {
        self.reported.remove(&(entity, issue));
    }

    pub(crate) fn forget(&mut self, entity: EntityId) {
        self.reported.retain(|(e, _)| *e != entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrade_disables_feature_once() {
        let mut ctx = RenderContext::new(Config::default());
        assert!(ctx.is_enabled(Feature::TextureBatching));
        assert!(ctx.degrade(DegradedReason::ArenaExhausted));
        assert!(!ctx.degrade(DegradedReason::ArenaExhausted));
        assert!(!ctx.is_enabled(Feature::TextureBatching));
        assert!(ctx.is_enabled(Feature::Skinning));
        assert_eq!(ctx.degraded(), &[DegradedReason::ArenaExhausted]);
    }

    #[test]
    fn test_first_report_is_per_entity_and_issue() {
        let mut ctx = RenderContext::new(Config::default());
        let e = EntityId(1);
        assert!(ctx.first_report(e, Issue::MissingTexture));
        assert!(!ctx.first_report(e, Issue::MissingTexture));
        assert!(ctx.first_report(e, Issue::Skinning));
        assert!(ctx.first_report(EntityId(2), Issue::MissingTexture));
        ctx.resolved(e, Issue::MissingTexture);
        assert!(ctx.first_report(e, Issue::MissingTexture));
        ctx.forget(e);
        assert!(ctx.first_report(e, Issue::Skinning));
    }

    #[test]
    fn test_config_switches_seed_features() {
        let mut config = Config::default();
        config.skin.enabled = false;
        let ctx = RenderContext::new(config);
        assert!(!ctx.is_enabled(Feature::Skinning));
        assert_eq!(ctx.frame(), 0);
    }
}
