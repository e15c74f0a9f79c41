//! Screen-space LOD selection with a close-up ramp, debounce, and fallback to
//! resident levels.

use meridian_config::LodConfig;
use meridian_math::round_to;

/// Highest (most detailed) level.
pub const MAX_LOD: u8 = 3;

/// Per-entity LOD bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LodState {
    /// Level currently rendered.
    pub level: u8,
    /// Level the selector asked for last time.
    pub desired: u8,
    /// `level` is a fallback below `desired`; re-evaluate when more detail
    /// becomes resident.
    pub awaiting_upgrade: bool,
}

/// Outcome of [`LodSelector::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodChange {
    Unchanged,
    Changed { from: u8, to: u8 },
    /// No level is resident at all; the caller renders a placeholder.
    Unavailable,
}

/// Selects detail levels from camera distance and object radius.
#[derive(Debug, Clone)]
pub struct LodSelector {
    config: LodConfig,
}

impl LodSelector {
    pub fn new(config: LodConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Distance after the global distance factor, the close-up ramp, and the
    /// fixed field-of-view compensation, rounded to hundredths.
    ///
    /// Inside the ramp distance (`2 * lod_factor`) the distance is squashed
    /// quadratically, so very near objects keep full detail longer.
    pub fn effective_distance(&self, distance: f32) -> f32 {
        if !distance.is_finite() {
            return f32::MAX;
        }
        let mut d = distance.max(0.0) * self.config.distance_factor;
        let ramp = self.config.lod_factor * 2.0;
        if ramp > 0.0 && d < ramp {
            d /= ramp;
            d *= d;
            d *= ramp;
        }
        d *= std::f32::consts::PI / 3.0;
        round_to(d, 0.01)
    }

    /// Level for an object of `radius` at raw camera `distance`.
    ///
    /// Rigged entities pass their skeleton's distance and bin radius here,
    /// since their own bounds are not meaningful before skinning.
    pub fn select_lod(&self, distance: f32, radius: f32) -> u8 {
        if let Some(forced) = self.config.force_lod {
            return forced.min(MAX_LOD);
        }
        let radius = if radius.is_finite() {
            round_to(radius.max(0.0), 0.01)
        } else {
            0.0
        };
        self.detail_for(self.effective_distance(distance), radius)
    }

    fn detail_for(&self, distance: f32, radius: f32) -> u8 {
        let factor = self.config.lod_factor;
        if !self.config.dynamic_lod {
            let level = (radius.sqrt() * factor * 4.0).floor();
            return level.clamp(0.0, MAX_LOD as f32) as u8;
        }
        if distance <= 0.0 {
            return MAX_LOD;
        }
        let tan_angle = round_to(factor * radius / distance, 0.01);
        let mut detail = 0u8;
        while detail < MAX_LOD && tan_angle > self.config.detail_thresholds[detail as usize] {
            detail += 1;
        }
        detail
    }

    /// Re-evaluate `state` for the current view.
    ///
    /// The desired level is mapped to the nearest resident one; a change is
    /// only reported when the rendered level actually differs.
    pub fn update(
        &self,
        state: &mut LodState,
        distance: f32,
        radius: f32,
        resident: impl Fn(u8) -> bool,
    ) -> LodChange {
        let desired = self.select_lod(distance, radius);
        self.apply(state, desired, resident)
    }

    /// Like [`LodSelector::update`] for an already computed desired level.
    pub fn apply(&self, state: &mut LodState, desired: u8, resident: impl Fn(u8) -> bool) -> LodChange {
        state.desired = desired;
        let Some(level) = nearest_available(desired, resident) else {
            state.awaiting_upgrade = true;
            return LodChange::Unavailable;
        };
        state.awaiting_upgrade = level < desired;
        if level == state.level {
            return LodChange::Unchanged;
        }
        let from = state.level;
        state.level = level;
        log::trace!("lod {from} -> {level} (desired {desired})");
        LodChange::Changed { from, to: level }
    }
}

/// Nearest resident level to `desired`: itself, then lower levels, then higher.
pub fn nearest_available(desired: u8, resident: impl Fn(u8) -> bool) -> Option<u8> {
    let desired = desired.min(MAX_LOD);
    (0..=desired)
        .rev()
        .chain(desired + 1..=MAX_LOD)
        .find(|level| resident(*level))
}
