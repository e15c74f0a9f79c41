//! Level-of-detail selection for volume entities.
//!
//! Levels run from 0 (coarsest) to [`MAX_LOD`] (full detail). Selection is a
//! pure function of camera distance and object radius; [`LodState`] adds the
//! debounce and the fallback to whichever levels are actually resident.

mod importance;
mod selector;

pub use importance::{projected_pixel_area, texture_virtual_size};
pub use selector::{LodChange, LodSelector, LodState, MAX_LOD, nearest_available};
