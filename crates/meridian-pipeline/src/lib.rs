//! Per-frame orchestration of the volume render pipeline.
//!
//! [`Pipeline::update`] runs five phases in a fixed order each frame:
//!
//! 1. **Cull**: apply queued partition moves and query the octree for
//!    visible groups.
//! 2. **LOD update**: re-select detail for visible entities and request
//!    levels that are not resident.
//! 3. **Create**: place newly created entities in the octree.
//! 4. **Rebuild geometry**: rebuild volumes (priority lane in full, normal
//!    lane within budget), refresh moved entities, and skin rigged ones.
//! 5. **Generate draw info**: rebuild or patch dirty visible groups and
//!    assemble the draw lists, alpha sorted back to front.
//!
//! Each phase drains its dirty queue up front, so work marked while it runs
//! lands in the next frame.

mod assets;
mod camera;
mod context;
mod dirty;
mod drawable;
mod error;
mod frame;
pub mod memory;
mod orchestrator;
mod output;
mod provider;
mod rebuild_queue;

#[cfg(test)]
mod scenario_tests;

pub use camera::Camera;
pub use context::{DegradedReason, Feature, Issue, RenderContext};
pub use dirty::DirtySet;
pub use drawable::{Drawable, EntityDesc, Motion};
pub use error::PipelineError;
pub use memory::{MemoryMeshes, MemorySkeletons, MemoryTextures};
pub use orchestrator::Pipeline;
pub use output::{FrameStats, RenderLists};
pub use provider::{
    MeshProvider, Providers, SkeletonId, SkeletonProvider, StreamEvent, TextureInfo,
    TextureProvider, TextureStatus,
};
pub use rebuild_queue::{Lane, RebuildQueue};
