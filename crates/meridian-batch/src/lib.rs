//! Face batching: packs visible volume faces of a spatial group into shared
//! vertex buffers and emits merged draw descriptors per render pass.

mod arena;
mod batcher;
mod classify;
mod draw_info;
mod error;
mod face;
mod pass;
mod vertex;

pub use arena::BufferArena;
pub use batcher::{FaceBatcher, FaceSlot, GeometryBuffer, GroupGeometry};
pub use classify::{Classification, FaceBucket, classify};
pub use draw_info::{BufferId, DrawInfo};
pub use error::BatchError;
pub use face::{BatchFace, FaceGeometry, FaceKey, GeometrySource};
pub use pass::{
    PassRegistry, PassSpec, RenderPassKind, ShaderProgram, ShaderVariant, alpha_merge_compatible,
    merge_compatible, select_shader,
};
pub use vertex::{BatchVertex, VertexFormatMask};
