//! Skinning of rigged meshes against a sampled skeleton pose.

mod deformer;
mod error;
mod palette;

pub use deformer::{RiggedDeformer, RiggedVolume, SkinOutcome};
pub use error::SkinError;
pub use palette::{SkeletonPose, SkinInfo, build_palette, skin_matrix};
