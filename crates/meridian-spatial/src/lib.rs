//! Loose octree partition of renderable entities.
//!
//! Each octree node is a *spatial group*: the unit of culling and of geometry
//! batching. Entities carry a bin radius that decides how deep in the tree they
//! may live. Moves that leave a node are queued and applied in one batch per
//! frame by [`Octree::process_partition_moves`].

mod bin_radius;
mod error;
mod octree;

pub use bin_radius::{BinShape, bin_radius};
pub use error::SpatialError;
pub use octree::{InsertOutcome, MoveOutcome, Octree, PartitionMove, SpatialGroup};
