use meridian_math::{EntityId, GroupId};

/// Errors reported by the spatial index.
///
/// None of these are fatal: callers either ignore the operation or treat
/// the entity as quarantined until its bounds are corrected.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SpatialError {
    #[error("{0} is not in the spatial index")]
    UnknownEntity(EntityId),

    #[error("{0} is already in the spatial index")]
    DuplicateEntity(EntityId),

    #[error("{0} has degenerate bounds")]
    DegenerateBounds(EntityId),

    #[error("{0} lies too far outside the root node to grow toward it")]
    OutOfRange(EntityId),

    #[error("{0} is referenced but missing from the node arena")]
    MissingGroup(GroupId),

    #[error("partition invariant violated: {0}")]
    Invariant(String),
}
