use meridian_math::{EntityId, GroupId};

use crate::FaceKey;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BatchError {
    #[error("{group} needs {bytes} bytes of geometry, over the {limit} byte limit")]
    BufferOverflow { group: GroupId, bytes: u64, limit: u64 },

    #[error("buffer arena exhausted: {group} requested {requested} bytes, {available} available")]
    AllocationFailed {
        group: GroupId,
        requested: u64,
        available: u64,
    },

    #[error("geometry of {entity} is unusable: {reason}")]
    CorruptGeometry { entity: EntityId, reason: String },

    #[error("{0:?} has no slot in the group's buffers")]
    MissingSlot(FaceKey),

    #[error("{0:?} changed vertex or index count")]
    CountChanged(FaceKey),

    #[error("{0:?} changed render state")]
    StateChanged(FaceKey),
}

impl BatchError {
    /// True when the caller should rebuild the whole group instead.
    pub fn needs_full_rebuild(&self) -> bool {
        matches!(
            self,
            Self::MissingSlot(_) | Self::CountChanged(_) | Self::StateChanged(_)
        )
    }
}
