use meridian_math::EntityId;
use meridian_spatial::SpatialError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown {0}")]
    UnknownEntity(EntityId),

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}
