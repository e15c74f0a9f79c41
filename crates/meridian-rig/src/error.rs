/// Skinning failures. The caller renders static geometry for the frame.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SkinError {
    #[error("face {face} has {weights} weights for {vertices} vertices")]
    WeightMismatch {
        face: usize,
        vertices: usize,
        weights: usize,
    },

    #[error("skin has no joints")]
    EmptyPalette,

    #[error("skin lists {joints} joints but {inverse_binds} inverse bind matrices")]
    InconsistentSkin { joints: usize, inverse_binds: usize },

    #[error("skinning produced non-finite positions in face {0}")]
    NonFinite(usize),
}
