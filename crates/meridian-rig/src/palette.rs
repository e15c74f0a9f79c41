use glam::{Mat4, Vec3};
use meridian_volume::JointWeights;

use crate::SkinError;

/// Binding of a mesh to a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinInfo {
    /// Skeleton joint index for each skin joint.
    pub joint_map: Vec<usize>,
    /// Inverse bind matrix for each skin joint.
    pub inverse_bind: Vec<Mat4>,
    /// Applied to mesh vertices before skinning.
    pub bind_shape: Mat4,
}

impl SkinInfo {
    pub fn joint_count(&self) -> usize {
        self.joint_map.len()
    }
}

/// Joint world transforms sampled once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonPose {
    pub joints: Vec<Mat4>,
    /// World position of the skeleton root; used for LOD distance.
    pub root_position: Vec3,
    /// Bin radius of the skeleton; used as the LOD radius of attachments.
    pub bin_radius: f32,
}

/// Per-joint skinning matrices, at most `max_joints` long.
///
/// Joints the pose does not have fall back to identity.
pub fn build_palette(skin: &SkinInfo, pose: &SkeletonPose, max_joints: usize) -> Result<Vec<Mat4>, SkinError> {
    if skin.joint_map.len() != skin.inverse_bind.len() {
        return Err(SkinError::InconsistentSkin {
            joints: skin.joint_map.len(),
            inverse_binds: skin.inverse_bind.len(),
        });
    }
    let count = skin.joint_count().min(max_joints);
    if count == 0 {
        return Err(SkinError::EmptyPalette);
    }
    Ok(skin
        .joint_map
        .iter()
        .zip(&skin.inverse_bind)
        .take(count)
        .map(|(joint, inverse_bind)| {
            let world = pose.joints.get(*joint).copied().unwrap_or(Mat4::IDENTITY);
            world * *inverse_bind
        })
        .collect())
}

/// Blend up to four palette matrices.
///
/// Negative weights count as zero, joint indices are clamped to the palette,
/// and weights are normalized. All-zero weights put full weight on the first
/// influence.
pub fn skin_matrix(palette: &[Mat4], influence: &JointWeights) -> Mat4 {
    let Some(last) = palette.len().checked_sub(1) else {
        return Mat4::IDENTITY;
    };
    let weights = influence
        .weights
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
    let sum: f32 = weights.iter().sum();
    let joint = |k: usize| palette[(influence.joints[k] as usize).min(last)];

    if sum <= f32::EPSILON {
        return joint(0);
    }
    let mut blended = Mat4::ZERO;
    for (k, w) in weights.iter().enumerate() {
        if *w > 0.0 {
            blended += joint(k) * (*w / sum);
        }
    }
    blended
}
