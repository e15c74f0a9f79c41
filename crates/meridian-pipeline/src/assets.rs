//! Resolving entity assets against the providers: volumes, textures, and
//! per-face importance.

use std::sync::Arc;

use meridian_batch::{FaceGeometry, FaceKey, GeometrySource};
use meridian_lod::{nearest_available, projected_pixel_area, texture_virtual_size};
use meridian_math::EntityId;
use meridian_volume::{
    Shape, TextureEntry, TextureId, Volume, VolumeError, VolumeFace, VolumeKey, VolumeManager,
    VolumeParams,
};
use rustc_hash::FxHashMap;

use crate::{Camera, Drawable, Issue, Providers, TextureStatus};

/// Why an entity is drawn with a placeholder volume.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AssetProblem {
    #[error("no level up to {lod} of the mesh is resident")]
    MissingMesh { lod: u8 },

    #[error("sculpt map {0:?} is not resident")]
    MissingSculptMap(TextureId),

    #[error(transparent)]
    Corrupt(#[from] VolumeError),
}

impl AssetProblem {
    pub fn issue(&self) -> Issue {
        match self {
            Self::MissingMesh { .. } => Issue::MissingMesh,
            Self::MissingSculptMap(_) => Issue::MissingSculptMap,
            Self::Corrupt(_) => Issue::CorruptGeometry,
        }
    }
}

/// Acquire the shared volume for `params` at `level` (or the nearest
/// resident mesh level). Placeholders are never published to the arena.
pub(crate) fn acquire_volume(
    volumes: &mut VolumeManager,
    params: VolumeParams,
    level: u8,
    providers: &Providers<'_>,
) -> Result<(VolumeKey, Arc<Volume>), AssetProblem> {
    match params.shape {
        Shape::Mesh(mesh) => {
            let lod = nearest_available(level, |l| providers.meshes.mesh_lod(mesh, l).is_some())
                .ok_or(AssetProblem::MissingMesh { lod: level })?;
            let key = VolumeKey::new(params, lod);
            let volume = volumes.acquire(key, || {
                let data = providers
                    .meshes
                    .mesh_lod(mesh, lod)
                    .ok_or(VolumeError::MissingMeshLod { mesh, lod })?;
                Volume::from_mesh(params, lod, &data)
            })?;
            Ok((key, volume))
        }
        Shape::Sculpt(texture) => {
            let key = VolumeKey::new(params, level);
            let map = match volumes.get(&key) {
                Some(_) => None,
                None => Some(
                    providers
                        .textures
                        .sculpt_map(texture)
                        .ok_or(AssetProblem::MissingSculptMap(texture))?,
                ),
            };
            let volume = volumes.acquire(key, || Volume::generate(params, level, map.as_ref()))?;
            Ok((key, volume))
        }
        Shape::Box | Shape::Cylinder | Shape::Sphere => {
            let key = VolumeKey::new(params, level);
            let volume = volumes.acquire(key, || Volume::generate(params, level, None))?;
            Ok((key, volume))
        }
    }
}

/// A face's texture as it will be drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedTexture {
    pub id: TextureId,
    pub has_alpha: bool,
    /// The provider gave up on it; schedule a retry.
    pub missing: bool,
}

pub(crate) fn resolve_texture(providers: &Providers<'_>, id: TextureId) -> ResolvedTexture {
    let placeholder = |missing| ResolvedTexture {
        id: TextureId::PLACEHOLDER,
        has_alpha: false,
        missing,
    };
    if id.is_placeholder() {
        return placeholder(false);
    }
    match providers.textures.texture(id) {
        TextureStatus::Ready(info) => ResolvedTexture {
            id,
            has_alpha: info.has_alpha,
            missing: false,
        },
        TextureStatus::Pending => placeholder(false),
        TextureStatus::Missing => placeholder(true),
    }
}

/// Substitute the placeholder for textures that cannot be sampled yet and
/// drop material maps that are not ready. Returns the resolved diffuse
/// texture.
pub(crate) fn resolve_entry(providers: &Providers<'_>, entry: &mut TextureEntry) -> ResolvedTexture {
    let resolved = resolve_texture(providers, entry.texture);
    entry.texture = resolved.id;
    if let Some(material) = &mut entry.material {
        for map in [&mut material.normal_map, &mut material.specular_map] {
            if let Some(id) = *map
                && !matches!(providers.textures.texture(id), TextureStatus::Ready(_))
            {
                *map = None;
            }
        }
    }
    resolved
}

/// Every texture a face samples.
pub(crate) fn textures_of(entry: &TextureEntry) -> impl Iterator<Item = TextureId> + '_ {
    let maps = entry
        .material
        .iter()
        .flat_map(|m| m.normal_map.into_iter().chain(m.specular_map));
    std::iter::once(entry.texture)
        .chain(maps)
        .filter(|id| !id.is_placeholder())
}

/// Camera distance and texture virtual size of one drawn face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FaceMetrics {
    pub distance: f32,
    pub virtual_size: f32,
}

pub(crate) fn face_metrics(drawable: &Drawable, camera: &Camera) -> Vec<FaceMetrics> {
    let (faces, bake, model) = drawable.render_faces();
    let to_world = model.unwrap_or(bake);
    let bounds = drawable.world_bounds();
    let area = projected_pixel_area(
        bounds.radius(),
        camera.distance_to(bounds.center()),
        camera.fov_y,
        camera.viewport_height,
    );
    let total = faces.iter().map(VolumeFace::vertex_count).sum::<usize>().max(1) as f32;
    faces
        .iter()
        .map(|face| FaceMetrics {
            distance: camera.distance_to(to_world.transform_point3(face.extents.center())),
            virtual_size: texture_virtual_size(area, face.vertex_count() as f32 / total),
        })
        .collect()
}

/// Face geometry straight out of the entities' volumes.
pub(crate) struct DrawableGeometry<'a> {
    pub drawables: &'a FxHashMap<EntityId, Drawable>,
}

impl GeometrySource for DrawableGeometry<'_> {
    fn face_geometry(&self, key: FaceKey) -> Option<FaceGeometry<'_>> {
        let drawable = self.drawables.get(&key.entity)?;
        let (faces, transform, _) = drawable.render_faces();
        let face = faces.get(usize::from(key.face))?;
        Some(FaceGeometry {
            positions: &face.positions,
            normals: &face.normals,
            uvs: &face.uvs,
            indices: &face.indices,
            transform,
        })
    }
}
