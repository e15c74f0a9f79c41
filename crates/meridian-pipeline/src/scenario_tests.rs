//! Frame-level behaviour of the pipeline against in-memory providers.

use glam::{Mat4, Vec3, Vec4};
use meridian_batch::{FaceKey, RenderPassKind};
use meridian_config::Config;
use meridian_rig::{SkeletonPose, SkinInfo};
use meridian_volume::{
    JointWeights, MeshId, MeshLodData, Shape, TextureEntry, TextureId, VolumeKey, VolumeParams, generate_box,
};

use crate::{
    Camera, DegradedReason, EntityDesc, Feature, MemoryMeshes, MemorySkeletons, MemoryTextures,
    Motion, Pipeline, PipelineError, Providers, RenderLists, SkeletonId, StreamEvent, TextureInfo,
    TextureStatus,
};

const TEX: TextureId = TextureId(1);

struct World {
    textures: MemoryTextures,
    meshes: MemoryMeshes,
    skeletons: MemorySkeletons,
}

impl World {
    fn new() -> Self {
        let mut textures = MemoryTextures::new();
        textures.insert(TEX, TextureInfo::new(256, 256, false));
        Self {
            textures,
            meshes: MemoryMeshes::new(),
            skeletons: MemorySkeletons::new(),
        }
    }

    fn providers(&self) -> Providers<'_> {
        Providers::new(&self.textures, &self.meshes, &self.skeletons)
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.lod.force_lod = Some(0);
    config
}

fn boxed(x: f32) -> EntityDesc {
    EntityDesc::new(
        0,
        VolumeParams::new(Shape::Box),
        Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
    )
    .with_texture(TextureEntry::new(TEX))
}

fn camera() -> Camera {
    Camera::unculled(Vec3::new(0.0, -20.0, 0.0))
}

fn step(pipeline: &mut Pipeline, world: &World) -> RenderLists {
    pipeline.update(&camera(), &world.providers()).clone()
}

fn run(pipeline: &mut Pipeline, world: &World, frames: usize) -> RenderLists {
    let mut lists = RenderLists::default();
    for _ in 0..frames {
        lists = step(pipeline, world);
    }
    lists
}

fn rigged_mesh(world: &mut World, mesh: MeshId) {
    let faces = generate_box(0)
        .into_iter()
        .map(|f| {
            let n = f.vertex_count();
            f.with_weights(vec![JointWeights::single(0); n])
        })
        .collect();
    world.meshes.insert_lod(mesh, 0, MeshLodData { faces });
}

fn pose(offset: Vec3) -> SkeletonPose {
    SkeletonPose {
        joints: vec![Mat4::from_translation(offset)],
        root_position: offset,
        bin_radius: 1.0,
    }
}

#[test]
fn test_new_entity_draws_from_second_frame() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0));

    let first = step(&mut pipeline, &world);
    assert!(first.is_empty());
    assert_eq!(pipeline.stats().created, 1);
    assert_eq!(pipeline.stats().rebuilt_entities, 1);

    let second = step(&mut pipeline, &world);
    assert_eq!(second.pass(RenderPassKind::Simple).len(), 1);
    assert!(second.contains_entity(id));
    assert_eq!(pipeline.stats().visible_entities, 1);
}

#[test]
fn test_removed_entity_never_drawn() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let a = pipeline.create_entity(boxed(0.0));
    let b = pipeline.create_entity(boxed(3.0));
    let lists = run(&mut pipeline, &world, 2);
    assert!(lists.contains_entity(a) && lists.contains_entity(b));

    pipeline.remove_entity(a).unwrap();
    let lists = step(&mut pipeline, &world);
    assert!(!lists.contains_entity(a));
    assert!(lists.contains_entity(b));
    let key = VolumeKey::new(VolumeParams::new(Shape::Box), 0);
    assert_eq!(pipeline.volumes().ref_count(&key), 1);
    assert!(matches!(pipeline.remove_entity(a), Err(PipelineError::UnknownEntity(e)) if e == a));
}

#[test]
fn test_remove_before_first_frame() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0));
    pipeline.remove_entity(id).unwrap();
    let lists = run(&mut pipeline, &world, 2);
    assert!(lists.is_empty());
    assert_eq!(pipeline.entity_count(), 0);
    assert!(pipeline.octree().is_empty());
}

#[test]
fn test_tint_change_is_partial_update() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0));
    run(&mut pipeline, &world, 2);
    let root = pipeline.octree().root();
    assert_eq!(pipeline.group_rebuilds(root), 1);

    let red = TextureEntry::new(TEX).with_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
    pipeline.set_texture_entry(id, 0, red).unwrap();
    step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 0);
    assert_eq!(pipeline.stats().partial_updates, 6);
    assert_eq!(pipeline.group_rebuilds(root), 1);
}

#[test]
fn test_alpha_change_escalates_to_full_rebuild() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0));
    run(&mut pipeline, &world, 2);

    let blended = TextureEntry::new(TEX).with_color(Vec4::new(1.0, 1.0, 1.0, 0.5));
    for face in 0..6 {
        pipeline.set_texture_entry(id, face, blended.clone()).unwrap();
    }
    let lists = step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 1);
    assert!(lists.pass(RenderPassKind::Simple).is_empty());
    assert!(!lists.alpha().is_empty());
    assert!(lists.alpha().iter().all(|d| d.faces.iter().all(|f| f.entity == id)));
}

#[test]
fn test_static_move_rewrites_vertices_in_place() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0));
    run(&mut pipeline, &world, 2);

    pipeline
        .set_transform(id, Mat4::from_translation(Vec3::new(0.25, 0.0, 0.0)))
        .unwrap();
    step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 0);
    assert_eq!(pipeline.stats().partial_updates, 6);
    let root = pipeline.octree().root();
    let slot = pipeline
        .group_geometry(root)
        .and_then(|g| g.slot(FaceKey::new(id, 0)))
        .unwrap();
    assert!((slot.extents.center().x - 0.25).abs() < 0.3);
    assert!(slot.extents.max.x > 0.5);
}

#[test]
fn test_dynamic_move_updates_model_matrix() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0).with_motion(Motion::Dynamic));
    run(&mut pipeline, &world, 2);

    let moved = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.25));
    pipeline.set_transform(id, moved).unwrap();
    let lists = step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 1);
    let draws = lists.pass(RenderPassKind::Simple);
    assert!(!draws.is_empty());
    assert!(draws.iter().all(|d| d.model_matrix == Some(moved)));
}

#[test]
fn test_missing_texture_placeholder_then_retry() {
    let mut world = World::new();
    let mut config = config();
    config.frame.asset_retry_frames = 3;
    let mut pipeline = Pipeline::new(config);
    let missing = TextureId(99);
    let id = pipeline.create_entity(boxed(0.0).with_texture(TextureEntry::new(missing)));

    let lists = run(&mut pipeline, &world, 2);
    let draws = lists.pass(RenderPassKind::Simple);
    assert!(!draws.is_empty());
    assert!(draws.iter().all(|d| d.texture == TextureId::PLACEHOLDER));
    assert!(lists.contains_entity(id));

    world.textures.insert(missing, TextureInfo::new(64, 64, false));
    let lists = run(&mut pipeline, &world, 4);
    assert!(
        lists
            .pass(RenderPassKind::Simple)
            .iter()
            .all(|d| d.texture == missing)
    );
}

#[test]
fn test_texture_ready_event_replaces_placeholder() {
    let mut world = World::new();
    let pending = TextureId(7);
    world.textures.set_status(pending, TextureStatus::Pending);
    let mut pipeline = Pipeline::new(config());
    pipeline.create_entity(boxed(0.0).with_texture(TextureEntry::new(pending)));
    let lists = run(&mut pipeline, &world, 2);
    assert_eq!(lists.pass(RenderPassKind::Simple)[0].texture, TextureId::PLACEHOLDER);

    world.textures.insert(pending, TextureInfo::new(32, 32, false));
    pipeline.event_sender().send(StreamEvent::TextureReady(pending)).unwrap();
    let lists = step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 1);
    assert_eq!(lists.pass(RenderPassKind::Simple)[0].texture, pending);
    assert_eq!(pipeline.stats().texture_bytes, 32 * 32 * 4);
}

#[test]
fn test_mesh_placeholder_until_streamed() {
    let mut world = World::new();
    let mesh = MeshId(40);
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX)),
    );
    step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().placeholders, 1);
    let lists = step(&mut pipeline, &world);
    assert!(lists.contains_entity(id));
    assert!(pipeline.drawable(id).unwrap().shows_placeholder());
    assert!(world.meshes.requests().contains(&(mesh, 0)));
    assert!(pipeline.volumes().is_empty());

    world.meshes.insert_lod(mesh, 0, MeshLodData { faces: generate_box(1) });
    pipeline
        .event_sender()
        .send(StreamEvent::MeshLodResident { mesh, lod: 0 })
        .unwrap();
    let lists = step(&mut pipeline, &world);
    let drawable = pipeline.drawable(id).unwrap();
    assert!(!drawable.shows_placeholder());
    assert_eq!(drawable.volume().unwrap().detail(), 0);
    assert_eq!(pipeline.volumes().len(), 1);
    assert!(lists.contains_entity(id));
}

#[test]
fn test_arena_exhaustion_disables_texture_batching() {
    let world = World::new();
    let mut config = config();
    config.batch.arena_budget_bytes = 0;
    let mut pipeline = Pipeline::new(config);
    pipeline.create_entity(boxed(0.0));
    let lists = run(&mut pipeline, &world, 3);
    assert!(lists.is_empty());
    assert_eq!(pipeline.context().degraded(), &[DegradedReason::ArenaExhausted]);
    assert!(!pipeline.context().is_enabled(Feature::TextureBatching));
    assert!(!pipeline.batcher().texture_batching());
}

#[test]
fn test_oversized_group_draws_unbatched() {
    let world = World::new();
    let mut config = config();
    config.batch.max_group_bytes = 1;
    let mut pipeline = Pipeline::new(config);
    pipeline.create_entity(boxed(0.0));
    let lists = run(&mut pipeline, &world, 2);
    assert_eq!(pipeline.stats().unbatched_fallbacks, 1);
    let root = pipeline.octree().root();
    assert!(pipeline.group_geometry(root).unwrap().is_unbatched());
    assert_eq!(lists.pass(RenderPassKind::Simple).len(), 6);
}

#[test]
fn test_skinning_failures_disable_skinning() {
    let mut world = World::new();
    let mesh = MeshId(5);
    rigged_mesh(&mut world, mesh);
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0, 1],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(1);
    world.skeletons.set_pose(skeleton, pose(Vec3::ZERO));

    let mut config = config();
    config.skin.max_failures_before_disable = 1;
    let mut pipeline = Pipeline::new(config);
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX))
            .rigged(skeleton),
    );
    let lists = run(&mut pipeline, &world, 2);
    assert!(pipeline.context().degraded().contains(&DegradedReason::SkinningFailures));
    assert!(!pipeline.context().is_enabled(Feature::Skinning));
    assert!(!pipeline.drawable(id).unwrap().is_skinned());
    assert!(lists.contains_entity(id));
}

#[test]
fn test_skinned_entity_follows_skeleton() {
    let mut world = World::new();
    let mesh = MeshId(6);
    rigged_mesh(&mut world, mesh);
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(2);
    world.skeletons.set_pose(skeleton, pose(Vec3::new(5.0, 0.0, 0.0)));

    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX))
            .rigged(skeleton),
    );
    let lists = run(&mut pipeline, &world, 3);
    let drawable = pipeline.drawable(id).unwrap();
    assert!(drawable.is_skinned());
    let center = drawable.world_bounds().center();
    assert!((center - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
    assert!(lists.contains_entity(id));

    let hit = pipeline.line_segment_intersect(id, Vec3::new(5.1, -5.0, 0.2), Vec3::new(5.1, 5.0, 0.2));
    let (_, hit) = hit.unwrap();
    assert!((hit.point.y + 0.5).abs() < 1e-4);
}

#[test]
fn test_rigged_entity_with_collapsed_transform_is_skinned() {
    let mut world = World::new();
    let mesh = MeshId(7);
    rigged_mesh(&mut world, mesh);
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(3);
    world.skeletons.set_pose(skeleton, pose(Vec3::new(5.0, 0.0, 0.0)));

    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::from_scale(Vec3::ZERO))
            .with_texture(TextureEntry::new(TEX))
            .rigged(skeleton),
    );
    let lists = run(&mut pipeline, &world, 3);
    assert!(pipeline.drawable(id).unwrap().is_skinned());
    assert!(!pipeline.octree().is_quarantined(id));
    assert!(lists.contains_entity(id));

    world.skeletons.set_pose(skeleton, pose(Vec3::new(8.0, 0.0, 0.0)));
    pipeline.notify_skeleton_moved(skeleton);
    let lists = run(&mut pipeline, &world, 3);
    let center = pipeline.drawable(id).unwrap().world_bounds().center();
    assert!((center - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-4);
    assert!(lists.contains_entity(id));
    pipeline.octree().check_invariants().unwrap();
}

#[test]
fn test_rigged_entity_waits_while_skeleton_out_of_view() {
    let mut world = World::new();
    let mesh = MeshId(8);
    rigged_mesh(&mut world, mesh);
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(4);
    // Behind a camera that looks along +Y.
    world.skeletons.set_pose(skeleton, pose(Vec3::new(0.0, -60.0, 0.0)));
    let looking_north = Camera::look_at(Vec3::new(0.0, -20.0, 0.0), Vec3::ZERO, 1.0, 1.0, 720.0);

    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::from_scale(Vec3::ZERO))
            .with_texture(TextureEntry::new(TEX))
            .rigged(skeleton),
    );
    for _ in 0..3 {
        pipeline.update(&looking_north, &world.providers());
    }
    assert!(!pipeline.drawable(id).unwrap().is_skinned());
    assert!(pipeline.octree().is_quarantined(id));

    // The pending skin is kept and runs once the skeleton comes into view.
    world.skeletons.set_pose(skeleton, pose(Vec3::new(0.0, 10.0, 0.0)));
    for _ in 0..3 {
        pipeline.update(&looking_north, &world.providers());
    }
    assert!(pipeline.drawable(id).unwrap().is_skinned());
    assert!(pipeline.render_lists().contains_entity(id));
}

#[test]
fn test_rigged_lod_follows_skeleton_root() {
    let mut world = World::new();
    let mesh = MeshId(9);
    for lod in 0..=3 {
        let faces = generate_box(lod)
            .into_iter()
            .map(|f| {
                let n = f.vertex_count();
                f.with_weights(vec![JointWeights::single(0); n])
            })
            .collect();
        world.meshes.insert_lod(mesh, lod, MeshLodData { faces });
    }
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(5);
    world.skeletons.set_pose(skeleton, pose(Vec3::new(0.0, 200.0, 0.0)));

    let mut config = Config::default();
    config.lod.force_lod = None;
    let mut pipeline = Pipeline::new(config);
    let desc = || {
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX))
    };
    let plain = pipeline.create_entity(desc());
    let rigged = pipeline.create_entity(desc().rigged(skeleton));
    let near = Camera::unculled(Vec3::new(0.0, -3.0, 0.0));
    for _ in 0..3 {
        pipeline.update(&near, &world.providers());
    }

    // Same transform, but the rigged copy is judged from its skeleton 203 m away.
    assert_eq!(pipeline.drawable(plain).unwrap().lod().level, 3);
    assert_eq!(pipeline.drawable(rigged).unwrap().lod().level, 0);
    assert!(pipeline.drawable(rigged).unwrap().is_skinned());
}

#[test]
fn test_camera_distance_rebins_past_hysteresis() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(0.0).with_motion(Motion::Dynamic));
    let at = |y: f32| Camera::unculled(Vec3::new(0.0, y, 0.0));

    for _ in 0..2 {
        pipeline.update(&at(-20.0), &world.providers());
    }
    let initial = pipeline.octree().entity_bin_radius(id).unwrap();
    // Dynamic: radius + distance * 0.01.
    assert!((initial - (0.866 + 0.2)).abs() < 1e-2);

    // One metre is inside the 10 % band.
    pipeline.update(&at(-21.0), &world.providers());
    assert_eq!(pipeline.octree().entity_bin_radius(id), Some(initial));

    pipeline.update(&at(-200.0), &world.providers());
    let rebinned = pipeline.octree().entity_bin_radius(id).unwrap();
    assert!((rebinned - (0.866 + 2.0)).abs() < 1e-2);
    assert!(pipeline.octree().group_of(id).is_some());
    pipeline.octree().check_invariants().unwrap();
}

#[test]
fn test_pick_static_entity_in_world_space() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(10.0));
    run(&mut pipeline, &world, 1);

    let (_, hit) = pipeline
        .line_segment_intersect(id, Vec3::new(10.1, -5.0, 0.2), Vec3::new(10.1, 5.0, 0.2))
        .unwrap();
    assert!((hit.t - 0.45).abs() < 1e-4);
    assert!((hit.point - Vec3::new(10.1, -0.5, 0.2)).length() < 1e-4);
    assert!(
        pipeline
            .line_segment_intersect(id, Vec3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 5.0, 0.0))
            .is_none()
    );
}

#[test]
fn test_lod_follows_camera_distance() {
    let world = World::new();
    let mut pipeline = Pipeline::new(Config::default());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Box), Mat4::IDENTITY).with_texture(TextureEntry::new(TEX)),
    );
    let near = Camera::unculled(Vec3::new(0.0, -3.0, 0.0));
    let far = Camera::unculled(Vec3::new(0.0, -100.0, 0.0));
    pipeline.update(&near, &world.providers());
    pipeline.update(&near, &world.providers());
    assert_eq!(pipeline.drawable(id).unwrap().lod().level, 3);
    assert_eq!(pipeline.drawable(id).unwrap().volume().unwrap().detail(), 3);

    pipeline.update(&far, &world.providers());
    assert_eq!(pipeline.stats().lod_changes, 1);
    let drawable = pipeline.drawable(id).unwrap();
    assert_eq!(drawable.lod().level, 0);
    assert_eq!(drawable.volume().unwrap().detail(), 0);
}

#[test]
fn test_normal_lane_respects_budget() {
    let world = World::new();
    let mut config = config();
    config.frame.max_rebuilds_per_frame = 2;
    let mut pipeline = Pipeline::new(config);
    let ids: Vec<_> = (0..5).map(|i| pipeline.create_entity(boxed(10.0 + i as f32 * 2.0))).collect();
    let away = Camera::look_at(Vec3::ZERO, Vec3::new(-1.0, 0.0, 0.0), 1.0, 1.0, 720.0);
    pipeline.update(&away, &world.providers());
    assert_eq!(pipeline.stats().rebuilt_entities, 5);
    pipeline.update(&away, &world.providers());
    assert!(pipeline.visible_groups().is_empty());

    for id in &ids {
        pipeline.set_volume_params(*id, VolumeParams::new(Shape::Cylinder)).unwrap();
    }
    pipeline.update(&away, &world.providers());
    assert_eq!(pipeline.stats().rebuilt_entities, 2);
    assert_eq!(pipeline.stats().deferred_rebuilds, 3);
    pipeline.update(&away, &world.providers());
    assert_eq!(pipeline.stats().rebuilt_entities, 2);
    assert_eq!(pipeline.stats().deferred_rebuilds, 1);
    assert_eq!(pipeline.rebuild_backlog(), 1);
}

#[test]
fn test_degenerate_entity_restored_after_move() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Box), Mat4::from_scale(Vec3::ZERO))
            .with_texture(TextureEntry::new(TEX)),
    );
    let lists = run(&mut pipeline, &world, 2);
    assert!(lists.is_empty());
    assert!(pipeline.octree().is_quarantined(id));

    pipeline.set_transform(id, Mat4::IDENTITY).unwrap();
    let lists = run(&mut pipeline, &world, 2);
    assert!(!pipeline.octree().is_quarantined(id));
    assert!(lists.contains_entity(id));
}

#[test]
fn test_origin_shift_moves_everything() {
    let world = World::new();
    let mut pipeline = Pipeline::new(config());
    let id = pipeline.create_entity(boxed(10.0));
    run(&mut pipeline, &world, 2);

    pipeline.shift_origin(Vec3::new(-10.0, 0.0, 0.0));
    let lists = step(&mut pipeline, &world);
    assert_eq!(pipeline.stats().rebuilt_groups, 1);
    let bounds = pipeline.octree().entity_bounds(id).unwrap();
    assert!(bounds.center().length() < 1e-4);
    assert!(pipeline.drawable(id).unwrap().world_bounds().center().length() < 1e-4);
    assert!(lists.contains_entity(id));
    pipeline.octree().check_invariants().unwrap();
}
