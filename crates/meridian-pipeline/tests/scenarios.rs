//! End-to-end frames through the public API.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use meridian_batch::{DrawInfo, RenderPassKind};
use meridian_config::Config;
use meridian_pipeline::{
    Camera, EntityDesc, MemoryMeshes, MemorySkeletons, MemoryTextures, Pipeline, Providers,
    SkeletonId, StreamEvent, TextureInfo, TextureStatus,
};
use meridian_rig::{SkeletonPose, SkinInfo};
use meridian_volume::{
    JointWeights, MeshId, MeshLodData, Shape, TextureEntry, TextureId, VolumeParams, generate_box,
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
        textures.insert(TEX, TextureInfo::new(512, 512, false));
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

fn forced_lod() -> Config {
    let mut config = Config::default();
    config.lod.force_lod = Some(0);
    config
}

fn box_at(position: Vec3) -> EntityDesc {
    EntityDesc::new(
        0,
        VolumeParams::new(Shape::Box),
        Mat4::from_translation(position),
    )
    .with_texture(TextureEntry::new(TEX))
}

fn frames(pipeline: &mut Pipeline, camera: &Camera, world: &World, count: usize) {
    for _ in 0..count {
        pipeline.update(camera, &world.providers());
    }
}

fn all_draws(pipeline: &Pipeline) -> Vec<&DrawInfo> {
    let lists = pipeline.render_lists();
    lists
        .opaque()
        .flat_map(|(_, draws)| draws.iter())
        .chain(lists.alpha())
        .collect()
}

fn samples(draw: &DrawInfo, texture: TextureId) -> bool {
    draw.texture == texture || draw.textures.contains(&texture)
}

fn group_rebuild_counts(pipeline: &Pipeline) -> Vec<(meridian_math::GroupId, u64)> {
    let mut counts: Vec<_> = pipeline
        .octree()
        .groups()
        .map(|g| (g.id(), pipeline.group_rebuilds(g.id())))
        .collect();
    counts.sort_unstable();
    counts
}

#[test]
fn test_hundred_boxes_sharing_a_texture_are_one_draw() {
    let world = World::new();
    let mut pipeline = Pipeline::new(forced_lod());
    for i in 0..100 {
        let x = (i % 10) as f32 * 2.0 - 9.0;
        let y = (i / 10) as f32 * 2.0 - 9.0;
        pipeline.create_entity(box_at(Vec3::new(x, y, 0.0)));
    }
    let camera = Camera::unculled(Vec3::new(0.0, 0.0, 50.0));
    frames(&mut pipeline, &camera, &world, 2);

    let lists = pipeline.render_lists();
    let simple = lists.pass(RenderPassKind::Simple);
    assert_eq!(simple.len(), 1);
    assert_eq!(lists.draw_count(), 1);
    assert_eq!(simple[0].faces.len(), 600);
    assert_eq!(simple[0].texture, TEX);
    assert_eq!(pipeline.stats().visible_entities, 100);
    assert_eq!(pipeline.stats().total_draws(), 1);
}

#[test]
fn test_alpha_draws_are_sorted_far_to_near() {
    let world = World::new();
    let mut pipeline = Pipeline::new(forced_lod());
    let glass = TextureEntry::new(TEX).with_color(Vec4::new(1.0, 1.0, 1.0, 0.5));
    let mid = pipeline.create_entity(box_at(Vec3::new(10.0, 0.0, 0.0)).with_texture(glass.clone()));
    let near = pipeline.create_entity(box_at(Vec3::new(5.0, 0.0, 0.0)).with_texture(glass.clone()));
    let far = pipeline.create_entity(box_at(Vec3::new(20.0, 0.0, 0.0)).with_texture(glass));
    let camera = Camera::unculled(Vec3::ZERO);
    frames(&mut pipeline, &camera, &world, 2);

    let lists = pipeline.render_lists();
    assert!(lists.pass(RenderPassKind::Simple).is_empty());
    let alpha = lists.alpha();
    assert!(!alpha.is_empty());
    assert!(alpha.windows(2).all(|w| w[0].distance >= w[1].distance));

    let mut order: Vec<_> = alpha.iter().map(|d| d.faces[0].entity).collect();
    order.dedup();
    assert_eq!(order, vec![far, mid, near]);
    // Alpha draws never mix entities.
    assert!(
        alpha
            .iter()
            .all(|d| d.faces.iter().all(|f| f.entity == d.faces[0].entity))
    );
}

#[test]
fn test_skeleton_move_reskins_only_its_entity() {
    let mut world = World::new();
    let mesh = MeshId(10);
    let faces = generate_box(0)
        .into_iter()
        .map(|f| {
            let n = f.vertex_count();
            f.with_weights(vec![JointWeights::single(0); n])
        })
        .collect();
    world.meshes.insert_lod(mesh, 0, MeshLodData { faces });
    world.meshes.insert_skin(
        mesh,
        SkinInfo {
            joint_map: vec![0],
            inverse_bind: vec![Mat4::IDENTITY],
            bind_shape: Mat4::IDENTITY,
        },
    );
    let skeleton = SkeletonId(1);
    let pose = |offset: Vec3| SkeletonPose {
        joints: vec![Mat4::from_translation(offset)],
        root_position: offset,
        bin_radius: 1.0,
    };
    world.skeletons.set_pose(skeleton, pose(Vec3::ZERO));

    let mut config = forced_lod();
    config.octree.max_capacity = 1;
    let mut pipeline = Pipeline::new(config);
    let avatar = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX))
            .rigged(skeleton),
    );
    let others: Vec<_> = [Vec3::new(40.0, 40.0, 0.0), Vec3::new(-40.0, -40.0, 0.0)]
        .into_iter()
        .map(|p| pipeline.create_entity(box_at(p)))
        .collect();
    let camera = Camera::unculled(Vec3::new(0.0, -60.0, 10.0));
    frames(&mut pipeline, &camera, &world, 4);

    assert!(pipeline.drawable(avatar).unwrap().is_skinned());
    assert!(pipeline.visible_groups().len() > 1);
    assert_eq!(pipeline.stats().rebuilt_groups, 0);
    let before = group_rebuild_counts(&pipeline);

    world.skeletons.set_pose(skeleton, pose(Vec3::new(0.0, 0.0, 0.1)));
    pipeline
        .event_sender()
        .send(StreamEvent::SkeletonMoved(skeleton))
        .unwrap();
    pipeline.update(&camera, &world.providers());

    let stats = pipeline.stats();
    assert_eq!(stats.skinned, 1);
    assert_eq!(stats.rebuilt_groups, 0);
    assert_eq!(stats.partial_updates, 6);
    assert_eq!(group_rebuild_counts(&pipeline), before);
    let rigged = pipeline.drawable(avatar).unwrap().rigged_volume().unwrap();
    assert_eq!(rigged.last_frame(), Some(stats.frame));
    assert!((rigged.bounds().center().z - 0.1).abs() < 1e-4);
    for id in others {
        assert!(pipeline.render_lists().contains_entity(id));
    }
}

#[test]
fn test_mesh_lod_upgrade_rebuilds_only_that_entity() {
    let mut world = World::new();
    let mesh = MeshId(20);
    world.meshes.insert_lod(mesh, 0, MeshLodData { faces: generate_box(0) });

    let mut pipeline = Pipeline::new(Config::default());
    let detailed = pipeline.create_entity(
        EntityDesc::new(0, VolumeParams::new(Shape::Mesh(mesh)), Mat4::IDENTITY)
            .with_texture(TextureEntry::new(TEX)),
    );
    let sibling = pipeline.create_entity(box_at(Vec3::new(3.0, 0.0, 0.0)));
    let camera = Camera::unculled(Vec3::new(0.0, -3.0, 0.0));
    frames(&mut pipeline, &camera, &world, 2);

    let lod = pipeline.drawable(detailed).unwrap().lod();
    assert_eq!(lod.level, 0);
    assert_eq!(lod.desired, 3);
    assert!(lod.awaiting_upgrade);
    assert!(world.meshes.requests().contains(&(mesh, 3)));
    let sibling_volume = Arc::clone(pipeline.drawable(sibling).unwrap().volume().unwrap());

    world.meshes.insert_lod(mesh, 3, MeshLodData { faces: generate_box(3) });
    pipeline
        .event_sender()
        .send(StreamEvent::MeshLodResident { mesh, lod: 3 })
        .unwrap();
    pipeline.update(&camera, &world.providers());

    assert_eq!(pipeline.stats().lod_changes, 1);
    assert_eq!(pipeline.stats().rebuilt_entities, 1);
    let upgraded = pipeline.drawable(detailed).unwrap();
    assert_eq!(upgraded.lod().level, 3);
    assert!(!upgraded.lod().awaiting_upgrade);
    assert_eq!(upgraded.volume().unwrap().detail(), 3);
    let current = pipeline.drawable(sibling).unwrap().volume().unwrap();
    assert!(Arc::ptr_eq(&sibling_volume, current));
}

#[test]
fn test_failed_texture_is_replaced_with_one_rebuild_per_group() {
    let mut world = World::new();
    let bad = TextureId(66);
    world.textures.insert(bad, TextureInfo::new(128, 128, false));

    let mut config = forced_lod();
    config.octree.max_capacity = 2;
    let mut pipeline = Pipeline::new(config);
    let mut users = Vec::new();
    for i in 0..10 {
        let angle = i as f32 * std::f32::consts::TAU / 10.0;
        let position = Vec3::new(angle.cos() * 60.0, angle.sin() * 60.0, (i % 2) as f32 * 30.0);
        let mut faces = vec![TextureEntry::new(bad); 5];
        faces.push(TextureEntry::new(TEX));
        users.push(pipeline.create_entity(box_at(position).with_faces(faces)));
    }
    let camera = Camera::unculled(Vec3::new(0.0, 0.0, 200.0));
    frames(&mut pipeline, &camera, &world, 3);
    assert!(all_draws(&pipeline).iter().any(|d| samples(d, bad)));

    let mut groups: Vec<_> = users
        .iter()
        .filter_map(|id| pipeline.octree().group_of(*id))
        .collect();
    groups.sort_unstable();
    groups.dedup();
    assert!(groups.len() > 1);
    let before = group_rebuild_counts(&pipeline);

    world.textures.set_status(bad, TextureStatus::Missing);
    pipeline
        .event_sender()
        .send(StreamEvent::TextureFailed(bad))
        .unwrap();
    pipeline.update(&camera, &world.providers());

    let frame = pipeline.stats().frame;
    assert_eq!(pipeline.stats().rebuilt_groups, groups.len());
    for (group, count) in group_rebuild_counts(&pipeline) {
        let old = before
            .iter()
            .find(|(g, _)| *g == group)
            .map_or(0, |(_, c)| *c);
        if groups.contains(&group) {
            assert_eq!(count, old + 1);
            assert_eq!(pipeline.group_last_rebuilt(group), Some(frame));
        } else {
            assert_eq!(count, old);
        }
    }
    let draws = all_draws(&pipeline);
    assert!(!draws.is_empty());
    assert!(draws.iter().all(|d| !samples(d, bad)));
    assert!(draws.iter().any(|d| samples(d, TextureId::PLACEHOLDER)));
    for id in users {
        assert!(pipeline.render_lists().contains_entity(id));
    }
}
