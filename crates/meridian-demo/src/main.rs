//! Headless demo that drives the volume pipeline through a seeded scene.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p meridian-demo`.
//! Run with `cargo run -p meridian-demo -- --frames 600 --entities 2000 --force-lod 1`
//! to stress the batcher.

use clap::Parser;
use glam::{Mat4, Quat, Vec3, Vec4};
use meridian_batch::RenderPassKind;
use meridian_config::{CliArgs, Config};
use meridian_math::EntityId;
use meridian_pipeline::{
    Camera, EntityDesc, MemoryMeshes, MemorySkeletons, MemoryTextures, Motion, Pipeline, Providers,
    SkeletonId, StreamEvent, TextureInfo, TextureStatus,
};
use meridian_rig::{SkeletonPose, SkinInfo};
use meridian_volume::{
    JointWeights, MeshId, MeshLodData, SculptMap, Shape, TextureEntry, TextureId, VolumeParams,
    generate_box, generate_sphere,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meridian-demo", about = "Drive the Meridian pipeline through a scripted scene")]
struct DemoArgs {
    /// Frames to simulate.
    #[arg(long, default_value_t = 240)]
    frames: u64,

    /// Entities to scatter.
    #[arg(long, default_value_t = 500)]
    entities: usize,

    /// RNG seed for the scene layout.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[command(flatten)]
    pipeline: CliArgs,
}

// Scene assets and the frames at which they change.
const DIFFUSE: [TextureId; 6] = [
    TextureId(1),
    TextureId(2),
    TextureId(3),
    TextureId(4),
    TextureId(5),
    TextureId(6),
];
const STREAMED_TEXTURE: TextureId = TextureId(20);
const BROKEN_TEXTURE: TextureId = TextureId(21);
const SCULPT_MAP: TextureId = TextureId(30);
const STATUE: MeshId = MeshId(1);
const ROBOT: MeshId = MeshId(2);
const TEXTURE_ARRIVES: u64 = 30;
const STATUE_DETAIL_ARRIVES: u64 = 60;
const ORIGIN_SHIFT_AT: u64 = 120;
const ORBIT_RADIUS: f32 = 90.0;

struct Scene {
    textures: MemoryTextures,
    meshes: MemoryMeshes,
    skeletons: MemorySkeletons,
    rigs: Vec<(SkeletonId, Vec3)>,
    movers: Vec<(EntityId, Vec3)>,
    origin: Vec3,
}

impl Scene {
    fn new() -> Self {
        let mut textures = MemoryTextures::new();
        for (i, id) in DIFFUSE.iter().enumerate() {
            let size = 128 << (i % 3);
            textures.insert(*id, TextureInfo::new(size, size, i == DIFFUSE.len() - 1));
        }
        textures.set_status(STREAMED_TEXTURE, TextureStatus::Pending);
        textures.insert(SCULPT_MAP, TextureInfo::new(16, 16, false));
        textures.insert_sculpt_map(SCULPT_MAP, dome_map(16));

        let mut meshes = MemoryMeshes::new();
        meshes.insert_lod(STATUE, 0, MeshLodData { faces: generate_sphere(0) });
        meshes.insert_lod(STATUE, 1, MeshLodData { faces: generate_sphere(1) });
        let robot = generate_box(1)
            .into_iter()
            .map(|face| {
                let n = face.vertex_count();
                face.with_weights(vec![JointWeights::single(0); n])
            })
            .collect();
        meshes.insert_lod(ROBOT, 0, MeshLodData { faces: robot });
        meshes.insert_skin(
            ROBOT,
            SkinInfo {
                joint_map: vec![0],
                inverse_bind: vec![Mat4::IDENTITY],
                bind_shape: Mat4::IDENTITY,
            },
        );

        Self {
            textures,
            meshes,
            skeletons: MemorySkeletons::new(),
            rigs: Vec::new(),
            movers: Vec::new(),
            origin: Vec3::ZERO,
        }
    }

    fn providers(&self) -> Providers<'_> {
        Providers::new(&self.textures, &self.meshes, &self.skeletons)
    }

    /// Scatter `count` entities: mostly static primitives, a few movers,
    /// glass panes, streamed meshes, and rigged robots.
    fn populate(&mut self, pipeline: &mut Pipeline, count: usize, seed: u64) {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        for i in 0..count {
            let position = Vec3::new(
                rng.gen_range(-80.0..80.0),
                rng.gen_range(-80.0..80.0),
                rng.gen_range(0.0..12.0),
            );
            let scale = Vec3::splat(rng.gen_range(0.5..3.0));
            let transform = Mat4::from_scale_rotation_translation(
                scale,
                Quat::from_rotation_z(rng.gen_range(0.0..std::f32::consts::TAU)),
                position,
            );
            let diffuse = TextureEntry::new(DIFFUSE[rng.gen_range(0..DIFFUSE.len())]);

            let desc = match rng.gen_range(0..20) {
                0 => {
                    let skeleton = SkeletonId(self.rigs.len() as u64);
                    self.rigs.push((skeleton, position));
                    self.skeletons.set_pose(skeleton, walk_pose(position, 0.0));
                    EntityDesc::new(i as u64, VolumeParams::new(Shape::Mesh(ROBOT)), Mat4::IDENTITY)
                        .with_texture(diffuse)
                        .rigged(skeleton)
                }
                1 => EntityDesc::new(i as u64, VolumeParams::new(Shape::Mesh(STATUE)), transform)
                    .with_texture(diffuse),
                2 => EntityDesc::new(i as u64, VolumeParams::new(Shape::Box), transform)
                    .with_texture(diffuse.with_color(Vec4::new(0.6, 0.8, 1.0, 0.4))),
                3 => EntityDesc::new(i as u64, VolumeParams::new(Shape::Sculpt(SCULPT_MAP)), transform)
                    .with_texture(diffuse),
                4 => EntityDesc::new(i as u64, VolumeParams::new(Shape::Cylinder), transform)
                    .with_texture(TextureEntry::new(STREAMED_TEXTURE)),
                5 => EntityDesc::new(i as u64, VolumeParams::new(Shape::Sphere), transform)
                    .with_faces(vec![diffuse, TextureEntry::new(BROKEN_TEXTURE)]),
                6 | 7 => {
                    let desc = EntityDesc::new(i as u64, VolumeParams::new(Shape::Sphere), transform)
                        .with_texture(diffuse)
                        .with_motion(Motion::Dynamic);
                    let velocity = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
                    let id = pipeline.create_entity(desc);
                    self.movers.push((id, velocity));
                    continue;
                }
                n if n % 2 == 0 => {
                    EntityDesc::new(i as u64, VolumeParams::new(Shape::Box), transform).with_texture(diffuse)
                }
                _ => EntityDesc::new(i as u64, VolumeParams::new(Shape::Cylinder), transform)
                    .with_texture(diffuse),
            };
            pipeline.create_entity(desc);
        }
        info!(
            "Scene: {count} entities, {} rigged, {} moving",
            self.rigs.len(),
            self.movers.len()
        );
    }

    /// Advance scripted changes for `frame` before the pipeline runs it.
    fn advance(&mut self, pipeline: &mut Pipeline, frame: u64) {
        let t = frame as f32 / 30.0;
        let events = pipeline.event_sender();

        if frame == TEXTURE_ARRIVES {
            self.textures.insert(STREAMED_TEXTURE, TextureInfo::new(256, 256, false));
            let _ = events.send(StreamEvent::TextureReady(STREAMED_TEXTURE));
            info!("Texture {STREAMED_TEXTURE:?} finished decoding");
        }
        if frame == STATUE_DETAIL_ARRIVES {
            for lod in 2..=3 {
                self.meshes
                    .insert_lod(STATUE, lod, MeshLodData { faces: generate_sphere(lod) });
                let _ = events.send(StreamEvent::MeshLodResident { mesh: STATUE, lod });
            }
            info!("Mesh {STATUE:?} detail levels 2-3 resident");
        }
        if frame == ORIGIN_SHIFT_AT {
            let offset = Vec3::new(-64.0, 0.0, 0.0);
            pipeline.shift_origin(offset);
            self.origin += offset;
            for (_, home) in &mut self.rigs {
                *home += offset;
            }
            info!("Origin shifted by {offset}");
        }

        for (skeleton, home) in &self.rigs {
            self.skeletons.set_pose(*skeleton, walk_pose(*home, t));
            let _ = events.send(StreamEvent::SkeletonMoved(*skeleton));
        }
        for (id, velocity) in &self.movers {
            let Some(drawable) = pipeline.drawable(*id) else {
                continue;
            };
            let transform = Mat4::from_translation(*velocity * 0.1) * drawable.transform();
            if let Err(e) = pipeline.set_transform(*id, transform) {
                tracing::warn!("Failed to move {id}: {e}");
            }
        }
    }

    fn camera(&self, frame: u64) -> Camera {
        let angle = frame as f32 * 0.01;
        let eye = self.origin + Vec3::new(angle.cos() * ORBIT_RADIUS, angle.sin() * ORBIT_RADIUS, 25.0);
        Camera::look_at(eye, self.origin, std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 1080.0)
    }
}

/// Bobbing, spinning single-joint pose around `home`.
fn walk_pose(home: Vec3, t: f32) -> SkeletonPose {
    let root = home + Vec3::new(0.0, 0.0, (t * 3.0).sin().abs());
    SkeletonPose {
        joints: vec![Mat4::from_rotation_translation(Quat::from_rotation_z(t), root)],
        root_position: root,
        bin_radius: 1.5,
    }
}

/// Hemisphere height field encoded as RGB texels.
fn dome_map(size: u32) -> SculptMap {
    let mut texels = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let s = x as f32 / (size - 1) as f32 * 2.0 - 1.0;
            let t = y as f32 / (size - 1) as f32 * 2.0 - 1.0;
            let h = (1.0 - (s * s + t * t).min(1.0)).sqrt();
            let channel = |v: f32| ((v * 0.5 + 0.5) * 255.0).round() as u8;
            texels.push([channel(s), channel(t), channel(h)]);
        }
    }
    SculptMap { width: size, height: size, texels }
}

fn run(pipeline: &mut Pipeline, scene: &mut Scene, frames: u64) {
    for frame in 1..=frames {
        scene.advance(pipeline, frame);
        let camera = scene.camera(frame);
        let lists = pipeline.update(&camera, &scene.providers());
        if frame % 30 == 0 {
            let simple = lists.pass(RenderPassKind::Simple).len();
            let alpha = lists.alpha().len();
            info!("{} (simple {simple}, alpha {alpha})", pipeline.stats());
        }
    }
}

/// Cast a segment from the camera to the scene centre and report the
/// nearest drawn entity it hits.
fn pick(pipeline: &Pipeline, scene: &Scene, frame: u64) {
    let camera = scene.camera(frame);
    let start = camera.position;
    let end = scene.origin;
    let hit = pipeline
        .render_lists()
        .opaque()
        .flat_map(|(_, draws)| draws.iter())
        .flat_map(|draw| draw.faces.iter().map(|f| f.entity))
        .filter_map(|id| pipeline.line_segment_intersect(id, start, end).map(|(face, hit)| (id, face, hit)))
        .min_by(|a, b| a.2.t.total_cmp(&b.2.t));
    match hit {
        Some((id, face, hit)) => info!("Pick: {id} face {face} at {}", hit.point),
        None => info!("Pick: nothing between camera and origin"),
    }
}

fn main() {
    let args = DemoArgs::parse();

    // Resolve config directory
    let config_dir = match args.pipeline.config.clone() {
        Some(dir) => dir,
        None => match meridian_config::default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.pipeline);

    let log_dir = config_dir.join("logs");
    meridian_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let mut pipeline = Pipeline::new(config);
    let mut scene = Scene::new();
    scene.populate(&mut pipeline, args.entities, args.seed);
    run(&mut pipeline, &mut scene, args.frames);
    pick(&pipeline, &scene, args.frames);

    let ctx = pipeline.context();
    info!(
        "Done after {} frames: {} entities, {} octree groups, {} shared volumes",
        ctx.frame(),
        pipeline.entity_count(),
        pipeline.octree().group_count(),
        pipeline.volumes().len()
    );
    for reason in ctx.degraded() {
        info!("Degraded: {reason:?}");
    }
}
