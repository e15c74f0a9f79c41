//! Pipeline tunables with defaults and RON persistence.
//!
//! Every numeric threshold the pipeline uses (LOD ramp, octree factors,
//! batch vertex caps, texture channel counts) lives here rather than in code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name used inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Level-of-detail selection.
    pub lod: LodConfig,
    /// Spatial partition sizing.
    pub octree: OctreeConfig,
    /// Face batching limits.
    pub batch: BatchConfig,
    /// Rigged mesh skinning.
    pub skin: SkinConfig,
    /// Per-frame work budgets.
    pub frame: FrameConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Level-of-detail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Global sensitivity multiplier (higher = more detail further away).
    pub lod_factor: f32,
    /// Angle-based selection through `detail_thresholds` instead of the
    /// radius-only formula.
    pub dynamic_lod: bool,
    /// Pin every entity to one detail level (0..=3).
    pub force_lod: Option<u8>,
    /// Multiplier applied to camera distance before selection.
    pub distance_factor: f32,
    /// Screen-space tangent thresholds; the first one not exceeded picks the level.
    pub detail_thresholds: [f32; 4],
    /// Relative bin radius change that triggers a partition move.
    pub bin_radius_hysteresis: f32,
}

/// Spatial partition configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OctreeConfig {
    /// Element count a node holds before new elements descend into children.
    pub max_capacity: usize,
    /// Half-size below which nodes never subdivide.
    pub min_node_size: f32,
    /// Half-size of the root node at startup.
    pub initial_size: f32,
    /// Size factor for static objects' bin radius.
    pub static_object_size_factor: i32,
    /// Size factor for attachments' bin radius.
    pub attachment_size_factor: i32,
    /// `[additive, multiplicative]` distance scaling of the bin radius.
    pub distance_factor: [f32; 2],
    /// Distance scaling used for alpha-blended objects.
    pub alpha_distance_factor: [f32; 2],
    /// Lower clamp for any bin radius.
    pub bin_radius_min: f32,
    /// Upper clamp for any bin radius.
    pub bin_radius_max: f32,
}

/// Face batching configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Soft cap on a single vertex buffer, in KiB.
    pub max_vbo_size_kb: u32,
    /// Soft cap on the total geometry of one spatial group, in KiB.
    pub max_node_size_kb: u32,
    /// Hardware limit on indexable texture units in one draw.
    pub max_texture_index: u32,
    /// Allow faces with different textures to share one draw.
    pub texture_batching: bool,
    /// Largest vertex index addressable by one draw (16-bit indices).
    pub index_range_limit: u32,
    /// A group requesting more vertex+index bytes than this is rebuilt unbatched.
    pub max_group_bytes: u64,
    /// Total bytes the buffer arena may hold across all groups.
    pub arena_budget_bytes: u64,
    /// Register fully transparent faces instead of skipping them.
    pub render_invisible: bool,
}

/// Skinning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkinConfig {
    /// Master switch for the rigged deformation path.
    pub enabled: bool,
    /// Size of the joint matrix palette.
    pub max_joints: usize,
    /// Skinning failures tolerated before the feature is disabled.
    pub max_failures_before_disable: u32,
}

/// Per-frame work budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    /// Normal-priority entity rebuilds processed per frame.
    pub max_rebuilds_per_frame: usize,
    /// Frames to wait before retrying a missing asset.
    pub asset_retry_frames: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            lod_factor: 1.0,
            dynamic_lod: true,
            force_lod: None,
            distance_factor: 1.0,
            detail_thresholds: [0.03, 0.06, 0.24, 3.0],
            bin_radius_hysteresis: 0.1,
        }
    }
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_capacity: 128,
            min_node_size: 1.0,
            initial_size: 256.0,
            static_object_size_factor: 3,
            attachment_size_factor: 4,
            distance_factor: [0.01, 0.0],
            alpha_distance_factor: [0.1, 0.0],
            bin_radius_min: 0.5,
            bin_radius_max: 256.0,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_vbo_size_kb: 512,
            max_node_size_kb: 65536,
            max_texture_index: 16,
            texture_batching: true,
            index_range_limit: 65535,
            max_group_bytes: 64 * 1024 * 1024,
            arena_budget_bytes: 512 * 1024 * 1024,
            render_invisible: false,
        }
    }
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_joints: 110,
            max_failures_before_disable: 64,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_rebuilds_per_frame: 256,
            asset_retry_frames: 120,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Validation ---

impl Config {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lod.lod_factor > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "lod.lod_factor",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(level) = self.lod.force_lod
            && level > 3
        {
            return Err(ConfigError::InvalidValue {
                field: "lod.force_lod",
                reason: format!("{level} is outside 0..=3"),
            });
        }
        if self.lod.detail_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::InvalidValue {
                field: "lod.detail_thresholds",
                reason: "must be strictly increasing".to_string(),
            });
        }
        if self.octree.max_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "octree.max_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.octree.min_node_size > 0.0) || self.octree.initial_size < self.octree.min_node_size
        {
            return Err(ConfigError::InvalidValue {
                field: "octree.initial_size",
                reason: "must be positive and not smaller than min_node_size".to_string(),
            });
        }
        if self.octree.bin_radius_min > self.octree.bin_radius_max {
            return Err(ConfigError::InvalidValue {
                field: "octree.bin_radius_min",
                reason: "exceeds bin_radius_max".to_string(),
            });
        }
        if self.batch.max_texture_index == 0 || self.batch.index_range_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.max_texture_index",
                reason: "texture index and index range limits must be at least 1".to_string(),
            });
        }
        if self.skin.max_joints == 0 {
            return Err(ConfigError::InvalidValue {
                field: "skin.max_joints",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let write_err = |source| ConfigError::Write {
            path: config_path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(&config_path, serialized).map_err(write_err)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}
