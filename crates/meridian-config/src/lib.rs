//! Configuration for the Meridian volume pipeline.
//!
//! Tunables persist to disk as RON and may be overridden from the command
//! line. Missing fields fall back to defaults so older files keep loading.

mod cli;
mod config;
mod error;

use std::path::PathBuf;

pub use cli::CliArgs;
pub use config::{
    BatchConfig, CONFIG_FILE_NAME, Config, DebugConfig, FrameConfig, LodConfig, OctreeConfig,
    SkinConfig,
};
pub use error::ConfigError;

/// Platform config directory for Meridian (`<config_dir>/meridian`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join("meridian"))
        .ok_or(ConfigError::NoConfigDir)
}
