//! Command-line argument parsing shared by Meridian binaries.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Pipeline command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "meridian", about = "Meridian volume pipeline")]
pub struct CliArgs {
    /// Global LOD sensitivity multiplier.
    #[arg(long)]
    pub lod_factor: Option<f32>,

    /// Pin every entity to one detail level (0-3).
    #[arg(long)]
    pub force_lod: Option<u8>,

    /// Allow or forbid multi-texture batching.
    #[arg(long)]
    pub texture_batching: Option<bool>,

    /// Enable or disable rigged mesh skinning.
    #[arg(long)]
    pub skinning: Option<bool>,

    /// Normal-priority rebuilds per frame.
    #[arg(long)]
    pub max_rebuilds: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(factor) = args.lod_factor {
            self.lod.lod_factor = factor;
        }
        if let Some(level) = args.force_lod {
            self.lod.force_lod = Some(level);
        }
        if let Some(batching) = args.texture_batching {
            self.batch.texture_batching = batching;
        }
        if let Some(enabled) = args.skinning {
            self.skin.enabled = enabled;
        }
        if let Some(budget) = args.max_rebuilds {
            self.frame.max_rebuilds_per_frame = budget;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
