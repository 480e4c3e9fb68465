// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `synskel.toml`.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SkeletonConfig {
    pub paths: PathsConfig,
    pub volume: VolumeConfig,
    pub thinning: ThinningConfig,
    pub anchors: AnchorsConfig,
    pub parallel: ParallelConfig,
    pub logging: LoggingConfig,
}

/// Input, scratch and output locations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding `lut_simple.dat` and `ronse_fpta.lut`
    pub lut_dir: PathBuf,
    /// Scratch directory shared by all stages (one subdirectory per block)
    pub tmp_dir: PathBuf,
    /// Per-block synapse point files
    pub synapse_dir: PathBuf,
    /// Final skeletons and distances
    pub output_dir: PathBuf,
    /// Per-block raw label volumes
    pub segmentation_dir: PathBuf,
    /// Per-block raw downsampled soma volumes, if cell bodies are available
    pub somata_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            lut_dir: PathBuf::from("lut"),
            tmp_dir: PathBuf::from("tmp"),
            synapse_dir: PathBuf::from("synapses"),
            output_dir: PathBuf::from("output"),
            segmentation_dir: PathBuf::from("segmentations"),
            somata_dir: None,
        }
    }
}

/// Volume layout; all triples are `[z, y, x]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub volume_size: [usize; 3],
    pub block_size: [usize; 3],
    /// Physical voxel size per axis
    pub resolution: [f32; 3],
    pub start_block_index: [usize; 3],
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            volume_size: [512, 512, 512],
            block_size: [128, 128, 128],
            resolution: [1.0, 1.0, 1.0],
            start_block_index: [0, 0, 0],
        }
    }
}

impl VolumeConfig {
    /// Number of blocks per axis (ceiling division).
    pub fn block_count(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for axis in 0..3 {
            if self.block_size[axis] > 0 {
                counts[axis] = self.volume_size[axis].div_ceil(self.block_size[axis]);
            }
        }
        counts
    }
}

/// How a topology decision is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleBackend {
    /// Precomputed bit table loaded from `lut_dir`
    LookupTable,
    /// Decided from the neighborhood at runtime
    Computed,
}

impl Display for OracleBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleBackend::LookupTable => write!(f, "lookup_table"),
            OracleBackend::Computed => write!(f, "computed"),
        }
    }
}

impl FromStr for OracleBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "lookup_table" | "lut" => Ok(OracleBackend::LookupTable),
            "computed" => Ok(OracleBackend::Computed),
            other => Err(format!("unknown oracle backend '{}'", other)),
        }
    }
}

/// Thinning stage settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThinningConfig {
    /// Downsample factor of the soma volume; 0 disables cell bodies
    pub somata_downsample_rate: usize,
    pub oracle: OracleBackend,
    pub foreground_connectivity: u8,
    pub background_connectivity: u8,
}

impl Default for ThinningConfig {
    fn default() -> Self {
        Self {
            somata_downsample_rate: 0,
            oracle: OracleBackend::LookupTable,
            foreground_connectivity: 26,
            background_connectivity: 6,
        }
    }
}

/// Anchor stitching settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnchorsConfig {
    pub contour_rule: OracleBackend,
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            contour_rule: OracleBackend::LookupTable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Worker threads for block-parallel stages; 0 = one per core
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            file_logging: false,
        }
    }
}
