// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! # synskel - block-parallel skeletonization of 3-D label volumes
//!
//! Thins every label of a block-partitioned segmentation to a one-voxel-wide skeleton,
//! stitches the blocks through shared anchor points on their faces, and refines each
//! label to the tree joining its synapses and cell-body surface.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! synskel = "0.3"  # Default: parallel block processing
//! ```
//!
//! ## Feature Flags
//!
//! - **`parallel`** (default): rayon worker pool for every stage and for table generation
//! - **`file-logging`**: JSON log file per run in the `skeletonize` tool
//!
//! ## Usage
//!
//! ```rust,no_run
//! use synskel::prelude::*;
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//!
//! let settings = synskel::pipeline_settings(&config);
//! let source = synskel::block_source(&config);
//! let pipeline = SkeletonizationPipeline::new(
//!     settings,
//!     source,
//!     synskel::simple_point_oracle(&config)?,
//!     synskel::contour_rule(&config)?,
//! );
//! let report = pipeline.run()?;
//! println!("refined {} labels", report.labels_refined);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

// Re-export workspace crates
pub use synskel_config as config;
pub use synskel_observability as observability;
pub use synskel_serialization as serialization;
pub use synskel_structures as structures;
pub use synskel_thinning as thinning;

use synskel_config::{OracleBackend, SkeletonConfig};
use synskel_structures::Dims3;
use synskel_thinning::{
    ContourRule, FptaTable, LookupTable, PipelineSettings, RawBlockSource, SimpleContourRule,
    SimplePointOracle, SkeletonResult, TopologicalOracle,
};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use synskel_config::{load_config, validate_config, SkeletonConfig};
    pub use synskel_serialization::{LabelPoints, PointFile, PointFileHeader, WidthFile};
    pub use synskel_structures::{Axis, BlockGeometry, Dims3, Direction, VoxelStatus};
    pub use synskel_thinning::{
        BlockSource, ContourRule, PipelineReport, PipelineSettings, SimplePointOracle,
        SkeletonError, SkeletonResult, SkeletonizationPipeline,
    };
}

/// Pipeline settings described by a validated configuration.
pub fn pipeline_settings(config: &SkeletonConfig) -> PipelineSettings {
    let volume_size = Dims3::from_array(config.volume.volume_size);
    let block_size = Dims3::from_array(config.volume.block_size);
    let start_block_index = Dims3::from_array(config.volume.start_block_index);
    let total = volume_size.blocks_covering(block_size);

    let mut settings = PipelineSettings::new(
        &config.paths.tmp_dir,
        &config.paths.synapse_dir,
        &config.paths.output_dir,
        volume_size,
        block_size,
    );
    settings.resolution = config.volume.resolution;
    settings.start_block_index = start_block_index;
    settings.block_count = Dims3::new(
        total.z.saturating_sub(start_block_index.z),
        total.y.saturating_sub(start_block_index.y),
        total.x.saturating_sub(start_block_index.x),
    );
    settings.somata_downsample_rate = config.thinning.somata_downsample_rate;
    settings.workers = config.parallel.workers;
    settings
}

/// Raw block reader over the configured segmentation and soma directories.
pub fn block_source(config: &SkeletonConfig) -> RawBlockSource {
    let block_size = Dims3::from_array(config.volume.block_size);
    let source = RawBlockSource::new(&config.paths.segmentation_dir, block_size);
    match &config.paths.somata_dir {
        Some(somata_dir) if config.thinning.somata_downsample_rate > 0 => {
            source.with_somata(somata_dir, config.thinning.somata_downsample_rate)
        }
        _ => source,
    }
}

/// The configured 3-D simple-point oracle.
pub fn simple_point_oracle(config: &SkeletonConfig) -> SkeletonResult<Arc<dyn SimplePointOracle>> {
    let thinning = &config.thinning;
    let oracle: Arc<dyn SimplePointOracle> = match thinning.oracle {
        OracleBackend::LookupTable => Arc::new(LookupTable::for_connectivity(
            &config.paths.lut_dir,
            thinning.foreground_connectivity,
            thinning.background_connectivity,
        )?),
        OracleBackend::Computed => Arc::new(TopologicalOracle::new(
            thinning.foreground_connectivity,
            thinning.background_connectivity,
        )?),
    };
    Ok(oracle)
}

/// The configured 2-D contour rule for anchor computation.
pub fn contour_rule(config: &SkeletonConfig) -> SkeletonResult<Arc<dyn ContourRule>> {
    let rule: Arc<dyn ContourRule> = match config.anchors.contour_rule {
        OracleBackend::LookupTable => Arc::new(FptaTable::load(&config.paths.lut_dir)?),
        OracleBackend::Computed => Arc::new(SimpleContourRule),
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_cover_remaining_blocks() {
        let mut config = SkeletonConfig::default();
        config.volume.volume_size = [8, 8, 12];
        config.volume.block_size = [4, 4, 4];
        config.volume.start_block_index = [1, 0, 1];
        config.parallel.workers = 3;

        let settings = pipeline_settings(&config);
        assert_eq!(settings.block_count, Dims3::new(1, 2, 2));
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.block_indices().len(), 4);
    }

    #[test]
    fn test_computed_backends_need_no_files() {
        let mut config = SkeletonConfig::default();
        config.paths.lut_dir = "/nonexistent".into();
        config.thinning.oracle = OracleBackend::Computed;
        config.anchors.contour_rule = OracleBackend::Computed;
        assert!(simple_point_oracle(&config).is_ok());
        assert!(contour_rule(&config).is_ok());

        config.thinning.oracle = OracleBackend::LookupTable;
        assert!(simple_point_oracle(&config).is_err());
    }
}
