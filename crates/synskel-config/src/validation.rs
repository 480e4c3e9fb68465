// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures the volume layout is self-consistent and that the requested topology
//! modes are ones the engine implements.

use crate::{ConfigError, ConfigResult, SkeletonConfig};

const AXES: [&str; 3] = ["z", "y", "x"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    ZeroExtent { field: String },
    BlockExceedsVolume { axis: &'static str, block: usize, volume: usize },
    UnalignedBlocks { axis: &'static str, block: usize, volume: usize },
    InvalidResolution { axis: &'static str, value: f32 },
    DownsampleMismatch { axis: &'static str, block: usize, rate: usize },
    UnsupportedConnectivity { foreground: u8, background: u8 },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroExtent { field } => write!(f, "{} has a zero-length axis", field),
            Self::BlockExceedsVolume { axis, block, volume } => write!(
                f,
                "Block size {} exceeds volume size {} along {}",
                block, volume, axis
            ),
            Self::UnalignedBlocks { axis, block, volume } => write!(
                f,
                "Volume size {} along {} is not a multiple of block size {}",
                volume, axis, block
            ),
            Self::InvalidResolution { axis, value } => {
                write!(f, "Resolution along {} must be positive, got {}", axis, value)
            }
            Self::DownsampleMismatch { axis, block, rate } => write!(
                f,
                "Somata downsample rate {} does not divide block size {} along {}",
                rate, block, axis
            ),
            Self::UnsupportedConnectivity {
                foreground,
                background,
            } => write!(
                f,
                "Connectivity ({}, {}) is not supported; use (26, 6) or (6, 26)",
                foreground, background
            ),
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Non-empty volume and block extents
/// - Blocks that fit in and tile the volume exactly
/// - Positive resolution
/// - A soma downsample rate that divides the block size
/// - A supported connectivity pair
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &SkeletonConfig) -> ConfigResult<()> {
    let errors = collect_validation_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every problem in the configuration, in a stable order.
pub fn collect_validation_errors(config: &SkeletonConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_layout(config, &mut errors);
    validate_resolution(config, &mut errors);
    validate_somata(config, &mut errors);
    validate_connectivity(config, &mut errors);
    errors
}

fn validate_layout(config: &SkeletonConfig, errors: &mut Vec<ConfigValidationError>) {
    let volume = &config.volume;
    if volume.volume_size.contains(&0) {
        errors.push(ConfigValidationError::ZeroExtent {
            field: "volume.volume_size".to_string(),
        });
    }
    if volume.block_size.contains(&0) {
        errors.push(ConfigValidationError::ZeroExtent {
            field: "volume.block_size".to_string(),
        });
        return;
    }

    for (axis, name) in AXES.iter().enumerate() {
        let block = volume.block_size[axis];
        let extent = volume.volume_size[axis];
        if block > extent {
            errors.push(ConfigValidationError::BlockExceedsVolume {
                axis: name,
                block,
                volume: extent,
            });
        } else if extent % block != 0 {
            errors.push(ConfigValidationError::UnalignedBlocks {
                axis: name,
                block,
                volume: extent,
            });
        }
    }
}

fn validate_resolution(config: &SkeletonConfig, errors: &mut Vec<ConfigValidationError>) {
    for (axis, name) in AXES.iter().enumerate() {
        let value = config.volume.resolution[axis];
        if !(value.is_finite() && value > 0.0) {
            errors.push(ConfigValidationError::InvalidResolution { axis: name, value });
        }
    }
}

fn validate_somata(config: &SkeletonConfig, errors: &mut Vec<ConfigValidationError>) {
    let rate = config.thinning.somata_downsample_rate;
    if rate == 0 {
        return;
    }
    for (axis, name) in AXES.iter().enumerate() {
        let block = config.volume.block_size[axis];
        if block % rate != 0 {
            errors.push(ConfigValidationError::DownsampleMismatch {
                axis: name,
                block,
                rate,
            });
        }
    }
}

fn validate_connectivity(config: &SkeletonConfig, errors: &mut Vec<ConfigValidationError>) {
    let pair = (
        config.thinning.foreground_connectivity,
        config.thinning.background_connectivity,
    );
    if !matches!(pair, (26, 6) | (6, 26)) {
        errors.push(ConfigValidationError::UnsupportedConnectivity {
            foreground: pair.0,
            background: pair.1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SkeletonConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SkeletonConfig::default();
        config.volume.volume_size = [100, 512, 512];
        config.volume.resolution[2] = 0.0;
        config.thinning.somata_downsample_rate = 3;
        config.thinning.foreground_connectivity = 18;

        let errors = collect_validation_errors(&config);
        assert_eq!(errors.len(), 1 + 1 + 3 + 1);
        assert!(errors.contains(&ConfigValidationError::BlockExceedsVolume {
            axis: "z",
            block: 128,
            volume: 100
        }));
        assert!(matches!(
            errors.last(),
            Some(ConfigValidationError::UnsupportedConnectivity { foreground: 18, .. })
        ));

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("(18, 6)"));
    }

    #[test]
    fn test_config_serializes_to_json() {
        let config = SkeletonConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["thinning"]["oracle"], "lookup_table");
        assert_eq!(json["volume"]["block_size"][0], 128);
    }
}
