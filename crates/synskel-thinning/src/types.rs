// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Core types for skeletonization operations.
*/

use std::path::PathBuf;

use synskel_serialization::PointFileError;
use synskel_structures::{Dims3, GeometryError};

/// Object label as stored in segmentation volumes and point files
pub type Label = i64;

/// Per-axis physical voxel size in `(z, y, x)` order
pub type Resolution = [f32; 3];

/// Result type for skeletonization operations
pub type SkeletonResult<T> = Result<T, SkeletonError>;

/// Errors that can occur during skeletonization
#[derive(Debug, thiserror::Error)]
pub enum SkeletonError {
    #[error("Connectivity ({foreground}, {background}) is not supported by the {backend}")]
    UnsupportedConnectivity {
        foreground: u8,
        background: u8,
        backend: &'static str,
    },

    #[error("Checksum mismatch in {path}: stored {expected}, computed {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: i64,
        actual: i64,
    },

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lookup table {path} has {actual} bytes, expected {expected}")]
    LookupTable {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: Dims3, actual: Dims3 },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    PointFile(PointFileError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SkeletonError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SkeletonError::Io { path, source }
    }
}

// Checksum and I/O failures keep their own variants so callers can tell corruption apart
impl From<PointFileError> for SkeletonError {
    fn from(err: PointFileError) -> Self {
        match err {
            PointFileError::ChecksumMismatch {
                path,
                expected,
                actual,
            } => SkeletonError::ChecksumMismatch {
                path,
                expected,
                actual,
            },
            PointFileError::Io { path, source } => SkeletonError::Io { path, source },
            other => SkeletonError::PointFile(other),
        }
    }
}

/// Checks that an array has the shape a block geometry expects.
pub(crate) fn expect_shape(expected: Dims3, shape: &[usize]) -> SkeletonResult<()> {
    let actual = match shape {
        [z, y, x] => Dims3::new(*z, *y, *x),
        _ => {
            return Err(SkeletonError::InvalidInput(format!(
                "expected a 3-D array, got {} dimensions",
                shape.len()
            )))
        }
    };
    if actual != expected {
        return Err(SkeletonError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
