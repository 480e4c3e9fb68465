// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::geometry::Dims3;

/// Error type for geometry and index-space operations.
///
/// Raised when extents, block indices or linear indices are inconsistent with
/// the volume they are supposed to address.
///
/// # Examples
/// ```
/// use synskel_structures::{BlockGeometry, Dims3, GeometryError};
///
/// let result = BlockGeometry::new(Dims3::new(8, 8, 8), Dims3::new(4, 4, 4), Dims3::new(2, 0, 0));
/// assert!(matches!(result, Err(GeometryError::BlockOutOfVolume { .. })));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// An extent had a zero-length axis
    ZeroExtent(Dims3),
    /// Block extent does not fit inside the volume extent
    BlockLargerThanVolume { block: Dims3, volume: Dims3 },
    /// Block index addresses a block outside the volume
    BlockOutOfVolume { block_index: Dims3, volume: Dims3, block: Dims3 },
    /// A linear index was outside its index space
    IndexOutOfRange { index: i64, len: usize },
    /// Array shape did not match the expected extent
    ShapeMismatch { expected: Dims3, actual: Dims3 },
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::ZeroExtent(dims) => write!(f, "Extent {} has a zero-length axis", dims),
            GeometryError::BlockLargerThanVolume { block, volume } => {
                write!(f, "Block size {} exceeds volume size {}", block, volume)
            }
            GeometryError::BlockOutOfVolume {
                block_index,
                volume,
                block,
            } => write!(
                f,
                "Block index {} lies outside volume {} with block size {}",
                block_index, volume, block
            ),
            GeometryError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} outside index space of {} voxels", index, len)
            }
            GeometryError::ShapeMismatch { expected, actual } => {
                write!(f, "Shape mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}
impl Error for GeometryError {}
