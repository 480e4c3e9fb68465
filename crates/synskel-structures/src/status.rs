// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Per-voxel status inside a segment.
///
/// The numeric codes are part of the processing contract: refinement treats every
/// nonzero even code as a shortest-path source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoxelStatus {
    Background = 0,
    /// Foreground voxel not yet exposed to the background
    Interior = 1,
    /// Foreground voxel on the live erosion front
    Surface = 2,
    /// Synapse or stitching anchor; never removed
    Anchor = 3,
    /// Surface voxel of a cell body; never removed
    SomaSurface = 4,
}

impl VoxelStatus {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_foreground(self) -> bool {
        !matches!(self, VoxelStatus::Background)
    }

    /// Voxels that thinning must keep regardless of topology.
    pub const fn is_fixed(self) -> bool {
        matches!(self, VoxelStatus::Anchor | VoxelStatus::SomaSurface)
    }

    /// Nonzero even codes seed the refinement search.
    pub const fn is_source(self) -> bool {
        let code = self.code();
        code != 0 && code % 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_codes_are_sources() {
        assert!(VoxelStatus::Surface.is_source());
        assert!(VoxelStatus::SomaSurface.is_source());
        assert!(!VoxelStatus::Anchor.is_source());
        assert!(!VoxelStatus::Interior.is_source());
        assert!(!VoxelStatus::Background.is_source());
    }
}
