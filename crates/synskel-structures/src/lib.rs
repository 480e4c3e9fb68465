// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! The core crate for synskel. Defines the index spaces, directions and voxel status
//! codes shared by the serialization and thinning crates.

mod error;
pub mod geometry;
mod status;

pub use error::GeometryError;
pub use geometry::{Axis, BlockGeometry, Dims3, Direction, N26_DELTAS};
pub use status::VoxelStatus;
