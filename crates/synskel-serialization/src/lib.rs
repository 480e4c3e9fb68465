// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! # synskel Serialization
//!
//! Binary formats exchanged between the anchor, thinning and refinement stages:
//!
//! - **[`PointFile`]** - labels with global and local voxel indices and a trailing checksum
//! - **[`WidthFile`]** - per-voxel widths or distances keyed by global index
//! - **raw blocks** - flat `i64` label volumes read into `ndarray` arrays
//!
//! Every writer goes through [`write_atomically`], so readers never observe a partially
//! written file.
//!
//! ## Basic Usage
//!
//! ```rust
//! use synskel_serialization::{LabelPoints, PointFile, PointFileHeader};
//! use synskel_structures::Dims3;
//!
//! let header = PointFileHeader::new(Dims3::new(8, 8, 8), Dims3::new(4, 4, 4));
//! let mut points = LabelPoints::new(12);
//! points.push(73, 21);
//! let file = PointFile::single(header, points);
//!
//! let decoded = PointFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
//! assert_eq!(decoded.checksum(), 94);
//! ```

mod atomic;
mod error;
mod point_file;
mod raw_block;
mod width_file;

pub use atomic::write_atomically;
pub use error::{PointFileError, PointFileResult};
pub use point_file::{block_stem, label_file_path, LabelPoints, PointFile, PointFileHeader};
pub use raw_block::{read_raw_block, write_raw_block};
pub use width_file::{DistanceFile, LabelValues, WidthFile};
