// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Raw label blocks: `z * y * x` native-endian `i64` values in raster order.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};
use ndarray::{Array3, ArrayView3};
use synskel_structures::Dims3;

use crate::atomic::write_atomically;
use crate::error::{PointFileError, PointFileResult};

pub fn read_raw_block(path: &Path, shape: Dims3) -> PointFileResult<Array3<i64>> {
    let bytes = fs::read(path).map_err(PointFileError::io(path))?;
    let expected = shape.voxel_count() * 8;
    if bytes.len() != expected {
        return Err(PointFileError::corrupt(
            path,
            format!("expected {} bytes for shape {}, found {}", expected, shape, bytes.len()),
        ));
    }

    let mut values = vec![0i64; shape.voxel_count()];
    NativeEndian::read_i64_into(&bytes, &mut values);
    Array3::from_shape_vec(shape.shape(), values)
        .map_err(|err| PointFileError::corrupt(path, err.to_string()))
}

pub fn write_raw_block(path: &Path, block: ArrayView3<'_, i64>) -> PointFileResult<()> {
    let mut bytes = vec![0u8; block.len() * 8];
    // `iter` walks logical order, so non-standard layouts are written in raster order too.
    for (chunk, &value) in bytes.chunks_exact_mut(8).zip(block.iter()) {
        NativeEndian::write_i64(chunk, value);
    }
    write_atomically(path, |writer| std::io::Write::write_all(writer, &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rejects_wrong_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("block.raw");
        let block = Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (z * 4 + y * 2 + x) as i64);
        write_raw_block(&path, block.view()).unwrap();

        assert_eq!(read_raw_block(&path, Dims3::new(2, 2, 2)).unwrap(), block);
        assert!(matches!(
            read_raw_block(&path, Dims3::new(2, 2, 3)),
            Err(PointFileError::Corrupt { .. })
        ));
    }
}
