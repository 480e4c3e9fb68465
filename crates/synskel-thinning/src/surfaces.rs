// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Object surfaces per block, and their per-label union over the volume.
//!
//! A voxel is on the surface when a 6-neighbor inside the same block carries another
//! value. Neighbors across the block wall are not looked at.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::ArrayView3;
use synskel_serialization::{label_file_path, block_stem, LabelPoints, PointFile, PointFileHeader};
use synskel_structures::{BlockGeometry, Dims3, Direction};

use crate::types::{Label, SkeletonResult};

/// Surface voxels of every label in a block, as ascending local indices.
pub fn extract_surfaces(segmentation: ArrayView3<'_, i64>) -> BTreeMap<Label, Vec<usize>> {
    let (depth, height, width) = segmentation.dim();
    let dims = Dims3::new(depth, height, width);
    let mut surfaces: BTreeMap<Label, Vec<usize>> = BTreeMap::new();

    for ((iz, iy, ix), &label) in segmentation.indexed_iter() {
        if label == 0 {
            continue;
        }
        let on_surface = Direction::ALL.iter().any(|direction| {
            let (dz, dy, dx) = direction.delta();
            match (
                iz.checked_add_signed(dz),
                iy.checked_add_signed(dy),
                ix.checked_add_signed(dx),
            ) {
                (Some(nz), Some(ny), Some(nx)) if nz < depth && ny < height && nx < width => {
                    segmentation[[nz, ny, nx]] != label
                }
                _ => false,
            }
        });
        let entry = surfaces.entry(label).or_default();
        if on_surface {
            entry.push(dims.index_of(iz, iy, ix));
        }
    }
    surfaces
}

/// Writes `tmp_block_dir/surfaces/{label}.pts` for every label of the block.
///
/// Labels whose voxels are all interior still get an empty file.
pub fn write_block_surfaces(
    tmp_block_dir: &Path,
    geometry: &BlockGeometry,
    surfaces: &BTreeMap<Label, Vec<usize>>,
) -> SkeletonResult<usize> {
    let header = PointFileHeader::new(geometry.volume_size(), geometry.block_size());
    let directory = tmp_block_dir.join("surfaces");
    for (&label, locals) in surfaces {
        let mut points = LabelPoints::with_capacity(label, locals.len());
        for &local in locals {
            points.push(geometry.local_to_global(local) as i64, local as i64);
        }
        PointFile::single(header, points).write_to(&label_file_path(&directory, label))?;
    }
    tracing::debug!(
        target: "synskel-thinning",
        block = %geometry.block_index(),
        labels = surfaces.len(),
        "Wrote block surfaces"
    );
    Ok(surfaces.len())
}

/// Merges each label's block surface files into `tmp_dir/surfaces/{label}.pts`.
///
/// Labels found in no block are skipped. Returns the number of files written.
pub fn combine_surfaces(
    tmp_dir: &Path,
    volume_size: Dims3,
    block_size: Dims3,
    start_block_index: Dims3,
    block_count: Dims3,
    labels: impl IntoIterator<Item = Label>,
) -> SkeletonResult<usize> {
    let geometry = BlockGeometry::new(volume_size, block_size, start_block_index)?;
    let header = PointFileHeader::new(volume_size, block_size);
    let mut written = 0;

    for label in labels {
        let mut globals: Vec<i64> = Vec::new();
        let mut found = false;
        for iz in start_block_index.z..start_block_index.z + block_count.z {
            for iy in start_block_index.y..start_block_index.y + block_count.y {
                for ix in start_block_index.x..start_block_index.x + block_count.x {
                    let directory = tmp_dir.join(block_stem(Dims3::new(iz, iy, ix))).join("surfaces");
                    let Some(file) = PointFile::read_if_exists(&label_file_path(&directory, label))? else {
                        continue;
                    };
                    found = true;
                    if let Some(points) = file.label(label) {
                        globals.extend_from_slice(&points.global_indices);
                    }
                }
            }
        }
        if !found {
            continue;
        }

        let mut points = LabelPoints::with_capacity(label, globals.len());
        for global in globals {
            let local = geometry.global_to_local(geometry.checked_global(global)?);
            points.push(global, local as i64);
        }
        PointFile::single(header, points)
            .write_to(&label_file_path(&tmp_dir.join("surfaces"), label))?;
        written += 1;
    }

    tracing::info!(target: "synskel-thinning", labels = written, "Combined surface files");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};
    use tempfile::tempdir;

    #[test]
    fn test_block_walls_are_not_surface() {
        let mut block = Array3::<i64>::zeros((3, 3, 3));
        block.slice_mut(s![.., .., 0..2]).fill(4);
        block.slice_mut(s![.., .., 2]).fill(5);
        let surfaces = extract_surfaces(block.view());

        // label 4 only touches label 5 along x = 1
        let dims = Dims3::new(3, 3, 3);
        let expected: Vec<usize> = dims
            .iter_coords()
            .filter(|c| c.x == 1)
            .map(|c| dims.index_of(c.z, c.y, c.x))
            .collect();
        assert_eq!(surfaces[&4], expected);
        assert_eq!(surfaces[&5].len(), 9);
    }

    #[test]
    fn test_interior_only_label_is_listed_empty() {
        let block = Array3::from_elem((2, 2, 2), 3i64);
        let surfaces = extract_surfaces(block.view());
        assert_eq!(surfaces.get(&3), Some(&Vec::new()));
    }

    #[test]
    fn test_combine_across_blocks() {
        let dir = tempdir().unwrap();
        let volume = Dims3::new(2, 2, 4);
        let block = Dims3::new(2, 2, 2);
        for ix in 0..2 {
            let geometry = BlockGeometry::new(volume, block, Dims3::new(0, 0, ix)).unwrap();
            let mut segmentation = Array3::<i64>::zeros((2, 2, 2));
            segmentation[[0, 0, 0]] = 1;
            segmentation[[0, 0, 1]] = 1;
            let surfaces = extract_surfaces(segmentation.view());
            let stem = block_stem(Dims3::new(0, 0, ix));
            write_block_surfaces(&dir.path().join(stem), &geometry, &surfaces).unwrap();
        }

        let written = combine_surfaces(dir.path(), volume, block, Dims3::default(), Dims3::new(1, 1, 2), [1, 2])
            .unwrap();
        assert_eq!(written, 1);
        let merged = PointFile::read_from(&label_file_path(&dir.path().join("surfaces"), 1)).unwrap();
        let points = merged.label(1).unwrap();
        assert_eq!(points.global_indices, vec![0, 1, 2, 3]);
        assert_eq!(points.local_indices, vec![0, 1, 0, 1]);
    }
}
