// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Anchor stitching between adjacent blocks.

For a face between a block and its +1 neighbor along one axis, every label present on both
sides of the face at the same position is thinned in 2-D. Each curve point becomes a fixed
point in both blocks: on the max wall of the current block and on the min wall of the
neighbor. The two blocks read these files before thinning, so their skeletons meet at the
same voxels.
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{s, Array2, ArrayView2, ArrayView3};
use synskel_serialization::{LabelPoints, PointFile, PointFileHeader};
use synskel_structures::{Axis, BlockGeometry, Dims3};

use crate::contour::{thin_image, ContourRule, FptaTable};
use crate::types::{expect_shape, Label, SkeletonError, SkeletonResult};

/// Which wall of a block an anchor file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WallSide {
    Min,
    Max,
}

impl WallSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            WallSide::Min => "min",
            WallSide::Max => "max",
        }
    }
}

/// `{dir}/{axis}-{min|max}-computed-anchor-points.pts`
pub fn anchor_file_path(directory: &Path, axis: Axis, side: WallSide) -> PathBuf {
    directory.join(format!(
        "{}-{}-computed-anchor-points.pts",
        axis.as_char(),
        side.as_str()
    ))
}

/// All six anchor files a block may receive, in reading order.
pub fn block_anchor_files(directory: &Path) -> Vec<PathBuf> {
    Axis::ALL
        .iter()
        .rev()
        .flat_map(|&axis| {
            [WallSide::Min, WallSide::Max]
                .map(|side| anchor_file_path(directory, axis, side))
        })
        .collect()
}

/// Cuts the shared face out of two adjacent blocks.
///
/// Returns the max wall of `current` and the min wall of `neighbor` along `axis`, shaped
/// `(rows, columns)` as given by [`Axis::face_axes`].
pub fn extract_walls<'a>(
    current: ArrayView3<'a, i64>,
    neighbor: ArrayView3<'a, i64>,
    axis: Axis,
) -> SkeletonResult<(ArrayView2<'a, i64>, ArrayView2<'a, i64>)> {
    let shape = current.shape();
    expect_shape(Dims3::new(shape[0], shape[1], shape[2]), neighbor.shape())?;
    let (depth, height, width) = current.dim();
    if depth == 0 || height == 0 || width == 0 {
        return Err(SkeletonError::InvalidInput("empty block".to_string()));
    }
    let walls = match axis {
        Axis::Z => (
            current.slice_move(s![depth - 1, .., ..]),
            neighbor.slice_move(s![0, .., ..]),
        ),
        Axis::Y => (
            current.slice_move(s![.., height - 1, ..]),
            neighbor.slice_move(s![.., 0, ..]),
        ),
        Axis::X => (
            current.slice_move(s![.., .., width - 1]),
            neighbor.slice_move(s![.., .., 0]),
        ),
    };
    Ok(walls)
}

/// What one stitching call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSummary {
    pub axis: Axis,
    pub labels: usize,
    pub points: usize,
    pub current_file: PathBuf,
    pub neighbor_file: PathBuf,
}

/// Local coordinates of a face pixel on the given wall of a block.
fn wall_voxel(axis: Axis, wall: usize, column: usize, row: usize) -> (usize, usize, usize) {
    match axis {
        Axis::Z => (wall, row, column),
        Axis::Y => (row, wall, column),
        Axis::X => (row, column, wall),
    }
}

/// Computes the anchors of one face and writes both anchor files.
///
/// `current_face` and `neighbor_face` are the touching walls as returned by
/// [`extract_walls`]. The deletability table is loaded from `lut_dir`.
#[allow(clippy::too_many_arguments)]
pub fn compute_anchor_points(
    lut_dir: &Path,
    current_dir: &Path,
    neighbor_dir: &Path,
    current_face: ArrayView2<'_, i64>,
    neighbor_face: ArrayView2<'_, i64>,
    volume_size: Dims3,
    block_size: Dims3,
    block_index: Dims3,
    axis: Axis,
) -> SkeletonResult<AnchorSummary> {
    let table = FptaTable::load(lut_dir)?;
    let current = BlockGeometry::new(volume_size, block_size, block_index)?;
    compute_anchor_points_with(
        &table,
        current_dir,
        neighbor_dir,
        current_face,
        neighbor_face,
        &current,
        axis,
    )
}

/// [`compute_anchor_points`] with an explicit 2-D thinning rule.
pub fn compute_anchor_points_with<R: ContourRule + ?Sized>(
    rule: &R,
    current_dir: &Path,
    neighbor_dir: &Path,
    current_face: ArrayView2<'_, i64>,
    neighbor_face: ArrayView2<'_, i64>,
    current: &BlockGeometry,
    axis: Axis,
) -> SkeletonResult<AnchorSummary> {
    let block = current.block_size();
    let (row_axis, column_axis) = axis.face_axes();
    let face_shape = (block.get(row_axis), block.get(column_axis));
    for face in [&current_face, &neighbor_face] {
        if face.dim() != face_shape {
            return Err(SkeletonError::ShapeMismatch {
                expected: Dims3::new(1, face_shape.0, face_shape.1),
                actual: Dims3::new(1, face.nrows(), face.ncols()),
            });
        }
    }

    let mut neighbor_index = current.block_index();
    neighbor_index = neighbor_index.with(axis, neighbor_index.get(axis) + 1);
    let neighbor = current.with_block_index(neighbor_index)?;

    // per label footprint of the overlap
    let mut footprints: BTreeMap<Label, Array2<bool>> = BTreeMap::new();
    for ((row, column), &label) in current_face.indexed_iter() {
        if label == 0 || neighbor_face[[row, column]] != label {
            continue;
        }
        footprints
            .entry(label)
            .or_insert_with(|| Array2::from_elem(face_shape, false))[[row, column]] = true;
    }

    let header = PointFileHeader::new(current.volume_size(), block);
    let mut current_file = PointFile::new(header);
    let mut neighbor_file = PointFile::new(header);
    let max_wall = block.get(axis) - 1;

    for (&label, footprint) in &footprints {
        let curve = thin_image(footprint, rule);
        let mut current_points = LabelPoints::with_capacity(label, curve.len());
        let mut neighbor_points = LabelPoints::with_capacity(label, curve.len());
        for &(column, row) in &curve {
            let (iz, iy, ix) = wall_voxel(axis, max_wall, column, row);
            current_points.push(
                current.local_coords_to_global(iz, iy, ix) as i64,
                current.local_index(iz, iy, ix) as i64,
            );
            let (iz, iy, ix) = wall_voxel(axis, 0, column, row);
            neighbor_points.push(
                neighbor.local_coords_to_global(iz, iy, ix) as i64,
                neighbor.local_index(iz, iy, ix) as i64,
            );
        }
        current_file.labels.push(current_points);
        neighbor_file.labels.push(neighbor_points);
    }

    let current_path = anchor_file_path(current_dir, axis, WallSide::Max);
    let neighbor_path = anchor_file_path(neighbor_dir, axis, WallSide::Min);
    current_file.write_to(&current_path)?;
    neighbor_file.write_to(&neighbor_path)?;

    let summary = AnchorSummary {
        axis,
        labels: footprints.len(),
        points: current_file.point_count(),
        current_file: current_path,
        neighbor_file: neighbor_path,
    };
    tracing::info!(
        target: "synskel-thinning",
        axis = %axis,
        block = %current.block_index(),
        labels = summary.labels,
        points = summary.points,
        "Computed anchor points"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::SimpleContourRule;
    use ndarray::Array3;
    use tempfile::tempdir;

    #[test]
    fn test_anchor_file_names() {
        let path = anchor_file_path(Path::new("tmp"), Axis::Y, WallSide::Max);
        assert_eq!(path, Path::new("tmp").join("y-max-computed-anchor-points.pts"));
        let files = block_anchor_files(Path::new("tmp"));
        assert_eq!(files.len(), 6);
        assert!(files[0].ends_with("x-min-computed-anchor-points.pts"));
    }

    #[test]
    fn test_walls_follow_face_axes() {
        let current = Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (z * 100 + y * 10 + x) as i64);
        let neighbor = current.mapv(|value| value + 1000);
        let (max_wall, min_wall) = extract_walls(current.view(), neighbor.view(), Axis::X).unwrap();
        assert_eq!(max_wall.dim(), (2, 3));
        assert_eq!(max_wall[[1, 2]], 123);
        assert_eq!(min_wall[[1, 2]], 1120);
    }

    #[test]
    fn test_anchors_mirror_across_the_face() {
        let dir = tempdir().unwrap();
        let current_dir = dir.path().join("0000z-0000y-0000x");
        let neighbor_dir = dir.path().join("0000z-0000y-0001x");
        let geometry =
            BlockGeometry::new(Dims3::new(4, 6, 10), Dims3::new(4, 6, 5), Dims3::default()).unwrap();

        let mut current = Array3::<i64>::zeros((4, 6, 5));
        let mut neighbor = Array3::<i64>::zeros((4, 6, 5));
        // label 8 crosses the face as a 2x3 patch, label 9 only touches one side
        current.slice_mut(s![1..3, 1..4, ..]).fill(8);
        neighbor.slice_mut(s![1..3, 1..4, ..]).fill(8);
        current[[0, 0, 4]] = 9;

        let (max_wall, min_wall) = extract_walls(current.view(), neighbor.view(), Axis::X).unwrap();
        let summary = compute_anchor_points_with(
            &SimpleContourRule,
            &current_dir,
            &neighbor_dir,
            max_wall,
            min_wall,
            &geometry,
            Axis::X,
        )
        .unwrap();
        assert_eq!(summary.labels, 1);
        assert!(summary.points > 0);

        let max_side = PointFile::read_from(&summary.current_file).unwrap();
        let min_side = PointFile::read_from(&summary.neighbor_file).unwrap();
        assert!(max_side.label(9).is_none());
        let max_points = max_side.label(8).unwrap();
        let min_points = min_side.label(8).unwrap();
        assert_eq!(max_points.len(), min_points.len());

        for ((max_global, max_local), (min_global, min_local)) in
            max_points.iter().zip(min_points.iter())
        {
            // one voxel apart along x in the volume, opposite walls in block space
            assert_eq!(min_global - max_global, 1);
            assert_eq!(max_local - min_local, 4);
            let (_, _, x) = geometry.local_coords(max_local as usize);
            assert_eq!(x, 4);
        }
    }

    #[test]
    fn test_empty_overlap_still_writes_both_files() {
        let dir = tempdir().unwrap();
        let geometry =
            BlockGeometry::new(Dims3::new(8, 4, 4), Dims3::new(4, 4, 4), Dims3::default()).unwrap();
        let current = Array2::<i64>::from_elem((4, 4), 3);
        let neighbor = Array2::<i64>::from_elem((4, 4), 5);

        let summary = compute_anchor_points_with(
            &SimpleContourRule,
            dir.path(),
            &dir.path().join("next"),
            current.view(),
            neighbor.view(),
            &geometry,
            Axis::Z,
        )
        .unwrap();
        assert_eq!(summary.points, 0);
        assert_eq!(PointFile::read_from(&summary.current_file).unwrap().labels.len(), 0);
        assert!(summary.neighbor_file.exists());
    }

    #[test]
    fn test_rejects_neighbor_outside_volume() {
        let dir = tempdir().unwrap();
        let geometry =
            BlockGeometry::new(Dims3::new(4, 4, 4), Dims3::new(4, 4, 4), Dims3::default()).unwrap();
        let face = Array2::<i64>::zeros((4, 4));
        let result = compute_anchor_points_with(
            &SimpleContourRule,
            dir.path(),
            dir.path(),
            face.view(),
            face.view(),
            &geometry,
            Axis::Y,
        );
        assert!(matches!(result, Err(SkeletonError::Geometry(_))));
    }
}
