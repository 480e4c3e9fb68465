// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Voxel classification for one block.

Builds, per label present in the block, the segment map (padded index to status), the
six border-face sets and the fixed points. Cell bodies come from a downsampled soma
volume: their interior is dropped from the segment and their surface is kept as
[`VoxelStatus::SomaSurface`].
*/

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use ndarray::ArrayView3;
use synskel_serialization::PointFile;
use synskel_structures::{BlockGeometry, Dims3, Direction, VoxelStatus};

use crate::types::{expect_shape, Label, SkeletonError, SkeletonResult};

/// Voxels of one label inside one block, keyed by padded index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    label: Label,
    voxels: AHashMap<usize, VoxelStatus>,
    borders: [AHashSet<usize>; 6],
    fixed_points: BTreeSet<usize>,
}

impl Segment {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            voxels: AHashMap::new(),
            borders: Default::default(),
            fixed_points: BTreeSet::new(),
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    #[inline]
    pub fn status(&self, padded: usize) -> VoxelStatus {
        self.voxels
            .get(&padded)
            .copied()
            .unwrap_or(VoxelStatus::Background)
    }

    #[inline]
    pub fn contains(&self, padded: usize) -> bool {
        self.voxels.contains_key(&padded)
    }

    pub fn set_status(&mut self, padded: usize, status: VoxelStatus) {
        if status == VoxelStatus::Background {
            self.voxels.remove(&padded);
        } else {
            self.voxels.insert(padded, status);
        }
    }

    /// Marks a voxel as a must-keep anchor.
    pub fn add_fixed_point(&mut self, padded: usize) {
        self.voxels.insert(padded, VoxelStatus::Anchor);
        self.fixed_points.insert(padded);
    }

    pub fn fixed_points(&self) -> &BTreeSet<usize> {
        &self.fixed_points
    }

    /// Border-face voxels of one block wall.
    pub fn border(&self, wall: Direction) -> &AHashSet<usize> {
        &self.borders[wall.index()]
    }

    /// True if erosion in `direction` may not remove this voxel.
    #[inline]
    pub fn is_protected(&self, padded: usize, direction: Direction) -> bool {
        self.borders[direction.protected_wall().index()].contains(&padded)
    }

    /// `(padded index, status)` pairs in ascending index order.
    pub fn sorted_voxels(&self) -> Vec<(usize, VoxelStatus)> {
        let mut voxels: Vec<_> = self.voxels.iter().map(|(&k, &v)| (k, v)).collect();
        voxels.sort_unstable_by_key(|&(padded, _)| padded);
        voxels
    }
}

/// Cell-body voxels split into interior and surface, per label, as padded indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SomataVoxels {
    pub interior: AHashMap<Label, AHashSet<usize>>,
    pub surface: BTreeMap<Label, BTreeSet<usize>>,
}

impl SomataVoxels {
    fn is_interior(&self, label: Label, padded: usize) -> bool {
        self.interior
            .get(&label)
            .is_some_and(|voxels| voxels.contains(&padded))
    }
}

/// Upsamples a downsampled soma volume into interior and surface voxels.
///
/// Each downsampled voxel covers a `rate³` cube. Faces of that cube whose downsampled
/// 6-neighbor inside the block carries a different label become surface.
pub fn populate_somata(
    somata: ArrayView3<'_, i64>,
    rate: usize,
    geometry: &BlockGeometry,
) -> SkeletonResult<SomataVoxels> {
    let block = geometry.block_size();
    if rate == 0 || block.z % rate != 0 || block.y % rate != 0 || block.x % rate != 0 {
        return Err(SkeletonError::InvalidInput(format!(
            "somata downsample rate {} does not divide block size {}",
            rate, block
        )));
    }
    let down = Dims3::new(block.z / rate, block.y / rate, block.x / rate);
    expect_shape(down, somata.shape())?;

    let mut result = SomataVoxels::default();
    for coords in down.iter_coords() {
        let label = somata[[coords.z, coords.y, coords.x]];
        if label == 0 {
            continue;
        }

        let mut exposed = [false; 6];
        for direction in Direction::ALL {
            let (dz, dy, dx) = direction.delta();
            let neighbor = (
                coords.z.checked_add_signed(dz),
                coords.y.checked_add_signed(dy),
                coords.x.checked_add_signed(dx),
            );
            // neighbors outside the block are not known here
            let (Some(nz), Some(ny), Some(nx)) = neighbor else {
                continue;
            };
            if nz >= down.z || ny >= down.y || nx >= down.x {
                continue;
            }
            if somata[[nz, ny, nx]] != label {
                exposed[direction.index()] = true;
            }
        }

        let surface = result.surface.entry(label).or_default();
        let interior = result.interior.entry(label).or_default();
        let (z0, y0, x0) = (coords.z * rate, coords.y * rate, coords.x * rate);
        for iz in z0..z0 + rate {
            for iy in y0..y0 + rate {
                for ix in x0..x0 + rate {
                    let on_face = (exposed[Direction::North.index()] && iz == z0)
                        || (exposed[Direction::Up.index()] && iy == y0)
                        || (exposed[Direction::West.index()] && ix == x0)
                        || (exposed[Direction::South.index()] && iz == z0 + rate - 1)
                        || (exposed[Direction::Down.index()] && iy == y0 + rate - 1)
                        || (exposed[Direction::East.index()] && ix == x0 + rate - 1);
                    let padded = geometry.local_to_padded(geometry.local_index(iz, iy, ix));
                    if on_face {
                        surface.insert(padded);
                    } else {
                        interior.insert(padded);
                    }
                }
            }
        }
    }
    Ok(result)
}

/// Everything thinning needs to know about one block.
#[derive(Debug, Clone)]
pub struct BlockClassification {
    geometry: BlockGeometry,
    segments: BTreeMap<Label, Segment>,
    somata_surfaces: BTreeMap<Label, BTreeSet<usize>>,
}

impl BlockClassification {
    /// Classify every labelled voxel of a block.
    ///
    /// `somata` is the downsampled soma volume; it is only used when `somata_downsample_rate`
    /// is nonzero.
    pub fn classify(
        segmentation: ArrayView3<'_, i64>,
        somata: Option<ArrayView3<'_, i64>>,
        somata_downsample_rate: usize,
        geometry: BlockGeometry,
    ) -> SkeletonResult<Self> {
        let block = geometry.block_size();
        expect_shape(block, segmentation.shape())?;

        let somata = match (somata, somata_downsample_rate) {
            (Some(volume), rate) if rate > 0 => populate_somata(volume, rate, &geometry)?,
            (Some(_), _) => {
                return Err(SkeletonError::InvalidInput(
                    "somata volume given with a downsample rate of 0".to_string(),
                ))
            }
            (None, _) => SomataVoxels::default(),
        };

        let mut segments: BTreeMap<Label, Segment> = BTreeMap::new();
        for ((iz, iy, ix), &label) in segmentation.indexed_iter() {
            if label == 0 {
                continue;
            }
            let padded = geometry.local_to_padded(geometry.local_index(iz, iy, ix));
            let segment = segments
                .entry(label)
                .or_insert_with(|| Segment::new(label));

            if !somata.is_interior(label, padded) {
                segment.voxels.insert(padded, VoxelStatus::Interior);
            }
            for wall in geometry.border_walls(iz, iy, ix) {
                segment.borders[wall.index()].insert(padded);
            }
        }

        for (label, surface) in &somata.surface {
            if let Some(segment) = segments.get_mut(label) {
                for &padded in surface {
                    segment.voxels.insert(padded, VoxelStatus::SomaSurface);
                }
            }
        }

        Ok(Self {
            geometry,
            segments,
            somata_surfaces: somata.surface,
        })
    }

    pub fn geometry(&self) -> &BlockGeometry {
        &self.geometry
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.segments.keys().copied()
    }

    pub fn segment(&self, label: Label) -> Option<&Segment> {
        self.segments.get(&label)
    }

    pub fn somata_surfaces(&self) -> &BTreeMap<Label, BTreeSet<usize>> {
        &self.somata_surfaces
    }

    /// Add the points of a local-coordinate point file as fixed points.
    ///
    /// Returns the number of points applied; points of labels without a segment in this
    /// block are skipped.
    pub fn apply_fixed_points(&mut self, points: &PointFile, origin: &Path) -> SkeletonResult<usize> {
        let mut applied = 0;
        for label_points in &points.labels {
            let Some(segment) = self.segments.get_mut(&label_points.label) else {
                tracing::debug!(
                    target: "synskel-thinning",
                    label = label_points.label,
                    path = %origin.display(),
                    "Skipping fixed points of a label absent from the block"
                );
                continue;
            };
            for &local in &label_points.local_indices {
                let local = self.geometry.checked_local(local)?;
                segment.add_fixed_point(self.geometry.local_to_padded(local));
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Hands out the segments, consuming the classification.
    pub fn into_parts(self) -> (BlockGeometry, BTreeMap<Label, Segment>, BTreeMap<Label, BTreeSet<usize>>) {
        (self.geometry, self.segments, self.somata_surfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use synskel_serialization::{LabelPoints, PointFileHeader};

    fn geometry(size: usize) -> BlockGeometry {
        let dims = Dims3::new(size, size, size);
        BlockGeometry::new(dims, dims, Dims3::default()).unwrap()
    }

    #[test]
    fn test_classification_is_idempotent() {
        let seg = Array3::from_shape_fn((4, 4, 4), |(z, y, x)| ((z + y + x) % 3) as i64);
        let first = BlockClassification::classify(seg.view(), None, 0, geometry(4)).unwrap();
        let second = BlockClassification::classify(seg.view(), None, 0, geometry(4)).unwrap();
        assert_eq!(first.segments, second.segments);
        assert_eq!(first.labels().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_border_sets_skip_edges_and_corners() {
        let seg = Array3::from_elem((4, 4, 4), 5i64);
        let classification = BlockClassification::classify(seg.view(), None, 0, geometry(4)).unwrap();
        let segment = classification.segment(5).unwrap();
        // each wall of a 4x4 face keeps its 2x2 center
        for wall in Direction::ALL {
            assert_eq!(segment.border(wall).len(), 4, "wall {}", wall);
        }
        let g = classification.geometry();
        let center_of_west = g.local_to_padded(g.local_index(1, 2, 0));
        assert!(segment.is_protected(center_of_west, Direction::East));
        assert!(!segment.is_protected(center_of_west, Direction::West));
    }

    #[test]
    fn test_somata_split_interior_and_surface() {
        let g = geometry(4);
        let seg = Array3::from_elem((4, 4, 4), 9i64);
        let mut somata = Array3::zeros((2, 2, 2));
        somata[[0, 0, 0]] = 9;
        somata[[0, 0, 1]] = 9;

        let classification = BlockClassification::classify(seg.view(), Some(somata.view()), 2, g).unwrap();
        let surface = &classification.somata_surfaces()[&9];
        let segment = classification.segment(9).unwrap();

        // the two cubes touch along x and both lie on the low walls of the block,
        // so only their +z and +y faces are exposed
        let hidden = g.local_to_padded(g.local_index(0, 0, 1));
        assert!(!surface.contains(&hidden));
        assert!(!segment.contains(hidden));
        let on_wall = g.local_to_padded(g.local_index(0, 0, 2));
        assert!(!surface.contains(&on_wall));
        let south = g.local_to_padded(g.local_index(1, 0, 0));
        assert!(surface.contains(&south));
        assert_eq!(segment.status(south), VoxelStatus::SomaSurface);
        let down = g.local_to_padded(g.local_index(0, 1, 3));
        assert!(surface.contains(&down));
        // outside the soma the segment keeps plain interior voxels
        let outside = g.local_to_padded(g.local_index(3, 3, 3));
        assert_eq!(segment.status(outside), VoxelStatus::Interior);
        assert_eq!(surface.len(), 2 * 2 * 4 - 4);
    }

    #[test]
    fn test_fixed_points_ignore_missing_labels() {
        let g = geometry(4);
        let seg = Array3::from_elem((4, 4, 4), 3i64);
        let mut classification = BlockClassification::classify(seg.view(), None, 0, g).unwrap();

        let header = PointFileHeader::new(g.volume_size(), g.block_size());
        let mut present = LabelPoints::new(3);
        present.push(5, 5);
        let mut absent = LabelPoints::new(4);
        absent.push(6, 6);
        let file = PointFile {
            header,
            labels: vec![present, absent],
        };

        let applied = classification
            .apply_fixed_points(&file, Path::new("synapses.pts"))
            .unwrap();
        assert_eq!(applied, 1);
        let segment = classification.segment(3).unwrap();
        let padded = g.local_to_padded(5);
        assert_eq!(segment.status(padded), VoxelStatus::Anchor);
        assert!(segment.fixed_points().contains(&padded));
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let seg = Array3::<i64>::zeros((4, 4, 3));
        assert!(matches!(
            BlockClassification::classify(seg.view(), None, 0, geometry(4)),
            Err(SkeletonError::ShapeMismatch { .. })
        ));
    }
}
