// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Directional topological thinning of one segment.

Each iteration makes six directional passes in [`Direction::ALL`] order. A pass first
collects the live-surface voxels whose neighbor in the pass direction is background and
that are simple, then deletes them one at a time, re-checking simplicity against the
current state before every deletion. Thinning stops after an iteration that removes
nothing.

Anchors, soma-surface voxels and border-face voxels on the wall opposite the pass
direction are never removed. While eroding, each voxel carries a width: the distance from
the original boundary, relaxed through every deleted voxel.
*/

use ahash::AHashMap;
use synskel_serialization::{LabelPoints, LabelValues, PointFile, PointFileHeader, WidthFile};
use synskel_structures::{BlockGeometry, Direction, VoxelStatus, N26_DELTAS};

use crate::oracle::SimplePointOracle;
use crate::segment::Segment;
use crate::types::{Label, Resolution};
use crate::worklist::{Worklist, WorklistHandle};

/// Result of thinning one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ThinningOutcome {
    pub label: Label,
    /// Surviving voxels as padded indices, live surface first in worklist order, then the
    /// remaining anchors and unexposed voxels in ascending order.
    pub skeleton: Vec<usize>,
    /// Width of each skeleton voxel, parallel to `skeleton`.
    pub widths: Vec<f32>,
    pub iterations: usize,
    pub removed: usize,
}

impl ThinningOutcome {
    /// Skeleton as a single-label point file with global and local indices.
    pub fn to_point_file(&self, geometry: &BlockGeometry) -> PointFile {
        let header = PointFileHeader::new(geometry.volume_size(), geometry.block_size());
        let mut points = LabelPoints::with_capacity(self.label, self.skeleton.len());
        for &padded in &self.skeleton {
            let local = geometry.padded_to_local(padded);
            points.push(geometry.local_to_global(local) as i64, local as i64);
        }
        PointFile::single(header, points)
    }

    pub fn to_width_file(&self, geometry: &BlockGeometry) -> WidthFile {
        let header = PointFileHeader::new(geometry.volume_size(), geometry.block_size());
        let mut values = LabelValues::new(self.label);
        for (&padded, &width) in self.skeleton.iter().zip(&self.widths) {
            values.push(geometry.padded_to_global(padded) as i64, width);
        }
        WidthFile::single(header, values)
    }
}

/// Thins segments of one block against a simple-point oracle.
pub struct SegmentThinner<'a, O: SimplePointOracle + ?Sized> {
    oracle: &'a O,
    geometry: &'a BlockGeometry,
    n6_offsets: [isize; 6],
    n26_offsets: [isize; 26],
    n26_distances: [f32; 26],
}

impl<'a, O: SimplePointOracle + ?Sized> SegmentThinner<'a, O> {
    pub fn new(oracle: &'a O, geometry: &'a BlockGeometry, resolution: Resolution) -> Self {
        let padded = geometry.padded_block_size();
        let n26_distances = N26_DELTAS.map(|(dz, dy, dx)| {
            let z = resolution[0] * dz as f32;
            let y = resolution[1] * dy as f32;
            let x = resolution[2] * dx as f32;
            (z * z + y * y + x * x).sqrt()
        });
        Self {
            oracle,
            geometry,
            n6_offsets: padded.n6_offsets(),
            n26_offsets: padded.n26_offsets(),
            n26_distances,
        }
    }

    #[inline]
    fn neighbor(index: usize, offset: isize) -> usize {
        // padded indices of block voxels keep every neighbor offset in range
        index.wrapping_add_signed(offset)
    }

    /// Occupancy pattern of the 26 neighbors, bit `k` for delta `k`.
    #[inline]
    fn neighborhood(&self, segment: &Segment, index: usize) -> u32 {
        self.n26_offsets
            .iter()
            .enumerate()
            .fold(0u32, |pattern, (bit, &offset)| {
                if segment.contains(Self::neighbor(index, offset)) {
                    pattern | (1 << bit)
                } else {
                    pattern
                }
            })
    }

    #[inline]
    fn is_simple(&self, segment: &Segment, index: usize) -> bool {
        self.oracle.is_simple(self.neighborhood(segment, index))
    }

    /// Seeds the live surface and the initial widths.
    ///
    /// A voxel is on the boundary when one of its 6-neighbors inside the block is
    /// background; halo neighbors do not count. Boundary voxels get width 0 and, if plain
    /// interior, move to the live surface.
    fn collect_surface(
        &self,
        segment: &mut Segment,
        worklist: &mut Worklist,
        widths: &mut AHashMap<usize, f32>,
    ) {
        for (index, status) in segment.sorted_voxels() {
            widths.insert(index, f32::MAX);
            let exposed = self.n6_offsets.iter().any(|&offset| {
                let neighbor = Self::neighbor(index, offset);
                !self.geometry.is_halo(neighbor) && !segment.contains(neighbor)
            });
            if !exposed {
                continue;
            }
            if status == VoxelStatus::Interior {
                segment.set_status(index, VoxelStatus::Surface);
                worklist.push_back(index);
            }
            widths.insert(index, 0.0);
        }
    }

    /// Thins one segment to its skeleton.
    pub fn thin(&self, mut segment: Segment) -> ThinningOutcome {
        let label = segment.label();
        let mut worklist = Worklist::with_capacity(segment.len());
        let mut widths = AHashMap::with_capacity(segment.len());

        self.collect_surface(&mut segment, &mut worklist, &mut widths);
        tracing::debug!(
            target: "synskel-thinning",
            label,
            voxels = segment.len(),
            surface = worklist.len(),
            "Collected initial surface"
        );

        let mut iterations = 0;
        let mut removed = 0;
        loop {
            iterations += 1;
            let changed: usize = Direction::ALL
                .iter()
                .map(|&direction| {
                    self.directional_pass(
                        direction,
                        &mut segment,
                        &mut worklist,
                        &mut widths,
                    )
                })
                .sum();
            removed += changed;
            tracing::debug!(
                target: "synskel-thinning",
                label,
                iteration = iterations,
                removed = changed,
                "Thinning iteration"
            );
            if changed == 0 {
                break;
            }
        }

        let mut skeleton: Vec<usize> = worklist.iter().map(|(_, index)| index).collect();
        let mut rest: Vec<usize> = segment
            .sorted_voxels()
            .into_iter()
            .filter(|&(_, status)| matches!(status, VoxelStatus::Interior | VoxelStatus::Anchor))
            .map(|(index, _)| index)
            .collect();
        skeleton.append(&mut rest);
        let widths = skeleton
            .iter()
            .map(|index| widths.get(index).copied().unwrap_or(f32::MAX))
            .collect();

        tracing::info!(
            target: "synskel-thinning",
            label,
            iterations,
            removed,
            remaining = skeleton.len(),
            "Thinned segment"
        );
        ThinningOutcome {
            label,
            skeleton,
            widths,
            iterations,
            removed,
        }
    }

    fn directional_pass(
        &self,
        direction: Direction,
        segment: &mut Segment,
        worklist: &mut Worklist,
        widths: &mut AHashMap<usize, f32>,
    ) -> usize {
        let step = self.n6_offsets[direction.index()];
        let candidates: Vec<(WorklistHandle, usize)> = worklist
            .iter()
            .filter(|&(_, index)| {
                segment.status(index) == VoxelStatus::Surface
                    && !segment.contains(Self::neighbor(index, step))
                    && self.is_simple(segment, index)
            })
            .collect();

        let mut changed = 0;
        for (handle, index) in candidates {
            if segment.is_protected(index, direction) || !self.is_simple(segment, index) {
                continue;
            }
            segment.set_status(index, VoxelStatus::Background);

            for &offset in &self.n6_offsets {
                let neighbor = Self::neighbor(index, offset);
                if segment.status(neighbor) == VoxelStatus::Interior {
                    segment.set_status(neighbor, VoxelStatus::Surface);
                    worklist.push_back(neighbor);
                }
            }

            let width = widths.get(&index).copied().unwrap_or(f32::MAX);
            for (&offset, &distance) in self.n26_offsets.iter().zip(&self.n26_distances) {
                let neighbor = Self::neighbor(index, offset);
                if !segment.contains(neighbor) {
                    continue;
                }
                let through = width + distance;
                let current = widths.entry(neighbor).or_insert(f32::MAX);
                if through < *current {
                    *current = through;
                }
            }

            worklist.remove(handle);
            changed += 1;
        }
        changed
    }
}

/// Thins one segment with a fresh [`SegmentThinner`].
pub fn thin_segment<O: SimplePointOracle + ?Sized>(
    segment: Segment,
    geometry: &BlockGeometry,
    resolution: Resolution,
    oracle: &O,
) -> ThinningOutcome {
    SegmentThinner::new(oracle, geometry, resolution).thin(segment)
}
