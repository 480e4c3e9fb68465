// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Skeleton refinement.

Gathers every block's thinned skeleton, soma surface and synapses for one label, then keeps
only the voxels on shortest paths from each fixed point back to the sources. Sources are the
soma-surface voxels, or the smallest fixed point when the label has no soma. Edges join
26-neighbors and weigh the physical distance between voxel centers.
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use synskel_serialization::{
    block_stem, label_file_path, DistanceFile, LabelPoints, LabelValues, PointFile,
    PointFileHeader,
};
use synskel_structures::{BlockGeometry, Dims3, VoxelStatus, N26_DELTAS};

use crate::heap::IndexedMinHeap;
use crate::types::{Label, Resolution, SkeletonError, SkeletonResult};

/// Counts and files produced by refining one label.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementSummary {
    pub label: Label,
    pub points_before: usize,
    pub points_after: usize,
    pub fixed_points: usize,
    /// Fixed points no source could reach
    pub unreachable: usize,
    pub skeleton_file: PathBuf,
    pub distance_file: PathBuf,
}

/// One label's merged voxels, keyed by padded global index.
struct LabelGraph {
    geometry: BlockGeometry,
    voxels: BTreeMap<usize, VoxelStatus>,
    fixed_points: Vec<usize>,
    soma_exists: bool,
}

impl LabelGraph {
    fn new(geometry: BlockGeometry) -> Self {
        Self {
            geometry,
            voxels: BTreeMap::new(),
            fixed_points: Vec::new(),
            soma_exists: false,
        }
    }

    fn merge(&mut self, points: &LabelPoints, status: VoxelStatus) -> SkeletonResult<()> {
        for &global in &points.global_indices {
            let global = self.geometry.checked_global(global)?;
            let padded = self.geometry.global_to_padded_global(global);
            self.voxels.insert(padded, status);
            if status == VoxelStatus::Anchor {
                self.fixed_points.push(padded);
            }
        }
        Ok(())
    }

    /// Voxels of one status as a point file with global and block-local indices.
    fn export(&self, label: Label, status: VoxelStatus) -> PointFile {
        let header = PointFileHeader::new(self.geometry.volume_size(), self.geometry.block_size());
        let mut points = LabelPoints::new(label);
        for (&padded, _) in self.voxels.iter().filter(|&(_, &s)| s == status) {
            let global = self.geometry.padded_global_to_global(padded);
            points.push(global as i64, self.geometry.global_to_local(global) as i64);
        }
        PointFile::single(header, points)
    }
}

#[derive(Debug, Clone, Copy)]
struct PathNode {
    distance: f32,
    previous: Option<usize>,
    discovered: bool,
}

/// Refines the skeleton of `label` over a footprint of blocks.
///
/// Reads `tmp_dir/{block}/somata_surfaces`, `tmp_dir/{block}/skeletons` and
/// `synapse_dir/{block}.pts` for every block from `start_block_index` spanning
/// `block_count`. Returns `None` without writing anything when the label has no fixed
/// points.
#[allow(clippy::too_many_arguments)]
pub fn skeleton_refinement(
    tmp_dir: &Path,
    synapse_dir: &Path,
    output_dir: &Path,
    label: Label,
    resolution: Resolution,
    volume_size: Dims3,
    block_size: Dims3,
    start_block_index: Dims3,
    block_count: Dims3,
) -> SkeletonResult<Option<RefinementSummary>> {
    let geometry = BlockGeometry::new(volume_size, block_size, start_block_index)?;
    let mut graph = LabelGraph::new(geometry);

    for iz in start_block_index.z..start_block_index.z + block_count.z {
        for iy in start_block_index.y..start_block_index.y + block_count.y {
            for ix in start_block_index.x..start_block_index.x + block_count.x {
                let stem = block_stem(Dims3::new(iz, iy, ix));
                let block_dir = tmp_dir.join(&stem);

                // somata first so skeletons and synapses override their status
                let somata_path = label_file_path(&block_dir.join("somata_surfaces"), label);
                if let Some(file) = PointFile::read_if_exists(&somata_path)? {
                    if let Some(points) = file.label(label) {
                        graph.merge(points, VoxelStatus::SomaSurface)?;
                    }
                    graph.soma_exists = true;
                }

                let skeleton_path = label_file_path(&block_dir.join("skeletons"), label);
                if let Some(file) = PointFile::read_if_exists(&skeleton_path)? {
                    if let Some(points) = file.label(label) {
                        graph.merge(points, VoxelStatus::Interior)?;
                    }
                }

                let synapse_path = synapse_dir.join(format!("{}.pts", stem));
                let synapses = PointFile::read_from(&synapse_path)?;
                if let Some(points) = synapses.label(label) {
                    graph.merge(points, VoxelStatus::Anchor)?;
                }
            }
        }
    }

    graph.fixed_points.sort_unstable();
    graph.fixed_points.dedup();
    if graph.fixed_points.is_empty() {
        tracing::debug!(target: "synskel-thinning", label, "No fixed points, skipping refinement");
        return Ok(None);
    }

    for (directory, status) in [
        ("synapses", VoxelStatus::Anchor),
        ("somata_surfaces", VoxelStatus::SomaSurface),
        ("skeletons", VoxelStatus::Interior),
    ] {
        let path = label_file_path(&tmp_dir.join(directory), label);
        graph.export(label, status).write_to(&path)?;
    }

    if !graph.soma_exists {
        // the smallest fixed point roots the tree
        let root = graph.fixed_points[0];
        graph.voxels.insert(root, VoxelStatus::Surface);
    }

    let points_before = graph.voxels.len();
    tracing::info!(target: "synskel-thinning", label, points = points_before, "Points before refinement");

    let (order, nodes) = shortest_paths(&graph, resolution);
    let position: AHashMap<usize, usize> = order
        .iter()
        .enumerate()
        .map(|(id, &padded)| (padded, id))
        .collect();

    let mut refined: BTreeMap<usize, f32> = BTreeMap::new();
    let mut unreachable = 0;
    for &fixed in &graph.fixed_points {
        let Some(&start) = position.get(&fixed) else {
            return Err(SkeletonError::InvalidInput(format!(
                "fixed point {} missing from label {}",
                fixed, label
            )));
        };
        if !nodes[start].discovered {
            unreachable += 1;
        }
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let padded = order[id];
            if graph.voxels.get(&padded) != Some(&VoxelStatus::SomaSurface) {
                refined.insert(padded, nodes[id].distance);
            }
            cursor = nodes[id].previous;
        }
    }
    if unreachable > 0 {
        tracing::warn!(target: "synskel-thinning", label, unreachable, "Fixed points not connected to a source");
    }

    let header = PointFileHeader::new(volume_size, block_size);
    let mut points = LabelPoints::with_capacity(label, refined.len());
    let mut distances = LabelValues::new(label);
    for (&padded, &distance) in &refined {
        let global = geometry.padded_global_to_global(padded);
        points.push(global as i64, geometry.global_to_local(global) as i64);
        distances.push(global as i64, distance);
    }

    let skeleton_file = label_file_path(&output_dir.join("skeletons"), label);
    let distance_file = label_file_path(&output_dir.join("distances"), label);
    PointFile::single(header, points).write_to(&skeleton_file)?;
    DistanceFile::single(header, distances).write_to(&distance_file)?;

    tracing::info!(target: "synskel-thinning", label, points = refined.len(), "Points after refinement");
    Ok(Some(RefinementSummary {
        label,
        points_before,
        points_after: refined.len(),
        fixed_points: graph.fixed_points.len(),
        unreachable,
        skeleton_file,
        distance_file,
    }))
}

/// Multi-source Dijkstra over the label's voxels.
///
/// Returns the voxels in ascending order and their path nodes, indexed alike.
fn shortest_paths(graph: &LabelGraph, resolution: Resolution) -> (Vec<usize>, Vec<PathNode>) {
    let padded = graph.geometry.padded_volume_size();
    let infinity = (padded.z * padded.z + padded.y * padded.y + padded.x * padded.x) as f32;
    let offsets = padded.n26_offsets();
    let lengths = N26_DELTAS.map(|(dz, dy, dx)| {
        let z = resolution[0] * dz as f32;
        let y = resolution[1] * dy as f32;
        let x = resolution[2] * dx as f32;
        (z * z + y * y + x * x).sqrt()
    });

    let order: Vec<usize> = graph.voxels.keys().copied().collect();
    let position: AHashMap<usize, usize> = order
        .iter()
        .enumerate()
        .map(|(id, &voxel)| (voxel, id))
        .collect();
    let mut nodes = vec![
        PathNode {
            distance: infinity,
            previous: None,
            discovered: false,
        };
        order.len()
    ];

    let mut heap = IndexedMinHeap::with_capacity(order.len());
    for (id, status) in graph.voxels.values().enumerate() {
        if status.is_source() {
            nodes[id].distance = 0.0;
            nodes[id].discovered = true;
            heap.push_or_decrease(id, 0.0);
        }
    }

    while let Some((current, distance)) = heap.pop() {
        let voxel = order[current];
        for (&offset, &length) in offsets.iter().zip(&lengths) {
            let Some(&neighbor) = position.get(&voxel.wrapping_add_signed(offset)) else {
                continue;
            };
            let through = distance + length;
            let node = &mut nodes[neighbor];
            if !node.discovered {
                node.previous = Some(current);
                node.distance = through;
                node.discovered = true;
                heap.push_or_decrease(neighbor, through);
            } else if through < node.distance {
                node.previous = Some(current);
                node.distance = through;
                heap.decrease_key(neighbor, through);
            }
        }
    }
    (order, nodes)
}
