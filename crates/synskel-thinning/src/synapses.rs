// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Synapse preparation: snapping synapses onto object surfaces and bucketing them into the
//! per-block files thinning and refinement read.

use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use synskel_serialization::{block_stem, LabelPoints, PointFile, PointFileHeader};
use synskel_structures::{BlockGeometry, Dims3};

use crate::types::{Label, Resolution, SkeletonResult};

/// Synapses farther than this from every surface voxel are dropped.
pub const DEFAULT_MAX_DEVIATION: f32 = 800.0;

/// Outcome of projecting one label's synapses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynapseProjection {
    /// Global indices of the surface voxels the synapses snapped to
    pub projected: Vec<usize>,
    pub missed: usize,
}

fn physical(coords: (usize, usize, usize), resolution: Resolution) -> [f32; 3] {
    [
        coords.0 as f32 * resolution[0],
        coords.1 as f32 * resolution[1],
        coords.2 as f32 * resolution[2],
    ]
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dz = a[0] - b[0];
    let dy = a[1] - b[1];
    let dx = a[2] - b[2];
    (dz * dz + dy * dy + dx * dx).sqrt()
}

/// Snaps each synapse to its nearest surface voxel.
///
/// `surface` holds global indices of one label's surface, `synapses` voxel coordinates in
/// `(z, y, x)`. A synapse is kept when its nearest surface voxel lies closer than
/// `max_deviation` in physical units.
pub fn project_synapses(
    surface: &[usize],
    synapses: &[(usize, usize, usize)],
    volume_size: Dims3,
    resolution: Resolution,
    max_deviation: f32,
) -> SynapseProjection {
    let cloud: Vec<[f32; 3]> = surface
        .iter()
        .map(|&global| physical(volume_size.coords_of(global), resolution))
        .collect();

    let nearest = |synapse: &(usize, usize, usize)| -> Option<usize> {
        let position = physical(*synapse, resolution);
        cloud
            .iter()
            .enumerate()
            .map(|(slot, &point)| (slot, distance(position, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|&(_, d)| d < max_deviation)
            .map(|(slot, _)| surface[slot])
    };

    #[cfg(feature = "parallel")]
    let snapped: Vec<Option<usize>> = synapses.par_iter().map(nearest).collect();
    #[cfg(not(feature = "parallel"))]
    let snapped: Vec<Option<usize>> = synapses.iter().map(nearest).collect();

    let missed = snapped.iter().filter(|hit| hit.is_none()).count();
    let projected: Vec<usize> = snapped.into_iter().flatten().collect();
    tracing::debug!(
        target: "synskel-thinning",
        projected = projected.len(),
        missed,
        "Projected synapses onto surface"
    );
    SynapseProjection { projected, missed }
}

/// Writes `synapse_dir/{block}.pts` for every block of the footprint.
///
/// Blocks without synapses get an empty file, since thinning requires one per block.
/// Synapses outside the footprint are skipped. Returns the number of points written.
pub fn write_block_synapse_files(
    synapse_dir: &Path,
    volume_size: Dims3,
    block_size: Dims3,
    start_block_index: Dims3,
    block_count: Dims3,
    per_label: &BTreeMap<Label, Vec<usize>>,
) -> SkeletonResult<usize> {
    let geometry = BlockGeometry::new(volume_size, block_size, start_block_index)?;
    let end = Dims3::new(
        start_block_index.z + block_count.z,
        start_block_index.y + block_count.y,
        start_block_index.x + block_count.x,
    );
    let inside = |block: Dims3| {
        (start_block_index.z..end.z).contains(&block.z)
            && (start_block_index.y..end.y).contains(&block.y)
            && (start_block_index.x..end.x).contains(&block.x)
    };

    let mut buckets: BTreeMap<Dims3, BTreeMap<Label, Vec<usize>>> = BTreeMap::new();
    let mut skipped = 0;
    for (&label, globals) in per_label {
        for &global in globals {
            let block = geometry.block_of_global(global);
            if !inside(block) {
                skipped += 1;
                continue;
            }
            buckets
                .entry(block)
                .or_default()
                .entry(label)
                .or_default()
                .push(global);
        }
    }
    if skipped > 0 {
        tracing::warn!(target: "synskel-thinning", skipped, "Synapses outside the block footprint");
    }

    let header = PointFileHeader::new(volume_size, block_size);
    let mut written = 0;
    for iz in start_block_index.z..end.z {
        for iy in start_block_index.y..end.y {
            for ix in start_block_index.x..end.x {
                let index = Dims3::new(iz, iy, ix);
                let mut file = PointFile::new(header);
                if let Some(labels) = buckets.get(&index) {
                    for (&label, globals) in labels {
                        let mut points = LabelPoints::with_capacity(label, globals.len());
                        for &global in globals {
                            points.push(global as i64, geometry.global_to_local(global) as i64);
                        }
                        file.labels.push(points);
                    }
                }
                written += file.point_count();
                file.write_to(&synapse_dir.join(format!("{}.pts", block_stem(index))))?;
            }
        }
    }
    Ok(written)
}
