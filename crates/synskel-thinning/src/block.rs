// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Block thinning stage.

Classifies a block, loads its synapses and any anchor files written by the stitching stage,
thins every label in ascending order and writes the per-label skeleton, width and soma
surface files under the block's tmp directory:

```text
{tmp_block_dir}/skeletons/{label:016}.pts
{tmp_block_dir}/widths/{label:016}.pts
{tmp_block_dir}/somata_surfaces/{label:016}.pts
```
*/

use std::path::Path;

use ndarray::ArrayView3;
use synskel_serialization::{block_stem, label_file_path, LabelPoints, PointFile, PointFileHeader};
use synskel_structures::{BlockGeometry, Dims3};

use crate::anchors::block_anchor_files;
use crate::oracle::{LookupTable, SimplePointOracle};
use crate::segment::BlockClassification;
use crate::thinning::SegmentThinner;
use crate::types::{Label, Resolution, SkeletonResult};

/// What thinning one block produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockThinningReport {
    pub block_index: Dims3,
    /// Labels thinned, ascending
    pub labels: Vec<Label>,
    pub fixed_points: usize,
    pub removed: usize,
    pub remaining: usize,
}

/// Thins one block using the simple-point table in `lut_dir`.
#[allow(clippy::too_many_arguments)]
pub fn topological_thinning(
    lut_dir: &Path,
    tmp_block_dir: &Path,
    synapse_dir: &Path,
    segmentation: ArrayView3<'_, i64>,
    somata: Option<ArrayView3<'_, i64>>,
    somata_downsample_rate: usize,
    resolution: Resolution,
    volume_size: Dims3,
    block_size: Dims3,
    block_index: Dims3,
) -> SkeletonResult<BlockThinningReport> {
    let table = LookupTable::load(lut_dir)?;
    let geometry = BlockGeometry::new(volume_size, block_size, block_index)?;
    topological_thinning_with(
        &table,
        tmp_block_dir,
        synapse_dir,
        segmentation,
        somata,
        somata_downsample_rate,
        resolution,
        &geometry,
    )
}

/// [`topological_thinning`] with an explicit oracle.
#[allow(clippy::too_many_arguments)]
pub fn topological_thinning_with<O: SimplePointOracle + ?Sized>(
    oracle: &O,
    tmp_block_dir: &Path,
    synapse_dir: &Path,
    segmentation: ArrayView3<'_, i64>,
    somata: Option<ArrayView3<'_, i64>>,
    somata_downsample_rate: usize,
    resolution: Resolution,
    geometry: &BlockGeometry,
) -> SkeletonResult<BlockThinningReport> {
    let block_index = geometry.block_index();
    let mut classification =
        BlockClassification::classify(segmentation, somata, somata_downsample_rate, *geometry)?;

    let synapse_path = synapse_dir.join(format!("{}.pts", block_stem(block_index)));
    let synapses = PointFile::read_from(&synapse_path)?;
    let mut fixed_points = classification.apply_fixed_points(&synapses, &synapse_path)?;

    for anchor_path in block_anchor_files(tmp_block_dir) {
        if let Some(anchors) = PointFile::read_if_exists(&anchor_path)? {
            fixed_points += classification.apply_fixed_points(&anchors, &anchor_path)?;
        }
    }

    let (geometry, segments, somata_surfaces) = classification.into_parts();
    let thinner = SegmentThinner::new(oracle, &geometry, resolution);
    let mut report = BlockThinningReport {
        block_index,
        fixed_points,
        ..BlockThinningReport::default()
    };

    for (label, segment) in segments {
        let outcome = thinner.thin(segment);
        outcome
            .to_point_file(&geometry)
            .write_to(&label_file_path(&tmp_block_dir.join("skeletons"), label))?;
        outcome
            .to_width_file(&geometry)
            .write_to(&label_file_path(&tmp_block_dir.join("widths"), label))?;

        report.removed += outcome.removed;
        report.remaining += outcome.skeleton.len();
        report.labels.push(label);
    }

    let header = PointFileHeader::new(geometry.volume_size(), geometry.block_size());
    for (&label, surface) in &somata_surfaces {
        let mut points = LabelPoints::with_capacity(label, surface.len());
        for &padded in surface {
            let local = geometry.padded_to_local(padded);
            points.push(geometry.local_to_global(local) as i64, local as i64);
        }
        PointFile::single(header, points)
            .write_to(&label_file_path(&tmp_block_dir.join("somata_surfaces"), label))?;
    }

    tracing::info!(
        target: "synskel-thinning",
        block = %block_index,
        labels = report.labels.len(),
        fixed_points = report.fixed_points,
        removed = report.removed,
        remaining = report.remaining,
        "Thinned block"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TopologicalOracle;
    use crate::types::SkeletonError;
    use ndarray::{s, Array3};
    use tempfile::tempdir;

    #[test]
    fn test_missing_synapse_file_is_fatal() {
        let dir = tempdir().unwrap();
        let geometry =
            BlockGeometry::new(Dims3::new(4, 4, 4), Dims3::new(4, 4, 4), Dims3::default()).unwrap();
        let segmentation = Array3::<i64>::ones((4, 4, 4));
        let oracle = TopologicalOracle::new(26, 6).unwrap();
        let result = topological_thinning_with(
            &oracle,
            dir.path(),
            &dir.path().join("synapses"),
            segmentation.view(),
            None,
            0,
            [1.0; 3],
            &geometry,
        );
        assert!(matches!(result, Err(SkeletonError::Io { .. })));
    }

    #[test]
    fn test_writes_files_per_label() {
        let dir = tempdir().unwrap();
        let volume = Dims3::new(6, 6, 6);
        let geometry = BlockGeometry::new(volume, volume, Dims3::default()).unwrap();
        let synapse_dir = dir.path().join("synapses");
        let block_dir = dir.path().join(block_stem(Dims3::default()));

        let mut segmentation = Array3::<i64>::zeros((6, 6, 6));
        segmentation.slice_mut(s![1..5, 1..5, 1..3]).fill(11);
        segmentation.slice_mut(s![1..5, 1..5, 4..5]).fill(12);

        let header = PointFileHeader::new(volume, volume);
        let mut synapses = LabelPoints::new(11);
        let local = geometry.local_index(1, 1, 1);
        synapses.push(local as i64, local as i64);
        PointFile::single(header, synapses)
            .write_to(&synapse_dir.join("0000z-0000y-0000x.pts"))
            .unwrap();

        let oracle = TopologicalOracle::new(26, 6).unwrap();
        let report = topological_thinning_with(
            &oracle,
            &block_dir,
            &synapse_dir,
            segmentation.view(),
            None,
            0,
            [1.0; 3],
            &geometry,
        )
        .unwrap();

        assert_eq!(report.labels, vec![11, 12]);
        assert_eq!(report.fixed_points, 1);
        assert_eq!(report.removed + report.remaining, 32 + 16);
        let skeleton =
            PointFile::read_from(&label_file_path(&block_dir.join("skeletons"), 11)).unwrap();
        assert!(skeleton.label(11).unwrap().local_indices.contains(&(local as i64)));
        assert!(label_file_path(&block_dir.join("widths"), 12).exists());
        assert!(!block_dir.join("somata_surfaces").exists());
    }
}
