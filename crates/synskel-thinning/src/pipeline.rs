// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Three-stage orchestration over a footprint of blocks.

1. **Anchors** for every block with a +1 neighbor inside the footprint, one task per
   (block, axis) face.
2. **Thinning** of every block, which reads the anchor files of stage 1.
3. **Refinement** of every label seen during thinning.

Units inside a stage are independent and run on a rayon pool when the `parallel` feature is
enabled. A stage starts only after every unit of the previous stage has finished, and the
first failing unit aborts the run.
*/

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{s, Array3};
use synskel_serialization::{block_stem, read_raw_block};
use synskel_structures::{Axis, BlockGeometry, Dims3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::anchors::{compute_anchor_points_with, extract_walls};
use crate::block::{topological_thinning_with, BlockThinningReport};
use crate::contour::ContourRule;
use crate::oracle::SimplePointOracle;
use crate::refinement::skeleton_refinement;
use crate::types::{expect_shape, Label, Resolution, SkeletonError, SkeletonResult};

/// Supplies the label blocks of a volume.
pub trait BlockSource: Sync {
    /// Segmentation of one block, shaped like the block.
    fn segmentation(&self, block_index: Dims3) -> SkeletonResult<Array3<i64>>;

    /// Downsampled soma volume of one block, if the volume has somata.
    fn somata(&self, block_index: Dims3) -> SkeletonResult<Option<Array3<i64>>>;
}

/// Reads `{dir}/{z:04}z-{y:04}y-{x:04}x.raw` files.
///
/// Soma blocks live in a separate directory and are downsampled by the configured rate. A
/// block without a soma file has no somata.
#[derive(Debug, Clone)]
pub struct RawBlockSource {
    segmentation_dir: PathBuf,
    somata_dir: Option<PathBuf>,
    block_size: Dims3,
    somata_downsample_rate: usize,
}

impl RawBlockSource {
    pub fn new(segmentation_dir: impl Into<PathBuf>, block_size: Dims3) -> Self {
        Self {
            segmentation_dir: segmentation_dir.into(),
            somata_dir: None,
            block_size,
            somata_downsample_rate: 0,
        }
    }

    pub fn with_somata(mut self, somata_dir: impl Into<PathBuf>, downsample_rate: usize) -> Self {
        self.somata_dir = Some(somata_dir.into());
        self.somata_downsample_rate = downsample_rate;
        self
    }

    pub fn block_path(directory: &Path, block_index: Dims3) -> PathBuf {
        directory.join(format!("{}.raw", block_stem(block_index)))
    }
}

impl BlockSource for RawBlockSource {
    fn segmentation(&self, block_index: Dims3) -> SkeletonResult<Array3<i64>> {
        let path = Self::block_path(&self.segmentation_dir, block_index);
        Ok(read_raw_block(&path, self.block_size)?)
    }

    fn somata(&self, block_index: Dims3) -> SkeletonResult<Option<Array3<i64>>> {
        let Some(directory) = &self.somata_dir else {
            return Ok(None);
        };
        let rate = self.somata_downsample_rate;
        if rate == 0 {
            return Err(SkeletonError::InvalidInput(
                "soma directory given with a downsample rate of 0".to_string(),
            ));
        }

        let path = Self::block_path(directory, block_index);
        match fs::metadata(&path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SkeletonError::io(&path)(err)),
        }
        let shape = Dims3::new(
            self.block_size.z / rate,
            self.block_size.y / rate,
            self.block_size.x / rate,
        );
        Ok(Some(read_raw_block(&path, shape)?))
    }
}

/// Serves blocks cut out of whole volumes held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    segmentation: Array3<i64>,
    somata: Option<Array3<i64>>,
    block_size: Dims3,
    somata_downsample_rate: usize,
}

impl InMemorySource {
    pub fn new(segmentation: Array3<i64>, block_size: Dims3) -> Self {
        Self {
            segmentation,
            somata: None,
            block_size,
            somata_downsample_rate: 0,
        }
    }

    /// `somata` covers the whole volume at `1 / downsample_rate` resolution.
    pub fn with_somata(mut self, somata: Array3<i64>, downsample_rate: usize) -> Self {
        self.somata = Some(somata);
        self.somata_downsample_rate = downsample_rate;
        self
    }
}

impl BlockSource for InMemorySource {
    fn segmentation(&self, block_index: Dims3) -> SkeletonResult<Array3<i64>> {
        let (bz, by, bx) = self.block_size.shape();
        let (z0, y0, x0) = (block_index.z * bz, block_index.y * by, block_index.x * bx);
        let (vz, vy, vx) = self.segmentation.dim();
        if z0 + bz > vz || y0 + by > vy || x0 + bx > vx {
            return Err(SkeletonError::InvalidInput(format!(
                "block {} of size {} is outside the in-memory volume",
                block_index, self.block_size
            )));
        }
        Ok(self
            .segmentation
            .slice(s![z0..z0 + bz, y0..y0 + by, x0..x0 + bx])
            .to_owned())
    }

    fn somata(&self, block_index: Dims3) -> SkeletonResult<Option<Array3<i64>>> {
        let Some(somata) = &self.somata else {
            return Ok(None);
        };
        let rate = self.somata_downsample_rate;
        if rate == 0 {
            return Err(SkeletonError::InvalidInput(
                "somata given with a downsample rate of 0".to_string(),
            ));
        }
        let (bz, by, bx) = (
            self.block_size.z / rate,
            self.block_size.y / rate,
            self.block_size.x / rate,
        );
        let (z0, y0, x0) = (block_index.z * bz, block_index.y * by, block_index.x * bx);
        let (vz, vy, vx) = somata.dim();
        if z0 + bz > vz || y0 + by > vy || x0 + bx > vx {
            return Err(SkeletonError::InvalidInput(format!(
                "soma block {} is outside the in-memory soma volume",
                block_index
            )));
        }
        Ok(Some(
            somata
                .slice(s![z0..z0 + bz, y0..y0 + by, x0..x0 + bx])
                .to_owned(),
        ))
    }
}

/// Directories, geometry and resources of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub tmp_dir: PathBuf,
    pub synapse_dir: PathBuf,
    pub output_dir: PathBuf,
    pub volume_size: Dims3,
    pub block_size: Dims3,
    pub resolution: Resolution,
    pub start_block_index: Dims3,
    /// Blocks per axis covered by this run
    pub block_count: Dims3,
    /// 0 when the volume has no somata
    pub somata_downsample_rate: usize,
    /// Worker threads, 0 for the rayon default
    pub workers: usize,
}

impl PipelineSettings {
    /// Settings covering the whole volume with unit resolution.
    pub fn new(
        tmp_dir: impl Into<PathBuf>,
        synapse_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        volume_size: Dims3,
        block_size: Dims3,
    ) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            synapse_dir: synapse_dir.into(),
            output_dir: output_dir.into(),
            volume_size,
            block_size,
            resolution: [1.0; 3],
            start_block_index: Dims3::default(),
            block_count: volume_size.blocks_covering(block_size),
            somata_downsample_rate: 0,
            workers: 0,
        }
    }

    /// Block indices of the footprint in raster order.
    pub fn block_indices(&self) -> Vec<Dims3> {
        let start = self.start_block_index;
        self.block_count
            .iter_coords()
            .map(|offset| Dims3::new(start.z + offset.z, start.y + offset.y, start.x + offset.x))
            .collect()
    }

    /// Whether `block_index` lies in the footprint.
    pub fn covers(&self, block_index: Dims3) -> bool {
        let start = self.start_block_index;
        let end = Dims3::new(
            start.z + self.block_count.z,
            start.y + self.block_count.y,
            start.x + self.block_count.x,
        );
        (start.z..end.z).contains(&block_index.z)
            && (start.y..end.y).contains(&block_index.y)
            && (start.x..end.x).contains(&block_index.x)
    }

    pub fn block_dir(&self, block_index: Dims3) -> PathBuf {
        self.tmp_dir.join(block_stem(block_index))
    }

    fn validate(&self) -> SkeletonResult<()> {
        let geometry = BlockGeometry::new(self.volume_size, self.block_size, self.start_block_index)?;
        for axis in Axis::ALL {
            if self.volume_size.get(axis) % self.block_size.get(axis) != 0 {
                return Err(SkeletonError::InvalidInput(format!(
                    "volume size {} is not a multiple of block size {}",
                    self.volume_size, self.block_size
                )));
            }
        }
        if self.block_count.has_zero_axis() {
            return Err(SkeletonError::InvalidInput(format!(
                "empty block footprint {}",
                self.block_count
            )));
        }
        let last = Dims3::new(
            self.start_block_index.z + self.block_count.z - 1,
            self.start_block_index.y + self.block_count.y - 1,
            self.start_block_index.x + self.block_count.x - 1,
        );
        geometry.with_block_index(last)?;
        if self.resolution.iter().any(|&r| r.is_nan() || r <= 0.0) {
            return Err(SkeletonError::InvalidInput(format!(
                "resolution {:?} must be positive",
                self.resolution
            )));
        }
        Ok(())
    }
}

/// Totals of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub blocks_thinned: usize,
    /// Two per processed face
    pub anchor_files: usize,
    pub labels_refined: usize,
    /// Labels seen during thinning that had no fixed points
    pub labels_skipped: usize,
    pub voxels_removed: usize,
}

/// Runs anchors, thinning and refinement over a footprint.
pub struct SkeletonizationPipeline<S: BlockSource> {
    settings: PipelineSettings,
    source: S,
    oracle: Arc<dyn SimplePointOracle>,
    contour_rule: Arc<dyn ContourRule>,
}

impl<S: BlockSource> SkeletonizationPipeline<S> {
    pub fn new(
        settings: PipelineSettings,
        source: S,
        oracle: Arc<dyn SimplePointOracle>,
        contour_rule: Arc<dyn ContourRule>,
    ) -> Self {
        Self {
            settings,
            source,
            oracle,
            contour_rule,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn run(&self) -> SkeletonResult<PipelineReport> {
        self.settings.validate()?;
        let pool = self.build_pool()?;
        let mut report = PipelineReport::default();

        let faces = self.anchor_faces();
        tracing::info!(target: "synskel-thinning", faces = faces.len(), "Computing anchor points");
        let written = self.run_stage(&pool, &faces, |&(block_index, axis)| {
            self.anchor_face(block_index, axis)
        })?;
        report.anchor_files = written.into_iter().sum();

        let blocks = self.settings.block_indices();
        tracing::info!(target: "synskel-thinning", blocks = blocks.len(), "Thinning blocks");
        let thinned = self.run_stage(&pool, &blocks, |&block_index| self.thin_block(block_index))?;
        report.blocks_thinned = thinned.len();
        report.voxels_removed = thinned.iter().map(|block| block.removed).sum();

        let labels: Vec<Label> = thinned
            .iter()
            .flat_map(|block| block.labels.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tracing::info!(target: "synskel-thinning", labels = labels.len(), "Refining skeletons");
        let refined = self.run_stage(&pool, &labels, |&label| self.refine_label(label))?;
        report.labels_refined = refined.iter().filter(|&&done| done).count();
        report.labels_skipped = refined.len() - report.labels_refined;

        tracing::info!(
            target: "synskel-thinning",
            blocks = report.blocks_thinned,
            anchor_files = report.anchor_files,
            labels = report.labels_refined,
            skipped = report.labels_skipped,
            "Skeletonization complete"
        );
        Ok(report)
    }

    /// `(block, axis)` pairs whose +1 neighbor is inside the footprint.
    fn anchor_faces(&self) -> Vec<(Dims3, Axis)> {
        let mut faces = Vec::new();
        for block_index in self.settings.block_indices() {
            for axis in Axis::ALL {
                let neighbor = block_index.with(axis, block_index.get(axis) + 1);
                if self.settings.covers(neighbor) {
                    faces.push((block_index, axis));
                }
            }
        }
        faces
    }

    fn anchor_face(&self, block_index: Dims3, axis: Axis) -> SkeletonResult<usize> {
        let settings = &self.settings;
        let geometry = BlockGeometry::new(settings.volume_size, settings.block_size, block_index)?;
        let neighbor_index = block_index.with(axis, block_index.get(axis) + 1);

        let current = self.source.segmentation(block_index)?;
        let neighbor = self.source.segmentation(neighbor_index)?;
        expect_shape(settings.block_size, current.shape())?;
        expect_shape(settings.block_size, neighbor.shape())?;

        let (current_face, neighbor_face) = extract_walls(current.view(), neighbor.view(), axis)?;
        compute_anchor_points_with(
            self.contour_rule.as_ref(),
            &settings.block_dir(block_index),
            &settings.block_dir(neighbor_index),
            current_face,
            neighbor_face,
            &geometry,
            axis,
        )?;
        Ok(2)
    }

    fn thin_block(&self, block_index: Dims3) -> SkeletonResult<BlockThinningReport> {
        let settings = &self.settings;
        let geometry = BlockGeometry::new(settings.volume_size, settings.block_size, block_index)?;
        let segmentation = self.source.segmentation(block_index)?;
        let somata = self.source.somata(block_index)?;
        topological_thinning_with(
            self.oracle.as_ref(),
            &settings.block_dir(block_index),
            &settings.synapse_dir,
            segmentation.view(),
            somata.as_ref().map(|somata| somata.view()),
            settings.somata_downsample_rate,
            settings.resolution,
            &geometry,
        )
    }

    fn refine_label(&self, label: Label) -> SkeletonResult<bool> {
        let settings = &self.settings;
        let summary = skeleton_refinement(
            &settings.tmp_dir,
            &settings.synapse_dir,
            &settings.output_dir,
            label,
            settings.resolution,
            settings.volume_size,
            settings.block_size,
            settings.start_block_index,
            settings.block_count,
        )?;
        Ok(summary.is_some())
    }

    #[cfg(feature = "parallel")]
    fn build_pool(&self) -> SkeletonResult<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .thread_name(|index| format!("synskel-worker-{}", index))
            .build()
            .map_err(|err| SkeletonError::InvalidInput(format!("cannot start worker pool: {}", err)))
    }

    #[cfg(not(feature = "parallel"))]
    fn build_pool(&self) -> SkeletonResult<()> {
        if self.settings.workers > 1 {
            tracing::warn!(
                target: "synskel-thinning",
                workers = self.settings.workers,
                "Built without the parallel feature, running sequentially"
            );
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn run_stage<T, R, F>(&self, pool: &rayon::ThreadPool, units: &[T], task: F) -> SkeletonResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> SkeletonResult<R> + Sync,
    {
        pool.install(|| units.par_iter().map(&task).collect())
    }

    #[cfg(not(feature = "parallel"))]
    fn run_stage<T, R, F>(&self, _pool: &(), units: &[T], task: F) -> SkeletonResult<Vec<R>>
    where
        F: Fn(&T) -> SkeletonResult<R>,
    {
        units.iter().map(task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::SimpleContourRule;
    use crate::oracle::TopologicalOracle;
    use std::path::Path;
    use synskel_serialization::{label_file_path, write_raw_block, LabelPoints, PointFile, PointFileHeader};
    use tempfile::tempdir;

    fn write_empty_synapses(dir: &Path, settings: &PipelineSettings) {
        let header = PointFileHeader::new(settings.volume_size, settings.block_size);
        for block_index in settings.block_indices() {
            PointFile::new(header)
                .write_to(&dir.join(format!("{}.pts", block_stem(block_index))))
                .unwrap();
        }
    }

    #[test]
    fn test_footprint() {
        let mut settings = PipelineSettings::new("t", "s", "o", Dims3::new(8, 8, 8), Dims3::new(4, 4, 4));
        assert_eq!(settings.block_indices().len(), 8);
        assert!(settings.covers(Dims3::new(1, 1, 1)));
        assert!(!settings.covers(Dims3::new(2, 0, 0)));

        settings.start_block_index = Dims3::new(1, 0, 0);
        settings.block_count = Dims3::new(1, 2, 2);
        assert_eq!(settings.block_indices()[0], Dims3::new(1, 0, 0));
        assert!(!settings.covers(Dims3::new(0, 0, 0)));
    }

    #[test]
    fn test_anchor_faces_stay_in_footprint() {
        let settings = PipelineSettings::new("t", "s", "o", Dims3::new(8, 8, 4), Dims3::new(4, 4, 4));
        let source = InMemorySource::new(Array3::zeros((8, 8, 4)), settings.block_size);
        let pipeline = SkeletonizationPipeline::new(
            settings,
            source,
            Arc::new(TopologicalOracle::new(26, 6).unwrap()),
            Arc::new(SimpleContourRule),
        );
        let faces = pipeline.anchor_faces();
        // 4 blocks in a 2x2x1 grid: two z faces and two y faces
        assert_eq!(faces.len(), 4);
        assert!(faces.iter().all(|(_, axis)| *axis != Axis::X));
    }

    #[test]
    fn test_rejects_partial_blocks() {
        let settings = PipelineSettings::new("t", "s", "o", Dims3::new(6, 4, 4), Dims3::new(4, 4, 4));
        let pipeline = SkeletonizationPipeline::new(
            settings,
            InMemorySource::new(Array3::zeros((6, 4, 4)), Dims3::new(4, 4, 4)),
            Arc::new(TopologicalOracle::new(26, 6).unwrap()),
            Arc::new(SimpleContourRule),
        );
        assert!(matches!(pipeline.run(), Err(SkeletonError::InvalidInput(_))));
    }

    #[test]
    fn test_raw_source_reads_blocks() {
        let dir = tempdir().unwrap();
        let block = Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (z * 4 + y * 2 + x) as i64);
        write_raw_block(&RawBlockSource::block_path(dir.path(), Dims3::new(0, 1, 0)), block.view()).unwrap();

        let source = RawBlockSource::new(dir.path(), Dims3::new(2, 2, 2))
            .with_somata(dir.path().join("somata"), 2);
        assert_eq!(source.segmentation(Dims3::new(0, 1, 0)).unwrap(), block);
        assert!(source.somata(Dims3::new(0, 1, 0)).unwrap().is_none());
        assert!(matches!(
            source.segmentation(Dims3::new(0, 0, 0)),
            Err(SkeletonError::Io { .. })
        ));
    }

    #[test]
    fn test_label_without_synapses_is_thinned_but_not_refined() {
        let dir = tempdir().unwrap();
        let mut settings = PipelineSettings::new(
            dir.path().join("tmp"),
            dir.path().join("synapses"),
            dir.path().join("out"),
            Dims3::new(4, 4, 8),
            Dims3::new(4, 4, 4),
        );
        settings.workers = 2;
        write_empty_synapses(&settings.synapse_dir, &settings);

        let mut volume = Array3::<i64>::zeros((4, 4, 8));
        volume.slice_mut(s![1..3, 1..3, ..]).fill(5);
        let source = InMemorySource::new(volume, settings.block_size);
        let pipeline = SkeletonizationPipeline::new(
            settings.clone(),
            source,
            Arc::new(TopologicalOracle::new(26, 6).unwrap()),
            Arc::new(SimpleContourRule),
        );
        let report = pipeline.run().unwrap();

        assert_eq!(report.blocks_thinned, 2);
        assert_eq!(report.anchor_files, 2);
        assert_eq!(report.labels_refined, 0);
        assert_eq!(report.labels_skipped, 1);
        assert!(label_file_path(&settings.block_dir(Dims3::default()).join("skeletons"), 5).exists());
        assert!(!label_file_path(&settings.output_dir.join("skeletons"), 5).exists());
    }

    #[test]
    fn test_missing_neighbor_block_aborts() {
        let dir = tempdir().unwrap();
        let settings = PipelineSettings::new(
            dir.path().join("tmp"),
            dir.path().join("synapses"),
            dir.path().join("out"),
            Dims3::new(4, 4, 8),
            Dims3::new(4, 4, 4),
        );
        let header = PointFileHeader::new(settings.volume_size, settings.block_size);
        PointFile::single(header, LabelPoints::new(1))
            .write_to(&settings.synapse_dir.join("0000z-0000y-0000x.pts"))
            .unwrap();

        let source = RawBlockSource::new(dir.path().join("segmentation"), settings.block_size);
        let pipeline = SkeletonizationPipeline::new(
            settings,
            source,
            Arc::new(TopologicalOracle::new(26, 6).unwrap()),
            Arc::new(SimpleContourRule),
        );
        assert!(pipeline.run().is_err());
    }
}
