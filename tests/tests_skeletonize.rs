/*!
Configuration-Driven Skeletonization Tests

Writes raw label blocks and a `synskel.toml` into a scratch directory, then runs the
pipeline the way the `skeletonize` tool does: load, validate, build the backends from the
configuration and run every stage.
*/

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ndarray::{s, Array3};
use synskel::prelude::*;
use synskel::serialization::{label_file_path, write_raw_block};
use synskel::thinning::{
    component_count, label_components, write_block_synapse_files, DenseEquivalences,
    RawBlockSource,
};
use tempfile::tempdir;

const BRANCH: i64 = 7;
const ISOLATED: i64 = 9;

/// An L-shaped tube crossing three of four blocks, plus an unrelated cube.
fn volume() -> Array3<i64> {
    let mut volume = Array3::<i64>::zeros((8, 16, 16));
    volume.slice_mut(s![3..5, 1..13, 3..5]).fill(BRANCH);
    volume.slice_mut(s![3..5, 11..13, 3..15]).fill(BRANCH);
    volume.slice_mut(s![2..5, 2..5, 10..13]).fill(ISOLATED);
    volume
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let path = root.join("synskel.toml");
    let text = format!(
        r#"
[paths]
lut_dir = "{root}/lut"
tmp_dir = "{root}/tmp"
synapse_dir = "{root}/synapses"
output_dir = "{root}/output"
segmentation_dir = "{root}/segmentation"

[volume]
volume_size = [8, 16, 16]
block_size = [8, 8, 8]
resolution = [1.0, 1.0, 1.0]

[thinning]
oracle = "computed"

[anchors]
contour_rule = "computed"

[parallel]
workers = 2
"#,
        root = root.display()
    );
    fs::write(&path, text).unwrap();
    path
}

fn write_inputs(config: &SkeletonConfig) -> (usize, usize) {
    let settings = synskel::pipeline_settings(config);
    let volume = volume();
    for block_index in settings.block_indices() {
        let (z0, y0, x0) = (block_index.z * 8, block_index.y * 8, block_index.x * 8);
        let block = volume.slice(s![z0..z0 + 8, y0..y0 + 8, x0..x0 + 8]);
        write_raw_block(
            &RawBlockSource::block_path(&config.paths.segmentation_dir, block_index),
            block,
        )
        .unwrap();
    }

    let size = settings.volume_size;
    let first = size.index_of(3, 1, 3);
    let last = size.index_of(3, 11, 14);
    let synapses = BTreeMap::from([(BRANCH, vec![first, last])]);
    write_block_synapse_files(
        &settings.synapse_dir,
        size,
        settings.block_size,
        settings.start_block_index,
        settings.block_count,
        &synapses,
    )
    .unwrap();
    (first, last)
}

#[test]
fn test_config_driven_run() {
    let dir = tempdir().unwrap();
    let config = load_config(Some(write_config(dir.path()).as_path()), None).unwrap();
    validate_config(&config).unwrap();
    let (first, last) = write_inputs(&config);

    let pipeline = SkeletonizationPipeline::new(
        synskel::pipeline_settings(&config),
        synskel::block_source(&config),
        synskel::simple_point_oracle(&config).unwrap(),
        synskel::contour_rule(&config).unwrap(),
    );
    let report = pipeline.run().unwrap();

    assert_eq!(report.blocks_thinned, 4);
    // 2x2 grid in (y, x): two y faces and two x faces, two files each
    assert_eq!(report.anchor_files, 8);
    assert_eq!(report.labels_refined, 1);
    assert_eq!(report.labels_skipped, 1);

    let output = &config.paths.output_dir;
    assert!(!label_file_path(&output.join("skeletons"), ISOLATED).exists());
    let skeleton = PointFile::read_from(&label_file_path(&output.join("skeletons"), BRANCH)).unwrap();
    let points = skeleton.label(BRANCH).unwrap();
    assert!(points.global_indices.contains(&(first as i64)));
    assert!(points.global_indices.contains(&(last as i64)));

    let size = Dims3::new(8, 16, 16);
    let original = volume();
    let mut rendered = Array3::<i64>::zeros(size.shape());
    for &global in &points.global_indices {
        let (z, y, x) = size.coords_of(global as usize);
        assert_eq!(original[[z, y, x]], BRANCH);
        rendered[[z, y, x]] = 1;
    }
    let components = label_components(rendered.view(), 26, &mut DenseEquivalences::new()).unwrap();
    assert_eq!(component_count(components.view()), 1);
    // far shorter than the tube itself
    assert!(points.len() < 2 * 2 * 12);
}

#[test]
fn test_missing_synapse_file_fails_the_run() {
    let dir = tempdir().unwrap();
    let config = load_config(Some(write_config(dir.path()).as_path()), None).unwrap();
    write_inputs(&config);
    fs::remove_file(config.paths.synapse_dir.join("0000z-0001y-0001x.pts")).unwrap();

    let pipeline = SkeletonizationPipeline::new(
        synskel::pipeline_settings(&config),
        synskel::block_source(&config),
        synskel::simple_point_oracle(&config).unwrap(),
        synskel::contour_rule(&config).unwrap(),
    );
    assert!(matches!(pipeline.run(), Err(SkeletonError::Io { .. })));
}

#[test]
fn test_lookup_table_backend_needs_table_file() {
    let dir = tempdir().unwrap();
    let mut config = load_config(Some(write_config(dir.path()).as_path()), None).unwrap();
    config.thinning.oracle = synskel::config::OracleBackend::LookupTable;
    assert!(matches!(
        synskel::simple_point_oracle(&config),
        Err(SkeletonError::Io { .. })
    ));
}
