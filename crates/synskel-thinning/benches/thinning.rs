// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Thinning Microbenchmarks
//!
//! - Segment thinning of solid cubes and a branching tube with the computed oracle
//! - 2-D contour thinning of a filled disk
//!
//! Inputs are generated in memory; no lookup-table files or other I/O.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{s, Array2, Array3};
use synskel_structures::{BlockGeometry, Dims3};
use synskel_thinning::{thin_image, thin_segment, BlockClassification, SimpleContourRule, TopologicalOracle};

fn classify(volume: &Array3<i64>) -> BlockClassification {
    let (z, y, x) = volume.dim();
    let dims = Dims3::new(z, y, x);
    let geometry = BlockGeometry::new(dims, dims, Dims3::default()).unwrap();
    BlockClassification::classify(volume.view(), None, 0, geometry).unwrap()
}

fn cube(side: usize) -> Array3<i64> {
    let mut volume = Array3::<i64>::zeros((side + 4, side + 4, side + 4));
    volume.slice_mut(s![2..side + 2, 2..side + 2, 2..side + 2]).fill(1);
    volume
}

fn branching_tube(length: usize) -> Array3<i64> {
    let mut volume = Array3::<i64>::zeros((12, 12, length));
    volume.slice_mut(s![4..8, 4..8, ..]).fill(1);
    volume.slice_mut(s![.., 4..8, length / 2 - 2..length / 2 + 2]).fill(1);
    volume
}

fn bench_segment_thinning(c: &mut Criterion) {
    let oracle = TopologicalOracle::new(26, 6).unwrap();
    let mut group = c.benchmark_group("segment_thinning");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(3));

    for side in [8usize, 16, 24] {
        let volume = cube(side);
        group.throughput(Throughput::Elements((side * side * side) as u64));
        group.bench_with_input(BenchmarkId::new("cube", side), &volume, |b, volume| {
            b.iter_batched(
                || classify(volume),
                |classification| {
                    let (geometry, segments, _) = classification.into_parts();
                    for (_, segment) in segments {
                        black_box(thin_segment(segment, &geometry, [1.0; 3], &oracle));
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    let volume = branching_tube(64);
    group.bench_function("branching_tube_64", |b| {
        b.iter_batched(
            || classify(&volume),
            |classification| {
                let (geometry, segments, _) = classification.into_parts();
                for (_, segment) in segments {
                    black_box(thin_segment(segment, &geometry, [1.0, 1.0, 2.5], &oracle));
                }
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_contour_thinning(c: &mut Criterion) {
    let mut group = c.benchmark_group("contour_thinning");
    group.sample_size(20);

    for radius in [8usize, 32] {
        let side = 2 * radius + 1;
        let disk = Array2::from_shape_fn((side, side), |(row, column)| {
            let dr = row as isize - radius as isize;
            let dc = column as isize - radius as isize;
            (dr * dr + dc * dc) as usize <= radius * radius
        });
        group.bench_with_input(BenchmarkId::new("disk", radius), &disk, |b, disk| {
            b.iter(|| black_box(thin_image(disk, &SimpleContourRule)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_segment_thinning, bench_contour_thinning);
criterion_main!(benches);
