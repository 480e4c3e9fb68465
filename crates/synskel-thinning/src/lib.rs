// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
# synskel Thinning

Block-parallel topological thinning of 3-D label volumes:

- **Thinning** - directional erosion of every label in a block, deleting only simple
  voxels and never deleting anchors
- **Anchor stitching** - shared anchor points on the touching faces of adjacent blocks,
  so independently thinned blocks reconnect
- **Refinement** - multi-source shortest paths that reduce a label's merged skeleton to
  the tree connecting its fixed points

## Architecture

```text
anchors   (block, axis) faces      -> tmp/{block}/{axis}-{min|max}-computed-anchor-points.pts
block     segmentation + anchors   -> tmp/{block}/{skeletons,widths,somata_surfaces}/
refine    every block of a label   -> output/{skeletons,distances}/
```

[`SkeletonizationPipeline`] runs the three stages in order over a footprint of blocks. Each
stage is also usable on its own through [`compute_anchor_points`], [`topological_thinning`]
and [`skeleton_refinement`].

## Oracles

The 3-D simple-point test and the 2-D contour rule are traits. The table-backed
implementations ([`LookupTable`], [`FptaTable`]) read files from the lookup-table directory;
the computed ones ([`TopologicalOracle`], [`SimpleContourRule`]) need no files.
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod anchors;
pub mod block;
pub mod contour;
pub mod heap;
pub mod labeling;
pub mod oracle;
pub mod pipeline;
pub mod refinement;
pub mod segment;
pub mod surfaces;
pub mod synapses;
pub mod thinning;
pub mod types;
pub mod worklist;

pub use anchors::{
    anchor_file_path, block_anchor_files, compute_anchor_points, compute_anchor_points_with,
    extract_walls, AnchorSummary, WallSide,
};
pub use block::{topological_thinning, topological_thinning_with, BlockThinningReport};
pub use contour::{thin_image, ContourRule, FptaTable, SimpleContourRule, FPTA_FILE_NAME};
pub use heap::IndexedMinHeap;
pub use labeling::{
    component_count, label_components, DenseEquivalences, EquivalenceStore, SparseEquivalences,
};
pub use oracle::{
    generate_lookup_table, LookupTable, SimplePointOracle, TopologicalOracle, LUT_FILE_NAME,
};
pub use pipeline::{
    BlockSource, InMemorySource, PipelineReport, PipelineSettings, RawBlockSource,
    SkeletonizationPipeline,
};
pub use refinement::{skeleton_refinement, RefinementSummary};
pub use segment::{populate_somata, BlockClassification, Segment, SomataVoxels};
pub use surfaces::{combine_surfaces, extract_surfaces, write_block_surfaces};
pub use synapses::{
    project_synapses, write_block_synapse_files, SynapseProjection, DEFAULT_MAX_DEVIATION,
};
pub use thinning::{thin_segment, SegmentThinner, ThinningOutcome};
pub use types::{Label, Resolution, SkeletonError, SkeletonResult};
pub use worklist::{Worklist, WorklistHandle};
