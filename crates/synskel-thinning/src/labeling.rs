// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Connected-component labeling of label volumes.

Two-pass raster labeling: the first pass assigns provisional ids and records equivalences
between already-visited neighbors carrying the same value, the second pass replaces every
provisional id by a dense id `1..=n` numbered in raster order of first appearance.

Equivalences live behind [`EquivalenceStore`]; [`DenseEquivalences`] keeps parents in a
growable vector and [`SparseEquivalences`] in a hash map, for volumes where provisional ids
are many but merges are rare.
*/

use ahash::AHashMap;
use ndarray::{Array3, ArrayView3};
use synskel_structures::N26_DELTAS;

use crate::types::{SkeletonError, SkeletonResult};

/// Disjoint-set forest over provisional component ids.
///
/// Ids are handed out by [`make_set`](Self::make_set) in increasing order starting at 1.
pub trait EquivalenceStore {
    /// Creates a new singleton set and returns its id.
    fn make_set(&mut self) -> u64;

    /// Representative of the set containing `id`, compressing the path on the way.
    fn find(&mut self, id: u64) -> u64;

    /// Links two roots; the smaller root always wins so results are deterministic.
    fn union_roots(&mut self, a: u64, b: u64) -> u64;

    /// Merges the sets of `a` and `b` and returns the new root.
    fn union(&mut self, a: u64, b: u64) -> u64 {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            root_a
        } else {
            self.union_roots(root_a, root_b)
        }
    }
}

/// Parent pointers in a vector that grows as ids are created.
#[derive(Debug, Clone)]
pub struct DenseEquivalences {
    parents: Vec<u64>,
}

impl DenseEquivalences {
    pub fn new() -> Self {
        // slot 0 is the background and never joins a set
        Self { parents: vec![0] }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut parents = Vec::with_capacity(capacity + 1);
        parents.push(0);
        Self { parents }
    }

    pub fn set_count(&self) -> usize {
        self.parents.len() - 1
    }
}

impl Default for DenseEquivalences {
    fn default() -> Self {
        Self::new()
    }
}

impl EquivalenceStore for DenseEquivalences {
    fn make_set(&mut self) -> u64 {
        let id = self.parents.len() as u64;
        self.parents.push(id);
        id
    }

    fn find(&mut self, mut id: u64) -> u64 {
        // path halving
        while self.parents[id as usize] != id {
            let grandparent = self.parents[self.parents[id as usize] as usize];
            self.parents[id as usize] = grandparent;
            id = grandparent;
        }
        id
    }

    fn union_roots(&mut self, a: u64, b: u64) -> u64 {
        let (root, child) = if a < b { (a, b) } else { (b, a) };
        self.parents[child as usize] = root;
        root
    }
}

/// Parent pointers in a hash map; ids absent from the map are their own root.
#[derive(Debug, Clone, Default)]
pub struct SparseEquivalences {
    parents: AHashMap<u64, u64>,
    next_id: u64,
}

impl SparseEquivalences {
    pub fn new() -> Self {
        Self {
            parents: AHashMap::new(),
            next_id: 1,
        }
    }

    /// Number of ids that have been merged into another set.
    pub fn merged_count(&self) -> usize {
        self.parents.len()
    }

    fn parent(&self, id: u64) -> u64 {
        self.parents.get(&id).copied().unwrap_or(id)
    }
}

impl EquivalenceStore for SparseEquivalences {
    fn make_set(&mut self) -> u64 {
        // a default-constructed store starts at 0; ids must start at 1
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn find(&mut self, mut id: u64) -> u64 {
        loop {
            let parent = self.parent(id);
            if parent == id {
                return id;
            }
            let grandparent = self.parent(parent);
            if grandparent != parent {
                self.parents.insert(id, grandparent);
            }
            id = grandparent;
        }
    }

    fn union_roots(&mut self, a: u64, b: u64) -> u64 {
        let (root, child) = if a < b { (a, b) } else { (b, a) };
        self.parents.insert(child, root);
        root
    }
}

/// Neighbor deltas visited before the center in raster order.
fn backward_deltas(connectivity: u8) -> SkeletonResult<&'static [(isize, isize, isize)]> {
    const BACKWARD_6: [(isize, isize, isize); 3] = [(-1, 0, 0), (0, -1, 0), (0, 0, -1)];
    match connectivity {
        6 => Ok(&BACKWARD_6),
        // the first 13 entries of the z-major table precede the center
        26 => Ok(&N26_DELTAS[..13]),
        other => Err(SkeletonError::UnsupportedConnectivity {
            foreground: other,
            background: 0,
            backend: "component labeler",
        }),
    }
}

/// Labels the connected components of a label volume.
///
/// Voxels connect when they are adjacent under `connectivity` (6 or 26) and carry the same
/// nonzero value. Background stays 0; components are numbered `1..=n` in the raster order
/// of their first voxel.
pub fn label_components<S: EquivalenceStore>(
    volume: ArrayView3<'_, i64>,
    connectivity: u8,
    store: &mut S,
) -> SkeletonResult<Array3<i64>> {
    let deltas = backward_deltas(connectivity)?;
    let (depth, height, width) = volume.dim();
    let mut provisional = Array3::<u64>::zeros((depth, height, width));

    for iz in 0..depth {
        for iy in 0..height {
            for ix in 0..width {
                let value = volume[[iz, iy, ix]];
                if value == 0 {
                    continue;
                }
                let mut assigned = 0u64;
                for &(dz, dy, dx) in deltas {
                    let (Some(nz), Some(ny), Some(nx)) = (
                        iz.checked_add_signed(dz),
                        iy.checked_add_signed(dy),
                        ix.checked_add_signed(dx),
                    ) else {
                        continue;
                    };
                    if ny >= height || nx >= width || volume[[nz, ny, nx]] != value {
                        continue;
                    }
                    let neighbor = provisional[[nz, ny, nx]];
                    assigned = if assigned == 0 {
                        neighbor
                    } else {
                        store.union(assigned, neighbor)
                    };
                }
                if assigned == 0 {
                    assigned = store.make_set();
                }
                provisional[[iz, iy, ix]] = assigned;
            }
        }
    }

    let mut dense: AHashMap<u64, i64> = AHashMap::new();
    let mut components = Array3::<i64>::zeros((depth, height, width));
    for (slot, &id) in components.iter_mut().zip(provisional.iter()) {
        if id == 0 {
            continue;
        }
        let root = store.find(id);
        let next = dense.len() as i64 + 1;
        *slot = *dense.entry(root).or_insert(next);
    }

    tracing::debug!(
        target: "synskel-thinning",
        connectivity,
        components = dense.len(),
        "Labeled connected components"
    );
    Ok(components)
}

/// Number of distinct components of a labeled volume.
pub fn component_count(components: ArrayView3<'_, i64>) -> usize {
    components.iter().copied().max().unwrap_or(0).max(0) as usize
}
