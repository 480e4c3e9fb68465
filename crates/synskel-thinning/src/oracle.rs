// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Simple-point oracles.

A neighborhood pattern packs the occupancy of the 26 neighbors of a voxel into the low
26 bits of a `u32`; bit `k` is neighbor `k` of [`N26_DELTAS`]. An oracle answers whether
deleting the center voxel leaves the topology of both the object and the background
unchanged.

Two implementations are provided:

- [`LookupTable`] reads the precomputed `lut_simple.dat` bit table (26/6 connectivity)
- [`TopologicalOracle`] evaluates topological numbers directly, for (26, 6) and (6, 26)
*/

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use synskel_structures::N26_DELTAS;

use crate::types::{SkeletonError, SkeletonResult};

/// File name of the 3-D simple-point table inside the lookup-table directory.
pub const LUT_FILE_NAME: &str = "lut_simple.dat";

/// One bit per 26-bit pattern.
pub const LOOKUP_TABLE_BYTES: usize = 1 << 23;

/// Mask of the 26 neighbor bits.
pub const NEIGHBOR_MASK: u32 = (1 << 26) - 1;

/// Answers whether a voxel with the given neighborhood pattern is simple.
pub trait SimplePointOracle: Send + Sync {
    fn is_simple(&self, pattern: u32) -> bool;
}

/// Packed simple-point table addressed by `pattern >> 3`, bit `pattern & 7`.
#[derive(Clone)]
pub struct LookupTable {
    bits: Vec<u8>,
}

impl LookupTable {
    /// Load `lut_simple.dat` from `lut_dir`.
    pub fn load(lut_dir: &Path) -> SkeletonResult<Self> {
        let path = lut_dir.join(LUT_FILE_NAME);
        let bits = fs::read(&path).map_err(SkeletonError::io(&path))?;
        let table = Self::from_bytes_at(bits, path.clone())?;
        tracing::debug!(target: "synskel-thinning", path = %path.display(), "Loaded simple-point table");
        Ok(table)
    }

    /// Load the table for a connectivity pair; only (26, 6) has a table.
    pub fn for_connectivity(lut_dir: &Path, foreground: u8, background: u8) -> SkeletonResult<Self> {
        if (foreground, background) != (26, 6) {
            return Err(SkeletonError::UnsupportedConnectivity {
                foreground,
                background,
                backend: "lookup table",
            });
        }
        Self::load(lut_dir)
    }

    pub fn from_bytes(bits: Vec<u8>) -> SkeletonResult<Self> {
        Self::from_bytes_at(bits, PathBuf::from("<memory>"))
    }

    fn from_bytes_at(bits: Vec<u8>, path: PathBuf) -> SkeletonResult<Self> {
        if bits.len() != LOOKUP_TABLE_BYTES {
            return Err(SkeletonError::LookupTable {
                path,
                expected: LOOKUP_TABLE_BYTES,
                actual: bits.len(),
            });
        }
        Ok(Self { bits })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

impl std::fmt::Debug for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTable")
            .field("bytes", &self.bits.len())
            .finish()
    }
}

impl SimplePointOracle for LookupTable {
    #[inline]
    fn is_simple(&self, pattern: u32) -> bool {
        let pattern = pattern & NEIGHBOR_MASK;
        self.bits[(pattern >> 3) as usize] & (1 << (pattern & 7)) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjacency {
    /// 26-connected object, 6-connected background
    Object26,
    /// 6-connected object, 26-connected background
    Object6,
}

/// Simple-point test from topological numbers.
///
/// For (26, 6): the object part of the neighborhood has exactly one 26-component and the
/// background restricted to the 18-neighborhood has exactly one 6-component touching a
/// face neighbor. (6, 26) is the dual.
#[derive(Debug, Clone)]
pub struct TopologicalOracle {
    adjacency: Adjacency,
    adjacent26: [u32; 26],
    adjacent6: [u32; 26],
    face_mask: u32,
    n18_mask: u32,
}

impl TopologicalOracle {
    pub fn new(foreground: u8, background: u8) -> SkeletonResult<Self> {
        let adjacency = match (foreground, background) {
            (26, 6) => Adjacency::Object26,
            (6, 26) => Adjacency::Object6,
            _ => {
                return Err(SkeletonError::UnsupportedConnectivity {
                    foreground,
                    background,
                    backend: "topological oracle",
                })
            }
        };

        let mut adjacent26 = [0u32; 26];
        let mut adjacent6 = [0u32; 26];
        let mut face_mask = 0;
        let mut n18_mask = 0;
        for (i, &(az, ay, ax)) in N26_DELTAS.iter().enumerate() {
            let reach = az.abs() + ay.abs() + ax.abs();
            if reach == 1 {
                face_mask |= 1 << i;
            }
            if reach <= 2 {
                n18_mask |= 1 << i;
            }
            for (j, &(bz, by, bx)) in N26_DELTAS.iter().enumerate() {
                if i == j {
                    continue;
                }
                let (dz, dy, dx) = ((az - bz).abs(), (ay - by).abs(), (ax - bx).abs());
                if dz.max(dy).max(dx) == 1 {
                    adjacent26[i] |= 1 << j;
                }
                if dz + dy + dx == 1 {
                    adjacent6[i] |= 1 << j;
                }
            }
        }

        Ok(Self {
            adjacency,
            adjacent26,
            adjacent6,
            face_mask,
            n18_mask,
        })
    }

    /// Connectivity pair this oracle answers for.
    pub fn connectivity(&self) -> (u8, u8) {
        match self.adjacency {
            Adjacency::Object26 => (26, 6),
            Adjacency::Object6 => (6, 26),
        }
    }
}

/// Number of components of `set` under `adjacent` that contain a bit of `touching`.
fn count_components(set: u32, adjacent: &[u32; 26], touching: u32) -> u32 {
    let mut remaining = set;
    let mut count = 0;
    while remaining != 0 {
        let seed = remaining & remaining.wrapping_neg();
        let mut component = seed;
        let mut frontier = seed;
        while frontier != 0 {
            let bit = frontier.trailing_zeros() as usize;
            frontier &= frontier - 1;
            let grown = adjacent[bit] & remaining & !component;
            component |= grown;
            frontier |= grown;
        }
        remaining &= !component;
        if component & touching != 0 {
            count += 1;
        }
    }
    count
}

impl SimplePointOracle for TopologicalOracle {
    fn is_simple(&self, pattern: u32) -> bool {
        let object = pattern & NEIGHBOR_MASK;
        let background = !pattern & NEIGHBOR_MASK;
        match self.adjacency {
            Adjacency::Object26 => {
                count_components(object, &self.adjacent26, NEIGHBOR_MASK) == 1
                    && count_components(background & self.n18_mask, &self.adjacent6, self.face_mask)
                        == 1
            }
            Adjacency::Object6 => {
                count_components(object & self.n18_mask, &self.adjacent6, self.face_mask) == 1
                    && count_components(background, &self.adjacent26, NEIGHBOR_MASK) == 1
            }
        }
    }
}

/// Build the packed table for every 26-bit pattern.
pub fn generate_lookup_table<O: SimplePointOracle + ?Sized>(oracle: &O) -> Vec<u8> {
    let mut table = vec![0u8; LOOKUP_TABLE_BYTES];
    let fill = |(index, byte): (usize, &mut u8)| {
        for bit in 0..8 {
            if oracle.is_simple(((index << 3) | bit) as u32) {
                *byte |= 1 << bit;
            }
        }
    };

    #[cfg(feature = "parallel")]
    table.par_iter_mut().enumerate().for_each(fill);

    #[cfg(not(feature = "parallel"))]
    table.iter_mut().enumerate().for_each(fill);

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(dz: isize, dy: isize, dx: isize) -> u32 {
        let k = N26_DELTAS
            .iter()
            .position(|&delta| delta == (dz, dy, dx))
            .unwrap();
        1 << k
    }

    #[test]
    fn test_isolated_and_interior_points_are_not_simple() {
        let oracle = TopologicalOracle::new(26, 6).unwrap();
        assert!(!oracle.is_simple(0));
        assert!(!oracle.is_simple(NEIGHBOR_MASK));
    }

    #[test]
    fn test_line_end_is_simple_but_middle_is_not() {
        let oracle = TopologicalOracle::new(26, 6).unwrap();
        assert!(oracle.is_simple(bit(0, 0, 1)));
        assert!(oracle.is_simple(bit(1, 1, 1)));
        assert!(!oracle.is_simple(bit(0, 0, 1) | bit(0, 0, -1)));
        assert!(!oracle.is_simple(bit(-1, -1, -1) | bit(1, 1, 1)));
    }

    #[test]
    fn test_half_space_is_simple() {
        let oracle = TopologicalOracle::new(26, 6).unwrap();
        let below = N26_DELTAS
            .iter()
            .enumerate()
            .filter(|(_, &(dz, _, _))| dz == -1)
            .fold(0u32, |pattern, (k, _)| pattern | (1 << k));
        assert!(oracle.is_simple(below));
    }

    #[test]
    fn test_ring_around_center_is_not_simple() {
        // removing the center of a planar ring opens a tunnel in the background
        let oracle = TopologicalOracle::new(26, 6).unwrap();
        let ring = N26_DELTAS
            .iter()
            .enumerate()
            .filter(|(_, &(dz, _, _))| dz == 0)
            .fold(0u32, |pattern, (k, _)| pattern | (1 << k));
        assert!(!oracle.is_simple(ring));
    }

    #[test]
    fn test_six_connected_object_needs_face_contact() {
        let oracle = TopologicalOracle::new(6, 26).unwrap();
        assert!(oracle.is_simple(bit(0, 1, 0)));
        assert!(!oracle.is_simple(bit(1, 1, 1)));
        assert_eq!(oracle.connectivity(), (6, 26));
    }

    #[test]
    fn test_unsupported_pairs_are_rejected() {
        assert!(matches!(
            TopologicalOracle::new(18, 6),
            Err(SkeletonError::UnsupportedConnectivity { foreground: 18, .. })
        ));
        assert!(matches!(
            LookupTable::for_connectivity(Path::new("."), 6, 26),
            Err(SkeletonError::UnsupportedConnectivity { backend: "lookup table", .. })
        ));
    }

    #[test]
    fn test_table_size_is_checked() {
        assert!(matches!(
            LookupTable::from_bytes(vec![0; 16]),
            Err(SkeletonError::LookupTable { actual: 16, .. })
        ));
    }

    #[test]
    fn test_table_addressing() {
        let mut bits = vec![0u8; LOOKUP_TABLE_BYTES];
        bits[5] = 0b0000_0100;
        let table = LookupTable::from_bytes(bits).unwrap();
        assert!(table.is_simple((5 << 3) | 2));
        assert!(!table.is_simple((5 << 3) | 3));
        assert!(!table.is_simple(2));
    }

    struct EveryThird;

    impl SimplePointOracle for EveryThird {
        fn is_simple(&self, pattern: u32) -> bool {
            pattern % 3 == 0
        }
    }

    #[test]
    fn test_generated_table_matches_oracle() {
        let table = LookupTable::from_bytes(generate_lookup_table(&EveryThird)).unwrap();
        for pattern in [0u32, 1, 2, 3, 4095, 4096, 1 << 25, NEIGHBOR_MASK] {
            assert_eq!(table.is_simple(pattern), pattern % 3 == 0, "pattern {}", pattern);
        }
    }
}
