// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Index spaces for block-partitioned volumes.

Every voxel has three linear indices:

- **local**: position inside its block, unpadded
- **padded**: position inside the block extended by a one-voxel halo, so that all
  26 neighbor offsets of a block voxel stay in range
- **global**: position inside the full volume

All extents are stored as `(z, y, x)` with x varying fastest.
*/

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// A 3-D extent or coordinate triple in `(z, y, x)` order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Dims3 {
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

/// Neighbor deltas `(dz, dy, dx)` of the 26-neighborhood, z-major with the center skipped.
///
/// Bit `k` of a neighborhood pattern always refers to delta `k` of this table.
pub const N26_DELTAS: [(isize, isize, isize); 26] = {
    let mut deltas = [(0isize, 0isize, 0isize); 26];
    let mut k = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dz == 0 && dy == 0 && dx == 0) {
                    deltas[k] = (dz, dy, dx);
                    k += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    deltas
};

impl Dims3 {
    pub const fn new(z: usize, y: usize, x: usize) -> Self {
        Self { z, y, x }
    }

    pub const fn from_array(values: [usize; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub const fn to_array(self) -> [usize; 3] {
        [self.z, self.y, self.x]
    }

    /// Shape tuple in the order ndarray expects for a `(z, y, x)` volume.
    pub const fn shape(self) -> (usize, usize, usize) {
        (self.z, self.y, self.x)
    }

    pub const fn voxel_count(self) -> usize {
        self.z * self.y * self.x
    }

    pub const fn has_zero_axis(self) -> bool {
        self.z == 0 || self.y == 0 || self.x == 0
    }

    /// Extent grown by a one-voxel halo on each side.
    pub const fn padded(self) -> Self {
        Self::new(self.z + 2, self.y + 2, self.x + 2)
    }

    pub fn get(self, axis: Axis) -> usize {
        match axis {
            Axis::Z => self.z,
            Axis::Y => self.y,
            Axis::X => self.x,
        }
    }

    pub fn with(mut self, axis: Axis, value: usize) -> Self {
        match axis {
            Axis::Z => self.z = value,
            Axis::Y => self.y = value,
            Axis::X => self.x = value,
        }
        self
    }

    #[inline]
    pub const fn index_of(self, iz: usize, iy: usize, ix: usize) -> usize {
        iz * self.y * self.x + iy * self.x + ix
    }

    #[inline]
    pub const fn coords_of(self, index: usize) -> (usize, usize, usize) {
        let plane = self.y * self.x;
        let iz = index / plane;
        let iy = (index - iz * plane) / self.x;
        let ix = index % self.x;
        (iz, iy, ix)
    }

    /// Linear offset of a neighbor delta inside this extent.
    #[inline]
    pub const fn offset_of(self, dz: isize, dy: isize, dx: isize) -> isize {
        dz * (self.y * self.x) as isize + dy * self.x as isize + dx
    }

    /// 6-neighbor offsets in [`Direction::ALL`] order.
    pub fn n6_offsets(self) -> [isize; 6] {
        Direction::ALL.map(|direction| {
            let (dz, dy, dx) = direction.delta();
            self.offset_of(dz, dy, dx)
        })
    }

    /// 26-neighbor offsets in [`N26_DELTAS`] order.
    pub fn n26_offsets(self) -> [isize; 26] {
        N26_DELTAS.map(|(dz, dy, dx)| self.offset_of(dz, dy, dx))
    }

    /// Number of blocks of size `block` needed to cover this extent.
    pub const fn blocks_covering(self, block: Dims3) -> Dims3 {
        Dims3::new(
            self.z.div_ceil(block.z),
            self.y.div_ceil(block.y),
            self.x.div_ceil(block.x),
        )
    }

    /// Iterates every coordinate of this extent in raster order.
    pub fn iter_coords(self) -> impl Iterator<Item = Dims3> {
        (0..self.z).flat_map(move |iz| {
            (0..self.y).flat_map(move |iy| (0..self.x).map(move |ix| Dims3::new(iz, iy, ix)))
        })
    }
}

impl Display for Dims3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.z, self.y, self.x)
    }
}

/// One of the three volume axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Z,
    Y,
    X,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Z, Axis::Y, Axis::X];

    pub const fn as_char(self) -> char {
        match self {
            Axis::Z => 'z',
            Axis::Y => 'y',
            Axis::X => 'x',
        }
    }

    pub fn from_char(value: char) -> Option<Self> {
        match value.to_ascii_lowercase() {
            'z' => Some(Axis::Z),
            'y' => Some(Axis::Y),
            'x' => Some(Axis::X),
            _ => None,
        }
    }

    /// The two in-plane axes of a face perpendicular to this axis, as (rows, columns).
    pub const fn face_axes(self) -> (Axis, Axis) {
        match self {
            Axis::Z => (Axis::Y, Axis::X),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::X => (Axis::Z, Axis::Y),
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Erosion directions and block walls.
///
/// The declaration order is the thinning order and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Negative y
    Up,
    /// Positive y
    Down,
    /// Negative z
    North,
    /// Positive z
    South,
    /// Positive x
    East,
    /// Negative x
    West,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Up,
        Direction::Down,
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unit step `(dz, dy, dx)` pointing in this direction.
    pub const fn delta(self) -> (isize, isize, isize) {
        match self {
            Direction::Up => (0, -1, 0),
            Direction::Down => (0, 1, 0),
            Direction::North => (-1, 0, 0),
            Direction::South => (1, 0, 0),
            Direction::East => (0, 0, 1),
            Direction::West => (0, 0, -1),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The wall whose border voxels may not be eroded during a pass in this direction.
    pub const fn protected_wall(self) -> Self {
        self.opposite()
    }

    pub const fn axis(self) -> Axis {
        match self {
            Direction::Up | Direction::Down => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
            Direction::East | Direction::West => Axis::X,
        }
    }

    /// True for the directions pointing toward larger coordinates.
    pub const fn is_positive(self) -> bool {
        matches!(self, Direction::Down | Direction::South | Direction::East)
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        write!(f, "{}", name)
    }
}

/// Geometry of one block inside a volume.
///
/// All blocks of a volume share the same block size; the block index selects which
/// one this geometry converts indices for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockGeometry {
    volume_size: Dims3,
    block_size: Dims3,
    block_index: Dims3,
}

impl BlockGeometry {
    pub fn new(
        volume_size: Dims3,
        block_size: Dims3,
        block_index: Dims3,
    ) -> Result<Self, GeometryError> {
        if volume_size.has_zero_axis() {
            return Err(GeometryError::ZeroExtent(volume_size));
        }
        if block_size.has_zero_axis() {
            return Err(GeometryError::ZeroExtent(block_size));
        }
        if block_size.z > volume_size.z || block_size.y > volume_size.y || block_size.x > volume_size.x
        {
            return Err(GeometryError::BlockLargerThanVolume {
                block: block_size,
                volume: volume_size,
            });
        }
        let counts = volume_size.blocks_covering(block_size);
        if block_index.z >= counts.z || block_index.y >= counts.y || block_index.x >= counts.x {
            return Err(GeometryError::BlockOutOfVolume {
                block_index,
                volume: volume_size,
                block: block_size,
            });
        }
        Ok(Self {
            volume_size,
            block_size,
            block_index,
        })
    }

    /// Same volume and block size, different block.
    pub fn with_block_index(&self, block_index: Dims3) -> Result<Self, GeometryError> {
        Self::new(self.volume_size, self.block_size, block_index)
    }

    pub fn volume_size(&self) -> Dims3 {
        self.volume_size
    }

    pub fn block_size(&self) -> Dims3 {
        self.block_size
    }

    pub fn block_index(&self) -> Dims3 {
        self.block_index
    }

    pub fn padded_block_size(&self) -> Dims3 {
        self.block_size.padded()
    }

    pub fn padded_volume_size(&self) -> Dims3 {
        self.volume_size.padded()
    }

    /// Number of blocks along each axis.
    pub fn block_count(&self) -> Dims3 {
        self.volume_size.blocks_covering(self.block_size)
    }

    /// Global coordinates of local voxel `(0, 0, 0)`.
    pub fn block_origin(&self) -> Dims3 {
        Dims3::new(
            self.block_index.z * self.block_size.z,
            self.block_index.y * self.block_size.y,
            self.block_index.x * self.block_size.x,
        )
    }

    #[inline]
    pub fn local_index(&self, iz: usize, iy: usize, ix: usize) -> usize {
        self.block_size.index_of(iz, iy, ix)
    }

    #[inline]
    pub fn local_coords(&self, local: usize) -> (usize, usize, usize) {
        self.block_size.coords_of(local)
    }

    #[inline]
    pub fn local_to_padded(&self, local: usize) -> usize {
        let (iz, iy, ix) = self.local_coords(local);
        self.padded_block_size().index_of(iz + 1, iy + 1, ix + 1)
    }

    /// Inverse of [`local_to_padded`](Self::local_to_padded); undefined for halo voxels.
    #[inline]
    pub fn padded_to_local(&self, padded: usize) -> usize {
        let (iz, iy, ix) = self.padded_coords(padded);
        self.local_index(iz - 1, iy - 1, ix - 1)
    }

    #[inline]
    pub fn padded_coords(&self, padded: usize) -> (usize, usize, usize) {
        self.padded_block_size().coords_of(padded)
    }

    /// True when a padded index lies in the one-voxel halo around the block.
    pub fn is_halo(&self, padded: usize) -> bool {
        let dims = self.padded_block_size();
        let (iz, iy, ix) = dims.coords_of(padded);
        iz == 0 || iz == dims.z - 1 || iy == 0 || iy == dims.y - 1 || ix == 0 || ix == dims.x - 1
    }

    pub fn local_coords_to_global(&self, iz: usize, iy: usize, ix: usize) -> usize {
        let origin = self.block_origin();
        self.volume_size
            .index_of(iz + origin.z, iy + origin.y, ix + origin.x)
    }

    pub fn local_to_global(&self, local: usize) -> usize {
        let (iz, iy, ix) = self.local_coords(local);
        self.local_coords_to_global(iz, iy, ix)
    }

    pub fn padded_to_global(&self, padded: usize) -> usize {
        self.local_to_global(self.padded_to_local(padded))
    }

    /// Local index of a global voxel inside whichever block contains it.
    pub fn global_to_local(&self, global: usize) -> usize {
        let (iz, iy, ix) = self.volume_size.coords_of(global);
        self.local_index(
            iz % self.block_size.z,
            iy % self.block_size.y,
            ix % self.block_size.x,
        )
    }

    pub fn global_coords(&self, global: usize) -> (usize, usize, usize) {
        self.volume_size.coords_of(global)
    }

    /// Global index inside the volume extended by a one-voxel halo.
    pub fn global_to_padded_global(&self, global: usize) -> usize {
        let (iz, iy, ix) = self.volume_size.coords_of(global);
        self.padded_volume_size().index_of(iz + 1, iy + 1, ix + 1)
    }

    pub fn padded_global_to_global(&self, padded: usize) -> usize {
        let (iz, iy, ix) = self.padded_volume_size().coords_of(padded);
        self.volume_size.index_of(iz - 1, iy - 1, ix - 1)
    }

    /// Block index of the block containing a global voxel.
    pub fn block_of_global(&self, global: usize) -> Dims3 {
        let (iz, iy, ix) = self.volume_size.coords_of(global);
        Dims3::new(
            iz / self.block_size.z,
            iy / self.block_size.y,
            ix / self.block_size.x,
        )
    }

    /// Validates a local index read from an external source.
    pub fn checked_local(&self, local: i64) -> Result<usize, GeometryError> {
        let len = self.block_size.voxel_count();
        usize::try_from(local)
            .ok()
            .filter(|&index| index < len)
            .ok_or(GeometryError::IndexOutOfRange { index: local, len })
    }

    /// Validates a global index read from an external source.
    pub fn checked_global(&self, global: i64) -> Result<usize, GeometryError> {
        let len = self.volume_size.voxel_count();
        usize::try_from(global)
            .ok()
            .filter(|&index| index < len)
            .ok_or(GeometryError::IndexOutOfRange { index: global, len })
    }

    /// Walls of the block that a local voxel is a border-face voxel of.
    ///
    /// A border-face voxel lies on the wall but not on any edge or corner of the block.
    pub fn border_walls(&self, iz: usize, iy: usize, ix: usize) -> impl Iterator<Item = Direction> {
        let size = self.block_size;
        let inside = |value: usize, extent: usize| value != 0 && value != extent - 1;
        let face_z = inside(iy, size.y) && inside(ix, size.x);
        let face_y = inside(iz, size.z) && inside(ix, size.x);
        let face_x = inside(iz, size.z) && inside(iy, size.y);

        let candidates = [
            (Direction::Up, face_y && iy == 0),
            (Direction::Down, face_y && iy == size.y - 1),
            (Direction::North, face_z && iz == 0),
            (Direction::South, face_z && iz == size.z - 1),
            (Direction::East, face_x && ix == size.x - 1),
            (Direction::West, face_x && ix == 0),
        ];
        candidates
            .into_iter()
            .filter_map(|(direction, on_wall)| on_wall.then_some(direction))
    }
}
