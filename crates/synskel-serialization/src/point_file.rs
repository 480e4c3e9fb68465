// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Checksummed point files.

Layout, all integers native-endian `i64`:

```text
volume_size[3], block_size[3], label_count
label_count times:
    label, point_count
    global_indices[point_count]
    local_indices[point_count]
checksum = sum(global_indices[i] + local_indices[i]) over every label
```

The engine writes one label per file except for anchor files, which carry every label
shared across a block face.
*/

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use synskel_structures::Dims3;

use crate::atomic::write_atomically;
use crate::error::{PointFileError, PointFileResult};

/// Upper bound on pre-allocation driven by counts read from disk.
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

/// Shared header of point and width files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointFileHeader {
    pub volume_size: Dims3,
    pub block_size: Dims3,
}

impl PointFileHeader {
    pub fn new(volume_size: Dims3, block_size: Dims3) -> Self {
        Self {
            volume_size,
            block_size,
        }
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut W, label_count: usize) -> io::Result<()> {
        for value in self
            .volume_size
            .to_array()
            .into_iter()
            .chain(self.block_size.to_array())
        {
            writer.write_i64::<NativeEndian>(value as i64)?;
        }
        writer.write_i64::<NativeEndian>(label_count as i64)
    }

    /// Reads the header and returns it with the label count.
    pub(crate) fn read<R: Read>(reader: &mut R, path: &Path) -> PointFileResult<(Self, usize)> {
        let mut values = [0i64; 7];
        reader
            .read_i64_into::<NativeEndian>(&mut values)
            .map_err(PointFileError::io(path))?;

        let mut extents = [0usize; 6];
        for (slot, value) in extents.iter_mut().zip(values) {
            *slot = usize::try_from(value)
                .map_err(|_| PointFileError::corrupt(path, format!("negative extent {}", value)))?;
        }
        let label_count = read_count(values[6], path)?;

        let header = Self::new(
            Dims3::new(extents[0], extents[1], extents[2]),
            Dims3::new(extents[3], extents[4], extents[5]),
        );
        Ok((header, label_count))
    }
}

pub(crate) fn read_count(value: i64, path: &Path) -> PointFileResult<usize> {
    usize::try_from(value)
        .map_err(|_| PointFileError::corrupt(path, format!("negative count {}", value)))
}

/// Points of one label, stored as parallel global and local index columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPoints {
    pub label: i64,
    pub global_indices: Vec<i64>,
    pub local_indices: Vec<i64>,
}

impl LabelPoints {
    pub fn new(label: i64) -> Self {
        Self {
            label,
            global_indices: Vec::new(),
            local_indices: Vec::new(),
        }
    }

    pub fn with_capacity(label: i64, capacity: usize) -> Self {
        Self {
            label,
            global_indices: Vec::with_capacity(capacity),
            local_indices: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, global_index: i64, local_index: i64) {
        self.global_indices.push(global_index);
        self.local_indices.push(local_index);
    }

    pub fn len(&self) -> usize {
        self.global_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_indices.is_empty()
    }

    /// `(global, local)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.global_indices
            .iter()
            .copied()
            .zip(self.local_indices.iter().copied())
    }

    pub fn checksum(&self) -> i64 {
        self.iter()
            .fold(0i64, |sum, (global, local)| sum.wrapping_add(global).wrapping_add(local))
    }
}

/// A full point file: header plus any number of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointFile {
    pub header: PointFileHeader,
    pub labels: Vec<LabelPoints>,
}

impl PointFile {
    pub fn new(header: PointFileHeader) -> Self {
        Self {
            header,
            labels: Vec::new(),
        }
    }

    pub fn single(header: PointFileHeader, points: LabelPoints) -> Self {
        Self {
            header,
            labels: vec![points],
        }
    }

    pub fn label(&self, label: i64) -> Option<&LabelPoints> {
        self.labels.iter().find(|points| points.label == label)
    }

    pub fn point_count(&self) -> usize {
        self.labels.iter().map(LabelPoints::len).sum()
    }

    /// Checksum over every label, as stored at the end of the file.
    pub fn checksum(&self) -> i64 {
        self.labels
            .iter()
            .fold(0i64, |sum, points| sum.wrapping_add(points.checksum()))
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.header.write(writer, self.labels.len())?;
        for points in &self.labels {
            if points.global_indices.len() != points.local_indices.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("label {} has unequal index columns", points.label),
                ));
            }
            writer.write_i64::<NativeEndian>(points.label)?;
            writer.write_i64::<NativeEndian>(points.len() as i64)?;
            for &global in &points.global_indices {
                writer.write_i64::<NativeEndian>(global)?;
            }
            for &local in &points.local_indices {
                writer.write_i64::<NativeEndian>(local)?;
            }
        }
        writer.write_i64::<NativeEndian>(self.checksum())
    }

    /// Decodes a point file and verifies its trailing checksum.
    ///
    /// `origin` only labels errors.
    pub fn decode<R: Read>(reader: &mut R, origin: &Path) -> PointFileResult<Self> {
        let (header, label_count) = PointFileHeader::read(reader, origin)?;
        let mut labels = Vec::with_capacity(label_count.min(MAX_PREALLOCATED_POINTS));

        for _ in 0..label_count {
            let label = reader
                .read_i64::<NativeEndian>()
                .map_err(PointFileError::io(origin))?;
            let count = read_count(
                reader
                    .read_i64::<NativeEndian>()
                    .map_err(PointFileError::io(origin))?,
                origin,
            )?;

            let mut points = LabelPoints::with_capacity(label, count.min(MAX_PREALLOCATED_POINTS));
            points.global_indices = read_column(reader, count, origin)?;
            points.local_indices = read_column(reader, count, origin)?;
            labels.push(points);
        }

        let expected = reader
            .read_i64::<NativeEndian>()
            .map_err(PointFileError::io(origin))?;
        let file = Self { header, labels };
        let actual = file.checksum();
        if expected != actual {
            return Err(PointFileError::ChecksumMismatch {
                path: origin.to_path_buf(),
                expected,
                actual,
            });
        }
        Ok(file)
    }

    pub fn from_bytes(bytes: &[u8]) -> PointFileResult<Self> {
        let mut cursor = bytes;
        Self::decode(&mut cursor, Path::new("<memory>"))
    }

    /// Encodes into memory; fails only when a label's index columns differ in length.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(8 * (8 + 2 * self.point_count()));
        self.encode(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_to(&self, path: &Path) -> PointFileResult<()> {
        write_atomically(path, |writer| self.encode(writer))?;
        tracing::trace!(
            target: "synskel-serialization",
            path = %path.display(),
            labels = self.labels.len(),
            points = self.point_count(),
            "Wrote point file"
        );
        Ok(())
    }

    pub fn read_from(path: &Path) -> PointFileResult<Self> {
        let file = File::open(path).map_err(PointFileError::io(path))?;
        Self::decode(&mut BufReader::new(file), path)
    }

    /// Like [`read_from`](Self::read_from) but a missing file is `Ok(None)`.
    pub fn read_if_exists(path: &Path) -> PointFileResult<Option<Self>> {
        match File::open(path) {
            Ok(file) => Self::decode(&mut BufReader::new(file), path).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PointFileError::io(path)(err)),
        }
    }
}

fn read_column<R: Read>(reader: &mut R, count: usize, path: &Path) -> PointFileResult<Vec<i64>> {
    let mut column = Vec::with_capacity(count.min(MAX_PREALLOCATED_POINTS));
    for _ in 0..count {
        column.push(
            reader
                .read_i64::<NativeEndian>()
                .map_err(PointFileError::io(path))?,
        );
    }
    Ok(column)
}

/// `{directory}/{label:016}.pts`, the per-label file name used by every stage.
pub fn label_file_path(directory: &Path, label: i64) -> PathBuf {
    directory.join(format!("{:016}.pts", label))
}

/// `{z:04}z-{y:04}y-{x:04}x`, the per-block directory and synapse file stem.
pub fn block_stem(block_index: Dims3) -> String {
    format!(
        "{:04}z-{:04}y-{:04}x",
        block_index.z, block_index.y, block_index.x
    )
}
