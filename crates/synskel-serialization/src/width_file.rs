// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Per-voxel scalar files (thinning widths, refinement distances).

Same header as a point file, then per label `label, count` followed by `count`
interleaved `(global_index: i64, value: f32)` pairs. There is no checksum.
*/

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::atomic::write_atomically;
use crate::error::{PointFileError, PointFileResult};
use crate::point_file::{read_count, PointFileHeader};

/// Scalar values of one label keyed by global index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelValues {
    pub label: i64,
    pub entries: Vec<(i64, f32)>,
}

impl LabelValues {
    pub fn new(label: i64) -> Self {
        Self {
            label,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, global_index: i64, value: f32) {
        self.entries.push((global_index, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidthFile {
    pub header: PointFileHeader,
    pub labels: Vec<LabelValues>,
}

impl WidthFile {
    pub fn single(header: PointFileHeader, values: LabelValues) -> Self {
        Self {
            header,
            labels: vec![values],
        }
    }

    pub fn label(&self, label: i64) -> Option<&LabelValues> {
        self.labels.iter().find(|values| values.label == label)
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.header.write(writer, self.labels.len())?;
        for values in &self.labels {
            writer.write_i64::<NativeEndian>(values.label)?;
            writer.write_i64::<NativeEndian>(values.len() as i64)?;
            for &(global, value) in &values.entries {
                writer.write_i64::<NativeEndian>(global)?;
                writer.write_f32::<NativeEndian>(value)?;
            }
        }
        Ok(())
    }

    pub fn decode<R: Read>(reader: &mut R, origin: &Path) -> PointFileResult<Self> {
        let (header, label_count) = PointFileHeader::read(reader, origin)?;
        let mut labels = Vec::with_capacity(label_count.min(1024));
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
            let mut values = LabelValues::new(label);
            for _ in 0..count {
                let global = reader
                    .read_i64::<NativeEndian>()
                    .map_err(PointFileError::io(origin))?;
                let value = reader
                    .read_f32::<NativeEndian>()
                    .map_err(PointFileError::io(origin))?;
                values.push(global, value);
            }
            labels.push(values);
        }
        Ok(Self { header, labels })
    }

    pub fn write_to(&self, path: &Path) -> PointFileResult<()> {
        write_atomically(path, |writer| self.encode(writer))
    }

    pub fn read_from(path: &Path) -> PointFileResult<Self> {
        let file = File::open(path).map_err(PointFileError::io(path))?;
        Self::decode(&mut BufReader::new(file), path)
    }
}

/// Distances written by refinement share the width layout.
pub type DistanceFile = WidthFile;

#[cfg(test)]
mod tests {
    use super::*;
    use synskel_structures::Dims3;

    #[test]
    fn test_pairs_are_interleaved() {
        let header = PointFileHeader::new(Dims3::new(2, 2, 2), Dims3::new(2, 2, 2));
        let mut values = LabelValues::new(3);
        values.push(5, 1.5);
        values.push(6, f32::MAX);
        let file = WidthFile::single(header, values);

        let mut bytes = Vec::new();
        file.encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 8 * 7 + 8 * 2 + 2 * (8 + 4));

        let decoded = WidthFile::decode(&mut bytes.as_slice(), Path::new("<memory>")).unwrap();
        assert_eq!(decoded.label(3).unwrap().entries, vec![(5, 1.5), (6, f32::MAX)]);
    }
}
