// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
2-D contour thinning of face images.

Object pixels are eroded from the contour inward until no contour pixel is deletable. A
pixel's neighborhood code packs the 24 pixels of its 5×5 support, center excluded: bits
0..8 are the inner ring clockwise from north-west, bits 8..24 the outer ring starting
west of the inner ring's west pixel and running clockwise from the north-west corner.

Rules that can judge every contour pixel of an iteration against the same image report
[`ContourRule::parallel_safe`]; the others delete one pixel at a time.
*/

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use ndarray::Array2;

use crate::types::{SkeletonError, SkeletonResult};

/// File name of the 2-D deletability table inside the lookup-table directory.
pub const FPTA_FILE_NAME: &str = "ronse_fpta.lut";

/// Bit-packed, one bit per 24-bit code.
pub const FPTA_TABLE_BYTES: usize = 1 << 21;

const BORDER: usize = 3;
const OBJECT: u8 = 1;
const CONTOUR: u8 = 3;

/// Decides whether a contour pixel may be deleted given its neighborhood code.
pub trait ContourRule: Send + Sync {
    fn is_deletable(&self, code: u32) -> bool;

    /// True if all deletable pixels of an iteration can be removed together.
    fn parallel_safe(&self) -> bool;
}

/// Precomputed fully parallel thinning table.
#[derive(Clone)]
pub struct FptaTable {
    bits: Vec<u8>,
}

impl FptaTable {
    pub fn load(lut_dir: &Path) -> SkeletonResult<Self> {
        let path = lut_dir.join(FPTA_FILE_NAME);
        let bits = fs::read(&path).map_err(SkeletonError::io(&path))?;
        if bits.len() != FPTA_TABLE_BYTES {
            return Err(SkeletonError::LookupTable {
                path,
                expected: FPTA_TABLE_BYTES,
                actual: bits.len(),
            });
        }
        Ok(Self { bits })
    }

    pub fn from_bytes(bits: Vec<u8>) -> SkeletonResult<Self> {
        if bits.len() != FPTA_TABLE_BYTES {
            return Err(SkeletonError::LookupTable {
                path: "<memory>".into(),
                expected: FPTA_TABLE_BYTES,
                actual: bits.len(),
            });
        }
        Ok(Self { bits })
    }
}

impl std::fmt::Debug for FptaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FptaTable")
            .field("bytes", &self.bits.len())
            .finish()
    }
}

impl ContourRule for FptaTable {
    #[inline]
    fn is_deletable(&self, code: u32) -> bool {
        let code = code & 0x00FF_FFFF;
        self.bits[(code >> 3) as usize] & (1 << (code & 7)) != 0
    }

    fn parallel_safe(&self) -> bool {
        true
    }
}

/// (8, 4)-simple, non-end-point test computed from the inner ring.
///
/// A pixel is deletable when it has at least two object 8-neighbors and its Yokoi
/// 8-connectivity number is 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleContourRule;

impl SimpleContourRule {
    /// Yokoi connectivity number for 8-connectivity over the inner-ring bits.
    pub fn connectivity_number(code: u32) -> u32 {
        let empty = |k: usize| u32::from(code & (1 << (k % 8)) == 0);
        [1usize, 3, 5, 7]
            .iter()
            .map(|&k| empty(k) - empty(k) * empty(k + 1) * empty(k + 2))
            .sum()
    }
}

impl ContourRule for SimpleContourRule {
    fn is_deletable(&self, code: u32) -> bool {
        (code & 0xFF).count_ones() >= 2 && Self::connectivity_number(code) == 1
    }

    fn parallel_safe(&self) -> bool {
        false
    }
}

/// Working copy of an image with a zero border wide enough for the 5×5 support.
struct PaddedImage {
    data: Vec<u8>,
    width: usize,
    env24: [isize; 24],
    n4: [isize; 4],
}

impl PaddedImage {
    fn new(image: &Array2<bool>) -> Self {
        let (rows, cols) = image.dim();
        let width = cols + 2 * BORDER;
        let height = rows + 2 * BORDER;
        let mut data = vec![0u8; width * height];
        for ((row, col), &set) in image.indexed_iter() {
            if set {
                data[(row + BORDER) * width + col + BORDER] = OBJECT;
            }
        }

        let w = width as isize;
        let env24 = [
            -w - 1,
            -w,
            -w + 1,
            1,
            w + 1,
            w,
            w - 1,
            -1,
            -2,
            -w - 2,
            -2 * w - 2,
            -2 * w - 1,
            -2 * w,
            -2 * w + 1,
            -2 * w + 2,
            -w + 2,
            2,
            w + 2,
            2 * w + 2,
            2 * w + 1,
            2 * w,
            2 * w - 1,
            2 * w - 2,
            w - 2,
        ];
        Self {
            data,
            width,
            env24,
            n4: [-w, 1, w, -1],
        }
    }

    #[inline]
    fn at(&self, pixel: usize, offset: isize) -> usize {
        pixel.wrapping_add_signed(offset)
    }

    fn code(&self, pixel: usize) -> u32 {
        self.env24
            .iter()
            .enumerate()
            .fold(0u32, |code, (bit, &offset)| {
                if self.data[self.at(pixel, offset)] != 0 {
                    code | (1 << bit)
                } else {
                    code
                }
            })
    }

    fn seed_contour(&mut self) -> VecDeque<usize> {
        let mut contour = VecDeque::new();
        for pixel in 0..self.data.len() {
            if self.data[pixel] != OBJECT {
                continue;
            }
            // object pixels never touch the outer border, so neighbors stay in range
            if self.n4.iter().any(|&offset| self.data[self.at(pixel, offset)] == 0) {
                self.data[pixel] = CONTOUR;
                contour.push_back(pixel);
            }
        }
        contour
    }

    fn delete(&mut self, pixel: usize, contour: &mut VecDeque<usize>) {
        self.data[pixel] = 0;
        for offset in self.n4 {
            let neighbor = self.at(pixel, offset);
            if self.data[neighbor] == OBJECT {
                self.data[neighbor] = CONTOUR;
                contour.push_back(neighbor);
            }
        }
    }

    /// One erosion iteration; returns the number of deleted pixels.
    fn iterate<R: ContourRule + ?Sized>(&mut self, rule: &R, contour: &mut VecDeque<usize>) -> usize {
        let length = contour.len();
        let mut deletable = Vec::new();
        let mut deleted = 0;

        for _ in 0..length {
            let Some(pixel) = contour.pop_front() else {
                break;
            };
            if self.data[pixel] != CONTOUR {
                continue;
            }
            if !rule.is_deletable(self.code(pixel)) {
                contour.push_back(pixel);
            } else if rule.parallel_safe() {
                deletable.push(pixel);
            } else {
                self.delete(pixel, contour);
                deleted += 1;
            }
        }

        for pixel in deletable {
            self.delete(pixel, contour);
            deleted += 1;
        }
        deleted
    }
}

/// Thins a binary image to a one-pixel-wide curve.
///
/// `image` is indexed `[row, column]`. Returns the surviving pixels as `(column, row)`
/// pairs in row-major order.
pub fn thin_image<R: ContourRule + ?Sized>(image: &Array2<bool>, rule: &R) -> Vec<(usize, usize)> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    let mut padded = PaddedImage::new(image);
    let mut contour = padded.seed_contour();

    let mut iterations = 0;
    loop {
        iterations += 1;
        if padded.iterate(rule, &mut contour) == 0 {
            break;
        }
    }

    let mut curve = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if padded.data[(row + BORDER) * padded.width + col + BORDER] & OBJECT != 0 {
                curve.push((col, row));
            }
        }
    }
    tracing::trace!(
        target: "synskel-thinning",
        rows,
        cols,
        iterations,
        remaining = curve.len(),
        "Thinned face image"
    );
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn eight_connected(points: &[(usize, usize)]) -> bool {
        let Some(&start) = points.first() else {
            return true;
        };
        let mut seen = vec![start];
        let mut stack = vec![start];
        while let Some((u, v)) = stack.pop() {
            for &(a, b) in points {
                if a.abs_diff(u) <= 1 && b.abs_diff(v) <= 1 && !seen.contains(&(a, b)) {
                    seen.push((a, b));
                    stack.push((a, b));
                }
            }
        }
        seen.len() == points.len()
    }

    #[test]
    fn test_connectivity_number() {
        // north and south set: a bridge pixel
        let bridge = (1 << 1) | (1 << 5);
        assert_eq!(SimpleContourRule::connectivity_number(bridge), 2);
        // north, north-east and east: a corner pixel
        let corner = (1 << 1) | (1 << 2) | (1 << 3);
        assert_eq!(SimpleContourRule::connectivity_number(corner), 1);
        assert!(SimpleContourRule.is_deletable(corner));
        // single neighbor is an end point
        assert!(!SimpleContourRule.is_deletable(1 << 3));
    }

    #[test]
    fn test_line_is_kept() {
        let mut image = Array2::from_elem((5, 9), false);
        image.row_mut(2).fill(true);
        let curve = thin_image(&image, &SimpleContourRule);
        let expected: Vec<_> = (0..9).map(|col| (col, 2)).collect();
        assert_eq!(curve, expected);
    }

    #[test]
    fn test_bar_thins_to_connected_curve() {
        let mut image = Array2::from_elem((7, 12), false);
        image
            .slice_mut(ndarray::s![1..5, 1..11])
            .fill(true);
        let curve = thin_image(&image, &SimpleContourRule);

        assert!(!curve.is_empty());
        assert!(curve.len() < 40);
        assert!(curve.iter().all(|&(col, row)| image[[row, col]]));
        assert!(eight_connected(&curve));
    }

    #[test]
    fn test_empty_table_deletes_nothing() {
        let table = FptaTable::from_bytes(vec![0u8; FPTA_TABLE_BYTES]).unwrap();
        let mut image = Array2::from_elem((3, 3), false);
        image[[0, 0]] = true;
        image[[1, 1]] = true;
        image[[2, 1]] = true;
        let curve = thin_image(&image, &table);
        assert_eq!(curve, vec![(0, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_table_size_is_checked() {
        assert!(matches!(
            FptaTable::from_bytes(vec![0u8; 16]),
            Err(SkeletonError::LookupTable { actual: 16, .. })
        ));
    }

    #[test]
    fn test_full_table_removes_contour() {
        // every code deletable: the first iteration removes the whole contour at once
        let table = FptaTable::from_bytes(vec![0xFFu8; FPTA_TABLE_BYTES]).unwrap();
        let image = Array2::from_elem((2, 2), true);
        assert!(thin_image(&image, &table).is_empty());
    }
}
