// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Row-major counter matrix backing Count-Min, Count Sketch and friends.
//!
//! Construction takes a row count and a total byte budget; the column count
//! is derived (`floor(budget / rows / sizeof(T))`, at least one). Updates
//! saturate instead of wrapping.

use crate::error::SketchError;

/// Rounds `x` up to the next multiple of `y`.
///
/// Used when computing the shared-memory stride of a counter cell: the
/// wire/mmap layout pads every cell to a multiple of 8 bytes regardless of
/// the native counter width (see `crate::snapshot`).
pub const fn round_up(x: usize, y: usize) -> usize {
    (x + y - 1) / y * y
}

/// The shared-memory stride, in bytes, of one counter cell of type `T`.
pub const fn cell_stride<T>() -> usize {
    round_up(std::mem::size_of::<T>(), 8)
}

/// A fixed-width integer counter type usable as a matrix cell.
///
/// `saturating_add_counter` clamps at the type's bound instead of wrapping,
/// which is the saturation semantics spec.md requires for every counter.
pub trait SaturatingCounter: Copy + Default + PartialEq + PartialOrd + Send + Sync + 'static {
    /// The representable maximum (used by sketches that need to detect
    /// saturation explicitly, e.g. `MVSketch`'s value/count split).
    const MAX: Self;
    /// The representable minimum.
    const MIN: Self;

    /// Adds `delta`, clamping at `MAX`/`MIN` instead of wrapping.
    fn saturating_add_counter(self, delta: Self) -> Self;

    /// Subtracts `delta`, clamping at `MIN` instead of wrapping.
    fn saturating_sub_counter(self, delta: Self) -> Self;

    /// Native-endian 4-byte encoding (every counter type in this crate is
    /// `u32` or `i32`). Used by the `kernel-shared` mmap buffer to decode
    /// cells read back out of shared memory.
    fn to_ne_bytes_4(self) -> [u8; 4];

    /// Inverse of [`SaturatingCounter::to_ne_bytes_4`].
    fn from_ne_bytes_4(bytes: [u8; 4]) -> Self;
}

impl SaturatingCounter for u32 {
    const MAX: Self = u32::MAX;
    const MIN: Self = u32::MIN;

    fn saturating_add_counter(self, delta: Self) -> Self {
        self.saturating_add(delta)
    }

    fn saturating_sub_counter(self, delta: Self) -> Self {
        self.saturating_sub(delta)
    }

    fn to_ne_bytes_4(self) -> [u8; 4] {
        self.to_ne_bytes()
    }

    fn from_ne_bytes_4(bytes: [u8; 4]) -> Self {
        u32::from_ne_bytes(bytes)
    }
}

impl SaturatingCounter for i32 {
    const MAX: Self = i32::MAX;
    const MIN: Self = i32::MIN;

    fn saturating_add_counter(self, delta: Self) -> Self {
        self.saturating_add(delta)
    }

    fn saturating_sub_counter(self, delta: Self) -> Self {
        self.saturating_sub(delta)
    }

    fn to_ne_bytes_4(self) -> [u8; 4] {
        self.to_ne_bytes()
    }

    fn from_ne_bytes_4(bytes: [u8; 4]) -> Self {
        i32::from_ne_bytes(bytes)
    }
}

/// Row-major matrix of saturating counters.
#[derive(Debug, Clone)]
pub struct CounterMatrix<T: SaturatingCounter> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: SaturatingCounter> CounterMatrix<T> {
    /// Builds a matrix with `rows` rows and as many columns as fit in
    /// `byte_budget` (`floor(byte_budget / rows / sizeof(T))`).
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `rows` is zero or the
    /// budget does not cover at least one column per row.
    pub fn new(rows: usize, byte_budget: usize) -> Result<Self, SketchError> {
        if rows == 0 {
            return Err(SketchError::InvalidParameter("rows must be greater than zero"));
        }
        let cols = byte_budget / rows / std::mem::size_of::<T>();
        if cols == 0 {
            return Err(SketchError::InvalidParameter(
                "byte_budget too small to hold one column per row",
            ));
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![T::default(); rows * cols],
        })
    }

    /// Builds a matrix with explicit row and column counts.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if either dimension is zero.
    pub fn with_dimensions(rows: usize, cols: usize) -> Result<Self, SketchError> {
        if rows == 0 {
            return Err(SketchError::InvalidParameter("rows must be greater than zero"));
        }
        if cols == 0 {
            return Err(SketchError::InvalidParameter("cols must be greater than zero"));
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![T::default(); rows * cols],
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Adds `delta` to cell `(row, col)`, saturating on overflow.
    pub fn update(&mut self, row: usize, col: usize, delta: T) {
        let idx = row * self.cols + col;
        self.cells[idx] = self.cells[idx].saturating_add_counter(delta);
    }

    /// Reads cell `(row, col)`.
    pub fn read(&self, row: usize, col: usize) -> T {
        self.cells[row * self.cols + col]
    }

    /// Subtracts `delta` from cell `(row, col)`, saturating at the type's
    /// minimum instead of wrapping.
    pub fn subtract(&mut self, row: usize, col: usize, delta: T) {
        let idx = row * self.cols + col;
        self.cells[idx] = self.cells[idx].saturating_sub_counter(delta);
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        self.cells.fill(T::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_derives_columns_from_budget() {
        let m = CounterMatrix::<u32>::new(4, 1024).unwrap();
        assert_eq!(m.rows(), 4);
        assert_eq!(m.cols(), 1024 / 4 / 4);
    }

    #[test]
    fn constructor_rejects_degenerate_shapes() {
        assert!(CounterMatrix::<u32>::new(0, 1024).is_err());
        assert!(CounterMatrix::<u32>::new(100, 4).is_err());
        assert!(CounterMatrix::<u32>::with_dimensions(0, 4).is_err());
        assert!(CounterMatrix::<u32>::with_dimensions(4, 0).is_err());
    }

    #[test]
    fn update_saturates_instead_of_wrapping() {
        let mut m = CounterMatrix::<u32>::with_dimensions(1, 1).unwrap();
        m.update(0, 0, u32::MAX);
        m.update(0, 0, 100);
        assert_eq!(m.read(0, 0), u32::MAX);
    }

    #[test]
    fn clear_resets_all_cells() {
        let mut m = CounterMatrix::<i32>::with_dimensions(2, 2).unwrap();
        m.update(0, 0, 5);
        m.update(1, 1, -5);
        m.clear();
        assert_eq!(m.read(0, 0), 0);
        assert_eq!(m.read(1, 1), 0);
    }

    #[test]
    fn stride_is_always_a_multiple_of_eight() {
        assert_eq!(cell_stride::<u32>(), 8);
        assert_eq!(cell_stride::<i32>(), 8);
        assert_eq!(round_up(3, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 8), 16);
    }
}
