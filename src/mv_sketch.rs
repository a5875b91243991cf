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
//! MVSketch: per-cell majority vote candidate plus a running total.
//!
//! Each cell tracks a candidate flow and a signed vote count for it
//! alongside the total traffic ever routed through the cell; a row's true
//! majority flow survives as the candidate with high probability.

use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

#[derive(Debug, Clone, Copy)]
struct Cell<K> {
    candidate: K,
    value: u32,
    count: i32,
}

impl<K: FlowKey> Default for Cell<K> {
    fn default() -> Self {
        Self {
            candidate: K::default(),
            value: 0,
            count: 0,
        }
    }
}

/// Majority-vote frequency sketch.
///
/// # Example
/// ```rust
/// use flowsketch::mv_sketch::MVSketch;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut mv = MVSketch::<TwoTuple>::new(4, 4096).unwrap();
/// let flow = TwoTuple::new(1, 2);
/// mv.update(&flow, 100);
/// assert!(mv.query(&flow) > 0);
/// ```
#[derive(Debug, Clone)]
pub struct MVSketch<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    rows: usize,
    cols: usize,
    cells: Vec<Cell<K>>,
    hash: H,
}

impl<K: FlowKey, H: HashFamily> MVSketch<K, H> {
    /// Builds a sketch with `rows` rows over a total byte budget.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `rows` is zero or the
    /// budget cannot hold at least one cell per row.
    pub fn new(rows: usize, byte_budget: usize) -> Result<Self, SketchError> {
        Self::with_hash_family(rows, byte_budget, H::default())
    }

    /// Builds a sketch with an explicit hash family instance.
    pub fn with_hash_family(rows: usize, byte_budget: usize, hash: H) -> Result<Self, SketchError> {
        if rows == 0 {
            return Err(SketchError::InvalidParameter("rows must be greater than zero"));
        }
        let cell_size = std::mem::size_of::<Cell<K>>();
        let cols = byte_budget / rows / cell_size;
        if cols == 0 {
            return Err(SketchError::InvalidParameter(
                "byte_budget too small to hold one cell per row",
            ));
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            hash,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of cells per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    fn col(&self, flow: &K, row: usize) -> usize {
        self.hash.hash(flow, row as u64, self.cols as u64) as usize
    }

    /// Adds `delta` occurrences of `flow` to every row's candidate cell.
    pub fn update(&mut self, flow: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        for row in 0..self.rows {
            let col = self.col(flow, row);
            let idx = row * self.cols + col;
            let cell = &mut self.cells[idx];

            cell.value = cell.value.saturating_add(delta);
            if cell.candidate == *flow {
                cell.count = cell.count.saturating_add(delta as i32);
            } else {
                cell.count = cell.count.saturating_sub(delta as i32);
                if cell.count < 0 {
                    cell.candidate = *flow;
                    cell.count = -cell.count;
                }
            }
        }
    }

    /// Returns the minimum per-row estimate: `(value+count)/2` when `flow`
    /// is the row's candidate, else `max(0, (value-count)/2)`.
    pub fn query(&self, flow: &K) -> u64 {
        let mut min = u64::MAX;
        for row in 0..self.rows {
            let col = self.col(flow, row);
            let cell = &self.cells[row * self.cols + col];
            let estimate = if cell.candidate == *flow {
                (u64::from(cell.value) + cell.count as u64) / 2
            } else {
                let value = i64::from(cell.value);
                let diff = value - i64::from(cell.count);
                (diff.max(0) / 2) as u64
            };
            min = min.min(estimate);
        }
        min
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets every cell to the post-construction empty state.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructor_validates_parameters() {
        assert!(MVSketch::<TwoTuple>::new(0, 4096).is_err());
        assert!(MVSketch::<TwoTuple>::new(1000, 4).is_err());
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut mv = MVSketch::<TwoTuple>::new(4, 4096).unwrap();
        let flow = TwoTuple::new(1, 2);
        mv.update(&flow, 0);
        assert!(!mv.has_flow(&flow));
    }

    #[test]
    fn majority_flow_in_a_row_is_recovered() {
        let mut mv = MVSketch::<TwoTuple>::new(4, 8192).unwrap();
        let heavy = TwoTuple::new(0xC0A80101, 0x0A000001);
        for _ in 0..200 {
            mv.update(&heavy, 1);
        }
        assert!(mv.query(&heavy) > 0);
    }

    #[test]
    fn clear_resets_to_fresh_state() {
        let mut mv = MVSketch::<TwoTuple>::new(4, 4096).unwrap();
        let flow = TwoTuple::new(5, 6);
        mv.update(&flow, 50);
        mv.clear();
        assert_eq!(mv.query(&flow), 0);
    }

    #[test]
    fn determinism_across_runs() {
        let flow = TwoTuple::new(7, 8);
        let mut a = MVSketch::<TwoTuple>::new(4, 4096).unwrap();
        let mut b = MVSketch::<TwoTuple>::new(4, 4096).unwrap();
        a.update(&flow, 30);
        b.update(&flow, 30);
        assert_eq!(a.query(&flow), b.query(&flow));
    }
}
