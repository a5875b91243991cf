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
//! Count-Min sketch: an overestimating frequency estimator.
//!
//! `query` never underestimates a flow's true count for non-negative
//! increments; it may overestimate due to hash collisions, bounded in
//! expectation by `epsilon * N` for `rows = Theta(log 1/delta)` and
//! `cols = Theta(1/epsilon)`.

use crate::counter_matrix::CounterMatrix;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

/// Overestimating frequency sketch.
///
/// # Example
/// ```rust
/// use flowsketch::count_min::CountMin;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut cm = CountMin::<TwoTuple>::new(4, 1024).unwrap();
/// let flow = TwoTuple::new(1, 2);
/// cm.update(&flow, 100);
/// assert!(cm.query(&flow) >= 100);
/// ```
#[derive(Debug, Clone)]
pub struct CountMin<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    matrix: CounterMatrix<u32>,
    hash: H,
    _key: std::marker::PhantomData<K>,
}

impl<K: FlowKey, H: HashFamily> CountMin<K, H> {
    /// Builds a sketch with `rows` rows over a total byte budget.
    /// Columns are `floor(budget / rows / sizeof(u32))`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `rows` is zero or the
    /// budget cannot hold at least one column per row.
    pub fn new(rows: usize, byte_budget: usize) -> Result<Self, SketchError> {
        Self::with_hash_family(rows, byte_budget, H::default())
    }

    /// Builds a sketch with an explicit hash family instance.
    pub fn with_hash_family(rows: usize, byte_budget: usize, hash: H) -> Result<Self, SketchError> {
        Ok(Self {
            matrix: CounterMatrix::new(rows, byte_budget)?,
            hash,
            _key: std::marker::PhantomData,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Number of columns per row.
    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }

    /// Adds `delta` occurrences of `flow`, saturating on overflow.
    pub fn update(&mut self, flow: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        for row in 0..self.matrix.rows() {
            let col = self.hash.hash(flow, row as u64, self.matrix.cols() as u64) as usize;
            self.matrix.update(row, col, delta);
        }
    }

    /// Returns the minimum counter across rows: never below the true count.
    pub fn query(&self, flow: &K) -> u64 {
        let mut min = u64::from(u32::MAX);
        for row in 0..self.matrix.rows() {
            let col = self.hash.hash(flow, row as u64, self.matrix.cols() as u64) as usize;
            min = min.min(u64::from(self.matrix.read(row, col)));
        }
        min
    }

    /// Returns `true` iff `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets to the post-construction zero state.
    pub fn clear(&mut self) {
        self.matrix.clear();
    }

    /// Subtracts `delta` from `flow`'s cell in every row, saturating at 0.
    /// Used by [`crate::sketch_learn`] to remove a decoded flow's weight
    /// from every layer it touched.
    pub(crate) fn subtract(&mut self, flow: &K, delta: u32) {
        for row in 0..self.matrix.rows() {
            let col = self.hash.hash(flow, row as u64, self.matrix.cols() as u64) as usize;
            self.matrix.subtract(row, col, delta);
        }
    }

    /// Direct access to the backing matrix (used by [`crate::sketch_learn`],
    /// which layers one `CountMin` per flow-key bit and needs raw cell
    /// reads/subtracts during decode).
    pub(crate) fn matrix(&self) -> &CounterMatrix<u32> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructor_validates_parameters() {
        assert!(CountMin::<TwoTuple>::new(0, 1024).is_err());
        assert!(CountMin::<TwoTuple>::new(100, 4).is_err());
    }

    #[test]
    fn cm_basic_scenario_from_spec() {
        let mut cm = CountMin::<TwoTuple>::new(4, 1024).unwrap();
        let flow1 = TwoTuple::new(0xC0A80101, 0x0A000001);
        let flow2 = TwoTuple::new(0xC0A80102, 0x0A000002);

        cm.update(&flow1, 100);
        cm.update(&flow2, 50);
        cm.update(&flow1, 20);

        assert!(cm.query(&flow1) >= 120);
        assert!(cm.query(&flow2) >= 50);
    }

    #[test]
    fn never_underestimates_a_small_stream() {
        let mut cm = CountMin::<TwoTuple>::new(4, 4096).unwrap();
        let mut truth = std::collections::HashMap::new();
        for i in 0..50u32 {
            let flow = TwoTuple::new(i, i + 1);
            let count = (i % 7) + 1;
            for _ in 0..count {
                cm.update(&flow, 1);
            }
            *truth.entry(flow).or_insert(0u64) += u64::from(count);
        }
        for (flow, count) in truth {
            assert!(cm.query(&flow) >= count);
        }
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut cm = CountMin::<TwoTuple>::new(2, 256).unwrap();
        let flow = TwoTuple::new(5, 6);
        cm.update(&flow, 0);
        assert_eq!(cm.query(&flow), 0);
        assert!(!cm.has_flow(&flow));
    }

    #[test]
    fn clear_resets_to_fresh_state() {
        let mut cm = CountMin::<TwoTuple>::new(3, 512).unwrap();
        let flow = TwoTuple::new(1, 1);
        cm.update(&flow, 42);
        assert!(cm.has_flow(&flow));
        cm.clear();
        assert_eq!(cm.query(&flow), 0);
    }

    #[test]
    fn determinism_across_runs() {
        let flow = TwoTuple::new(77, 88);
        let mut a = CountMin::<TwoTuple>::new(4, 1024).unwrap();
        let mut b = CountMin::<TwoTuple>::new(4, 1024).unwrap();
        for cm in [&mut a, &mut b] {
            cm.update(&flow, 10);
            cm.update(&flow, 5);
        }
        assert_eq!(a.query(&flow), b.query(&flow));
    }

    #[test]
    fn saturates_at_u32_max() {
        let mut cm = CountMin::<TwoTuple>::new(1, 4).unwrap();
        let flow = TwoTuple::new(1, 1);
        cm.update(&flow, u32::MAX);
        cm.update(&flow, 100);
        assert_eq!(cm.query(&flow), u64::from(u32::MAX));
    }
}
