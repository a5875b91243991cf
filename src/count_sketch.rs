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
//! Count Sketch: an unbiased frequency estimator via signed hashes + median.
//!
//! Each row hashes a flow to a bucket and independently to a sign in
//! `{-1, +1}`; the per-row estimate is the signed bucket value, and the final
//! estimate is the median across rows clamped at zero.

use crate::counter_matrix::CounterMatrix;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

/// Unbiased frequency sketch.
///
/// # Example
/// ```rust
/// use flowsketch::count_sketch::CountSketch;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut cs = CountSketch::<TwoTuple>::new(5, 4096).unwrap();
/// let flow = TwoTuple::new(1, 2);
/// for _ in 0..100 {
///     cs.update(&flow, 1);
/// }
/// let estimate = cs.query(&flow);
/// assert!(estimate < 300);
/// ```
#[derive(Debug, Clone)]
pub struct CountSketch<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    matrix: CounterMatrix<i32>,
    hash: H,
    _key: std::marker::PhantomData<K>,
}

impl<K: FlowKey, H: HashFamily> CountSketch<K, H> {
    /// Builds a sketch with `rows` rows over a total byte budget.
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

    fn bucket(&self, flow: &K, row: usize) -> usize {
        self.hash.hash(flow, row as u64, self.matrix.cols() as u64) as usize
    }

    /// Row `i`'s sign: `2 * H(f, i+rows, 2) - 1 in {-1, +1}`.
    fn sign(&self, flow: &K, row: usize) -> i32 {
        let bit = self.hash.hash(flow, (row + self.matrix.rows()) as u64, 2);
        2 * bit as i32 - 1
    }

    /// Adds `delta` signed occurrences of `flow` to each row's bucket.
    pub fn update(&mut self, flow: &K, delta: i32) {
        if delta == 0 {
            return;
        }
        for row in 0..self.matrix.rows() {
            let col = self.bucket(flow, row);
            let signed_delta = self.sign(flow, row) * delta;
            self.matrix.update(row, col, signed_delta);
        }
    }

    /// Returns the median per-row estimate, clamped at zero.
    pub fn query(&self, flow: &K) -> u64 {
        let rows = self.matrix.rows();
        let mut estimates = Vec::with_capacity(rows);
        for row in 0..rows {
            let col = self.bucket(flow, row);
            let cell = self.matrix.read(row, col);
            estimates.push(i64::from(self.sign(flow, row)) * i64::from(cell));
        }
        estimates.sort_unstable();
        let median = if rows % 2 == 1 {
            estimates[rows / 2]
        } else {
            let lo = estimates[rows / 2 - 1];
            let hi = estimates[rows / 2];
            (lo + hi).div_euclid(2)
        };
        median.max(0) as u64
    }

    /// Returns `true` iff `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets to the post-construction zero state.
    pub fn clear(&mut self) {
        self.matrix.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructor_validates_parameters() {
        assert!(CountSketch::<TwoTuple>::new(0, 1024).is_err());
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut cs = CountSketch::<TwoTuple>::new(5, 4096).unwrap();
        let flow = TwoTuple::new(1, 1);
        cs.update(&flow, 0);
        assert_eq!(cs.query(&flow), 0);
    }

    #[test]
    fn roughly_recovers_a_heavy_flow_count() {
        let mut cs = CountSketch::<TwoTuple>::new(7, 8192).unwrap();
        let flow = TwoTuple::new(0xAAAA, 0xBBBB);
        for _ in 0..500 {
            cs.update(&flow, 1);
        }
        let estimate = cs.query(&flow);
        assert!(estimate > 0);
        assert!((estimate as i64 - 500).abs() < 500);
    }

    #[test]
    fn clear_resets_to_fresh_state() {
        let mut cs = CountSketch::<TwoTuple>::new(5, 2048).unwrap();
        let flow = TwoTuple::new(3, 4);
        cs.update(&flow, 40);
        cs.clear();
        assert_eq!(cs.query(&flow), 0);
    }

    #[test]
    fn determinism_across_runs() {
        let flow = TwoTuple::new(9, 10);
        let mut a = CountSketch::<TwoTuple>::new(5, 2048).unwrap();
        let mut b = CountSketch::<TwoTuple>::new(5, 2048).unwrap();
        for cs in [&mut a, &mut b] {
            cs.update(&flow, 30);
        }
        assert_eq!(a.query(&flow), b.query(&flow));
    }

    #[test]
    fn negative_updates_can_cancel_out() {
        let mut cs = CountSketch::<TwoTuple>::new(5, 4096).unwrap();
        let flow = TwoTuple::new(1, 2);
        cs.update(&flow, 100);
        cs.update(&flow, -100);
        assert_eq!(cs.query(&flow), 0);
    }
}
