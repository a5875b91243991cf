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
//! Sample-and-Hold: exact counts for a capped working set, min-eviction.
//!
//! Unlike the other sketches, every retained flow's count is exact; the only
//! approximation is which flows get retained.

use std::collections::HashMap;

use crate::error::SketchError;
use crate::flow_key::FlowKey;

/// Exact-count working set bounded to `capacity` distinct flows.
///
/// # Example
/// ```rust
/// use flowsketch::sample_and_hold::SampleAndHold;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut sah = SampleAndHold::<TwoTuple>::new(3).unwrap();
/// sah.update(&TwoTuple::new(1, 1), 100);
/// sah.update(&TwoTuple::new(2, 2), 50);
/// sah.update(&TwoTuple::new(3, 3), 20);
/// sah.update(&TwoTuple::new(4, 4), 80);
/// assert!(!sah.has_flow(&TwoTuple::new(3, 3)));
/// assert!(sah.has_flow(&TwoTuple::new(4, 4)));
/// ```
#[derive(Debug, Clone)]
pub struct SampleAndHold<K: FlowKey> {
    capacity: usize,
    counters: HashMap<K, u64>,
}

impl<K: FlowKey> SampleAndHold<K> {
    /// Builds a working set capped at `capacity` distinct flows.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, SketchError> {
        if capacity == 0 {
            return Err(SketchError::InvalidParameter("capacity must be greater than zero"));
        }
        Ok(Self {
            capacity,
            counters: HashMap::with_capacity(capacity),
        })
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of distinct flows currently retained.
    pub fn size(&self) -> usize {
        self.counters.len()
    }

    /// Applies `delta` occurrences of `flow`. `delta <= 0` is a no-op.
    ///
    /// If `flow` is already retained its count increases exactly. Otherwise,
    /// if there is spare capacity, `flow` is admitted; if not, it replaces
    /// the current minimum-count entry only when `delta` exceeds that
    /// minimum, otherwise it is dropped.
    pub fn update(&mut self, flow: &K, delta: i64) {
        if delta <= 0 {
            return;
        }
        let delta = delta as u64;

        if let Some(count) = self.counters.get_mut(flow) {
            *count += delta;
            return;
        }

        if self.counters.len() < self.capacity {
            self.counters.insert(*flow, delta);
            return;
        }

        if let Some((&min_flow, &min_count)) = self.counters.iter().min_by_key(|(_, &c)| c) {
            if delta > min_count {
                self.counters.remove(&min_flow);
                self.counters.insert(*flow, delta);
            }
        }
    }

    /// Returns the exact stored count, or 0 if `flow` is not retained.
    pub fn query(&self, flow: &K) -> u64 {
        self.counters.get(flow).copied().unwrap_or(0)
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets to the post-construction empty state.
    pub fn clear(&mut self) {
        self.counters.clear();
    }

    /// Iterates over the currently retained (flow, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &u64)> {
        self.counters.iter()
    }
}
