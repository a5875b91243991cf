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
//! Elastic Sketch: a voting heavy part over a Count-Min light part.
//!
//! The heavy part holds one flow per bucket and resists eviction by
//! comparing accumulated negative votes against the resident's positive
//! votes; an evicted resident (or any flow that loses the vote) is forwarded
//! to the light part instead of being discarded.

use crate::count_min::CountMin;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

/// The 104th prime, used as the fixed heavy-part hash seed by convention.
const HEAVY_SEED: u64 = 103;

#[derive(Debug, Clone, Copy)]
struct HeavyBucket<K> {
    flow_id: K,
    pos_vote: u32,
    neg_vote: u32,
    flag: bool,
}

impl<K: FlowKey> Default for HeavyBucket<K> {
    fn default() -> Self {
        Self {
            flow_id: K::default(),
            pos_vote: 0,
            neg_vote: 0,
            flag: false,
        }
    }
}

impl<K: FlowKey> HeavyBucket<K> {
    fn is_empty(&self) -> bool {
        self.flow_id == K::default() && self.pos_vote == 0
    }
}

/// Heavy-part-over-light-part composite sketch.
///
/// # Example
/// ```rust
/// use flowsketch::elastic_sketch::ElasticSketch;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut es = ElasticSketch::<TwoTuple>::new(4000, 2, 16384, 8).unwrap();
/// let heavy = TwoTuple::new(1, 1);
/// es.update(&heavy, 1000);
/// assert!(es.query(&heavy) >= 500);
/// ```
#[derive(Debug, Clone)]
pub struct ElasticSketch<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    heavy: Vec<HeavyBucket<K>>,
    num_heavy_buckets: usize,
    lambda: u32,
    light: CountMin<K, H>,
    hash: H,
}

impl<K: FlowKey, H: HashFamily> ElasticSketch<K, H> {
    /// Builds a composite sketch: `heavy_budget` bytes of heavy buckets
    /// (vote threshold `lambda`), the remainder of `total_budget` spent on
    /// a `light_rows`-row Count-Min light part.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `heavy_budget` exceeds
    /// `total_budget`, cannot hold one bucket, `lambda` is zero, or the
    /// light part's construction fails for the same reasons as
    /// [`CountMin::new`].
    pub fn new(heavy_budget: usize, lambda: u32, total_budget: usize, light_rows: usize) -> Result<Self, SketchError> {
        Self::with_hash_family(heavy_budget, lambda, total_budget, light_rows, H::default())
    }

    /// Builds a composite sketch with an explicit hash family instance.
    pub fn with_hash_family(
        heavy_budget: usize,
        lambda: u32,
        total_budget: usize,
        light_rows: usize,
        hash: H,
    ) -> Result<Self, SketchError> {
        if lambda == 0 {
            return Err(SketchError::InvalidParameter("lambda must be greater than zero"));
        }
        if heavy_budget > total_budget {
            return Err(SketchError::InvalidParameter(
                "heavy_budget must not exceed total_budget",
            ));
        }
        let bucket_size = std::mem::size_of::<HeavyBucket<K>>();
        let num_heavy_buckets = heavy_budget / bucket_size;
        if num_heavy_buckets == 0 {
            return Err(SketchError::InvalidParameter(
                "heavy_budget too small to hold one bucket",
            ));
        }
        let light_budget = total_budget - heavy_budget;
        let light = CountMin::with_hash_family(light_rows, light_budget, hash.clone())?;
        Ok(Self {
            heavy: vec![HeavyBucket::default(); num_heavy_buckets],
            num_heavy_buckets,
            lambda,
            light,
            hash,
        })
    }

    /// Number of heavy-part buckets.
    pub fn num_heavy_buckets(&self) -> usize {
        self.num_heavy_buckets
    }

    fn heavy_slot(&self, flow: &K) -> usize {
        self.hash.hash(flow, HEAVY_SEED, self.num_heavy_buckets as u64) as usize
    }

    /// Runs the single-packet heavy-part protocol `delta` times.
    pub fn update(&mut self, flow: &K, delta: u32) {
        for _ in 0..delta {
            self.update_one(flow);
        }
    }

    fn update_one(&mut self, flow: &K) {
        let j = self.heavy_slot(flow);
        let bucket = &mut self.heavy[j];

        if bucket.is_empty() {
            bucket.flow_id = *flow;
            bucket.pos_vote = 1;
            bucket.neg_vote = 0;
            return;
        }
        if bucket.flow_id == *flow {
            bucket.pos_vote = bucket.pos_vote.saturating_add(1);
            return;
        }

        bucket.neg_vote = bucket.neg_vote.saturating_add(1);
        let ratio = bucket.neg_vote / bucket.pos_vote.max(1);

        if ratio < self.lambda {
            self.light.update(flow, 1);
            return;
        }

        bucket.flag = true;
        let evicted_flow = bucket.flow_id;
        let evicted_pos = bucket.pos_vote;
        bucket.flow_id = *flow;
        bucket.pos_vote = 1;
        bucket.neg_vote = 0;

        self.light.update(&evicted_flow, evicted_pos.min(i32::MAX as u32));
    }

    /// Returns the heavy-part vote plus the light part's estimate, if the
    /// bucket `flow` hashes to has ever triggered a heavy eviction; else
    /// just the heavy-part vote.
    pub fn query(&self, flow: &K) -> u64 {
        let j = self.heavy_slot(flow);
        let bucket = &self.heavy[j];
        let heavy_count = if bucket.flow_id == *flow {
            u64::from(bucket.pos_vote)
        } else {
            0
        };
        if bucket.flag {
            heavy_count + self.light.query(flow)
        } else {
            heavy_count
        }
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets the heavy part and the light part to their post-construction
    /// empty states.
    pub fn clear(&mut self) {
        self.heavy.fill(HeavyBucket::default());
        self.light.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructor_validates_parameters() {
        assert!(ElasticSketch::<TwoTuple>::new(20000, 2, 16384, 8).is_err());
        assert!(ElasticSketch::<TwoTuple>::new(4000, 0, 16384, 8).is_err());
        assert!(ElasticSketch::<TwoTuple>::new(4, 2, 16384, 8).is_err());
    }

    #[test]
    fn elastic_heavy_recovery_scenario_from_spec() {
        let mut es = ElasticSketch::<TwoTuple>::new(4000, 2, 16384, 8).unwrap();

        let heavies: Vec<TwoTuple> = (0..5).map(|i| TwoTuple::new(1000 + i, 2000 + i)).collect();
        let lights: Vec<TwoTuple> = (0..50).map(|i| TwoTuple::new(5000 + i, 6000 + i)).collect();

        for h in &heavies {
            es.update(h, 1000);
        }
        for l in &lights {
            es.update(l, 20);
        }

        for h in &heavies {
            assert!(es.query(h) >= 500, "heavy flow should clear the detection threshold");
        }

        let detected = heavies.iter().filter(|h| es.query(h) >= 500).count();
        assert_eq!(detected, 5);
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut es = ElasticSketch::<TwoTuple>::new(4000, 2, 16384, 8).unwrap();
        let flow = TwoTuple::new(1, 2);
        es.update(&flow, 0);
        assert!(!es.has_flow(&flow));
    }

    #[test]
    fn clear_resets_heavy_and_light_parts() {
        let mut es = ElasticSketch::<TwoTuple>::new(4000, 2, 16384, 8).unwrap();
        let flow = TwoTuple::new(1, 2);
        es.update(&flow, 500);
        es.clear();
        assert_eq!(es.query(&flow), 0);
    }
}
