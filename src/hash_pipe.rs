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
//! HashPipe: a multi-stage pipeline that carries the largest flow forward.
//!
//! Each stage holds one bucket per hash slot. A colliding flow evicts the
//! resident only if it is smaller, and the evicted flow is carried to the
//! next stage, where the same rule applies; small flows are filtered out by
//! stage 0 instead of displacing anything already settled downstream.

use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

#[derive(Debug, Clone, Copy)]
struct Bucket<K> {
    flow_id: K,
    count: u32,
    occupied: bool,
}

impl<K: FlowKey> Default for Bucket<K> {
    fn default() -> Self {
        Self {
            flow_id: K::default(),
            count: 0,
            occupied: false,
        }
    }
}

/// Multi-stage heavy-flow filter.
///
/// # Example
/// ```rust
/// use flowsketch::hash_pipe::HashPipe;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut hp = HashPipe::<TwoTuple>::new(8192, 8).unwrap();
/// let heavy = TwoTuple::new(0x99999999, 0x88888888);
/// for _ in 0..1000 {
///     hp.update(&heavy, 1);
/// }
/// assert_eq!(hp.query(&heavy), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct HashPipe<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    stages: Vec<Vec<Bucket<K>>>,
    buckets_per_stage: usize,
    hash: H,
}

impl<K: FlowKey, H: HashFamily> HashPipe<K, H> {
    /// Builds a pipeline of `stage_count` stages over a total byte budget.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `stage_count` is zero or
    /// the budget cannot hold at least one bucket per stage.
    pub fn new(byte_budget: usize, stage_count: usize) -> Result<Self, SketchError> {
        Self::with_hash_family(byte_budget, stage_count, H::default())
    }

    /// Builds a pipeline with an explicit hash family instance.
    pub fn with_hash_family(byte_budget: usize, stage_count: usize, hash: H) -> Result<Self, SketchError> {
        if stage_count == 0 {
            return Err(SketchError::InvalidParameter("stage_count must be greater than zero"));
        }
        let bucket_size = std::mem::size_of::<K>() + std::mem::size_of::<u32>();
        let buckets_per_stage = byte_budget / stage_count / bucket_size;
        if buckets_per_stage == 0 {
            return Err(SketchError::InvalidParameter(
                "byte_budget too small to hold one bucket per stage",
            ));
        }
        Ok(Self {
            stages: vec![vec![Bucket::default(); buckets_per_stage]; stage_count],
            buckets_per_stage,
            hash,
        })
    }

    /// Number of pipeline stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Number of buckets per stage.
    pub fn buckets_per_stage(&self) -> usize {
        self.buckets_per_stage
    }

    fn slot(&self, flow: &K, stage: usize) -> usize {
        self.hash.hash(flow, stage as u64, self.buckets_per_stage as u64) as usize
    }

    /// Processes `delta` packets of `flow`, one at a time (single-packet
    /// install/evict/carry semantics).
    pub fn update(&mut self, flow: &K, delta: u32) {
        for _ in 0..delta {
            self.update_one(flow);
        }
    }

    fn update_one(&mut self, flow: &K) {
        let j0 = self.slot(flow, 0);
        let stage0 = &mut self.stages[0][j0];

        let mut carry = if !stage0.occupied {
            *stage0 = Bucket {
                flow_id: *flow,
                count: 1,
                occupied: true,
            };
            None
        } else if stage0.flow_id == *flow {
            stage0.count += 1;
            None
        } else {
            let evicted = (stage0.flow_id, stage0.count);
            *stage0 = Bucket {
                flow_id: *flow,
                count: 1,
                occupied: true,
            };
            Some(evicted)
        };

        for stage in 1..self.stages.len() {
            let Some((carried_flow, carried_count)) = carry else {
                return;
            };
            let j = self.slot(&carried_flow, stage);
            let bucket = &mut self.stages[stage][j];

            if !bucket.occupied {
                *bucket = Bucket {
                    flow_id: carried_flow,
                    count: carried_count,
                    occupied: true,
                };
                carry = None;
            } else if bucket.flow_id == carried_flow {
                bucket.count = bucket.count.saturating_add(carried_count);
                carry = None;
            } else if bucket.count < carried_count {
                let evicted = (bucket.flow_id, bucket.count);
                *bucket = Bucket {
                    flow_id: carried_flow,
                    count: carried_count,
                    occupied: true,
                };
                carry = Some(evicted);
            } else {
                carry = None;
            }
        }
    }

    /// Sums the counts of every bucket, across every stage, whose resident
    /// flow is `flow`.
    pub fn query(&self, flow: &K) -> u64 {
        let mut total = 0u64;
        for stage in &self.stages {
            for bucket in stage {
                if bucket.occupied && bucket.flow_id == *flow {
                    total += u64::from(bucket.count);
                }
            }
        }
        total
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets every stage to the post-construction empty state.
    pub fn clear(&mut self) {
        for stage in &mut self.stages {
            stage.fill(Bucket::default());
        }
    }
}
