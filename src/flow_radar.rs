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
//! FlowRadar: a Bloom filter plus an IBLT-style counting table, decoded by
//! iterative peeling.
//!
//! Every distinct flow is recorded once in the Bloom filter (so repeat
//! packets don't perturb the counting table's XOR accumulator) and is
//! XOR-folded into `k_c` counting-table buckets. Peeling repeatedly finds a
//! bucket with exactly one contributing flow and subtracts that flow out of
//! every bucket it touches, same as an invertible Bloom lookup table.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::bloom_filter::BloomFilter;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

#[derive(Debug, Clone, Copy)]
struct FrBucket<K> {
    flow_xor: K,
    flow_count: u32,
    packet_count: u32,
}

impl<K: FlowKey> Default for FrBucket<K> {
    fn default() -> Self {
        Self {
            flow_xor: K::default(),
            flow_count: 0,
            packet_count: 0,
        }
    }
}

/// Bloom + counting-table composite with peeling decode.
///
/// # Example
/// ```rust
/// use flowsketch::flow_radar::FlowRadar;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut fr = FlowRadar::<TwoTuple>::new(8192, 0.3, 3, 3).unwrap();
/// let flow = TwoTuple::new(1, 2);
/// fr.update(&flow, 5);
/// assert_eq!(fr.query(&flow), 5);
/// ```
#[derive(Debug, Clone)]
pub struct FlowRadar<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    bloom: BloomFilter<K, H>,
    table: Vec<FrBucket<K>>,
    table_size: usize,
    k_c: u32,
    hash: H,
    decoded: RefCell<Option<HashMap<K, u64>>>,
}

impl<K: FlowKey, H: HashFamily> FlowRadar<K, H> {
    /// Builds a composite sketch: `bloom_fraction` of `total_budget` bytes
    /// back the Bloom filter (`bloom_hashes` probes), the remainder backs
    /// the counting table (`table_hashes` positions per flow).
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `bloom_fraction` is not
    /// in `(0, 1)`, or either derived size rounds down to zero.
    pub fn new(total_budget: usize, bloom_fraction: f64, bloom_hashes: u32, table_hashes: u32) -> Result<Self, SketchError> {
        Self::with_hash_family(total_budget, bloom_fraction, bloom_hashes, table_hashes, H::default())
    }

    /// Builds a composite sketch with an explicit hash family instance.
    pub fn with_hash_family(
        total_budget: usize,
        bloom_fraction: f64,
        bloom_hashes: u32,
        table_hashes: u32,
        hash: H,
    ) -> Result<Self, SketchError> {
        if !(bloom_fraction > 0.0 && bloom_fraction < 1.0) {
            return Err(SketchError::InvalidParameter("bloom_fraction must be in (0, 1)"));
        }
        let bloom_bits = (total_budget as f64 * bloom_fraction * 8.0).floor() as usize;
        if bloom_bits == 0 {
            return Err(SketchError::InvalidParameter("bloom_fraction too small for total_budget"));
        }
        let remaining = total_budget - (total_budget as f64 * bloom_fraction) as usize;
        let bucket_size = std::mem::size_of::<FrBucket<K>>();
        let table_size = remaining / bucket_size;
        if table_size == 0 {
            return Err(SketchError::InvalidParameter(
                "counting table budget too small to hold one bucket",
            ));
        }
        Ok(Self {
            bloom: BloomFilter::with_hash_family(bloom_bits, bloom_hashes, hash.clone())?,
            table: vec![FrBucket::default(); table_size],
            table_size,
            k_c: table_hashes,
            hash,
            decoded: RefCell::new(None),
        })
    }

    /// Size of the counting table, in buckets.
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    fn table_positions(&self, flow: &K) -> Vec<usize> {
        (0..self.k_c as u64)
            .map(|i| self.hash.hash(flow, i, self.table_size as u64) as usize)
            .collect()
    }

    /// Processes `delta` packets of `flow`.
    ///
    /// The first packet of a previously-unseen flow XORs it into the
    /// counting table; subsequent packets only bump `packet_count`.
    /// Invalidates the decoded-map cache.
    pub fn update(&mut self, flow: &K, delta: u32) {
        for _ in 0..delta {
            self.update_one(flow);
        }
        *self.decoded.borrow_mut() = None;
    }

    fn update_one(&mut self, flow: &K) {
        let exists = self.bloom.query(flow);
        if !exists {
            self.bloom.update(flow);
        }
        for j in self.table_positions(flow) {
            let bucket = &mut self.table[j];
            if !exists {
                bucket.flow_xor = bucket.flow_xor ^ *flow;
                bucket.flow_count += 1;
            }
            bucket.packet_count = bucket.packet_count.saturating_add(1);
        }
    }

    /// Runs the peeling decoder and returns the recovered flow -> count map.
    /// Buckets that never reduce to `flow_count == 1` leave their
    /// contributing flows unrecovered.
    pub fn decode(&self) -> HashMap<K, u64> {
        if let Some(cached) = self.decoded.borrow().as_ref() {
            return cached.clone();
        }

        let mut table = self.table.clone();
        let mut recovered = HashMap::new();

        loop {
            let peelable = table.iter().position(|b| b.flow_count == 1);
            let Some(idx) = peelable else {
                break;
            };
            let flow = table[idx].flow_xor;
            let count = table[idx].packet_count;
            recovered.insert(flow, u64::from(count));

            for j in self.table_positions(&flow) {
                let bucket = &mut table[j];
                bucket.flow_xor = bucket.flow_xor ^ flow;
                bucket.flow_count = bucket.flow_count.saturating_sub(1);
                bucket.packet_count = bucket.packet_count.saturating_sub(count);
            }
        }

        *self.decoded.borrow_mut() = Some(recovered.clone());
        recovered
    }

    /// Returns the decoded count for `flow`, or 0 if it was not recovered.
    pub fn query(&self, flow: &K) -> u64 {
        self.decode().get(flow).copied().unwrap_or(0)
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets the Bloom filter, counting table, and decoded-map cache.
    pub fn clear(&mut self) {
        self.bloom.clear();
        self.table.fill(FrBucket::default());
        *self.decoded.borrow_mut() = None;
    }
}
