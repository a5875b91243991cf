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
//! Bloom filter for approximate flow-presence checks.
//!
//! A Bloom filter can return false positives, but never false negatives.
//! Unlike a generic `std::hash::Hash`-keyed filter, this one is built over
//! the crate's [`FlowKey`]/[`HashFamily`] hashing discipline so it shares
//! seeds and hash behavior with every other sketch in the crate (FlowRadar
//! composes one directly).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

/// Probabilistic flow-presence filter.
///
/// # Example
/// ```rust
/// use flowsketch::bloom_filter::BloomFilter;
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut filter = BloomFilter::<TwoTuple>::new(1024, 3).unwrap();
/// let flow = TwoTuple::new(10, 20);
/// filter.update(&flow);
/// assert!(filter.query(&flow));
/// ```
#[derive(Debug, Clone)]
pub struct BloomFilter<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    bits: Vec<u64>,
    bit_len: usize,
    num_hashes: u32,
    hash: H,
    _key: PhantomData<K>,
}

impl<K: FlowKey, H: HashFamily> BloomFilter<K, H> {
    /// Builds a filter of `bit_len` bits using `num_hashes` independent hash
    /// probes per key, with the default hash family.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when either value is zero.
    pub fn new(bit_len: usize, num_hashes: u32) -> Result<Self, SketchError> {
        Self::with_hash_family(bit_len, num_hashes, H::default())
    }

    /// Builds a filter with an explicit hash family instance.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when either value is zero.
    pub fn with_hash_family(bit_len: usize, num_hashes: u32, hash: H) -> Result<Self, SketchError> {
        if bit_len == 0 {
            return Err(SketchError::InvalidParameter("bit_len must be greater than zero"));
        }
        if num_hashes == 0 {
            return Err(SketchError::InvalidParameter("num_hashes must be greater than zero"));
        }
        let word_len = bit_len.div_ceil(64);
        Ok(Self {
            bits: vec![0; word_len],
            bit_len,
            num_hashes,
            hash,
            _key: PhantomData,
        })
    }

    /// Number of addressable bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Configured number of hash probes per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Sets the bits at `H(flow, 0, n), ..., H(flow, k-1, n)`.
    pub fn update(&mut self, flow: &K) {
        for i in 0..self.num_hashes as u64 {
            let bit = self.hash.hash(flow, i, self.bit_len as u64) as usize;
            let word = bit / 64;
            self.bits[word] |= 1u64 << (bit % 64);
        }
    }

    /// Returns `true` iff every probed bit is set (no false negatives).
    pub fn query(&self, flow: &K) -> bool {
        for i in 0..self.num_hashes as u64 {
            let bit = self.hash.hash(flow, i, self.bit_len as u64) as usize;
            let word = bit / 64;
            if self.bits[word] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Zeroes the bit vector.
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }
}

/// Kernel-fast-path-friendly Bloom filter: bits packed into 32-bit words and
/// set with atomic OR, so concurrent updates across CPUs are race-free
/// without a per-bit lock (see spec.md §4.D and §5).
#[derive(Debug)]
pub struct AtomicBloomFilter<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    words: Vec<AtomicU32>,
    bit_len: usize,
    num_hashes: u32,
    hash: H,
    _key: PhantomData<K>,
}

impl<K: FlowKey, H: HashFamily> AtomicBloomFilter<K, H> {
    /// Builds an atomic filter of `bit_len` bits and `num_hashes` probes.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when either value is zero.
    pub fn new(bit_len: usize, num_hashes: u32) -> Result<Self, SketchError> {
        if bit_len == 0 {
            return Err(SketchError::InvalidParameter("bit_len must be greater than zero"));
        }
        if num_hashes == 0 {
            return Err(SketchError::InvalidParameter("num_hashes must be greater than zero"));
        }
        let word_len = bit_len.div_ceil(32);
        Ok(Self {
            words: (0..word_len).map(|_| AtomicU32::new(0)).collect(),
            bit_len,
            num_hashes,
            hash: H::default(),
            _key: PhantomData,
        })
    }

    /// Sets this key's bits with atomic OR. Returns `true` iff at least one
    /// bit flipped from 0 to 1 (the flow was new to this filter).
    pub fn update(&self, flow: &K) -> bool {
        let mut was_new = false;
        for i in 0..self.num_hashes as u64 {
            let bit = self.hash.hash(flow, i, self.bit_len as u64) as usize;
            let word = bit / 32;
            let mask = 1u32 << (bit % 32);
            let previous = self.words[word].fetch_or(mask, Ordering::AcqRel);
            if previous & mask == 0 {
                was_new = true;
            }
        }
        was_new
    }

    /// Returns `true` iff every probed bit is set.
    pub fn query(&self, flow: &K) -> bool {
        for i in 0..self.num_hashes as u64 {
            let bit = self.hash.hash(flow, i, self.bit_len as u64) as usize;
            let word = bit / 32;
            let mask = 1u32 << (bit % 32);
            if self.words[word].load(Ordering::Acquire) & mask == 0 {
                return false;
            }
        }
        true
    }

    /// Zeroes every word.
    pub fn clear(&self) {
        for word in &self.words {
            word.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructors_validate_parameters() {
        assert!(BloomFilter::<TwoTuple>::new(0, 3).is_err());
        assert!(BloomFilter::<TwoTuple>::new(1024, 0).is_err());
    }

    #[test]
    fn inserted_flows_are_always_reported_present() {
        let mut filter = BloomFilter::<TwoTuple>::new(8192, 4).unwrap();
        for i in 0..200u32 {
            filter.update(&TwoTuple::new(i, i + 1));
        }
        for i in 0..200u32 {
            assert!(filter.query(&TwoTuple::new(i, i + 1)));
        }
    }

    #[test]
    fn absent_flows_can_return_false() {
        let filter = BloomFilter::<TwoTuple>::new(256, 3).unwrap();
        assert!(!filter.query(&TwoTuple::new(999, 999)));
    }

    #[test]
    fn clear_resets_filter_state() {
        let mut filter = BloomFilter::<TwoTuple>::new(1024, 3).unwrap();
        let flow = TwoTuple::new(1, 2);
        filter.update(&flow);
        assert!(filter.query(&flow));
        filter.clear();
        assert!(!filter.query(&flow));
    }

    #[test]
    fn atomic_variant_reports_new_insert_exactly_once() {
        let filter = AtomicBloomFilter::<TwoTuple>::new(4096, 4).unwrap();
        let flow = TwoTuple::new(7, 8);
        assert!(filter.update(&flow));
        assert!(!filter.update(&flow));
        assert!(filter.query(&flow));
    }
}
