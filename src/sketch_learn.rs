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
//! SketchLearn: a bit-level tower of Count-Mins with distribution inference
//! and flow recovery.
//!
//! Layer 0 counts every update, same as a plain [`crate::count_min::CountMin`].
//! Layer `k` (`1 <= k <= b`, `b = 8 * sizeof(flow-key byte view)`) counts only
//! the updates whose `k`-th bit is set. Because every layer shares the same
//! row count, column count and hash family, a cell `(i, j)` means the same
//! thing across all `b + 1` layers; `decode` exploits that to read off, per
//! cell, which bits of the flows hashed there are probably 0, probably 1, or
//! ambiguous, then expands the ambiguous bits into candidate flows and keeps
//! only the ones a second, independent row corroborates.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::count_min::CountMin;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::hash::{DefaultHashFamily, HashFamily};

/// Upper bound on how many bits a cell's template may leave ambiguous before
/// `decode` gives up on that cell rather than expanding `2^n` candidates.
/// Cells this uncertain are, in practice, dominated by hash collisions
/// rather than one recoverable flow.
const MAX_UNCERTAIN_BITS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateBit {
    Zero,
    One,
    Uncertain,
}

fn bit_at(bytes: &[u8], index: usize) -> bool {
    let byte = bytes[index / 8];
    let shift = 7 - (index % 8);
    (byte >> shift) & 1 == 1
}

fn set_bit(bytes: &mut [u8], index: usize, value: bool) {
    let shift = 7 - (index % 8);
    let mask = 1u8 << shift;
    if value {
        bytes[index / 8] |= mask;
    } else {
        bytes[index / 8] &= !mask;
    }
}

/// Bit-level Count-Min tower with heavy-flow decoding.
///
/// # Example
/// ```rust
/// use flowsketch::sketch_learn::SketchLearn;
/// use flowsketch::flow_key::OneTuple;
///
/// let mut sl = SketchLearn::<OneTuple>::new(1 << 16, 2, 0.2).unwrap();
/// let heavy = OneTuple::new(0x0A000001);
/// for _ in 0..1000 {
///     sl.update(&heavy, 1);
/// }
/// assert!(sl.decode().contains_key(&heavy));
/// ```
#[derive(Debug, Clone)]
pub struct SketchLearn<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    layers: Vec<CountMin<K, H>>,
    bit_count: usize,
    rows: usize,
    cols: usize,
    theta: f64,
    hash: H,
    decoded: RefCell<Option<HashMap<K, u64>>>,
}

impl<K: FlowKey, H: HashFamily> SketchLearn<K, H> {
    /// Builds a `8 * sizeof(K::Bytes) + 1`-layer tower, each layer with
    /// `rows` rows over an equal share of `byte_budget`. `theta` is the
    /// per-bit inference threshold (`0 < theta < 1`): a ratio below `theta`
    /// reads as bit 0, above `1 - theta` reads as bit 1, anything in
    /// between is left uncertain.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `rows` is zero, `theta`
    /// is not in `(0, 1)`, or the budget cannot hold at least one column per
    /// row once split across layers.
    pub fn new(byte_budget: usize, rows: usize, theta: f64) -> Result<Self, SketchError> {
        Self::with_hash_family(byte_budget, rows, theta, H::default())
    }

    /// Builds a tower with an explicit hash family instance, cloned into
    /// every layer.
    pub fn with_hash_family(byte_budget: usize, rows: usize, theta: f64, hash: H) -> Result<Self, SketchError> {
        if rows == 0 {
            return Err(SketchError::InvalidParameter("rows must be greater than zero"));
        }
        if !(theta > 0.0 && theta < 1.0) {
            return Err(SketchError::InvalidParameter("theta must be in (0, 1)"));
        }
        let bit_count = std::mem::size_of::<K::Bytes>() * 8;
        let layer_count = bit_count + 1;
        let layer_budget = byte_budget / layer_count;
        if layer_budget / rows / std::mem::size_of::<u32>() == 0 {
            return Err(SketchError::InvalidParameter(
                "byte_budget too small to hold one column per row once split across layers",
            ));
        }

        let mut layers = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            layers.push(CountMin::with_hash_family(rows, layer_budget, hash.clone())?);
        }
        let cols = layers[0].cols();

        Ok(Self {
            layers,
            bit_count,
            rows,
            cols,
            theta,
            hash,
            decoded: RefCell::new(None),
        })
    }

    /// Number of bit-selective layers (excludes layer 0).
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Row count shared by every layer.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count shared by every layer.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Feeds `delta` occurrences of `flow` into layer 0 and into every
    /// bit-layer `k` whose bit is set in `flow`'s byte view. Invalidates
    /// the decoded-map cache.
    pub fn update(&mut self, flow: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        self.layers[0].update(flow, delta);
        let bytes = flow.to_bytes();
        let raw = bytes.as_ref();
        for k in 1..=self.bit_count {
            if bit_at(raw, k - 1) {
                self.layers[k].update(flow, delta);
            }
        }
        *self.decoded.borrow_mut() = None;
    }

    /// Builds a candidate flow from a cell's template, given an assignment
    /// of concrete bits to the template's uncertain positions.
    fn build_candidate(template: &[TemplateBit], uncertain_positions: &[usize], mask: u32) -> K {
        let mut bytes = K::default().to_bytes();
        {
            let raw = bytes.as_mut();
            for (bit_pos, bit) in template.iter().enumerate() {
                let value = match bit {
                    TemplateBit::Zero => false,
                    TemplateBit::One => true,
                    TemplateBit::Uncertain => {
                        let slot = uncertain_positions.iter().position(|&p| p == bit_pos).unwrap();
                        (mask >> slot) & 1 == 1
                    }
                };
                set_bit(raw, bit_pos, value);
            }
        }
        K::from_bytes(bytes)
    }

    /// Checks candidate `f` against every row other than `home_row`: for
    /// each row the witness is the minimum, across bits, of the layer cell
    /// that should carry `f`'s weight if the bit assignment is correct.
    /// Returns the minimum witness seen, or `u32::MAX` if `bit_count == 0`.
    fn cross_validate(&self, working: &[CountMin<K, H>], candidate: &K, home_row: usize) -> u32 {
        let mut min_witness = u32::MAX;
        for row in 0..self.rows {
            if row == home_row {
                continue;
            }
            let col = self.hash.hash(candidate, row as u64, self.cols as u64) as usize;
            let bytes = candidate.to_bytes();
            let raw = bytes.as_ref();
            for k in 1..=self.bit_count {
                let witness = if bit_at(raw, k - 1) {
                    working[k].matrix().read(row, col)
                } else {
                    working[0]
                        .matrix()
                        .read(row, col)
                        .saturating_sub(working[k].matrix().read(row, col))
                };
                min_witness = min_witness.min(witness);
            }
        }
        min_witness
    }

    /// Runs distribution inference and peeling decode, recovering a flow ->
    /// count map. The result is cached until the next `update`.
    ///
    /// For each layer-0 cell with a nonzero count, the ratio of every
    /// bit-layer's reading to that count classifies the bit as 0, 1, or
    /// uncertain; uncertain bits are expanded into candidate flows (capped
    /// at [`MAX_UNCERTAIN_BITS`] per cell), each checked against a second
    /// row before being accepted and peeled out of every layer it touched.
    pub fn decode(&self) -> HashMap<K, u64> {
        if let Some(cached) = self.decoded.borrow().as_ref() {
            return cached.clone();
        }

        let mut working = self.layers.clone();
        let mut recovered = HashMap::new();

        for i in 0..self.rows {
            for j in 0..self.cols {
                let c0 = working[0].matrix().read(i, j);
                if c0 == 0 {
                    continue;
                }

                let mut template = Vec::with_capacity(self.bit_count);
                let mut uncertain_positions = Vec::new();
                for k in 1..=self.bit_count {
                    let ck = working[k].matrix().read(i, j);
                    let ratio = f64::from(ck) / f64::from(c0);
                    let bit = if ratio < self.theta {
                        TemplateBit::Zero
                    } else if 1.0 - ratio < self.theta {
                        TemplateBit::One
                    } else {
                        uncertain_positions.push(k - 1);
                        TemplateBit::Uncertain
                    };
                    template.push(bit);
                }
                if uncertain_positions.len() > MAX_UNCERTAIN_BITS {
                    continue;
                }

                let combinations = 1u32 << uncertain_positions.len();
                for mask in 0..combinations {
                    let candidate = Self::build_candidate(&template, &uncertain_positions, mask);
                    if self.hash.hash(&candidate, i as u64, self.cols as u64) as usize != j {
                        continue;
                    }
                    if recovered.contains_key(&candidate) {
                        continue;
                    }

                    let witness = self.cross_validate(&working, &candidate, i);
                    if (witness as f64) < self.theta * f64::from(c0) {
                        continue;
                    }

                    let recorded = working[0].query(&candidate);
                    if recorded == 0 {
                        continue;
                    }
                    recovered.insert(candidate, recorded);

                    let amount = recorded.min(u64::from(u32::MAX)) as u32;
                    working[0].subtract(&candidate, amount);
                    let bytes = candidate.to_bytes();
                    let raw = bytes.as_ref();
                    for k in 1..=self.bit_count {
                        if bit_at(raw, k - 1) {
                            working[k].subtract(&candidate, amount);
                        }
                    }
                }
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

    /// Resets every layer and the decoded-map cache to the post-construction
    /// empty state.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        *self.decoded.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::OneTuple;

    #[test]
    fn constructor_validates_parameters() {
        assert!(SketchLearn::<OneTuple>::new(1 << 16, 0, 0.2).is_err());
        assert!(SketchLearn::<OneTuple>::new(1 << 16, 2, 0.0).is_err());
        assert!(SketchLearn::<OneTuple>::new(1 << 16, 2, 1.0).is_err());
        assert!(SketchLearn::<OneTuple>::new(16, 2, 0.2).is_err());
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut sl = SketchLearn::<OneTuple>::new(1 << 16, 2, 0.2).unwrap();
        let flow = OneTuple::new(1);
        sl.update(&flow, 0);
        assert!(!sl.has_flow(&flow));
    }

    #[test]
    fn sketchlearn_heavy_flow_recovery_scenario_from_spec() {
        let mut sl = SketchLearn::<OneTuple>::new(1 << 17, 2, 0.15).unwrap();
        let heavy = OneTuple::new(0x0A000001);
        for _ in 0..2000 {
            sl.update(&heavy, 1);
        }
        let decoded = sl.decode();
        assert_eq!(decoded.get(&heavy).copied(), Some(2000));
    }

    #[test]
    fn clear_resets_layers_and_cache() {
        let mut sl = SketchLearn::<OneTuple>::new(1 << 16, 2, 0.2).unwrap();
        let heavy = OneTuple::new(42);
        for _ in 0..500 {
            sl.update(&heavy, 1);
        }
        assert!(sl.has_flow(&heavy));
        sl.clear();
        assert!(!sl.has_flow(&heavy));
        assert!(sl.decode().is_empty());
    }

    #[test]
    fn decode_is_cached_until_next_update() {
        let mut sl = SketchLearn::<OneTuple>::new(1 << 16, 2, 0.2).unwrap();
        let heavy = OneTuple::new(7);
        for _ in 0..500 {
            sl.update(&heavy, 1);
        }
        let first = sl.decode();
        let second = sl.decode();
        assert_eq!(first, second);
    }

    #[test]
    fn light_flows_need_not_be_recovered() {
        let mut sl = SketchLearn::<OneTuple>::new(1 << 16, 2, 0.2).unwrap();
        for i in 0..20u32 {
            sl.update(&OneTuple::new(i), 1);
        }
        // No panic, no required membership: small flows are best-effort.
        let _ = sl.decode();
    }
}
