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
//! UnivMon: a geometrically-sampled tower of sub-sketches.
//!
//! Layer 0 sees every update; layer `l >= 1` sees an update with probability
//! `2^-l`, so a flow of true count `N` is expected to survive to layer
//! `log2(N)` with enough weight to be read back out scaled by `2^l`. The
//! sampling cascade short-circuits on the first rejected layer, which is
//! the pattern the original design relies on.

use crate::count_sketch::CountSketch;
use crate::error::SketchError;
use crate::flow_key::FlowKey;
use crate::flow_sketch::FlowSketch;
use crate::hash::{DefaultHashFamily, HashFamily};
use crate::sample_and_hold::SampleAndHold;

/// Selects which sub-sketch kind backs every UnivMon layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Each layer is a [`CountSketch`] with a fixed 8-row internal shape.
    CountSketch,
    /// Each layer is a [`SampleAndHold`] with capacity derived from its
    /// share of the byte budget.
    SampleAndHold,
}

/// A fixed internal row count for CountSketch-backed layers.
const COUNT_SKETCH_ROWS: usize = 8;

/// Seed-index base for the sampling cascade's pseudorandom draws, kept well
/// clear of any per-sketch hash seed ranges used elsewhere in the crate.
const SAMPLE_SEED_BASE: u64 = 9_000;

/// Layered geometric-sampling frequency tower.
///
/// # Example
/// ```rust
/// use flowsketch::univmon::{BackendKind, UnivMon};
/// use flowsketch::flow_key::TwoTuple;
///
/// let mut um = UnivMon::<TwoTuple>::new(6, 16384, BackendKind::CountSketch).unwrap();
/// let flow = TwoTuple::new(1, 2);
/// for _ in 0..1000 {
///     um.update(&flow, 1);
/// }
/// let estimate = um.query(&flow);
/// assert!(estimate > 0);
/// ```
pub struct UnivMon<K: FlowKey, H: HashFamily = DefaultHashFamily> {
    layers: Vec<Box<dyn FlowSketch<K>>>,
    hash: H,
    tick: u64,
}

impl<K: FlowKey, H: HashFamily> UnivMon<K, H> {
    /// Builds a tower of `layer_count` layers over a total byte budget,
    /// backed by `kind` sub-sketches.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] if `layer_count` is zero.
    pub fn new(layer_count: usize, byte_budget: usize, kind: BackendKind) -> Result<Self, SketchError> {
        Self::with_hash_family(layer_count, byte_budget, kind, H::default())
    }

    /// Builds a tower with an explicit hash family instance, cloned into
    /// every layer.
    pub fn with_hash_family(
        layer_count: usize,
        byte_budget: usize,
        kind: BackendKind,
        hash: H,
    ) -> Result<Self, SketchError> {
        if layer_count == 0 {
            return Err(SketchError::InvalidParameter("layer_count must be greater than zero"));
        }
        let base = byte_budget / layer_count;
        let remainder = byte_budget - base * layer_count;

        let mut layers: Vec<Box<dyn FlowSketch<K>>> = Vec::with_capacity(layer_count);
        for l in 0..layer_count {
            let layer_budget = base + if l < remainder { 1 } else { 0 };
            layers.push(Self::build_layer(kind, layer_budget, hash.clone())?);
        }

        Ok(Self { layers, hash, tick: 0 })
    }

    fn build_layer(kind: BackendKind, layer_budget: usize, hash: H) -> Result<Box<dyn FlowSketch<K>>, SketchError> {
        match kind {
            BackendKind::CountSketch => {
                let budget = layer_budget.max(COUNT_SKETCH_ROWS * std::mem::size_of::<i32>());
                Ok(Box::new(CountSketch::with_hash_family(COUNT_SKETCH_ROWS, budget, hash)?))
            }
            BackendKind::SampleAndHold => {
                let entry_size = std::mem::size_of::<K>() + std::mem::size_of::<u64>();
                let capacity = (layer_budget / entry_size).max(1);
                Ok(Box::new(SampleAndHold::new(capacity)?))
            }
        }
    }

    /// Number of layers in the tower.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn accept(&self, flow: &K, layer: usize) -> bool {
        if layer == 0 {
            return true;
        }
        let seed = SAMPLE_SEED_BASE + self.tick.wrapping_mul(97) + layer as u64;
        // Accept with probability 2^-layer: draw uniformly from
        // [0, 2^20) and compare against a 2^-layer threshold.
        const SPACE: u64 = 1 << 20;
        let threshold = (SPACE >> layer.min(20)).max(1);
        self.hash.hash(flow, seed, SPACE) < threshold
    }

    /// Feeds `delta` occurrences of `flow` through the sampling cascade:
    /// layer 0 always, layer `l` only if every layer below it accepted.
    pub fn update(&mut self, flow: &K, delta: u32) {
        if delta == 0 {
            return;
        }
        self.tick = self.tick.wrapping_add(1);
        self.layers[0].update(flow, delta);
        for l in 1..self.layers.len() {
            if self.accept(flow, l) {
                self.layers[l].update(flow, delta);
            } else {
                break;
            }
        }
    }

    /// Returns `max(layer_estimate * 2^l)` over every layer reporting a
    /// positive estimate for `flow` (0 if none do).
    pub fn query(&self, flow: &K) -> u64 {
        let mut max_estimate = 0u64;
        for (l, layer) in self.layers.iter().enumerate() {
            let estimate = layer.query(flow);
            if estimate == 0 {
                continue;
            }
            let scaled = estimate.checked_shl(l as u32).unwrap_or(u64::MAX);
            max_estimate = max_estimate.max(scaled);
        }
        max_estimate
    }

    /// Equivalent to `query(flow) > 0`.
    pub fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }

    /// Resets every layer to its post-construction empty state.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn constructor_rejects_zero_layers() {
        assert!(UnivMon::<TwoTuple>::new(0, 16384, BackendKind::CountSketch).is_err());
    }

    #[test]
    fn univmon_scale_recovery_scenario_from_spec() {
        let mut um = UnivMon::<TwoTuple>::new(6, 16384, BackendKind::CountSketch).unwrap();
        let flow = TwoTuple::new(1, 2);
        for _ in 0..1000 {
            um.update(&flow, 1);
        }
        let estimate = um.query(&flow);
        assert!(estimate >= 900 && estimate <= 1100, "estimate {estimate} out of expected range");
    }

    #[test]
    fn update_with_zero_delta_is_a_no_op() {
        let mut um = UnivMon::<TwoTuple>::new(4, 8192, BackendKind::CountSketch).unwrap();
        let flow = TwoTuple::new(1, 1);
        um.update(&flow, 0);
        assert!(!um.has_flow(&flow));
    }

    #[test]
    fn sample_and_hold_backend_also_estimates() {
        let mut um = UnivMon::<TwoTuple>::new(4, 8192, BackendKind::SampleAndHold).unwrap();
        let flow = TwoTuple::new(3, 4);
        for _ in 0..200 {
            um.update(&flow, 1);
        }
        assert!(um.query(&flow) > 0);
    }

    #[test]
    fn clear_resets_every_layer() {
        let mut um = UnivMon::<TwoTuple>::new(4, 8192, BackendKind::CountSketch).unwrap();
        let flow = TwoTuple::new(5, 6);
        um.update(&flow, 50);
        um.clear();
        assert_eq!(um.query(&flow), 0);
    }
}
