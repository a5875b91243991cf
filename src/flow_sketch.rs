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
//! A uniform object-safe ingest surface over the crate's update/query
//! sketches, used where genuine runtime polymorphism is needed (UnivMon's
//! layer tower picks its backend kind once, at construction).

use crate::count_sketch::CountSketch;
use crate::flow_key::FlowKey;
use crate::hash::HashFamily;
use crate::sample_and_hold::SampleAndHold;

/// Object-safe update/query surface shared by every sketch in the crate.
pub trait FlowSketch<K: FlowKey>: Send + Sync {
    /// Adds `delta` occurrences of `flow`.
    fn update(&mut self, flow: &K, delta: u32);
    /// Returns the sketch's current estimate for `flow`.
    fn query(&self, flow: &K) -> u64;
    /// Equivalent to `query(flow) > 0` unless overridden.
    fn has_flow(&self, flow: &K) -> bool {
        self.query(flow) > 0
    }
    /// Resets to the post-construction zero state.
    fn clear(&mut self);
}

impl<K: FlowKey, H: HashFamily> FlowSketch<K> for CountSketch<K, H> {
    fn update(&mut self, flow: &K, delta: u32) {
        CountSketch::update(self, flow, delta as i32);
    }
    fn query(&self, flow: &K) -> u64 {
        CountSketch::query(self, flow)
    }
    fn clear(&mut self) {
        CountSketch::clear(self);
    }
}

impl<K: FlowKey> FlowSketch<K> for SampleAndHold<K> {
    fn update(&mut self, flow: &K, delta: u32) {
        SampleAndHold::update(self, flow, i64::from(delta));
    }
    fn query(&self, flow: &K) -> u64 {
        SampleAndHold::query(self, flow)
    }
    fn has_flow(&self, flow: &K) -> bool {
        SampleAndHold::has_flow(self, flow)
    }
    fn clear(&mut self) {
        SampleAndHold::clear(self);
    }
}
