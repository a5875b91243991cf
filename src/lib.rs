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
//! Memory-bounded probabilistic sketches for network flow telemetry.
//!
//! Given an unbounded stream of `(flow, increment)` events, the sketches in
//! this crate maintain compact, fixed-memory summaries that answer per-flow
//! frequency queries, identify heavy hitters, and, for a few of them,
//! recover the whole set of active flows and their counts. Every sketch is
//! generic over a [`flow_key::FlowKey`] (how wide a flow identifier is) and
//! a [`hash::HashFamily`] (which seeded hash drives bucket selection), and
//! is sized from a fixed byte budget rather than a row/column count chosen
//! by hand.
//!
//! The crate is meant to run both as an in-process user-space engine and as
//! the user-space half of a kernel-resident fast path, where a kernel
//! program updates shared counter buffers and this crate's
//! [`snapshot::SnapshotBuffer`] lets a user-space controller swap buffers
//! and serve queries without locking against the writer.
//!
//! - [`flow_key`]: the 1-/2-/5-tuple flow identifiers every sketch is
//!   generic over.
//! - [`hash`]: the seeded hash family shared by every sketch.
//! - [`counter_matrix`]: the row-major saturating counter store Count-Min,
//!   Count Sketch, and the snapshot buffer are built on.
//! - [`bloom_filter`]: presence-only membership, plain and atomic variants.
//! - [`count_min`]: overestimating frequency sketch.
//! - [`count_sketch`]: unbiased frequency sketch via signed hashing.
//! - [`sample_and_hold`]: exact counts over a capped working set.
//! - [`hash_pipe`]: a multi-stage filter that carries the largest flow
//!   forward.
//! - [`mv_sketch`]: per-cell majority-vote candidate tracking.
//! - [`elastic_sketch`]: a voting heavy part over a Count-Min light part.
//! - [`flow_radar`]: Bloom filter plus IBLT-style peeling decode.
//! - [`univmon`]: a geometric-sampling tower of sub-sketches.
//! - [`sketch_learn`]: a bit-level Count-Min tower with flow recovery.
//! - [`snapshot`]: the double-buffer swap protocol and kernel-attachment
//!   control-plane contract.
//! - [`flow_sketch`]: the object-safe update/query surface the composite
//!   sketches (UnivMon) pick a backend behind.

pub mod bloom_filter;
pub mod count_min;
pub mod count_sketch;
pub mod counter_matrix;
pub mod elastic_sketch;
pub mod error;
pub mod flow_key;
pub mod flow_radar;
pub mod flow_sketch;
pub mod hash;
pub mod hash_pipe;
pub mod mv_sketch;
pub mod sample_and_hold;
pub mod sketch_learn;
pub mod snapshot;
pub mod univmon;

pub use error::{ControlPlaneError, SketchError};
