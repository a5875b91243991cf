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
//! Error types shared by every sketch constructor and the snapshot controller.

/// Errors returned by sketch constructors and merge/decode operations.
///
/// These are all fatal-at-construction or shape-mismatch errors; `update`
/// and `query` are total functions and never return `SketchError` (see
/// the per-sketch saturation and decode-failure notes on each module).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// A constructor received an invalid argument (zero rows, a budget too
    /// small to hold one cell per row, an out-of-range Bloom fraction, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Two sketches were combined (merge) but are not shape-compatible.
    #[error("incompatible sketches: {0}")]
    IncompatibleSketches(&'static str),
}

/// Errors surfaced by the kernel-attachment control plane.
///
/// These never occur on the hot path (`update`/`query`); they are the
/// errno-like codes `attach`/`detach` may return when the fast-path
/// collaborator (interface lookup, map open, mmap) fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The named network interface does not exist.
    #[error("interface lookup failed: {0}")]
    InterfaceNotFound(String),

    /// A kernel-shared counter map could not be opened.
    #[error("map open failed: {0}")]
    MapOpen(String),

    /// Mapping a kernel-shared counter buffer into this process failed.
    #[error("mmap failed: {0}")]
    Mmap(String),

    /// `swap` or `detach` was called before a successful `attach`.
    #[error("not attached")]
    NotAttached,
}
