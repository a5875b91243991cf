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
//! Double-buffered snapshot protocol and the kernel fast-path control plane.
//!
//! [`SnapshotBuffer`] models two sibling counter stores plus the single
//! selector cell that decides which one the writer targets. `swap` flips
//! the selector and hands the caller the index that just became inactive,
//! the one a reader may now query without any further synchronization,
//! because the writer never touches an inactive buffer. The kernel-resident
//! regime (an XDP program updating one buffer from many CPUs while this
//! process swaps and queries) is represented only by its interface contract
//! ([`KernelAttachment`]); the actual BPF map/attach glue is out of scope
//! (see spec.md §1, §6) and is modeled here by [`LoopbackAttachment`], a
//! same-process reference implementation tests can drive.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::counter_matrix::{CounterMatrix, SaturatingCounter};
use crate::error::{ControlPlaneError, SketchError};

/// Two sibling counter stores and the selector that decides which one the
/// writer currently targets.
///
/// The writer (`update`) only ever mutates the active buffer; the reader
/// (`read`) only ever reads the inactive one. `swap` is the sole operation
/// that touches the selector, and it is the caller's responsibility to
/// `clear` the buffer it hands back before that buffer is selected again,
/// otherwise the next reader sees stale, pre-swap counts layered under new
/// writes (spec.md §4.N).
#[derive(Debug)]
pub struct SnapshotBuffer<T: SaturatingCounter> {
    buffers: [CounterMatrix<T>; 2],
    active: AtomicUsize,
}

impl<T: SaturatingCounter> SnapshotBuffer<T> {
    /// Builds a pair of identically shaped counter stores, `rows` rows each,
    /// sized from `byte_budget` the same way [`CounterMatrix::new`] is.
    /// The writer starts targeting buffer 0; buffer 1 is the reader's
    /// initial (all-zero) view.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] under the same conditions
    /// as [`CounterMatrix::new`].
    pub fn new(rows: usize, byte_budget: usize) -> Result<Self, SketchError> {
        Ok(Self {
            buffers: [CounterMatrix::new(rows, byte_budget)?, CounterMatrix::new(rows, byte_budget)?],
            active: AtomicUsize::new(0),
        })
    }

    /// Number of rows shared by both buffers.
    pub fn rows(&self) -> usize {
        self.buffers[0].rows()
    }

    /// Number of columns shared by both buffers.
    pub fn cols(&self) -> usize {
        self.buffers[0].cols()
    }

    /// Index of the buffer the writer currently targets.
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Index of the buffer the reader currently sees (the one not being
    /// written to).
    pub fn inactive_index(&self) -> usize {
        1 - self.active_index()
    }

    /// Adds `delta` to `(row, col)` in the active buffer.
    pub fn update(&mut self, row: usize, col: usize, delta: T) {
        let idx = self.active_index();
        self.buffers[idx].update(row, col, delta);
    }

    /// Reads `(row, col)` from the inactive buffer, the reader's frozen
    /// view, unaffected by concurrent or subsequent writes until the next
    /// `swap`.
    pub fn read(&self, row: usize, col: usize) -> T {
        self.buffers[self.inactive_index()].read(row, col)
    }

    /// Atomically flips the selector and returns the index that just
    /// became inactive (the reader's new view).
    #[instrument(level = "debug", skip(self))]
    pub fn swap(&self) -> usize {
        let previous = self.active.fetch_xor(1, Ordering::AcqRel);
        let newly_inactive = previous;
        debug!(newly_inactive, "snapshot buffer swapped");
        newly_inactive
    }

    /// Zeroes buffer `index`. Call this on the buffer `swap` returned
    /// before the next `swap` makes it active again, per the double-buffer
    /// contract.
    pub fn clear_buffer(&mut self, index: usize) {
        self.buffers[index].clear();
    }
}

/// A per-bucket lock for composite-field updates (Elastic's heavy bucket,
/// MVSketch's candidate/value/count triple, FlowRadar's XOR+count pair) in
/// the kernel-resident regime, where many CPUs may update the same bucket
/// concurrently. The critical section this guards must stay free of I/O and
/// allocation (spec.md §5); `with_lock` enforces that shape by taking a
/// plain closure over `&mut T`.
#[derive(Debug, Default)]
pub struct LockedBucket<T>(Mutex<T>);

impl<T> LockedBucket<T> {
    /// Wraps `value` behind a per-bucket lock.
    pub fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    /// Runs `f` against the bucket under its lock and returns `f`'s result.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }

    /// Returns a copy of the current bucket value.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.0.lock()
    }
}

/// The snapshot controller's control-plane surface: attach to a fast-path
/// collaborator, swap snapshots, detach. Spec.md §6 scopes the actual
/// interface lookup / BPF map open / mmap machinery out of this crate;
/// implementations of this trait are where a real libbpf/aya-based loader
/// would plug in.
pub trait KernelAttachment {
    /// Attaches to the named interface's fast path. Idempotent re-attach
    /// behavior is implementation-defined.
    fn attach(&mut self, interface_name: &str) -> Result<(), ControlPlaneError>;

    /// Detaches, releasing any owned mmap'd buffers. A no-op if not
    /// currently attached.
    fn detach(&mut self);

    /// Swaps the active snapshot buffer, returning the index that became
    /// inactive.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::NotAttached`] if called before a
    /// successful `attach`.
    fn swap(&mut self) -> Result<usize, ControlPlaneError>;
}

/// Same-process reference [`KernelAttachment`] implementation: owns a
/// [`SnapshotBuffer`] directly instead of mmap'ing kernel-shared memory.
/// Used by tests and by the pure user-space regime, where there is no
/// actual kernel collaborator to attach to.
#[derive(Debug)]
pub struct LoopbackAttachment<T: SaturatingCounter> {
    buffer: SnapshotBuffer<T>,
    interface: Option<String>,
}

impl<T: SaturatingCounter> LoopbackAttachment<T> {
    /// Wraps an existing [`SnapshotBuffer`] for attach/detach/swap access
    /// through the [`KernelAttachment`] trait.
    pub fn new(buffer: SnapshotBuffer<T>) -> Self {
        Self { buffer, interface: None }
    }

    /// Borrows the underlying buffer directly (e.g. for `update`/`read`
    /// outside the trait surface).
    pub fn buffer(&self) -> &SnapshotBuffer<T> {
        &self.buffer
    }

    /// Mutably borrows the underlying buffer.
    pub fn buffer_mut(&mut self) -> &mut SnapshotBuffer<T> {
        &mut self.buffer
    }
}

impl<T: SaturatingCounter> KernelAttachment for LoopbackAttachment<T> {
    #[instrument(level = "info", skip(self))]
    fn attach(&mut self, interface_name: &str) -> Result<(), ControlPlaneError> {
        info!(interface_name, "attaching loopback snapshot controller");
        self.interface = Some(interface_name.to_string());
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(interface_name) = self.interface.take() {
            info!(interface_name, "detaching loopback snapshot controller");
        }
    }

    fn swap(&mut self) -> Result<usize, ControlPlaneError> {
        if self.interface.is_none() {
            return Err(ControlPlaneError::NotAttached);
        }
        Ok(self.buffer.swap())
    }
}

/// Shared-memory counter buffer for the `kernel-shared` regime: two
/// anonymous mmap'd regions sized by [`crate::counter_matrix::cell_stride`],
/// so the layout matches what a real BPF map-backed buffer would present
/// across the user/kernel boundary (row-major, 8-byte-aligned cells,
/// independent of `sizeof(T)`).
#[cfg(feature = "kernel-shared")]
pub mod kernel_shared {
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use memmap2::MmapMut;

    use crate::counter_matrix::{cell_stride, SaturatingCounter};
    use crate::error::{ControlPlaneError, SketchError};

    use super::KernelAttachment;

    /// An mmap-backed pair of row-major counter buffers.
    pub struct MmapSnapshotBuffer<T: SaturatingCounter> {
        rows: usize,
        cols: usize,
        maps: [MmapMut; 2],
        active: AtomicUsize,
        _counter: PhantomData<T>,
    }

    impl<T: SaturatingCounter> MmapSnapshotBuffer<T> {
        /// Allocates two anonymous mmap regions large enough to hold
        /// `rows * cols` cells each, at [`cell_stride::<T>()`] bytes per
        /// cell.
        ///
        /// # Errors
        /// Returns [`SketchError::InvalidParameter`] if `rows` or `cols`
        /// is zero.
        pub fn new(rows: usize, cols: usize) -> Result<Self, SketchError> {
            if rows == 0 || cols == 0 {
                return Err(SketchError::InvalidParameter("rows and cols must be greater than zero"));
            }
            let region_len = rows * cols * cell_stride::<T>();
            let make_map = || MmapMut::map_anon(region_len).expect("anonymous mmap of a snapshot region cannot fail");
            Ok(Self {
                rows,
                cols,
                maps: [make_map(), make_map()],
                active: AtomicUsize::new(0),
                _counter: PhantomData,
            })
        }

        fn offset(&self, row: usize, col: usize) -> usize {
            (row * self.cols + col) * cell_stride::<T>()
        }

        /// Index of the buffer the writer currently targets.
        pub fn active_index(&self) -> usize {
            self.active.load(Ordering::Acquire)
        }

        /// Reads `(row, col)` from the inactive mapping.
        pub fn read(&self, row: usize, col: usize) -> T {
            let inactive = 1 - self.active_index();
            let offset = self.offset(row, col);
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&self.maps[inactive][offset..offset + 4]);
            T::from_ne_bytes_4(raw)
        }

        /// Atomically flips the selector, returning the newly-inactive index.
        pub fn swap(&self) -> usize {
            self.active.fetch_xor(1, Ordering::AcqRel)
        }
    }

    /// A [`KernelAttachment`] that owns its mmap'd buffers and releases them
    /// on `detach`/drop, representing the real fast-path regime's control
    /// plane without depending on an actual BPF loader.
    pub struct MmapAttachment<T: SaturatingCounter> {
        buffer: Option<MmapSnapshotBuffer<T>>,
        rows: usize,
        cols: usize,
    }

    impl<T: SaturatingCounter> MmapAttachment<T> {
        /// Builds an attachment that will allocate a `rows x cols`
        /// [`MmapSnapshotBuffer`] on the next successful `attach`.
        pub fn new(rows: usize, cols: usize) -> Self {
            Self { buffer: None, rows, cols }
        }
    }

    impl<T: SaturatingCounter> KernelAttachment for MmapAttachment<T> {
        fn attach(&mut self, _interface_name: &str) -> Result<(), ControlPlaneError> {
            let buffer = MmapSnapshotBuffer::new(self.rows, self.cols)
                .map_err(|e| ControlPlaneError::Mmap(e.to_string()))?;
            self.buffer = Some(buffer);
            Ok(())
        }

        fn detach(&mut self) {
            self.buffer = None;
        }

        fn swap(&mut self) -> Result<usize, ControlPlaneError> {
            match &self.buffer {
                Some(buffer) => Ok(buffer.swap()),
                None => Err(ControlPlaneError::NotAttached),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn fresh_mmap_region_reads_as_zero() {
            let buffer = MmapSnapshotBuffer::<u32>::new(2, 4).unwrap();
            assert_eq!(buffer.read(0, 0), 0);
            assert_eq!(buffer.read(1, 3), 0);
        }

        #[test]
        fn constructor_rejects_degenerate_shapes() {
            assert!(MmapSnapshotBuffer::<u32>::new(0, 4).is_err());
            assert!(MmapSnapshotBuffer::<u32>::new(2, 0).is_err());
        }

        #[test]
        fn attachment_requires_attach_before_swap() {
            let mut attachment = MmapAttachment::<u32>::new(1, 4);
            assert!(matches!(attachment.swap(), Err(ControlPlaneError::NotAttached)));
            attachment.attach("veth0").unwrap();
            assert!(attachment.swap().is_ok());
            attachment.detach();
            assert!(matches!(attachment.swap(), Err(ControlPlaneError::NotAttached)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_targets_active_reader_sees_inactive() {
        let mut buffer = SnapshotBuffer::<u32>::new(2, 1024).unwrap();
        buffer.update(0, 0, 5);
        // Nothing swapped yet: the reader's (inactive) view is still zero.
        assert_eq!(buffer.read(0, 0), 0);
    }

    #[test]
    fn double_buffer_snapshot_scenario_from_spec() {
        let mut buffer = SnapshotBuffer::<u32>::new(1, 256).unwrap();
        for _ in 0..10 {
            buffer.update(0, 0, 1);
        }
        let frozen = buffer.swap();
        assert_eq!(buffer.read(0, 0), 10);

        for _ in 0..5 {
            buffer.update(0, 0, 1);
        }
        // No second swap yet: reads still return the 10-update snapshot.
        assert_eq!(buffer.read(0, 0), 10);

        buffer.clear_buffer(frozen);
        buffer.swap();
        assert_eq!(buffer.read(0, 0), 5);
    }

    #[test]
    fn swap_is_its_own_inverse_over_two_calls() {
        let buffer = SnapshotBuffer::<u32>::new(1, 64).unwrap();
        let first = buffer.active_index();
        buffer.swap();
        buffer.swap();
        assert_eq!(buffer.active_index(), first);
    }

    #[test]
    fn loopback_attachment_requires_attach_before_swap() {
        let buffer = SnapshotBuffer::<u32>::new(1, 64).unwrap();
        let mut attachment = LoopbackAttachment::new(buffer);
        assert!(matches!(attachment.swap(), Err(ControlPlaneError::NotAttached)));
        attachment.attach("veth0").unwrap();
        assert!(attachment.swap().is_ok());
    }

    #[test]
    fn locked_bucket_serializes_composite_updates_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let bucket = Arc::new(LockedBucket::new((0u32, 0i32)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let bucket = Arc::clone(&bucket);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    bucket.with_lock(|(value, count)| {
                        *value += 1;
                        *count += 1;
                    });
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let (value, count) = bucket.get();
        assert_eq!(value, 8000);
        assert_eq!(count, 8000);
    }
}
