use std::cell::UnsafeCell;
use std::fmt;

/// The two equal-capacity byte buffers shared by the writer and the reader.
///
/// Steady-state appends and reads run without a lock, so the bytes live in
/// `UnsafeCell` storage and access goes through exact-range raw slices. The
/// cursor discipline keeps the ranges disjoint:
///
/// - while both cursors share a buffer, the writer only writes at offsets
///   `>= writer.offset` and the reader only reads below it;
/// - while the cursors occupy distinct buffers, each side touches only its
///   own buffer.
pub(crate) struct BufferPair {
    bufs: [Box<[UnsafeCell<u8>]>; 2],
    capacity: u32,
}

// SAFETY: one producer and one consumer thread access disjoint byte ranges,
// partitioned by `writer.offset` (published with release ordering) and the
// buffer-swap state.
unsafe impl Sync for BufferPair {}

impl BufferPair {
    pub(crate) fn allocate(capacity: u32) -> Self {
        let alloc =
            || (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Self {
            bufs: [alloc(), alloc()],
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Full mutable view of one buffer; needs exclusive ownership, used only
    /// while the buffer pair is being populated during recovery.
    pub(crate) fn whole_mut(&mut self, idx: usize) -> &mut [u8] {
        let cells = &mut self.bufs[idx][..];
        // SAFETY: `&mut self` rules out any concurrent access, and
        // `UnsafeCell<u8>` has the layout of `u8`.
        unsafe {
            std::slice::from_raw_parts_mut(
                cells.as_mut_ptr().cast::<u8>(),
                cells.len(),
            )
        }
    }

    /// Shared view of `[start, start + len)` of buffer `idx`.
    ///
    /// # Safety
    ///
    /// No other thread may write this range for the lifetime of the borrow.
    pub(crate) unsafe fn range(
        &self,
        idx: usize,
        start: u32,
        len: u32,
    ) -> &[u8] {
        let cells =
            &self.bufs[idx][start as usize..start as usize + len as usize];
        std::slice::from_raw_parts(cells.as_ptr().cast::<u8>(), cells.len())
    }

    /// Mutable view of `[start, start + len)` of buffer `idx`.
    ///
    /// # Safety
    ///
    /// No other thread may access this range for the lifetime of the borrow.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn range_mut(
        &self,
        idx: usize,
        start: u32,
        len: u32,
    ) -> &mut [u8] {
        let cells =
            &self.bufs[idx][start as usize..start as usize + len as usize];
        std::slice::from_raw_parts_mut(
            cells.as_ptr() as *mut u8,
            cells.len(),
        )
    }
}

impl fmt::Debug for BufferPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPair")
            .field("capacity", &self.capacity)
            .finish()
    }
}
