//! Block chain storage and bump carving
//!
//! # Safety
//!
//! A [`Block`] is one heap region obtained from the pool's backing
//! allocator:
//! - the region is allocated once with `POOL_ALIGNMENT` and never moved or
//!   reallocated, so carved addresses stay valid until the block is released
//! - `last` is an offset in `[header, end]`; carving only moves it forward
//! - the base is `POOL_ALIGNMENT`-aligned, so aligning an offset to
//!   `WORD_ALIGN` aligns the resulting address too
//! - blocks do not release themselves; the owning pool calls
//!   [`Block::release`] with the allocator that produced them

use std::alloc::{GlobalAlloc, Layout};
use std::ptr::{self, NonNull};

use crate::error::{PoolError, PoolResult};
use crate::types::alignment::{POOL_ALIGNMENT, WORD_ALIGN};
use crate::utils::align_up;

/// One contiguous region in the pool's block chain
pub(crate) struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
    /// Offset of the first free byte
    last: usize,
    /// Consecutive growth events this block could not serve
    failed: u32,
}

impl Block {
    /// Allocates a block of `size` bytes with the free cursor at `header`
    pub(crate) fn allocate<A: GlobalAlloc>(
        heap: &A,
        size: usize,
        header: usize,
    ) -> PoolResult<Self> {
        debug_assert!(header <= size);

        let layout = Layout::from_size_align(size, POOL_ALIGNMENT)
            .map_err(|_| PoolError::invalid_layout("block layout creation failed"))?;

        // SAFETY: Allocating a block from the backing heap.
        // - layout has non-zero size (size >= MIN_POOL_SIZE, enforced by the pool)
        // - POOL_ALIGNMENT is a power of two
        // - a null return is mapped to an error below
        let raw = unsafe { heap.alloc(layout) };
        let ptr =
            NonNull::new(raw).ok_or_else(|| PoolError::allocation_failed_with_layout(layout))?;

        Ok(Self {
            ptr,
            layout,
            last: header,
            failed: 0,
        })
    }

    /// Returns the region to the heap it came from
    ///
    /// # Safety
    ///
    /// `heap` must be the allocator passed to [`Block::allocate`], and no
    /// pointer carved from this block may be used afterwards.
    pub(crate) unsafe fn release<A: GlobalAlloc>(self, heap: &A) {
        // SAFETY: ptr/layout are exactly what heap.alloc returned (caller contract).
        unsafe { heap.dealloc(self.ptr.as_ptr(), self.layout) };
    }

    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.last
    }

    #[inline]
    pub(crate) fn failed(&self) -> u32 {
        self.failed
    }

    /// Bumps the failure counter, returning its previous value
    #[inline]
    pub(crate) fn record_failure(&mut self) -> u32 {
        let previous = self.failed;
        self.failed = previous.saturating_add(1);
        previous
    }

    /// Carves `size` bytes at the free cursor, word-aligning the start when
    /// `aligned` is set. Returns `None` when the rest of the block is too
    /// small; the cursor is left untouched in that case.
    pub(crate) fn carve(&mut self, size: usize, aligned: bool) -> Option<NonNull<u8>> {
        let start = if aligned {
            align_up(self.last, WORD_ALIGN)
        } else {
            self.last
        };

        if start > self.end() || self.end() - start < size {
            return None;
        }

        self.last = start + size;

        // SAFETY: start <= end, so the offset stays inside (or one past) the
        // allocation and the result is non-null.
        Some(unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(start)) })
    }

    /// Rewinds the cursor to `header` and clears the failure counter,
    /// optionally poisoning the reclaimed bytes.
    pub(crate) fn rewind(&mut self, header: usize, pattern: Option<u8>) {
        let header = header.min(self.end());

        if let Some(byte) = pattern {
            // SAFETY: Filling the reclaimed range [header, end).
            // - header <= end (clamped above), range lies inside the block
            // - the pool holds &mut self, so no carved reference is alive
            unsafe {
                ptr::write_bytes(self.ptr.as_ptr().add(header), byte, self.end() - header);
            }
        }

        self.last = header;
        self.failed = 0;
    }

    /// Offset of `addr` inside this block, if it points into it
    pub(crate) fn offset_of(&self, addr: *const u8) -> Option<usize> {
        let base = self.ptr.as_ptr() as usize;
        let addr = addr as usize;
        (addr >= base && addr < base + self.end()).then(|| addr - base)
    }
}
