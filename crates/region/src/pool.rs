//! Region pool engine
//!
//! # Layout
//!
//! A pool owns a chain of equally sized blocks. Requests up to the pool's
//! small threshold are bump-carved from the chain, starting at the
//! `current` block; larger requests go to the heap and are tracked in the
//! large registry. Cleanup handlers registered on the pool run on reset
//! and on teardown.
//!
//! ## Invariants
//!
//! - blocks never move once allocated: every address handed out stays valid
//!   across later allocations, until `reset`, `free_large` (large payloads
//!   only) or drop
//! - `current` only moves toward the tail between resets
//! - the first block reserves `POOL_HEADER_SIZE` bytes, blocks added by
//!   growth reserve `BLOCK_HEADER_SIZE`; reset rewinds every block to
//!   `POOL_HEADER_SIZE`
//! - record bookkeeping (large records, cleanup records) is carved from the
//!   pool like any small allocation, so it is reclaimed wholesale by reset
//!
//! ## Not Thread-Safe
//!
//! Allocation goes through `&self` using `Cell`/`RefCell`; the pool is
//! neither `Send` nor `Sync`. Use one pool per worker.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::block::Block;
use crate::cleanup::{Cleanup, CleanupChain};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::large::{LargeAlloc, LargeRegistry};
use crate::types::alignment::{POOL_ALIGNMENT, WORD_ALIGN};
use crate::types::size::MAX_ALLOC_FROM_POOL;
use crate::types::{
    BLOCK_HEADER_SIZE, CLEANUP_RECORD_SIZE, LARGE_RECORD_SIZE, MAX_FAILED, POOL_HEADER_SIZE,
};

/// Region pool with bulk reset and deferred cleanup
///
/// # Examples
///
/// ```
/// use nebula_region::Pool;
///
/// let mut pool = Pool::new(4096)?;
///
/// let small = pool.alloc(64)?;        // carved from a block
/// let large = pool.alloc(8192)?;      // straight from the heap
/// assert!(pool.free_large(large));    // large payloads can go early
/// assert!(!pool.free_large(small));   // small ones cannot
///
/// pool.reset();                       // everything reclaimed, blocks kept
/// assert_eq!(pool.alloc(64)?, small);
/// # Ok::<(), nebula_region::PoolError>(())
/// ```
pub struct Pool<A: GlobalAlloc = System> {
    blocks: RefCell<Vec<Block>>,
    current: Cell<usize>,
    /// Small-allocation threshold
    max: usize,
    /// Size of every block in the chain
    block_size: usize,
    large: RefCell<LargeRegistry>,
    cleanups: RefCell<CleanupChain>,
    config: PoolConfig,
    heap: A,
}

impl Pool<System> {
    /// Creates a pool whose blocks are `size` bytes (clamped up to
    /// [`MIN_POOL_SIZE`](crate::types::MIN_POOL_SIZE)), backed by the system heap
    pub fn new(size: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::default().with_size(size))
    }

    /// Creates a pool from a configuration, backed by the system heap
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::with_allocator(config, System)
    }
}

impl<A: GlobalAlloc> Pool<A> {
    /// Creates a pool drawing blocks and large payloads from `heap`
    pub fn with_allocator(config: PoolConfig, heap: A) -> PoolResult<Self> {
        config.validate()?;

        let size = config.effective_size();
        let first = Block::allocate(&heap, size, POOL_HEADER_SIZE)?;
        let max = (size - POOL_HEADER_SIZE).min(MAX_ALLOC_FROM_POOL);

        #[cfg(feature = "logging")]
        debug!(block_size = size, max_small_size = max, "region pool created");

        Ok(Self {
            blocks: RefCell::new(vec![first]),
            current: Cell::new(0),
            max,
            block_size: size,
            large: RefCell::new(LargeRegistry::new()),
            cleanups: RefCell::new(CleanupChain::new()),
            config,
            heap,
        })
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocates `size` bytes, word-aligned when served from a block
    ///
    /// Requests above [`max_small_size`](Self::max_small_size) are served by
    /// the heap and can be released early with [`free_large`](Self::free_large).
    #[must_use = "allocated memory must be used"]
    pub fn alloc(&self, size: usize) -> PoolResult<NonNull<u8>> {
        if size <= self.max {
            return self.alloc_small(size, true);
        }
        self.alloc_large(size)
    }

    /// Allocates `size` bytes without word alignment, packing small
    /// requests byte-exact
    #[must_use = "allocated memory must be used"]
    pub fn alloc_unaligned(&self, size: usize) -> PoolResult<NonNull<u8>> {
        if size <= self.max {
            return self.alloc_small(size, false);
        }
        self.alloc_large(size)
    }

    /// Allocates `size` word-aligned bytes and zero-fills them
    #[must_use = "allocated memory must be used"]
    pub fn alloc_zeroed(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let ptr = self.alloc(size)?;
        // SAFETY: ptr was just allocated with at least `size` writable bytes.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Moves `value` into the pool
    ///
    /// The value's destructor never runs; use
    /// [`register_drop`](Self::register_drop) for values that own resources.
    #[must_use = "allocated memory must be used"]
    pub fn alloc_value<T>(&self, value: T) -> PoolResult<&mut T> {
        let ptr = self.alloc_for::<T>(mem::size_of::<T>())?;
        // SAFETY: Initializing the allocation and creating a reference.
        // - ptr has size_of::<T>() bytes and at least T's alignment
        // - the memory is fresh, nothing else references it
        // - the reference borrows &self; reset/free_large need &mut self
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Copies a slice into the pool
    #[must_use = "allocated memory must be used"]
    pub fn alloc_slice_copy<T: Copy>(&self, slice: &[T]) -> PoolResult<&mut [T]> {
        let ptr = self.alloc_for::<T>(mem::size_of_val(slice))?;
        // SAFETY: Copying into the fresh allocation.
        // - ptr has size_of_val(slice) bytes and T's alignment
        // - source and destination do not overlap (fresh allocation)
        // - the slice borrows &self; reset/free_large need &mut self
        unsafe {
            ptr::copy_nonoverlapping(slice.as_ptr(), ptr.as_ptr(), slice.len());
            Ok(std::slice::from_raw_parts_mut(ptr.as_ptr(), slice.len()))
        }
    }

    /// Copies a string into the pool, packed without alignment
    #[must_use = "allocated memory must be used"]
    pub fn alloc_str(&self, s: &str) -> PoolResult<&str> {
        let ptr = self.alloc_unaligned(s.len())?;
        // SAFETY: Copying UTF-8 bytes into the fresh allocation.
        // - ptr has s.len() bytes, u8 needs no alignment
        // - bytes are copied verbatim so they stay valid UTF-8
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), ptr.as_ptr(), s.len());
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), s.len());
            Ok(std::str::from_utf8_unchecked(bytes))
        }
    }

    fn alloc_for<T>(&self, size: usize) -> PoolResult<NonNull<T>> {
        let align = mem::align_of::<T>();
        if align > WORD_ALIGN {
            return Err(PoolError::unsupported_alignment(align, WORD_ALIGN));
        }
        Ok(self.alloc(size)?.cast())
    }

    fn alloc_small(&self, size: usize, aligned: bool) -> PoolResult<NonNull<u8>> {
        let mut blocks = self.blocks.borrow_mut();
        let start = self.current.get();

        let carved = blocks[start..]
            .iter_mut()
            .find_map(|block| block.carve(size, aligned));

        let ptr = match carved {
            Some(ptr) => ptr,
            None => self.grow(&mut blocks, size)?,
        };

        if let Some(byte) = self.config.alloc_pattern {
            // SAFETY: ptr was just carved with `size` bytes inside a block.
            unsafe { ptr::write_bytes(ptr.as_ptr(), byte, size) };
        }

        Ok(ptr)
    }

    /// Appends a block and carves `size` bytes from it.
    ///
    /// Every block from `current` up to the old tail records a failure;
    /// blocks that keep failing are skipped by future searches.
    fn grow(&self, blocks: &mut Vec<Block>, size: usize) -> PoolResult<NonNull<u8>> {
        let mut block = Block::allocate(&self.heap, self.block_size, BLOCK_HEADER_SIZE)?;

        let Some(ptr) = block.carve(size, true) else {
            // SAFETY: block came from self.heap and nothing was carved from it.
            unsafe { block.release(&self.heap) };
            return Err(PoolError::allocation_failed(size, WORD_ALIGN));
        };

        let tail = blocks.len() - 1;
        let mut current = self.current.get();
        for index in current..tail {
            if blocks[index].record_failure() > MAX_FAILED {
                current = index + 1;
            }
        }
        self.current.set(current);
        blocks.push(block);

        #[cfg(feature = "logging")]
        debug!(
            blocks = blocks.len(),
            current,
            request = size,
            "region pool grew by one block"
        );

        Ok(ptr)
    }

    fn alloc_large(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let layout = Layout::from_size_align(size, POOL_ALIGNMENT)
            .map_err(|_| PoolError::invalid_layout("large allocation size overflows"))?;

        // SAFETY: Allocating a large payload.
        // - size > max >= MIN_POOL_SIZE - POOL_HEADER_SIZE, so it is non-zero
        // - null is mapped to an error below
        let raw = unsafe { self.heap.alloc(layout) };
        let ptr =
            NonNull::new(raw).ok_or_else(|| PoolError::allocation_failed_with_layout(layout))?;

        let payload = match self
            .large
            .borrow_mut()
            .attach_to_free_slot(LargeAlloc::new(ptr, layout))
        {
            Ok(()) => {
                #[cfg(feature = "logging")]
                trace!(size, "large allocation reused a free slot");
                return Ok(ptr);
            }
            Err(payload) => payload,
        };

        match self.alloc_small(LARGE_RECORD_SIZE, true) {
            Ok(node) => {
                self.large.borrow_mut().push_front(node, payload);
                #[cfg(feature = "logging")]
                trace!(size, "large allocation recorded");
                Ok(ptr)
            }
            Err(err) => {
                // SAFETY: payload was allocated above from self.heap and was
                // never handed out.
                unsafe { self.heap.dealloc(payload.ptr.as_ptr(), payload.layout) };
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Deallocation and cleanup registration
    // ------------------------------------------------------------------

    /// Releases a large allocation ahead of reset
    ///
    /// Returns `false` without touching anything when `ptr` is not a live
    /// large allocation of this pool, including small allocations, which
    /// can only be reclaimed by [`reset`](Self::reset).
    pub fn free_large(&mut self, ptr: NonNull<u8>) -> bool {
        let Some(payload) = self.large.get_mut().take(ptr.as_ptr()) else {
            return false;
        };

        // SAFETY: payload was allocated from self.heap with this layout; the
        // registry no longer refers to it, and &mut self rules out live
        // references from the typed helpers.
        unsafe { self.heap.dealloc(payload.ptr.as_ptr(), payload.layout) };

        #[cfg(feature = "logging")]
        trace!(size = payload.layout.size(), "large allocation released");

        true
    }

    /// Registers a cleanup record, reserving a `data_size` blob in the pool
    ///
    /// With `data_size == 0` no blob is reserved and the record's data is
    /// `None` until [`Cleanup::set_data`] points it somewhere.
    pub fn register_cleanup(&self, data_size: usize) -> PoolResult<Cleanup<'_, A>> {
        let node = self.alloc_small(CLEANUP_RECORD_SIZE, true)?;
        let blob = if data_size > 0 {
            Some(self.alloc(data_size)?)
        } else {
            None
        };

        let slot = self.cleanups.borrow_mut().push_front(node, blob);
        Ok(Cleanup::new(self, slot, blob, data_size))
    }

    /// Moves `value` into the pool and drops it in place on reset or
    /// teardown, whichever comes first
    pub fn register_drop<T: 'static>(&self, value: T) -> PoolResult<()> {
        let align = mem::align_of::<T>();
        if align > WORD_ALIGN {
            return Err(PoolError::unsupported_alignment(align, WORD_ALIGN));
        }

        let mut cleanup = self.register_cleanup(mem::size_of::<T>().max(1))?;
        cleanup.write(value)?;
        cleanup.set_handler(|data| {
            if let Some(ptr) = data {
                // SAFETY: ptr is the blob `value` was written to; the
                // handler runs at most once, so the value is dropped once.
                unsafe { ptr.cast::<T>().as_ptr().drop_in_place() };
            }
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Reclaims every allocation while keeping the block chain
    ///
    /// Runs due cleanup handlers (handler and data both set), unlinks the
    /// cleanup records that can no longer run, releases every large
    /// payload, rewinds every block and moves the search cursor back to
    /// the first block.
    pub fn reset(&mut self) {
        let ran = self.cleanups.get_mut().run_due();

        let heap = &self.heap;
        let mut released = 0usize;
        for payload in self.large.get_mut().drain() {
            // SAFETY: every registry payload was allocated from self.heap
            // with its stored layout, and &mut self rules out live references.
            unsafe { heap.dealloc(payload.ptr.as_ptr(), payload.layout) };
            released += 1;
        }

        let pattern = self.config.reset_pattern;
        for block in self.blocks.get_mut().iter_mut() {
            block.rewind(POOL_HEADER_SIZE, pattern);
        }
        self.current.set(0);

        #[cfg(feature = "logging")]
        debug!(
            cleanups = ran,
            large_released = released,
            blocks = self.blocks.get_mut().len(),
            "region pool reset"
        );
        #[cfg(not(feature = "logging"))]
        let _ = (ran, released);
    }

    /// Runs remaining cleanup handlers and returns all memory to the heap
    ///
    /// Equivalent to dropping the pool.
    pub fn destroy(self) {
        drop(self);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Largest request served from blocks
    #[inline]
    pub fn max_small_size(&self) -> usize {
        self.max
    }

    /// Size of every block in the chain
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks in the chain
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Index of the block where small-allocation searches start
    pub fn current_block(&self) -> usize {
        self.current.get()
    }

    /// Failure counters of every block, in chain order
    pub fn block_failures(&self) -> Vec<u32> {
        self.blocks.borrow().iter().map(Block::failed).collect()
    }

    /// Bytes consumed in each block (headers included), in chain order
    pub fn block_usage(&self) -> Vec<usize> {
        self.blocks.borrow().iter().map(Block::used).collect()
    }

    /// Block index and offset of `ptr`, if it points into the chain
    pub fn locate(&self, ptr: *const u8) -> Option<(usize, usize)> {
        self.blocks
            .borrow()
            .iter()
            .enumerate()
            .find_map(|(index, block)| block.offset_of(ptr).map(|offset| (index, offset)))
    }

    /// Whether `ptr` points into one of the pool's blocks
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.locate(ptr).is_some()
    }

    /// Whether `ptr` is a live large allocation of this pool
    pub fn is_large(&self, ptr: *const u8) -> bool {
        self.large.borrow().is_tracked(ptr)
    }

    /// Number of large-allocation records, freed slots included
    pub fn large_count(&self) -> usize {
        self.large.borrow().len()
    }

    /// Large-record identities (their pool addresses), head first
    pub fn large_nodes(&self) -> Vec<NonNull<u8>> {
        self.large.borrow().nodes()
    }

    /// Number of linked cleanup records
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.borrow().len()
    }

    /// Cleanup-record identities (their pool addresses), head first
    pub fn cleanup_nodes(&self) -> Vec<NonNull<u8>> {
        self.cleanups.borrow().nodes()
    }

    /// The active configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn cleanups(&self) -> Ref<'_, CleanupChain> {
        self.cleanups.borrow()
    }

    pub(crate) fn cleanups_mut(&self) -> RefMut<'_, CleanupChain> {
        self.cleanups.borrow_mut()
    }
}

impl<A: GlobalAlloc> Drop for Pool<A> {
    fn drop(&mut self) {
        let ran = self.cleanups.get_mut().run_all();

        let heap = &self.heap;
        for payload in self.large.get_mut().drain() {
            // SAFETY: every registry payload was allocated from self.heap
            // with its stored layout; the pool is going away.
            unsafe { heap.dealloc(payload.ptr.as_ptr(), payload.layout) };
        }

        let blocks = self.blocks.get_mut();
        let count = blocks.len();
        for block in blocks.drain(..) {
            // SAFETY: every block was allocated from self.heap; no
            // allocation outlives the pool.
            unsafe { block.release(heap) };
        }

        #[cfg(feature = "logging")]
        debug!(cleanups = ran, blocks = count, "region pool destroyed");
        #[cfg(not(feature = "logging"))]
        let _ = (ran, count);
    }
}

impl<A: GlobalAlloc> fmt::Debug for Pool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("max_small_size", &self.max)
            .field("blocks", &self.block_count())
            .field("current", &self.current.get())
            .field("large", &self.large_count())
            .field("cleanups", &self.cleanup_count())
            .finish()
    }
}
