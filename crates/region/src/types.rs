//! Common types and constants for region pools

use core::mem::size_of;

use crate::utils::align_up;

/// Memory alignment requirements
pub mod alignment {
    /// Alignment of word-aligned small allocations (platform word)
    pub const WORD_ALIGN: usize = core::mem::size_of::<usize>();

    /// Alignment of every block and large payload obtained from the heap
    pub const POOL_ALIGNMENT: usize = 16;

    /// Page size (platform dependent, this is common default)
    pub const PAGE_SIZE: usize = 4096;
}

/// Memory size constants
pub mod size {
    /// 1 Kilobyte
    pub const KB: usize = 1024;

    /// Default pool (and block) size
    pub const DEFAULT_POOL_SIZE: usize = 16 * KB;

    /// Hard cap on the small-allocation threshold: never more than a page.
    pub const MAX_ALLOC_FROM_POOL: usize = super::alignment::PAGE_SIZE - 1;
}

const WORD: usize = size_of::<usize>();

/// Bytes reserved at the front of every block created by growth
/// (cursor, end, next link, failure counter).
pub const BLOCK_HEADER_SIZE: usize = 4 * WORD;

/// Bytes reserved at the front of the first block: the block header plus
/// threshold, current cursor, registry head and cleanup head.
pub const POOL_HEADER_SIZE: usize = BLOCK_HEADER_SIZE + 4 * WORD;

/// Pool footprint of one large-allocation record (next link, payload).
pub const LARGE_RECORD_SIZE: usize = 2 * WORD;

/// Pool footprint of one cleanup record (handler, data, next link).
pub const CLEANUP_RECORD_SIZE: usize = 3 * WORD;

/// Smallest pool: the full header plus two large records, rounded to
/// [`alignment::POOL_ALIGNMENT`].
pub const MIN_POOL_SIZE: usize = align_up(
    POOL_HEADER_SIZE + 2 * LARGE_RECORD_SIZE,
    alignment::POOL_ALIGNMENT,
);

/// Number of registry records inspected for a freed slot before a new
/// record is created.
pub const LARGE_REUSE_SCAN: usize = 4;

/// Failure count past which a block is skipped by the current cursor.
pub const MAX_FAILED: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn header_sizes_on_64_bit() {
        assert_eq!(BLOCK_HEADER_SIZE, 32);
        assert_eq!(POOL_HEADER_SIZE, 64);
        assert_eq!(LARGE_RECORD_SIZE, 16);
        assert_eq!(CLEANUP_RECORD_SIZE, 24);
        assert_eq!(MIN_POOL_SIZE, 96);
    }

    #[test]
    fn min_pool_holds_header_and_two_records() {
        assert!(MIN_POOL_SIZE >= POOL_HEADER_SIZE + 2 * LARGE_RECORD_SIZE);
        assert_eq!(MIN_POOL_SIZE % alignment::POOL_ALIGNMENT, 0);
    }
}
