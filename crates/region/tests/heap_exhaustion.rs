//! Heap exhaustion paths, driven by a backing allocator with a budget

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::rc::Rc;

use nebula_region::{Pool, PoolConfig, PoolError};

/// Serves a fixed number of heap requests, then reports exhaustion
#[derive(Clone)]
struct BudgetHeap {
    remaining: Rc<Cell<usize>>,
    live: Rc<Cell<isize>>,
}

impl BudgetHeap {
    fn new(requests: usize) -> Self {
        Self {
            remaining: Rc::new(Cell::new(requests)),
            live: Rc::new(Cell::new(0)),
        }
    }

    fn refill(&self, requests: usize) {
        self.remaining.set(requests);
    }

    fn live(&self) -> isize {
        self.live.get()
    }
}

unsafe impl GlobalAlloc for BudgetHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if self.remaining.get() == 0 {
            return std::ptr::null_mut();
        }
        self.remaining.set(self.remaining.get() - 1);
        self.live.set(self.live.get() + 1);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.live.set(self.live.get() - 1);
        unsafe { System.dealloc(ptr, layout) };
    }
}

#[test]
fn creation_failure_yields_no_pool() {
    let heap = BudgetHeap::new(0);
    let err = Pool::with_allocator(PoolConfig::new(1024), heap.clone()).unwrap_err();
    assert!(matches!(err, PoolError::AllocationFailed { size: 1024, .. }));
    assert!(err.is_retryable());
    assert_eq!(heap.live(), 0);
}

#[test]
fn failed_growth_leaves_pool_usable() {
    let heap = BudgetHeap::new(1);
    let pool = Pool::with_allocator(PoolConfig::new(256), heap.clone()).unwrap();

    let _ = pool.alloc(128).unwrap();
    assert!(pool.alloc(128).is_err());
    assert_eq!(pool.block_count(), 1);

    // a request that still fits the first block succeeds
    let p = pool.alloc(32).unwrap();
    assert_eq!(pool.locate(p.as_ptr()).map(|(block, _)| block), Some(0));

    heap.refill(1);
    let _ = pool.alloc(128).unwrap();
    assert_eq!(pool.block_count(), 2);
}

#[test]
fn failed_large_payload_is_reported() {
    let heap = BudgetHeap::new(1);
    let pool = Pool::with_allocator(PoolConfig::new(256), heap.clone()).unwrap();

    assert!(pool.alloc(4096).is_err());
    assert_eq!(pool.large_count(), 0);
    assert_eq!(heap.live(), 1);
}

#[test]
fn record_failure_releases_payload() {
    let heap = BudgetHeap::new(2);
    let pool = Pool::with_allocator(PoolConfig::new(128), heap.clone()).unwrap();

    // fill the only block so the record footprint needs growth
    let _ = pool.alloc(64).unwrap();
    assert_eq!(heap.live(), 1);

    // payload succeeds (second request), growth for the record fails
    assert!(pool.alloc(512).is_err());
    assert_eq!(pool.large_count(), 0);
    assert_eq!(heap.live(), 1);
}

#[test]
fn teardown_returns_everything() {
    let heap = BudgetHeap::new(usize::MAX);
    {
        let mut pool = Pool::with_allocator(PoolConfig::new(128), heap.clone()).unwrap();
        for _ in 0..10 {
            let _ = pool.alloc(64).unwrap();
        }
        let freed = pool.alloc(1000).unwrap();
        let _kept = pool.alloc(1000).unwrap();
        assert!(pool.free_large(freed));

        pool.reset();
        let _ = pool.alloc(2000).unwrap();
        assert!(heap.live() > 0);
    }
    assert_eq!(heap.live(), 0);
}
