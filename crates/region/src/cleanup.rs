//! Deferred cleanup handlers tied to a pool's lifetime
//!
//! A cleanup record pairs a handler with an opaque data pointer. Records are
//! head-inserted, so handlers run most-recently-registered first. Reset
//! only runs records that have both a handler and data and unlinks every
//! record left without a handler; teardown runs every record that still
//! has one.

use std::alloc::{GlobalAlloc, System};
use std::mem;
use std::ptr::NonNull;

use crate::error::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::types::alignment::WORD_ALIGN;

/// Handler invoked with the record's data pointer
pub type CleanupHandler = Box<dyn FnOnce(Option<NonNull<u8>>)>;

struct CleanupRecord {
    /// Address of the record's footprint in the pool; its identity
    node: NonNull<u8>,
    handler: Option<CleanupHandler>,
    data: Option<NonNull<u8>>,
}

/// Head-ordered chain of cleanup records
#[derive(Default)]
pub(crate) struct CleanupChain {
    // Stored tail-first so head insertion is a push.
    records: Vec<CleanupRecord>,
}

impl CleanupChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a record without a handler at the head, returning its slot
    pub(crate) fn push_front(&mut self, node: NonNull<u8>, data: Option<NonNull<u8>>) -> usize {
        self.records.push(CleanupRecord {
            node,
            handler: None,
            data,
        });
        self.records.len() - 1
    }

    pub(crate) fn data(&self, slot: usize) -> Option<NonNull<u8>> {
        self.records[slot].data
    }

    pub(crate) fn set_data(&mut self, slot: usize, data: Option<NonNull<u8>>) {
        self.records[slot].data = data;
    }

    pub(crate) fn set_handler(&mut self, slot: usize, handler: CleanupHandler) {
        self.records[slot].handler = Some(handler);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Record identities, head first
    pub(crate) fn nodes(&self) -> Vec<NonNull<u8>> {
        self.records.iter().rev().map(|record| record.node).collect()
    }

    /// Runs every record holding both a handler and data, then unlinks
    /// every record left without a handler.
    ///
    /// Only records still carrying a handler (set without data) survive;
    /// the rest can never run again once their registration token is gone.
    pub(crate) fn run_due(&mut self) -> usize {
        let mut ran = 0;
        for record in self.records.iter_mut().rev() {
            if record.handler.is_some() && record.data.is_some() {
                let data = record.data.take();
                if let Some(handler) = record.handler.take() {
                    handler(data);
                    ran += 1;
                }
            }
        }
        self.records.retain(|record| record.handler.is_some());
        ran
    }

    /// Runs every record that still has a handler, data or not, and
    /// empties the chain.
    pub(crate) fn run_all(&mut self) -> usize {
        let mut ran = 0;
        for record in mem::take(&mut self.records).into_iter().rev() {
            if let Some(handler) = record.handler {
                handler(record.data);
                ran += 1;
            }
        }
        ran
    }
}

/// Registration token returned by [`Pool::register_cleanup`]
///
/// The record is already linked into the chain; the caller finishes it by
/// filling the data blob and setting a handler. A record whose handler is
/// never set never runs and is unlinked at the next reset.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use nebula_region::Pool;
///
/// let pool = Pool::new(1024)?;
/// let closed = Rc::new(Cell::new(false));
///
/// let flag = Rc::clone(&closed);
/// let mut cleanup = pool.register_cleanup(size_of::<u64>())?;
/// cleanup.write(7u64)?;
/// cleanup.set_handler(move |_data| flag.set(true));
///
/// drop(pool);
/// assert!(closed.get());
/// # Ok::<(), nebula_region::PoolError>(())
/// ```
pub struct Cleanup<'p, A: GlobalAlloc = System> {
    pool: &'p Pool<A>,
    slot: usize,
    blob: Option<NonNull<u8>>,
    capacity: usize,
}

impl<'p, A: GlobalAlloc> Cleanup<'p, A> {
    pub(crate) fn new(
        pool: &'p Pool<A>,
        slot: usize,
        blob: Option<NonNull<u8>>,
        capacity: usize,
    ) -> Self {
        Self {
            pool,
            slot,
            blob,
            capacity,
        }
    }

    /// Current data pointer passed to the handler
    pub fn data(&self) -> Option<NonNull<u8>> {
        self.pool.cleanups().data(self.slot)
    }

    /// Size of the blob reserved in the pool at registration
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points the record at other data, e.g. a buffer owned outside the pool
    ///
    /// The blob reserved at registration stays in the pool but is no longer
    /// handed to the handler.
    pub fn set_data(&mut self, data: Option<NonNull<u8>>) {
        self.pool.cleanups_mut().set_data(self.slot, data);
    }

    /// Sets the handler run at reset (when data is set) or teardown
    pub fn set_handler<F>(&mut self, handler: F)
    where
        F: FnOnce(Option<NonNull<u8>>) + 'static,
    {
        self.pool.cleanups_mut().set_handler(self.slot, Box::new(handler));
    }

    /// Moves `value` into the blob reserved at registration
    ///
    /// Fails when no blob was reserved, the blob is too small, or `T` needs
    /// more than word alignment. A value written twice is overwritten
    /// without being dropped.
    pub fn write<T>(&mut self, value: T) -> PoolResult<NonNull<T>> {
        let Some(blob) = self.blob else {
            return Err(PoolError::invalid_layout("cleanup record has no data blob"));
        };
        if mem::size_of::<T>() > self.capacity {
            return Err(PoolError::invalid_layout("value does not fit the cleanup blob"));
        }
        if mem::align_of::<T>() > WORD_ALIGN {
            return Err(PoolError::unsupported_alignment(mem::align_of::<T>(), WORD_ALIGN));
        }

        let target = blob.cast::<T>();
        // SAFETY: Moving the value into the blob.
        // - blob was carved for this record with `capacity` bytes, word aligned
        // - size and alignment of T were checked above
        // - the pool keeps the blob alive until reset or teardown
        unsafe { target.as_ptr().write(value) };
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn fake(addr: usize) -> NonNull<u8> {
        NonNull::new(addr as *mut u8).unwrap()
    }

    fn logging_handler(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> CleanupHandler {
        let log = Rc::clone(log);
        Box::new(move |_| log.borrow_mut().push(name))
    }

    #[test]
    fn run_all_is_most_recent_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = CleanupChain::new();

        let first = chain.push_front(fake(0x10), None);
        chain.set_handler(first, logging_handler(&log, "h1"));
        let second = chain.push_front(fake(0x20), None);
        chain.set_handler(second, logging_handler(&log, "h2"));

        assert_eq!(chain.run_all(), 2);
        assert_eq!(*log.borrow(), vec!["h2", "h1"]);
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn run_due_requires_handler_and_data() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = CleanupChain::new();

        let with_data = chain.push_front(fake(0x10), Some(fake(0x100)));
        chain.set_handler(with_data, logging_handler(&log, "data"));
        let without_data = chain.push_front(fake(0x20), None);
        chain.set_handler(without_data, logging_handler(&log, "bare"));
        let _no_handler = chain.push_front(fake(0x30), Some(fake(0x300)));

        assert_eq!(chain.run_due(), 1);
        assert_eq!(*log.borrow(), vec!["data"]);
        // only the handler-without-data record stays linked
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.nodes(), vec![fake(0x20)]);
        assert_eq!(chain.data(0), None);

        // second pass finds nothing new; teardown runs the data-less record
        assert_eq!(chain.run_due(), 0);
        assert_eq!(chain.run_all(), 1);
        assert_eq!(*log.borrow(), vec!["data", "bare"]);
    }

    #[test]
    fn nodes_are_head_first() {
        let mut chain = CleanupChain::new();
        chain.push_front(fake(0x10), None);
        chain.push_front(fake(0x20), None);
        assert_eq!(chain.nodes(), vec![fake(0x20), fake(0x10)]);
    }
}
