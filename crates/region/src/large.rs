//! Registry of individually tracked large allocations
//!
//! Records are kept head-first: the most recently created record is
//! inspected first. Freeing a payload keeps its record as an empty slot so
//! a later large allocation can reuse it without carving a new record.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::types::LARGE_REUSE_SCAN;

/// A heap payload owned by the registry
#[derive(Debug)]
pub(crate) struct LargeAlloc {
    pub(crate) ptr: NonNull<u8>,
    pub(crate) layout: Layout,
}

impl LargeAlloc {
    pub(crate) fn new(ptr: NonNull<u8>, layout: Layout) -> Self {
        Self { ptr, layout }
    }
}

/// One registry slot
#[derive(Debug)]
struct LargeRecord {
    /// Address of the record's footprint in the pool; its identity
    node: NonNull<u8>,
    payload: Option<LargeAlloc>,
}

/// Head-ordered list of large-allocation slots
#[derive(Debug, Default)]
pub(crate) struct LargeRegistry {
    // Stored tail-first so head insertion is a push.
    records: Vec<LargeRecord>,
}

impl LargeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attaches `payload` to an empty slot among the first
    /// [`LARGE_REUSE_SCAN`] records, handing it back if none is free.
    pub(crate) fn attach_to_free_slot(&mut self, payload: LargeAlloc) -> Result<(), LargeAlloc> {
        let slot = self
            .records
            .iter_mut()
            .rev()
            .take(LARGE_REUSE_SCAN)
            .find(|record| record.payload.is_none());

        match slot {
            Some(record) => {
                record.payload = Some(payload);
                Ok(())
            }
            None => Err(payload),
        }
    }

    /// Inserts a new record at the head
    pub(crate) fn push_front(&mut self, node: NonNull<u8>, payload: LargeAlloc) {
        self.records.push(LargeRecord {
            node,
            payload: Some(payload),
        });
    }

    /// Detaches the payload starting at `ptr`, leaving its slot empty
    pub(crate) fn take(&mut self, ptr: *const u8) -> Option<LargeAlloc> {
        self.records
            .iter_mut()
            .rev()
            .find(|record| {
                record
                    .payload
                    .as_ref()
                    .is_some_and(|payload| payload.ptr.as_ptr().cast_const() == ptr)
            })
            .and_then(|record| record.payload.take())
    }

    /// Empties the registry, yielding every payload still attached
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = LargeAlloc> + '_ {
        self.records.drain(..).rev().filter_map(|record| record.payload)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Record identities, head first
    pub(crate) fn nodes(&self) -> Vec<NonNull<u8>> {
        self.records.iter().rev().map(|record| record.node).collect()
    }

    /// Whether `ptr` is the start of a live payload
    pub(crate) fn is_tracked(&self, ptr: *const u8) -> bool {
        self.records.iter().any(|record| {
            record
                .payload
                .as_ref()
                .is_some_and(|payload| payload.ptr.as_ptr().cast_const() == ptr)
        })
    }
}
