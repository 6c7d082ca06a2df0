//! Test helpers: a counting global allocator and drop-tracked payloads.
//!
//! Counters are per thread, so tests running in parallel do not disturb
//! each other.

use alloc::sync::Arc;
use core::alloc::{GlobalAlloc, Layout};
use core::cell::Cell;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc::System;

// -----------------------------------------------------------------------------
// CountingAlloc

std::thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static DEALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static FAIL_NEXT: Cell<bool> = const { Cell::new(false) };
    static WATCHED: Cell<Option<Layout>> = const { Cell::new(None) };
    static WATCHED_ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static WATCHED_DEALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn is_watched(layout: Layout) -> bool {
    WATCHED
        .try_with(|watched| watched.get() == Some(layout))
        .unwrap_or(false)
}

struct CountingAlloc;

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

// SAFETY: forwards to `System`, only adding bookkeeping.
unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if FAIL_NEXT.try_with(|fail| fail.replace(false)).unwrap_or(false) {
            return ptr::null_mut();
        }
        let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        if is_watched(layout) {
            let _ = WATCHED_ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        }
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = DEALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        if is_watched(layout) {
            let _ = WATCHED_DEALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        }
        unsafe { System.dealloc(ptr, layout) }
    }
}

/// Successful allocations made by the current thread so far.
pub(crate) fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

/// Deallocations made by the current thread so far.
pub(crate) fn deallocations() -> usize {
    DEALLOCATIONS.with(Cell::get)
}

/// Starts counting, on the current thread, only the allocations and
/// deallocations whose layout equals `layout`. Resets both counts.
pub(crate) fn watch_layout(layout: Layout) {
    WATCHED.with(|watched| watched.set(Some(layout)));
    WATCHED_ALLOCATIONS.with(|n| n.set(0));
    WATCHED_DEALLOCATIONS.with(|n| n.set(0));
}

/// `(allocations, deallocations)` of the layout given to [`watch_layout`].
pub(crate) fn watched() -> (usize, usize) {
    (
        WATCHED_ALLOCATIONS.with(Cell::get),
        WATCHED_DEALLOCATIONS.with(Cell::get),
    )
}

/// Makes the next allocation on the current thread return null.
pub(crate) fn fail_next_allocation() {
    FAIL_NEXT.with(|fail| fail.set(true));
}

// -----------------------------------------------------------------------------
// Tracked

/// A payload counting how often it was dropped.
#[derive(Debug)]
pub(crate) struct Tracked {
    pub(crate) value: i32,
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    pub(crate) fn new(value: i32) -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let tracked = Self {
            value,
            drops: Arc::clone(&drops),
        };
        (tracked, drops)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
