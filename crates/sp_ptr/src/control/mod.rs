//! Control blocks: the shared bookkeeping behind every handle.
//!
//! A control block starts with a [`BlockHeader`] holding two counters, both
//! initialised to `1`:
//!
//! - `strong` counts owning handles. When it reaches zero the payload is
//!   destroyed and the strong group releases the one weak reference it holds
//!   collectively.
//! - `weak` counts observing handles plus that implicit reference. When it
//!   reaches zero the block frees itself.
//!
//! The payload therefore never outlives its block, but may die long before it.
//!
//! How the payload is destroyed depends on the concrete block:
//! [`SeparateBlock`] runs a user supplied deleter on an external pointer,
//! [`FusedBlock`] stores the payload inline and drops it in place. The header
//! reaches the concrete block through a [`BlockVTable`].

use alloc::alloc as malloc;
use core::alloc::Layout;
use core::ptr::NonNull;

use sp_os::sync::atomic::{AtomicUsize, Ordering, fence};

use crate::AllocError;
use crate::cfg;

mod fused;
mod separate;

pub(crate) use fused::FusedBlock;
pub(crate) use separate::SeparateBlock;

/// Counts above this abort the process instead of risking a wrap to zero.
const MAX_REFCOUNT: usize = isize::MAX as usize;

// -----------------------------------------------------------------------------
// Header

/// Type-erased operations of a concrete control block.
pub(crate) struct BlockVTable {
    /// Destroys the payload. Runs exactly once, when `strong` hits zero.
    delete_data: unsafe fn(NonNull<BlockHeader>),
    /// Frees the block itself. Runs exactly once, when `weak` hits zero.
    deallocate: unsafe fn(NonNull<BlockHeader>),
}

/// Counters shared by every concrete block, always its first field.
#[repr(C)]
pub(crate) struct BlockHeader {
    strong: AtomicUsize,
    weak: AtomicUsize,
    vtable: &'static BlockVTable,
}

impl BlockHeader {
    #[inline]
    const fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            vtable,
        }
    }
}

// -----------------------------------------------------------------------------
// ControlBlock

/// A concrete control block.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a [`BlockHeader`] as their first
/// field, so that a pointer to the block is also a pointer to its header.
pub(crate) unsafe trait ControlBlock: Sized {
    const VTABLE: &'static BlockVTable = &BlockVTable {
        delete_data: delete_data_erased::<Self>,
        deallocate: deallocate::<Self>,
    };

    /// Destroys the payload without freeing the block.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block whose payload has not been destroyed.
    unsafe fn delete_data(this: NonNull<Self>);
}

unsafe fn delete_data_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    // SAFETY: `ControlBlock` guarantees the header is the first field.
    unsafe { B::delete_data(header.cast::<B>()) }
}

unsafe fn deallocate<B: ControlBlock>(header: NonNull<BlockHeader>) {
    let block = header.cast::<B>();
    // SAFETY: the block was allocated by `allocate::<B>` and nothing refers to
    // it any more.
    unsafe {
        block.drop_in_place();
        malloc::dealloc(block.as_ptr().cast::<u8>(), Layout::new::<B>());
    }
}

/// Allocates uninitialised memory for a block of type `B`.
fn allocate<B: ControlBlock>() -> Result<NonNull<B>, AllocError> {
    // Never zero-sized: every block embeds a header.
    let layout = Layout::new::<B>();

    // SAFETY: `layout` has a non-zero size.
    match NonNull::new(unsafe { malloc::alloc(layout) }) {
        Some(ptr) => Ok(ptr.cast::<B>()),
        None => {
            log::warn!(
                "control block allocation of {} bytes failed",
                layout.size()
            );
            Err(AllocError::new(layout))
        }
    }
}

#[cold]
#[inline(never)]
fn refcount_overflow() -> ! {
    log::error!("reference count overflowed, aborting");
    sp_os::process::abort("reference count overflow")
}

// -----------------------------------------------------------------------------
// BlockRef

/// A pointer to the header of a live control block.
///
/// Only handles that own one strong or weak reference hold a `BlockRef`, which
/// keeps the header readable for as long as they do.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockRef(NonNull<BlockHeader>);

impl BlockRef {
    /// Wraps a freshly initialised block, adopting its initial references.
    ///
    /// # Safety
    ///
    /// `block` must be fully initialised.
    #[inline]
    unsafe fn from_block<B: ControlBlock>(block: NonNull<B>) -> Self {
        Self(block.cast::<BlockHeader>())
    }

    #[inline(always)]
    fn header(&self) -> &BlockHeader {
        // SAFETY: the holder of a `BlockRef` owns a reference to the block.
        unsafe { self.0.as_ref() }
    }

    /// Address of the block, identifying the ownership group.
    #[inline]
    pub(crate) fn addr(self) -> *const () {
        self.0.as_ptr().cast_const().cast::<()>()
    }

    /// Number of owning handles.
    #[inline]
    pub(crate) fn strong_refs(self) -> usize {
        self.header().strong.load(Ordering::Relaxed)
    }

    /// Number of observing handles, plus one while any owner is alive.
    #[inline]
    pub(crate) fn weak_refs(self) -> usize {
        self.header().weak.load(Ordering::Relaxed)
    }

    /// Adds an owning reference. The caller must already hold one.
    #[inline]
    pub(crate) fn add_strong_ref(self) {
        // A new reference can only be formed from an existing one, which
        // orders it already.
        let old = self.header().strong.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            refcount_overflow();
        }
    }

    /// Adds an owning reference unless the payload is already gone.
    ///
    /// The caller must hold at least a weak reference.
    pub(crate) fn try_add_strong_ref(self) -> bool {
        let strong = &self.header().strong;
        let mut current = strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                refcount_overflow();
            }
            match strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Adds an observing reference. The caller must already hold a reference.
    #[inline]
    pub(crate) fn add_weak_ref(self) {
        let old = self.header().weak.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            refcount_overflow();
        }
    }

    /// Gives up an owning reference.
    ///
    /// The last one destroys the payload and then releases the implicit weak
    /// reference of the strong group, in that order.
    ///
    /// # Safety
    ///
    /// The caller must own the strong reference being released and must not
    /// use this `BlockRef` afterwards.
    pub(crate) unsafe fn release_strong_ref(self) {
        let old = self.header().strong.fetch_sub(1, Ordering::Release);
        cfg::debug! {
            assert!(old != 0, "strong count released below zero");
        }
        if old != 1 {
            return;
        }

        // Synchronise with every earlier release before touching the payload.
        fence(Ordering::Acquire);

        let delete_data = self.header().vtable.delete_data;
        // SAFETY: the strong count just reached zero, so this is the only call
        // and no owner can observe the payload any more.
        unsafe {
            delete_data(self.0);
            self.release_weak_ref();
        }
    }

    /// Gives up an observing reference, freeing the block on the last one.
    ///
    /// # Safety
    ///
    /// The caller must own the weak reference being released and must not
    /// use this `BlockRef` afterwards.
    pub(crate) unsafe fn release_weak_ref(self) {
        let old = self.header().weak.fetch_sub(1, Ordering::Release);
        cfg::debug! {
            assert!(old != 0, "weak count released below zero");
        }
        if old != 1 {
            return;
        }

        fence(Ordering::Acquire);

        let deallocate = self.header().vtable.deallocate;
        // SAFETY: the weak count just reached zero, so nothing else refers to
        // the block.
        unsafe { deallocate(self.0) }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use core::alloc::Layout;
    use core::ptr::NonNull;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::{FusedBlock, SeparateBlock};
    use crate::DefaultDelete;
    use crate::testing::{self, Tracked};

    #[test]
    fn fresh_block_counts() {
        let (block, _) = FusedBlock::try_new_with(|| 7u32).unwrap();
        assert_eq!(block.strong_refs(), 1);
        assert_eq!(block.weak_refs(), 1);
        unsafe { block.release_strong_ref() };
    }

    #[test]
    fn strong_release_destroys_then_frees() {
        let (payload, drops) = Tracked::new(1);
        let freed = testing::deallocations();
        let (block, _) = FusedBlock::try_new_with(move || payload).unwrap();

        block.add_strong_ref();
        unsafe { block.release_strong_ref() };
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        block.add_weak_ref();
        unsafe { block.release_strong_ref() };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(block.strong_refs(), 0);
        assert_eq!(block.weak_refs(), 1);
        assert_eq!(testing::deallocations(), freed);

        unsafe { block.release_weak_ref() };
        assert_eq!(testing::deallocations(), freed + 1);
    }

    #[test]
    fn try_add_strong_fails_once_dead() {
        let (block, _) = FusedBlock::try_new_with(|| 0u8).unwrap();
        block.add_weak_ref();
        assert!(block.try_add_strong_ref());
        unsafe {
            block.release_strong_ref();
            block.release_strong_ref();
        }
        assert!(!block.try_add_strong_ref());
        assert_eq!(block.strong_refs(), 0);
        unsafe { block.release_weak_ref() };
    }

    #[test]
    fn separate_block_runs_deleter_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let data = NonNull::from(Box::leak(Box::new(5i32)));

        let block = SeparateBlock::try_new(data, move |ptr: NonNull<i32>| {
            seen.fetch_add(1, Ordering::SeqCst);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        })
        .unwrap();

        let freed = testing::deallocations();
        unsafe { block.release_strong_ref() };
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The boxed payload and the block.
        assert_eq!(testing::deallocations(), freed + 2);
    }

    #[test]
    fn separate_block_freed_after_last_weak() {
        testing::watch_layout(Layout::new::<SeparateBlock<Tracked, DefaultDelete>>());
        let (payload, drops) = Tracked::new(3);
        let data = NonNull::from(Box::leak(Box::new(payload)));

        let block = SeparateBlock::try_new(data, DefaultDelete).unwrap();
        assert_eq!(testing::watched(), (1, 0));

        block.add_weak_ref();
        block.add_weak_ref();
        unsafe { block.release_strong_ref() };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(testing::watched(), (1, 0));

        unsafe { block.release_weak_ref() };
        assert_eq!(testing::watched(), (1, 0));

        unsafe { block.release_weak_ref() };
        assert_eq!(testing::watched(), (1, 1));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
