//! Single-allocation construction.
//!
//! These functions place the payload inside its control block, so one heap
//! allocation serves both. This is the preferred way to create a [`Shared`]
//! whenever the value is built at the call site.

use alloc::alloc::handle_alloc_error;

use crate::control::FusedBlock;
use crate::shared::RawHandle;
use crate::{AllocError, Shared};

/// Allocates a control block holding `value` and returns its first owner.
///
/// # Examples
///
/// ```
/// use sp_ptr::make_shared;
///
/// let v = make_shared(vec![1, 2, 3]);
/// assert_eq!(v.len(), 3);
/// assert_eq!(v.use_count(), 1);
/// ```
#[inline]
pub fn make_shared<T>(value: T) -> Shared<T> {
    make_shared_with(move || value)
}

/// Allocates a control block and constructs the payload in it with `init`.
///
/// `init` runs only once the allocation succeeded. If it panics, the block is
/// freed and the panic continues.
pub fn make_shared_with<T, F>(init: F) -> Shared<T>
where
    F: FnOnce() -> T,
{
    match try_make_shared_with(init) {
        Ok(shared) => shared,
        Err(err) => handle_alloc_error(err.layout()),
    }
}

/// Fallible version of [`make_shared`]. On failure `value` is dropped.
#[inline]
pub fn try_make_shared<T>(value: T) -> Result<Shared<T>, AllocError> {
    try_make_shared_with(move || value)
}

/// Fallible version of [`make_shared_with`]. On failure `init` is not run.
pub fn try_make_shared_with<T, F>(init: F) -> Result<Shared<T>, AllocError>
where
    F: FnOnce() -> T,
{
    let (block, ptr) = FusedBlock::try_new_with(init)?;
    // SAFETY: a fresh block starts with one strong reference, and `ptr` is its
    // embedded payload.
    Ok(unsafe { Shared::from_inner(RawHandle { ptr, block }) })
}

impl<T> Shared<T> {
    /// Same as [`make_shared`].
    #[inline]
    pub fn new(value: T) -> Self {
        make_shared(value)
    }

    /// Same as [`make_shared_with`].
    #[inline]
    pub fn new_with<F: FnOnce() -> T>(init: F) -> Self {
        make_shared_with(init)
    }

    /// Same as [`try_make_shared`].
    #[inline]
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        try_make_shared(value)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use core::panic::AssertUnwindSafe;
    use core::sync::atomic::Ordering;
    use std::panic;

    use super::{make_shared, make_shared_with, try_make_shared};
    use crate::Shared;
    use crate::testing::{self, Tracked};

    #[test]
    fn single_allocation() {
        let allocated = testing::allocations();
        let shared = make_shared(7u64);
        assert_eq!(testing::allocations() - allocated, 1);
        assert_eq!(*shared, 7);
        assert_eq!(shared.use_count(), 1);
    }

    #[test]
    fn payload_is_the_constructed_value() {
        let shared = make_shared_with(|| String::from("in place"));
        assert_eq!(shared.as_str(), "in place");

        let via_new = Shared::new_with(|| 3 * 14);
        assert_eq!(*via_new, 42);
    }

    #[test]
    fn payload_dropped_once() {
        let (payload, drops) = Tracked::new(5);
        let a = Shared::new(payload);
        let b = a.clone();
        drop(a);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_allocation_drops_value() {
        let (payload, drops) = Tracked::new(6);
        testing::fail_next_allocation();
        let result = try_make_shared(payload);
        assert!(result.is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let retry = Shared::try_new(1u8).unwrap();
        assert_eq!(*retry, 1);
    }

    #[test]
    fn init_panic_is_forwarded() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            make_shared_with::<u32, _>(|| panic!("no value"))
        }));
        assert!(result.is_err());
    }

    #[test]
    fn zero_sized_payload() {
        let unit = make_shared(());
        let other = unit.clone();
        assert_eq!(other.use_count(), 2);
        assert!(unit.get().is_some());
    }
}
