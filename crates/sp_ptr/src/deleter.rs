use alloc::boxed::Box;
use core::ptr::NonNull;

// -----------------------------------------------------------------------------
// Deleter

/// Destroys a payload that was allocated outside of its control block.
///
/// A deleter is stored in the control block next to the payload pointer and
/// consumed when the last [`Shared`](crate::Shared) goes away. It may run on
/// any thread that happens to drop the last owner, hence the `Send` bound.
///
/// Any `FnOnce(NonNull<T>)` closure is a deleter:
///
/// ```
/// use core::ptr::NonNull;
/// use sp_ptr::Shared;
///
/// let raw = NonNull::from(Box::leak(Box::new(3u8)));
/// let deleter = |ptr: NonNull<u8>| drop(unsafe { Box::from_raw(ptr.as_ptr()) });
///
/// // SAFETY: `raw` came from a leaked box and `deleter` frees exactly that.
/// let shared = unsafe { Shared::from_raw_with(raw, deleter) };
/// assert_eq!(*shared, 3);
/// ```
pub trait Deleter<T: ?Sized>: Send + 'static {
    /// Destroys the payload behind `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was registered with, and no
    /// reference to the payload may be used afterwards.
    unsafe fn delete(self, ptr: NonNull<T>);
}

impl<T, F> Deleter<T> for F
where
    T: ?Sized,
    F: FnOnce(NonNull<T>) + Send + 'static,
{
    #[inline]
    unsafe fn delete(self, ptr: NonNull<T>) {
        self(ptr);
    }
}

// -----------------------------------------------------------------------------
// DefaultDelete

/// Frees a payload that came from [`Box::into_raw`] or [`Box::leak`].
///
/// This is the deleter used by [`Shared::from_box`](crate::Shared::from_box).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(self, ptr: NonNull<T>) {
        // SAFETY: the caller guarantees `ptr` is the leaked box.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}
