use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

use crate::Shared;
use crate::shared::RawHandle;

// -----------------------------------------------------------------------------
// Weak

/// A non-owning observer of a [`Shared`] payload.
///
/// A `Weak` keeps the control block alive, never the payload. The only way to
/// reach the value is [`lock`](Self::lock), which checks liveness at the
/// moment of the call: an earlier successful lock says nothing about a later
/// one.
///
/// # Examples
///
/// ```
/// use sp_ptr::{Weak, make_shared};
///
/// let owner = make_shared(String::from("alive"));
/// let weak = Weak::from(&owner);
/// assert_eq!(weak.use_count(), 1);
///
/// if let Some(value) = weak.upgrade() {
///     assert_eq!(*value, "alive");
/// }
///
/// drop(owner);
/// assert!(weak.expired());
/// assert!(weak.lock().is_null());
/// ```
///
/// To observe a part of the payload, or the payload as a trait object, use
/// [`project`](Self::project) or downgrade a projected owner:
///
/// ```
/// use sp_ptr::make_shared;
///
/// let owner = make_shared((7u8, String::from("name")));
/// let name = owner.project(|p| &p.1).downgrade();
/// let id = owner.downgrade().project(|p| &p.0);
///
/// assert_eq!(*name.lock(), "name");
/// assert_eq!(*id.lock(), 7);
/// drop(owner);
/// assert!(name.expired() && id.expired());
/// ```
pub struct Weak<T: ?Sized> {
    inner: Option<RawHandle<T>>,
    _marker: PhantomData<*const T>,
}

// SAFETY: a `Weak` only turns into a `Shared` of the same type, which has the
// same requirements.
unsafe impl<T: ?Sized + Send + Sync> Send for Weak<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Weak<T> {}

impl<T: ?Sized> Drop for Weak<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner {
            // SAFETY: this handle owns one weak reference.
            unsafe { inner.block.release_weak_ref() };
        }
    }
}

impl<T: ?Sized> Weak<T> {
    /// Creates a `Weak` that observes nothing. [`lock`](Self::lock) always
    /// returns a null [`Shared`].
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: None,
            _marker: PhantomData,
        }
    }

    /// Adds a weak reference on `inner.block` and wraps it.
    #[inline]
    fn observe(inner: Option<RawHandle<T>>) -> Self {
        if let Some(inner) = inner {
            inner.block.add_weak_ref();
        }
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Tries to obtain shared ownership of the observed payload.
    ///
    /// Returns a null [`Shared`] if nothing is observed or every owner is
    /// already gone. The result points at the same address as the handle
    /// this `Weak` was created from.
    pub fn lock(&self) -> Shared<T> {
        match self.inner {
            Some(inner) if inner.block.try_add_strong_ref() => {
                // SAFETY: the strong reference was just added, and a live
                // payload keeps `ptr` valid.
                unsafe { Shared::from_inner(inner) }
            }
            _ => Shared::null(),
        }
    }

    /// Like [`lock`](Self::lock), but returns `None` instead of a null handle.
    #[inline]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let shared = self.lock();
        (!shared.is_null()).then_some(shared)
    }

    /// Observes a part of the payload, sharing the block of `self`.
    ///
    /// The payload is locked for the duration of the call so that `f` can
    /// borrow it. If it is already gone the result is empty.
    pub fn project<U, F>(&self, f: F) -> Weak<U>
    where
        T: Send + Sync + 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        self.lock().project(f).downgrade()
    }

    /// Observes the same block but exposes `ptr`.
    ///
    /// An empty `self` gives an empty `Weak`.
    ///
    /// # Safety
    ///
    /// Same contract as [`Shared::alias`]: `ptr` must be valid for shared
    /// reads while the observed payload is alive.
    pub unsafe fn alias<U: ?Sized>(&self, ptr: NonNull<U>) -> Weak<U> {
        Weak::observe(self.inner.map(|inner| RawHandle {
            ptr,
            block: inner.block,
        }))
    }

    /// Number of owners of the observed payload, `0` once it is gone.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.inner.map_or(0, |inner| inner.block.strong_refs())
    }

    /// Returns `true` if [`lock`](Self::lock) would currently fail.
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Returns `true` if both observe the same control block, or nothing.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &Weak<U>) -> bool {
        self.inner.map(|inner| inner.block) == other.inner.map(|inner| inner.block)
    }

    /// Stops observing, leaving `self` empty.
    #[inline]
    pub fn reset(&mut self) {
        drop(mem::take(self));
    }

    /// Exchanges the contents of two handles. Counts are untouched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.inner, &mut other.inner);
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    #[inline]
    fn from(shared: &Shared<T>) -> Self {
        Self::observe(shared.inner())
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self::observe(self.inner)
    }
}

impl<T: ?Sized> Default for Weak<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}
