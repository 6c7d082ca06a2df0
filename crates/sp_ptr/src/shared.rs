use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::control::{BlockRef, SeparateBlock};
use crate::{AllocError, DefaultDelete, Deleter, Weak};

// -----------------------------------------------------------------------------
// RawHandle

/// The (payload pointer, control block) pair stored by both handle kinds.
///
/// The pointer is what gets dereferenced, the block is what gets counted.
/// They need not agree: aliasing handles point into a payload they do not own
/// directly.
pub(crate) struct RawHandle<T: ?Sized> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: BlockRef,
}

impl<T: ?Sized> Clone for RawHandle<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for RawHandle<T> {}

impl<T: ?Sized> RawHandle<T> {
    /// Thin address of the payload pointer.
    #[inline(always)]
    pub(crate) fn addr(self) -> *const () {
        self.ptr.as_ptr().cast_const().cast::<()>()
    }
}

// -----------------------------------------------------------------------------
// Shared

/// An owning, reference-counted handle.
///
/// Every `Shared` is either null or holds one strong reference on a control
/// block together with a pointer to the value it exposes. Cloning adds a
/// strong reference, dropping releases it; the last release destroys the
/// payload. [`Weak`] handles observe the same block without keeping the
/// payload alive.
///
/// A handle built with [`alias`](Self::alias), [`project`](Self::project) or
/// [`map`](Self::map) shares the block of its source while pointing somewhere
/// else, typically into the payload.
///
/// Equality compares the exposed pointers only, never the control blocks; use
/// [`owner_eq`](Self::owner_eq) for the latter.
///
/// # Examples
///
/// ```
/// use sp_ptr::make_shared;
///
/// let a = make_shared(42);
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
///
/// let w = b.downgrade();
/// drop(a);
/// assert_eq!(*w.lock(), 42);
///
/// drop(b);
/// assert!(w.lock().is_null());
/// ```
pub struct Shared<T: ?Sized> {
    inner: Option<RawHandle<T>>,
    _marker: PhantomData<T>,
}

// SAFETY: the payload may be dropped on, and read from, any thread holding a
// handle, exactly like `Arc<T>`. Handles exposing a different type than their
// block owns can only be built from owners that are `Send + Sync` themselves,
// or through an `unsafe` constructor.
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T> {}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner {
            // SAFETY: this handle owns one strong reference.
            unsafe { inner.block.release_strong_ref() };
        }
    }
}

impl<T: ?Sized> Shared<T> {
    /// Creates a null handle without a control block.
    ///
    /// Comparing against it is the same as [`is_null`](Self::is_null).
    #[inline]
    pub const fn null() -> Self {
        Self {
            inner: None,
            _marker: PhantomData,
        }
    }

    /// Adopts a strong reference already counted for `inner`.
    ///
    /// # Safety
    ///
    /// The caller transfers one strong reference on `inner.block`, and
    /// `inner.ptr` stays valid while that block's payload is alive.
    #[inline]
    pub(crate) const unsafe fn from_inner(inner: RawHandle<T>) -> Self {
        Self {
            inner: Some(inner),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> Option<RawHandle<T>> {
        self.inner
    }

    /// Takes ownership of a boxed value, allocating a separate control block.
    ///
    /// Prefer [`make_shared`](crate::make_shared) when the value is not boxed
    /// yet: it needs one allocation instead of two.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::fmt::Display;
    /// use sp_ptr::Shared;
    ///
    /// let boxed: Box<dyn Display> = Box::new(7);
    /// let text = Shared::from_box(boxed);
    /// assert_eq!(text.to_string(), "7");
    /// ```
    pub fn from_box(value: Box<T>) -> Self {
        match Self::try_from_box(value) {
            Ok(this) => this,
            Err(err) => handle_alloc_error(err.layout()),
        }
    }

    /// Fallible version of [`from_box`](Self::from_box).
    ///
    /// On failure the value has already been dropped.
    pub fn try_from_box(value: Box<T>) -> Result<Self, AllocError> {
        let ptr = NonNull::from(Box::leak(value));
        // SAFETY: `ptr` is a leaked box, which `DefaultDelete` frees.
        unsafe { Self::try_from_raw_with(ptr, DefaultDelete) }
    }

    /// Takes ownership of `ptr`, to be destroyed by `deleter`.
    ///
    /// Aborts through [`handle_alloc_error`] if the control block cannot be
    /// allocated, after `deleter` has been run on `ptr`.
    ///
    /// # Safety
    ///
    /// - `ptr` must be valid for shared reads until `deleter` is called.
    /// - Calling `deleter` once with `ptr` must be sound.
    pub unsafe fn from_raw_with<D: Deleter<T>>(ptr: NonNull<T>, deleter: D) -> Self {
        // SAFETY: forwarded to the caller.
        match unsafe { Self::try_from_raw_with(ptr, deleter) } {
            Ok(this) => this,
            Err(err) => handle_alloc_error(err.layout()),
        }
    }

    /// Fallible version of [`from_raw_with`](Self::from_raw_with).
    ///
    /// If the control block cannot be allocated, `deleter` is run on `ptr`
    /// before the error is returned, so the payload is never leaked.
    ///
    /// # Safety
    ///
    /// See [`from_raw_with`](Self::from_raw_with).
    pub unsafe fn try_from_raw_with<D: Deleter<T>>(
        ptr: NonNull<T>,
        deleter: D,
    ) -> Result<Self, AllocError> {
        let block = SeparateBlock::try_new(ptr, deleter)?;
        // SAFETY: a fresh block starts with one strong reference.
        Ok(unsafe { Self::from_inner(RawHandle { ptr, block }) })
    }

    /// Creates a handle sharing ownership with `self` but exposing `ptr`.
    ///
    /// The strong count of the shared block grows by one. A null `self` gives
    /// a null handle.
    ///
    /// # Safety
    ///
    /// - `ptr` must be valid for shared reads for as long as the payload of
    ///   `self` is alive.
    /// - If the result is sent to or shared with another thread, the payload
    ///   owned by the block of `self` must be `Send + Sync`.
    pub unsafe fn alias<U: ?Sized>(&self, ptr: NonNull<U>) -> Shared<U> {
        match self.inner {
            Some(inner) => {
                inner.block.add_strong_ref();
                // SAFETY: the reference added above is handed over.
                unsafe { Shared::from_inner(RawHandle { ptr, block: inner.block }) }
            }
            None => Shared::null(),
        }
    }

    /// Like [`alias`](Self::alias), but moves the ownership of `self`
    /// instead of adding a reference.
    ///
    /// # Safety
    ///
    /// See [`alias`](Self::alias).
    pub unsafe fn into_alias<U: ?Sized>(self, ptr: NonNull<U>) -> Shared<U> {
        let this = ManuallyDrop::new(self);
        match this.inner {
            // SAFETY: the strong reference of `this` is handed over.
            Some(inner) => unsafe { Shared::from_inner(RawHandle { ptr, block: inner.block }) },
            None => Shared::null(),
        }
    }

    /// Shares ownership of the payload while exposing a part of it.
    ///
    /// `f` is not called on a null handle. Also serves to turn a
    /// `Shared<T>` into a `Shared<dyn Trait>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sp_ptr::make_shared;
    ///
    /// struct Pair {
    ///     left: u32,
    ///     right: u32,
    /// }
    ///
    /// let pair = make_shared(Pair { left: 1, right: 2 });
    /// let right = pair.project(|p| &p.right);
    /// drop(pair);
    ///
    /// assert_eq!(*right, 2);
    /// assert_eq!(right.use_count(), 1);
    /// ```
    ///
    /// The payload must be `'static`, otherwise `f` could hand out data
    /// borrowed from outside the payload, which the result would outlive:
    ///
    /// ```compile_fail
    /// use sp_ptr::{Shared, make_shared};
    ///
    /// let view: Shared<str>;
    /// {
    ///     let text = String::from("borrowed");
    ///     let owner = make_shared(text.as_str());
    ///     view = owner.project(|r| *r);
    /// }
    /// assert_eq!(&*view, "borrowed");
    /// ```
    pub fn project<U, F>(&self, f: F) -> Shared<U>
    where
        T: Send + Sync + 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        let ptr = match self.get() {
            Some(value) => NonNull::from(f(value)),
            None => return Shared::null(),
        };
        // SAFETY: `T: 'static`, so `ptr` borrows from the payload or from
        // static data, both outliving every owner. The owner is `Send + Sync`.
        unsafe { self.alias(ptr) }
    }

    /// Consuming version of [`project`](Self::project).
    pub fn map<U, F>(self, f: F) -> Shared<U>
    where
        T: Send + Sync + 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        let ptr = match self.get() {
            Some(value) => NonNull::from(f(value)),
            None => return Shared::null(),
        };
        // SAFETY: see `project`.
        unsafe { self.into_alias(ptr) }
    }

    /// Creates a [`Weak`] observing the same block.
    #[inline]
    pub fn downgrade(&self) -> Weak<T> {
        Weak::from(self)
    }

    /// Returns the exposed pointer, or `None` for a null handle.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.inner.map(|inner| inner.ptr)
    }

    /// Returns a reference to the exposed value, or `None` for a null handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: while this handle lives the payload is alive.
        self.inner.as_ref().map(|inner| unsafe { inner.ptr.as_ref() })
    }

    /// Returns `true` if the handle is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of owning handles sharing the block, `0` for a null handle.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.inner.map_or(0, |inner| inner.block.strong_refs())
    }

    /// Number of [`Weak`] handles observing the block, `0` for a null handle.
    #[inline]
    pub fn weak_count(&self) -> usize {
        // The owners hold one weak reference between them.
        self.inner
            .map_or(0, |inner| inner.block.weak_refs().saturating_sub(1))
    }

    /// Returns `true` if both handles share a control block, or both are null.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &Shared<U>) -> bool {
        self.block_addr() == other.block_addr()
    }

    #[inline]
    pub(crate) fn block_addr(&self) -> *const () {
        self.inner.map_or(ptr::null(), |inner| inner.block.addr())
    }

    #[inline]
    fn addr(&self) -> *const () {
        self.inner.map_or(ptr::null(), RawHandle::addr)
    }

    /// Releases the ownership of `self`, leaving it null.
    #[inline]
    pub fn reset(&mut self) {
        drop(mem::take(self));
    }

    /// Replaces the owned value with a boxed one.
    ///
    /// The new state is fully built before the old one is released. On
    /// failure `self` is unchanged and `value` has been dropped.
    pub fn reset_box(&mut self, value: Box<T>) -> Result<(), AllocError> {
        let mut next = Self::try_from_box(value)?;
        self.swap(&mut next);
        Ok(())
    }

    /// Replaces the owned value with `ptr`, to be destroyed by `deleter`.
    ///
    /// The new state is fully built before the old one is released. On
    /// failure `self` is unchanged and `deleter` has been run on `ptr`.
    ///
    /// # Safety
    ///
    /// See [`from_raw_with`](Self::from_raw_with).
    pub unsafe fn reset_with<D: Deleter<T>>(
        &mut self,
        ptr: NonNull<T>,
        deleter: D,
    ) -> Result<(), AllocError> {
        // SAFETY: forwarded to the caller.
        let mut next = unsafe { Self::try_from_raw_with(ptr, deleter)? };
        self.swap(&mut next);
        Ok(())
    }

    /// Exchanges the contents of two handles. Counts are untouched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.inner, &mut other.inner);
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        match self.inner {
            Some(inner) => {
                inner.block.add_strong_ref();
                // SAFETY: the reference added above is handed over.
                unsafe { Self::from_inner(inner) }
            }
            None => Self::null(),
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null `Shared`")
}

impl<T: ?Sized> AsRef<T> for Shared<T> {
    #[inline]
    #[track_caller]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> From<Box<T>> for Shared<T> {
    #[inline]
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Shared<U>> for Shared<T> {
    #[inline]
    fn eq(&self, other: &Shared<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Hash for Shared<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.addr(), f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("(null)"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("(null)"),
        }
    }
}
