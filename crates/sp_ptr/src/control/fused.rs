use core::cell::UnsafeCell;
use core::mem::{self, MaybeUninit};
use core::ptr::NonNull;

use super::{BlockHeader, BlockRef, ControlBlock, allocate, deallocate};
use crate::AllocError;

// -----------------------------------------------------------------------------
// FusedBlock

/// Control block with the payload stored inline.
///
/// The payload slot is written once after the header, and dropped in place
/// when the strong count reaches zero. The memory goes away with the block.
#[repr(C)]
pub(crate) struct FusedBlock<T> {
    header: BlockHeader,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: `#[repr(C)]` with the header first.
unsafe impl<T> ControlBlock for FusedBlock<T> {
    unsafe fn delete_data(this: NonNull<Self>) {
        // SAFETY: the slot was initialised by `try_new_with` and is dropped
        // only here.
        unsafe { Self::value_ptr(this).drop_in_place() }
    }
}

/// Frees a block whose payload was never constructed.
struct FreeOnUnwind<T>(NonNull<FusedBlock<T>>);

impl<T> Drop for FreeOnUnwind<T> {
    #[cold]
    fn drop(&mut self) {
        // SAFETY: only the header is initialised, and dropping the block
        // does not touch the payload slot.
        unsafe { deallocate::<FusedBlock<T>>(self.0.cast::<BlockHeader>()) }
    }
}

impl<T> FusedBlock<T> {
    /// Address of the embedded payload slot.
    #[inline]
    fn value_ptr(this: NonNull<Self>) -> NonNull<T> {
        // SAFETY: projecting a field of an allocated block, no reference is
        // created to possibly uninitialised memory.
        unsafe {
            let slot = UnsafeCell::raw_get(&raw const (*this.as_ptr()).value);
            NonNull::new_unchecked(slot.cast::<T>())
        }
    }

    /// Allocates a block and constructs the payload in its slot.
    ///
    /// `init` runs after the allocation succeeded. If it panics the block is
    /// freed and the panic continues.
    pub(crate) fn try_new_with<F>(init: F) -> Result<(BlockRef, NonNull<T>), AllocError>
    where
        F: FnOnce() -> T,
    {
        let block = allocate::<Self>()?;

        // SAFETY: `block` is a fresh allocation with the layout of `Self`.
        unsafe {
            (&raw mut (*block.as_ptr()).header).write(BlockHeader::new(Self::VTABLE));
        }

        let guard = FreeOnUnwind(block);
        let value = Self::value_ptr(block);
        // SAFETY: the slot is allocated, aligned and still empty.
        unsafe { value.write(init()) };
        mem::forget(guard);

        // SAFETY: header and payload are both initialised now.
        Ok((unsafe { BlockRef::from_block(block) }, value))
    }
}
