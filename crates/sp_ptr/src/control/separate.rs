use core::cell::UnsafeCell;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use super::{BlockHeader, BlockRef, ControlBlock, allocate};
use crate::{AllocError, Deleter};

// -----------------------------------------------------------------------------
// SeparateBlock

/// Control block for a payload allocated independently of the block.
///
/// The deleter is moved out and consumed when the strong count reaches zero.
#[repr(C)]
pub(crate) struct SeparateBlock<T: ?Sized, D> {
    header: BlockHeader,
    data: NonNull<T>,
    deleter: UnsafeCell<ManuallyDrop<D>>,
}

// SAFETY: `#[repr(C)]` with the header first.
unsafe impl<T: ?Sized, D: Deleter<T>> ControlBlock for SeparateBlock<T, D> {
    unsafe fn delete_data(this: NonNull<Self>) {
        // SAFETY: called once, when no owner is left, so nobody else touches
        // the deleter. It is never read again afterwards.
        unsafe {
            let block = this.as_ref();
            let deleter = ManuallyDrop::take(&mut *block.deleter.get());
            deleter.delete(block.data);
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> SeparateBlock<T, D> {
    /// Allocates a block taking ownership of `data`.
    ///
    /// If the allocation fails, `deleter` is run on `data` before the error is
    /// returned, so the payload never leaks.
    pub(crate) fn try_new(data: NonNull<T>, deleter: D) -> Result<BlockRef, AllocError> {
        match allocate::<Self>() {
            Ok(block) => {
                // SAFETY: `block` is a fresh allocation with the layout of `Self`.
                unsafe {
                    block.write(Self {
                        header: BlockHeader::new(Self::VTABLE),
                        data,
                        deleter: UnsafeCell::new(ManuallyDrop::new(deleter)),
                    });
                    Ok(BlockRef::from_block(block))
                }
            }
            Err(err) => {
                // SAFETY: ownership of `data` was handed to us together with
                // `deleter`, and no handle was created for it.
                unsafe { deleter.delete(data) };
                Err(err)
            }
        }
    }
}
