use core::alloc::Layout;

use thiserror::Error;

// -----------------------------------------------------------------------------
// Error

/// The control block of a [`Shared`](crate::Shared) could not be allocated.
///
/// This is the only failure reported by the constructors. When it is returned
/// by a constructor that took a pointer and a deleter, the deleter has
/// already been run on that pointer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("failed to allocate control block of {} bytes (align {})", .layout.size(), .layout.align())]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    #[inline]
    pub(crate) const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout of the control block that could not be allocated.
    #[inline]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}
