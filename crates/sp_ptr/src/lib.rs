#![doc = include_str!("../README.md")]
#![expect(unsafe_code, reason = "Reference counting manages raw allocations.")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// Compilation config

/// Some macros used for compilation control.
pub mod cfg {
    sp_cfg::define_alias! {
        #[cfg(feature = "std")] => std,
        #[cfg(any(feature = "debug", debug_assertions))] => debug,
    }
}

// -----------------------------------------------------------------------------
// no_std support

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// -----------------------------------------------------------------------------
// Modules

mod control;
mod deleter;
mod error;
mod make;
mod shared;
mod weak;

#[cfg(test)]
mod testing;

// -----------------------------------------------------------------------------
// Top-level exports

pub use deleter::{DefaultDelete, Deleter};
pub use error::AllocError;
pub use make::{make_shared, make_shared_with, try_make_shared, try_make_shared_with};
pub use shared::Shared;
pub use weak::Weak;
