//! Synchronization primitives used by reference-counted handles.
//!
//! Only the atomic types are provided here. Reference counting needs
//! pointer-width atomics with compare-exchange; when the target lacks them the
//! types come from `portable-atomic` instead of `core`.

pub mod atomic;
