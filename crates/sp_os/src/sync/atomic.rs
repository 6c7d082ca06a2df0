//! Provide atomic types for reference counting.
//!
//! If the target platform has pointer-width atomics these are the
//! `core::sync::atomic` types, otherwise they are taken from `portable_atomic`.
//!
//! Only interfaces available in the standard library should be used, so that
//! both backends behave identically.
//!
//! See the [standard library] for further details.
//!
//! [standard library]: https://doc.rust-lang.org/core/sync/atomic

pub use atomic_ptr::{AtomicUsize, Ordering, fence};

#[cfg(target_has_atomic = "ptr")]
use core::sync::atomic as atomic_ptr;

#[cfg(not(target_has_atomic = "ptr"))]
use portable_atomic as atomic_ptr;

#[cfg(test)]
mod tests {
    use super::{AtomicUsize, Ordering, fence};

    #[test]
    fn counter_round_trip() {
        let count = AtomicUsize::new(1);
        assert_eq!(count.fetch_add(1, Ordering::Relaxed), 1);
        assert_eq!(count.fetch_sub(1, Ordering::Release), 2);
        fence(Ordering::Acquire);
        assert_eq!(
            count.compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed),
            Ok(1)
        );
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
