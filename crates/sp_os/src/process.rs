//! Provide `abort` for all platforms.
//!
//! - In `std` environments, it forwards to `std::process::abort`.
//! - In non-`std` environments, it panics, which is the strongest
//!   termination available without a platform runtime.

/// Terminates the current process.
///
/// Used when continuing would be unsound, e.g. when a reference count is about
/// to overflow. `reason` is written to stderr before aborting when `std` is
/// available and used as the panic message otherwise.
#[cold]
#[inline(never)]
pub fn abort(reason: &str) -> ! {
    crate::cfg::switch! {
        crate::cfg::std => {
            ::std::eprintln!("Aborting: {reason}");
            ::std::process::abort();
        }
        _ => {
            panic!("Aborting: {reason}");
        }
    }
}
