//! Compile-time configuration helpers shared by the `sp_*` crates.
//!
//! Each crate declares its own aliases with [`define_alias!`], usually inside a
//! `pub mod cfg`, and then uses them as macros:
//!
//! ```
//! mod cfg {
//!     sp_cfg::define_alias! {
//!         #[cfg(debug_assertions)] => debug,
//!         #[cfg(any())] => never,
//!     }
//! }
//!
//! let mut checks = 0;
//! cfg::never! { checks += 100; }
//!
//! let active = cfg::debug!();
//! assert_eq!(active, cfg!(debug_assertions));
//!
//! let n = cfg::never! { if { 1 } else { 2 } };
//! assert_eq!(n + checks, 2);
//! ```
//!
//! [`switch!`] selects the first active branch, similar to `cfg_if`:
//!
//! ```
//! mod cfg {
//!     sp_cfg::define_alias! {
//!         #[cfg(any())] => never,
//!     }
//! }
//!
//! let picked = sp_cfg::switch! {{
//!     cfg::never => { "never" }
//!     _ => { "fallback" }
//! }};
//! assert_eq!(picked, "fallback");
//! ```
#![no_std]

/// Passes the provided tokens through.
///
/// With no input it evaluates to `true`; with `if { .. } else { .. }` it keeps
/// the first branch.
#[doc(hidden)]
#[macro_export]
macro_rules! enabled {
    () => { true };
    (if { $($p:tt)* } else { $($n:tt)* }) => { $($p)* };
    ($($p:tt)*) => { $($p)* };
}

/// Discards the provided tokens.
///
/// With no input it evaluates to `false`; with `if { .. } else { .. }` it keeps
/// the second branch.
#[doc(hidden)]
#[macro_export]
macro_rules! disabled {
    () => { false };
    (if { $($p:tt)* } else { $($n:tt)* }) => { $($n)* };
    ($($p:tt)*) => {};
}

/// Expands the first branch whose condition is active.
///
/// A condition is either an alias declared by [`define_alias!`] or a raw
/// `#[cfg(..)]` attribute. `_` matches unconditionally. Raw `#[cfg]`
/// conditions are only usable in item position; wrap the input in an extra
/// pair of braces to use the macro as an expression.
#[macro_export]
macro_rules! switch {
    ({ $($tt:tt)* }) => {{
        $crate::switch! { $($tt)* }
    }};
    (_ => { $($output:tt)* }) => {
        $($output)*
    };
    (
        $cond:path => $output:tt
        $($( $rest:tt )+)?
    ) => {
        $cond! {
            if {
                $crate::switch! { _ => $output }
            } else {
                $(
                    $crate::switch! { $($rest)+ }
                )?
            }
        }
    };
    (
        #[cfg($cfg:meta)] => $output:tt
        $($( $rest:tt )+)?
    ) => {
        #[cfg($cfg)]
        $crate::switch! { _ => $output }
        $(
            #[cfg(not($cfg))]
            $crate::switch! { $($rest)+ }
        )?
    };
}

/// Declares one macro per `#[cfg(..)] => name` pair.
///
/// The generated macro behaves like [`enabled!`] when the predicate holds and
/// like [`disabled!`] otherwise.
#[macro_export]
macro_rules! define_alias {
    (
        #[cfg($meta:meta)] => $p:ident
        $(, $( $rest:tt )+)?
    ) => {
        $crate::define_alias! {
            #[cfg($meta)] => { $p }
            $(
                $($rest)+
            )?
        }
    };
    (
        #[cfg($meta:meta)] => $p:ident,
        $($( $rest:tt )+)?
    ) => {
        $crate::define_alias! {
            #[cfg($meta)] => { $p }
            $(
                $($rest)+
            )?
        }
    };
    (
        #[cfg($meta:meta)] => {
            $(#[$p_meta:meta])*
            $p:ident
        }
        $($( $rest:tt )+)?
    ) => {
        $crate::switch! {
            #[cfg($meta)] => {
                $(#[$p_meta])*
                #[doc(inline)]
                #[doc = concat!("Keeps its input because `#[cfg(", stringify!($meta), ")]` is active.")]
                pub use $crate::enabled as $p;
            }
            _ => {
                $(#[$p_meta])*
                #[doc(inline)]
                #[doc = concat!("Drops its input because `#[cfg(", stringify!($meta), ")]` is inactive.")]
                pub use $crate::disabled as $p;
            }
        }

        $(
            $crate::define_alias! {
                $($rest)+
            }
        )?
    };
}
