#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use sp_cfg as cfg;
pub use sp_os as os;
pub use sp_ptr as ptr;

pub use sp_ptr::{Shared, Weak, make_shared};
