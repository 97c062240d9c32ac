//! Helper Utilities
//!
//! Common utilities used across the crate.

mod debounce;
mod fs;

pub use debounce::*;
pub use fs::*;
