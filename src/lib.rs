//! lifegrid - Virtualized Weeks-of-Your-Life Grid Engine
//!
//! Renders a window of a grid holding one cell per week of a lifespan:
//! viewport math, a bounded lazy cache in front of an async loader, debounced
//! scroll persistence, and responsive column resolution.

pub mod constants;
pub mod domain;
pub mod error;
pub mod helpers;
pub mod services;
pub mod state;
pub mod utils;

pub use error::{Error, Result};
