//! Domain - Pure Data Structures
//!
//! Settings, persisted scroll records and week cells. No I/O, no runtime.

pub mod config;
pub mod scroll;
pub mod week;
