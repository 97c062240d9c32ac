//! State - Synchronous Grid State
//!
//! Viewport math and the stateful wrappers the host drives on every frame.
//! Nothing in here suspends.

pub mod layout;
pub mod scroller;
pub mod viewport;
