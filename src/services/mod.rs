//! Service Layer
//!
//! Async data loading, durable scroll persistence and the session glue.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       GridSession                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │LazyDataCache │  │ ScrollStore  │  │ VirtualScroller  │  │
//! │  │ (RangeLoader)│  │(ScrollStorage│  │ LayoutResolver   │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼ VirtualScrollState
//!                          host render
//! ```

pub mod cache;
pub mod loader;
pub mod scroll_store;
pub mod session;
pub mod storage;

pub use cache::{CacheConfig, CacheEntry, CacheMetrics, EntryState, LazyDataCache};
pub use loader::{FnLoader, LifeWeeksLoader, RangeLoader, VecLoader};
pub use scroll_store::{RestoredScroll, ScrollStore};
pub use session::GridSession;
pub use storage::{FileStorage, MemoryStorage, ScrollStorage};
