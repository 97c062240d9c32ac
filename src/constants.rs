//! Grid Constants
//!
//! Centralized defaults for the grid engine.

/// Weeks shown per row on desktop
pub const WEEKS_PER_ROW: usize = 52;

/// Default cell pitch in pixels (cell plus gap)
pub const DEFAULT_ITEM_HEIGHT: f64 = 13.0;

/// Default viewport height before the container has been measured
pub const DEFAULT_CONTAINER_HEIGHT: f64 = 600.0;

/// Rows rendered beyond each viewport edge
pub const DEFAULT_OVERSCAN: usize = 2;

/// Bounded cache capacities
pub const DEFAULT_CACHE_SIZE: usize = 5000;
pub const DEFAULT_PREFETCH_COUNT: usize = WEEKS_PER_ROW * 4;

/// Debounce windows
pub const SCROLL_SAVE_DEBOUNCE_MS: u64 = 200;
pub const RESIZE_DEBOUNCE_MS: u64 = 120;

/// Lifespan limits for week calculations
pub const MAX_LIFESPAN_YEARS: u32 = 150;
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Prefix for persisted scroll keys
pub const SCROLL_KEY_PREFIX: &str = "lifegrid.scroll.v1";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.toml";
