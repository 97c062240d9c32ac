//! Viewport - Visible Range Calculation
//!
//! Pure windowing math over the virtual index space. Nothing here allocates per
//! item or suspends, so it is safe to call on every scroll frame.
//!
//! ```text
//!   row 0  ┌──────────────┐  ─┐
//!          │   overscan   │   │ offset_y = start_row * item_height
//!          ├──────────────┤  ─┘
//!          │   viewport   │  container_height
//!          ├──────────────┤
//!          │   overscan   │
//!   end_row└──────────────┘
//! ```

use std::ops::Range;

use crate::constants::{
    DEFAULT_CONTAINER_HEIGHT, DEFAULT_ITEM_HEIGHT, DEFAULT_OVERSCAN, WEEKS_PER_ROW,
};
use crate::error::{Error, Result};

/// Per-session grid configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualScrollConfig {
    /// Size of the full virtual index space
    pub total_items: usize,
    /// Row pitch in pixels
    pub item_height: f64,
    /// Items per row
    pub columns: usize,
    /// Viewport height in pixels
    pub container_height: f64,
    /// Rows rendered beyond each viewport edge
    pub overscan: usize,
    /// Horizontal cell pitch in pixels
    pub cell_width: f64,
}

impl Default for VirtualScrollConfig {
    fn default() -> Self {
        Self {
            total_items: 0,
            item_height: DEFAULT_ITEM_HEIGHT,
            columns: WEEKS_PER_ROW,
            container_height: DEFAULT_CONTAINER_HEIGHT,
            overscan: DEFAULT_OVERSCAN,
            cell_width: DEFAULT_ITEM_HEIGHT,
        }
    }
}

impl VirtualScrollConfig {
    /// Create a validated configuration with square cells
    pub fn new(
        total_items: usize,
        item_height: f64,
        columns: usize,
        container_height: f64,
        overscan: usize,
    ) -> Result<Self> {
        let config = Self {
            total_items,
            item_height,
            columns,
            container_height,
            overscan,
            cell_width: item_height,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes that would make the window degenerate
    pub fn validate(&self) -> Result<()> {
        check_positive("item_height", self.item_height)?;
        check_positive("container_height", self.container_height)?;
        check_positive("cell_width", self.cell_width)?;
        if self.columns == 0 {
            return Err(Error::config("columns must be at least 1"));
        }
        Ok(())
    }

    /// Number of rows in the full grid
    pub fn total_rows(&self) -> usize {
        self.total_items.div_ceil(self.columns)
    }

    /// Full scrollable height in pixels
    pub fn total_height(&self) -> f64 {
        self.total_rows() as f64 * self.item_height
    }

    /// Width of one full row in pixels
    pub fn content_width(&self) -> f64 {
        self.columns as f64 * self.cell_width
    }

    /// Largest valid scroll offset
    pub fn max_scroll_top(&self) -> f64 {
        (self.total_height() - self.container_height).max(0.0)
    }

    /// Clamp an offset into `[0, max_scroll_top]`; non-finite input maps to 0
    pub fn clamp_scroll_top(&self, scroll_top: f64) -> f64 {
        if !scroll_top.is_finite() {
            return 0.0;
        }
        scroll_top.clamp(0.0, self.max_scroll_top())
    }

    /// Row containing `index`
    pub fn row_of(&self, index: usize) -> usize {
        index / self.columns
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be a positive number, got {value}")))
    }
}

/// Convert a column count coming from an untyped source. Fractional values are
/// rejected instead of rounded so computed offsets match the rendered grid.
pub fn checked_columns(value: f64) -> Result<usize> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(Error::config(format!("columns must be an integer, got {value}")));
    }
    if value < 1.0 {
        return Err(Error::config(format!("columns must be at least 1, got {value}")));
    }
    Ok(value as usize)
}

/// Derived window state for one scroll offset
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualScrollState {
    pub scroll_top: f64,
    pub start_row: usize,
    pub end_row: usize,
    /// Flat indices to render, in order
    pub visible_items: Range<usize>,
    /// Translation applied to the first rendered row
    pub offset_y: f64,
    pub total_height: f64,
}

impl VirtualScrollState {
    /// Number of rendered cells
    pub fn len(&self) -> usize {
        self.visible_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible_items.is_empty()
    }

    /// Whether `index` is rendered in this window
    pub fn contains(&self, index: usize) -> bool {
        self.visible_items.contains(&index)
    }

    /// Rendered indices in order
    pub fn iter(&self) -> Range<usize> {
        self.visible_items.clone()
    }

    /// `(x, y)` of `index` relative to the translated block
    pub fn item_offset(&self, config: &VirtualScrollConfig, index: usize) -> Option<(f64, f64)> {
        if !self.contains(index) {
            return None;
        }
        let row = config.row_of(index) - self.start_row;
        let col = index % config.columns;
        Some((col as f64 * config.cell_width, row as f64 * config.item_height))
    }
}

/// Compute the window for `scroll_top`. The offset is clamped first.
pub fn calculate(config: &VirtualScrollConfig, scroll_top: f64) -> VirtualScrollState {
    let scroll_top = config.clamp_scroll_top(scroll_top);
    let total_rows = config.total_rows();
    let total_height = config.total_height();

    if total_rows == 0 {
        return VirtualScrollState {
            scroll_top,
            start_row: 0,
            end_row: 0,
            visible_items: 0..0,
            offset_y: 0.0,
            total_height,
        };
    }

    // Saturating: a tiny pitch or a huge overscan still passes validation
    let last_row = total_rows - 1;
    let first_row = ((scroll_top / config.item_height).floor() as usize).min(last_row);
    let start_row = first_row.saturating_sub(config.overscan);
    let visible_row_count = ((config.container_height / config.item_height).ceil() as usize)
        .saturating_add(config.overscan.saturating_mul(2));
    let end_row = last_row
        .min(start_row.saturating_add(visible_row_count.max(1) - 1))
        .max(start_row);

    let first_index = start_row * config.columns;
    let last_exclusive = ((end_row + 1) * config.columns).min(config.total_items);

    VirtualScrollState {
        scroll_top,
        start_row,
        end_row,
        visible_items: first_index..last_exclusive,
        offset_y: start_row as f64 * config.item_height,
        total_height,
    }
}

/// Offset that puts the row of `index` at the top of the viewport. Returned,
/// not applied: the host scrolls and the next scroll event recomputes.
pub fn scroll_to_index(config: &VirtualScrollConfig, index: usize) -> f64 {
    let index = index.min(config.total_items.saturating_sub(1));
    let target = config.row_of(index) as f64 * config.item_height;
    config.clamp_scroll_top(target)
}

/// Minimal offset change that brings the row of `index` fully into view.
///
/// Returns `None` when the row is already fully visible (overscan rows do not
/// count). Otherwise snaps the row to the nearest edge: the top edge when it
/// lies above the viewport, the bottom edge when it lies below. Far jumps snap
/// the same way, there is no re-centering.
pub fn ensure_item_visible(
    config: &VirtualScrollConfig,
    scroll_top: f64,
    index: usize,
) -> Option<f64> {
    if config.total_items == 0 {
        return None;
    }
    let scroll_top = config.clamp_scroll_top(scroll_top);
    let index = index.min(config.total_items - 1);
    let row_top = config.row_of(index) as f64 * config.item_height;
    let row_bottom = row_top + config.item_height;
    let view_bottom = scroll_top + config.container_height;

    let target = if row_top < scroll_top {
        row_top
    } else if row_bottom > view_bottom {
        // Rows taller than the viewport align to their top instead
        row_top.min(row_bottom - config.container_height)
    } else {
        return None;
    };

    let target = config.clamp_scroll_top(target);
    if (target - scroll_top).abs() < f64::EPSILON {
        None
    } else {
        Some(target)
    }
}
