//! Scroller - Stateful Viewport Wrapper
//!
//! Holds the current configuration and window, coalesces raw scroll events to
//! the latest value per frame, and notifies subscribers of position changes.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::domain::scroll::{ScrollEvent, ScrollPosition};
use crate::error::Result;
use crate::state::viewport::{self, VirtualScrollConfig, VirtualScrollState};

/// Virtual scroll state for one grid instance
#[derive(Debug)]
pub struct VirtualScroller {
    config: VirtualScrollConfig,
    state: VirtualScrollState,
    scroll_left: f64,
    /// Latest event not yet applied
    pending: Option<ScrollEvent>,
    /// Sequence number of the last applied event
    last_seq: Option<u64>,
    subscribers: Vec<Sender<ScrollPosition>>,
}

impl VirtualScroller {
    /// Create a scroller positioned at the top
    pub fn new(config: VirtualScrollConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: viewport::calculate(&config, 0.0),
            config,
            scroll_left: 0.0,
            pending: None,
            last_seq: None,
            subscribers: Vec::new(),
        })
    }

    // ==================== Getters ====================

    pub fn config(&self) -> &VirtualScrollConfig {
        &self.config
    }

    pub fn state(&self) -> &VirtualScrollState {
        &self.state
    }

    pub fn visible_items(&self) -> std::ops::Range<usize> {
        self.state.visible_items.clone()
    }

    pub fn scroll_top(&self) -> f64 {
        self.state.scroll_top
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    pub fn offset_y(&self) -> f64 {
        self.state.offset_y
    }

    pub fn total_height(&self) -> f64 {
        self.state.total_height
    }

    pub fn start_row(&self) -> usize {
        self.state.start_row
    }

    pub fn end_row(&self) -> usize {
        self.state.end_row
    }

    pub fn position(&self) -> ScrollPosition {
        ScrollPosition {
            top: self.state.scroll_top,
            left: self.scroll_left,
        }
    }

    // ==================== Configuration ====================

    /// Replace the whole configuration. The window is rebuilt from scratch and
    /// the current offset is re-clamped against the new bounds.
    pub fn configure(&mut self, config: VirtualScrollConfig) -> Result<()> {
        config.validate()?;
        let before = self.position();
        self.config = config;
        self.state = viewport::calculate(&self.config, before.top);
        if self.position() != before {
            self.emit();
        }
        Ok(())
    }

    pub fn update_total_items(&mut self, total_items: usize) -> Result<()> {
        self.configure(VirtualScrollConfig {
            total_items,
            ..self.config
        })
    }

    pub fn update_columns(&mut self, columns: usize) -> Result<()> {
        self.configure(VirtualScrollConfig {
            columns,
            ..self.config
        })
    }

    pub fn update_item_height(&mut self, item_height: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            item_height,
            ..self.config
        })
    }

    pub fn update_cell_width(&mut self, cell_width: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            cell_width,
            ..self.config
        })
    }

    pub fn update_container_height(&mut self, container_height: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            container_height,
            ..self.config
        })
    }

    // ==================== Scrolling ====================

    /// Queue a raw scroll event. Only the newest event survives until the next
    /// [`flush_scroll`](Self::flush_scroll). Events older than one already
    /// applied or queued are dropped and `false` is returned.
    pub fn queue_scroll(&mut self, event: ScrollEvent) -> bool {
        let newest = self.pending.map(|p| p.seq).or(self.last_seq);
        if newest.is_some_and(|seq| event.seq <= seq) {
            tracing::trace!(seq = event.seq, "dropping stale scroll event");
            return false;
        }
        self.pending = Some(event);
        true
    }

    /// Apply the queued scroll event, if any. Returns `true` when the window or
    /// offsets changed.
    pub fn flush_scroll(&mut self) -> bool {
        let Some(event) = self.pending.take() else {
            return false;
        };
        self.last_seq = Some(event.seq);
        self.apply(event.top, event.left)
    }

    /// Apply an offset immediately, bypassing the event queue
    pub fn set_scroll_top(&mut self, scroll_top: f64) -> bool {
        self.apply(scroll_top, self.scroll_left)
    }

    fn apply(&mut self, top: f64, left: f64) -> bool {
        let before = self.position();
        let next = viewport::calculate(&self.config, top);
        self.scroll_left = if left.is_finite() { left.max(0.0) } else { 0.0 };
        self.state = next;
        let changed = self.position() != before;
        if changed {
            self.emit();
        }
        changed
    }

    /// Target offset that puts `index` at the top. Not applied.
    pub fn scroll_to_index(&self, index: usize) -> f64 {
        viewport::scroll_to_index(&self.config, index)
    }

    /// Offset needed to bring `index` fully into view, or `None`. Not applied.
    pub fn ensure_item_visible(&self, index: usize) -> Option<f64> {
        viewport::ensure_item_visible(&self.config, self.state.scroll_top, index)
    }

    // ==================== Notifications ====================

    /// Subscribe to scroll position changes
    pub fn subscribe(&mut self) -> Receiver<ScrollPosition> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self) {
        let position = self.position();
        self.subscribers.retain(|tx| tx.send(position).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroller() -> VirtualScroller {
        let config = VirtualScrollConfig::new(4000, 10.0, 52, 100.0, 2).expect("valid config");
        VirtualScroller::new(config).expect("scroller")
    }

    #[test]
    fn test_latest_event_wins() {
        let mut s = scroller();
        assert!(s.queue_scroll(ScrollEvent::new(10.0, 0.0, 1)));
        assert!(s.queue_scroll(ScrollEvent::new(50.0, 0.0, 2)));
        assert!(s.queue_scroll(ScrollEvent::new(120.0, 0.0, 3)));
        assert!(s.flush_scroll());
        assert_eq!(s.scroll_top(), 120.0);
        assert!(!s.flush_scroll());
    }

    #[test]
    fn test_stale_event_does_not_regress() {
        let mut s = scroller();
        s.queue_scroll(ScrollEvent::new(300.0, 0.0, 10));
        s.flush_scroll();
        assert!(!s.queue_scroll(ScrollEvent::new(20.0, 0.0, 9)));
        assert!(!s.flush_scroll());
        assert_eq!(s.scroll_top(), 300.0);
        assert_eq!(s.start_row(), 28);
    }

    #[test]
    fn test_reconfigure_reclamps_offset() {
        let mut s = scroller();
        s.set_scroll_top(600.0);
        assert_eq!(s.scroll_top(), 600.0);

        s.update_total_items(520).expect("valid");
        // 10 rows * 10px - 100px viewport
        assert_eq!(s.scroll_top(), 0.0);
        assert_eq!(s.total_height(), 100.0);
        assert_eq!(s.visible_items(), 0..520);
    }

    #[test]
    fn test_invalid_update_keeps_previous_config() {
        let mut s = scroller();
        assert!(s.update_columns(0).is_err());
        assert!(s.update_item_height(0.0).is_err());
        assert!(s.update_cell_width(-4.0).is_err());
        assert_eq!(s.config().columns, 52);
        assert_eq!(s.config().item_height, 10.0);
    }

    #[test]
    fn test_column_change_recomputes_window() {
        let mut s = scroller();
        s.update_columns(26).expect("valid");
        assert_eq!(s.total_height(), 4000usize.div_ceil(26) as f64 * 10.0);
        assert_eq!(s.visible_items(), 0..(14 * 26));
    }

    #[test]
    fn test_subscribers_receive_positions() {
        let mut s = scroller();
        let rx = s.subscribe();
        s.queue_scroll(ScrollEvent::new(40.0, 8.0, 1));
        s.flush_scroll();
        // Same position again is not re-emitted
        s.queue_scroll(ScrollEvent::new(40.0, 8.0, 2));
        s.flush_scroll();

        let positions: Vec<_> = rx.try_iter().collect();
        assert_eq!(positions, vec![ScrollPosition { top: 40.0, left: 8.0 }]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut s = scroller();
        drop(s.subscribe());
        s.set_scroll_top(30.0);
        assert!(s.subscribers.is_empty());
    }

    #[test]
    fn test_navigation_targets_are_not_applied() {
        let s = scroller();
        assert_eq!(s.scroll_to_index(52 * 20), 200.0);
        assert_eq!(s.ensure_item_visible(52 * 12), Some(30.0));
        assert_eq!(s.scroll_top(), 0.0);
    }
}
