//! GridSession - One Mounted Grid
//!
//! Glue between the four engine components for a single (user, grid) view:
//!
//! ```text
//!   host scroll ──▶ on_scroll ──▶ VirtualScroller ──frame()──▶ state
//!                                      │                         │
//!                                      ▼                         ▼
//!                                 ScrollStore (debounced)   LazyDataCache
//!   host resize ──▶ on_resize ──▶ LayoutResolver ──poll_layout()──┘
//! ```
//!
//! The session is a plain struct owned by the host; nothing here is global.

use std::future::Future;
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::domain::config::GridSettings;
use crate::domain::scroll::{PersistedScrollRecord, ScrollEvent, ScrollKey, ScrollPosition};
use crate::error::Result;
use crate::services::cache::{CacheEntry, CacheMetrics, LazyDataCache};
use crate::services::loader::RangeLoader;
use crate::services::scroll_store::ScrollStore;
use crate::services::storage::ScrollStorage;
use crate::state::layout::{GridLayout, LayoutResolver};
use crate::state::scroller::VirtualScroller;
use crate::state::viewport::{VirtualScrollConfig, VirtualScrollState};

pub struct GridSession<L: RangeLoader, S: ScrollStorage> {
    key: ScrollKey,
    scroller: VirtualScroller,
    cache: LazyDataCache<L>,
    store: ScrollStore<S>,
    resolver: LayoutResolver,
    selected_index: Option<usize>,
}

impl<L: RangeLoader, S: ScrollStorage> GridSession<L, S> {
    /// Build a session. Invalid settings fail here, before anything renders.
    pub fn new(
        settings: &GridSettings,
        loader: L,
        storage: S,
        key: ScrollKey,
        total_items: usize,
    ) -> Result<Self> {
        settings.validate()?;
        let scroller = VirtualScroller::new(settings.viewport_config(total_items)?)?;
        let cache = LazyDataCache::new(loader, total_items, settings.cache_config());
        let mut store = ScrollStore::new(storage, settings.scroll_debounce());
        store.set_enabled(settings.persistence.enabled);
        let resolver = LayoutResolver::new(settings.responsive_layout()?, settings.resize_debounce());

        Ok(Self {
            key,
            scroller,
            cache,
            store,
            resolver,
            selected_index: None,
        })
    }

    // ==================== Lifecycle ====================

    /// Measure the container, resolve the layout and restore the persisted
    /// offset, all before the first window is handed to the host.
    pub fn mount(&mut self, container_width: f64, container_height: f64) -> Result<&VirtualScrollState> {
        let layout = self.resolver.resolve_now(container_width);
        self.scroller.configure(VirtualScrollConfig {
            container_height,
            ..with_layout(*self.scroller.config(), layout)
        })?;

        match self
            .store
            .restore_with_selection(&self.key, self.scroller.config())
        {
            Some(restored) => {
                self.scroller.set_scroll_top(restored.scroll_top);
                self.selected_index = restored.selected_index;
                tracing::info!(
                    key = %self.key,
                    scroll_top = restored.scroll_top,
                    "restored scroll position"
                );
            }
            None => tracing::info!(key = %self.key, "no saved scroll position"),
        }
        Ok(self.scroller.state())
    }

    /// Persist the current position immediately
    pub fn unmount(&mut self) {
        self.persist();
        self.store.flush();
    }

    // ==================== Scroll & Resize ====================

    /// Queue a host scroll event; applied on the next [`frame`](Self::frame)
    pub fn on_scroll(&mut self, event: ScrollEvent) -> bool {
        self.scroller.queue_scroll(event)
    }

    /// Apply the newest queued scroll and return the window to render
    pub fn frame(&mut self) -> &VirtualScrollState {
        if self.scroller.flush_scroll() {
            self.persist();
        }
        self.scroller.state()
    }

    /// Record a container resize. Height applies now; the width goes through
    /// the layout debouncer.
    pub fn on_resize(&mut self, container_width: f64, container_height: f64, now: Instant) -> Result<()> {
        if container_height != self.scroller.config().container_height {
            self.update_container_height(container_height)?;
        }
        self.resolver.observe(container_width, now);
        Ok(())
    }

    /// Apply a settled layout change, keeping the first visible item in view
    pub fn poll_layout(&mut self, now: Instant) -> Result<Option<GridLayout>> {
        let Some(layout) = self.resolver.poll(now) else {
            return Ok(None);
        };
        let config = *self.scroller.config();
        let anchor =
            (self.scroller.scroll_top() / config.item_height).floor() as usize * config.columns;

        self.scroller.configure(with_layout(config, layout))?;
        let target = self.scroller.scroll_to_index(anchor);
        if self.scroller.set_scroll_top(target) {
            self.persist();
        }
        Ok(Some(layout))
    }

    // ==================== Navigation ====================

    /// Jump so the row of `index` is at the top; returns the applied offset
    pub fn scroll_to_index(&mut self, index: usize) -> f64 {
        let target = self.scroller.scroll_to_index(index);
        self.select(index);
        self.scroller.set_scroll_top(target);
        self.persist();
        self.scroller.scroll_top()
    }

    /// Select `index` and scroll the minimum needed to show it fully.
    /// Returns the new offset when scrolling was necessary.
    pub fn ensure_item_visible(&mut self, index: usize) -> Option<f64> {
        self.select(index);
        let target = self.scroller.ensure_item_visible(index);
        if let Some(top) = target {
            self.scroller.set_scroll_top(top);
        }
        self.persist();
        target.map(|_| self.scroller.scroll_top())
    }

    fn select(&mut self, index: usize) {
        let total = self.scroller.config().total_items;
        self.selected_index = (total > 0).then(|| index.min(total - 1));
    }

    fn persist(&self) {
        self.store.save(PersistedScrollRecord::now(
            self.key.clone(),
            self.scroller.scroll_top(),
            self.selected_index,
        ));
    }

    // ==================== Data ====================

    /// Future that loads the current window. Owns everything it needs, so the
    /// host may spawn it.
    pub fn load_visible(&self) -> impl Future<Output = ()> + use<L, S> {
        let cache = self.cache.clone();
        let window = self.scroller.visible_items();
        async move { cache.load_visible_weeks(window).await }
    }

    pub fn get(&self, index: usize) -> Option<CacheEntry<L::Item>> {
        self.cache.get(index)
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    // ==================== Configuration ====================

    /// Replace the viewport configuration, re-clamp the offset and persist it.
    /// A new `total_items` also resets the cache and clamps the selection.
    pub fn configure(&mut self, config: VirtualScrollConfig) -> Result<()> {
        let total_changed = config.total_items != self.scroller.config().total_items;
        self.scroller.configure(config)?;
        if total_changed {
            self.cache.update_total_items(config.total_items);
            if let Some(index) = self.selected_index {
                self.select(index);
            }
        }
        self.persist();
        Ok(())
    }

    pub fn update_total_items(&mut self, total_items: usize) -> Result<()> {
        self.configure(VirtualScrollConfig {
            total_items,
            ..*self.scroller.config()
        })
    }

    pub fn update_columns(&mut self, columns: usize) -> Result<()> {
        self.configure(VirtualScrollConfig {
            columns,
            ..*self.scroller.config()
        })
    }

    pub fn update_item_height(&mut self, item_height: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            item_height,
            ..*self.scroller.config()
        })
    }

    pub fn update_cell_width(&mut self, cell_width: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            cell_width,
            ..*self.scroller.config()
        })
    }

    pub fn update_container_height(&mut self, container_height: f64) -> Result<()> {
        self.configure(VirtualScrollConfig {
            container_height,
            ..*self.scroller.config()
        })
    }

    // ==================== Getters ====================

    pub fn key(&self) -> &ScrollKey {
        &self.key
    }

    pub fn state(&self) -> &VirtualScrollState {
        self.scroller.state()
    }

    pub fn scroller(&self) -> &VirtualScroller {
        &self.scroller
    }

    pub fn cache(&self) -> &LazyDataCache<L> {
        &self.cache
    }

    pub fn layout(&self) -> Option<GridLayout> {
        self.resolver.current()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    /// Scroll position notifications
    pub fn subscribe(&mut self) -> Receiver<ScrollPosition> {
        self.scroller.subscribe()
    }
}

/// Square cells sized by the resolved layout
fn with_layout(config: VirtualScrollConfig, layout: GridLayout) -> VirtualScrollConfig {
    VirtualScrollConfig {
        columns: layout.columns,
        item_height: layout.cell_size,
        cell_width: layout.cell_size,
        ..config
    }
}
