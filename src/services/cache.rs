//! Lazy Data Cache
//!
//! Bounded index → item cache in front of a [`RangeLoader`].
//!
//! ## Pattern
//!
//! ```text
//! load_visible_weeks(indices)
//!       │  widen by prefetch_count, mark window protected
//!       ▼
//! missing indices ──coalesce──▶ contiguous runs ──tokio::spawn──▶ loader
//!       │                                                           │
//! pending indices ──attach to in-flight Shared future               │
//!       │                                                           ▼
//!       └──────────── await all ◀──────── complete(): Ready / Error, evict LRU
//! ```
//!
//! Loads run as detached tasks, so results that arrive after the window has
//! moved on are still cached. The map lock is never held across an await.

use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use hashlink::LinkedHashMap;

use crate::constants::{DEFAULT_CACHE_SIZE, DEFAULT_PREFETCH_COUNT};
use crate::error::Result;
use crate::services::loader::RangeLoader;

/// Load state of one cached index
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState<T> {
    /// Load requested, not settled yet
    Pending,
    /// Loaded data
    Ready(T),
    /// Loader failed; retried on the next explicit request
    Error(Arc<str>),
}

/// A cache slot. Returned by value; the cache may evict the original at any time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub index: usize,
    pub last_accessed: Instant,
    pub state: EntryState<T>,
}

impl<T> CacheEntry<T> {
    /// Loaded data, if any
    pub fn data(&self) -> Option<&T> {
        match &self.state {
            EntryState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EntryState::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }
}

/// Counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    /// `hits / (hits + misses)`, 0 before any read
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Soft bound on cached entries
    pub cache_size: usize,
    /// Extra indices loaded on each side of a request
    pub prefetch_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            prefetch_count: DEFAULT_PREFETCH_COUNT,
        }
    }
}

type InFlight = Shared<BoxFuture<'static, ()>>;

struct Inner<T> {
    /// Front is least recently accessed
    entries: LinkedHashMap<usize, CacheEntry<T>>,
    /// Index → (load id, shared completion)
    in_flight: AHashMap<usize, (u64, InFlight)>,
    /// Active visible + prefetch window, never evicted
    protected: Vec<Range<usize>>,
    capacity: usize,
    prefetch_count: usize,
    total_items: usize,
    /// Bumped on reset; loads from an older generation are discarded
    generation: u64,
    next_load_id: u64,
    over_capacity: bool,
    metrics: CacheMetrics,
}

impl<T: Clone> Inner<T> {
    fn is_protected(&self, index: usize) -> bool {
        self.protected.iter().any(|r| r.contains(&index))
    }

    /// Widen each requested index by the prefetch margin and merge into
    /// sorted, disjoint ranges clamped to the index space.
    fn window(&self, indices: impl IntoIterator<Item = usize>) -> Vec<Range<usize>> {
        let mut wanted: Vec<usize> = indices
            .into_iter()
            .filter(|&i| i < self.total_items)
            .collect();
        wanted.sort_unstable();
        wanted.dedup();

        let mut ranges: Vec<Range<usize>> = Vec::new();
        for i in wanted {
            let start = i.saturating_sub(self.prefetch_count);
            let end = i
                .saturating_add(self.prefetch_count)
                .saturating_add(1)
                .min(self.total_items);
            match ranges.last_mut() {
                Some(last) if start <= last.end => last.end = last.end.max(end),
                _ => ranges.push(start..end),
            }
        }
        ranges
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .find(|(index, entry)| !entry.is_pending() && !self.is_protected(**index))
                .map(|(index, _)| *index);

            let Some(index) = victim else {
                if !self.over_capacity {
                    tracing::warn!(
                        len = self.entries.len(),
                        capacity = self.capacity,
                        "cache over capacity: visible window is larger than cache_size"
                    );
                    self.over_capacity = true;
                }
                return;
            };

            self.entries.remove(&index);
            self.metrics.evictions += 1;
        }
        self.over_capacity = false;
    }

    fn complete(&mut self, range: Range<usize>, generation: u64, result: Result<Vec<T>>) {
        if generation != self.generation {
            tracing::debug!(?range, "discarding load from before cache reset");
            return;
        }
        let now = Instant::now();
        match result {
            Ok(items) => {
                let returned = items.len();
                let mut items = items.into_iter();
                for index in range.clone() {
                    let state = match items.next() {
                        Some(item) => EntryState::Ready(item),
                        None => EntryState::Error(
                            format!("loader returned {returned} items for {range:?}").into(),
                        ),
                    };
                    self.settle(index, state, now);
                }
                tracing::trace!(?range, returned, "range loaded");
            }
            Err(err) => {
                tracing::warn!(?range, error = %err, "range load failed");
                let reason: Arc<str> = err.to_string().into();
                for index in range {
                    self.settle(index, EntryState::Error(reason.clone()), now);
                }
            }
        }
        self.evict();
    }

    fn settle(&mut self, index: usize, state: EntryState<T>, now: Instant) {
        self.in_flight.remove(&index);
        self.entries.insert(
            index,
            CacheEntry {
                index,
                last_accessed: now,
                state,
            },
        );
    }
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Asynchronous, bounded, LRU cache keyed by item index
pub struct LazyDataCache<L: RangeLoader> {
    loader: Arc<L>,
    inner: Arc<Mutex<Inner<L::Item>>>,
}

impl<L: RangeLoader> Clone for LazyDataCache<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: RangeLoader> LazyDataCache<L> {
    /// Create a cache for `total_items` indices
    pub fn new(loader: L, total_items: usize, config: CacheConfig) -> Self {
        Self {
            loader: Arc::new(loader),
            inner: Arc::new(Mutex::new(Inner {
                entries: LinkedHashMap::new(),
                in_flight: AHashMap::new(),
                protected: Vec::new(),
                capacity: config.cache_size,
                prefetch_count: config.prefetch_count,
                total_items,
                generation: 0,
                next_load_id: 0,
                over_capacity: false,
                metrics: CacheMetrics::default(),
            })),
        }
    }

    /// Ensure `indices` plus the prefetch margin are cached.
    ///
    /// Missing or failed indices are fetched in as few loader calls as the
    /// gaps allow; indices already loading attach to the existing load.
    /// Resolves once every load this call depends on has settled. Must be
    /// polled inside a Tokio runtime.
    pub async fn load_visible_weeks(&self, indices: impl IntoIterator<Item = usize>) {
        let waits = self.schedule(indices);
        if !waits.is_empty() {
            join_all(waits).await;
        }
    }

    fn schedule(&self, indices: impl IntoIterator<Item = usize>) -> Vec<InFlight> {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        let window = inner.window(indices);
        if window.is_empty() {
            return Vec::new();
        }
        inner.protected = window.clone();

        let mut missing = Vec::new();
        let mut attached = AHashSet::new();
        let mut waits = Vec::new();
        for index in window.iter().flat_map(|r| r.clone()) {
            match inner.entries.get(&index).map(|e| &e.state) {
                Some(EntryState::Ready(_)) => {}
                Some(EntryState::Pending) => {
                    if let Some((id, fut)) = inner.in_flight.get(&index) {
                        if attached.insert(*id) {
                            waits.push(fut.clone());
                        }
                    }
                }
                Some(EntryState::Error(_)) | None => missing.push(index),
            }
        }

        if missing.is_empty() {
            return waits;
        }

        inner.metrics.misses += missing.len() as u64;
        let now = Instant::now();
        for &index in &missing {
            inner.entries.insert(
                index,
                CacheEntry {
                    index,
                    last_accessed: now,
                    state: EntryState::Pending,
                },
            );
        }

        for run in coalesce(&missing) {
            let id = inner.next_load_id;
            inner.next_load_id += 1;
            tracing::debug!(range = ?run, "loading range");
            let fut = self.spawn_load(run.clone(), inner.generation);
            for index in run {
                inner.in_flight.insert(index, (id, fut.clone()));
            }
            waits.push(fut);
        }

        inner.evict();
        waits
    }

    fn spawn_load(&self, range: Range<usize>, generation: u64) -> InFlight {
        let load = self.loader.load(range.clone());
        let inner = Arc::clone(&self.inner);
        let on_panic = Arc::clone(&self.inner);
        let failed_range = range.clone();

        let handle = tokio::spawn(async move {
            let result = load.await;
            lock(&inner).complete(range, generation, result);
        });

        handle
            .map(move |joined| {
                if let Err(err) = joined {
                    let reason: Arc<str> = format!("load task failed: {err}").into();
                    let mut inner = lock(&on_panic);
                    if inner.generation == generation {
                        let now = Instant::now();
                        for index in failed_range {
                            inner.settle(index, EntryState::Error(reason.clone()), now);
                        }
                    }
                }
            })
            .boxed()
            .shared()
    }

    /// Current entry for `index`, without blocking. Counts as an access for
    /// LRU purposes; a `Ready` entry counts as a hit.
    pub fn get(&self, index: usize) -> Option<CacheEntry<L::Item>> {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let entry = inner.entries.to_back(&index)?;
        entry.last_accessed = Instant::now();
        let entry = entry.clone();
        if entry.is_ready() {
            inner.metrics.hits += 1;
        }
        Some(entry)
    }

    /// Entry for `index` without touching LRU order or metrics
    pub fn peek(&self, index: usize) -> Option<CacheEntry<L::Item>> {
        lock(&self.inner).entries.get(&index).cloned()
    }

    pub fn metrics(&self) -> CacheMetrics {
        lock(&self.inner).metrics
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner).capacity
    }

    /// Number of indices with a load in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.inner).in_flight.len()
    }

    /// Cached indices from least to most recently accessed
    pub fn lru_order(&self) -> Vec<usize> {
        lock(&self.inner).entries.keys().copied().collect()
    }

    /// Change the capacity; shrinking evicts down to the new bound
    pub fn update_cache_size(&self, cache_size: usize) {
        let mut inner = lock(&self.inner);
        inner.capacity = cache_size;
        inner.evict();
    }

    pub fn update_prefetch_count(&self, prefetch_count: usize) {
        lock(&self.inner).prefetch_count = prefetch_count;
    }

    /// Resize the index space. Old indices are meaningless after a change, so
    /// any change resets the cache.
    pub fn update_total_items(&self, total_items: usize) {
        let mut inner = lock(&self.inner);
        if inner.total_items != total_items {
            inner.total_items = total_items;
            drop(inner);
            self.reset();
        }
    }

    /// Drop all entries, in-flight bookkeeping and metrics. Loads still running
    /// are discarded when they finish.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.entries.clear();
        inner.in_flight.clear();
        inner.protected.clear();
        inner.generation += 1;
        inner.over_capacity = false;
        inner.metrics = CacheMetrics::default();
        tracing::debug!(generation = inner.generation, "cache reset");
    }
}

/// Split sorted indices into contiguous runs
fn coalesce(sorted: &[usize]) -> Vec<Range<usize>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    for &index in sorted {
        match runs.last_mut() {
            Some(run) if run.end == index => run.end += 1,
            _ => runs.push(index..index + 1),
        }
    }
    runs
}
