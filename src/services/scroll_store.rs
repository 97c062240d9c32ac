//! Scroll Position Store
//!
//! Persists the scroll offset per (user, grid) key with a trailing debounce.
//!
//! ## Pattern
//!
//! ```text
//! save(record) ──▶ pending[key] = record, abort old timer, spawn new timer
//!                                                   │ sleep(debounce)
//!                                                   ▼
//!                           take pending[key] if still ours
//!                                                   │ spawn_blocking
//!                                                   ▼
//!                       lock writer[key], skip if a newer id was written ──▶ storage.set
//! ```
//!
//! Every write for a key goes through that key's writer lock, and the lock
//! remembers the newest id written. A record that loses the race to a newer
//! one (timer vs. `flush`) is dropped instead of landing on top of it.
//!
//! Storage failures are logged and swallowed: a broken store behaves like an
//! empty one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use tokio::task::JoinHandle;

use crate::domain::scroll::{PersistedScrollRecord, ScrollKey};
use crate::services::storage::ScrollStorage;
use crate::state::viewport::VirtualScrollConfig;

/// Offset and selection read back from storage, already clamped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoredScroll {
    pub scroll_top: f64,
    pub selected_index: Option<usize>,
}

struct PendingWrite {
    id: u64,
    record: PersistedScrollRecord,
    timer: JoinHandle<()>,
}

/// Id of the newest record written for one key
type Writer = Arc<Mutex<u64>>;

#[derive(Default)]
struct Pending {
    writes: AHashMap<ScrollKey, PendingWrite>,
    writers: AHashMap<ScrollKey, Writer>,
    next_id: u64,
}

impl Pending {
    fn writer(&mut self, key: &ScrollKey) -> Writer {
        self.writers.entry(key.clone()).or_default().clone()
    }
}

/// Debounced, per-key scroll persistence
pub struct ScrollStore<S: ScrollStorage> {
    storage: Arc<S>,
    debounce: Duration,
    enabled: bool,
    pending: Arc<Mutex<Pending>>,
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write `record` unless a newer id already reached storage for its key
fn commit<S: ScrollStorage>(
    storage: &S,
    writer: &Mutex<u64>,
    id: u64,
    record: &PersistedScrollRecord,
) {
    let mut written = writer.lock().unwrap_or_else(PoisonError::into_inner);
    if id <= *written {
        tracing::trace!(key = %record.key, id, newest = *written, "dropping superseded record");
        return;
    }
    write_record(storage, record);
    *written = id;
}

fn write_record<S: ScrollStorage>(storage: &S, record: &PersistedScrollRecord) {
    let json = match serde_json::to_string(record) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key = %record.key, error = %e, "failed to encode scroll record");
            return;
        }
    };
    match storage.set(record.key.as_str(), &json) {
        Ok(()) => tracing::trace!(key = %record.key, top = record.scroll_top, "scroll saved"),
        Err(e) => tracing::warn!(key = %record.key, error = %e, "failed to persist scroll position"),
    }
}

impl<S: ScrollStorage> ScrollStore<S> {
    pub fn new(storage: S, debounce: Duration) -> Self {
        Self {
            storage: Arc::new(storage),
            debounce,
            enabled: true,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn persistence on or off. Disabling drops unsaved records.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            let mut pending = lock(&self.pending);
            for (_, write) in pending.writes.drain() {
                write.timer.abort();
            }
        }
        self.enabled = enabled;
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Number of keys with an unsaved record
    pub fn pending(&self) -> usize {
        lock(&self.pending).writes.len()
    }

    /// Schedule a write of `record`, replacing any unsaved record for the same
    /// key. Must be called from within a Tokio runtime.
    pub fn save(&self, record: PersistedScrollRecord) {
        if !self.enabled {
            return;
        }
        let mut pending = lock(&self.pending);
        pending.next_id += 1;
        let id = pending.next_id;
        let key = record.key.clone();

        let timer = {
            let storage = self.storage.clone();
            let shared = self.pending.clone();
            let debounce = self.debounce;
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                let due = {
                    let mut pending = lock(&shared);
                    match pending.writes.get(&key) {
                        Some(write) if write.id == id => pending
                            .writes
                            .remove(&key)
                            .map(|write| (write.record, pending.writer(&key))),
                        _ => None,
                    }
                };
                let Some((record, writer)) = due else {
                    return;
                };
                let write = tokio::task::spawn_blocking(move || {
                    commit(storage.as_ref(), &writer, id, &record)
                });
                if let Err(e) = write.await {
                    tracing::warn!(%key, error = %e, "scroll write task failed");
                }
            })
        };

        if let Some(old) = pending.writes.insert(key, PendingWrite { id, record, timer }) {
            old.timer.abort();
        }
    }

    /// Write every unsaved record now, on the calling thread.
    ///
    /// Waits for a timer write of the same key that is already in progress.
    pub fn flush(&self) {
        let due: Vec<(PendingWrite, Writer)> = {
            let mut pending = lock(&self.pending);
            let writes: Vec<PendingWrite> =
                pending.writes.drain().map(|(_, write)| write).collect();
            writes
                .into_iter()
                .map(|write| {
                    let writer = pending.writer(&write.record.key);
                    (write, writer)
                })
                .collect()
        };
        for (write, writer) in due {
            write.timer.abort();
            commit(self.storage.as_ref(), &writer, write.id, &write.record);
        }
    }

    /// Stored offset for `key`, clamped to `config`'s scroll range
    pub fn restore(&self, key: &ScrollKey, config: &VirtualScrollConfig) -> Option<f64> {
        self.restore_with_selection(key, config)
            .map(|restored| restored.scroll_top)
    }

    /// Stored offset and selected index, both clamped to `config`
    pub fn restore_with_selection(
        &self,
        key: &ScrollKey,
        config: &VirtualScrollConfig,
    ) -> Option<RestoredScroll> {
        if !self.enabled {
            return None;
        }
        let record = self.read(key)?;
        let selected_index = match (record.selected_index, config.total_items) {
            (_, 0) | (None, _) => None,
            (Some(index), total) => Some(index.min(total - 1)),
        };
        Some(RestoredScroll {
            scroll_top: config.clamp_scroll_top(record.scroll_top),
            selected_index,
        })
    }

    fn read(&self, key: &ScrollKey) -> Option<PersistedScrollRecord> {
        if let Some(write) = lock(&self.pending).writes.get(key) {
            return Some(write.record.clone());
        }
        let raw = match self.storage.get(key.as_str()) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to read scroll position");
                return None;
            }
        };
        match serde_json::from_str::<PersistedScrollRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(%key, error = %e, "ignoring malformed scroll record");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::services::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEBOUNCE: Duration = Duration::from_millis(200);

    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    impl ScrollStorage for CountingStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }
    }

    struct BrokenStorage;

    impl ScrollStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::storage("quota exceeded"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::storage("quota exceeded"))
        }
    }

    fn config(total_items: usize) -> VirtualScrollConfig {
        VirtualScrollConfig::new(total_items, 13.0, 52, 600.0, 2).expect("valid config")
    }

    fn key() -> ScrollKey {
        ScrollKey::new("alice", "weeks")
    }

    fn stored_top(storage: &CountingStorage) -> Option<f64> {
        let raw = storage.get(key().as_str()).expect("get")?;
        let record: PersistedScrollRecord = serde_json::from_str(&raw).expect("json");
        Some(record.scroll_top)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write() {
        let storage = Arc::new(CountingStorage::default());
        let store = ScrollStore::new(storage.clone(), DEBOUNCE);

        for (i, top) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            store.save(PersistedScrollRecord::now(key(), top, None));
        }

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
        assert_eq!(stored_top(&storage), Some(300.0));
        assert_eq!(store.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_debounce_independently() {
        let storage = Arc::new(CountingStorage::default());
        let store = ScrollStore::new(storage.clone(), DEBOUNCE);
        let other = ScrollKey::new("bob", "weeks");

        store.save(PersistedScrollRecord::now(key(), 10.0, None));
        store.save(PersistedScrollRecord::now(other.clone(), 20.0, None));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(storage.writes.load(Ordering::SeqCst), 2);
        assert!(storage.get(other.as_str()).expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let storage = Arc::new(CountingStorage::default());
        let store = ScrollStore::new(storage.clone(), DEBOUNCE);

        store.save(PersistedScrollRecord::now(key(), 42.0, None));
        store.flush();
        assert_eq!(stored_top(&storage), Some(42.0));

        // The aborted timer must not write a second time
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_round_trip() {
        let storage = Arc::new(CountingStorage::default());
        let store = ScrollStore::new(storage.clone(), DEBOUNCE);
        store.save(PersistedScrollRecord::now(key(), 500.0, Some(1000)));
        store.flush();

        // 10000 items: 193 rows, max offset 2509 - 600
        let fresh = ScrollStore::new(storage, DEBOUNCE);
        assert_eq!(fresh.restore(&key(), &config(10_000)), Some(500.0));
        assert_eq!(
            fresh.restore_with_selection(&key(), &config(10_000)),
            Some(RestoredScroll {
                scroll_top: 500.0,
                selected_index: Some(1000),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_reads_unsaved_record() {
        let store = ScrollStore::new(MemoryStorage::new(), DEBOUNCE);
        store.save(PersistedScrollRecord::now(key(), 250.0, None));
        assert_eq!(store.restore(&key(), &config(4000)), Some(250.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_clamps_after_shrink() {
        let store = ScrollStore::new(MemoryStorage::new(), DEBOUNCE);
        store.save(PersistedScrollRecord::now(key(), 900.0, Some(3999)));
        store.flush();

        // 520 items: 10 rows, 130px of content, shorter than the viewport
        let restored = store
            .restore_with_selection(&key(), &config(520))
            .expect("record");
        assert_eq!(restored.scroll_top, 0.0);
        assert_eq!(restored.selected_index, Some(519));

        assert_eq!(
            store
                .restore_with_selection(&key(), &config(0))
                .expect("record")
                .selected_index,
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_or_broken_storage_restores_nothing() {
        let store = ScrollStore::new(MemoryStorage::new(), DEBOUNCE);
        assert_eq!(store.restore(&key(), &config(4000)), None);

        let broken = ScrollStore::new(BrokenStorage, DEBOUNCE);
        broken.save(PersistedScrollRecord::now(key(), 10.0, None));
        broken.flush();
        assert_eq!(broken.restore(&key(), &config(4000)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_record_is_ignored() {
        let storage = MemoryStorage::new();
        storage.set(key().as_str(), "not json").expect("set");
        let store = ScrollStore::new(storage, DEBOUNCE);
        assert_eq!(store.restore(&key(), &config(4000)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_store_is_inert() {
        let storage = Arc::new(CountingStorage::default());
        let mut store = ScrollStore::new(storage.clone(), DEBOUNCE);
        store.save(PersistedScrollRecord::now(key(), 10.0, None));
        store.set_enabled(false);
        store.save(PersistedScrollRecord::now(key(), 20.0, None));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
        assert_eq!(store.restore(&key(), &config(4000)), None);
    }

    /// Memory storage whose first `set` blocks for `delay`
    struct SlowStorage {
        inner: MemoryStorage,
        delay: Duration,
        calls: AtomicUsize,
        written: Mutex<Vec<f64>>,
    }

    impl SlowStorage {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryStorage::new(),
                delay,
                calls: AtomicUsize::new(0),
                written: Mutex::new(Vec::new()),
            }
        }

        fn written(&self) -> Vec<f64> {
            self.written.lock().expect("lock").clone()
        }
    }

    impl ScrollStorage for SlowStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::thread::sleep(self.delay);
            }
            let record: PersistedScrollRecord = serde_json::from_str(value).expect("json");
            self.written.lock().expect("lock").push(record.scroll_top);
            self.inner.set(key, value)
        }
    }

    fn slow_stored_top(storage: &SlowStorage) -> Option<f64> {
        let raw = storage.get(key().as_str()).expect("get")?;
        let record: PersistedScrollRecord = serde_json::from_str(&raw).expect("json");
        Some(record.scroll_top)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_flush_during_slow_timer_write_keeps_newest() {
        let storage = Arc::new(SlowStorage::new(Duration::from_millis(300)));
        let store = ScrollStore::new(storage.clone(), Duration::from_millis(20));

        store.save(PersistedScrollRecord::now(key(), 100.0, None));
        // The timer has fired and its write is stuck inside `set`
        tokio::time::sleep(Duration::from_millis(60)).await;
        store.save(PersistedScrollRecord::now(key(), 900.0, None));
        store.flush();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(storage.written().last(), Some(&900.0));
        assert_eq!(slow_stored_top(&storage), Some(900.0));
        assert_eq!(store.restore(&key(), &config(10_000)), Some(900.0));
    }

    #[test]
    fn test_older_record_never_overwrites_newer() {
        let storage = CountingStorage::default();
        let writer = Mutex::new(0);

        commit(&storage, &writer, 2, &PersistedScrollRecord::now(key(), 900.0, None));
        commit(&storage, &writer, 1, &PersistedScrollRecord::now(key(), 100.0, None));
        commit(&storage, &writer, 2, &PersistedScrollRecord::now(key(), 100.0, None));

        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
        assert_eq!(stored_top(&storage), Some(900.0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_timer_write_does_not_block_the_runtime() {
        let storage = Arc::new(SlowStorage::new(Duration::from_millis(300)));
        let store = ScrollStore::new(storage.clone(), Duration::from_millis(10));

        store.save(PersistedScrollRecord::now(key(), 100.0, None));
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Only one runtime thread: this sleep would wake after the write if
        // `set` ran on it
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(slow_stored_top(&storage), Some(100.0));
    }
}
