//! Lazy translation cache with per-verse subscriptions
//!
//! [`TranslationService`] owns three pieces of state:
//!
//! 1. **Cache** - verse → translation text for every fetch that ever
//!    succeeded, persisted as one JSON object through the storage port
//! 2. **Transient states** - `Loading` for in-flight fetches and `Failed`
//!    for the most recent failure of an uncached verse
//! 3. **Subscriptions** - a [`Topic`] delivering every state transition of a
//!    verse to the callbacks registered for it
//!
//! A verse has at most one fetch in flight. A second `load_translation` for
//! the same verse registers a temporary subscription and waits for the first
//! fetch to settle instead of issuing its own request.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quran_reader::storage::MemoryStore;
//! use quran_reader::translation::{MockMode, MockSource, TranslationService, VerseKey};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = TranslationService::new(
//!         Arc::new(MockSource::new(MockMode::Echo)),
//!         Arc::new(MemoryStore::new()),
//!     );
//!     let key = VerseKey::new(1, 1).unwrap();
//!     let _sub = service.subscribe(key, |state| println!("{:?}", state));
//!     let text = service.load_translation(key).await;
//!     println!("{}", text);
//! }
//! ```

use crate::error::ReaderError;
use crate::storage::KeyValueStore;
use crate::translation::fallback::FallbackTable;
use crate::translation::key::VerseKey;
use crate::translation::source::TranslationSource;
use crate::translation::state::TranslationState;
use crate::translation::topic::{Subscription, Topic};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Storage key of the persisted translation cache
pub const CACHE_STORAGE_KEY: &str = "urdu_translations_cache";

/// Upper bound on a single remote fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Start offset between consecutive preloads
pub const DEFAULT_PRELOAD_STAGGER: Duration = Duration::from_millis(200);

/// Tunables of the translation cache
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub storage_key: String,
    pub fetch_timeout: Duration,
    pub preload_stagger: Duration,
    pub fallbacks: FallbackTable,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            storage_key: CACHE_STORAGE_KEY.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            preload_stagger: DEFAULT_PRELOAD_STAGGER,
            fallbacks: FallbackTable::builtin(),
        }
    }
}

/// Read-only cache introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of cached translations
    pub total_cached: usize,
    /// Size in bytes of the serialized cache
    pub cache_size: usize,
    /// Number of verses with at least one subscriber
    pub active_observers: usize,
}

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<VerseKey, String>,
    // Loading / Failed for uncached verses only
    transient: HashMap<VerseKey, TranslationState>,
    // Cycle id of the fetch currently in flight for a verse
    in_flight: HashMap<VerseKey, u64>,
    // Callers waiting on a cycle, resolved with its text or fallback
    waiters: HashMap<u64, Vec<oneshot::Sender<String>>>,
    next_cycle: u64,
    // Transitions in the order they were applied, delivered by `flush`
    outbox: VecDeque<(VerseKey, TranslationState)>,
    delivering: bool,
}

struct Inner {
    source: Arc<dyn TranslationSource>,
    store: Arc<dyn KeyValueStore>,
    options: CacheOptions,
    state: Mutex<CacheState>,
    topic: Topic<VerseKey, TranslationState>,
}

/// Settles its cycle as failed if the fetch task ends without settling
struct CycleGuard {
    service: TranslationService,
    key: VerseKey,
    cycle: u64,
    settled: bool,
}

impl CycleGuard {
    fn finish(mut self, outcome: Result<String, ReaderError>) {
        self.settled = true;
        self.service.settle(self.key, self.cycle, outcome);
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.service.settle(
                self.key,
                self.cycle,
                Err(ReaderError::Network(
                    "fetch ended before completing".to_string(),
                )),
            );
        }
    }
}

/// Clears the delivery flag even if a callback panics
struct DeliveryGuard<'a>(&'a TranslationService);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.lock_state().delivering = false;
    }
}

/// Shared handle to the translation cache
///
/// Cloning is cheap; every clone observes and mutates the same cache.
#[derive(Clone)]
pub struct TranslationService {
    inner: Arc<Inner>,
}

impl TranslationService {
    /// Create a service with default options, restoring the persisted cache
    pub fn new(source: Arc<dyn TranslationSource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_options(source, store, CacheOptions::default())
    }

    pub fn with_options(
        source: Arc<dyn TranslationSource>,
        store: Arc<dyn KeyValueStore>,
        options: CacheOptions,
    ) -> Self {
        let entries = restore_cache(store.as_ref(), &options.storage_key);
        info!(
            cached = entries.len(),
            source = source.source_name(),
            "translation cache ready"
        );

        Self {
            inner: Arc::new(Inner {
                source,
                store,
                options,
                state: Mutex::new(CacheState {
                    entries,
                    ..CacheState::default()
                }),
                topic: Topic::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current knowledge about `key`, without side effects
    pub fn get_state(&self, key: VerseKey) -> TranslationState {
        let state = self.lock_state();
        if let Some(text) = state.entries.get(&key) {
            return TranslationState::Loaded(text.clone());
        }
        state.transient.get(&key).cloned().unwrap_or_default()
    }

    /// Register `callback` for every subsequent state transition of `key`
    ///
    /// The callback is not invoked with the current state; call
    /// [`get_state`](Self::get_state) first if a snapshot is needed.
    pub fn subscribe<F>(&self, key: VerseKey, callback: F) -> Subscription
    where
        F: Fn(&TranslationState) + Send + Sync + 'static,
    {
        self.inner.topic.subscribe(key, callback)
    }

    pub fn is_cached(&self, key: VerseKey) -> bool {
        self.lock_state().entries.contains_key(&key)
    }

    /// Cached verses in chapter/verse order
    pub fn cached_keys(&self) -> Vec<VerseKey> {
        self.lock_state().entries.keys().copied().collect()
    }

    /// Fallback text shown for `key` when nothing better is known
    pub fn fallback_text(&self, key: VerseKey) -> String {
        self.inner.options.fallbacks.text_for(key).to_string()
    }

    /// Resolve the translation of `key`: cached, freshly fetched, or fallback
    ///
    /// Never fails. A failed fetch resolves with the fallback text and leaves
    /// the reason in the verse's state for observers. The fetch runs in its
    /// own task, so dropping this future never leaves the verse loading.
    pub async fn load_translation(&self, key: VerseKey) -> String {
        let (rx, started) = {
            let mut state = self.lock_state();
            if let Some(text) = state.entries.get(&key) {
                return text.clone();
            }

            let (cycle, started) = match state.in_flight.get(&key) {
                Some(&cycle) => (cycle, None),
                None => {
                    let cycle = state.next_cycle;
                    state.next_cycle += 1;
                    state.in_flight.insert(key, cycle);
                    state.transient.insert(key, TranslationState::Loading);
                    state.outbox.push_back((key, TranslationState::Loading));
                    (cycle, Some(cycle))
                }
            };
            // Registered under the state lock so the settle cannot slip past us
            let (tx, rx) = oneshot::channel();
            state.waiters.entry(cycle).or_default().push(tx);
            (rx, started)
        };

        match started {
            Some(cycle) => {
                self.flush();
                let guard = CycleGuard {
                    service: self.clone(),
                    key,
                    cycle,
                    settled: false,
                };
                tokio::spawn(async move {
                    let outcome = guard.service.fetch(key).await;
                    guard.finish(outcome);
                });
            }
            None => debug!(%key, "joining in-flight fetch"),
        }

        rx.await.unwrap_or_else(|_| self.fallback_text(key))
    }

    async fn fetch(&self, key: VerseKey) -> Result<String, ReaderError> {
        let timeout = self.inner.options.fetch_timeout;
        match tokio::time::timeout(timeout, self.inner.source.fetch(key)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text),
            Ok(Ok(_)) => Err(ReaderError::InvalidResponse(
                "empty translation text".to_string(),
            )),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ReaderError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Record the outcome of `cycle`, queue its transition and wake its waiters
    ///
    /// A cycle made obsolete by `clear_cache` still caches a success, but only
    /// reports it when no newer cycle for the verse is in flight.
    fn settle(&self, key: VerseKey, cycle: u64, outcome: Result<String, ReaderError>) {
        if let Err(err) = &outcome {
            warn!(%key, error = %err, "error loading translation");
        }

        let (text, waiters) = {
            let mut state = self.lock_state();
            let current = state.in_flight.get(&key) == Some(&cycle);
            if current {
                state.in_flight.remove(&key);
            }

            let text = match outcome {
                Ok(text) => {
                    state.entries.insert(key, text.clone());
                    self.persist(&state.entries);
                    if current {
                        state.transient.remove(&key);
                    }
                    if !state.in_flight.contains_key(&key) {
                        state
                            .outbox
                            .push_back((key, TranslationState::Loaded(text.clone())));
                    }
                    debug!(%key, "translation cached");
                    text
                }
                Err(err) => {
                    let fallback = self.fallback_text(key);
                    if current {
                        let failed = TranslationState::Failed {
                            reason: err.to_string(),
                            fallback: fallback.clone(),
                        };
                        state.transient.insert(key, failed.clone());
                        state.outbox.push_back((key, failed));
                    }
                    fallback
                }
            };
            (text, state.waiters.remove(&cycle).unwrap_or_default())
        };

        self.flush();
        for waiter in waiters {
            let _ = waiter.send(text.clone());
        }
    }

    /// Deliver queued transitions to subscribers, outside the state lock
    ///
    /// One caller delivers at a time, so every subscriber sees transitions in
    /// the order they were applied.
    fn flush(&self) {
        loop {
            let batch = {
                let mut state = self.lock_state();
                if state.delivering || state.outbox.is_empty() {
                    return;
                }
                state.delivering = true;
                std::mem::take(&mut state.outbox)
            };

            let _delivering = DeliveryGuard(self);
            for (key, transition) in &batch {
                self.inner.topic.publish(key, transition);
            }
        }
    }

    // Whole-map rewrite; called with the state lock held so writes stay ordered
    fn persist(&self, entries: &BTreeMap<VerseKey, String>) {
        let serialized = match serde_json::to_string(entries) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "error serializing translation cache");
                return;
            }
        };
        if let Err(e) = self
            .inner
            .store
            .set(&self.inner.options.storage_key, &serialized)
        {
            warn!(error = %e, "error saving translation cache");
        }
    }

    /// Load every key, starting the `i`-th one `i × stagger` after the first
    ///
    /// Returns once every load has settled; a failing verse never stops the
    /// others. The loads are detached tasks and finish even if this future
    /// is dropped.
    pub async fn preload_translations(&self, keys: &[VerseKey]) {
        let stagger = self.inner.options.preload_stagger;

        let tasks: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(index, &key)| {
                let service = self.clone();
                let delay = stagger.saturating_mul(index as u32);
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    service.load_translation(key).await
                })
            })
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "preload task did not complete");
            }
        }
        debug!(count = keys.len(), "preload settled");
    }

    /// Drop every cached translation and transient state
    ///
    /// Subscribers are not notified; they are expected to re-query.
    pub fn clear_cache(&self) {
        {
            let mut state = self.lock_state();
            state.entries.clear();
            state.transient.clear();
            state.in_flight.clear();
        }
        if let Err(e) = self.inner.store.remove(&self.inner.options.storage_key) {
            warn!(error = %e, "error removing persisted translation cache");
        }
        info!("translation cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (total_cached, cache_size) = {
            let state = self.lock_state();
            let size = serde_json::to_string(&state.entries).map_or(0, |s| s.len());
            (state.entries.len(), size)
        };
        CacheStats {
            total_cached,
            cache_size,
            active_observers: self.inner.topic.active_keys(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.inner.source.source_name()
    }
}

impl std::fmt::Debug for TranslationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationService")
            .field("source", &self.inner.source.source_name())
            .field("options", &self.inner.options)
            .finish()
    }
}

fn restore_cache(store: &dyn KeyValueStore, storage_key: &str) -> BTreeMap<VerseKey, String> {
    let raw = match store.get(storage_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            warn!(error = %e, "error loading translation cache");
            return BTreeMap::new();
        }
    };

    let parsed: HashMap<String, String> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "discarding corrupt translation cache");
            return BTreeMap::new();
        }
    };

    parsed
        .into_iter()
        .filter_map(|(key, text)| match key.parse::<VerseKey>() {
            Ok(key) if !text.is_empty() => Some((key, text)),
            Ok(_) => None,
            Err(e) => {
                warn!(%key, error = %e, "skipping cache entry with invalid key");
                None
            }
        })
        .collect()
}
