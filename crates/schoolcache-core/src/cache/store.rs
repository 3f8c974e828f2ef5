// Single-flight: each key has at most one tracked fetch. Every fetch gets a
// per-key sequence number when issued; a result is applied only if its
// sequence is newer than the last applied one, so a slow response can
// never overwrite the result of a fetch issued after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CacheEntry, CacheSettings, FetchStatus, Subscription};
use crate::query::{KeyPrefix, QueryData, QueryError, QueryKey};

pub type QueryResult = Result<Arc<QueryData>, QueryError>;

/// Produces a fresh fetch of one key's data each time it is called.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<QueryData, QueryError>> + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, QueryResult>>;

struct InFlight {
    seq: u64,
    fetch: SharedFetch,
}

struct Slot {
    /// Distinguishes this slot from earlier ones for the same key.
    generation: u64,
    entry: CacheEntry,
    fetched: Option<Instant>,
    fetcher: Option<Fetcher>,
    in_flight: Option<InFlight>,
    /// Sequence of the most recently issued fetch.
    issued: u64,
    /// Sequence of the most recently applied result.
    applied: u64,
    evict_when_idle: bool,
    notify: watch::Sender<CacheEntry>,
}

impl Slot {
    fn new(key: &QueryKey, generation: u64) -> Self {
        let entry = CacheEntry::new(key.clone());
        let (notify, _) = watch::channel(entry.clone());
        Self {
            generation,
            entry,
            fetched: None,
            fetcher: None,
            in_flight: None,
            issued: 0,
            applied: 0,
            evict_when_idle: false,
            notify,
        }
    }

    fn publish(&self) {
        self.notify.send_replace(self.entry.clone());
    }

    fn fresh_data(&self, stale_ttl: Duration) -> Option<Arc<QueryData>> {
        let fresh = self.entry.status == FetchStatus::Success
            && !self.entry.stale
            && self.fetched.map(|at| at.elapsed() < stale_ttl).unwrap_or(false);
        if fresh {
            self.entry.data.clone()
        } else {
            None
        }
    }
}

pub(crate) struct Inner {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    next_generation: AtomicU64,
    settings: CacheSettings,
}

/// Shared handle to one cache. Clones refer to the same entries.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl CacheStore {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                settings,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn settings(&self) -> CacheSettings {
        self.inner.settings
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_slot(&self, key: &QueryKey) -> Slot {
        Slot::new(key, self.inner.next_generation.fetch_add(1, Ordering::Relaxed))
    }

    /// Snapshot of the entry for `key`, creating an idle entry if absent.
    pub fn read(&self, key: &QueryKey) -> CacheEntry {
        let mut slots = self.slots();
        slots
            .entry(key.clone())
            .or_insert_with(|| self.new_slot(key))
            .entry
            .clone()
    }

    /// Snapshot of the entry for `key` without creating one.
    pub fn peek(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.slots().get(key).map(|slot| slot.entry.clone())
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.slots().values().map(|s| s.entry.clone()).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return cached data if it is fresh, otherwise fetch it.
    ///
    /// A caller that finds a fetch already running for `key` waits for that
    /// fetch instead of starting another one. Each caller receives the
    /// result of the fetch it waited on.
    pub async fn ensure_fresh(&self, key: &QueryKey, fetcher: Fetcher, stale_ttl: Duration) -> QueryResult {
        let fetch = {
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_insert_with(|| self.new_slot(key));
            slot.fetcher = Some(fetcher.clone());

            if let Some(data) = slot.fresh_data(stale_ttl) {
                debug!(key = %key, "Cache hit");
                return Ok(data);
            }

            match slot.in_flight {
                Some(ref flight) => {
                    debug!(key = %key, seq = flight.seq, "Joining in-flight fetch");
                    flight.fetch.clone()
                }
                None => self.start_fetch(key, slot, &fetcher),
            }
        };
        fetch.await
    }

    /// Like `get_or_fetch`, but only for an entry that still has subscribers.
    /// Returns `None` without fetching when the entry is gone or unwatched.
    pub async fn refresh_subscribed(&self, key: &QueryKey, fetcher: Fetcher) -> Option<QueryResult> {
        let stale_ttl = self.inner.settings.stale_ttl;
        let fetch = {
            let mut slots = self.slots();
            let slot = slots.get_mut(key).filter(|slot| slot.entry.subscribers > 0)?;
            slot.fetcher = Some(fetcher.clone());

            if let Some(data) = slot.fresh_data(stale_ttl) {
                return Some(Ok(data));
            }
            match slot.in_flight {
                Some(ref flight) => flight.fetch.clone(),
                None => self.start_fetch(key, slot, &fetcher),
            }
        };
        Some(fetch.await)
    }

    /// `ensure_fresh` with the store's configured TTL.
    pub async fn get_or_fetch(&self, key: &QueryKey, fetcher: Fetcher) -> QueryResult {
        self.ensure_fresh(key, fetcher, self.inner.settings.stale_ttl).await
    }

    /// Start a new fetch with the key's registered fetcher, superseding any
    /// fetch already running.
    pub async fn refetch(&self, key: &QueryKey) -> QueryResult {
        let fetch = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(key)
                .ok_or_else(|| QueryError::validation(format!("no cache entry for {}", key)))?;
            let fetcher = slot
                .fetcher
                .clone()
                .ok_or_else(|| QueryError::validation(format!("no fetcher registered for {}", key)))?;
            self.start_fetch(key, slot, &fetcher)
        };
        fetch.await
    }

    fn start_fetch(&self, key: &QueryKey, slot: &mut Slot, fetcher: &Fetcher) -> SharedFetch {
        slot.issued += 1;
        let seq = slot.issued;
        slot.entry.status = FetchStatus::Loading;
        slot.publish();
        debug!(key = %key, seq, "Starting fetch");

        // The task owns the fetch so it completes and lands in the cache even
        // when every waiter has gone away. It must not keep the store alive.
        let store = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let request = fetcher();
        let handle = tokio::spawn(async move {
            let result = request.await.map(Arc::new);
            if let Some(inner) = store.upgrade() {
                CacheStore::from_inner(inner).complete(&task_key, seq, &result);
            }
            result
        });

        let fetch = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(QueryError::Aborted(e.to_string())))
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            seq,
            fetch: fetch.clone(),
        });
        fetch
    }

    fn complete(&self, key: &QueryKey, seq: u64, result: &QueryResult) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key) else {
            debug!(key = %key, seq, "Entry evicted before fetch completed");
            return;
        };

        if seq <= slot.applied {
            warn!(key = %key, seq, applied = slot.applied, "Discarding out-of-order fetch result");
            return;
        }
        slot.applied = seq;
        let latest = seq == slot.issued;

        match result {
            Ok(data) => {
                slot.entry.data = Some(Arc::clone(data));
                slot.entry.error = None;
                slot.entry.fetched_at = Some(Utc::now());
                slot.fetched = Some(Instant::now());
                // Data from a fetch issued before an invalidation is still stale
                if latest {
                    slot.entry.stale = false;
                }
                debug!(key = %key, seq, count = data.len(), "Fetch applied");
            }
            Err(e) => {
                warn!(key = %key, seq, error = %e, "Fetch failed");
                slot.entry.error = Some(e.clone());
            }
        }

        let superseded = slot.in_flight.as_ref().is_some_and(|f| f.seq != seq);
        if !superseded {
            slot.in_flight = None;
            slot.entry.status = if result.is_ok() {
                FetchStatus::Success
            } else {
                FetchStatus::Error
            };
        }
        slot.publish();

        if slot.evict_when_idle && slot.entry.subscribers == 0 && slot.in_flight.is_none() {
            slots.remove(key);
            debug!(key = %key, "Evicted entry after fetch completed");
        }
    }

    /// Mark every entry under `prefix` stale. Subscribed entries refetch
    /// right away; the rest refetch on their next `ensure_fresh`.
    /// Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        let mut slots = self.slots();
        let mut marked = 0;
        for (key, slot) in slots.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            marked += 1;
            slot.entry.stale = true;

            match slot.fetcher.clone() {
                Some(fetcher) if slot.entry.subscribers > 0 => {
                    let _ = self.start_fetch(key, slot, &fetcher);
                }
                _ => {
                    // A running fetch may predate the mutation. Stop tracking
                    // it so the next caller starts a new one; its result will
                    // still land, but the entry stays stale.
                    if slot.in_flight.take().is_some() {
                        slot.issued += 1;
                    }
                    slot.publish();
                }
            }
        }
        debug!(prefix = %prefix, marked, "Invalidated cache entries");
        marked
    }

    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_insert_with(|| self.new_slot(key));
        slot.entry.subscribers += 1;
        slot.evict_when_idle = false;
        slot.publish();
        let receiver = slot.notify.subscribe();
        Subscription::new(key.clone(), slot.generation, receiver, Arc::downgrade(&self.inner))
    }

    /// Drop one subscriber from the slot generation the handle was issued
    /// for. Handles from a slot that has since been cleared are ignored.
    pub(crate) fn unsubscribe(&self, key: &QueryKey, generation: u64) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key).filter(|slot| slot.generation == generation) else {
            debug!(key = %key, generation, "Ignoring unsubscribe from a previous entry");
            return;
        };
        slot.entry.subscribers = slot.entry.subscribers.saturating_sub(1);
        if slot.entry.subscribers > 0 {
            slot.publish();
            return;
        }

        if slot.in_flight.is_some() {
            slot.evict_when_idle = true;
            slot.publish();
            debug!(key = %key, "Last subscriber left during fetch, eviction deferred");
        } else {
            slots.remove(key);
            debug!(key = %key, "Last subscriber left, entry evicted");
        }
    }

    /// Drop every entry. Subscriptions see their channel close and running
    /// fetches complete without touching the store.
    pub fn clear(&self) {
        let mut slots = self.slots();
        let count = slots.len();
        slots.clear();
        debug!(count, "Cache cleared");
    }
}
