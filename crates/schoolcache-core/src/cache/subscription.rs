use std::sync::Weak;

use tokio::sync::watch;

use super::store::Inner;
use super::{CacheEntry, CacheStore};
use crate::query::QueryKey;

/// A consumer's interest in one cache key.
///
/// Holding a subscription counts toward the entry's subscribers and keeps
/// the entry from being evicted. Dropping it unsubscribes.
pub struct Subscription {
    key: QueryKey,
    generation: u64,
    receiver: watch::Receiver<CacheEntry>,
    store: Weak<Inner>,
}

impl Subscription {
    pub(crate) fn new(
        key: QueryKey,
        generation: u64,
        receiver: watch::Receiver<CacheEntry>,
        store: Weak<Inner>,
    ) -> Self {
        Self {
            key,
            generation,
            receiver,
            store,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest snapshot of the entry.
    pub fn current(&self) -> CacheEntry {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<CacheEntry> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the entry holds a success or an error.
    pub async fn settled(&mut self) -> Option<CacheEntry> {
        let entry = self.receiver.wait_for(CacheEntry::is_settled).await.ok()?;
        Some((*entry).clone())
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            CacheStore::from_inner(inner).unsubscribe(&self.key, self.generation);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
