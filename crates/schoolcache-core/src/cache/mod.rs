//! In-memory query cache.
//!
//! This module provides the `CacheStore`, a keyed store of query results
//! with lifecycle state, staleness, single-flight fetching and subscriber
//! counting. Entries are:
//!
//! - created on first read, subscribe or fetch of a key
//! - marked stale by invalidation, keeping their data visible until a
//!   refetch lands
//! - evicted when their last subscriber leaves
//!
//! Subscribers observe entry snapshots through a `Subscription`.

pub mod entry;
pub mod store;
pub mod subscription;

use std::time::Duration;

pub use entry::{CacheEntry, FetchStatus};
pub use store::{CacheStore, Fetcher, QueryResult};
pub use subscription::Subscription;

/// Default time a successful result is served without refetching.
pub const DEFAULT_STALE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub stale_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_ttl: Duration::from_secs(DEFAULT_STALE_TTL_SECS),
        }
    }
}
