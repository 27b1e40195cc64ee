//! Time-bounded cache for slowly-changing API data.
//!
//! The cache is an explicit value owned by whoever needs it (the API client),
//! so each client and each test gets its own. Entries expire `ttl` after
//! insertion; a zero TTL disables caching entirely.

use moka::future::Cache as MokaCache;
use std::borrow::Borrow;
use std::hash::Hash;
use std::time::Duration;

/// Default number of entries kept before the least used ones are evicted.
const DEFAULT_CAPACITY: u64 = 256;

/// A map whose entries expire `ttl` after insertion.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: MokaCache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        let mut builder = MokaCache::builder().max_capacity(max_capacity);
        if !ttl.is_zero() {
            builder = builder.time_to_live(ttl);
        }
        Self {
            ttl,
            entries: builder.build(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a value that has not expired yet.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key, value).await;
    }

    /// Drop an entry. Returns whether a live one was stored.
    pub async fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).await.is_some()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
