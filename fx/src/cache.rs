//! Single-slot persisted rate cache with TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use tracing::{debug, warn};

use convertly_common::{CachedRateTable, Clock, RateTable};

use crate::error::{FxError, FxResult};
use crate::store::KeyValueStore;

/// Outcome of committing a fetched table to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The table now occupies the slot.
    Written,
    /// A later-issued fetch already wrote the slot.
    Superseded,
    /// No cache key is configured.
    Disabled,
}

/// The one cached rate table, stored under a fixed key.
///
/// Writes carry the generation taken when their fetch was issued; a write
/// only lands if no later-issued fetch has written already.
pub struct RateCache {
    store: Arc<dyn KeyValueStore>,
    key: Option<String>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    issued: AtomicU64,
    committed: Mutex<u64>,
}

impl RateCache {
    /// Create a cache over `store`. With `key == None` the cache is inert.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        key: Option<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if key.is_none() {
            warn!("No cache key configured, rates will not be cached");
        }

        Self {
            store,
            key,
            ttl,
            clock,
            issued: AtomicU64::new(0),
            committed: Mutex::new(0),
        }
    }

    /// Load the cached entry, reporting malformed data as an error.
    pub fn load(&self) -> FxResult<Option<CachedRateTable>> {
        let Some(key) = &self.key else {
            return Ok(None);
        };

        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| FxError::Parse(format!("Cached rates under {key:?}: {e}")))
    }

    /// Get the cached entry regardless of age. Unreadable data counts as
    /// no entry.
    pub fn read(&self) -> Option<CachedRateTable> {
        match self.load() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable rate cache");
                None
            }
        }
    }

    /// Whether an entry exists and has not expired.
    pub fn is_fresh(&self) -> bool {
        self.read()
            .map(|entry| entry.is_fresh_at(self.clock.now()))
            .unwrap_or(false)
    }

    /// Take a generation for a fetch that is about to start.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store `table` fetched under `generation`.
    pub fn commit(&self, generation: u64, table: &RateTable) -> FxResult<CommitOutcome> {
        let Some(key) = &self.key else {
            return Ok(CommitOutcome::Disabled);
        };

        let mut committed = self.committed.lock();
        if generation <= *committed {
            debug!(
                generation,
                committed = *committed,
                "Dropping rates from superseded fetch"
            );
            return Ok(CommitOutcome::Superseded);
        }

        let entry = CachedRateTable::new(table.clone(), self.ttl);
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| FxError::Parse(format!("Serializing rates: {e}")))?;
        self.store.set(key, &bytes)?;
        *committed = generation;

        debug!(generation, expires_at = %entry.expires_at, "Cached rates");
        Ok(CommitOutcome::Written)
    }

    /// Remove the cached entry.
    pub fn clear(&self) -> FxResult<()> {
        match &self.key {
            Some(key) => self.store.remove(key),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use convertly_common::{CurrencyCode, ManualClock};
    use std::collections::BTreeMap;

    fn make_table(clock: &ManualClock, usd: f64) -> RateTable {
        let mut rates = BTreeMap::new();
        rates.insert(CurrencyCode::usd(), usd);
        RateTable::new(CurrencyCode::eur(), rates, clock.now())
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, RateCache) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let cache = RateCache::new(
            store.clone(),
            Some("exchange_rates".to_string()),
            Duration::minutes(5),
            clock.clone(),
        );
        (store, clock, cache)
    }

    #[test]
    fn test_cache_commit_and_read() {
        let (_, clock, cache) = setup();
        let table = make_table(&clock, 1.1);

        let generation = cache.begin();
        assert_eq!(cache.commit(generation, &table).unwrap(), CommitOutcome::Written);

        let cached = cache.read().unwrap();
        assert_eq!(cached.table, table);
        assert_eq!(cached.expires_at, table.timestamp + Duration::minutes(5));
    }

    #[test]
    fn test_cache_miss() {
        let (_, _, cache) = setup();
        assert!(cache.read().is_none());
        assert!(!cache.is_fresh());
    }

    #[test]
    fn test_cache_expiry() {
        let (_, clock, cache) = setup();
        let generation = cache.begin();
        cache.commit(generation, &make_table(&clock, 1.1)).unwrap();

        assert!(cache.is_fresh());

        clock.advance(Duration::minutes(5) - Duration::milliseconds(1));
        assert!(cache.is_fresh());

        clock.advance(Duration::milliseconds(1));
        assert!(!cache.is_fresh());
        // Expired entries stay readable for fallback.
        assert!(cache.read().is_some());
    }

    #[test]
    fn test_malformed_entry_is_no_cache() {
        let (store, _, cache) = setup();
        store.set("exchange_rates", b"{not json").unwrap();

        assert!(matches!(cache.load(), Err(FxError::Parse(_))));
        assert!(cache.read().is_none());
        assert!(!cache.is_fresh());
    }

    #[test]
    fn test_superseded_fetch_does_not_overwrite() {
        let (_, clock, cache) = setup();

        let older = cache.begin();
        let newer = cache.begin();

        assert_eq!(
            cache.commit(newer, &make_table(&clock, 1.2)).unwrap(),
            CommitOutcome::Written
        );
        assert_eq!(
            cache.commit(older, &make_table(&clock, 1.1)).unwrap(),
            CommitOutcome::Superseded
        );

        assert_eq!(cache.read().unwrap().table.rate("USD"), Some(1.2));
    }

    #[test]
    fn test_in_order_commits_overwrite() {
        let (_, clock, cache) = setup();

        let first = cache.begin();
        let second = cache.begin();
        cache.commit(first, &make_table(&clock, 1.1)).unwrap();
        cache.commit(second, &make_table(&clock, 1.2)).unwrap();

        assert_eq!(cache.read().unwrap().table.rate("USD"), Some(1.2));
    }

    #[test]
    fn test_without_key_cache_is_inert() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let cache = RateCache::new(store.clone(), None, Duration::minutes(5), clock.clone());

        let generation = cache.begin();
        assert_eq!(
            cache.commit(generation, &make_table(&clock, 1.1)).unwrap(),
            CommitOutcome::Disabled
        );
        assert!(store.is_empty());
        assert!(cache.read().is_none());
    }

    #[test]
    fn test_clear() {
        let (_, clock, cache) = setup();
        let generation = cache.begin();
        cache.commit(generation, &make_table(&clock, 1.1)).unwrap();

        cache.clear().unwrap();
        assert!(cache.read().is_none());
    }
}
