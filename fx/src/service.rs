//! Rate service: fetch, cache and serve exchange rates.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use convertly_common::{CachedRateTable, Clock, RateTable, SystemClock};

use crate::cache::{CommitOutcome, RateCache};
use crate::config::FxConfig;
use crate::conversion;
use crate::error::FxResult;
use crate::provider::RateProvider;
use crate::store::KeyValueStore;

/// How a rate table was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStatus {
    /// Fetched from the provider just now.
    Fresh,
    /// Served from a cache that has not expired.
    Cached,
    /// Served from cache because the fetch failed.
    Degraded,
}

/// Notification severity of a [`RateStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl RateStatus {
    pub fn severity(&self) -> Severity {
        match self {
            RateStatus::Fresh => Severity::Success,
            RateStatus::Cached => Severity::Warning,
            RateStatus::Degraded => Severity::Error,
        }
    }
}

impl fmt::Display for RateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateStatus::Fresh => write!(f, "fresh"),
            RateStatus::Cached => write!(f, "cached"),
            RateStatus::Degraded => write!(f, "cached (fetch failed)"),
        }
    }
}

/// Result of [`RateService::get_rates_with_cache`].
#[derive(Debug, Clone, PartialEq)]
pub struct RatesOutcome {
    pub table: RateTable,
    pub from_cache: bool,
    pub has_error: bool,
}

impl RatesOutcome {
    pub fn status(&self) -> RateStatus {
        match (self.from_cache, self.has_error) {
            (false, _) => RateStatus::Fresh,
            (true, false) => RateStatus::Cached,
            (true, true) => RateStatus::Degraded,
        }
    }
}

/// Fetches rates from a provider and keeps the last table in a
/// persisted single-slot cache.
pub struct RateService {
    config: FxConfig,
    provider: Arc<dyn RateProvider>,
    cache: RateCache,
    clock: Arc<dyn Clock>,
}

impl RateService {
    /// Create a new rate service on the wall clock.
    pub fn new(
        config: FxConfig,
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_clock(config, provider, store, Arc::new(SystemClock))
    }

    /// Create a new rate service with an explicit clock.
    pub fn with_clock(
        config: FxConfig,
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = RateCache::new(
            store,
            config.cache_key.clone(),
            config.cache_duration,
            clock.clone(),
        );

        Self {
            config,
            provider,
            cache,
            clock,
        }
    }

    pub fn config(&self) -> &FxConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fetch rates from the provider, falling back to the cached table
    /// (however old) if the fetch fails. Errors only when nothing is cached.
    #[instrument(skip(self))]
    pub async fn fetch_fresh(&self) -> FxResult<RateTable> {
        match self.fetch_and_store().await {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!(error = %e, "Failed to fetch rates");
                match self.cache.read() {
                    Some(cached) => {
                        info!(fetched_at = %cached.table.timestamp, "Serving cached rates instead");
                        Ok(cached.into_table())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Last cached table, regardless of age.
    pub fn read_cache(&self) -> Option<CachedRateTable> {
        self.cache.read()
    }

    /// Whether a cached table exists and has not expired.
    pub fn is_cache_fresh(&self) -> bool {
        self.cache.is_fresh()
    }

    /// Drop the cached table.
    pub fn clear_cache(&self) -> FxResult<()> {
        self.cache.clear()
    }

    /// Serve rates, preferring a fresh cache unless `force_refresh` is set.
    ///
    /// A failed fetch is covered by any cached table and reported through
    /// `has_error`; it only propagates when nothing has ever been cached.
    #[instrument(skip(self))]
    pub async fn get_rates_with_cache(&self, force_refresh: bool) -> FxResult<RatesOutcome> {
        if !force_refresh {
            if let Some(cached) = self.cache.read() {
                if cached.is_fresh_at(self.clock.now()) {
                    debug!(expires_at = %cached.expires_at, "Using cached rates");
                    return Ok(RatesOutcome {
                        table: cached.into_table(),
                        from_cache: true,
                        has_error: false,
                    });
                }
            }
        }

        match self.fetch_and_store().await {
            Ok(table) => Ok(RatesOutcome {
                table,
                from_cache: false,
                has_error: false,
            }),
            Err(e) => match self.cache.read() {
                Some(cached) => {
                    warn!(
                        error = %e,
                        fetched_at = %cached.table.timestamp,
                        "Fetch failed, serving cached rates"
                    );
                    Ok(RatesOutcome {
                        table: cached.into_table(),
                        from_cache: true,
                        has_error: true,
                    })
                }
                None => {
                    warn!(error = %e, "Fetch failed and no cached rates exist");
                    Err(e)
                }
            },
        }
    }

    /// Convert `amount` between two currencies using `table`.
    pub fn convert(amount: f64, from: &str, to: &str, table: &RateTable) -> f64 {
        conversion::convert(amount, from, to, table)
    }

    /// Units of `to` per one `from` in `table`.
    pub fn rate_between(from: &str, to: &str, table: &RateTable) -> f64 {
        conversion::rate_between(from, to, table)
    }

    /// Fetch from the provider and persist, without any fallback.
    async fn fetch_and_store(&self) -> FxResult<RateTable> {
        self.config.live_endpoint()?;

        let generation = self.cache.begin();
        let quote = self.provider.fetch_rates().await?;
        let table = RateTable::new(quote.base, quote.rates, self.clock.now());

        match self.cache.commit(generation, &table) {
            Ok(CommitOutcome::Written) => {
                info!(
                    provider = self.provider.name(),
                    base = %table.base,
                    count = table.len(),
                    "Fetched fresh rates"
                )
            }
            Ok(outcome) => debug!(?outcome, "Fetched rates were not cached"),
            Err(e) => warn!(error = %e, "Failed to cache rates"),
        }

        Ok(table)
    }
}
