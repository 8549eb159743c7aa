//! Rate tables and conversion results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::currency::{Currency, CurrencyCode};
use crate::time::Timestamp;

/// Forward rates from a single base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Currency every rate is expressed against.
    pub base: CurrencyCode,
    /// Units of each currency per one unit of `base`.
    pub rates: BTreeMap<CurrencyCode, f64>,
    /// When the table was fetched.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}

impl RateTable {
    /// Create a new rate table.
    pub fn new(base: CurrencyCode, rates: BTreeMap<CurrencyCode, f64>, timestamp: Timestamp) -> Self {
        Self {
            base,
            rates,
            timestamp,
        }
    }

    /// Raw rate entry for a code, if present.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    /// Number of quoted currencies.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// A rate table as persisted in the cache slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRateTable {
    #[serde(flatten)]
    pub table: RateTable,
    /// Absolute expiry, `timestamp + ttl`.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: Timestamp,
}

impl CachedRateTable {
    /// Wrap a table with an expiry `ttl` after its fetch time. An expiry
    /// past the representable range saturates at the last instant.
    pub fn new(table: RateTable, ttl: Duration) -> Self {
        let expires_at = table
            .timestamp
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { table, expires_at }
    }

    /// Check whether the entry is still fresh at `now`.
    pub fn is_fresh_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    pub fn into_table(self) -> RateTable {
        self.table
    }
}

/// Result of converting an amount between two currencies.
///
/// Always derived from a rate table on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub amount: f64,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub converted_amount: f64,
    /// Units of `to_currency` per one `from_currency`.
    pub rate: f64,
    /// Units of `from_currency` per one `to_currency`.
    pub inverse_rate: f64,
    /// Fetch time of the rate table used.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}
