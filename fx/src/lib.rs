//! Convertly FX
//!
//! Exchange rate fetching, caching and currency conversion.
//!
//! # Features
//!
//! - Live rates from an HTTP provider, cached in a single persisted slot
//! - Stale-cache fallback when the provider is unreachable
//! - Currency catalog loading with single-flight and a built-in fallback list
//! - Automatic refresh every five minutes, plus manual refresh
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use convertly_fx::{FxConfig, HttpRateProvider, MemoryStore, RateService};
//!
//! let config = FxConfig::from_env();
//! let provider = Arc::new(HttpRateProvider::from_config(reqwest::Client::new(), &config));
//! let service = RateService::new(config, provider, Arc::new(MemoryStore::new()));
//!
//! let outcome = service.get_rates_with_cache(false).await?;
//! let gbp = RateService::convert(100.0, "USD", "GBP", &outcome.table);
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod conversion;
pub mod error;
pub mod provider;
pub mod refresh;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use cache::{CommitOutcome, RateCache};
pub use catalog::{catalog_source, fallback_currencies, CatalogSource, CurrencyLoader};
pub use config::FxConfig;
pub use conversion::compute_conversion;
pub use error::{FxError, FxResult};
pub use provider::{HttpRateProvider, RateProvider, RateQuote};
pub use refresh::{RateRefresher, RefreshReport, LOAD_FAILED_MESSAGE};
pub use scheduler::RefreshScheduler;
pub use service::{RateService, RateStatus, RatesOutcome, Severity};
pub use session::SessionState;
pub use store::{FileStore, KeyValueStore, MemoryStore};
