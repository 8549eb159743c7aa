//! Rate service configuration.

use chrono::Duration;

use convertly_common::time::constants;
use convertly_common::CurrencyCode;

use crate::error::{FxError, FxResult};

/// Default location of the currency catalog.
pub const DEFAULT_CURRENCIES_SOURCE: &str = "currencies.json";

/// Configuration for the rate service.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// Rate provider endpoint. Required for live fetches.
    pub api_url: Option<String>,
    /// Rate provider API key. Required for live fetches.
    pub api_key: Option<String>,
    /// Storage key of the rate cache slot. Without it nothing is cached.
    pub cache_key: Option<String>,
    /// Lifetime of a cached rate table.
    pub cache_duration: Duration,
    /// Base currency requested from the provider.
    pub base_currency: CurrencyCode,
    /// Catalog location, a URL or a file path.
    pub currencies_source: String,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            cache_key: None,
            cache_duration: constants::default_cache_duration(),
            base_currency: CurrencyCode::eur(),
            currencies_source: DEFAULT_CURRENCIES_SOURCE.to_string(),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        config.api_url = non_empty("API_URL");
        config.api_key = non_empty("API_KEY");
        config.cache_key = non_empty("CACHE_KEY");

        if let Some(duration) = non_empty("CACHE_DURATION") {
            if let Some(ttl) = duration
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(Duration::try_milliseconds)
            {
                config.cache_duration = ttl;
            }
        }

        if let Some(source) = non_empty("CURRENCIES_SOURCE") {
            config.currencies_source = source;
        }

        config
    }

    /// Endpoint and key for a live fetch.
    pub fn live_endpoint(&self) -> FxResult<(&str, &str)> {
        let url = self
            .api_url
            .as_deref()
            .ok_or_else(|| FxError::Config("API_URL is required for live rates".to_string()))?;
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FxError::Config("API_KEY is required for live rates".to_string()))?;
        Ok((url, key))
    }

    /// Validate configuration.
    ///
    /// Missing endpoint, key or cache key are allowed here: the service
    /// degrades at fetch time instead.
    pub fn validate(&self) -> FxResult<()> {
        if self.cache_duration <= Duration::zero() {
            return Err(FxError::Config(
                "CACHE_DURATION must be a positive number of milliseconds".to_string(),
            ));
        }

        if convertly_common::now().checked_add_signed(self.cache_duration).is_none() {
            return Err(FxError::Config("CACHE_DURATION is too large".to_string()));
        }

        if let Some(url) = &self.api_url {
            reqwest::Url::parse(url)
                .map_err(|e| FxError::Config(format!("API_URL is not a valid URL: {e}")))?;
        }

        if self.base_currency.as_str().is_empty() {
            return Err(FxError::Config("Base currency cannot be empty".to_string()));
        }

        if self.currencies_source.trim().is_empty() {
            return Err(FxError::Config("CURRENCIES_SOURCE cannot be empty".to_string()));
        }

        Ok(())
    }
}
