//! Rate provider trait and the HTTP implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use convertly_common::CurrencyCode;

use crate::config::FxConfig;
use crate::error::{FxError, FxResult};

/// Rates as returned by a provider, before they are stamped and cached.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub base: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, f64>,
}

impl RateQuote {
    pub fn new(base: CurrencyCode, rates: BTreeMap<CurrencyCode, f64>) -> Self {
        Self { base, rates }
    }
}

/// Trait for exchange rate providers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest rates against the provider's base currency.
    async fn fetch_rates(&self) -> FxResult<RateQuote>;
}

/// Response body of the rates endpoint.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    rates: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Flag(bool),
    Text(String),
    Detail {
        #[serde(default)]
        info: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ErrorBody {
    /// Error description, or `None` when the field signals no error.
    fn description(self) -> Option<String> {
        match self {
            ErrorBody::Flag(false) => None,
            ErrorBody::Flag(true) => Some("unknown provider error".to_string()),
            ErrorBody::Text(text) => Some(text),
            ErrorBody::Detail { info, message } => Some(
                info.or(message)
                    .unwrap_or_else(|| "unknown provider error".to_string()),
            ),
        }
    }
}

/// Decode a rates response body.
///
/// Entries that are not positive finite numbers are dropped. A missing
/// `base` falls back to `default_base`.
pub(crate) fn decode_rates(body: &[u8], default_base: &CurrencyCode) -> FxResult<RateQuote> {
    let response: RatesResponse = serde_json::from_slice(body)
        .map_err(|e| FxError::Upstream(format!("Invalid response body: {e}")))?;

    if let Some(description) = response.error.and_then(ErrorBody::description) {
        return Err(FxError::Upstream(description));
    }

    let base = response
        .base
        .filter(|b| !b.trim().is_empty())
        .map(CurrencyCode::new)
        .unwrap_or_else(|| default_base.clone());

    let mut rates = BTreeMap::new();
    for (code, value) in response.rates.unwrap_or_default() {
        match value.as_f64() {
            Some(rate) if rate.is_finite() && rate > 0.0 => {
                rates.insert(CurrencyCode::new(code), rate);
            }
            _ => debug!(code = %code, value = %value, "Dropping unusable rate"),
        }
    }

    Ok(RateQuote::new(base, rates))
}

/// Build the request URL, replacing any `api_key`/`base` already present.
pub(crate) fn request_url(api_url: &str, api_key: &str, base: &CurrencyCode) -> FxResult<Url> {
    let mut url = Url::parse(api_url)
        .map_err(|e| FxError::Config(format!("API_URL is not a valid URL: {e}")))?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "api_key" && k != "base")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("api_key", api_key);
        pairs.append_pair("base", base.as_str());
    }

    Ok(url)
}

/// Rate provider backed by a remote HTTP API.
pub struct HttpRateProvider {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    base: CurrencyCode,
}

impl HttpRateProvider {
    /// Create a provider from configuration. Missing endpoint or key are
    /// reported on each fetch, not here.
    pub fn from_config(client: Client, config: &FxConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            base: config.base_currency.clone(),
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "HTTP"
    }

    #[instrument(skip(self), fields(base = %self.base))]
    async fn fetch_rates(&self) -> FxResult<RateQuote> {
        let (api_url, api_key) = match (&self.api_url, &self.api_key) {
            (Some(url), Some(key)) => (url.as_str(), key.as_str()),
            _ => {
                return Err(FxError::Config(
                    "API_URL and API_KEY are required for live rates".to_string(),
                ))
            }
        };

        let url = request_url(api_url, api_key, &self.base)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Rate provider returned an error status");
            return Err(FxError::Network {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = response.bytes().await?;
        let quote = decode_rates(&body, &self.base)?;

        debug!(base = %quote.base, count = quote.rates.len(), "Fetched rates");
        Ok(quote)
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    quote: parking_lot::Mutex<Option<RateQuote>>,
    failure: parking_lot::Mutex<Option<String>>,
    gate: parking_lot::Mutex<Option<std::sync::Arc<tokio::sync::Notify>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider with no rates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quote: parking_lot::Mutex::new(None),
            failure: parking_lot::Mutex::new(None),
            gate: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve the given rates from now on.
    pub fn set_rates(&self, base: &str, rates: &[(&str, f64)]) {
        let rates = rates
            .iter()
            .map(|(code, rate)| (CurrencyCode::new(*code), *rate))
            .collect();
        *self.quote.lock() = Some(RateQuote::new(CurrencyCode::new(base), rates));
    }

    /// Fail every fetch with a network error until `recover` is called.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Make fetches wait until the returned handle is notified.
    pub fn hold(&self) -> std::sync::Arc<tokio::sync::Notify> {
        let gate = std::sync::Arc::new(tokio::sync::Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Number of fetches attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> FxResult<RateQuote> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(message) = self.failure.lock().clone() {
            return Err(FxError::network(message));
        }

        self.quote
            .lock()
            .clone()
            .ok_or_else(|| FxError::Upstream("no rates configured".to_string()))
    }
}
