//! Currency catalog sources and the single-flight catalog loader.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use convertly_common::Currency;

use crate::error::{FxError, FxResult};

/// Where the currency catalog comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Fetch and decode the catalog.
    async fn fetch_catalog(&self) -> FxResult<Vec<Currency>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<Currency>),
    Wrapped { currencies: Vec<Currency> },
}

/// Decode a catalog document: either a bare array of records or an object
/// with a `currencies` array.
pub(crate) fn decode_catalog(bytes: &[u8]) -> FxResult<Vec<Currency>> {
    let document: CatalogDocument = serde_json::from_slice(bytes)
        .map_err(|e| FxError::Parse(format!("Currency catalog: {e}")))?;

    Ok(match document {
        CatalogDocument::List(currencies) => currencies,
        CatalogDocument::Wrapped { currencies } => currencies,
    })
}

/// Catalog served over HTTP.
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch_catalog(&self) -> FxResult<Vec<Currency>> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Network {
                status: Some(status.as_u16()),
                message: format!(
                    "Failed to load currencies: {}",
                    status.canonical_reason().unwrap_or("unexpected status")
                ),
            });
        }

        let body = response.bytes().await?;
        decode_catalog(&body)
    }
}

/// Catalog read from a JSON file.
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_catalog(&self) -> FxResult<Vec<Currency>> {
        let bytes = tokio::fs::read(&self.path).await?;
        decode_catalog(&bytes)
    }
}

/// Pick a catalog source for a location: URLs go over HTTP, anything else
/// is a file path.
pub fn catalog_source(location: &str, client: Client) -> Arc<dyn CatalogSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpCatalogSource::new(client, location))
    } else {
        Arc::new(FileCatalogSource::new(location))
    }
}

/// Catalog used when the real one cannot be loaded.
pub fn fallback_currencies() -> Vec<Currency> {
    vec![
        Currency::new("USD", "US Dollar", "$"),
        Currency::new("EUR", "Euro", "€"),
        Currency::new("GBP", "British Pound Sterling", "£"),
        Currency::new("JPY", "Japanese Yen", "¥"),
        Currency::new("CHF", "Swiss Franc", "Fr"),
        Currency::new("CAD", "Canadian Dollar", "C$"),
        Currency::new("AUD", "Australian Dollar", "A$"),
        Currency::new("CNY", "Chinese Yuan", "¥"),
        Currency::new("SEK", "Swedish Krona", "kr"),
        Currency::new("NOK", "Norwegian Krone", "kr"),
    ]
}

/// Look a currency up by code.
pub fn find_by_code<'a>(code: &str, catalog: &'a [Currency]) -> Option<&'a Currency> {
    catalog.iter().find(|c| c.code.as_str() == code)
}

/// Default conversion pair: USD → EUR when both exist, otherwise the first
/// and second catalog entries.
pub fn default_pair(catalog: &[Currency]) -> Option<(Currency, Currency)> {
    let from = find_by_code("USD", catalog).or_else(|| catalog.first())?;
    let to = find_by_code("EUR", catalog).or_else(|| catalog.get(1))?;
    Some((from.clone(), to.clone()))
}

type PendingCatalog = Shared<BoxFuture<'static, Arc<Vec<Currency>>>>;

#[derive(Default)]
struct LoaderState {
    catalog: Option<Arc<Vec<Currency>>>,
    in_flight: Option<PendingCatalog>,
}

/// Loads the currency catalog once.
///
/// Concurrent callers share a single in-flight fetch. Whatever the fetch
/// produces, including the fallback list after a failure, is kept for the
/// lifetime of the loader.
pub struct CurrencyLoader {
    source: Arc<dyn CatalogSource>,
    state: Arc<Mutex<LoaderState>>,
}

impl CurrencyLoader {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    /// Get the catalog, fetching it if this is the first call.
    pub async fn load(&self) -> Arc<Vec<Currency>> {
        let pending = {
            let mut state = self.state.lock();

            if let Some(catalog) = &state.catalog {
                return catalog.clone();
            }

            match &state.in_flight {
                Some(pending) => {
                    debug!("Joining in-flight catalog load");
                    pending.clone()
                }
                None => {
                    let pending = Self::fetch(self.source.clone(), self.state.clone())
                        .boxed()
                        .shared();
                    state.in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// The catalog, if it has been loaded.
    pub fn cached(&self) -> Option<Arc<Vec<Currency>>> {
        self.state.lock().catalog.clone()
    }

    async fn fetch(
        source: Arc<dyn CatalogSource>,
        state: Arc<Mutex<LoaderState>>,
    ) -> Arc<Vec<Currency>> {
        let catalog = match source.fetch_catalog().await {
            Ok(currencies) if !currencies.is_empty() => {
                info!(
                    source = %source.describe(),
                    count = currencies.len(),
                    "Loaded currency catalog"
                );
                currencies
            }
            Ok(_) => {
                warn!(source = %source.describe(), "Currency catalog is empty, using fallback list");
                fallback_currencies()
            }
            Err(e) => {
                warn!(
                    source = %source.describe(),
                    error = %e,
                    "Failed to load currencies, using fallback list"
                );
                fallback_currencies()
            }
        };

        let catalog = Arc::new(catalog);
        let mut state = state.lock();
        state.catalog = Some(catalog.clone());
        state.in_flight = None;
        catalog
    }
}

/// Mock catalog source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockCatalogSource {
    currencies: Mutex<Option<Vec<Currency>>>,
    gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockCatalogSource {
    /// A source that serves `currencies`.
    pub fn serving(currencies: Vec<Currency>) -> Self {
        Self {
            currencies: Mutex::new(Some(currencies)),
            gate: Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails.
    pub fn failing() -> Self {
        Self {
            currencies: Mutex::new(None),
            gate: Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Make fetches wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<tokio::sync::Notify> {
        let gate = Arc::new(tokio::sync::Notify::new());
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
impl CatalogSource for MockCatalogSource {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn fetch_catalog(&self) -> FxResult<Vec<Currency>> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.currencies
            .lock()
            .clone()
            .ok_or_else(|| FxError::network("catalog unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready};

    fn sample_catalog() -> Vec<Currency> {
        vec![
            Currency::new("GBP", "British Pound Sterling", "£"),
            Currency::new("EUR", "Euro", "€"),
            Currency::new("USD", "US Dollar", "$"),
        ]
    }

    #[tokio::test]
    async fn test_load_memoizes() {
        let source = Arc::new(MockCatalogSource::serving(sample_catalog()));
        let loader = CurrencyLoader::new(source.clone());

        assert!(loader.cached().is_none());

        let first = loader.load().await;
        let second = loader.load().await;

        assert_eq!(first.len(), 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);
        assert!(loader.cached().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let source = Arc::new(MockCatalogSource::serving(sample_catalog()));
        let gate = source.hold();
        let loader = CurrencyLoader::new(source.clone());

        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (a, b, ()) = tokio::join!(loader.load(), loader.load(), release);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_pending_callers_join_in_flight_fetch() {
        let source = Arc::new(MockCatalogSource::serving(sample_catalog()));
        let gate = source.hold();
        let loader = CurrencyLoader::new(source.clone());

        let mut first = tokio_test::task::spawn(loader.load());
        let mut second = tokio_test::task::spawn(loader.load());

        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_eq!(source.calls(), 1);

        gate.notify_one();

        let a = assert_ready!(first.poll());
        let b = assert_ready!(second.poll());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_falls_back_and_is_memoized() {
        let source = Arc::new(MockCatalogSource::failing());
        let loader = CurrencyLoader::new(source.clone());

        let catalog = loader.load().await;

        assert_eq!(catalog.len(), 10);
        assert!(find_by_code("USD", &catalog).is_some());
        assert!(find_by_code("EUR", &catalog).is_some());
        assert!(catalog.iter().all(|c| c.symbol.is_some() && c.flag_src.is_none()));

        loader.load().await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_falls_back() {
        let loader = CurrencyLoader::new(Arc::new(MockCatalogSource::serving(Vec::new())));
        assert_eq!(loader.load().await.len(), 10);
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("currencies.json");
        std::fs::write(
            &path,
            r#"[
                {"code": "USD", "name": "US Dollar", "symbol": "$", "decimalDigits": 2, "extra": 1},
                {"code": "EUR", "name": "Euro", "symbol": "€", "countryCodeISO2": "EU"}
            ]"#,
        )
        .unwrap();

        let catalog = FileCatalogSource::new(&path).fetch_catalog().await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].decimal_digits, Some(2));
        assert_eq!(catalog[1].country_code_iso2.as_deref(), Some("EU"));
    }

    #[tokio::test]
    async fn test_missing_file_loads_fallback() {
        let loader = CurrencyLoader::new(catalog_source("/nonexistent/currencies.json", Client::new()));
        assert_eq!(loader.load().await.len(), 10);
    }

    #[tokio::test]
    async fn test_http_source_error_status() {
        let url = crate::testing::respond_once("HTTP/1.1 503 Service Unavailable", "").await;
        let source = HttpCatalogSource::new(crate::testing::client(), url);

        let err = source.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, FxError::Network { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn test_http_error_status_loads_fallback() {
        let url = crate::testing::respond_once("HTTP/1.1 503 Service Unavailable", "").await;
        let loader = CurrencyLoader::new(Arc::new(HttpCatalogSource::new(
            crate::testing::client(),
            url,
        )));

        let catalog = loader.load().await;
        assert_eq!(catalog.len(), 10);
        assert!(find_by_code("USD", &catalog).is_some());
    }

    #[tokio::test]
    async fn test_http_source_success() {
        let url = crate::testing::respond_once(
            "HTTP/1.1 200 OK",
            r#"[{"code": "USD", "name": "US Dollar", "symbol": "$"}]"#,
        )
        .await;
        let loader = CurrencyLoader::new(catalog_source(&url, crate::testing::client()));

        let catalog = loader.load().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].code.as_str(), "USD");
    }

    #[test]
    fn test_decode_wrapped_document() {
        let catalog =
            decode_catalog(br#"{"currencies": [{"code": "JPY", "name": "Japanese Yen"}]}"#).unwrap();
        assert_eq!(catalog[0].code.as_str(), "JPY");

        assert!(matches!(decode_catalog(b"{}"), Err(FxError::Parse(_))));
    }

    #[test]
    fn test_default_pair() {
        let (from, to) = default_pair(&sample_catalog()).unwrap();
        assert_eq!(from.code.as_str(), "USD");
        assert_eq!(to.code.as_str(), "EUR");

        let catalog = vec![
            Currency::new("SEK", "Swedish Krona", "kr"),
            Currency::new("NOK", "Norwegian Krone", "kr"),
        ];
        let (from, to) = default_pair(&catalog).unwrap();
        assert_eq!(from.code.as_str(), "SEK");
        assert_eq!(to.code.as_str(), "NOK");

        assert!(default_pair(&[]).is_none());
    }
}
