//! Converter controller.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use convertly_common::{ConversionResult, Currency, CurrencyCode};
use convertly_fx::catalog::find_by_code;
use convertly_fx::{
    catalog_source, compute_conversion, CurrencyLoader, FileStore, FxConfig, HttpRateProvider,
    RateRefresher, RateService, RefreshReport, RefreshScheduler, SessionState,
};

use crate::display;

/// Everything needed to show one conversion.
#[derive(Debug, Clone)]
pub struct ConversionView {
    pub session: SessionState,
    pub from: Currency,
    pub to: Currency,
    pub result: Option<ConversionResult>,
    pub report: RefreshReport,
}

impl ConversionView {
    /// Resolve the session pair in `catalog` and convert with the report's
    /// table. `None` when the pair is not in the catalog.
    pub fn build(session: SessionState, catalog: &[Currency], report: RefreshReport) -> Option<Self> {
        let (from, to) = session.resolve(catalog)?;
        let (from, to) = (from.clone(), to.clone());
        let result = compute_conversion(session.amount_value(), &from, &to, &report.table);

        Some(Self {
            session,
            from,
            to,
            result,
            report,
        })
    }
}

/// Wires the catalog loader, rate refresher and persisted session together.
pub struct ConverterController {
    store: Arc<FileStore>,
    loader: CurrencyLoader,
    refresher: Arc<RateRefresher>,
}

impl ConverterController {
    /// Create a controller storing its state under `data_dir`.
    pub fn new(config: FxConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("convertly/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let store = Arc::new(FileStore::open(data_dir)?);
        let loader = CurrencyLoader::new(catalog_source(&config.currencies_source, client.clone()));
        let provider = Arc::new(HttpRateProvider::from_config(client, &config));

        let service = Arc::new(RateService::new(config, provider, store.clone()));
        let scheduler = Arc::new(RefreshScheduler::new(service.clock().clone()));

        Ok(Self {
            store,
            loader,
            refresher: Arc::new(RateRefresher::new(service, scheduler)),
        })
    }

    /// Available currencies.
    pub async fn currencies(&self) -> Arc<Vec<Currency>> {
        self.loader.load().await
    }

    /// Load rates, bypassing a fresh cache when `refresh` is set.
    pub async fn rates(&self, refresh: bool) -> anyhow::Result<RefreshReport> {
        Ok(self.refresher.refresh(refresh).await?)
    }

    pub fn clear_cache(&self) -> anyhow::Result<()> {
        self.refresher.service().clear_cache()?;
        info!("Cached rates cleared");
        Ok(())
    }

    /// Apply the given selection to the persisted session and convert.
    pub async fn convert(
        &self,
        amount: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> anyhow::Result<ConversionView> {
        let catalog = self.loader.load().await;
        let mut session = SessionState::restore(self.store.as_ref(), &catalog);

        if let Some(amount) = amount {
            session.set_amount(&amount);
        }
        if let Some(code) = from {
            session.from_currency = known_code(&code, &catalog)?;
        }
        if let Some(code) = to {
            session.to_currency = known_code(&code, &catalog)?;
        }
        session.save(self.store.as_ref())?;

        let report = self.refresher.refresh(false).await?;
        ConversionView::build(session, &catalog, report)
            .ok_or_else(|| anyhow!("Selected currencies are not in the catalog"))
    }

    /// Swap the persisted pair.
    pub async fn swap(&self) -> anyhow::Result<SessionState> {
        let catalog = self.loader.load().await;
        let mut session = SessionState::restore(self.store.as_ref(), &catalog);
        session.swap();
        session.save(self.store.as_ref())?;

        debug!(from = %session.from_currency, to = %session.to_currency, "Swapped currencies");
        Ok(session)
    }

    /// Interactive mode: show the current conversion and keep it up to date
    /// until `q`, end of input or Ctrl+C.
    pub async fn watch(&self) -> anyhow::Result<()> {
        let catalog = self.loader.load().await;
        let session = SessionState::restore(self.store.as_ref(), &catalog);

        match self.refresher.start().await {
            Ok(report) => show(&session, &catalog, report),
            Err(e) => display::print_load_failure(&e),
        }
        display::print_watch_help();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let refresher = self.refresher.clone();
            let session = session.clone();
            let catalog = catalog.clone();
            tokio::spawn(async move {
                refresher
                    .run(shutdown_rx, move |result| match result {
                        Ok(report) => show(&session, &catalog, report),
                        Err(e) => display::print_load_failure(&e),
                    })
                    .await;
            })
        };

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match line.trim() {
                        "q" | "quit" => break,
                        "r" | "refresh" => match self.refresher.refresh(true).await {
                            Ok(report) => show(&session, &catalog, report),
                            Err(e) => display::print_load_failure(&e),
                        },
                        "" | "s" | "status" => {
                            display::print_countdown(self.refresher.scheduler().time_left());
                        }
                        _ => display::print_watch_help(),
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        info!("Stopping watch mode");
        let _ = shutdown_tx.send(true);
        handle.await?;

        Ok(())
    }
}

fn show(session: &SessionState, catalog: &[Currency], report: RefreshReport) {
    display::print_report(&report);
    if let Some(view) = ConversionView::build(session.clone(), catalog, report) {
        display::print_conversion(&view);
    }
}

fn known_code(code: &str, catalog: &[Currency]) -> anyhow::Result<CurrencyCode> {
    let code = CurrencyCode::new(code);
    if find_by_code(code.as_str(), catalog).is_none() {
        bail!("Unknown currency: {code}");
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use convertly_common::{now, RateTable};
    use convertly_fx::{fallback_currencies, RateStatus};

    fn report() -> RefreshReport {
        let rates: BTreeMap<CurrencyCode, f64> = [("USD", 1.1), ("GBP", 0.85)]
            .into_iter()
            .map(|(code, rate)| (CurrencyCode::new(code), rate))
            .collect();

        RefreshReport {
            table: RateTable::new(CurrencyCode::eur(), rates, now()),
            status: RateStatus::Fresh,
            manual: false,
            next_refresh: None,
        }
    }

    #[test]
    fn test_conversion_view() {
        let session = SessionState {
            from_currency: CurrencyCode::usd(),
            to_currency: CurrencyCode::gbp(),
            amount: "100".to_string(),
        };

        let view = ConversionView::build(session, &fallback_currencies(), report()).unwrap();
        let result = view.result.unwrap();

        assert_eq!(view.from.code, CurrencyCode::usd());
        assert_eq!(format!("{:.2}", result.converted_amount), "77.27");
    }

    #[test]
    fn test_conversion_view_without_amount() {
        let mut session = SessionState::default();
        session.set_amount("");

        let view = ConversionView::build(session, &fallback_currencies(), report()).unwrap();
        assert!(view.result.is_none());
    }

    #[test]
    fn test_known_code() {
        let catalog = fallback_currencies();

        assert_eq!(known_code("gbp", &catalog).unwrap(), CurrencyCode::gbp());
        assert!(known_code("XTS", &catalog).is_err());
    }
}
