//! Automatic and manual rate refreshes driven by the scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use convertly_common::format::format_timestamp;
use convertly_common::time::constants;
use convertly_common::{Clock, RateTable, Timestamp};

use crate::error::FxResult;
use crate::scheduler::RefreshScheduler;
use crate::service::{RateService, RateStatus, Severity};

/// What a refresh produced and when the next one is due.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub table: RateTable,
    pub status: RateStatus,
    pub manual: bool,
    pub next_refresh: Option<Timestamp>,
}

impl RefreshReport {
    pub fn severity(&self) -> Severity {
        self.status.severity()
    }

    /// User-facing notification text.
    pub fn message(&self) -> String {
        match self.status {
            RateStatus::Degraded => format!(
                "API failed. Using cached rates from {}",
                format_timestamp(self.table.timestamp)
            ),
            RateStatus::Cached => format!(
                "Using cached rates from {}",
                format_timestamp(self.table.timestamp)
            ),
            RateStatus::Fresh if self.manual => "Exchange rates updated successfully".to_string(),
            RateStatus::Fresh => "Fresh exchange rates loaded".to_string(),
        }
    }
}

/// Notification text for a load that produced no rates at all.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load exchange rates. Please try again.";

/// Marks a refresh as in progress for as long as it is held.
struct InProgress<'a>(&'a AtomicUsize);

impl<'a> InProgress<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loads rates through the service and keeps the scheduler armed.
pub struct RateRefresher {
    service: Arc<RateService>,
    scheduler: Arc<RefreshScheduler>,
    in_progress: AtomicUsize,
    latest: RwLock<Option<RateTable>>,
}

impl RateRefresher {
    pub fn new(service: Arc<RateService>, scheduler: Arc<RefreshScheduler>) -> Self {
        Self {
            service,
            scheduler,
            in_progress: AtomicUsize::new(0),
            latest: RwLock::new(None),
        }
    }

    pub fn service(&self) -> &Arc<RateService> {
        &self.service
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Last table handed out by a refresh.
    pub fn latest(&self) -> Option<RateTable> {
        self.latest.read().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst) > 0
    }

    /// Initial load. A cache that is still fresh sets the countdown to its
    /// own expiry before anything is fetched.
    pub async fn start(&self) -> FxResult<RefreshReport> {
        if let Some(cached) = self.service.read_cache() {
            if cached.is_fresh_at(self.service.clock().now()) {
                self.scheduler.arm_at(cached.expires_at);
            }
        }

        self.refresh(false).await
    }

    /// Load rates and re-arm the countdown.
    ///
    /// A manual refresh bypasses a fresh cache and always restarts the full
    /// interval, even when it fails. Automatic loads restart it after a fetch
    /// (successful or degraded) and follow the cache's expiry on a cache hit.
    #[instrument(skip(self))]
    pub async fn refresh(&self, manual: bool) -> FxResult<RefreshReport> {
        let _guard = InProgress::enter(&self.in_progress);

        let result = self.service.get_rates_with_cache(manual).await;

        let next_refresh = match &result {
            _ if manual => Some(self.scheduler.arm()),
            Ok(outcome) => match outcome.status() {
                RateStatus::Fresh | RateStatus::Degraded => Some(self.scheduler.arm()),
                RateStatus::Cached => match self.service.read_cache() {
                    Some(cached) => {
                        self.scheduler.arm_at(cached.expires_at);
                        Some(cached.expires_at)
                    }
                    None => self.scheduler.next_refresh_time(),
                },
            },
            Err(_) => self.scheduler.next_refresh_time(),
        };

        match result {
            Ok(outcome) => {
                let status = outcome.status();
                *self.latest.write() = Some(outcome.table.clone());
                info!(%status, manual, "Rates loaded");

                Ok(RefreshReport {
                    table: outcome.table,
                    status,
                    manual,
                    next_refresh,
                })
            }
            Err(e) => {
                warn!(error = %e, manual, "Failed to load exchange rates");
                Err(e)
            }
        }
    }

    /// Handle an expired countdown. Skipped (returns `None`) while another
    /// refresh is still running.
    pub async fn on_timer_expired(&self) -> Option<FxResult<RefreshReport>> {
        if self.is_busy() {
            debug!("Refresh already in progress, skipping timer");
            return None;
        }

        Some(self.refresh(false).await)
    }

    /// Drive the countdown until `shutdown` flips to `true` or its sender
    /// is dropped. Every automatic refresh is handed to `on_refresh`.
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_refresh: F)
    where
        F: FnMut(FxResult<RefreshReport>) + Send,
    {
        let mut ticker = tokio::time::interval(constants::tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.scheduler.tick() {
                        info!("Refresh timer expired");
                        if let Some(result) = self.on_timer_expired().await {
                            on_refresh(result);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Refresh loop stopping");
                        break;
                    }
                }
            }
        }
    }
}
