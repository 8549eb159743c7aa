//! Persisted converter selection: currency pair and entered amount.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use convertly_common::format::{parse_amount, sanitize_amount};
use convertly_common::{Currency, CurrencyCode};

use crate::catalog::{default_pair, find_by_code};
use crate::error::{FxError, FxResult};
use crate::store::KeyValueStore;

/// Store key of the persisted session.
pub const SESSION_KEY: &str = "converter_state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub amount: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            from_currency: CurrencyCode::usd(),
            to_currency: CurrencyCode::eur(),
            amount: "1".to_string(),
        }
    }
}

impl SessionState {
    /// Load the persisted session and check it against `catalog`.
    ///
    /// Missing or unreadable state yields the default. If either currency is
    /// not in the catalog, both are reset to the catalog's default pair.
    pub fn restore(store: &dyn KeyValueStore, catalog: &[Currency]) -> Self {
        let mut state = match store.get(SESSION_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<SessionState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed session state");
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read session state");
                Self::default()
            }
        };

        let resolves = |code: &CurrencyCode| find_by_code(code.as_str(), catalog).is_some();
        if !resolves(&state.from_currency) || !resolves(&state.to_currency) {
            if let Some((from, to)) = default_pair(catalog) {
                debug!(
                    from = %state.from_currency,
                    to = %state.to_currency,
                    "Session currencies not in catalog, using defaults"
                );
                state.from_currency = from.code;
                state.to_currency = to.code;
            }
        }

        state
    }

    /// Persist under [`SESSION_KEY`].
    pub fn save(&self, store: &dyn KeyValueStore) -> FxResult<()> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| FxError::Storage(format!("Failed to encode session state: {e}")))?;
        store.set(SESSION_KEY, &bytes)
    }

    /// Exchange source and target currencies.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.from_currency, &mut self.to_currency);
    }

    /// Replace the amount with sanitized user input.
    pub fn set_amount(&mut self, input: &str) {
        self.amount = sanitize_amount(input);
    }

    pub fn amount_value(&self) -> Option<f64> {
        parse_amount(&self.amount)
    }

    /// Catalog entries for the selected pair.
    pub fn resolve<'a>(&self, catalog: &'a [Currency]) -> Option<(&'a Currency, &'a Currency)> {
        Some((
            find_by_code(self.from_currency.as_str(), catalog)?,
            find_by_code(self.to_currency.as_str(), catalog)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fallback_currencies;
    use crate::store::MemoryStore;

    #[test]
    fn test_restore_defaults_when_empty() {
        let store = MemoryStore::new();
        let state = SessionState::restore(&store, &fallback_currencies());

        assert_eq!(state, SessionState::default());
        assert_eq!(state.amount_value(), Some(1.0));
    }

    #[test]
    fn test_save_and_restore() {
        let store = MemoryStore::new();
        let mut state = SessionState::default();
        state.from_currency = CurrencyCode::gbp();
        state.set_amount("250.50");
        state.save(&store).unwrap();

        let restored = SessionState::restore(&store, &fallback_currencies());
        assert_eq!(restored, state);

        let raw = store.get(SESSION_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["fromCurrency"], "GBP");
        assert_eq!(json["amount"], "250.50");
    }

    #[test]
    fn test_malformed_state_is_ignored() {
        let store = MemoryStore::new();
        store.set(SESSION_KEY, b"{\"fromCurrency\":").unwrap();

        let state = SessionState::restore(&store, &fallback_currencies());
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_unknown_currency_resets_pair() {
        let store = MemoryStore::new();
        let stale = SessionState {
            from_currency: CurrencyCode::new("GBP"),
            to_currency: CurrencyCode::new("XTS"),
            amount: "10".to_string(),
        };
        stale.save(&store).unwrap();

        let state = SessionState::restore(&store, &fallback_currencies());
        assert_eq!(state.from_currency, CurrencyCode::usd());
        assert_eq!(state.to_currency, CurrencyCode::eur());
        assert_eq!(state.amount, "10");
    }

    #[test]
    fn test_swap_and_resolve() {
        let catalog = fallback_currencies();
        let mut state = SessionState::default();
        state.swap();

        let (from, to) = state.resolve(&catalog).unwrap();
        assert_eq!(from.code, CurrencyCode::eur());
        assert_eq!(to.code, CurrencyCode::usd());
    }

    #[test]
    fn test_set_amount_sanitizes() {
        let mut state = SessionState::default();
        state.set_amount("$1,5 ");

        assert_eq!(state.amount, "1,5");
        assert_eq!(state.amount_value(), Some(1.5));
    }
}
