//! Currency identifiers and catalog records.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// ISO-like currency code, always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code, normalizing to upper-case.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for CurrencyCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A currency from the catalog.
///
/// Only the fields below are kept when a catalog document is read; anything
/// else in the source record is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    /// Unique code, the identity of the currency.
    pub code: CurrencyCode,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_native: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_digits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_plural: Option<String>,
    #[serde(
        default,
        rename = "countryCodeISO2",
        skip_serializing_if = "Option::is_none"
    )]
    pub country_code_iso2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_src: Option<String>,
}

impl Currency {
    /// Create a currency with only code, name and symbol set.
    pub fn new(code: impl Into<String>, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            code: CurrencyCode::new(code),
            name: name.into(),
            symbol: Some(symbol.into()),
            symbol_native: None,
            decimal_digits: None,
            rounding: None,
            name_plural: None,
            country_code_iso2: None,
            flag_src: None,
        }
    }

    /// Symbol for display, falling back to the code.
    pub fn display_symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(self.code.as_str())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.name)
    }
}
