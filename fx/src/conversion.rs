//! Currency conversion over a rate table.
//!
//! All functions here are pure. Rates missing from the table (or zero) are
//! read as `1`, so an unknown currency converts at par instead of failing.

use convertly_common::{ConversionResult, Currency, RateTable};

/// Rate entry for `code`, or `1` when it is absent or zero.
fn rate_or_par(table: &RateTable, code: &str) -> f64 {
    table
        .rate(code)
        .filter(|r| *r != 0.0 && !r.is_nan())
        .unwrap_or(1.0)
}

/// Convert `amount` of `from` into `to`, crossing through the table's base.
pub fn convert(amount: f64, from: &str, to: &str, table: &RateTable) -> f64 {
    if from == to {
        return amount;
    }

    let base = table.base.as_str();
    if from == base {
        return amount * rate_or_par(table, to);
    }
    if to == base {
        return amount / rate_or_par(table, from);
    }

    (amount / rate_or_par(table, from)) * rate_or_par(table, to)
}

/// Units of `to` per one unit of `from`.
pub fn rate_between(from: &str, to: &str, table: &RateTable) -> f64 {
    if from == to {
        return 1.0;
    }

    let base = table.base.as_str();
    if from == base {
        return rate_or_par(table, to);
    }
    if to == base {
        return 1.0 / rate_or_par(table, from);
    }

    rate_or_par(table, to) / rate_or_par(table, from)
}

/// Build the conversion shown to the user.
///
/// Returns `None` when there is nothing to show: no amount, a zero or
/// negative amount, or a non-finite one.
pub fn compute_conversion(
    amount: Option<f64>,
    from: &Currency,
    to: &Currency,
    table: &RateTable,
) -> Option<ConversionResult> {
    let amount = amount.filter(|a| a.is_finite() && *a > 0.0)?;
    let (from_code, to_code) = (from.code.as_str(), to.code.as_str());

    Some(ConversionResult {
        amount,
        from_currency: from.clone(),
        to_currency: to.clone(),
        converted_amount: convert(amount, from_code, to_code, table),
        rate: rate_between(from_code, to_code, table),
        inverse_rate: rate_between(to_code, from_code, table),
        timestamp: table.timestamp,
    })
}
