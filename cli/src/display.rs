//! Terminal output.

use chrono::Duration;

use convertly_common::format::{format_amount, format_countdown, format_rate, format_timestamp};
use convertly_common::{now, Currency, RateTable};
use convertly_fx::{FxError, RefreshReport, SessionState, Severity, LOAD_FAILED_MESSAGE};

use crate::controller::ConversionView;

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "[ok]",
        Severity::Warning => "[warn]",
        Severity::Error => "[error]",
    }
}

/// Notification line for a completed refresh.
pub fn print_report(report: &RefreshReport) {
    println!("{} {}", severity_tag(report.severity()), report.message());
}

pub fn print_load_failure(error: &FxError) {
    println!("{} {}", severity_tag(Severity::Error), LOAD_FAILED_MESSAGE);
    eprintln!("  cause: {error}");
}

pub fn print_currencies(catalog: &[Currency]) {
    for currency in catalog {
        println!(
            "{:<4} {:<4} {}",
            currency.code.as_str(),
            currency.display_symbol(),
            currency.name
        );
    }
    println!("{} currencies", catalog.len());
}

pub fn print_rates(table: &RateTable) {
    println!(
        "Base {} as of {}",
        table.base,
        format_timestamp(table.timestamp)
    );
    for (code, rate) in &table.rates {
        println!("  1 {} = {} {}", table.base, format_rate(*rate), code);
    }
}

pub fn print_pair(session: &SessionState) {
    println!("{} → {}", session.from_currency, session.to_currency);
}

pub fn print_conversion(view: &ConversionView) {
    let Some(result) = &view.result else {
        println!(
            "Enter an amount to convert {} to {}",
            view.from.code, view.to.code
        );
        return;
    };

    println!(
        "{} {} = {} {}",
        format_amount(result.amount),
        view.from.code,
        format_amount(result.converted_amount),
        view.to.code
    );
    println!(
        "  1 {} = {} {}",
        view.from.code,
        format_rate(result.rate),
        view.to.code
    );
    println!(
        "  1 {} = {} {}",
        view.to.code,
        format_rate(result.inverse_rate),
        view.from.code
    );
    println!("  Last updated: {}", format_timestamp(result.timestamp));

    if let Some(next) = view.report.next_refresh {
        print_countdown(next - now());
    }
}

/// Conversion result as JSON, `null` when there is nothing to convert.
pub fn print_conversion_json(view: &ConversionView) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&view.result)?);
    Ok(())
}

pub fn print_countdown(remaining: Duration) {
    println!("  Next refresh in {}", format_countdown(remaining));
}

pub fn print_watch_help() {
    println!("Commands: r = refresh now, s = countdown, q = quit");
}
