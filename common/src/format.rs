//! Amount parsing and display formatting.

use chrono::{Duration, Local};

use crate::time::Timestamp;

/// Strip everything except digits, `.` and `,` from user input.
pub fn sanitize_amount(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect()
}

/// Parse a user-entered amount.
///
/// The first `,` is read as a decimal point and the longest numeric prefix
/// wins, so `"1,5"` is 1.5 and `"2.5.1"` is 2.5. Returns `None` when no
/// digits are present.
pub fn parse_amount(input: &str) -> Option<f64> {
    let normalized = sanitize_amount(input).replacen(',', ".", 1);

    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in normalized.char_indices() {
        match c {
            '0'..='9' => {
                seen_digit = true;
                end = i + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            _ => break,
        }
    }

    if !seen_digit {
        return None;
    }
    normalized[..end].parse().ok()
}

/// Format an amount with 2 to 6 fraction digits and thousands separators.
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return amount.to_string();
    }

    let fixed = format!("{:.6}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let grouped = group_thousands(int_part);
    let is_zero = int_part.bytes().all(|b| b == b'0') && frac.bytes().all(|b| b == b'0');
    let sign = if amount < 0.0 && !is_zero { "-" } else { "" };

    format!("{sign}{grouped}.{frac}")
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format an exchange rate with precision depending on magnitude.
pub fn format_rate(rate: f64) -> String {
    if rate < 0.01 {
        format!("{rate:.6}")
    } else if rate < 1.0 {
        format!("{rate:.4}")
    } else {
        format!("{rate:.2}")
    }
}

/// Format a countdown as `m:ss`, rounding up to whole seconds.
pub fn format_countdown(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds();
    if millis <= 0 {
        return "0:00".to_string();
    }

    let total_seconds = (millis + 999) / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Format a timestamp in local time, e.g. `03/14/2025, 09:26 PM`.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%m/%d/%Y, %I:%M %p")
        .to_string()
}
