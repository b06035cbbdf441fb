/// Utility functions for rounding and timestamp formatting
use time::macros::format_description;
use time::OffsetDateTime;

/// Round a value to the given number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Current wall-clock time, in the local offset when it can be determined
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format a timestamp as a chart x-axis label
///
/// HH:MM by default, HH:MM:SS when `with_seconds` is set.
/// Falls back to default string representation if formatting fails.
pub fn chart_label(dt: &OffsetDateTime, with_seconds: bool) -> String {
    let formatted = if with_seconds {
        dt.format(format_description!("[hour]:[minute]:[second]"))
    } else {
        dt.format(format_description!("[hour]:[minute]"))
    };
    formatted.unwrap_or_else(|_| dt.to_string())
}
