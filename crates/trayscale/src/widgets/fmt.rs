//! Human-readable byte, time and latency formatting helpers.

use std::time::Duration;

use bytesize::ByteSize;
use chrono::{DateTime, Local, Utc};

pub fn fmt_bytes(bytes: u64) -> String {
    ByteSize::b(bytes).to_string()
}

/// "3h ago", "2days ago", "just now". Rounded down to the largest unit
/// that fits.
pub fn fmt_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = u64::try_from((now - then).num_seconds()).unwrap_or(0);
    let coarse = match secs {
        0..60 => return "just now".into(),
        60..3_600 => secs - secs % 60,
        3_600..86_400 => secs - secs % 3_600,
        _ => secs - secs % 86_400,
    };
    format!("{} ago", humantime::format_duration(Duration::from_secs(coarse)))
}

pub fn fmt_date(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Latency truncated to whole milliseconds: "12ms", "1s 40ms".
pub fn fmt_latency(latency: Duration) -> String {
    let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}

/// The polling interval as typed back into the preferences prompt.
pub fn fmt_interval(interval: Duration) -> String {
    humantime::format_duration(interval).to_string()
}

/// Parse the polling interval prompt: a bare number of seconds or a
/// humantime duration such as `1m 30s`.
pub fn parse_interval(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| format!("{text:?}: {e}"));
    }
    humantime::parse_duration(text).map_err(|e| format!("{text:?}: {e}"))
}

/// Tri-state netcheck results: `None` means the check did not run.
pub fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}
