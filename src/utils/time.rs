//! Timestamp helpers
//!
//! Document times are Unix epoch seconds as `f64`.

use chrono::{DateTime, SecondsFormat, Utc};

/// Render epoch seconds as RFC 3339 (UTC, microsecond precision)
///
/// Out-of-range or non-finite values render as the raw number.
pub fn format_timestamp(ts: f64) -> String {
    if !ts.is_finite() {
        return ts.to_string();
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round().min(999_999_999.0) as u32;
    match DateTime::<Utc>::from_timestamp(secs as i64, nanos) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => ts.to_string(),
    }
}
