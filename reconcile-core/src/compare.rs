//! Abstract comparator.
//!
//! Check precedence (first match wins):
//! 1. equal non-empty `etag`
//! 2. byte-equal non-empty `lastmod`
//! 3. equal positive `update_at`
//! 4. both `lastmod` parse to the same instant (origins format dates differently)

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::AbstractInfo;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Decide whether two summaries describe the same underlying data.
///
/// An absent side is treated as `{ id: "", update_at: 0 }`, which never
/// matches anything: two absent summaries are *not* reported as the same.
pub fn is_same(current: Option<&AbstractInfo>, old: Option<&AbstractInfo>) -> bool {
    let empty = AbstractInfo::default();
    let current = current.unwrap_or(&empty);
    let old = old.unwrap_or(&empty);

    if let (Some(a), Some(b)) = (non_empty(&current.etag), non_empty(&old.etag)) {
        if a == b {
            return true;
        }
    }

    let current_lastmod = non_empty(&current.lastmod);
    let old_lastmod = non_empty(&old.lastmod);
    if let (Some(a), Some(b)) = (current_lastmod, old_lastmod) {
        if a == b {
            return true;
        }
    }

    if current.update_at > 0 && current.update_at == old.update_at {
        return true;
    }

    if let (Some(a), Some(b)) = (current_lastmod, old_lastmod) {
        if let (Some(a), Some(b)) = (parse_lastmod(a), parse_lastmod(b)) {
            return a == b;
        }
    }

    false
}

/// Parse a `lastmod` string into milliseconds since the Unix epoch.
///
/// Accepts RFC 2822 (WebDAV `getlastmodified`), RFC 3339, and a few naive
/// layouts which are read as UTC.
pub fn parse_lastmod(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
