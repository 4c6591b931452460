//! Timestamp utilities
//!
//! All persisted timestamps are RFC 3339 strings in UTC with millisecond
//! precision, so lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp formatted for storage
pub fn now_rfc3339() -> String {
    to_rfc3339(now())
}

/// Format a timestamp for storage
pub fn to_rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
