//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current Unix epoch time in milliseconds
///
/// Used for the `timestamp` field of every response envelope.
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}
