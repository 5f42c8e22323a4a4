use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in epoch milliseconds, as stamped on every envelope.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
