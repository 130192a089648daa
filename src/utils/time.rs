use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds between two instants, never negative.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

/// Point after which an attempt started at `started_at` counts as expired.
pub fn attempt_deadline(started_at: DateTime<Utc>, duration_minutes: i32, grace_minutes: i64) -> DateTime<Utc> {
    started_at + Duration::minutes(duration_minutes as i64 + grace_minutes)
}
