use chrono::{DateTime, Utc};

/// Age in fractional hours between `timestamp` and `now`. Never negative.
pub fn age_hours(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> f64 {
    let age_ms = (*now - *timestamp).num_milliseconds() as f64;
    (age_ms / 3_600_000.0).max(0.0)
}

/// Hyperbolic recency weight `1 / (1 + age_hours)`: 1.0 for a fresh record,
/// 0.5 after one hour, approaching zero for old ones.
pub fn recency_weight(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> f64 {
    1.0 / (1.0 + age_hours(timestamp, now))
}
