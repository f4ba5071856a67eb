use chrono::{DateTime, Utc};

use crate::model::Interval;

/// Current UTC instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since epoch to `DateTime<Utc>`.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// `DateTime<Utc>` to milliseconds since epoch.
///
/// Note: unlike the legacy implementation this is based on (which multiplied
/// seconds by 100 instead of 1000 — almost certainly a bug), this returns true
/// milliseconds.
pub fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Snap `instant` forward to the next interval boundary.
///
/// Truncates down to the previous multiple of `interval`; if that truncation
/// was a no-op (the instant was already aligned) the truncated value is
/// returned as-is, otherwise it is advanced by one interval. When
/// `start_from_next` is set, one additional interval is added.
///
/// Only intervals that evenly tile a day (1m, 5m, 15m, 1h, 1d) are guaranteed
/// to land on each provider's own boundary convention; larger or irregular
/// intervals (3d, 1 month, ...) may deviate per provider and are not
/// characterized further here.
pub fn normalize(instant: DateTime<Utc>, interval: Interval, start_from_next: bool) -> i64 {
    let secs = interval.as_secs();
    let ts = instant.timestamp();
    let truncated = (ts.div_euclid(secs)) * secs;
    let mut normalized = if truncated == ts {
        truncated
    } else {
        truncated + secs
    };
    if start_from_next {
        normalized += secs;
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn normalize_unaligned_minute() {
        let ts = normalize(dt("2021-01-02T01:42:24Z"), Interval::ONE_MINUTE, false);
        assert_eq!(ts, dt("2021-01-02T01:43:00Z").timestamp());
    }

    #[test]
    fn normalize_unaligned_minute_start_from_next() {
        let ts = normalize(dt("2021-01-02T01:42:24Z"), Interval::ONE_MINUTE, true);
        assert_eq!(ts, dt("2021-01-02T01:44:00Z").timestamp());
    }

    #[test]
    fn normalize_aligned_hour_is_noop() {
        let ts = normalize(dt("2021-01-02T02:00:00Z"), Interval::ONE_HOUR, false);
        assert_eq!(ts, dt("2021-01-02T02:00:00Z").timestamp());
    }

    #[test]
    fn normalize_aligned_hour_start_from_next() {
        let ts = normalize(dt("2021-01-02T02:00:00Z"), Interval::ONE_HOUR, true);
        assert_eq!(ts, dt("2021-01-02T03:00:00Z").timestamp());
    }

    #[test]
    fn to_millis_round_trips() {
        let now = Utc.timestamp_opt(1_657_378_800, 0).unwrap();
        let millis = to_millis(now);
        let converted = from_millis(millis).unwrap();
        assert_eq!(now.timestamp_millis(), converted.timestamp_millis());
    }
}
