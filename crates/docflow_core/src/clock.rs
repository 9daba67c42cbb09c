use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};

/// Wall-clock timestamp as persisted in `timestamp` columns; always UTC.
pub type Timestamp = PrimitiveDateTime;

/// Current UTC time truncated to microseconds, the finest precision every
/// supported backend round-trips.
pub fn now_utc() -> Timestamp {
    let now = OffsetDateTime::now_utc();
    let micros_only = now.nanosecond() / 1_000 * 1_000;
    let now = now.replace_nanosecond(micros_only).unwrap_or(now);
    PrimitiveDateTime::new(now.date(), now.time())
}

pub fn add_duration(at: Timestamp, duration: Duration) -> Timestamp {
    let delta = time::Duration::try_from(duration).unwrap_or(time::Duration::MAX);
    at.checked_add(delta).unwrap_or(at)
}
