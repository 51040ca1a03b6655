//! Timestamp normalization.
//!
//! The backend stores turn timestamps either in seconds or in milliseconds
//! depending on where the turn came from. Everything inside the client is
//! milliseconds since the Unix epoch.

/// Values at or below this bound are interpreted as seconds.
pub const SECONDS_UPPER_BOUND: i64 = 9_999_999_999;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Normalizes a raw timestamp to milliseconds.
///
/// A missing (non-positive) value becomes `now`. Already-millisecond values
/// are returned unchanged, so applying this twice is the same as applying it
/// once for any real epoch timestamp.
pub fn normalize_timestamp(raw: i64, now: i64) -> i64 {
    if raw <= 0 {
        now
    } else if raw <= SECONDS_UPPER_BOUND {
        raw * 1000
    } else {
        raw
    }
}
