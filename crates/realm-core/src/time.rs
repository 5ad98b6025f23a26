//! Clock arithmetic for time-windowed rules (stipends, quest expiry).
//!
//! Everything works on [`chrono::Duration`] so callers never juggle
//! fractional hours.

use chrono::{DateTime, Duration, Utc};

/// Absolute distance between two instants.
pub fn between(a: DateTime<Utc>, b: DateTime<Utc>) -> Duration {
    a.signed_duration_since(b).abs()
}

/// Time left in the window of length `window` that opened at `opened`.
///
/// `None` when the window has already closed at `now`.
pub fn remaining_in_window(
    opened: DateTime<Utc>,
    window: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let elapsed = between(now, opened);
    let remaining = window.checked_sub(&elapsed)?;
    (remaining > Duration::zero()).then_some(remaining)
}

/// Whether `at` lies strictly before `now`.
pub fn is_before(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at < now
}

/// Whole hours in `duration`, rounded up. Used for "come back in N hours".
pub fn hours_ceil(duration: Duration) -> i64 {
    let hours = duration.num_hours();
    if duration > Duration::hours(hours) {
        hours.saturating_add(1)
    } else {
        hours
    }
}
