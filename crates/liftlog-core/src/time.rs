//! Client-clock timestamps.
//!
//! Every stored timestamp has millisecond precision so that a value survives
//! a round trip through its RFC 3339 text form unchanged.

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// The current UTC time, truncated to whole milliseconds.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(3) }

/// The timestamp to write as a row's new `updatedAt`.
///
/// Strictly greater than `previous`, even when the wall clock has stalled or
/// stepped backwards.
pub fn next_after(previous: DateTime<Utc>) -> DateTime<Utc> {
  let now = now();
  if now > previous {
    now
  } else {
    previous + Duration::milliseconds(1)
  }
}
