// SPDX-License-Identifier: MIT

//! Time utilities for filesystem timestamps.
//!
//! - In `std` mode, uses the system clock.
//! - In `no_std`, returns UNIX_EPOCH as fixed timestamp.
//!
//! Timestamps are stored on disk as signed seconds plus nanoseconds.

use time::OffsetDateTime;

/// Returns the current UTC time.
///
/// - In `std` mode, returns the actual system UTC time.
/// - In `no_std`, returns `OffsetDateTime::UNIX_EPOCH` as fallback.
pub fn now_utc() -> OffsetDateTime {
    #[cfg(feature = "std")]
    {
        OffsetDateTime::now_utc()
    }

    #[cfg(not(feature = "std"))]
    {
        OffsetDateTime::UNIX_EPOCH
    }
}

/// Splits a timestamp into its on-disk `(seconds, nanoseconds)` parts.
#[inline]
pub fn datetime_to_parts(t: OffsetDateTime) -> (i64, u32) {
    (t.unix_timestamp(), t.nanosecond())
}

/// Rebuilds a timestamp from its on-disk parts.
///
/// Out-of-range values (damaged records) fall back to the epoch.
pub fn datetime_from_parts(secs: i64, nanos: u32) -> OffsetDateTime {
    let total = secs as i128 * 1_000_000_000 + nanos.min(999_999_999) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(total).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_parts_round_trip() {
        let now = now_utc();
        let (secs, nanos) = datetime_to_parts(now);
        assert_eq!(datetime_from_parts(secs, nanos), now);
    }

    #[test]
    fn test_out_of_range_falls_back() {
        assert_eq!(
            datetime_from_parts(i64::MAX, 0),
            OffsetDateTime::UNIX_EPOCH
        );
    }
}
