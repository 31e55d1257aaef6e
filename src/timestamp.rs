// SPDX-License-Identifier: Apache-2.0

use core::cmp::Ordering;
use core::ops::{Add, Sub};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A normalized `(seconds, nanoseconds)` instant or duration.
///
/// `nanos` is always in `[0, 1_000_000_000)`. The all-zero value represents
/// "unset" for fields that use `Timestamp` as an optional target (a timer's
/// `target`, for instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: u32,
    pub nanos: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        seconds: 0,
        nanos: 0,
    };

    /// Builds a timestamp, normalizing `nanos >= 1_000_000_000` into carry
    /// seconds. Use this instead of a struct literal unless `nanos` is
    /// already known to be in range.
    pub const fn new(seconds: u32, nanos: u32) -> Self {
        Timestamp {
            seconds: seconds + nanos / NANOS_PER_SEC,
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// True for any non-zero timestamp; `SYSTIME_ISSET` in the original.
    pub const fn is_set(&self) -> bool {
        self.seconds != 0 || self.nanos != 0
    }

    /// Whole milliseconds, rounded down. Used to quantize `Timer::started`.
    pub const fn truncate_to_millis(&self) -> Timestamp {
        Timestamp {
            seconds: self.seconds,
            nanos: (self.nanos / 1_000_000) * 1_000_000,
        }
    }

    /// Subtraction defined only when `self >= other`; callers guarantee this
    /// per spec, so this panics (in debug) rather than wrapping silently.
    pub fn checked_sub(&self, other: Timestamp) -> Option<Timestamp> {
        if *self < other {
            return None;
        }
        let (mut seconds, nanos) = if self.nanos >= other.nanos {
            (self.seconds - other.seconds, self.nanos - other.nanos)
        } else {
            (
                self.seconds - other.seconds - 1,
                NANOS_PER_SEC + self.nanos - other.nanos,
            )
        };
        if seconds > self.seconds {
            // other.seconds underflowed past self.seconds; shouldn't happen
            // once the `*self < other` guard above has passed.
            seconds = 0;
        }
        Some(Timestamp { seconds, nanos })
    }

    pub(crate) fn as_nanos_i64(&self) -> i64 {
        self.seconds as i64 * NANOS_PER_SEC as i64 + self.nanos as i64
    }

    /// Builds a `Timestamp` from a signed nanosecond count, saturating at
    /// zero. Used to fold a monotonic reading and a signed offset back into
    /// the unsigned wire representation.
    pub(crate) fn from_nanos_i64(value: i64) -> Timestamp {
        let value = value.max(0);
        Timestamp {
            seconds: (value / NANOS_PER_SEC as i64) as u32,
            nanos: (value % NANOS_PER_SEC as i64) as u32,
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then(self.nanos.cmp(&other.nanos))
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp::new(
            self.seconds.wrapping_add(rhs.seconds),
            self.nanos + rhs.nanos,
        )
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    /// Panics if `rhs > self`; spec.md §3 defines subtraction only for that
    /// case and requires callers to guarantee it. Use `checked_sub` at
    /// boundaries where the caller isn't trusted.
    fn sub(self, rhs: Timestamp) -> Timestamp {
        self.checked_sub(rhs)
            .expect("Timestamp subtraction requires minuend >= subtrahend")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_overflowing_nanos() {
        let ts = Timestamp::new(1, 1_500_000_000);
        assert_eq!(ts, Timestamp::new(2, 500_000_000));
    }

    #[test]
    fn is_set_is_false_only_for_zero() {
        assert!(!Timestamp::ZERO.is_set());
        assert!(Timestamp::new(0, 1).is_set());
        assert!(Timestamp::new(1, 0).is_set());
    }

    #[test]
    fn add_normalizes_carry() {
        let a = Timestamp::new(1, 600_000_000);
        let b = Timestamp::new(2, 700_000_000);
        assert_eq!(a + b, Timestamp::new(4, 300_000_000));
    }

    #[test]
    fn sub_borrows_across_seconds() {
        let a = Timestamp::new(5, 200_000_000);
        let b = Timestamp::new(2, 900_000_000);
        assert_eq!(a - b, Timestamp::new(2, 300_000_000));
    }

    #[test]
    fn checked_sub_rejects_negative_result() {
        let a = Timestamp::new(1, 0);
        let b = Timestamp::new(2, 0);
        assert_eq!(a.checked_sub(b), None);
    }

    #[test]
    fn ordering_compares_seconds_then_nanos() {
        assert!(Timestamp::new(1, 999) < Timestamp::new(2, 0));
        assert!(Timestamp::new(1, 0) < Timestamp::new(1, 1));
    }

    #[test]
    fn truncate_to_millis_rounds_down() {
        let ts = Timestamp::new(3, 123_456_789);
        assert_eq!(ts.truncate_to_millis(), Timestamp::new(3, 123_000_000));
    }

    #[test]
    fn nanos_i64_roundtrip() {
        let ts = Timestamp::new(12, 345);
        assert_eq!(Timestamp::from_nanos_i64(ts.as_nanos_i64()), ts);
    }

    #[test]
    fn from_nanos_i64_saturates_at_zero() {
        assert_eq!(Timestamp::from_nanos_i64(-5), Timestamp::ZERO);
    }
}
