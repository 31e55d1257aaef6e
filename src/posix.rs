// SPDX-License-Identifier: Apache-2.0

//! POSIX veneer (feature `posix`): `clock_gettime`/`clock_settime`/
//! `clock_getres`, `gettimeofday`/`settimeofday` and `time`, as thin
//! wrappers over a globally registered [`SystemTime`].
//!
//! A thin adapter, not core — grounded in `original_source/core/sys/
//! systime.c`'s `#if defined(_POSIX_TIMERS)` block, with `TimeError`
//! standing in for `errno`/`EINVAL`/`EFAULT` (there's no null-pointer case
//! to report here, since these take/return values rather than pointers).
//! `SystemTime<B>` is generic over its backend, so this module type-erases
//! it behind [`ErasedSystemTime`] to support a single global registration
//! point, the same role `SysTimeCtrl.backend` plays in the original.

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::TimeError;
use crate::service::SystemTime;
use crate::timestamp::Timestamp;
use crate::backend::TimeBackend;

/// `CLOCK_REALTIME` / `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Realtime,
    Monotonic,
}

/// Object-safe view of [`SystemTime`], used only to erase its backend type
/// parameter for [`register`].
pub trait ErasedSystemTime: Sync {
    fn monotonic_now(&self) -> Timestamp;
    fn realtime_now(&self) -> Timestamp;
    fn set_realtime(&self, ts: Timestamp) -> Result<(), TimeError>;
    fn resolution(&self) -> Timestamp;
}

impl<B: TimeBackend> ErasedSystemTime for SystemTime<B> {
    fn monotonic_now(&self) -> Timestamp {
        SystemTime::monotonic_now(self)
    }
    fn realtime_now(&self) -> Timestamp {
        SystemTime::realtime_now(self)
    }
    fn set_realtime(&self, ts: Timestamp) -> Result<(), TimeError> {
        SystemTime::set_realtime(self, ts)
    }
    fn resolution(&self) -> Timestamp {
        SystemTime::resolution(self)
    }
}

static REGISTRY: Mutex<Cell<Option<&'static dyn ErasedSystemTime>>> = Mutex::new(Cell::new(None));

/// Registers `sys` as the backing clock for every function in this module.
/// Call once at startup, after `sys.init()`.
pub fn register(sys: &'static dyn ErasedSystemTime) {
    critical_section::with(|cs| REGISTRY.borrow(cs).set(Some(sys)));
}

fn registered() -> &'static dyn ErasedSystemTime {
    critical_section::with(|cs| REGISTRY.borrow(cs).get())
        .expect("posix veneer used before systime::posix::register()")
}

/// `clock_gettime`. `CLOCK_MONOTONIC` cannot fail; `CLOCK_REALTIME` is
/// likewise infallible here since there is no invalid id left to reject
/// once `clock_id` is this enum rather than a raw integer — kept
/// `Result`-returning for symmetry with [`clock_settime`] and parity with
/// the original's signature.
pub fn clock_gettime(clock_id: ClockId) -> Result<Timestamp, TimeError> {
    let sys = registered();
    Ok(match clock_id {
        ClockId::Realtime => sys.realtime_now(),
        ClockId::Monotonic => sys.monotonic_now(),
    })
}

/// `clock_settime`. Only `CLOCK_REALTIME` is settable; `CLOCK_MONOTONIC`
/// is rejected with `InvalidClock`, matching the original's `default:
/// errno = EINVAL`.
pub fn clock_settime(clock_id: ClockId, tp: Timestamp) -> Result<(), TimeError> {
    match clock_id {
        ClockId::Realtime => registered().set_realtime(tp),
        ClockId::Monotonic => Err(TimeError::InvalidClock),
    }
}

/// `clock_getres`. Both clocks share one backend, so both report the same
/// resolution.
pub fn clock_getres(clock_id: ClockId) -> Result<Timestamp, TimeError> {
    match clock_id {
        ClockId::Realtime | ClockId::Monotonic => Ok(registered().resolution()),
    }
}

/// `gettimeofday`: realtime as `(seconds, microseconds)`.
pub fn gettimeofday() -> (u32, u32) {
    let ts = registered().realtime_now();
    (ts.seconds, ts.nanos / 1_000)
}

/// `settimeofday`: sets realtime from `(seconds, microseconds)`. Rejects
/// `usec >= 1_000_000` with `InvalidMicros`, the check the original
/// performs in its non-`_POSIX_TIMERS` fallback path (here applied
/// unconditionally, since this veneer always goes through
/// [`SystemTime::set_realtime`]).
pub fn settimeofday(seconds: u32, usec: u32) -> Result<(), TimeError> {
    if usec >= 1_000_000 {
        return Err(TimeError::InvalidMicros);
    }
    registered()
        .set_realtime(Timestamp::new(seconds, usec * 1_000))
        .map_err(|_| TimeError::InvalidMicros)
}

/// `time`: realtime seconds only.
pub fn time() -> u32 {
    registered().realtime_now().seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, 32_768));

    fn setup() {
        TIME.init().unwrap();
        register(&TIME);
    }

    #[test]
    fn clock_gettime_monotonic_matches_realtime_before_any_offset() {
        setup();
        let rt = clock_gettime(ClockId::Realtime).unwrap();
        let mt = clock_gettime(ClockId::Monotonic).unwrap();
        assert_eq!(rt, mt);
    }

    #[test]
    fn clock_settime_monotonic_is_rejected() {
        setup();
        assert_eq!(
            clock_settime(ClockId::Monotonic, Timestamp::ZERO),
            Err(TimeError::InvalidClock)
        );
    }

    #[test]
    fn settimeofday_rejects_out_of_range_microseconds() {
        setup();
        assert_eq!(
            settimeofday(0, 1_000_000),
            Err(TimeError::InvalidMicros)
        );
    }

    #[test]
    fn settimeofday_then_gettimeofday_round_trips_seconds() {
        setup();
        settimeofday(500, 250_000).unwrap();
        let (secs, usec) = gettimeofday();
        assert_eq!(secs, 500);
        assert!(usec < 1_000);
    }

    #[test]
    fn time_matches_realtime_seconds() {
        setup();
        settimeofday(12_345, 0).unwrap();
        assert_eq!(time(), 12_345);
    }

    #[test]
    fn clock_getres_matches_backend_frequency() {
        setup();
        let res = clock_getres(ClockId::Realtime).unwrap();
        assert_eq!(res, Timestamp::new(0, 1_000_000_000 / 32_768));
    }
}
