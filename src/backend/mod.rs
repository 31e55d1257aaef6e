// SPDX-License-Identifier: Apache-2.0

//! The downward interface: the contract any concrete counter driver must
//! satisfy, plus [`MonotonicCounter`], the race-free "narrow hardware
//! counter + software overflow counter" combinator that backend authors
//! build on. This is the generalization of the teacher crate's `Timer`
//! (which *was* exactly this combinator, hardwired to Cortex-M SysTick).

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::BackendError;
use crate::timestamp::Timestamp;

pub mod mock;

#[cfg(feature = "cortex-m")]
pub mod cortex_m_syst;

#[cfg(feature = "embassy-time-driver")]
pub mod embassy;

/// The one-shot compare-match callback a backend invokes. No captured
/// environment: matches `void (*callback)(void)` in the original C
/// `SysTimeBackend`, and the teacher's `RTCControl.compare_callback` slot.
pub type FireCallback = fn();

/// Backend Descriptor (spec.md §3): the five operations a driver for the
/// single free-running counter + single compare channel must provide.
///
/// At most one implementor is installed for the lifetime of the process,
/// via [`crate::service::SystemTime::init`].
pub trait TimeBackend {
    /// Starts the free-running counter at a fixed frequency, enables
    /// overflow and compare interrupts, and zeroes the overflow counter.
    fn init(&self) -> Result<(), BackendError>;

    /// The backend's fixed counting frequency in Hz.
    fn frequency(&self) -> u32;

    /// `floor(ticks / frequency())`.
    fn monotonic_seconds(&self) -> u32;

    /// The full-resolution monotonic reading, race-free against the
    /// overflow ISR.
    fn monotonic_nanos(&self) -> Timestamp;

    /// Schedules `callback` to fire `delta` in the future, overwriting any
    /// previously armed callback. A `delta` at or beyond one overflow
    /// period is clamped to the minimum delay (spec.md §4.A); callers that
    /// need a longer wait re-arm once the backend catches up.
    fn arm(&self, delta: Timestamp, callback: FireCallback);
}

/// Converts a relative `delta` into a tick count for `arm`, applying the
/// spec.md §4.A clamp: a `delta` whose seconds component reaches or
/// exceeds one overflow period collapses to the minimum tick count (an
/// immediate fire), and the result is never less than one tick.
pub fn ticks_from_delta(delta: Timestamp, frequency: u32, overflow_period_secs: u32) -> u32 {
    if delta.seconds >= overflow_period_secs {
        return 1;
    }
    let ticks = (delta.seconds as u64) * frequency as u64
        + (delta.nanos as u64 * frequency as u64) / 1_000_000_000;
    ticks.max(1).min(u32::MAX as u64) as u32
}

/// `nanos = ((cnt mod F) * 1e9) / F`, computed without a 64-bit multiply
/// overflowing on a 32-bit part. For `F == 32_768` this uses the exact
/// decomposition from spec.md §4.A (`(cnt * 125_000 / F) * 8_000`); other
/// frequencies fall back to a widened `u64` computation, which is correct
/// for any `F` but costs a soft 64-bit divide on platforms without one.
pub fn subtick_nanos(cnt_mod_f: u32, frequency: u32) -> u32 {
    if frequency == 32_768 {
        ((cnt_mod_f * 125_000) / frequency) * 8_000
    } else {
        ((cnt_mod_f as u64 * 1_000_000_000) / frequency as u64) as u32
    }
}

/// Race-free wide monotonic counter: a narrow, wrapping hardware register
/// plus a software overflow count, scaled to a fixed frequency.
///
/// This is the pattern every backend in this crate is built from — the
/// EFM32 RTC backend the spec is grounded on (`overflow_counter` +
/// `RTC_CounterGet()`, double-read-and-retry) and the teacher's SysTick
/// timer (`inner_wraps`/`outer_wraps` + `SYST::get_current()`) are both
/// instances of it, just with different counter widths and directions.
pub struct MonotonicCounter {
    overflow: AtomicU32,
    counter_modulus: u64,
    frequency: u32,
}

impl MonotonicCounter {
    /// `counter_modulus` is one past the hardware counter's maximum value
    /// (e.g. `1 << 24` for a 24-bit counter that wraps `0xFF_FFFF -> 0`).
    pub const fn new(counter_modulus: u64, frequency: u32) -> Self {
        MonotonicCounter {
            overflow: AtomicU32::new(0),
            counter_modulus,
            frequency,
        }
    }

    /// Call from the counter-overflow ISR.
    pub fn on_overflow(&self) {
        let wraps = self.overflow.fetch_add(1, Ordering::SeqCst) + 1;
        crate::trace!("counter overflow, wraps={}", wraps);
    }

    pub const fn frequency(&self) -> u32 {
        self.frequency
    }

    /// One overflow period, in whole seconds, rounded down. Used by `arm`
    /// to decide whether a requested delay needs clamping.
    pub fn overflow_period_secs(&self) -> u32 {
        (self.counter_modulus / self.frequency as u64) as u32
    }

    /// Race-free wide tick count: read the overflow counter, read the
    /// hardware register, read the overflow counter again, retry if it
    /// moved. This is the only correct pattern for an unsynchronized ISR
    /// writer and a reader (spec.md §4.A).
    pub fn read_ticks(&self, read_hw: impl Fn() -> u32) -> u64 {
        loop {
            let before = self.overflow.load(Ordering::SeqCst);
            let cnt = read_hw() as u64;
            let after = self.overflow.load(Ordering::SeqCst);
            if before == after {
                return before as u64 * self.counter_modulus + cnt;
            }
        }
    }

    pub fn seconds(&self, read_hw: impl Fn() -> u32) -> u32 {
        (self.read_ticks(read_hw) / self.frequency as u64) as u32
    }

    pub fn timestamp(&self, read_hw: impl Fn() -> u32) -> Timestamp {
        let ticks = self.read_ticks(read_hw);
        let seconds = (ticks / self.frequency as u64) as u32;
        let remainder = (ticks % self.frequency as u64) as u32;
        Timestamp::new(seconds, subtick_nanos(remainder, self.frequency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtick_nanos_is_exact_at_32768hz_boundaries() {
        assert_eq!(subtick_nanos(0, 32_768), 0);
        assert_eq!(subtick_nanos(16_384, 32_768), 500_000_000);
        assert_eq!(subtick_nanos(32_767, 32_768), 999_969_482);
    }

    #[test]
    fn subtick_nanos_generic_path_matches_widened_math() {
        assert_eq!(subtick_nanos(500, 1_000), 500_000_000);
        assert_eq!(subtick_nanos(999_999, 1_000_000), 999_999_000);
    }

    #[test]
    fn ticks_from_delta_enforces_minimum_one_tick() {
        assert_eq!(ticks_from_delta(Timestamp::ZERO, 32_768, 512), 1);
    }

    #[test]
    fn ticks_from_delta_clamps_at_overflow_period() {
        let delta = Timestamp::new(512, 0);
        assert_eq!(ticks_from_delta(delta, 32_768, 512), 1);
    }

    #[test]
    fn ticks_from_delta_scales_subsecond_component() {
        let delta = Timestamp::new(0, 500_000_000);
        assert_eq!(ticks_from_delta(delta, 32_768, 512), 16_384);
    }

    #[test]
    fn monotonic_counter_read_ticks_accumulates_overflow() {
        let counter = MonotonicCounter::new(1 << 24, 32_768);
        counter.on_overflow();
        counter.on_overflow();
        let ticks = counter.read_ticks(|| 10);
        assert_eq!(ticks, 2 * (1u64 << 24) + 10);
    }

    #[test]
    fn monotonic_counter_timestamp_matches_seconds() {
        let counter = MonotonicCounter::new(1 << 24, 32_768);
        let ts = counter.timestamp(|| 32_768 * 3);
        assert_eq!(ts.seconds, 3);
        assert_eq!(ts.nanos, 0);
    }

    #[test]
    fn overflow_period_secs_matches_counter_shape() {
        let counter = MonotonicCounter::new(1 << 24, 32_768);
        assert_eq!(counter.overflow_period_secs(), (1u32 << 24) / 32_768);
    }
}
