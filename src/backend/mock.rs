// SPDX-License-Identifier: Apache-2.0

//! An in-process [`TimeBackend`] with no hardware dependency, for host-run
//! unit and integration tests. Modeled on the teacher crate's `#[cfg(test)]`
//! fields (`current_systick`, `set_syst`) and on the EFM32 RTC backend's
//! `RTCControl` (`overflow_counter` + a read-and-clear `compare_callback`
//! slot) from `original_source/platform/efm32/common/systime_rtc.c`.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use super::{ticks_from_delta, FireCallback, MonotonicCounter, TimeBackend};
use crate::error::BackendError;
use crate::timestamp::Timestamp;

#[derive(Clone, Copy)]
struct Armed {
    deadline_ticks: u64,
    callback: FireCallback,
}

/// A free-running up-counter with a configurable width and frequency,
/// advanced explicitly by test code via [`MockBackend::advance`] or
/// [`MockBackend::set_register`] instead of real hardware.
pub struct MockBackend {
    counter: MonotonicCounter,
    register: AtomicU32,
    counter_max: u32,
    armed: Cell<Option<Armed>>,
}

// `register` and `MonotonicCounter`'s own overflow field are both real
// atomics, which is what makes it sound for `tests/concurrency_stress.rs`
// to advance the register from one thread while another reads
// `monotonic_nanos` through `MonotonicCounter::read_ticks`'s retry loop.
// `armed` stays a plain `Cell`: only `arm`/`maybe_fire` ever touch it, and
// every caller in this crate drives those from a single mainloop/ISR pair,
// never two threads at once.
unsafe impl Sync for MockBackend {}

impl MockBackend {
    /// `counter_max` is the hardware register's maximum value (e.g.
    /// `0x00FF_FFFF` for a 24-bit counter); it wraps to zero on overflow.
    pub const fn new(counter_max: u32, frequency: u32) -> Self {
        MockBackend {
            counter: MonotonicCounter::new(counter_max as u64 + 1, frequency),
            register: AtomicU32::new(0),
            counter_max,
            armed: Cell::new(None),
        }
    }

    /// Directly sets the hardware register, without touching the overflow
    /// counter. Use [`Self::advance`] to simulate time passing including
    /// wraps.
    pub fn set_register(&self, value: u32) {
        debug_assert!(value <= self.counter_max);
        self.register.store(value, Ordering::SeqCst);
    }

    /// Advances the simulated counter by `ticks`, wrapping (and firing
    /// `on_overflow`, and any due arm) as many times as needed.
    pub fn advance(&self, mut ticks: u64) {
        loop {
            let remaining = self.counter_max as u64 + 1 - self.register.load(Ordering::SeqCst) as u64;
            if ticks < remaining {
                self.register
                    .fetch_add(ticks as u32, Ordering::SeqCst);
                self.maybe_fire();
                return;
            }
            ticks -= remaining;
            self.register.store(0, Ordering::SeqCst);
            self.counter.on_overflow();
            self.maybe_fire();
        }
    }

    fn read_register(&self) -> u32 {
        self.register.load(Ordering::SeqCst)
    }

    /// Fires the armed callback once the wide tick count reaches its
    /// deadline. Checking an absolute deadline (rather than `register ==
    /// 0`) is what lets `arm` schedule a callback at any sub-period delta,
    /// not only at a full wrap back to zero.
    fn maybe_fire(&self) {
        let due = match self.armed.get() {
            Some(armed) if self.counter.read_ticks(|| self.read_register()) >= armed.deadline_ticks => {
                Some(armed.callback)
            }
            _ => None,
        };
        if due.is_some() {
            self.armed.set(None);
        }
        if let Some(callback) = due {
            callback();
        }
    }
}

impl TimeBackend for MockBackend {
    fn init(&self) -> Result<(), BackendError> {
        self.register.store(0, Ordering::SeqCst);
        self.armed.set(None);
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.counter.frequency()
    }

    fn monotonic_seconds(&self) -> u32 {
        self.counter.seconds(|| self.read_register())
    }

    fn monotonic_nanos(&self) -> Timestamp {
        self.counter.timestamp(|| self.read_register())
    }

    fn arm(&self, delta: Timestamp, callback: FireCallback) {
        let ticks = ticks_from_delta(
            delta,
            self.counter.frequency(),
            self.counter.overflow_period_secs(),
        );
        let now_ticks = self.counter.read_ticks(|| self.read_register());
        self.armed.set(Some(Armed {
            deadline_ticks: now_ticks + ticks as u64,
            callback,
        }));
        // ticks_from_delta clamps to >= 1, so advance always makes
        // progress and maybe_fire runs the callback exactly once.
        self.advance(ticks as u64);
    }
}
