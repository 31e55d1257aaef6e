// SPDX-License-Identifier: Apache-2.0

//! A [`TimeBackend`] built on Cortex-M SysTick (feature `cortex-m`).
//!
//! Grounded in the teacher crate's `Timer` (`src/timer.rs`): `get_syst`,
//! `read_systick_countflag` and the `start` register sequence are adapted
//! directly from it. `MonotonicCounter` here plays the role of the
//! teacher's `inner_wraps`/`outer_wraps` pair, generalized to any counter
//! shape rather than hardwired to SysTick's 24-bit down-counter.
//!
//! SysTick has no independent compare channel — only the one periodic
//! "reload reached zero" interrupt the teacher's `Timer` also relies on
//! for wrap counting. [`SysTickBackend::arm`] can't reprogram a second
//! channel, so it instead remembers an absolute tick deadline and checks
//! it on every periodic interrupt via [`SysTickBackend::on_tick`]; a
//! requested delay always fires on the next period boundary at or after
//! it, never exactly on it. Applications that need sub-period precision
//! should shrink `reload` rather than expect this backend to reprogram it
//! dynamically.
//!
//! `SystemTime::new`/[`SysTickBackend::new`] are both `const fn` so the
//! pair can sit in a `static`, matching the teacher's own zero-initialized
//! `static INSTANCE: Timer`; the one piece that genuinely can't be
//! produced at compile time is the `SYST` peripheral token itself, handed
//! over at startup via [`SysTickBackend::bind`].

use core::cell::{Cell, RefCell};

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use critical_section::Mutex;

use super::{ticks_from_delta, FireCallback, MonotonicCounter, TimeBackend};
use crate::error::BackendError;
use crate::timestamp::Timestamp;

#[derive(Clone, Copy)]
struct Armed {
    deadline_ticks: u64,
    callback: FireCallback,
}

/// `reload` must be in `1..=0x00FF_FFFF` (SysTick's reload register is
/// 24 bits wide); `frequency` is the counting frequency in Hz, typically
/// the core clock.
///
/// `SYST` is a runtime-only peripheral singleton (obtained from
/// `cortex_m::Peripherals::take()`), so unlike the mock backend this one
/// can't be handed its peripheral at `const` construction time. Build it
/// with [`Self::new`] and call [`Self::bind`] once, before [`Self::init`],
/// to hand over the `SYST` token.
pub struct SysTickBackend {
    counter: MonotonicCounter,
    reload: u32,
    syst: Mutex<RefCell<Option<SYST>>>,
    armed: Mutex<Cell<Option<Armed>>>,
}

// SAFETY contract matches `MockBackend`: every method here is called from
// either the single SysTick exception handler or the single mainloop, and
// every shared field is behind a `critical_section::Mutex` or an atomic.
unsafe impl Sync for SysTickBackend {}

impl SysTickBackend {
    pub const fn new(frequency: u32, reload: u32) -> Self {
        SysTickBackend {
            counter: MonotonicCounter::new(reload as u64 + 1, frequency),
            reload,
            syst: Mutex::new(RefCell::new(None)),
            armed: Mutex::new(Cell::new(None)),
        }
    }

    /// Hands over the `SYST` peripheral token. Call once, before
    /// [`Self::init`]; calling it again replaces the previously bound
    /// token.
    pub fn bind(&self, syst: SYST) {
        critical_section::with(|cs| self.syst.borrow(cs).replace(Some(syst)));
    }

    /// Call from the `SysTick` exception handler.
    pub fn on_tick(&self) {
        self.counter.on_overflow();
        let due = critical_section::with(|cs| {
            let due = match self.armed.borrow(cs).get() {
                Some(armed)
                    if self.counter.read_ticks(|| self.read_syst_ticks()) >= armed.deadline_ticks =>
                {
                    Some(armed.callback)
                }
                _ => None,
            };
            if due.is_some() {
                self.armed.borrow(cs).set(None);
            }
            due
        });
        if let Some(callback) = due {
            callback();
        }
    }

    /// SysTick counts down from `reload` to `0`; this rebases that into
    /// the ascending, zero-at-period-start shape [`MonotonicCounter`]
    /// expects.
    fn read_syst_ticks(&self) -> u32 {
        self.reload - SYST::get_current()
    }

    fn read_systick_countflag(&self) -> bool {
        const COUNTFLAG: u32 = 1 << 16;
        // SAFETY: a single bitfield read of a read-only-to-us status
        // register; clearing COUNTFLAG on read is a documented SysTick
        // side effect, not a data race.
        let csr = unsafe { (*SYST::PTR).csr.read() };
        (csr & COUNTFLAG) != 0
    }
}

impl TimeBackend for SysTickBackend {
    fn init(&self) -> Result<(), BackendError> {
        if self.reload == 0 || self.reload > (1 << 24) - 1 {
            return Err(BackendError::Other);
        }
        critical_section::with(|cs| {
            let mut slot = self.syst.borrow(cs).borrow_mut();
            let Some(syst) = slot.as_mut() else {
                return Err(BackendError::NotResponding);
            };
            syst.set_clock_source(SystClkSource::Core);
            syst.set_reload(self.reload);
            syst.clear_current();
            syst.enable_interrupt();
            syst.enable_counter();
            Ok(())
        })?;
        self.read_systick_countflag();
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.counter.frequency()
    }

    fn monotonic_seconds(&self) -> u32 {
        self.counter.seconds(|| self.read_syst_ticks())
    }

    fn monotonic_nanos(&self) -> Timestamp {
        self.counter.timestamp(|| self.read_syst_ticks())
    }

    fn arm(&self, delta: Timestamp, callback: FireCallback) {
        let ticks = ticks_from_delta(
            delta,
            self.counter.frequency(),
            self.counter.overflow_period_secs(),
        );
        let now_ticks = self.counter.read_ticks(|| self.read_syst_ticks());
        critical_section::with(|cs| {
            self.armed.borrow(cs).set(Some(Armed {
                deadline_ticks: now_ticks + ticks as u64,
                callback,
            }));
        });
    }
}
