// SPDX-License-Identifier: Apache-2.0

//! System Time Service (spec.md §4.B): the monotonic and realtime clocks,
//! the settable offset between them, and `trigger_at`.
//!
//! Grounded in `original_source/core/sys/systime.c`'s `SysTimeControl`
//! (backend pointer + offset) and `SYSTIME_Init`/`SYSTIME_Trigger`.

use core::cell::Cell;

use crate::backend::{FireCallback, TimeBackend};
use crate::error::{BackendError, TimeError};
use crate::timestamp::Timestamp;

/// Time Service State (spec.md §3): a backend plus the signed offset such
/// that `realtime = monotonic + offset`.
///
/// Only [`Self::set_realtime`] mutates `offset`; it starts at zero. As
/// with [`crate::timer::Timer`], this type is mainloop-only — nothing here
/// is called from interrupt context, so plain [`Cell`] is sufficient
/// interior mutability and no atomics are needed for `offset` itself
/// (spec.md §5: "only mainloop reads it").
pub struct SystemTime<B: TimeBackend> {
    backend: B,
    offset_nanos: Cell<i64>,
}

// Mainloop-only access, same contract as `Timer`/`TimerManager`: a
// `SystemTime` is typically held in a `static`, which requires `Sync`,
// but nothing here is touched from an ISR.
unsafe impl<B: TimeBackend> Sync for SystemTime<B> {}

impl<B: TimeBackend> SystemTime<B> {
    /// Pairs `backend` with a zero offset. Doesn't touch the backend itself
    /// — a `const fn` so a `SystemTime` can sit in a `static`, mirroring
    /// `original_source/core/sys/systime.c`'s zero-initialized
    /// `static SysTimeControl SysTimeCtrl`.
    pub const fn new(backend: B) -> Self {
        SystemTime {
            backend,
            offset_nanos: Cell::new(0),
        }
    }

    /// Runs the backend's own `init`, starting the free-running counter.
    /// `SYSTIME_Init` in the original; call once at startup.
    pub fn init(&self) -> Result<(), BackendError> {
        self.backend.init()
    }

    /// The monotonic clock: the sole safe basis for durations and for the
    /// timer manager's queue ordering (spec.md §4.B rationale).
    pub fn monotonic_now(&self) -> Timestamp {
        self.backend.monotonic_nanos()
    }

    /// `monotonic_now() + offset`.
    pub fn realtime_now(&self) -> Timestamp {
        Timestamp::from_nanos_i64(self.monotonic_now().as_nanos_i64() + self.offset_nanos.get())
    }

    /// Sets `offset = ts - monotonic_now()`. Rejects `ts.nanos >=
    /// 1_000_000_000` without mutating state, matching `clock_settime`'s
    /// `EINVAL` check in the original.
    pub fn set_realtime(&self, ts: Timestamp) -> Result<(), TimeError> {
        if ts.nanos >= 1_000_000_000 {
            return Err(TimeError::InvalidNanos);
        }
        let offset = ts.as_nanos_i64() - self.monotonic_now().as_nanos_i64();
        crate::debug!("set_realtime: offset_nanos {} -> {}", self.offset_nanos.get(), offset);
        self.offset_nanos.set(offset);
        Ok(())
    }

    /// Arms the backend to fire `callback` at the given **realtime**
    /// instant. If that instant has already passed, invokes `callback`
    /// synchronously before returning — this can never fail.
    ///
    /// `SYSTIME_Trigger` in the original; see spec.md §9's open question on
    /// why timer targets are realtime rather than monotonic.
    pub fn trigger_at(&self, at_realtime: Timestamp, callback: FireCallback) {
        let now = self.realtime_now();
        if at_realtime <= now {
            crate::trace!("trigger_at: target already past, firing synchronously");
            callback();
            return;
        }
        let delta = Timestamp::from_nanos_i64(at_realtime.as_nanos_i64() - now.as_nanos_i64());
        self.backend.arm(delta, callback);
    }

    /// `(0, 1_000_000_000 / frequency)`: the smallest time difference the
    /// backend can resolve.
    pub fn resolution(&self) -> Timestamp {
        Timestamp::new(0, 1_000_000_000 / self.backend.frequency())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
