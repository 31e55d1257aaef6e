// SPDX-License-Identifier: Apache-2.0

//! Idle/wake glue (spec.md §4.D): a single latched event flag bridging any
//! ISR wake source and the cooperative mainloop's sleep routine.
//!
//! Generalizes `original_source/core/sys/lpm.c`'s `LPM_RegisterEvent`/
//! `LPM_WaitForEvent`, which hard-coded EFM32's `INT_Disable`/
//! `EMU_EnterEM2`/`INT_Enable`. Here the disable/sleep/enable window is a
//! [`critical_section::with`] call, so the same code works under any
//! `critical-section` implementation the integrator registers.

use core::sync::atomic::{AtomicBool, Ordering};

/// A single-bit wake latch. Safe to share between one or more ISRs
/// (writers via [`Self::register_event`]) and exactly one mainloop idle
/// routine (reader via [`Self::wait_for_event`]).
pub struct EventLatch {
    pending: AtomicBool,
}

impl EventLatch {
    pub const fn new() -> Self {
        EventLatch {
            pending: AtomicBool::new(false),
        }
    }

    /// Call from ISR context (or any wake source) to latch a pending wake.
    pub fn register_event(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Blocks the calling (cooperative, single) mainloop until an event is
    /// latched, sleeping via `sleep` in between checks.
    ///
    /// `sleep` runs with interrupts masked by the surrounding critical
    /// section on every iteration that finds nothing pending — this is
    /// what makes the check-then-sleep sequence atomic with respect to
    /// interrupts. It relies on the target's "wait for interrupt"
    /// instruction waking even while interrupts are masked at the core
    /// level, as long as the interrupt is enabled at the controller (true
    /// of Cortex-M's `WFI`); `sleep` must be that instruction, not a
    /// software busy-wait.
    pub fn wait_for_event(&self, mut sleep: impl FnMut()) {
        loop {
            let woke = critical_section::with(|_cs| {
                if self.pending.load(Ordering::SeqCst) {
                    true
                } else {
                    sleep();
                    false
                }
            });
            if woke {
                break;
            }
        }
        self.pending.store(false, Ordering::SeqCst);
    }
}

impl Default for EventLatch {
    fn default() -> Self {
        Self::new()
    }
}
