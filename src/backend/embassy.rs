// SPDX-License-Identifier: Apache-2.0

//! Bridges a [`TimeBackend`] to `embassy-time-driver` (feature
//! `embassy-time-driver`), so an `embassy-executor` task set can run
//! alongside this crate's own [`crate::timer::TimerManager`] on the same
//! hardware counter.
//!
//! Grounded in `other_examples/netoneko-akuma`'s ARM generic timer
//! `embassy_time_driver::Driver` implementation: the fixed-size wake
//! queue, the "collect wakers inside the critical section, wake them
//! outside it" split in [`EmbassyDriver::check_alarms`], and re-arming the
//! hardware for the single earliest pending wake are all taken from it,
//! adapted from a raw `asm!`-driven ARM generic timer to this crate's
//! [`TimeBackend`] trait so the same driver works over any concrete
//! backend.
//!
//! Runs on the backend's monotonic domain directly, not through
//! [`crate::service::SystemTime`]'s realtime offset — `embassy-time`'s own
//! tick count is a free-running counter unrelated to wall-clock time, so
//! mixing in [`crate::service::SystemTime::set_realtime`]'s offset would
//! make a stored wake target jump whenever the offset changes.

use core::cell::{Cell, RefCell};
use core::task::Waker;

use critical_section::Mutex;
use embassy_time_driver::Driver;

use super::TimeBackend;
use crate::timestamp::Timestamp;

/// `embassy-time`'s fixed internal tick rate (its default
/// `tick-hz-1_000_000` feature).
const TICK_HZ: u64 = 1_000_000;

const QUEUE_SIZE: usize = 8;

struct ScheduledWake {
    at: u64,
    waker: Option<Waker>,
}

impl ScheduledWake {
    const fn empty() -> Self {
        ScheduledWake {
            at: u64::MAX,
            waker: None,
        }
    }
}

pub struct EmbassyDriver {
    backend: Mutex<Cell<Option<&'static dyn TimeBackend>>>,
    queue: Mutex<RefCell<[ScheduledWake; QUEUE_SIZE]>>,
}

impl EmbassyDriver {
    const fn new() -> Self {
        const EMPTY: ScheduledWake = ScheduledWake::empty();
        EmbassyDriver {
            backend: Mutex::new(Cell::new(None)),
            queue: Mutex::new(RefCell::new([EMPTY; QUEUE_SIZE])),
        }
    }

    fn ticks_to_nanos_delta(ticks_from_now: u64) -> Timestamp {
        Timestamp::new(
            (ticks_from_now / TICK_HZ) as u32,
            ((ticks_from_now % TICK_HZ) * 1_000) as u32,
        )
    }

    fn now_ticks(backend: &dyn TimeBackend) -> u64 {
        let ts = backend.monotonic_nanos();
        ts.seconds as u64 * TICK_HZ + ts.nanos as u64 / 1_000
    }

    fn rearm_locked<'cs>(&self, cs: critical_section::CriticalSection<'cs>, backend: &dyn TimeBackend) {
        let queue = self.queue.borrow(cs).borrow();
        let earliest = queue
            .iter()
            .filter(|entry| entry.waker.is_some())
            .map(|entry| entry.at)
            .min();
        drop(queue);
        if let Some(at) = earliest {
            let now = Self::now_ticks(backend);
            let delta_ticks = at.saturating_sub(now);
            backend.arm(Self::ticks_to_nanos_delta(delta_ticks), on_backend_fire);
        }
    }

    /// Fires any wakers whose target has passed and re-arms for the next
    /// one. Called from [`on_backend_fire`], the function installed as
    /// the backend's fire callback by [`install`].
    fn check_alarms(&self) {
        critical_section::with(|cs| {
            let Some(backend) = self.backend.borrow(cs).get() else {
                return;
            };
            let now = Self::now_ticks(backend);

            let mut due: [Option<Waker>; QUEUE_SIZE] = Default::default();
            {
                let mut queue = self.queue.borrow(cs).borrow_mut();
                for (slot, entry) in queue.iter_mut().enumerate() {
                    if entry.waker.is_some() && entry.at <= now {
                        due[slot] = entry.waker.take();
                        entry.at = u64::MAX;
                    }
                }
            }
            self.rearm_locked(cs, backend);

            // Wakers run outside the lock: `Waker::wake` may re-enter
            // `schedule_wake` for the same task.
            for waker in due.into_iter().flatten() {
                waker.wake();
            }
        });
    }
}

impl Driver for EmbassyDriver {
    fn now(&self) -> u64 {
        critical_section::with(|cs| {
            self.backend
                .borrow(cs)
                .get()
                .map(Self::now_ticks)
                .unwrap_or(0)
        })
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        critical_section::with(|cs| {
            let Some(backend) = self.backend.borrow(cs).get() else {
                return;
            };
            let mut queue = self.queue.borrow(cs).borrow_mut();

            let mut free_slot = None;
            let mut evict_slot = 0;
            let mut evict_at = u64::MAX;
            for (i, entry) in queue.iter_mut().enumerate() {
                if entry.waker.as_ref().is_some_and(|w| w.will_wake(waker)) {
                    entry.at = at;
                    drop(queue);
                    self.rearm_locked(cs, backend);
                    return;
                }
                if entry.waker.is_none() && free_slot.is_none() {
                    free_slot = Some(i);
                }
                // No free slot: fall back to the soonest-to-fire entry,
                // same replacement policy as the driver this was grounded
                // on.
                if entry.at < evict_at {
                    evict_at = entry.at;
                    evict_slot = i;
                }
            }

            let slot = free_slot.unwrap_or(evict_slot);
            queue[slot] = ScheduledWake {
                at,
                waker: Some(waker.clone()),
            };
            drop(queue);
            self.rearm_locked(cs, backend);
        });
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: EmbassyDriver = EmbassyDriver::new());

fn on_backend_fire() {
    DRIVER.check_alarms();
}

/// Installs `backend` as the clock source for `embassy-time`. Call once at
/// startup, after [`crate::service::SystemTime::init`] (or the backend's
/// own `init`) has started the counter.
pub fn install(backend: &'static dyn TimeBackend) {
    critical_section::with(|cs| DRIVER.backend.borrow(cs).set(Some(backend)));
}
