// SPDX-License-Identifier: Apache-2.0

//! The Timer Manager (spec.md §4.C): a single free timer on top of one
//! `SystemTime`, backed by an intrusive doubly-linked queue ordered by
//! ascending realtime target.
//!
//! Grounded in `original_source/core/sys/systimer.c`: `Timer` mirrors
//! `SysTimer` (`running`/`started`/`target`/`timeout`/`interval`/
//! `callback`/`arg` plus the `next`/`prev` links), and `TimerManager`'s
//! `init`/`start`/`pause`/`stop`/`reset`/`poll` mirror `SYSTIMER_Init`,
//! `SYSTIMER_Start`, `SYSTIMER_Pause`, `SYSTIMER_Stop`, `SYSTIMER_Reset`
//! and `SYSTIMER_Process` respectively (`Timer::init_no_start` is
//! `SYSTIMER_Init_NoStart`, which `Timer::new` also performs at
//! construction time). The queue splice logic follows `SYSTIMER_Add`/
//! `SYSTIMER_Remove` exactly, including the tie-break that inserts a new
//! timer before the first existing node with an equal target (spec.md
//! §9's first open question).

use core::cell::Cell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{FireCallback, TimeBackend};
use crate::idle::EventLatch;
use crate::service::SystemTime;
use crate::timestamp::Timestamp;

/// A single software timer (spec.md §3's `Timer Descriptor`): one-shot when
/// `interval` is zero, periodic otherwise.
///
/// Every field is a [`Cell`]: a `Timer` is meant to live in a `static` and
/// be mutated only from the single mainloop thread that owns the
/// [`TimerManager`] it's registered with — never from an ISR. `next`/`prev`
/// are link fields for that manager's intrusive queue and are not
/// meaningful outside it.
pub struct Timer {
    running: Cell<bool>,
    started: Cell<Timestamp>,
    target: Cell<Timestamp>,
    timeout: Cell<Timestamp>,
    interval: Cell<Timestamp>,
    callback: Cell<Option<fn(*mut ())>>,
    arg: Cell<*mut ()>,
    next: Cell<Option<NonNull<Timer>>>,
    prev: Cell<Option<NonNull<Timer>>>,
}

// A `Timer` is only ever touched through `TimerManager`'s methods, which
// are themselves mainloop-only (spec.md §5); the raw pointer in `arg` is
// opaque to this module and never dereferenced here.
unsafe impl Sync for Timer {}

impl Timer {
    /// `Init_NoStart`: builds a stopped, untargeted timer. `timeout_ms` and
    /// `interval_ms` are milliseconds; `interval_ms == 0` makes it one-shot.
    /// `callback` receives `arg` unchanged when the timer fires. `const` so
    /// a `Timer` can sit in a `static`, which is how every use in this
    /// crate constructs one.
    pub const fn new(
        timeout_ms: u32,
        interval_ms: u32,
        callback: fn(*mut ()),
        arg: *mut (),
    ) -> Self {
        Timer {
            running: Cell::new(false),
            started: Cell::new(Timestamp::ZERO),
            target: Cell::new(Timestamp::ZERO),
            timeout: Cell::new(ms_to_timestamp(timeout_ms)),
            interval: Cell::new(ms_to_timestamp(interval_ms)),
            callback: Cell::new(Some(callback)),
            arg: Cell::new(arg),
            next: Cell::new(None),
            prev: Cell::new(None),
        }
    }

    /// `Init_NoStart` on an already-existing timer: resets every field to
    /// the same stopped, untargeted state [`Self::new`] constructs, so a
    /// `Timer` can be re-armed with different parameters instead of only
    /// built once. A no-op on the queue links if the timer is currently
    /// registered with a manager — call [`TimerManager::stop`] first, or
    /// go through [`TimerManager::init`], which does both in order.
    pub fn init_no_start(
        &self,
        timeout_ms: u32,
        interval_ms: u32,
        callback: fn(*mut ()),
        arg: *mut (),
    ) {
        self.running.set(false);
        self.target.set(Timestamp::ZERO);
        self.timeout.set(ms_to_timestamp(timeout_ms));
        self.interval.set(ms_to_timestamp(interval_ms));
        self.callback.set(Some(callback));
        self.arg.set(arg);
        self.next.set(None);
        self.prev.set(None);
    }

    /// Changes the one-shot/initial timeout for a timer that is not
    /// currently running. Does not affect a timer already in a manager's
    /// queue; restart it to pick up the new value.
    pub fn set_timeout(&self, timeout_ms: u32) {
        self.timeout.set(ms_to_timestamp(timeout_ms));
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

const fn ms_to_timestamp(ms: u32) -> Timestamp {
    Timestamp::new(ms / 1000, (ms % 1000) * 1_000_000)
}

/// Converts a queue link back into a reference. Every `NonNull<Timer>` ever
/// stored in a [`TimerManager`]'s queue is taken from a `&'static Timer`
/// handed to `start`/`reset`/etc, so the pointee always outlives the
/// dereference.
#[inline]
fn link(ptr: NonNull<Timer>) -> &'static Timer {
    // SAFETY: see above — every stored link originates from a `'static`
    // reference and no queue ever holds a dangling one.
    unsafe { ptr.as_ref() }
}

/// The Timer Manager (spec.md §4.C): owns the queue of timers registered
/// against one [`SystemTime`] and the single armed backend callback that
/// services its head.
///
/// `wake` is the free function an integrator wires as the backend's fire
/// callback (directly, or from `cortex-m`'s SysTick handler): it must call
/// back into this manager's [`Self::notify_fire`], since a bare `fn()`
/// can't capture `self`. This mirrors the teacher crate's own
/// `static INSTANCE: Timer` plus free-function-ISR pattern.
pub struct TimerManager<'a, B: TimeBackend> {
    time: &'a SystemTime<B>,
    latch: &'a EventLatch,
    wake: FireCallback,
    head: Cell<Option<NonNull<Timer>>>,
    runnable: AtomicBool,
}

// Mainloop-only, like `SystemTime`/`Timer`: `notify_fire` is the one method
// called from ISR context, and it only touches the atomic `runnable` flag
// and the already-`Sync` `EventLatch`.
unsafe impl<'a, B: TimeBackend> Sync for TimerManager<'a, B> {}

impl<'a, B: TimeBackend> TimerManager<'a, B> {
    pub const fn new(time: &'a SystemTime<B>, latch: &'a EventLatch, wake: FireCallback) -> Self {
        TimerManager {
            time,
            latch,
            wake,
            head: Cell::new(None),
            runnable: AtomicBool::new(false),
        }
    }

    /// `Init`: resets `timer` to a fresh one-shot/periodic configuration
    /// via [`Timer::init_no_start`] and immediately [`Self::start`]s it.
    /// `SYSTIMER_Init` in the original, which is exactly `Init_NoStart`
    /// followed by `Start`.
    pub fn init(
        &self,
        timer: &'static Timer,
        timeout_ms: u32,
        interval_ms: u32,
        callback: fn(*mut ()),
        arg: *mut (),
    ) {
        timer.init_no_start(timeout_ms, interval_ms, callback, arg);
        self.start(timer);
    }

    /// `Start`: arms `timer` if not already running. A fresh timer (never
    /// started, or previously [`Self::stop`]ped) begins a full `timeout`
    /// from now; a [`Self::pause`]d timer resumes with its remaining time
    /// intact. `SYSTIMER_Start` in the original.
    pub fn start(&self, timer: &'static Timer) {
        if timer.running.get() {
            return;
        }
        timer.running.set(true);
        let now = self.time.realtime_now();
        if timer.target.get().is_set() {
            let remaining = timer.target.get() - timer.started.get();
            timer.target.set(now + remaining);
        } else {
            timer.target.set(now + timer.timeout.get());
        }
        timer.started.set(now.truncate_to_millis());
        self.add(timer);
        self.arm_for_head();
    }

    /// `Pause`: unschedules `timer` without clearing its target, so a later
    /// [`Self::start`] resumes with the remaining time preserved. A no-op
    /// if `timer` isn't running.
    pub fn pause(&self, timer: &'static Timer) {
        if !timer.running.get() {
            return;
        }
        timer.running.set(false);
        self.remove(timer);
        self.arm_for_head();
    }

    /// `Stop`: pauses `timer` and clears its target, so the next
    /// [`Self::start`] begins a fresh `timeout` rather than resuming.
    pub fn stop(&self, timer: &'static Timer) {
        self.pause(timer);
        timer.target.set(Timestamp::ZERO);
    }

    /// `Reset`: recomputes `started`/`target` from `now` and `timeout`
    /// without touching `running` or the queue. Only meaningful on a timer
    /// that isn't currently queued — [`Self::start`] calls this internally
    /// before adding a fresh timer; calling it directly on a running timer
    /// leaves the queue ordered by its stale target, exactly as in the
    /// original.
    pub fn reset(&self, timer: &Timer) {
        let started = self.time.realtime_now().truncate_to_millis();
        timer.started.set(started);
        timer.target.set(started + timer.timeout.get());
    }

    /// `IsReady`: whether `timer`'s target has already passed.
    pub fn is_ready(&self, timer: &Timer) -> bool {
        timer.target.get().is_set() && timer.target.get() <= self.time.realtime_now()
    }

    /// Marks the manager's cooperative process runnable and latches a
    /// wake. Call this (only) from the function wired to the backend as
    /// the fire callback — never call [`Self::poll`] directly from that
    /// context.
    pub fn notify_fire(&self) {
        self.runnable.store(true, Ordering::SeqCst);
        self.latch.register_event();
    }

    /// Consumes the runnable flag set by [`Self::notify_fire`]. The
    /// mainloop calls this once per wake and runs [`Self::poll`] only when
    /// it returns `true`.
    pub fn take_runnable(&self) -> bool {
        self.runnable.swap(false, Ordering::SeqCst)
    }

    /// Drains every due timer at the head of the queue, firing each one's
    /// callback, then re-arms the backend for the new head. `SYSTIMER_
    /// Process` in the original: periodic timers are collected on a
    /// side list during the sweep and only re-added once the whole
    /// due-prefix has fired, so a timer whose new target also happens to
    /// be due doesn't fire twice in the same sweep.
    pub fn poll(&self) {
        let now = self.time.realtime_now();
        let mut readd: Option<NonNull<Timer>> = None;

        let mut cursor = self.head.get();
        while let Some(node_ptr) = cursor {
            let node = link(node_ptr);
            if !node.target.get().is_set() || node.target.get() > now {
                break;
            }
            let next = node.next.get();

            crate::trace!("timer fire: target={:?} running={}", node.target.get(), node.running.get());
            if let Some(cb) = node.callback.get() {
                cb(node.arg.get());
            }

            if node.running.get() {
                if node.interval.get().is_set() {
                    self.remove(node);
                    node.next.set(readd);
                    readd = Some(node_ptr);
                } else {
                    self.stop(node);
                }
            }

            cursor = next;
        }

        while let Some(node_ptr) = readd {
            let node = link(node_ptr);
            let next = node.next.get();
            node.target.set(node.target.get() + node.interval.get());
            self.add(node);
            readd = next;
        }

        self.arm_for_head();
    }

    /// Re-arms the backend for the new head's target, or leaves it idle if
    /// the queue is empty.
    fn arm_for_head(&self) {
        if let Some(head_ptr) = self.head.get() {
            let head = link(head_ptr);
            self.time.trigger_at(head.target.get(), self.wake);
        }
    }

    /// `SYSTIMER_Add`: splices `timer` into the queue, ordered by ascending
    /// `target`; ties insert before the first existing node with an equal
    /// target, so among simultaneously-due timers the most recently added
    /// one fires first.
    fn add(&self, timer: &'static Timer) {
        let new_ptr = NonNull::from(timer);
        let mut prev: Option<NonNull<Timer>> = None;
        let mut cursor = self.head.get();
        while let Some(node_ptr) = cursor {
            let node = link(node_ptr);
            if node.target.get() >= timer.target.get() {
                break;
            }
            prev = cursor;
            cursor = node.next.get();
        }

        timer.next.set(cursor);
        timer.prev.set(prev);
        if let Some(node_ptr) = cursor {
            link(node_ptr).prev.set(Some(new_ptr));
        }
        match prev {
            Some(prev_ptr) => link(prev_ptr).next.set(Some(new_ptr)),
            None => self.head.set(Some(new_ptr)),
        }
    }

    /// `SYSTIMER_Remove`: unlinks `timer` from wherever it sits in the
    /// queue. A no-op if it isn't linked.
    fn remove(&self, timer: &'static Timer) {
        match timer.prev.get() {
            Some(prev_ptr) => link(prev_ptr).next.set(timer.next.get()),
            None => {
                if self.head.get() == Some(NonNull::from(timer)) {
                    self.head.set(timer.next.get());
                }
            }
        }
        if let Some(next_ptr) = timer.next.get() {
            link(next_ptr).prev.set(timer.prev.get());
        }
        timer.next.set(None);
        timer.prev.set(None);
    }
}
