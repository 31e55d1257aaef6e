// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios against [`systime::backend::mock::MockBackend`],
//! one test per numbered scenario.

use core::sync::atomic::{AtomicU32, Ordering};
use systime::backend::mock::MockBackend;
use systime::{EventLatch, SystemTime, Timer, TimerManager, Timestamp};

const FREQ: u32 = 32_768;

fn ticks_for_ms(ms: u32) -> u64 {
    (ms as u64 * FREQ as u64) / 1000
}

#[test]
fn one_shot_100ms_fires_once_then_idle() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static FIRES: AtomicU32 = AtomicU32::new(0);
    static TIMER: Timer = Timer::new(100, 0, cb, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn cb(_arg: *mut ()) {
        FIRES.fetch_add(1, Ordering::SeqCst);
    }

    TIME.init().unwrap();
    MANAGER.start(&TIMER);
    TIME.backend().advance(ticks_for_ms(100) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }

    assert_eq!(FIRES.load(Ordering::SeqCst), 1);
    assert!(!TIMER.is_running());
}

#[test]
fn periodic_50ms_three_fires_then_stop_from_callback() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static FIRE_TIMES: [AtomicU32; 3] = [
        AtomicU32::new(0),
        AtomicU32::new(0),
        AtomicU32::new(0),
    ];
    static FIRES: AtomicU32 = AtomicU32::new(0);
    static TIMER: Timer = Timer::new(50, 50, cb, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn cb(_arg: *mut ()) {
        let n = FIRES.fetch_add(1, Ordering::SeqCst);
        if (n as usize) < FIRE_TIMES.len() {
            FIRE_TIMES[n as usize].store(TIME.realtime_now().seconds * 1000
                + TIME.realtime_now().nanos / 1_000_000, Ordering::SeqCst);
        }
        if n == 2 {
            MANAGER.stop(&TIMER);
        }
    }

    TIME.init().unwrap();
    MANAGER.start(&TIMER);
    for _ in 0..3 {
        TIME.backend().advance(ticks_for_ms(50) + 1);
        while MANAGER.take_runnable() {
            MANAGER.poll();
        }
    }

    assert_eq!(FIRES.load(Ordering::SeqCst), 3);
    assert!(!TIMER.is_running());
    for (i, expected_ms) in [50u32, 100, 150].into_iter().enumerate() {
        let got = FIRE_TIMES[i].load(Ordering::SeqCst);
        assert!(
            got >= expected_ms && got <= expected_ms + 1,
            "fire {i} at {got}ms, expected ~{expected_ms}ms"
        );
    }
}

#[test]
fn three_timers_same_target_each_fire_once_per_sweep() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static FIRES: [AtomicU32; 3] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];
    static A: Timer = Timer::new(20, 20, fire_a, core::ptr::null_mut());
    static B: Timer = Timer::new(20, 20, fire_b, core::ptr::null_mut());
    static C: Timer = Timer::new(20, 20, fire_c, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn fire_a(_arg: *mut ()) {
        FIRES[0].fetch_add(1, Ordering::SeqCst);
    }
    fn fire_b(_arg: *mut ()) {
        FIRES[1].fetch_add(1, Ordering::SeqCst);
    }
    fn fire_c(_arg: *mut ()) {
        FIRES[2].fetch_add(1, Ordering::SeqCst);
    }

    TIME.init().unwrap();
    MANAGER.start(&A);
    MANAGER.start(&B);
    MANAGER.start(&C);

    // Sweep 1, ~20ms.
    TIME.backend().advance(ticks_for_ms(20) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    for f in &FIRES {
        assert_eq!(f.load(Ordering::SeqCst), 1);
    }

    // Sweep 2, ~40ms: all three are periodic, so all fire again.
    TIME.backend().advance(ticks_for_ms(20) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    for f in &FIRES {
        assert_eq!(f.load(Ordering::SeqCst), 2);
    }
}

#[test]
fn pause_resume_preserves_remaining_time() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static FIRES: AtomicU32 = AtomicU32::new(0);
    static TIMER: Timer = Timer::new(100, 0, cb, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn cb(_arg: *mut ()) {
        FIRES.fetch_add(1, Ordering::SeqCst);
    }

    TIME.init().unwrap();
    MANAGER.start(&TIMER);
    TIME.backend().advance(ticks_for_ms(30));
    MANAGER.pause(&TIMER);

    // Elapsed time while paused must not count.
    TIME.backend().advance(ticks_for_ms(500));
    MANAGER.start(&TIMER);

    // ~70ms of remaining time left: not yet due just before it.
    TIME.backend().advance(ticks_for_ms(70) - ticks_for_ms(1));
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    assert_eq!(FIRES.load(Ordering::SeqCst), 0);

    TIME.backend().advance(ticks_for_ms(2));
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    assert_eq!(FIRES.load(Ordering::SeqCst), 1);
}

#[test]
fn set_realtime_forward_jump_reflected_immediately() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));

    TIME.init().unwrap();
    TIME.set_realtime(Timestamp::new(1000, 0)).unwrap();

    let rt = TIME.realtime_now();
    let mt = TIME.monotonic_now();
    assert!(rt >= Timestamp::new(1000, 0));
    assert!(rt < Timestamp::new(1000, 1_000_000));
    assert!(mt < Timestamp::new(0, 1_000_000));
}

#[test]
fn nested_callback_scheduling_fires_relative_to_outer_arm_time() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static FIRES: AtomicU32 = AtomicU32::new(0);
    static A: Timer = Timer::new(10, 0, fire_a, core::ptr::null_mut());
    static B: Timer = Timer::new(5, 0, fire_b, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn fire_a(_arg: *mut ()) {
        MANAGER.start(&B);
    }
    fn fire_b(_arg: *mut ()) {
        FIRES.fetch_add(1, Ordering::SeqCst);
    }

    TIME.init().unwrap();
    MANAGER.start(&A);

    // ~10ms: A fires, starts B.
    TIME.backend().advance(ticks_for_ms(10) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    assert_eq!(FIRES.load(Ordering::SeqCst), 0);

    // ~5ms later (~15ms total): B fires.
    TIME.backend().advance(ticks_for_ms(5) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    assert_eq!(FIRES.load(Ordering::SeqCst), 1);
}

#[test]
fn queue_stays_sorted_by_ascending_target_across_starts_and_stops() {
    static TIME: SystemTime<MockBackend> = SystemTime::new(MockBackend::new(0xFF_FFFF, FREQ));
    static LATCH: EventLatch = EventLatch::new();
    static MANAGER: TimerManager<'static, MockBackend> = TimerManager::new(&TIME, &LATCH, wake);
    static SHORT: Timer = Timer::new(10, 0, noop, core::ptr::null_mut());
    static MID: Timer = Timer::new(20, 0, noop, core::ptr::null_mut());
    static LONG: Timer = Timer::new(30, 0, noop, core::ptr::null_mut());

    fn wake() {
        MANAGER.notify_fire();
    }
    fn noop(_arg: *mut ()) {}

    TIME.init().unwrap();
    // Start out of target order; the head should still be the soonest.
    MANAGER.start(&LONG);
    MANAGER.start(&SHORT);
    MANAGER.start(&MID);

    assert!(!MANAGER.is_ready(&SHORT));
    TIME.backend().advance(ticks_for_ms(10) + 1);
    while MANAGER.take_runnable() {
        MANAGER.poll();
    }
    assert!(!SHORT.is_running());
    assert!(MID.is_running());
    assert!(LONG.is_running());
}
