// SPDX-License-Identifier: Apache-2.0
#![no_std]
#![no_main]

use cortex_m_semihosting::hprintln;
use systime::backend::cortex_m_syst::SysTickBackend;
use systime::{EventLatch, SystemTime, Timer, TimerManager};

// 8 MHz core clock, reload every 100 microseconds.
static TIME: SystemTime<SysTickBackend> = SystemTime::new(SysTickBackend::new(8_000_000, 799));
static LATCH: EventLatch = EventLatch::new();
static MANAGER: TimerManager<'static, SysTickBackend> = TimerManager::new(&TIME, &LATCH, wake);
static BLINK: Timer = Timer::new(200, 200, on_blink, core::ptr::null_mut());

fn wake() {
    MANAGER.notify_fire();
}

fn on_blink(_arg: *mut ()) {
    hprintln!("blink");
}

#[cortex_m_rt::entry]
fn main() -> ! {
    hprintln!("Initializing ..");
    TIME.backend().bind(cortex_m::Peripherals::take().unwrap().SYST);
    TIME.init().unwrap();
    MANAGER.start(&BLINK);

    loop {
        LATCH.wait_for_event(cortex_m::asm::wfi);
        if MANAGER.take_runnable() {
            MANAGER.poll();
        }
    }
}

#[cortex_m_rt::exception]
fn SysTick() {
    TIME.backend().on_tick();
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
