//! `embassy-time` driver for ESP-IDF.
//!
//! `async-io-mini` timers (poll pacing, credential timeout) run on
//! embassy-time, which needs a driver at link time.  Ticks are
//! `esp_timer` microseconds; each pending wake parks a short-lived thread.

use core::task::Waker;
use std::time::Duration;

use embassy_time_driver::Driver;
use log::warn;

const WAKE_STACK_BYTES: usize = 2048;

struct EspTimerDriver;

embassy_time_driver::time_driver_impl!(static DRIVER: EspTimerDriver = EspTimerDriver);

impl Driver for EspTimerDriver {
    fn now(&self) -> u64 {
        // SAFETY: esp_timer is initialised by the IDF before `app_main`.
        unsafe { esp_idf_sys::esp_timer_get_time() as u64 }
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        let now = self.now();
        if at <= now {
            waker.wake_by_ref();
            return;
        }

        let delay = Duration::from_micros(at - now);
        let sleeper = waker.clone();
        let spawned = std::thread::Builder::new()
            .name("time-wake".into())
            .stack_size(WAKE_STACK_BYTES)
            .spawn(move || {
                std::thread::sleep(delay);
                sleeper.wake();
            });
        if let Err(e) = spawned {
            // Wake now; the timer re-arms itself when polled early.
            warn!("time driver: wake thread spawn failed: {}", e);
            waker.wake_by_ref();
        }
    }
}
