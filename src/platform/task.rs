//! Core-pinned thread spawning for the ESP32 dual-core.
//!
//! ESP-IDF implements `std::thread` over pthreads, which wrap FreeRTOS
//! tasks.  `esp_pthread_set_cfg()` configures the *next* `pthread_create()`
//! from the calling thread, so the config→spawn pair must not interleave
//! with other thread creation on the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): network stack and the protocol thread.
    Pro = 0,
    /// Core 1 (APP_CPU): capture.
    App = 1,
}

/// Spawn a thread pinned to `core` with explicit priority and stack.
///
/// `name` must be NUL-terminated (e.g. `"avs-proto\0"`).
#[cfg(feature = "espidf")]
pub fn spawn_pinned(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: `cfg` is fully initialised by the IDF default constructor and
    // `name` is a NUL-terminated static string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );
    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
}

/// Host fallback: ignores core affinity and priority.
#[cfg(not(feature = "espidf"))]
pub fn spawn_pinned(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' (host, no core pinning, stack={}KB)",
        display_name,
        stack_kb
    );
    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
