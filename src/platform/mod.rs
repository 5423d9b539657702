//! Platform glue: logger installation and the two long-lived threads.
//!
//! ```text
//!  Core 0 (Pro)  avs-proto   LocalExecutor ─▶ bootstrap + run_protocol_loop
//!  Core 1 (App)  avs-capture block_on       ─▶ run_capture_forwarder
//! ```
//!
//! Everything ESP-IDF specific is behind the `espidf` feature; host builds
//! get plain threads and no logger backend.

#[cfg(feature = "espidf")]
mod idf_critical_section;
#[cfg(feature = "espidf")]
mod idf_time_driver;
pub mod task;

use core::future::Future;
use std::io;
use std::thread::JoinHandle;

use log::info;

use crate::app::ports::AudioCapture;
use crate::avs::shared::SessionHandle;
use crate::capture::{CaptureQueue, run_capture_forwarder};
use task::{Core, spawn_pinned};

const PROTOCOL_PRIORITY: u8 = 10;
const PROTOCOL_STACK_KB: usize = 24;
const CAPTURE_PRIORITY: u8 = 5;
const CAPTURE_STACK_KB: usize = 8;

/// Link the IDF runtime patches and install the serial logger.
#[cfg(feature = "espidf")]
pub fn init_logging() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;
    info!("avslink v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Host builds leave the `log` facade without a backend.
#[cfg(not(feature = "espidf"))]
pub fn init_logging() -> anyhow::Result<()> {
    Ok(())
}

/// Spawn the protocol thread.
///
/// `make` runs on the new thread and builds the future that owns the
/// session and the connection, so neither has to be `Send`.
pub fn spawn_protocol_thread<F, Fut>(make: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    spawn_pinned(
        Core::Pro,
        PROTOCOL_PRIORITY,
        PROTOCOL_STACK_KB,
        "avs-proto\0",
        move || {
            let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
            futures_lite::future::block_on(executor.run(make()));
            info!("protocol thread finished");
        },
    )
}

/// Spawn the capture thread feeding `handle` from `queue`.
pub fn spawn_capture_thread<C>(
    queue: &'static CaptureQueue,
    handle: SessionHandle,
    capture: C,
) -> io::Result<JoinHandle<()>>
where
    C: AudioCapture + Send + 'static,
{
    spawn_pinned(
        Core::App,
        CAPTURE_PRIORITY,
        CAPTURE_STACK_KB,
        "avs-capture\0",
        move || futures_lite::future::block_on(run_capture_forwarder(queue, handle, capture)),
    )
}
