//! Capture-trigger forwarding.
//!
//! Triggers (a button edge, a remote request) land in a bounded queue from
//! whatever context noticed them.  The capture thread waits on that queue,
//! asks the [`AudioCapture`] port for the utterance and hands it to the
//! protocol context as a speech request.  It never touches session state
//! directly.
//!
//! ```text
//!  ISR / RPC ──notify_capture()──▶ CaptureQueue ──▶ run_capture_forwarder
//!                                                        │ begin_capture()
//!                                                        ▼
//!                                         SessionHandle::request_speech()
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::ports::AudioCapture;
use crate::avs::shared::SessionHandle;
use crate::error::Result;

/// Triggers kept while the capture thread is busy.
pub const CAPTURE_QUEUE_DEPTH: usize = 4;

/// Why a capture started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Push-to-talk button on `gpio`.
    Button { gpio: u32 },
    /// Requested by a connected client.
    Remote,
}

pub type CaptureQueue = Channel<CriticalSectionRawMutex, CaptureEvent, CAPTURE_QUEUE_DEPTH>;

/// Enqueue a trigger without blocking.  `false` if the queue is full and
/// the trigger was dropped.
pub fn notify_capture(queue: &CaptureQueue, event: CaptureEvent) -> bool {
    match queue.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            warn!("capture: queue full, dropping {:?}", event);
            false
        }
    }
}

/// Turn one trigger into a queued speech request.
pub fn forward_capture(
    event: CaptureEvent,
    handle: &SessionHandle,
    capture: &mut impl AudioCapture,
) -> Result<()> {
    let source = capture.begin_capture(&event);
    debug!("capture: {:?} -> {} B", event, source.remaining());
    handle.request_speech(source)
}

/// Capture thread body.  Runs until its future is dropped.
pub async fn run_capture_forwarder(
    queue: &CaptureQueue,
    handle: SessionHandle,
    mut capture: impl AudioCapture,
) {
    info!("capture: forwarder started");
    loop {
        let event = queue.receive().await;
        if let Err(e) = forward_capture(event, &handle, &mut capture) {
            warn!("capture: {:?} not forwarded: {}", event, e);
        }
    }
}
