//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing session events to the logger (UART /
//! USB-CDC on the device, stderr on the host).  A status-LED or telemetry
//! adapter would implement the same trait.

use log::{Level, log};

use crate::app::events::SessionEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`SessionEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SessionEvent) {
        let (level, line) = render(event);
        log!(level, "{}", line);
    }
}

/// Level and subsystem-prefixed line for one event.
fn render(event: &SessionEvent) -> (Level, String) {
    match event {
        SessionEvent::DownchannelOpening(id) => (
            Level::Info,
            format!("STREAM | downchannel opening on {}", id),
        ),
        SessionEvent::DownchannelReady(id) => {
            (Level::Info, format!("STREAM | downchannel {} ready", id))
        }
        SessionEvent::AuthorizationRejected(id) => (
            Level::Warn,
            format!("AUTH | 403 on stream {}, credential cleared", id),
        ),
        SessionEvent::MalformedBoundary(id) => (
            Level::Warn,
            format!("STREAM | {} without boundary, parts ignored", id),
        ),
        SessionEvent::UploadStarted { stream, message_id } => (
            Level::Info,
            format!("UPLOAD | #{} started on stream {}", message_id, stream),
        ),
        SessionEvent::UploadComplete {
            stream,
            audio_bytes,
        } => (
            Level::Info,
            format!("UPLOAD | stream {} complete, audio={}B", stream, audio_bytes),
        ),
        SessionEvent::UploadRejected(e) => (Level::Warn, format!("UPLOAD | rejected: {}", e)),
        SessionEvent::UploadAborted {
            stream,
            audio_bytes,
        } => (
            Level::Warn,
            format!(
                "UPLOAD | stream {} closed early, {}B audio discarded",
                stream, audio_bytes
            ),
        ),
        SessionEvent::StreamClosed {
            stream,
            role,
            error_code,
        } => (
            Level::Info,
            format!(
                "STREAM | {} ({}) closed, error_code={}",
                stream,
                role.name(),
                error_code
            ),
        ),
        SessionEvent::Shutdown => (
            Level::Info,
            "STREAM | all streams closed, connection shut down".to_string(),
        ),
    }
}
