//! Outbound session events.
//!
//! The [`Session`](crate::avs::session::Session) queues these and hands them
//! out through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them: log to serial, drive a
//! status LED, count failures.

use crate::avs::stream::StreamRole;
use crate::avs::transport::StreamId;
use crate::error::Error;

/// Structured events emitted by the protocol core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The downchannel GET was submitted.
    DownchannelOpening(StreamId),

    /// Downchannel headers completed with `200`; uploads may start.
    DownchannelReady(StreamId),

    /// The service answered `403` on a stream; the credential was dropped.
    AuthorizationRejected(StreamId),

    /// A multipart response arrived without a usable boundary.
    MalformedBoundary(StreamId),

    /// A speech upload was submitted.
    UploadStarted { stream: StreamId, message_id: u32 },

    /// The service closed the upload stream after the full body was sent.
    UploadComplete { stream: StreamId, audio_bytes: u64 },

    /// A queued speech request could not be submitted.
    UploadRejected(Error),

    /// The upload stream closed before the body terminator went out.
    UploadAborted { stream: StreamId, audio_bytes: u64 },

    /// Any stream closed.
    StreamClosed {
        stream: StreamId,
        role: StreamRole,
        error_code: u32,
    },

    /// The last active stream closed and the transport was shut down.
    Shutdown,
}
