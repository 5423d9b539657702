//! Per-stream state machine.
//!
//! ```text
//!             ┌──── :status 403 ───▶ Unauthorized ─┐
//! Connecting ─┤                                    ├──▶ Closed
//!             └──── :status 200 ───▶ Open ─────────┘
//! ```
//!
//! A stream owns its multipart contexts: the inbound dispatcher once a
//! boundary is discovered, the outbound generator for an upload.  Both are
//! released when the stream closes.

use log::{debug, info, warn};

use super::transport::StreamId;
use crate::app::ports::{AudioSink, AudioStreamConfig};
use crate::multipart::boundary::extract_boundary_token;
use crate::multipart::dispatcher::InboundDispatcher;
use crate::multipart::generator::OutboundGenerator;

/// What a stream is for.  At most one stream per role exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Downchannel = 0,
    EventChannel = 1,
}

impl StreamRole {
    pub const COUNT: usize = 2;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Downchannel => "downchannel",
            Self::EventChannel => "event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Connecting,
    Unauthorized,
    Open,
    Closed,
}

/// Reaction the session owes to a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOutcome {
    None,
    /// `:status 403`.
    Unauthorized,
    BoundaryDiscovered,
    MalformedBoundary,
}

/// Summary of a stream that has just closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    /// An upload was attached and had not emitted its terminator.
    pub premature_upload: bool,
    /// Audio bytes the upload had emitted, if any.
    pub audio_sent: u64,
    pub had_upload: bool,
}

pub struct Stream {
    role: StreamRole,
    id: StreamId,
    status: StreamStatus,
    status_code: Option<u16>,
    content_type_seen: bool,
    inbound: Option<InboundDispatcher>,
    outbound: Option<OutboundGenerator>,
}

impl Stream {
    pub fn new(role: StreamRole, id: StreamId) -> Self {
        Self {
            role,
            id,
            status: StreamStatus::Connecting,
            status_code: None,
            content_type_seen: false,
            inbound: None,
            outbound: None,
        }
    }

    /// An event-channel stream carrying `generator` as its request body.
    pub fn with_upload(id: StreamId, generator: OutboundGenerator) -> Self {
        let mut stream = Self::new(StreamRole::EventChannel, id);
        stream.outbound = Some(generator);
        stream
    }

    pub fn role(&self) -> StreamRole {
        self.role
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn is_active(&self) -> bool {
        self.status != StreamStatus::Closed
    }

    /// Not rejected and not closed.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, StreamStatus::Connecting | StreamStatus::Open)
    }

    pub fn inbound(&self) -> Option<&InboundDispatcher> {
        self.inbound.as_ref()
    }

    pub fn outbound_mut(&mut self) -> Option<&mut OutboundGenerator> {
        self.outbound.as_mut()
    }

    /// Whether an upload is attached and has not finished its body.
    pub fn upload_pending(&self) -> bool {
        self.outbound.as_ref().is_some_and(|g| !g.is_finished())
    }

    /// Apply one response header.
    pub fn on_header(&mut self, name: &str, value: &str) -> HeaderOutcome {
        if self.status == StreamStatus::Closed {
            return HeaderOutcome::None;
        }

        if name == ":status" {
            return self.on_status(value);
        }

        if name.eq_ignore_ascii_case("content-type") {
            if self.content_type_seen {
                debug!(
                    "stream {}: ignoring repeated content-type {}",
                    self.id, value
                );
                return HeaderOutcome::None;
            }
            self.content_type_seen = true;
            return match extract_boundary_token(value) {
                Some(token) => {
                    info!("stream {}: multipart boundary {}", self.id, token);
                    self.inbound = Some(InboundDispatcher::new(token));
                    HeaderOutcome::BoundaryDiscovered
                }
                None => {
                    warn!("stream {}: content-type without boundary: {}", self.id, value);
                    HeaderOutcome::MalformedBoundary
                }
            };
        }

        HeaderOutcome::None
    }

    fn on_status(&mut self, value: &str) -> HeaderOutcome {
        let code = value.trim().parse::<u16>().ok();
        self.status_code = code;
        match code {
            Some(403) => {
                warn!("stream {} ({}): 403 unauthorized", self.id, self.role.name());
                self.status = StreamStatus::Unauthorized;
                HeaderOutcome::Unauthorized
            }
            Some(200) => {
                self.status = StreamStatus::Open;
                HeaderOutcome::None
            }
            Some(c) if self.role == StreamRole::EventChannel && (200..300).contains(&c) => {
                self.status = StreamStatus::Open;
                HeaderOutcome::None
            }
            _ => {
                warn!("stream {} ({}): status {}", self.id, self.role.name(), value);
                HeaderOutcome::None
            }
        }
    }

    /// Route body bytes to the inbound dispatcher, if one exists.
    pub fn on_data(&mut self, data: &[u8], sink: &mut impl AudioSink, config: &AudioStreamConfig) {
        match self.inbound.as_mut() {
            Some(dispatcher) if self.status != StreamStatus::Closed => {
                dispatcher.on_stream_bytes(data, sink, config);
            }
            _ => debug!("stream {}: {} B without multipart context", self.id, data.len()),
        }
    }

    /// Close the stream and release its contexts.
    ///
    /// `None` if it was already closed.
    pub fn close(&mut self) -> Option<CloseOutcome> {
        if self.status == StreamStatus::Closed {
            return None;
        }
        self.status = StreamStatus::Closed;
        self.inbound = None;
        let outcome = match self.outbound.take() {
            Some(g) => CloseOutcome {
                premature_upload: !g.is_finished(),
                audio_sent: g.audio_sent(),
                had_upload: true,
            },
            None => CloseOutcome {
                premature_upload: false,
                audio_sent: 0,
                had_upload: false,
            },
        };
        Some(outcome)
    }
}
