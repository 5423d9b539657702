//! Transport port: the HTTP/2 client the session rides on.
//!
//! ```text
//!   Session ──submit()──▶ Transport ──▶ network
//!   Session ◀─handle_event()── Connection::poll() ◀── network
//! ```
//!
//! The session never owns sockets.  It submits requests through
//! [`Transport`] and is fed [`TransportEvent`]s by whoever drives the
//! connection.  Outbound bodies are pulled through
//! [`Session::read_outbound`](super::session::Session::read_outbound).

use crate::app::ports::AudioSink;
use crate::error::TransportError;

use super::session::Session;

/// HTTP/2 stream identifier as assigned by the transport.
pub type StreamId = i32;

/// Identifier of a stream that has not been submitted yet.
pub const UNASSIGNED_STREAM: StreamId = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// One request to submit.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a [Header<'a>],
    /// The body is produced by pulling the session's generator for the
    /// returned stream.
    pub has_body: bool,
}

/// Request submission half of the HTTP/2 client.
pub trait Transport {
    /// Submit a request and return the new stream id.
    fn submit(&mut self, request: &Request<'_>) -> Result<StreamId, TransportError>;

    /// Tear down the connection.  Called once, when the last stream closes.
    fn shutdown(&mut self);
}

/// Events the transport delivers for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent<'a> {
    Header {
        stream: StreamId,
        name: &'a str,
        value: &'a str,
    },
    HeadersComplete {
        stream: StreamId,
    },
    Data {
        stream: StreamId,
        data: &'a [u8],
    },
    Closed {
        stream: StreamId,
        error_code: u32,
    },
}

impl TransportEvent<'_> {
    pub fn stream(&self) -> StreamId {
        match *self {
            Self::Header { stream, .. }
            | Self::HeadersComplete { stream }
            | Self::Data { stream, .. }
            | Self::Closed { stream, .. } => stream,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    Closed,
}

/// A transport that can also be driven.
///
/// One `poll` performs the pending I/O without blocking: it pulls request
/// bodies through [`Session::read_outbound`], delivers received events via
/// [`Session::handle_event`], and reports whether the connection is still
/// up.
pub trait Connection: Transport {
    fn poll<A: AudioSink>(
        &mut self,
        session: &mut Session<A>,
    ) -> Result<ConnectionState, TransportError>;
}
