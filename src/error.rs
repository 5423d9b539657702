//! Unified error types for the protocol engine.
//!
//! A single `Error` enum that every layer converts into, keeping the
//! session's error handling uniform.  All variants are `Copy` so they can be
//! carried through [`SessionEvent`](crate::app::events::SessionEvent)s and
//! the request queue without allocation.
//!
//! Protocol faults the session recovers from on its own (a 403 on the
//! downchannel, a content-type without a boundary, a stream closing mid
//! upload) still have variants: they are reported, not thrown.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The transport refused to create the stream / request.
    TransportSubmission(TransportError),
    /// The server answered 403, or no valid credential is held.
    AuthorizationRejected,
    /// A `content-type` header carried no usable `boundary=` parameter.
    MalformedBoundary,
    /// A stream closed while its upload had not reached the terminator.
    PrematureStreamClose,
    /// The credential refresh did not complete within the configured bound.
    CredentialTimeout,
    /// The credential collaborator reported that the refresh failed.
    CredentialRefreshFailed,
    /// A speech upload needs an opened downchannel to share its connection.
    DownchannelNotOpen,
    /// Another speech upload is still in flight.
    UploadInProgress,
    /// The cross-context request queue is full.
    RequestQueueFull,
    /// The session has initiated shutdown and accepts no new streams.
    ShuttingDown,
    /// Event metadata could not be rendered.
    Encoding,
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportSubmission(e) => write!(f, "transport submission: {e}"),
            Self::AuthorizationRejected => write!(f, "authorization rejected"),
            Self::MalformedBoundary => write!(f, "malformed multipart boundary"),
            Self::PrematureStreamClose => write!(f, "stream closed before upload completed"),
            Self::CredentialTimeout => write!(f, "credential refresh timed out"),
            Self::CredentialRefreshFailed => write!(f, "credential refresh failed"),
            Self::DownchannelNotOpen => write!(f, "downchannel not open"),
            Self::UploadInProgress => write!(f, "speech upload already in progress"),
            Self::RequestQueueFull => write!(f, "session request queue full"),
            Self::ShuttingDown => write!(f, "session shutting down"),
            Self::Encoding => write!(f, "event metadata encoding failed"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by the multiplexed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is gone (TLS teardown, GOAWAY received, socket error).
    ConnectionLost,
    /// The peer or the local stack refused a new stream.
    StreamRefused,
    /// Request headers could not be encoded.
    InvalidHeaders,
    /// Generic socket I/O failure.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::StreamRefused => write!(f, "stream refused"),
            Self::InvalidHeaders => write!(f, "invalid request headers"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::TransportSubmission(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
