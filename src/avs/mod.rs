//! Voice-service protocol core.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Session                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────┐  │
//! │  │ Downchannel  │   │ EventChannel │   │ SessionShared│◀─┼── CredentialPublisher
//! │  │   Stream     │   │   Stream     │   │ flags · queue│◀─┼── SessionHandle
//! │  └──────┬───────┘   └──────┬───────┘   └─────────────┘  │
//! │         │ inbound          │ outbound                   │
//! └─────────┼──────────────────┼────────────────────────────┘
//!           ▼                  ▲
//!     InboundDispatcher   OutboundGenerator        (multipart)
//! ```

pub mod event;
pub mod session;
pub mod shared;
pub mod stream;
pub mod transport;

pub use session::Session;
pub use shared::{CredentialPublisher, SessionHandle, SyncFlag};
pub use stream::{StreamRole, StreamStatus};
pub use transport::{Connection, ConnectionState, StreamId, Transport, TransportEvent};
