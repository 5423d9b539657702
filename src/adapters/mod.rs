//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements    | Connects to               |
//! |----------------|---------------|---------------------------|
//! | `audio_source` | AudioSource   | In-memory / flash buffers |
//! |                | AudioCapture  | Canned prompt recording   |
//! | `log_sink`     | EventSink     | Serial log output         |

pub mod audio_source;
pub mod log_sink;
