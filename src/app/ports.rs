//! Port traits: the boundary between the protocol engine and its collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Session (protocol core)
//! ```
//!
//! The audio player, the capture pipeline, the credential service and the
//! event log all sit behind these traits.  The session consumes them via
//! generics, so the protocol core never touches hardware or the network
//! stack directly.
//!
//! ## Security notes
//!
//! - **CredentialRefresher** implementations MUST NOT log the token.
//! - **AudioSource** data is uploaded verbatim; callers own its content.

use crate::avs::shared::CredentialPublisher;
use crate::capture::CaptureEvent;

// ───────────────────────────────────────────────────────────────
// Audio sink (driven adapter: protocol → player)
// ───────────────────────────────────────────────────────────────

/// Media type of a response audio part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// MP3 speech, the format the service answers with.
    AudioMpeg,
}

/// Format handed to the sink when a response audio part starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamConfig {
    pub media_type: MediaType,
    pub sample_rate_hz: u32,
    pub bits_per_sample: u8,
}

impl From<crate::config::PlayerConfig> for AudioStreamConfig {
    fn from(player: crate::config::PlayerConfig) -> Self {
        Self {
            media_type: MediaType::AudioMpeg,
            sample_rate_hz: player.sample_rate_hz,
            bits_per_sample: player.bits_per_sample,
        }
    }
}

/// Consumer of response speech.
///
/// Shared by every upload; only one response audio part is ever active.
pub trait AudioSink {
    /// A new audio part begins: clear the end-of-stream marker and start
    /// the decode / render pipeline.
    fn start(&mut self, config: &AudioStreamConfig);

    /// Encoded audio bytes, in order.
    fn feed(&mut self, data: &[u8]);

    /// The current audio part is complete.
    fn mark_end_of_stream(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Audio source (driving adapter: capture → upload)
// ───────────────────────────────────────────────────────────────

/// Captured speech for one upload: a byte range behind a forward-only cursor.
pub trait AudioSource {
    /// Bytes not yet read.
    fn remaining(&self) -> usize;

    /// Copy up to `buf.len()` bytes and advance the cursor.  Returns the
    /// number of bytes copied; never blocks.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Owned, sendable audio source as carried across the request queue.
pub type BoxedAudioSource = Box<dyn AudioSource + Send>;

/// Produces the audio for a capture-start event.
pub trait AudioCapture {
    fn begin_capture(&mut self, event: &CaptureEvent) -> BoxedAudioSource;
}

// ───────────────────────────────────────────────────────────────
// Credential refresh (driven adapter: protocol → auth service)
// ───────────────────────────────────────────────────────────────

/// Starts a bearer-token refresh.
///
/// The call must not block.  Completion is reported from any execution
/// context through the supplied publisher: [`CredentialPublisher::publish`]
/// on success, [`CredentialPublisher::fail`] otherwise.
pub trait CredentialRefresher {
    fn request_refresh(&mut self, publisher: CredentialPublisher);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: protocol → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The session emits structured [`SessionEvent`](super::events::SessionEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::SessionEvent);
}
