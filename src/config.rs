//! Session configuration parameters
//!
//! Endpoints, timeouts, recognizer settings and the audio player format.
//! Nothing here is persisted; the device builds a config at start-up.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::multipart::boundary;

/// Service region.  Selects the endpoint host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Europe,
    NorthAmerica,
}

impl Region {
    pub fn host(self) -> &'static str {
        match self {
            Self::Europe => "avs-alexa-eu.amazon.com",
            Self::NorthAmerica => "avs-alexa-na.amazon.com",
        }
    }
}

/// Microphone profile reported with every `Recognize` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecognizerProfile {
    CloseTalk,
    NearField,
    FarField,
}

/// Output format handed to the audio sink when a response carries speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Renderer sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Renderer sample width.
    pub bits_per_sample: u8,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            bits_per_sample: 16,
        }
    }
}

/// Core session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvsConfig {
    // --- Endpoints ---
    pub region: Region,
    /// Resource path of the long-lived directives (downchannel) stream.
    pub directives_path: String,
    /// Resource path speech events are posted to.
    pub events_path: String,

    // --- Framing ---
    /// Boundary term used for every outbound multipart body.
    pub outbound_boundary: String,

    // --- Timing ---
    /// Upper bound on waiting for a credential refresh (milliseconds).
    pub credential_timeout_ms: u32,
    /// Upper bound on waiting for the downchannel response headers (milliseconds).
    pub downchannel_ready_timeout_ms: u32,
    /// Protocol loop pacing between connection polls (milliseconds).
    pub poll_interval_ms: u32,

    // --- Recognizer ---
    pub profile: RecognizerProfile,
    /// Format string of the uploaded capture.
    pub audio_format: String,

    // --- Playback ---
    pub player: PlayerConfig,
}

impl Default for AvsConfig {
    fn default() -> Self {
        Self {
            region: Region::Europe,
            directives_path: "/v20160207/directives".into(),
            events_path: "/v20160207/events".into(),

            outbound_boundary: "nghttp2123456789".into(),

            credential_timeout_ms: 30_000,
            downchannel_ready_timeout_ms: 10_000,
            poll_interval_ms: 1,

            profile: RecognizerProfile::CloseTalk,
            audio_format: "AUDIO_L16_RATE_16000_CHANNELS_1".into(),

            player: PlayerConfig::default(),
        }
    }
}

impl AvsConfig {
    /// Full URL of the directives endpoint.
    pub fn directives_url(&self) -> String {
        format!("https://{}{}", self.region.host(), self.directives_path)
    }

    /// Full URL of the events endpoint.
    pub fn events_url(&self) -> String {
        format!("https://{}{}", self.region.host(), self.events_path)
    }

    /// Reject values the session cannot run with.  Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if !boundary::is_valid_boundary(&self.outbound_boundary) {
            return Err(Error::Config("outbound_boundary must be 1-70 boundary characters"));
        }
        if !self.directives_path.starts_with('/') || !self.events_path.starts_with('/') {
            return Err(Error::Config("endpoint paths must be absolute"));
        }
        if self.credential_timeout_ms == 0 {
            return Err(Error::Config("credential_timeout_ms must be non-zero"));
        }
        if self.downchannel_ready_timeout_ms == 0 {
            return Err(Error::Config("downchannel_ready_timeout_ms must be non-zero"));
        }
        if self.audio_format.is_empty() {
            return Err(Error::Config("audio_format must not be empty"));
        }
        if self.player.sample_rate_hz == 0 || !matches!(self.player.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(Error::Config("player format is invalid"));
        }
        Ok(())
    }
}
