//! JSON body of the `SpeechRecognizer.Recognize` event.
//!
//! ```json
//! {
//!   "context": [],
//!   "event": {
//!     "header": {
//!       "namespace": "SpeechRecognizer",
//!       "name": "Recognize",
//!       "messageId": "msg-00000001",
//!       "dialogRequestId": "dialog-00000001"
//!     },
//!     "payload": { "profile": "CLOSE_TALK", "format": "AUDIO_L16_RATE_16000_CHANNELS_1" }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::config::RecognizerProfile;
use crate::error::{Error, Result};

pub const SPEECH_NAMESPACE: &str = "SpeechRecognizer";
pub const RECOGNIZE_NAME: &str = "Recognize";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub context: Vec<serde_json::Value>,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub header: EventHeader,
    pub payload: RecognizePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub dialog_request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizePayload {
    pub profile: RecognizerProfile,
    pub format: String,
}

impl EventEnvelope {
    /// A `Recognize` event for one utterance.
    pub fn recognize(ids: UploadIds, profile: RecognizerProfile, format: &str) -> Self {
        Self {
            context: Vec::new(),
            event: Event {
                header: EventHeader {
                    namespace: SPEECH_NAMESPACE.into(),
                    name: RECOGNIZE_NAME.into(),
                    message_id: ids.message_id(),
                    dialog_request_id: ids.dialog_request_id(),
                },
                payload: RecognizePayload {
                    profile,
                    format: format.into(),
                },
            },
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|_| Error::Encoding)
    }
}

/// Identifiers of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadIds {
    pub sequence: u32,
}

impl UploadIds {
    pub fn message_id(self) -> String {
        format!("msg-{:08}", self.sequence)
    }

    pub fn dialog_request_id(self) -> String {
        format!("dialog-{:08}", self.sequence)
    }
}

/// Monotonic id source, one value per upload.
#[derive(Debug, Default)]
pub struct IdSequence {
    next: u32,
}

impl IdSequence {
    pub fn next_ids(&mut self) -> UploadIds {
        self.next = self.next.wrapping_add(1);
        UploadIds {
            sequence: self.next,
        }
    }
}
