//! In-memory audio adapters.
//!
//! [`SliceAudioSource`] uploads a fixed buffer; [`PromptCapture`] answers
//! every capture trigger with the same recording, which is how the device
//! plays its canned greeting before a microphone pipeline exists.

use std::borrow::Cow;
use std::sync::Arc;

use log::debug;

use crate::app::ports::{AudioCapture, AudioSource, BoxedAudioSource};
use crate::capture::CaptureEvent;

/// A byte buffer behind a forward-only cursor.
#[derive(Debug, Clone)]
pub struct SliceAudioSource {
    data: Cow<'static, [u8]>,
    pos: usize,
}

impl SliceAudioSource {
    /// Borrow a recording linked into the firmware image.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            pos: 0,
        }
    }

    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Cow::Owned(data),
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AudioSource for SliceAudioSource {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

/// Capture adapter that replays one recording per trigger.
#[derive(Debug, Clone)]
pub struct PromptCapture {
    recording: Arc<[u8]>,
}

impl PromptCapture {
    pub fn new(recording: impl Into<Arc<[u8]>>) -> Self {
        Self {
            recording: recording.into(),
        }
    }
}

impl AudioCapture for PromptCapture {
    fn begin_capture(&mut self, event: &CaptureEvent) -> BoxedAudioSource {
        debug!(
            "capture: {:?}, replaying {} B prompt",
            event,
            self.recording.len()
        );
        Box::new(SliceAudioSource::new(self.recording.to_vec()))
    }
}
