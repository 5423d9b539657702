//! Inbound multipart dispatcher.
//!
//! Sits on top of [`MultipartParser`] for one response stream and
//! classifies parts by their declared content type.  An
//! `application/octet-stream` part is speech: the audio sink is started,
//! every data fragment of that part is forwarded verbatim, and the sink is
//! marked end-of-stream when the part closes.  Every other part is inert.

use log::{debug, info, trace};

use super::PartState;
use super::boundary::{AUDIO_CONTENT_TYPE, BoundaryToken};
use super::parser::{MultipartParser, ParserEvent, PartHandler};
use crate::app::ports::{AudioSink, AudioStreamConfig};

/// Per-stream inbound parse context.
pub struct InboundDispatcher {
    boundary: BoundaryToken,
    parser: MultipartParser,
    current_part: PartState,
    audio_bytes: u64,
}

impl InboundDispatcher {
    pub fn new(boundary: BoundaryToken) -> Self {
        debug!("multipart: init parser with boundary {}", boundary);
        let parser = MultipartParser::new(&boundary);
        Self {
            boundary,
            parser,
            current_part: PartState::MetaHeaders,
            audio_bytes: 0,
        }
    }

    /// Feed raw, possibly fragmented, body bytes.
    pub fn on_stream_bytes(
        &mut self,
        data: &[u8],
        sink: &mut impl AudioSink,
        config: &AudioStreamConfig,
    ) {
        let mut classifier = Classifier {
            current: &mut self.current_part,
            audio_bytes: &mut self.audio_bytes,
            sink,
            config,
        };
        self.parser.feed(data, &mut classifier);
    }

    /// Classification of the part being parsed.
    pub fn current_part(&self) -> PartState {
        self.current_part
    }

    /// Delimiter this stream is parsed with (`--` included).
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Total audio bytes forwarded to the sink.
    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes
    }
}

struct Classifier<'a, S> {
    current: &'a mut PartState,
    audio_bytes: &'a mut u64,
    sink: &'a mut S,
    config: &'a AudioStreamConfig,
}

impl<S: AudioSink> PartHandler for Classifier<'_, S> {
    fn on_event(&mut self, event: ParserEvent<'_>) {
        match event {
            ParserEvent::HeaderField(name) => trace!("multipart: header field {}", name),
            ParserEvent::HeaderValue(value) => {
                if value.eq_ignore_ascii_case(AUDIO_CONTENT_TYPE) {
                    // Once per part, however often the value repeats.
                    if *self.current == PartState::AudioData {
                        return;
                    }
                    info!("multipart: audio part detected, starting player");
                    *self.current = PartState::AudioData;
                    self.sink.start(self.config);
                } else if *self.current == PartState::MetaHeaders
                    && value.starts_with("application/json")
                {
                    *self.current = PartState::MetaJson;
                }
            }
            ParserEvent::PartDataBegin => trace!("multipart: part data begin"),
            ParserEvent::PartData(bytes) => {
                if *self.current == PartState::AudioData {
                    *self.audio_bytes += bytes.len() as u64;
                    self.sink.feed(bytes);
                }
            }
            ParserEvent::PartDataEnd => {
                if *self.current == PartState::AudioData {
                    debug!("multipart: audio part complete ({} bytes)", self.audio_bytes);
                    self.sink.mark_end_of_stream();
                }
                *self.current = PartState::MetaHeaders;
            }
            ParserEvent::BodyEnd => {
                debug!("multipart: body end");
                *self.current = PartState::Done;
            }
        }
    }
}
