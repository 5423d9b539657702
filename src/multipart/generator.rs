//! Pull-based outbound multipart generator.
//!
//! The transport calls [`OutboundGenerator::next_chunk`] whenever it can
//! accept more request body.  Each call emits at most one segment of the
//! fixed layout:
//!
//! ```text
//! MetaHeaders ──▶ metadata prefix + JSON   ──▶ AudioHeaders
//! AudioHeaders ─▶ audio prefix             ──▶ AudioData
//! AudioData ────▶ up to `dest.len()` audio ──▶ AudioData (yield) | Done
//! Done ─────────▶ terminator, final
//! ```
//!
//! Literal segments larger than the offered capacity are staged and drained
//! over several calls, so the emitted stream is independent of how the
//! transport sizes its buffers.

use log::{debug, trace};

use super::PartState;
use super::boundary::{PartKind, render_body_terminator, render_part_prefix};
use crate::app::ports::BoxedAudioSource;

/// Result of one generator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes written to the front of the destination.
    pub written: usize,
    /// The body terminator has been fully emitted; do not call again.
    pub is_final: bool,
    /// More output is ready; the transport should yield and call back
    /// rather than spin.
    pub yield_requested: bool,
}

/// Per-stream outbound generation context.
pub struct OutboundGenerator {
    next_action: PartState,
    boundary: String,
    metadata: Vec<u8>,
    staged: Vec<u8>,
    staged_pos: usize,
    terminator_staged: bool,
    source: BoxedAudioSource,
    audio_sent: u64,
    finished: bool,
}

impl OutboundGenerator {
    /// `metadata` is the rendered JSON event body; `source` the speech to
    /// upload.
    pub fn new(boundary: &str, metadata: Vec<u8>, source: BoxedAudioSource) -> Self {
        debug!(
            "generator: new upload ({} B metadata, {} B audio)",
            metadata.len(),
            source.remaining()
        );
        Self {
            next_action: PartState::MetaHeaders,
            boundary: boundary.into(),
            metadata,
            staged: Vec::new(),
            staged_pos: 0,
            terminator_staged: false,
            source,
            audio_sent: 0,
            finished: false,
        }
    }

    /// Write the next chunk into `dest`.
    ///
    /// Never blocks.  Returns `None` once a final chunk has been reported.
    pub fn next_chunk(&mut self, dest: &mut [u8]) -> Option<Chunk> {
        if self.finished {
            return None;
        }
        if dest.is_empty() {
            return Some(Chunk {
                written: 0,
                is_final: false,
                yield_requested: true,
            });
        }

        if self.staged_pos < self.staged.len() {
            return Some(self.drain_staged(dest));
        }

        match self.next_action {
            PartState::MetaHeaders | PartState::MetaJson => {
                let mut segment = render_part_prefix(PartKind::Metadata, &self.boundary);
                segment.extend_from_slice(&self.metadata);
                self.stage(segment);
                self.advance(PartState::AudioHeaders);
                Some(self.drain_staged(dest))
            }
            PartState::AudioHeaders => {
                self.stage(render_part_prefix(PartKind::Audio, &self.boundary));
                self.advance(PartState::AudioData);
                Some(self.drain_staged(dest))
            }
            PartState::AudioData if self.source.remaining() > 0 => {
                let written = self.source.read(dest);
                self.audio_sent += written as u64;
                let exhausted = self.source.remaining() == 0;
                if exhausted {
                    debug!("generator: audio exhausted after {} B", self.audio_sent);
                    self.advance(PartState::Done);
                }
                trace!("generator: {} B audio", written);
                Some(Chunk {
                    written,
                    is_final: false,
                    yield_requested: !exhausted,
                })
            }
            PartState::AudioData | PartState::Done => {
                self.advance(PartState::Done);
                self.stage(render_body_terminator(&self.boundary));
                self.terminator_staged = true;
                Some(self.drain_staged(dest))
            }
        }
    }

    /// Next segment to produce.
    pub fn next_action(&self) -> PartState {
        self.next_action
    }

    /// Audio bytes emitted so far.
    pub fn audio_sent(&self) -> u64 {
        self.audio_sent
    }

    /// Whether the final chunk has been reported.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn stage(&mut self, segment: Vec<u8>) {
        self.staged = segment;
        self.staged_pos = 0;
    }

    fn drain_staged(&mut self, dest: &mut [u8]) -> Chunk {
        let pending = &self.staged[self.staged_pos..];
        let written = pending.len().min(dest.len());
        dest[..written].copy_from_slice(&pending[..written]);
        self.staged_pos += written;

        let drained = self.staged_pos == self.staged.len();
        let is_final = drained && self.terminator_staged;
        if is_final {
            debug!("generator: terminator written, upload body complete");
            self.finished = true;
        }
        Chunk {
            written,
            is_final,
            yield_requested: !drained,
        }
    }

    fn advance(&mut self, to: PartState) {
        if to > self.next_action {
            self.next_action = to;
        }
    }
}
