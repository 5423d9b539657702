//! Fuzz target: `InboundDispatcher::on_stream_bytes`
//!
//! The first input byte picks a split size; the rest is a response body
//! delivered in pieces of that size.  Checks that nothing panics, that the
//! sink only sees audio between a start and an end-of-stream, and that the
//! result matches delivering the body in one piece.
//!
//! cargo fuzz run fuzz_multipart_dispatcher

#![no_main]

use avslink::app::ports::{AudioSink, AudioStreamConfig, MediaType};
use avslink::multipart::boundary::extract_boundary_token;
use avslink::multipart::dispatcher::InboundDispatcher;
use libfuzzer_sys::fuzz_target;

const CFG: AudioStreamConfig = AudioStreamConfig {
    media_type: MediaType::AudioMpeg,
    sample_rate_hz: 44_100,
    bits_per_sample: 16,
};

#[derive(Default)]
struct CheckingSink {
    active: bool,
    audio: Vec<u8>,
    parts: usize,
}

impl AudioSink for CheckingSink {
    fn start(&mut self, _config: &AudioStreamConfig) {
        self.active = true;
        self.parts += 1;
    }
    fn feed(&mut self, data: &[u8]) {
        assert!(self.active, "audio fed outside an audio part");
        self.audio.extend_from_slice(data);
    }
    fn mark_end_of_stream(&mut self) {
        assert!(self.active, "end-of-stream without a start");
        self.active = false;
    }
}

fn run<'a>(pieces: impl Iterator<Item = &'a [u8]>) -> CheckingSink {
    let token = extract_boundary_token("multipart/related; boundary=fz").unwrap();
    let mut d = InboundDispatcher::new(token);
    let mut sink = CheckingSink::default();
    for piece in pieces {
        d.on_stream_bytes(piece, &mut sink, &CFG);
    }
    sink
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let size = usize::from(split.max(1));

    let whole = run(std::iter::once(body));
    let pieces = run(body.chunks(size));

    assert_eq!(whole.audio, pieces.audio);
    assert_eq!(whole.parts, pieces.parts);
});
