//! Integration tests for the session coordinator against mock ports.
//!
//! Drive `open_downchannel`, `send_speech_event` and transport events by
//! hand and assert on flags, stream status, submitted requests, sink calls
//! and emitted events.

use futures_lite::future::block_on;

use avslink::adapters::audio_source::SliceAudioSource;
use avslink::app::events::SessionEvent;
use avslink::app::ports::MediaType;
use avslink::avs::shared::SyncFlag;
use avslink::avs::stream::{StreamRole, StreamStatus};
use avslink::avs::transport::{Method, StreamId, TransportEvent};
use avslink::config::AvsConfig;
use avslink::error::{Error, TransportError};
use avslink::multipart::boundary::{PartKind, render_body_terminator, render_part_prefix};

use super::mock_ports::{
    BOUNDARY, FailingRefresher, ImmediateRefresher, MockTransport, NeverRefresher, RecordingSink,
    SinkCall, ThreadedRefresher, VecEventSink, session, session_with,
};

type TestSession = avslink::avs::Session<RecordingSink>;

fn speech(bytes: &[u8]) -> Box<SliceAudioSource> {
    Box::new(SliceAudioSource::new(bytes.to_vec()))
}

fn header(s: &mut TestSession, t: &mut MockTransport, stream: StreamId, name: &str, value: &str) {
    s.handle_event(
        TransportEvent::Header {
            stream,
            name,
            value,
        },
        t,
    );
}

fn complete(s: &mut TestSession, t: &mut MockTransport, stream: StreamId) {
    s.handle_event(TransportEvent::HeadersComplete { stream }, t);
}

fn close(s: &mut TestSession, t: &mut MockTransport, stream: StreamId) {
    s.handle_event(
        TransportEvent::Closed {
            stream,
            error_code: 0,
        },
        t,
    );
}

/// Session with an open, ready downchannel on stream 1.
fn ready_session() -> (TestSession, MockTransport) {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();
    header(&mut s, &mut t, id, ":status", "200");
    header(
        &mut s,
        &mut t,
        id,
        "content-type",
        "multipart/related; boundary=------abcdef; type=\"application/json\"",
    );
    complete(&mut s, &mut t, id);
    (s, t)
}

fn drain_body(s: &mut TestSession, stream: StreamId, capacity: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; capacity];
    while let Some(chunk) = s.read_outbound(stream, &mut buf) {
        out.extend_from_slice(&buf[..chunk.written]);
    }
    out
}

// ── Downchannel ───────────────────────────────────────────────

#[test]
fn open_downchannel_refreshes_then_submits_get() {
    let mut s = session();
    let mut t = MockTransport::default();
    let mut refresher = ImmediateRefresher::new("tok-123");

    let id = block_on(s.open_downchannel(&mut t, &mut refresher)).unwrap();

    assert_eq!(refresher.calls, 1);
    assert_eq!(id, 1);
    assert_eq!(t.requests.len(), 1);
    let req = &t.requests[0];
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.url, "https://avs-alexa-eu.amazon.com/v20160207/directives");
    assert_eq!(req.header("authorization"), Some("Bearer tok-123"));
    assert!(!req.has_body);
    assert_eq!(
        s.stream_status(StreamRole::Downchannel),
        Some(StreamStatus::Connecting)
    );
    assert_eq!(s.active_streams(), 1);
    assert!(s.is_set(SyncFlag::CredentialValid));
    assert!(!s.is_set(SyncFlag::DownchannelReady));
}

#[test]
fn valid_credential_skips_refresh() {
    let mut s = session();
    s.credential_publisher().publish("already");
    let mut t = MockTransport::default();
    let mut refresher = NeverRefresher::default();

    block_on(s.open_downchannel(&mut t, &mut refresher)).unwrap();
    assert_eq!(refresher.calls, 0);
    assert_eq!(t.requests[0].header("authorization"), Some("Bearer already"));
}

#[test]
fn refresh_completed_from_another_thread_unblocks_open() {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ThreadedRefresher { token: "late" }))
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(t.requests[0].header("authorization"), Some("Bearer late"));
}

#[test]
fn credential_wait_is_bounded() {
    let mut s = session_with(AvsConfig {
        credential_timeout_ms: 30,
        ..AvsConfig::default()
    });
    let mut t = MockTransport::default();
    let mut refresher = NeverRefresher::default();

    let r = block_on(s.open_downchannel(&mut t, &mut refresher));
    assert_eq!(r, Err(Error::CredentialTimeout));
    assert_eq!(refresher.calls, 1);
    assert!(t.requests.is_empty(), "no stream without a credential");
    assert_eq!(s.active_streams(), 0);
}

#[test]
fn failed_refresh_is_reported() {
    let mut s = session();
    let mut t = MockTransport::default();
    let r = block_on(s.open_downchannel(&mut t, &mut FailingRefresher));
    assert_eq!(r, Err(Error::CredentialRefreshFailed));
    assert!(t.requests.is_empty());
}

#[test]
fn submit_failure_is_returned_to_caller() {
    let mut s = session();
    let mut t = MockTransport::failing(TransportError::StreamRefused);
    let r = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok")));
    assert_eq!(
        r,
        Err(Error::TransportSubmission(TransportError::StreamRefused))
    );
    assert_eq!(s.active_streams(), 0);
    assert_eq!(s.stream_status(StreamRole::Downchannel), None);
}

#[test]
fn open_downchannel_is_idempotent_while_active() {
    let (mut s, mut t) = ready_session();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();
    assert_eq!(id, 1);
    assert_eq!(t.requests.len(), 1);
    assert_eq!(s.active_streams(), 1);
}

#[test]
fn ready_only_after_all_headers() {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();

    header(&mut s, &mut t, id, ":status", "200");
    assert_eq!(s.stream_status(StreamRole::Downchannel), Some(StreamStatus::Open));
    assert!(!s.is_set(SyncFlag::DownchannelReady));

    header(&mut s, &mut t, id, "content-type", "multipart/related; boundary=x");
    assert!(!s.is_set(SyncFlag::DownchannelReady));

    complete(&mut s, &mut t, id);
    assert!(s.is_set(SyncFlag::DownchannelReady));
}

#[test]
fn non_200_downchannel_never_becomes_ready() {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();
    header(&mut s, &mut t, id, ":status", "500");
    complete(&mut s, &mut t, id);
    assert!(!s.is_set(SyncFlag::DownchannelReady));
    assert_eq!(
        s.stream_status(StreamRole::Downchannel),
        Some(StreamStatus::Connecting)
    );
}

// ── Scenario A: ready downchannel accepts an upload ───────────

#[test]
fn scenario_a_ready_downchannel_accepts_speech_event() {
    let (mut s, mut t) = ready_session();
    assert!(s.is_set(SyncFlag::DownchannelReady));

    let audio = vec![0x5Au8; 700];
    let id = s.send_speech_event(&mut t, speech(&audio)).unwrap();
    assert_eq!(id, 3);

    let req = &t.requests[1];
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.url, "https://avs-alexa-eu.amazon.com/v20160207/events");
    assert_eq!(req.header("authorization"), Some("Bearer tok"));
    assert_eq!(
        req.header("content-type"),
        Some("multipart/form-data; boundary=\"nghttp2123456789\"")
    );
    assert!(req.has_body);
    assert_eq!(s.active_streams(), 2);

    let body = drain_body(&mut s, id, 100);
    let meta_prefix = render_part_prefix(PartKind::Metadata, BOUNDARY);
    let audio_prefix = render_part_prefix(PartKind::Audio, BOUNDARY);
    let terminator = render_body_terminator(BOUNDARY);

    assert!(body.starts_with(&meta_prefix));
    assert!(body.ends_with(&terminator));
    let audio_at = body
        .windows(audio_prefix.len())
        .position(|w| w == audio_prefix.as_slice())
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_slice(&body[meta_prefix.len()..audio_at]).unwrap();
    assert_eq!(json["event"]["header"]["namespace"], "SpeechRecognizer");
    assert_eq!(json["event"]["header"]["name"], "Recognize");
    assert_eq!(json["event"]["header"]["messageId"], "msg-00000001");
    assert_eq!(
        &body[audio_at + audio_prefix.len()..body.len() - terminator.len()],
        audio.as_slice()
    );
}

#[test]
fn each_upload_gets_fresh_ids_and_stream() {
    let (mut s, mut t) = ready_session();
    let first = s.send_speech_event(&mut t, speech(b"one")).unwrap();
    drain_body(&mut s, first, 512);
    close(&mut s, &mut t, first);

    let second = s.send_speech_event(&mut t, speech(b"two")).unwrap();
    assert_ne!(first, second);
    let body = drain_body(&mut s, second, 512);
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("msg-00000002"));
    assert!(text.contains("dialog-00000002"));
}

#[test]
fn upload_requires_downchannel() {
    let mut s = session();
    s.credential_publisher().publish("tok");
    let mut t = MockTransport::default();
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"x")),
        Err(Error::DownchannelNotOpen)
    );
    assert!(t.requests.is_empty());
}

#[test]
fn second_upload_while_active_is_rejected() {
    let (mut s, mut t) = ready_session();
    s.send_speech_event(&mut t, speech(b"first")).unwrap();
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"second")),
        Err(Error::UploadInProgress)
    );
    assert_eq!(t.requests.len(), 2);
}

#[test]
fn upload_submit_failure_leaves_no_stream() {
    let (mut s, mut t) = ready_session();
    t.fail_next = Some(TransportError::ConnectionLost);
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"x")),
        Err(Error::TransportSubmission(TransportError::ConnectionLost))
    );
    assert_eq!(s.stream_status(StreamRole::EventChannel), None);
    assert_eq!(s.active_streams(), 1);
}

// ── Scenario B: 403 on the downchannel ────────────────────────

#[test]
fn scenario_b_403_clears_credential_and_blocks_uploads() {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();

    header(&mut s, &mut t, id, ":status", "403");
    complete(&mut s, &mut t, id);

    assert!(!s.is_set(SyncFlag::CredentialValid));
    assert!(!s.is_set(SyncFlag::DownchannelReady));
    assert_eq!(
        s.stream_status(StreamRole::Downchannel),
        Some(StreamStatus::Unauthorized)
    );
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"x")),
        Err(Error::DownchannelNotOpen)
    );
    assert_eq!(t.requests.len(), 1);

    let mut events = VecEventSink::default();
    s.drain_events(&mut events);
    assert!(events.events.contains(&SessionEvent::AuthorizationRejected(id)));

    // A fresh credential alone does not revive the rejected stream.
    s.credential_publisher().publish("fresh");
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"x")),
        Err(Error::DownchannelNotOpen)
    );
    assert_eq!(t.requests.len(), 1);
}

#[test]
fn reopen_after_403_refreshes_and_resubmits() {
    let mut s = session();
    let mut t = MockTransport::default();
    let first = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();
    header(&mut s, &mut t, first, ":status", "403");
    complete(&mut s, &mut t, first);
    assert_eq!(s.active_streams(), 1);

    let mut refresher = ImmediateRefresher::new("fresh");
    let second = block_on(s.open_downchannel(&mut t, &mut refresher)).unwrap();

    assert_ne!(second, first);
    assert_eq!(refresher.calls, 1);
    assert_eq!(t.requests.len(), 2);
    assert_eq!(t.requests[1].method, Method::Get);
    assert_eq!(t.requests[1].header("authorization"), Some("Bearer fresh"));
    assert!(s.is_set(SyncFlag::CredentialValid));
    assert_eq!(s.stream_id(StreamRole::Downchannel), Some(second));
    assert_eq!(
        s.stream_status(StreamRole::Downchannel),
        Some(StreamStatus::Connecting)
    );
    assert_eq!(s.active_streams(), 1, "replacement inherits the slot");

    // The rejected stream closing later is no longer tracked.
    close(&mut s, &mut t, first);
    assert_eq!(s.active_streams(), 1);
    assert!(!s.is_shutdown_initiated());

    header(&mut s, &mut t, second, ":status", "200");
    complete(&mut s, &mut t, second);
    assert!(s.is_set(SyncFlag::DownchannelReady));
    let upload = s.send_speech_event(&mut t, speech(b"x")).unwrap();
    assert_eq!(t.requests[2].id, upload);
    assert_eq!(t.requests[2].header("authorization"), Some("Bearer fresh"));

    // Opening again while the new stream is usable is a no-op.
    assert_eq!(
        block_on(s.open_downchannel(&mut t, &mut NeverRefresher::default())),
        Ok(second)
    );
    assert_eq!(t.requests.len(), 3);
}

// ── Scenario C: response audio reaches the sink ───────────────

#[test]
fn scenario_c_downchannel_audio_part_feeds_sink() {
    let mut s = session();
    let mut t = MockTransport::default();
    let id = block_on(s.open_downchannel(&mut t, &mut ImmediateRefresher::new("tok"))).unwrap();
    header(&mut s, &mut t, id, ":status", "200");
    header(
        &mut s,
        &mut t,
        id,
        "content-type",
        "multipart/related; boundary=----bound1",
    );
    complete(&mut s, &mut t, id);

    let audio: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
    let mut body = b"------bound1\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n\
                     {\"directive\":{\"header\":{\"namespace\":\"SpeechSynthesizer\"}}}\
                     \r\n------bound1\r\nContent-Type: application/octet-stream\r\n\r\n"
        .to_vec();
    body.extend_from_slice(&audio);
    body.extend_from_slice(b"\r\n------bound1--\r\n");

    for piece in body.chunks(173) {
        s.handle_event(
            TransportEvent::Data {
                stream: id,
                data: piece,
            },
            &mut t,
        );
    }

    let sink = s.sink();
    assert!(matches!(
        sink.calls.first(),
        Some(SinkCall::Start(cfg)) if cfg.media_type == MediaType::AudioMpeg && cfg.sample_rate_hz == 44_100
    ));
    assert_eq!(sink.calls.last(), Some(&SinkCall::Eos));
    assert_eq!(sink.count(|c| matches!(c, SinkCall::Start(_))), 1);
    assert_eq!(sink.count(|c| matches!(c, SinkCall::Eos)), 1);
    assert_eq!(sink.audio(), audio);
}

#[test]
fn malformed_boundary_is_reported_and_data_ignored() {
    let (mut s, mut t) = ready_session();
    let upload = s.send_speech_event(&mut t, speech(b"x")).unwrap();
    header(&mut s, &mut t, upload, ":status", "200");
    header(&mut s, &mut t, upload, "content-type", "multipart/related");
    s.handle_event(
        TransportEvent::Data {
            stream: upload,
            data: b"--x\r\nContent-Type: application/octet-stream\r\n\r\nAB",
        },
        &mut t,
    );
    assert!(s.sink().calls.is_empty());

    let mut events = VecEventSink::default();
    s.drain_events(&mut events);
    assert!(events.events.contains(&SessionEvent::MalformedBoundary(upload)));
}

// ── Scenario D: shutdown after the last close ─────────────────

#[test]
fn scenario_d_shutdown_once_after_last_close() {
    let (mut s, mut t) = ready_session();
    let upload = s.send_speech_event(&mut t, speech(b"abc")).unwrap();
    drain_body(&mut s, upload, 256);
    assert_eq!(s.active_streams(), 2);

    close(&mut s, &mut t, upload);
    assert_eq!(s.active_streams(), 1);
    assert_eq!(t.shutdowns, 0);
    assert!(!s.is_shutdown_initiated());

    close(&mut s, &mut t, 1);
    assert_eq!(s.active_streams(), 0);
    assert_eq!(t.shutdowns, 1);
    assert!(s.is_shutdown_initiated());
    assert!(!s.is_set(SyncFlag::DownchannelReady));

    // A duplicate close changes nothing.
    close(&mut s, &mut t, 1);
    assert_eq!(t.shutdowns, 1);

    let mut events = VecEventSink::default();
    s.drain_events(&mut events);
    assert_eq!(events.count(|e| *e == SessionEvent::Shutdown), 1);
    assert_eq!(
        events.count(|e| matches!(e, SessionEvent::StreamClosed { .. })),
        2
    );
    assert!(events.events.contains(&SessionEvent::UploadComplete {
        stream: upload,
        audio_bytes: 3
    }));
}

#[test]
fn uploads_rejected_after_shutdown() {
    let (mut s, mut t) = ready_session();
    s.shutdown(&mut t);
    assert_eq!(
        s.send_speech_event(&mut t, speech(b"x")),
        Err(Error::ShuttingDown)
    );
}

// ── Premature close ───────────────────────────────────────────

#[test]
fn close_mid_upload_aborts_and_discards_cursor() {
    let (mut s, mut t) = ready_session();
    let upload = s.send_speech_event(&mut t, speech(&[9u8; 1000])).unwrap();

    let mut big = [0u8; 2048];
    s.read_outbound(upload, &mut big).unwrap(); // metadata
    s.read_outbound(upload, &mut big).unwrap(); // audio prefix
    let mut buf = [0u8; 512];
    let chunk = s.read_outbound(upload, &mut buf).unwrap();
    assert_eq!(chunk.written, 512);
    assert!(chunk.yield_requested);

    s.handle_event(
        TransportEvent::Closed {
            stream: upload,
            error_code: 2,
        },
        &mut t,
    );
    assert_eq!(
        s.stream_status(StreamRole::EventChannel),
        Some(StreamStatus::Closed)
    );
    assert!(s.read_outbound(upload, &mut buf).is_none());
    assert_eq!(s.active_streams(), 1);
    assert_eq!(t.shutdowns, 0);

    let mut events = VecEventSink::default();
    s.drain_events(&mut events);
    assert!(events.events.contains(&SessionEvent::UploadAborted {
        stream: upload,
        audio_bytes: 512
    }));
    assert!(events.events.contains(&SessionEvent::StreamClosed {
        stream: upload,
        role: StreamRole::EventChannel,
        error_code: 2
    }));
}

#[test]
fn events_for_unknown_streams_are_ignored() {
    let (mut s, mut t) = ready_session();
    header(&mut s, &mut t, 99, ":status", "403");
    close(&mut s, &mut t, 99);
    assert!(s.is_set(SyncFlag::CredentialValid));
    assert_eq!(s.active_streams(), 1);
}

// ── Cross-context requests ────────────────────────────────────

#[test]
fn speech_request_from_other_thread_runs_on_process_requests() {
    let (mut s, mut t) = ready_session();
    let handle = s.handle();
    std::thread::spawn(move || {
        handle
            .request_speech(Box::new(SliceAudioSource::from_static(b"queued")))
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(t.requests.len(), 1, "nothing submitted off-context");
    s.process_requests(&mut t);
    assert_eq!(t.requests.len(), 2);
    assert_eq!(t.requests[1].method, Method::Post);
}

#[test]
fn rejected_queued_request_becomes_event() {
    let mut s = session();
    let mut t = MockTransport::default();
    s.handle()
        .request_speech(Box::new(SliceAudioSource::from_static(b"x")))
        .unwrap();
    s.process_requests(&mut t);

    let mut events = VecEventSink::default();
    s.drain_events(&mut events);
    assert_eq!(
        events.events,
        vec![SessionEvent::UploadRejected(Error::DownchannelNotOpen)]
    );
}

#[test]
fn queued_shutdown_request_shuts_transport_down() {
    let (mut s, mut t) = ready_session();
    s.handle().request_shutdown().unwrap();
    s.process_requests(&mut t);
    assert_eq!(t.shutdowns, 1);
    assert!(s.is_shutdown_initiated());
}
