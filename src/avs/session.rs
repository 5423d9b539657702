//! Session coordinator.
//!
//! Owns the two stream slots, the active-stream count and the audio sink,
//! and is the only place protocol state changes.  Everything here runs on
//! the protocol execution context; other contexts reach it through
//! [`SessionHandle`] (requests) and [`CredentialPublisher`] (credentials).
//!
//! ```text
//!  open_downchannel ─▶ [Downchannel slot] ── 200 + headers ─▶ DownchannelReady
//!                                                                   │
//!  send_speech_event ─▶ [EventChannel slot] ◀── requires ───────────┘
//!                              │
//!        transport pull ──▶ read_outbound ──▶ OutboundGenerator
//! ```

use core::time::Duration;
use std::sync::Arc;

use heapless::Deque;
use log::{debug, info, warn};

use super::event::{EventEnvelope, IdSequence};
use super::shared::{
    CredentialPublisher, SessionHandle, SessionRequest, SessionShared, SyncFlag, bounded,
};
use super::stream::{HeaderOutcome, Stream, StreamRole, StreamStatus};
use super::transport::{Header, Method, Request, StreamId, Transport, TransportEvent};
use crate::app::events::SessionEvent;
use crate::app::ports::{
    AudioSink, AudioStreamConfig, BoxedAudioSource, CredentialRefresher, EventSink,
};
use crate::config::AvsConfig;
use crate::error::{Error, Result};
use crate::multipart::boundary::form_data_content_type;
use crate::multipart::generator::{Chunk, OutboundGenerator};

/// Events kept between two drains.  The oldest is dropped on overflow.
pub const EVENT_BACKLOG: usize = 16;

pub struct Session<A: AudioSink> {
    config: AvsConfig,
    player: AudioStreamConfig,
    shared: Arc<SessionShared>,
    streams: [Option<Stream>; StreamRole::COUNT],
    active_streams: usize,
    shutdown_initiated: bool,
    ids: IdSequence,
    sink: A,
    pending: Deque<SessionEvent, EVENT_BACKLOG>,
}

impl<A: AudioSink> Session<A> {
    pub fn new(config: AvsConfig, sink: A) -> Result<Self> {
        config.validate()?;
        info!(
            "session: region {:?}, boundary {}",
            config.region, config.outbound_boundary
        );
        Ok(Self {
            player: config.player.into(),
            config,
            shared: Arc::new(SessionShared::new()),
            streams: [None, None],
            active_streams: 0,
            shutdown_initiated: false,
            ids: IdSequence::default(),
            sink,
            pending: Deque::new(),
        })
    }

    /// Handle for marshalling requests from other execution contexts.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.shared.clone())
    }

    /// Publisher the credential collaborator completes refreshes through.
    pub fn credential_publisher(&self) -> CredentialPublisher {
        CredentialPublisher::new(self.shared.clone())
    }

    // ── Entry points ──────────────────────────────────────────

    /// Open the long-lived downchannel.
    ///
    /// Refreshes the credential first if none is valid, waiting at most
    /// `credential_timeout_ms`.  Returns once the request is submitted; the
    /// stream becomes ready later, through [`Self::handle_event`].  A
    /// downchannel that is connecting or open is returned as is; one that
    /// was rejected is replaced.
    pub async fn open_downchannel(
        &mut self,
        transport: &mut impl Transport,
        refresher: &mut impl CredentialRefresher,
    ) -> Result<StreamId> {
        let mut replacing = false;
        if let Some(stream) = self.stream(StreamRole::Downchannel) {
            if stream.is_usable() {
                debug!("session: downchannel {} already open", stream.id());
                return Ok(stream.id());
            }
            // A rejected stream still holds its active-stream count until
            // it closes; the replacement inherits it.
            replacing = stream.is_active();
        }

        self.ensure_credential(refresher).await?;
        let bearer = self.shared.bearer().ok_or(Error::AuthorizationRejected)?;

        let url = self.config.directives_url();
        let headers = [Header {
            name: "authorization",
            value: &bearer,
        }];
        let id = transport
            .submit(&Request {
                method: Method::Get,
                url: &url,
                headers: &headers,
                has_body: false,
            })
            .inspect_err(|e| warn!("session: downchannel submit failed: {}", e))?;

        info!("session: downchannel submitted on stream {}", id);
        self.shared.clear(SyncFlag::DownchannelReady);
        if replacing {
            info!("session: downchannel {} replaces rejected stream", id);
        } else {
            self.active_streams += 1;
        }
        self.streams[StreamRole::Downchannel.index()] =
            Some(Stream::new(StreamRole::Downchannel, id));
        self.shutdown_initiated = false;
        self.push_event(SessionEvent::DownchannelOpening(id));
        Ok(id)
    }

    /// Start a speech upload on a fresh event-channel stream.
    ///
    /// Returns once the POST is submitted; completion is observed through
    /// stream events.
    pub fn send_speech_event(
        &mut self,
        transport: &mut impl Transport,
        source: BoxedAudioSource,
    ) -> Result<StreamId> {
        if self.shutdown_initiated {
            return Err(Error::ShuttingDown);
        }
        if !self
            .stream(StreamRole::Downchannel)
            .is_some_and(Stream::is_usable)
        {
            return Err(Error::DownchannelNotOpen);
        }
        if !self.shared.is_set(SyncFlag::CredentialValid) {
            return Err(Error::AuthorizationRejected);
        }
        if self
            .stream(StreamRole::EventChannel)
            .is_some_and(Stream::is_active)
        {
            return Err(Error::UploadInProgress);
        }
        let bearer = self.shared.bearer().ok_or(Error::AuthorizationRejected)?;

        let ids = self.ids.next_ids();
        let metadata =
            EventEnvelope::recognize(ids, self.config.profile, &self.config.audio_format)
                .to_json()?;
        let boundary = &self.config.outbound_boundary;
        let generator = OutboundGenerator::new(boundary, metadata, source);

        let url = self.config.events_url();
        let content_type = form_data_content_type(boundary);
        let headers = [
            Header {
                name: "authorization",
                value: &bearer,
            },
            Header {
                name: "content-type",
                value: &content_type,
            },
        ];
        let id = transport
            .submit(&Request {
                method: Method::Post,
                url: &url,
                headers: &headers,
                has_body: true,
            })
            .inspect_err(|e| warn!("session: speech upload submit failed: {}", e))?;

        info!(
            "session: speech upload {} on stream {}",
            ids.message_id(),
            id
        );
        self.streams[StreamRole::EventChannel.index()] = Some(Stream::with_upload(id, generator));
        self.active_streams += 1;
        self.push_event(SessionEvent::UploadStarted {
            stream: id,
            message_id: ids.sequence,
        });
        Ok(id)
    }

    // ── Transport callbacks ───────────────────────────────────

    /// Apply one transport event.  Events for unknown streams are ignored.
    pub fn handle_event(&mut self, event: TransportEvent<'_>, transport: &mut impl Transport) {
        let id = event.stream();
        let Some(role) = self.role_of(id) else {
            debug!("session: event for unknown stream {}", id);
            return;
        };
        let slot = role.index();

        match event {
            TransportEvent::Header { name, value, .. } => {
                let Some(stream) = self.streams[slot].as_mut() else {
                    return;
                };
                match stream.on_header(name, value) {
                    HeaderOutcome::Unauthorized => {
                        self.shared.invalidate_credential();
                        self.push_event(SessionEvent::AuthorizationRejected(id));
                    }
                    HeaderOutcome::MalformedBoundary => {
                        self.push_event(SessionEvent::MalformedBoundary(id));
                    }
                    HeaderOutcome::BoundaryDiscovered | HeaderOutcome::None => {}
                }
            }
            TransportEvent::HeadersComplete { .. } => {
                let open = self.streams[slot]
                    .as_ref()
                    .is_some_and(|s| s.status() == StreamStatus::Open);
                if role == StreamRole::Downchannel && open {
                    info!("session: downchannel {} ready", id);
                    self.shared.set(SyncFlag::DownchannelReady);
                    self.push_event(SessionEvent::DownchannelReady(id));
                }
            }
            TransportEvent::Data { data, .. } => {
                if let Some(stream) = self.streams[slot].as_mut() {
                    stream.on_data(data, &mut self.sink, &self.player);
                }
            }
            TransportEvent::Closed { error_code, .. } => {
                self.on_stream_closed(role, id, error_code, transport);
            }
        }
    }

    /// Pull the next request-body chunk for `stream`.
    ///
    /// `None` when the stream carries no upload or its body is complete.
    pub fn read_outbound(&mut self, stream: StreamId, dest: &mut [u8]) -> Option<Chunk> {
        let upload = self.streams[StreamRole::EventChannel.index()]
            .as_mut()
            .filter(|s| s.id() == stream && s.is_active())?;
        upload.outbound_mut()?.next_chunk(dest)
    }

    /// Execute requests queued by other contexts.
    pub fn process_requests(&mut self, transport: &mut impl Transport) {
        while let Some(request) = self.shared.try_next_request() {
            debug!("session: request {:?}", request);
            match request {
                SessionRequest::SendSpeech(source) => {
                    if let Err(e) = self.send_speech_event(transport, source) {
                        warn!("session: speech request rejected: {}", e);
                        self.push_event(SessionEvent::UploadRejected(e));
                    }
                }
                SessionRequest::Shutdown => self.shutdown(transport),
            }
        }
    }

    /// Shut the transport down.  Only the first call has an effect until a
    /// new downchannel is opened.
    pub fn shutdown(&mut self, transport: &mut impl Transport) {
        if self.shutdown_initiated {
            return;
        }
        self.shutdown_initiated = true;
        info!(
            "session: shutting down ({} active streams)",
            self.active_streams
        );
        transport.shutdown();
        self.push_event(SessionEvent::Shutdown);
    }

    /// Hand queued events to `sink`, oldest first.
    pub fn drain_events(&mut self, sink: &mut impl EventSink) {
        while let Some(event) = self.pending.pop_front() {
            sink.emit(&event);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn stream_status(&self, role: StreamRole) -> Option<StreamStatus> {
        self.stream(role).map(Stream::status)
    }

    pub fn stream_id(&self, role: StreamRole) -> Option<StreamId> {
        self.stream(role).map(Stream::id)
    }

    pub fn active_streams(&self) -> usize {
        self.active_streams
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated
    }

    pub fn is_set(&self, flag: SyncFlag) -> bool {
        self.shared.is_set(flag)
    }

    pub fn config(&self) -> &AvsConfig {
        &self.config
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut A {
        &mut self.sink
    }

    // ── Internals ─────────────────────────────────────────────

    fn stream(&self, role: StreamRole) -> Option<&Stream> {
        self.streams[role.index()].as_ref()
    }

    fn role_of(&self, id: StreamId) -> Option<StreamRole> {
        [StreamRole::Downchannel, StreamRole::EventChannel]
            .into_iter()
            .find(|role| self.stream(*role).is_some_and(|s| s.id() == id))
    }

    async fn ensure_credential(&mut self, refresher: &mut impl CredentialRefresher) -> Result<()> {
        if self.shared.is_set(SyncFlag::CredentialValid) {
            return Ok(());
        }
        info!("AUTH | requesting credential refresh");
        self.shared.reset_refresh_state();
        refresher.request_refresh(self.credential_publisher());

        let timeout = Duration::from_millis(u64::from(self.config.credential_timeout_ms));
        bounded(
            timeout,
            Error::CredentialTimeout,
            self.shared.wait_for_credential(),
        )
        .await
        .inspect_err(|e| warn!("AUTH | no credential: {}", e))
    }

    fn on_stream_closed(
        &mut self,
        role: StreamRole,
        id: StreamId,
        error_code: u32,
        transport: &mut impl Transport,
    ) {
        let Some(outcome) = self.streams[role.index()].as_mut().and_then(Stream::close) else {
            debug!("session: stream {} already closed", id);
            return;
        };
        self.active_streams = self.active_streams.saturating_sub(1);
        info!(
            "session: stream {} ({}) closed, error {}, {} active",
            id,
            role.name(),
            error_code,
            self.active_streams
        );

        if role == StreamRole::Downchannel {
            self.shared.clear(SyncFlag::DownchannelReady);
        }
        if outcome.had_upload {
            if outcome.premature_upload {
                warn!(
                    "session: {} on stream {} after {} B audio",
                    Error::PrematureStreamClose,
                    id,
                    outcome.audio_sent
                );
                self.push_event(SessionEvent::UploadAborted {
                    stream: id,
                    audio_bytes: outcome.audio_sent,
                });
            } else {
                self.push_event(SessionEvent::UploadComplete {
                    stream: id,
                    audio_bytes: outcome.audio_sent,
                });
            }
        }
        self.push_event(SessionEvent::StreamClosed {
            stream: id,
            role,
            error_code,
        });

        if self.active_streams == 0 {
            self.shutdown(transport);
        }
    }

    fn push_event(&mut self, event: SessionEvent) {
        if self.pending.is_full() {
            debug!("session: event backlog full, dropping oldest");
            self.pending.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.pending.push_back(event);
    }
}
